//! # Sync Configuration
//!
//! Configuration management for the synchronizer.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FACTURAPID_SOURCE_DB=/srv/pos/pos.db                               │
//! │     FACTURAPID_API_ENDPOINT=https://api.example.com/api/invoices       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/facturapid/sync.toml (Linux)                             │
//! │     ~/Library/Application Support/com.facturapid.facturapid/sync.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     10 s poll, HTTP to localhost:8080, QR codes in ./qrcodes           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [source]
//! database_path = "/srv/pos/pos.db"
//! payment_channel = "QR"
//! printed_flag = "S"
//!
//! [sync]
//! poll_interval_secs = 10
//! on_failure = "advance"   # advance | retry
//!
//! [checkpoint]
//! initial = 0
//! path = "/var/lib/facturapid/checkpoint.json"
//!
//! [forward]
//! mode = "http"            # http | database
//! endpoint = "http://localhost:8080/api/invoices"
//!
//! [artifact]
//! output_dir = "qrcodes"
//! reference_url = "https://facturapid.example.com/invoice/INV-{id}"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

/// Placeholder replaced by the invoice code in `artifact.reference_url`.
pub const ID_PLACEHOLDER: &str = "{id}";

// =============================================================================
// Source Settings
// =============================================================================

/// Where eligible invoices are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Path to the operational SQLite store (opened read only).
    #[serde(default = "default_source_path")]
    pub database_path: PathBuf,

    /// Table holding invoice headers.
    #[serde(default = "default_header_table")]
    pub header_table: String,

    /// Table holding invoice lines.
    #[serde(default = "default_line_table")]
    pub line_table: String,

    /// Payment channel marker an invoice must carry to be synced.
    #[serde(default = "default_payment_channel")]
    pub payment_channel: String,

    /// Printed flag value an invoice must carry to be synced.
    #[serde(default = "default_printed_flag")]
    pub printed_flag: char,

    /// Maximum summaries listed per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_source_path() -> PathBuf {
    PathBuf::from("pos.db")
}

fn default_header_table() -> String {
    "pos_invoices".to_string()
}

fn default_line_table() -> String {
    "pos_invoice_lines".to_string()
}

fn default_payment_channel() -> String {
    "QR".to_string()
}

fn default_printed_flag() -> char {
    'S'
}

fn default_batch_size() -> u32 {
    100
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            database_path: default_source_path(),
            header_table: default_header_table(),
            line_table: default_line_table(),
            payment_channel: default_payment_channel(),
            printed_flag: default_printed_flag(),
            batch_size: default_batch_size(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// What the poller does with an invoice that fails to hydrate or forward.
///
/// ```text
/// advance: 4 fails → checkpoint moves to 4 anyway, 4 is never retried
/// retry:   4 fails → cycle stops at 3, next tick tries 4 again,
///          after max_attempts failures 4 is dead-lettered and skipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Move past failed invoices (fire-and-forget).
    #[default]
    Advance,
    /// Hold the checkpoint until the invoice succeeds or runs out of attempts.
    Retry,
}

impl std::fmt::Display for FailureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureMode::Advance => write!(f, "advance"),
            FailureMode::Retry => write!(f, "retry"),
        }
    }
}

impl std::str::FromStr for FailureMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "advance" | "skip" => Ok(FailureMode::Advance),
            "retry" => Ok(FailureMode::Retry),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown failure mode: '{}'. Valid options: advance, retry",
                other
            ))),
        }
    }
}

/// Failure policy handed to the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Advance,
    Retry { max_attempts: u32 },
}

/// Poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Interval between poll cycles (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Failure handling.
    #[serde(default)]
    pub on_failure: FailureMode,

    /// Attempts per invoice before it is dead-lettered (retry mode only).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            poll_interval_secs: default_poll_interval(),
            on_failure: FailureMode::default(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        match self.on_failure {
            FailureMode::Advance => FailurePolicy::Advance,
            FailureMode::Retry => FailurePolicy::Retry {
                max_attempts: self.max_attempts,
            },
        }
    }
}

// =============================================================================
// Checkpoint Settings
// =============================================================================

/// Where the poller starts and whether progress survives a restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointSettings {
    /// Starting watermark when nothing has been stored yet.
    #[serde(default)]
    pub initial: i64,

    /// JSON file persisting the watermark. In memory only when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Start from the highest code already in the receiving store
    /// (database forwarding mode only).
    #[serde(default)]
    pub resume_from_store: bool,
}

// =============================================================================
// Forward Settings
// =============================================================================

/// How hydrated invoices reach the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardMode {
    /// JSON POST to the receiving API.
    #[default]
    Http,
    /// Direct write into a local receiving store.
    Database,
}

impl std::fmt::Display for ForwardMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardMode::Http => write!(f, "http"),
            ForwardMode::Database => write!(f, "database"),
        }
    }
}

impl std::str::FromStr for ForwardMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "api" => Ok(ForwardMode::Http),
            "database" | "db" | "local" => Ok(ForwardMode::Database),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown forward mode: '{}'. Valid options: http, database",
                other
            ))),
        }
    }
}

/// Forwarding target settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardSettings {
    #[serde(default)]
    pub mode: ForwardMode,

    /// Receiving API endpoint (http mode).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Sent as `X-API-Key` when set.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Receiving store path (database mode).
    #[serde(default = "default_receiver_path")]
    pub database_path: PathBuf,
}

fn default_endpoint() -> String {
    "http://localhost:8080/api/invoices".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_receiver_path() -> PathBuf {
    PathBuf::from("facturapid.db")
}

impl Default for ForwardSettings {
    fn default() -> Self {
        ForwardSettings {
            mode: ForwardMode::default(),
            endpoint: default_endpoint(),
            api_key: None,
            timeout_secs: default_timeout(),
            database_path: default_receiver_path(),
        }
    }
}

impl ForwardSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Artifact Settings
// =============================================================================

/// QR artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory receiving `invoice_{id}.png` files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// URL encoded in the QR code; `{id}` is replaced by the invoice code.
    #[serde(default = "default_reference_url")]
    pub reference_url: String,

    /// Minimum image side in pixels.
    #[serde(default = "default_size_px")]
    pub size_px: u32,
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("qrcodes")
}

fn default_reference_url() -> String {
    "https://facturapid.example.com/invoice/INV-{id}".to_string()
}

fn default_size_px() -> u32 {
    256
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        ArtifactSettings {
            enabled: true,
            output_dir: default_output_dir(),
            reference_url: default_reference_url(),
            size_px: default_size_px(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete synchronizer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub source: SourceSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub checkpoint: CheckpointSettings,

    #[serde(default)]
    pub forward: ForwardSettings,

    #[serde(default)]
    pub artifact: ArtifactSettings,
}

impl SyncConfig {
    /// Loads configuration from file and environment.
    ///
    /// ## Loading Order
    /// 1. Start with defaults
    /// 2. Load from TOML file if it exists
    /// 3. Override with environment variables
    /// 4. Validate
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        for table in [&self.source.header_table, &self.source.line_table] {
            // Table names are interpolated into SQL
            if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(SyncError::InvalidConfig(format!(
                    "Table name must be a plain identifier, got: '{}'",
                    table
                )));
            }
        }

        if self.source.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.sync.poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.on_failure == FailureMode::Retry && self.sync.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "max_attempts must be at least 1 in retry mode".into(),
            ));
        }

        if self.checkpoint.initial < 0 {
            return Err(SyncError::InvalidConfig(
                "initial checkpoint cannot be negative".into(),
            ));
        }

        match self.forward.mode {
            ForwardMode::Http => {
                let url = url::Url::parse(&self.forward.endpoint)?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(SyncError::InvalidUrl(format!(
                        "Endpoint must start with http:// or https://, got: {}",
                        self.forward.endpoint
                    )));
                }
            }
            ForwardMode::Database => {
                if self.forward.database_path.as_os_str().is_empty() {
                    return Err(SyncError::InvalidConfig(
                        "forward.database_path is required in database mode".into(),
                    ));
                }
            }
        }

        if self.artifact.enabled {
            if !self.artifact.reference_url.contains(ID_PLACEHOLDER) {
                return Err(SyncError::InvalidConfig(format!(
                    "reference_url must contain {}",
                    ID_PLACEHOLDER
                )));
            }
            if self.artifact.size_px == 0 {
                return Err(SyncError::InvalidConfig(
                    "artifact size_px must be greater than 0".into(),
                ));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FACTURAPID_SOURCE_DB") {
            debug!(path = %path, "Overriding source database from environment");
            self.source.database_path = PathBuf::from(path);
        }

        if let Ok(secs) = std::env::var("FACTURAPID_POLL_INTERVAL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.sync.poll_interval_secs = s;
            }
        }

        if let Ok(mode) = std::env::var("FACTURAPID_ON_FAILURE") {
            match mode.parse() {
                Ok(parsed) => self.sync.on_failure = parsed,
                Err(_) => warn!(mode = %mode, "Unknown failure mode in environment"),
            }
        }

        if let Ok(path) = std::env::var("FACTURAPID_CHECKPOINT_PATH") {
            self.checkpoint.path = Some(PathBuf::from(path));
        }

        if let Ok(mode) = std::env::var("FACTURAPID_FORWARD_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding forward mode from environment");
                    self.forward.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown forward mode in environment"),
            }
        }

        if let Ok(url) = std::env::var("FACTURAPID_API_ENDPOINT") {
            debug!(url = %url, "Overriding API endpoint from environment");
            self.forward.endpoint = url;
        }

        if let Ok(key) = std::env::var("FACTURAPID_API_KEY") {
            self.forward.api_key = Some(key);
        }

        if let Ok(path) = std::env::var("FACTURAPID_RECEIVER_DB") {
            self.forward.database_path = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("FACTURAPID_ARTIFACT_DIR") {
            self.artifact.output_dir = PathBuf::from(dir);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "facturapid", "facturapid")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("http".parse::<ForwardMode>().unwrap(), ForwardMode::Http);
        assert_eq!("db".parse::<ForwardMode>().unwrap(), ForwardMode::Database);
        assert!("carrier-pigeon".parse::<ForwardMode>().is_err());

        assert_eq!("RETRY".parse::<FailureMode>().unwrap(), FailureMode::Retry);
        assert!("never".parse::<FailureMode>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.sync.failure_policy(), FailurePolicy::Advance);
        assert_eq!(config.source.payment_channel, "QR");
        assert_eq!(config.source.printed_flag, 'S');
        assert_eq!(config.artifact.output_dir, PathBuf::from("qrcodes"));
        assert!(config.checkpoint.path.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.forward.endpoint = "ftp://example.com/invoices".into();
        assert!(config.validate().unwrap_err().is_config_error());

        config.forward.endpoint = "not a url".into();
        assert!(config.validate().is_err());

        config.forward.endpoint = default_endpoint();
        config.source.header_table = "invoices; DROP TABLE x".into();
        assert!(config.validate().is_err());

        config.source.header_table = default_header_table();
        config.artifact.reference_url = "https://example.com/static".into();
        assert!(config.validate().is_err());

        config.artifact.enabled = false;
        assert!(config.validate().is_ok());

        config.sync.on_failure = FailureMode::Retry;
        config.sync.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy() {
        let settings = SyncSettings {
            on_failure: FailureMode::Retry,
            max_attempts: 3,
            ..SyncSettings::default()
        };
        assert_eq!(
            settings.failure_policy(),
            FailurePolicy::Retry { max_attempts: 3 }
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [source]
            database_path = "/srv/pos/pos.db"
            printed_flag = "Y"

            [forward]
            mode = "database"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.database_path, PathBuf::from("/srv/pos/pos.db"));
        assert_eq!(config.source.printed_flag, 'Y');
        assert_eq!(config.source.header_table, "pos_invoices");
        assert_eq!(config.forward.mode, ForwardMode::Database);
        assert_eq!(config.sync.on_failure, FailureMode::Advance);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");
        std::fs::write(
            &path,
            r#"
            [sync]
            poll_interval_secs = 3
            on_failure = "retry"
            max_attempts = 2

            [checkpoint]
            initial = 42
            "#,
        )
        .unwrap();

        let config = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.sync.failure_policy(), FailurePolicy::Retry { max_attempts: 2 });
        assert_eq!(config.checkpoint.initial, 42);
    }

    #[test]
    fn test_load_rejects_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");
        std::fs::write(&path, "[sync\npoll_interval_secs = ").unwrap();

        let err = SyncConfig::load(Some(path)).unwrap_err();
        assert!(matches!(err, SyncError::ConfigLoadFailed(_)));
        assert!(err.is_config_error());
    }
}
