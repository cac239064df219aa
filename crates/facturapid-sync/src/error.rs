//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Source      │  │     Delivery            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  SourceUnavail. │  │  ForwardFailed          │ │
//! │  │  InvalidUrl     │  │  RecordNotFound │  │  ArtifactFailed         │ │
//! │  │  ConfigLoad     │  │  HydrationFailed│  │  CheckpointFailed       │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Cycle impact:                                                         │
//! │    SourceUnavailable on listing  → cycle aborted, checkpoint unchanged │
//! │    anything per invoice          → invoice skipped, loop continues     │
//! │    ArtifactFailed                → logged by the worker only           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid forwarding endpoint or reference URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Source Errors
    // =========================================================================
    /// The operational store could not be reached or queried.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A summary was listed but its detail row is gone.
    #[error("Invoice {code} not found in source")]
    RecordNotFound { code: i64 },

    /// Detail was read but does not form a valid invoice.
    #[error("Failed to hydrate invoice {code}: {reason}")]
    HydrationFailed { code: i64, reason: String },

    // =========================================================================
    // Delivery Errors
    // =========================================================================
    /// The downstream service rejected or never received the invoice.
    #[error("Failed to forward invoice {code}: {reason}")]
    ForwardFailed { code: i64, reason: String },

    /// QR artifact could not be rendered or written.
    #[error("Failed to generate artifact for invoice {code}: {reason}")]
    ArtifactFailed { code: i64, reason: String },

    /// Checkpoint file could not be read or written.
    #[error("Checkpoint store error: {0}")]
    CheckpointFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Failed to serialize a document.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Internal sync error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

/// sqlx is only used against the operational store, so every failure there
/// means the source is unavailable for this cycle.
impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::SourceUnavailable(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if a later attempt may succeed without intervention.
    ///
    /// ## Retryable Errors
    /// - Source store temporarily unreachable
    /// - Downstream or receiving store rejected or unreachable
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Invoices that fail validation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::SourceUnavailable(_)
                | SyncError::ForwardFailed { .. }
                | SyncError::RecordNotFound { .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
        )
    }

    /// Invoice code the error is about, when it concerns one invoice.
    pub fn invoice_code(&self) -> Option<i64> {
        match self {
            SyncError::RecordNotFound { code }
            | SyncError::HydrationFailed { code, .. }
            | SyncError::ForwardFailed { code, .. }
            | SyncError::ArtifactFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}
