//! # Checkpoint
//!
//! The watermark: highest invoice code the poller has moved past.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Checkpoint Lifecycle                             │
//! │                                                                         │
//! │  startup:  store.load() ─► Some(n) ─► start at n                       │
//! │                        └─► None    ─► start at [checkpoint].initial    │
//! │                                                                         │
//! │  cycle:    run_cycle(checkpoint) ─► CycleReport { final_checkpoint }   │
//! │                                            │                            │
//! │                                            ▼ (only if it moved)         │
//! │            store.save(final_checkpoint)                                 │
//! │                                                                         │
//! │  The value only ever grows. advance_to() ignores lower codes.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Losing the checkpoint is safe: a restart from 0 re-forwards everything and
//! the receiving side ignores duplicates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Checkpoint Value
// =============================================================================

/// Monotonic invoice-code watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(i64);

impl Checkpoint {
    pub const fn new(value: i64) -> Self {
        Checkpoint(value)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Raises the watermark to `code` if it is higher.
    ///
    /// Returns true when the value changed.
    pub fn advance_to(&mut self, code: i64) -> bool {
        if code > self.0 {
            self.0 = code;
            true
        } else {
            false
        }
    }

    /// Whether `code` has not been passed yet.
    pub fn admits(&self, code: i64) -> bool {
        code > self.0
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Checkpoint Store
// =============================================================================

/// Persistence for the watermark between process runs.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last saved value, `None` on first run.
    async fn load(&self) -> SyncResult<Option<Checkpoint>>;

    async fn save(&self, checkpoint: Checkpoint) -> SyncResult<()>;
}

/// Process-lifetime store. A restart begins from the configured initial value.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    value: Mutex<Option<Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> SyncResult<Option<Checkpoint>> {
        Ok(*self.value.lock().await)
    }

    async fn save(&self, checkpoint: Checkpoint) -> SyncResult<()> {
        *self.value.lock().await = Some(checkpoint);
        Ok(())
    }
}

/// On-disk form of the checkpoint file.
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    checkpoint: Checkpoint,
    updated_at: DateTime<Utc>,
}

/// JSON file store.
///
/// Writes go to a sibling `.tmp` file that is then renamed over the target,
/// so a crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCheckpointStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> SyncResult<Option<Checkpoint>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No checkpoint file yet");
                return Ok(None);
            }
            Err(e) => return Err(SyncError::CheckpointFailed(e.to_string())),
        };

        let file: CheckpointFile = serde_json::from_str(&contents)
            .map_err(|e| SyncError::CheckpointFailed(format!("{}: {}", self.path.display(), e)))?;

        Ok(Some(file.checkpoint))
    }

    async fn save(&self, checkpoint: Checkpoint) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| SyncError::CheckpointFailed(e.to_string()))?;
            }
        }

        let contents = serde_json::to_string_pretty(&CheckpointFile {
            checkpoint,
            updated_at: Utc::now(),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| SyncError::CheckpointFailed(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SyncError::CheckpointFailed(e.to_string()))?;

        debug!(checkpoint = checkpoint.value(), path = ?self.path, "Checkpoint saved");
        Ok(())
    }
}
