//! # QR Artifacts
//!
//! Renders a scannable reference for every delivered invoice.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Artifact Pipeline                               │
//! │                                                                         │
//! │  Poller ──submit(code)──► mpsc (unbounded) ──► ArtifactWorker          │
//! │   never waits          every request kept    │                          │
//! │                                                  ▼                      │
//! │                                   spawn_blocking(render + write PNG)   │
//! │                                                  │                      │
//! │                              {output_dir}/invoice_{code}.png           │
//! │                                                                         │
//! │  Failures are logged and forgotten: the invoice is already delivered.  │
//! │  The worker stops once every handle is dropped and the queue is empty. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use image::Luma;
use qrcode::{EcLevel, QrCode};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::{ArtifactSettings, ID_PLACEHOLDER};
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Generator
// =============================================================================

/// Writes `invoice_{code}.png` QR images.
#[derive(Debug, Clone)]
pub struct QrArtifactGenerator {
    output_dir: PathBuf,
    reference_url: String,
    size_px: u32,
}

impl QrArtifactGenerator {
    pub fn new(settings: &ArtifactSettings) -> Self {
        QrArtifactGenerator {
            output_dir: settings.output_dir.clone(),
            reference_url: settings.reference_url.clone(),
            size_px: settings.size_px,
        }
    }

    /// URL encoded for `code`.
    pub fn reference_for(&self, code: i64) -> String {
        self.reference_url.replace(ID_PLACEHOLDER, &code.to_string())
    }

    /// Destination file for `code`.
    pub fn path_for(&self, code: i64) -> PathBuf {
        self.output_dir.join(format!("invoice_{}.png", code))
    }

    /// Renders and writes the artifact, returning its path.
    ///
    /// Encoding and PNG compression run on the blocking pool.
    pub async fn generate(&self, code: i64) -> SyncResult<PathBuf> {
        let url = self.reference_for(code);
        let path = self.path_for(code);
        let size = self.size_px;

        let written = path.clone();
        tokio::task::spawn_blocking(move || render_png(&url, &written, size))
            .await
            .map_err(|e| SyncError::ArtifactFailed {
                code,
                reason: e.to_string(),
            })?
            .map_err(|reason| SyncError::ArtifactFailed { code, reason })?;

        Ok(path)
    }
}

fn render_png(url: &str, path: &Path, size: u32) -> Result<(), String> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| format!("create {}: {}", dir.display(), e))?;
    }

    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::M).map_err(|e| e.to_string())?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(size, size)
        .build();

    image
        .save(path)
        .map_err(|e| format!("write {}: {}", path.display(), e))
}

// =============================================================================
// Worker
// =============================================================================

/// Counts reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactReport {
    pub generated: u64,
    pub failed: u64,
}

/// Background task draining artifact requests.
pub struct ArtifactWorker {
    generator: QrArtifactGenerator,
    requests: mpsc::UnboundedReceiver<i64>,
}

/// Submits artifact requests without waiting for them.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    requests: mpsc::UnboundedSender<i64>,
}

impl ArtifactWorker {
    /// Creates a worker and its handle.
    ///
    /// The queue is unbounded: a cycle forwards at most `batch_size`
    /// invoices, and each one must get its artifact even when rendering
    /// falls behind.
    pub fn new(generator: QrArtifactGenerator) -> (Self, ArtifactHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ArtifactWorker {
                generator,
                requests: rx,
            },
            ArtifactHandle { requests: tx },
        )
    }

    /// Runs until every handle is dropped, finishing queued requests first.
    pub async fn run(mut self) -> ArtifactReport {
        info!(dir = %self.generator.output_dir.display(), "Artifact worker starting");
        let mut report = ArtifactReport::default();

        while let Some(code) = self.requests.recv().await {
            match self.generator.generate(code).await {
                Ok(path) => {
                    report.generated += 1;
                    info!(code, path = %path.display(), "QR artifact generated");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(?e, code, "QR artifact generation failed");
                }
            }
        }

        info!(
            generated = report.generated,
            failed = report.failed,
            "Artifact worker stopped"
        );
        report
    }
}

impl ArtifactHandle {
    /// Queues an artifact for `code` without waiting.
    ///
    /// Fails only when the worker has stopped.
    pub fn submit(&self, code: i64) -> SyncResult<()> {
        self.requests
            .send(code)
            .map_err(|_| SyncError::ChannelError("artifact worker stopped".into()))?;
        debug!(code, "Artifact requested");
        Ok(())
    }
}
