//! # Poller
//!
//! Checkpoint-driven loop that moves new invoices downstream.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          One Poll Cycle                                 │
//! │                                                                         │
//! │  eligible_since(checkpoint) ──error──► cycle aborted, checkpoint kept  │
//! │           │                                                             │
//! │           ▼ codes ascending, deduplicated                               │
//! │  for code in codes:                                                     │
//! │     shutdown requested? ──yes──► stop (in-flight code already done)    │
//! │     hydrate(code) ─► forward(invoice)                                  │
//! │        │ ok                        │ error                              │
//! │        ▼                           ▼                                    │
//! │     submit artifact          advance: log, move on                     │
//! │     checkpoint = code        retry:   stop here, retry next tick       │
//! │                                       (dead-letter after N attempts)   │
//! │                                                                         │
//! │  → CycleReport { started_at, checkpoint, discovered, forwarded, ... }  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The checkpoint is a plain value owned by the loop: it goes into
//! [`Poller::run_cycle`] and comes back in the report.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

use crate::artifact::ArtifactHandle;
use crate::checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore};
use crate::config::{FailurePolicy, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::forwarder::Forwarder;
use crate::hydrator::Hydrator;
use crate::source::InvoiceSource;

// =============================================================================
// Settings and Report
// =============================================================================

/// Loop parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub policy: FailurePolicy,
    /// Starting point when the checkpoint store is empty.
    pub initial: Checkpoint,
}

impl Default for PollerSettings {
    fn default() -> Self {
        PollerSettings {
            poll_interval: Duration::from_secs(10),
            batch_size: 100,
            policy: FailurePolicy::Advance,
            initial: Checkpoint::default(),
        }
    }
}

impl PollerSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        PollerSettings {
            poll_interval: config.sync.poll_interval(),
            batch_size: config.source.batch_size,
            policy: config.sync.failure_policy(),
            initial: Checkpoint::new(config.checkpoint.initial),
        }
    }
}

/// What one cycle saw and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub started_at: Checkpoint,
    /// Checkpoint after the cycle.
    pub checkpoint: Checkpoint,
    pub discovered: Vec<i64>,
    pub forwarded: Vec<i64>,
    pub failed: Vec<i64>,
    /// Given up on after exhausting retry attempts.
    pub dead_lettered: Vec<i64>,
    /// Stopped early by a shutdown request.
    pub interrupted: bool,
}

impl CycleReport {
    fn new(started_at: Checkpoint) -> Self {
        CycleReport {
            started_at,
            checkpoint: started_at,
            ..Self::default()
        }
    }

    pub fn advanced(&self) -> bool {
        self.checkpoint > self.started_at
    }
}

// =============================================================================
// Poller
// =============================================================================

/// The synchronization loop.
pub struct Poller {
    source: Arc<dyn InvoiceSource>,
    hydrator: Hydrator,
    forwarder: Arc<dyn Forwarder>,
    artifacts: Option<ArtifactHandle>,
    store: Arc<dyn CheckpointStore>,
    settings: PollerSettings,

    /// Consecutive failures per code (retry policy).
    attempts: HashMap<i64, u32>,

    shutdown_rx: mpsc::Receiver<()>,
    stopping: bool,
}

/// Handle for stopping a running poller.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl PollerHandle {
    /// Asks the poller to stop after the invoice it is working on.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Shutdown channel closed".into()))
    }
}

impl Poller {
    /// Creates a poller and its handle.
    ///
    /// Without [`with_checkpoint_store`](Self::with_checkpoint_store) the
    /// checkpoint lives in memory only.
    pub fn new(
        source: Arc<dyn InvoiceSource>,
        forwarder: Arc<dyn Forwarder>,
        settings: PollerSettings,
    ) -> (Self, PollerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let poller = Poller {
            hydrator: Hydrator::new(source.clone()),
            source,
            forwarder,
            artifacts: None,
            store: Arc::new(MemoryCheckpointStore::new()),
            settings,
            attempts: HashMap::new(),
            shutdown_rx,
            stopping: false,
        };

        (poller, PollerHandle { shutdown_tx })
    }

    /// Requests a QR artifact for every forwarded invoice.
    pub fn with_artifacts(mut self, artifacts: ArtifactHandle) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = store;
        self
    }

    /// Runs until shut down, returning the final checkpoint.
    ///
    /// This should be spawned as a background task. The first cycle starts
    /// immediately.
    pub async fn run(mut self) -> Checkpoint {
        let mut checkpoint = self.starting_checkpoint().await;
        info!(
            checkpoint = checkpoint.value(),
            interval_secs = self.settings.poll_interval.as_secs(),
            policy = ?self.settings.policy,
            "Poller starting"
        );

        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_cycle(checkpoint).await {
                        Ok(report) => {
                            if report.advanced() {
                                self.persist(report.checkpoint).await;
                            }
                            checkpoint = report.checkpoint;
                        }
                        Err(e) => {
                            error!(?e, checkpoint = checkpoint.value(), "Poll cycle aborted");
                        }
                    }

                    if self.stopping {
                        info!("Poller shutting down");
                        break;
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Poller shutting down");
                    break;
                }
            }
        }

        info!(checkpoint = checkpoint.value(), "Poller stopped");
        checkpoint
    }

    /// Runs one cycle starting from `checkpoint`.
    ///
    /// Fails only when the source cannot be listed; per-invoice problems
    /// are logged and recorded in the report.
    pub async fn run_cycle(&mut self, checkpoint: Checkpoint) -> SyncResult<CycleReport> {
        let mut report = CycleReport::new(checkpoint);

        let summaries = self
            .source
            .eligible_since(checkpoint, self.settings.batch_size)
            .await?;

        let mut codes: Vec<i64> = summaries
            .iter()
            .map(|s| s.code)
            .filter(|code| checkpoint.admits(*code))
            .collect();
        codes.sort_unstable();
        codes.dedup();

        if codes.is_empty() {
            debug!(checkpoint = checkpoint.value(), "No new invoices");
            return Ok(report);
        }

        info!(count = codes.len(), checkpoint = checkpoint.value(), "Found new invoices");
        report.discovered = codes.clone();

        for code in codes {
            if self.shutdown_requested() {
                report.interrupted = true;
                break;
            }

            match self.process(code).await {
                Ok(()) => {
                    self.attempts.remove(&code);
                    report.forwarded.push(code);
                    self.request_artifact(code);
                    report.checkpoint.advance_to(code);
                }
                Err(e) => {
                    report.failed.push(code);

                    match self.settings.policy {
                        FailurePolicy::Advance => {
                            report.checkpoint.advance_to(code);
                        }
                        FailurePolicy::Retry { max_attempts } => {
                            let attempts = self.attempts.entry(code).or_insert(0);
                            *attempts += 1;

                            if *attempts >= max_attempts {
                                error!(code, attempts = *attempts, last_error = %e, "Giving up on invoice, dead-lettered");
                                self.attempts.remove(&code);
                                report.dead_lettered.push(code);
                                report.checkpoint.advance_to(code);
                            } else {
                                warn!(code, attempt = *attempts, max_attempts, "Invoice will be retried next cycle");
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!(
            from = report.started_at.value(),
            to = report.checkpoint.value(),
            forwarded = report.forwarded.len(),
            failed = report.failed.len(),
            "Poll cycle complete"
        );
        Ok(report)
    }

    /// Hydrates and forwards one invoice.
    async fn process(&self, code: i64) -> SyncResult<()> {
        let invoice = self.hydrator.hydrate(code).await.map_err(|e| {
            error!(?e, code, "Failed to hydrate invoice");
            e
        })?;

        self.forwarder.forward(&invoice).await.map_err(|e| {
            error!(?e, code, retryable = e.is_retryable(), "Failed to forward invoice");
            e
        })?;

        info!(code, lines = invoice.lines.len(), "Invoice forwarded");
        Ok(())
    }

    fn request_artifact(&self, code: i64) {
        if let Some(artifacts) = &self.artifacts {
            if let Err(e) = artifacts.submit(code) {
                warn!(?e, code, "Artifact not queued");
            }
        }
    }

    /// Non-blocking check for a pending shutdown. A dropped handle counts.
    fn shutdown_requested(&mut self) -> bool {
        if !self.stopping {
            match self.shutdown_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => self.stopping = true,
                Err(TryRecvError::Empty) => {}
            }
        }
        self.stopping
    }

    async fn starting_checkpoint(&self) -> Checkpoint {
        match self.store.load().await {
            Ok(Some(stored)) => {
                info!(checkpoint = stored.value(), "Resuming from stored checkpoint");
                stored
            }
            Ok(None) => self.settings.initial,
            Err(e) => {
                error!(?e, "Failed to load checkpoint, starting from initial value");
                self.settings.initial
            }
        }
    }

    async fn persist(&self, checkpoint: Checkpoint) {
        if let Err(e) = self.store.save(checkpoint).await {
            error!(?e, checkpoint = checkpoint.value(), "Failed to persist checkpoint");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
