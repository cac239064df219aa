//! # facturapid-sync: Invoice Synchronization Engine
//!
//! Polls the point-of-sale store for newly printed QR-channel invoices,
//! forwards each one to the receiving side and renders a QR reference for
//! every invoice that got through.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Synchronizer Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    Poller (main loop, one task)                  │  │
//! │  │                                                                  │  │
//! │  │  tick ─► run_cycle(checkpoint) ─► CycleReport ─► store.save()   │  │
//! │  └─────┬──────────────────┬───────────────────┬─────────────────────┘  │
//! │        ▼                  ▼                   ▼                        │
//! │  ┌────────────────┐ ┌────────────────┐ ┌────────────────────────┐     │
//! │  │ InvoiceSource  │ │   Hydrator     │ │      Forwarder         │     │
//! │  │                │ │                │ │                        │     │
//! │  │ SqliteSource   │ │ header + lines │ │ HttpForwarder (POST)   │     │
//! │  │ (read only)    │ │ sorted, valid. │ │ RepositoryForwarder    │     │
//! │  └────────────────┘ └────────────────┘ └───────────┬────────────┘     │
//! │                                                    │ ok                │
//! │                                                    ▼                   │
//! │                                  ┌──────────────────────────────────┐  │
//! │                                  │ ArtifactWorker (own task)        │  │
//! │                                  │ qrcodes/invoice_{id}.png         │  │
//! │                                  └──────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delivery Semantics
//!
//! At-least-once. A restart without a checkpoint file forwards everything
//! again; the receiving store ignores what it already has.
//!
//! ## Modules
//!
//! - [`config`] - `sync.toml` + `FACTURAPID_*` environment
//! - [`checkpoint`] - watermark value and its stores
//! - [`source`] - operational store reader
//! - [`mapping`] - lenient column parsing
//! - [`hydrator`] - header + lines assembly
//! - [`forwarder`] - HTTP and local delivery
//! - [`artifact`] - QR generation worker
//! - [`poller`] - the loop
//! - [`error`] - sync error types

pub mod artifact;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod hydrator;
pub mod mapping;
pub mod poller;
pub mod source;

pub use artifact::{ArtifactHandle, ArtifactReport, ArtifactWorker, QrArtifactGenerator};
pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use config::{FailureMode, FailurePolicy, ForwardMode, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use forwarder::{Forwarder, HttpForwarder, RepositoryForwarder};
pub use hydrator::Hydrator;
pub use poller::{CycleReport, Poller, PollerHandle, PollerSettings};
pub use source::{InvoiceSource, SqliteSource};
