//! rollupindex-sync — the windowed sync engine.
//!
//! # Architecture
//!
//! ```text
//! SyncEngine::run (one task per layer)
//!    ├── probe: refetch hash of the block below the window   ─┐
//!    │     mismatch → rollback to the highest checkpoint      │ per
//!    ├── fetch: events for [start, end] from the chain client │ window
//!    ├── apply: domain stores onto one overlay writer         │
//!    └── commit: checkpoint + cursors + delta, atomically    ─┘
//! ```
//!
//! Windows are bounded (at most 1024 blocks), applied in a fixed order,
//! and committed as a single batch; a failed window leaves no trace and is
//! retried after a fixed interval.

pub mod checkpoint;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;

pub use checkpoint::{record_window, rollback};
pub use client::{BlockHeader, L1Client, L1Events, L2Client, L2Events};
pub use config::SyncConfig;
pub use engine::{calc_end_block, SyncEngine, SyncStatus};
pub use error::SyncError;
