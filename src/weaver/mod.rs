//! The instrumentation pass.
//!
//! The weaver rewrites a [`crate::CodeModel`] so that every disposable object registers
//! itself with the tracker at construction and unregisters when disposed.
//!
//! # Architecture
//!
//! ```text
//! WeaverConfig ──► references ─► EntryPoints + core library     (lookups only)
//!                       │
//! CodeModel ────► classifier ──► delegation ─► [Candidate]       (lookups only)
//!                       │
//!                       ▼
//!                 engine: import references, patch bodies      (mutation)
//!                       │
//!                       ▼
//!                 cleanup: strip opt-out markers ─► WeaveStats
//! ```
//!
//! # Key Components
//!
//! - [`Weaver`] - Runs the pass
//! - [`WeaverConfig`] - Runtime module, tracker type, opt-out marker, method names
//! - [`WeaverLog`] - Info/warning/error callbacks
//! - [`Candidate`] - One type selected for instrumentation
//! - [`WeaveStats`] - What a pass changed

mod cleanup;
mod config;
mod engine;
mod log;
mod stats;

pub mod classifier;
pub mod delegation;
pub mod optout;
pub mod references;

pub use classifier::Candidate;
pub use cleanup::clean_references;
pub use config::WeaverConfig;
pub use engine::Weaver;
pub use log::WeaverLog;
pub use optout::{OptOut, DEFAULT_OPT_OUT_MARKER};
pub use stats::WeaveStats;
