//! Runtime leak registry.
//!
//! Instrumented constructors register `this`, instrumented dispose methods unregister it.
//! Whatever is still registered when the registry dumps is an object somebody forgot to
//! dispose.
//!
//! # Key Components
//!
//! - [`DisposeRegistry`] - Thread-safe identity registry with per-type numbering
//! - [`ObjectIdentity`] - Weak, non-owning identity of a tracked object
//! - [`OutputConfig`], [`OutputKind`] - What is printed, and where
//! - [`LineSink`] and the provided sinks - Output destinations
//! - [`global()`] and the free functions - The process-wide registry
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use disposetrack::tracker::{BufferSink, DisposeRegistry, ObjectIdentity, OutputKind};
//!
//! struct Socket;
//!
//! let output = BufferSink::new();
//! let registry = DisposeRegistry::new();
//! registry.set_sink(Arc::new(output.clone()));
//! registry.set_output_kind(OutputKind::DUMP);
//!
//! let socket = Arc::new(Socket);
//! registry.register(&ObjectIdentity::with_type_name(&socket, "Net.Socket"));
//! registry.dump();
//!
//! assert_eq!(output.contents(), "**** Undisposed Object Dump:\n\tNet.Socket: 1\n");
//! ```

mod config;
mod global;
mod identity;
mod registry;
mod report;
mod sink;
mod trace;

pub use config::{OutputConfig, OutputKind};
pub use global::{
    dump, global, register, reset, set_output_kind, set_sink, set_track_creation_trace,
    unregister,
};
pub use identity::ObjectIdentity;
pub use registry::DisposeRegistry;
pub use report::DUMP_HEADER;
pub use sink::{BufferSink, LineSink, LogSink, StdoutSink};
pub use trace::capture as capture_trace;
