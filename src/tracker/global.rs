//! Process-wide default registry.
//!
//! Instrumented code calls static entry points, so a process needs one well-known registry.
//! These functions forward to [`global()`]; all logic lives in [`DisposeRegistry`].

use std::{
    any::Any,
    sync::{Arc, LazyLock},
};

use log::debug;

use crate::tracker::{DisposeRegistry, LineSink, ObjectIdentity, OutputKind};

static GLOBAL: LazyLock<DisposeRegistry> = LazyLock::new(|| {
    debug!("Process-wide dispose registry initialized");
    DisposeRegistry::new()
});

/// The process-wide registry.
#[must_use]
pub fn global() -> &'static DisposeRegistry {
    &GLOBAL
}

/// Registers `object` with the process-wide registry under its Rust type name.
pub fn register<T: Any + Send + Sync>(object: &Arc<T>) {
    global().register(&ObjectIdentity::of(object));
}

/// Unregisters `object` from the process-wide registry and dumps.
pub fn unregister<T: Any + Send + Sync>(object: &Arc<T>) {
    global().unregister(&ObjectIdentity::of(object));
}

/// Dumps the undisposed objects of the process-wide registry.
pub fn dump() {
    global().dump();
}

/// Resets the process-wide registry.
pub fn reset() {
    global().reset();
}

/// Sets the output channels of the process-wide registry.
pub fn set_output_kind(kind: OutputKind) {
    global().set_output_kind(kind);
}

/// Sets the sink of the process-wide registry.
pub fn set_sink(sink: Arc<dyn LineSink>) {
    global().set_sink(sink);
}

/// Enables or disables creation traces for the process-wide registry.
pub fn set_track_creation_trace(enabled: bool) {
    global().set_track_creation_trace(enabled);
}
