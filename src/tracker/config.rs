use std::{fmt, sync::Arc};

use bitflags::bitflags;

use crate::tracker::{LineSink, StdoutSink};

bitflags! {
    /// Which kinds of tracker output are produced.
    ///
    /// `REGISTRATION` covers the per-object `*** Creating` and `*** Disposing` lines, `DUMP`
    /// covers the undisposed object dump. Anomaly lines are always written.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputKind: u32 {
        /// No output besides anomalies
        const NONE = 0;
        /// Creation and disposal lines
        const REGISTRATION = 0x1;
        /// Undisposed object dumps
        const DUMP = 0x2;
    }
}

impl Default for OutputKind {
    fn default() -> Self {
        OutputKind::REGISTRATION | OutputKind::DUMP
    }
}

/// Output configuration of a [`crate::tracker::DisposeRegistry`].
///
/// Defaults: both output kinds on, no creation traces, lines go to standard output.
#[derive(Clone)]
pub struct OutputConfig {
    /// Enabled output channels
    pub kind: OutputKind,
    /// Capture a stack trace for every registration and print it in dumps
    pub track_creation_trace: bool,
    /// Destination of all output lines
    pub sink: Arc<dyn LineSink>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            kind: OutputKind::default(),
            track_creation_trace: false,
            sink: Arc::new(StdoutSink),
        }
    }
}

impl fmt::Debug for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputConfig")
            .field("kind", &self.kind)
            .field("track_creation_trace", &self.track_creation_trace)
            .finish_non_exhaustive()
    }
}
