//! Configuration for the weaver.

use crate::{
    model::CodeModel,
    weaver::{optout::DEFAULT_OPT_OUT_MARKER, references},
};

/// Configuration of a [`crate::weaver::Weaver`].
///
/// The defaults describe the stock tracker runtime: a `DisposeTrack` scope containing
/// `DisposeTrack.DisposeTracker` with static `Register(System.Object)` and
/// `Unregister(System.Object)` entry points, opted out through
/// `DisposeTrack.DoNotTrackAttribute`.
#[derive(Debug, Clone)]
pub struct WeaverConfig {
    /// The module providing the tracker type (default: the built-in runtime module).
    pub runtime: CodeModel,

    /// Full name of the tracker type inside `runtime`.
    pub tracker_type: String,

    /// Full name of the attribute that opts types out of tracking.
    pub opt_out_marker: String,

    /// Method names recognized as dispose methods.
    pub dispose_method_names: Vec<String>,

    /// Scope names accepted as the core library defining `System.Object`.
    pub core_libraries: Vec<String>,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            runtime: references::runtime_module(),
            tracker_type: references::TRACKER_TYPE.to_string(),
            opt_out_marker: DEFAULT_OPT_OUT_MARKER.to_string(),
            dispose_method_names: vec![
                "Dispose".to_string(),
                "System.IDisposable.Dispose".to_string(),
                "IDisposable.Dispose".to_string(),
            ],
            core_libraries: vec![
                "mscorlib".to_string(),
                "System.Runtime".to_string(),
                "System.Private.CoreLib".to_string(),
                "netstandard".to_string(),
            ],
        }
    }
}

impl WeaverConfig {
    /// Replaces the runtime module and the name of the tracker type inside it.
    #[must_use]
    pub fn with_runtime(mut self, runtime: CodeModel, tracker_type: impl Into<String>) -> Self {
        self.runtime = runtime;
        self.tracker_type = tracker_type.into();
        self
    }

    /// Replaces the opt-out marker.
    #[must_use]
    pub fn with_opt_out_marker(mut self, marker: impl Into<String>) -> Self {
        self.opt_out_marker = marker.into();
        self
    }

    /// Returns `true` if `name` is a dispose method name.
    #[must_use]
    pub fn is_dispose_name(&self, name: &str) -> bool {
        self.dispose_method_names.iter().any(|n| n == name)
    }
}
