use std::fmt;

type Callback = Box<dyn Fn(&str) + Send + Sync>;

/// Progress and diagnostic callbacks of a weaving pass.
///
/// Hosts that embed the weaver (build tools, test harnesses) usually want the messages in
/// their own channel. By default every callback forwards to the `log` facade.
///
/// # Examples
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use disposetrack::weaver::WeaverLog;
///
/// let infos = Arc::new(Mutex::new(Vec::new()));
/// let sink = infos.clone();
/// let log = WeaverLog::default().on_info(move |m| sink.lock().unwrap().push(m.to_string()));
///
/// log.info("Patching class Library.Widget");
/// assert_eq!(infos.lock().unwrap().len(), 1);
/// ```
pub struct WeaverLog {
    info: Callback,
    warning: Callback,
    error: Callback,
}

impl WeaverLog {
    /// A log that discards every message.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            info: Box::new(|_| {}),
            warning: Box::new(|_| {}),
            error: Box::new(|_| {}),
        }
    }

    /// Replaces the info callback.
    #[must_use]
    pub fn on_info(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.info = Box::new(callback);
        self
    }

    /// Replaces the warning callback.
    #[must_use]
    pub fn on_warning(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.warning = Box::new(callback);
        self
    }

    /// Replaces the error callback.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.error = Box::new(callback);
        self
    }

    /// Reports progress.
    pub fn info(&self, message: &str) {
        (self.info)(message);
    }

    /// Reports a condition that does not stop the pass.
    pub fn warning(&self, message: &str) {
        (self.warning)(message);
    }

    /// Reports a failure of the pass.
    pub fn error(&self, message: &str) {
        (self.error)(message);
    }
}

impl Default for WeaverLog {
    fn default() -> Self {
        Self {
            info: Box::new(|m| log::info!("{m}")),
            warning: Box::new(|m| log::warn!("{m}")),
            error: Box::new(|m| log::error!("{m}")),
        }
    }
}

impl fmt::Debug for WeaverLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeaverLog").finish_non_exhaustive()
    }
}
