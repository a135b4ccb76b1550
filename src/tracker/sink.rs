//! Destinations for tracker output lines.
//!
//! Every line the registry produces (creation and disposal notices, anomalies and dumps)
//! is handed to a [`LineSink`] one line at a time. The sink is part of the
//! [`crate::tracker::OutputConfig`] and can be swapped at any time.
//!
//! # Provided Sinks
//!
//! - [`StdoutSink`] - prints to standard output (the default)
//! - [`LogSink`] - forwards to the `log` facade at `info` level
//! - [`BufferSink`] - collects lines in a shared in-memory buffer
//! - any `Fn(&str) + Send + Sync` closure

use std::sync::{Arc, Mutex};

/// A destination for output lines.
///
/// # Thread Safety
///
/// Sinks are shared between threads and are called while the registry lock is held, so
/// an implementation must not call back into the registry.
pub trait LineSink: Send + Sync {
    /// Writes one line; the sink appends the line terminator.
    fn write_line(&self, line: &str);
}

impl<F> LineSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn write_line(&self, line: &str) {
        self(line);
    }
}

/// Writes lines to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn write_line(&self, line: &str) {
        println!("{line}");
    }
}

/// Forwards lines to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl LineSink for LogSink {
    fn write_line(&self, line: &str) {
        log::info!(target: "disposetrack", "{line}");
    }
}

/// Collects lines into a shared string buffer.
///
/// Clones share the same buffer, so one handle can be installed as the sink while another
/// one reads the collected output.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use disposetrack::tracker::{BufferSink, LineSink};
///
/// let buffer = BufferSink::new();
/// let sink: Arc<dyn LineSink> = Arc::new(buffer.clone());
/// sink.write_line("first");
/// sink.write_line("second");
/// assert_eq!(buffer.contents(), "first\nsecond\n");
/// ```
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    buffer: Arc<Mutex<String>>,
}

impl BufferSink {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything written so far.
    #[must_use]
    pub fn contents(&self) -> String {
        lock!(self.buffer).clone()
    }

    /// Returns everything written so far and empties the buffer.
    #[must_use]
    pub fn take(&self) -> String {
        std::mem::take(&mut *lock!(self.buffer))
    }

    /// Empties the buffer.
    pub fn clear(&self) {
        lock!(self.buffer).clear();
    }
}

impl LineSink for BufferSink {
    fn write_line(&self, line: &str) {
        let mut buffer = lock!(self.buffer);
        buffer.push_str(line);
        buffer.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_sink_take_and_clear() {
        let sink = BufferSink::new();
        sink.write_line("a");
        assert_eq!(sink.take(), "a\n");
        assert_eq!(sink.contents(), "");

        sink.write_line("b");
        sink.clear();
        assert_eq!(sink.contents(), "");
    }

    #[test]
    fn test_closure_sink() {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let target = collected.clone();
        let sink: Arc<dyn LineSink> = Arc::new(move |line: &str| {
            target.lock().unwrap().push(line.to_string());
        });

        sink.write_line("*** Creating Ns.Type 1");
        assert_eq!(*collected.lock().unwrap(), vec!["*** Creating Ns.Type 1"]);
    }
}
