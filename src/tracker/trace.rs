//! Creation stack traces.

use std::backtrace::Backtrace;

/// Captures the current call stack as text, one line per frame line.
///
/// Frames belonging to the capture machinery and to the tracker itself are removed, so
/// the first remaining frame is the code that registered the object.
#[must_use]
pub fn capture() -> String {
    let rendered = Backtrace::force_capture().to_string();
    strip_tracker_frames(&rendered)
}

/// Removes the leading frames of `rendered` that belong to backtrace capture or to the
/// tracker module.
pub(crate) fn strip_tracker_frames(rendered: &str) -> String {
    let frames = split_frames(rendered);
    let first_caller = frames
        .iter()
        .position(|frame| !is_tracker_frame(frame))
        .unwrap_or(frames.len());

    frames[first_caller..]
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_tracker_frame(frame: &[&str]) -> bool {
    frame.first().is_some_and(|header| {
        header.contains("std::backtrace")
            || header.contains("disposetrack::tracker::")
            || header.contains("__rust_begin_short_backtrace")
    })
}

// A frame starts with a `<index>: <symbol>` line, followed by `at <file>:<line>` lines.
fn split_frames(rendered: &str) -> Vec<Vec<&str>> {
    let mut frames: Vec<Vec<&str>> = Vec::new();
    for line in rendered.lines() {
        let trimmed = line.trim_start();
        let starts_frame = trimmed
            .split_once(':')
            .is_some_and(|(index, _)| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()));

        match frames.last_mut() {
            Some(frame) if !starts_frame => frame.push(line),
            _ => frames.push(vec![line]),
        }
    }
    frames
}
