// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Execution timeline of scheduled tasks, written as SVG.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::thread::ThreadId;

use crate::core::error::Result;
use crate::core::time::Time;

const LINE_HEIGHT: i64 = 20;
const SEC_WIDTH: i64 = 10_000;
const LEFT_MARGIN: i64 = 40;

/// One executed task.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub name: String,
    pub thread: usize,
    /// Start relative to the beginning of the trace.
    pub start: Time,
    pub duration: Time,
}

pub(crate) struct TraceRecorder {
    path: PathBuf,
    origin: Time,
    threads: HashMap<ThreadId, usize>,
    events: Vec<TraceEvent>,
}

impl TraceRecorder {
    pub(crate) fn new(path: &Path, origin: Time) -> Self {
        Self {
            path: path.to_path_buf(),
            origin,
            threads: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub(crate) fn record(&mut self, name: &str, thread: ThreadId, start: Time, end: Time) {
        let next_row = self.threads.len();
        let row = *self.threads.entry(thread).or_insert(next_row);
        self.events.push(TraceEvent {
            name: name.to_string(),
            thread: row,
            start: start - self.origin,
            duration: end - start,
        });
    }

    pub(crate) fn render_svg(&self) -> String {
        let rows = self.threads.len().max(1) as i64;
        let trace_width = self
            .events
            .iter()
            .map(|e| x_of(e.start) + width_of(e.duration))
            .max()
            .unwrap_or(LEFT_MARGIN);
        let width = trace_width + SEC_WIDTH / 10;
        let height = rows * LINE_HEIGHT;

        let mut svg = String::new();
        let _ = writeln!(svg, r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#);
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{}" height="{}">"#,
            width, height
        );

        for row in 0..rows {
            let _ = writeln!(
                svg,
                r#"<text x="2" y="{}" font-size="10">T{}</text>"#,
                row * LINE_HEIGHT + 14,
                row
            );
        }

        for event in &self.events {
            let x = x_of(event.start);
            let y = event.thread as i64 * LINE_HEIGHT;
            let w = width_of(event.duration);
            let _ = writeln!(
                svg,
                r##"<rect x="{}" y="{}" width="{}" height="{}" fill="#8fb8de" stroke="#2a4d69" stroke-width="0.5"/>"##,
                x,
                y + 1,
                w,
                LINE_HEIGHT - 2
            );
            let _ = writeln!(
                svg,
                r#"<text x="{}" y="{}" font-size="8">{} us {}</text>"#,
                x + 1,
                y + 13,
                event.duration.to_usec(),
                escape(&event.name)
            );
        }

        svg.push_str("</svg>\n");
        svg
    }

    pub(crate) fn finish(self) -> Result<PathBuf> {
        std::fs::write(&self.path, self.render_svg())?;
        tracing::info!(
            "Scheduler trace with {} tasks written to {}",
            self.events.len(),
            self.path.display()
        );
        Ok(self.path)
    }
}

fn x_of(start: Time) -> i64 {
    start.to_usec() * SEC_WIDTH / 1_000_000 + LEFT_MARGIN
}

fn width_of(duration: Time) -> i64 {
    (duration.to_usec() * SEC_WIDTH / 1_000_000).max(1)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_thread() {
        let mut rec = TraceRecorder::new(Path::new("unused.svg"), Time::from_msec(1000));
        let here = std::thread::current().id();
        let other = std::thread::spawn(|| std::thread::current().id()).join().unwrap();

        rec.record("decode", here, Time::from_msec(1000), Time::from_msec(1002));
        rec.record("encode", other, Time::from_msec(1001), Time::from_msec(1005));
        rec.record("decode", here, Time::from_msec(1003), Time::from_msec(1004));

        let events = rec.events();
        assert_eq!(events[0].thread, 0);
        assert_eq!(events[1].thread, 1);
        assert_eq!(events[2].thread, 0);
        assert_eq!(events[1].start, Time::from_msec(1));
        assert_eq!(events[1].duration, Time::from_msec(4));
    }

    #[test]
    fn test_svg_layout() {
        let mut rec = TraceRecorder::new(Path::new("unused.svg"), Time::NULL);
        let here = std::thread::current().id();
        rec.record("a<b>", here, Time::from_msec(100), Time::from_msec(150));

        let svg = rec.render_svg();
        assert!(svg.starts_with("<?xml"));
        // 100 ms at 10000 px/s plus the margin.
        assert!(svg.contains(r#"<rect x="1040" y="1" width="500""#));
        assert!(svg.contains("50000 us a&lt;b&gt;"));
        assert!(svg.contains(r#"width="2540" height="20""#));
        assert!(svg.trim_end().ends_with("</svg>"));
    }
}
