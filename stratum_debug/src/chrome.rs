// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//! Each pass becomes a `Composite` duration slice; surfaces and skipped
//! layers are instant events inside it.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// # Errors
///
/// Whatever `writer` reports.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let events: Vec<Value> = decode(bytes)
        .map(|recorded| {
            let ts = recorded.at_nanos as f64 / 1000.0;
            let frame_index = recorded.frame_index;
            match recorded.event {
                RecordedEvent::FrameBegin { viewport } => json!({
                    "ph": "B",
                    "name": "Composite",
                    "cat": "Frame",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": frame_index,
                        "viewport": [viewport.x, viewport.y, viewport.width, viewport.height],
                    }
                }),
                RecordedEvent::Surface { layer, rect, mode } => json!({
                    "ph": "i",
                    "name": "Surface",
                    "cat": "Surface",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": frame_index,
                        "layer": layer.index,
                        "generation": layer.generation,
                        "rect": [rect.x, rect.y, rect.width, rect.height],
                        "init": format!("{mode:?}"),
                    }
                }),
                RecordedEvent::LayerSkipped { layer, reason } => json!({
                    "ph": "i",
                    "name": "LayerSkipped",
                    "cat": "Layer",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": frame_index,
                        "layer": layer.index,
                        "generation": layer.generation,
                        "reason": format!("{reason:?}"),
                    }
                }),
                RecordedEvent::FrameEnd {
                    draws,
                    surfaces,
                    skipped,
                } => json!({
                    "ph": "E",
                    "name": "Composite",
                    "cat": "Frame",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": frame_index,
                        "draws": draws,
                        "surfaces": surfaces,
                        "skipped": skipped,
                    }
                }),
            }
        })
        .collect();

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}
