// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`CompositeSink`] and writes one line per
//! event to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use stratum_core::geom::IntRect;
use stratum_core::layer::LayerId;
use stratum_core::trace::{
    CompositeSink, FrameBeginEvent, FrameEndEvent, LayerSkippedEvent, SurfaceEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its destination.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

struct Rect(IntRect);

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let r = self.0;
        write!(f, "{},{} {}x{}", r.x, r.y, r.width, r.height)
    }
}

struct Layer(LayerId);

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.0.index(), self.0.generation())
    }
}

impl<W: Write> CompositeSink for PrettyPrintSink<W> {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[frame:begin] frame={} viewport={}",
            e.frame_index,
            Rect(e.viewport),
        );
    }

    fn on_surface(&mut self, e: &SurfaceEvent) {
        let _ = writeln!(
            self.writer,
            "[surface] frame={} layer={} rect={} init={:?}",
            e.frame_index,
            Layer(e.layer),
            Rect(e.rect),
            e.mode,
        );
    }

    fn on_layer_skipped(&mut self, e: &LayerSkippedEvent) {
        let _ = writeln!(
            self.writer,
            "[skip] frame={} layer={} reason={:?}",
            e.frame_index,
            Layer(e.layer),
            e.reason,
        );
    }

    fn on_frame_end(&mut self, e: &FrameEndEvent) {
        let _ = writeln!(
            self.writer,
            "[frame:end] frame={} draws={} surfaces={} skipped={}",
            e.frame_index, e.draws, e.surfaces, e.skipped,
        );
    }
}
