// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instrumentation for the composition pass.
//!
//! This module provides a [`CompositeSink`] trait with per-event methods that
//! the composition pass calls at each stage. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn CompositeSink`. When the `trace`
//! feature is **off**, every `Tracer` method compiles to nothing (zero
//! overhead). When **on**, each method performs a single `Option` branch
//! before dispatching.
//!
//! [`DumpHook`] is separate from the sink: it receives pixels, not events,
//! and is only consulted when
//! [`CompositorConfig::dump_surfaces`](crate::config::CompositorConfig::dump_surfaces)
//! is set.
//!
//! # Crate features
//!
//! - `trace` enables the `Tracer` method bodies (one branch per call).

use alloc::boxed::Box;

use crate::backend::{SurfaceInitMode, SurfaceSnapshot};
use crate::composite::SkipReason;
use crate::geom::IntRect;
use crate::layer::LayerId;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted before the first draw of a pass.
#[derive(Clone, Copy, Debug)]
pub struct FrameBeginEvent {
    /// Monotonic pass counter.
    pub frame_index: u64,
    /// Frame-buffer viewport.
    pub viewport: IntRect,
}

/// Emitted when a container allocates an intermediate surface.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceEvent {
    /// Pass counter.
    pub frame_index: u64,
    /// Container that owns the surface.
    pub layer: LayerId,
    /// Surface rectangle in the previous target's pixel space.
    pub rect: IntRect,
    /// How the surface was seeded.
    pub mode: SurfaceInitMode,
}

/// Emitted when a layer is left out of a pass.
#[derive(Clone, Copy, Debug)]
pub struct LayerSkippedEvent {
    /// Pass counter.
    pub frame_index: u64,
    /// Skipped layer.
    pub layer: LayerId,
    /// Why.
    pub reason: SkipReason,
}

/// Emitted after the last draw of a pass.
#[derive(Clone, Copy, Debug)]
pub struct FrameEndEvent {
    /// Pass counter.
    pub frame_index: u64,
    /// Quads issued.
    pub draws: usize,
    /// Intermediate surfaces allocated.
    pub surfaces: usize,
    /// Layers skipped.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// CompositeSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the composition pass.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait CompositeSink {
    /// Called when a pass starts.
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        _ = e;
    }

    /// Called when a container allocates a surface.
    fn on_surface(&mut self, e: &SurfaceEvent) {
        _ = e;
    }

    /// Called when a layer is skipped.
    fn on_layer_skipped(&mut self, e: &LayerSkippedEvent) {
        _ = e;
    }

    /// Called when a pass ends.
    fn on_frame_end(&mut self, e: &FrameEndEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`CompositeSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl CompositeSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`CompositeSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn CompositeSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn CompositeSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl Default for Tracer<'_> {
    fn default() -> Self {
        Self::none()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn CompositeSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`FrameBeginEvent`].
    #[inline]
    pub fn frame_begin(&mut self, e: &FrameBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_frame_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SurfaceEvent`].
    #[inline]
    pub fn surface(&mut self, e: &SurfaceEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_surface(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`LayerSkippedEvent`].
    #[inline]
    pub fn layer_skipped(&mut self, e: &LayerSkippedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_layer_skipped(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameEndEvent`].
    #[inline]
    pub fn frame_end(&mut self, e: &FrameEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_frame_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// DumpHook
// ---------------------------------------------------------------------------

/// Error type returned by a [`DumpHook`].
pub type DumpResult = Result<(), Box<dyn core::error::Error + Send + Sync>>;

/// Receives the contents of intermediate surfaces for offline inspection.
///
/// Called once per surface-backed container, after its children have been
/// drawn into the surface and before the surface is composited into its
/// parent. Errors are logged by the pass and never change its output.
pub trait DumpHook {
    /// Stores one surface snapshot.
    ///
    /// # Errors
    ///
    /// Whatever the hook's storage reports; the pass logs and continues.
    fn dump_surface(&mut self, layer: LayerId, snapshot: &SurfaceSnapshot) -> DumpResult;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_frame_begin(&FrameBeginEvent {
            frame_index: 0,
            viewport: IntRect::new(0, 0, 10, 10),
        });
        sink.on_frame_end(&FrameEndEvent {
            frame_index: 0,
            draws: 0,
            surfaces: 0,
            skipped: 0,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.frame_begin(&FrameBeginEvent {
            frame_index: 3,
            viewport: IntRect::default(),
        });
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            frames: Vec<u64>,
        }
        impl CompositeSink for RecordingSink {
            fn on_frame_end(&mut self, e: &FrameEndEvent) {
                self.frames.push(e.frame_index);
            }
        }

        let mut sink = RecordingSink { frames: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.frame_end(&FrameEndEvent {
            frame_index: 42,
            draws: 1,
            surfaces: 0,
            skipped: 0,
        });
        // Access sink after tracer is dropped.
        drop(tracer);
        assert_eq!(sink.frames, &[42]);
    }
}
