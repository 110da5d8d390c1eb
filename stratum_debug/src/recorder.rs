// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`CompositeSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records, each stamped with the
//! nanoseconds elapsed since the recorder was created. [`decode`] reads
//! them back as an iterator of [`Recorded`] events.
//!
//! Layers are stored as their slot index and generation; a decoded
//! [`LayerRef`] identifies a layer for display but cannot address a store.

use std::time::Instant;

use stratum_core::backend::SurfaceInitMode;
use stratum_core::composite::SkipReason;
use stratum_core::geom::IntRect;
use stratum_core::layer::LayerId;
use stratum_core::trace::{
    CompositeSink, FrameBeginEvent, FrameEndEvent, LayerSkippedEvent, SurfaceEvent,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_FRAME_BEGIN: u8 = 1;
const TAG_SURFACE: u8 = 2;
const TAG_LAYER_SKIPPED: u8 = 3;
const TAG_FRAME_END: u8 = 4;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`CompositeSink`] that encodes events into a compact binary buffer.
#[derive(Debug)]
pub struct RecorderSink {
    buf: Vec<u8>,
    start: Instant,
}

impl Default for RecorderSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderSink {
    /// Creates an empty recorder; timestamps count from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            start: Instant::now(),
        }
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Drops everything recorded so far.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    // -- encoding helpers --------------------------------------------------

    fn header(&mut self, tag: u8, frame_index: u64) {
        let nanos = u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.write_u8(tag);
        self.write_u64(nanos);
        self.write_u64(frame_index);
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_count(&mut self, v: usize) {
        self.write_u32(u32::try_from(v).unwrap_or(u32::MAX));
    }

    fn write_rect(&mut self, r: IntRect) {
        self.buf.extend_from_slice(&r.x.to_le_bytes());
        self.buf.extend_from_slice(&r.y.to_le_bytes());
        self.write_u32(r.width);
        self.write_u32(r.height);
    }

    fn write_layer(&mut self, layer: LayerId) {
        self.write_u32(layer.index());
        self.write_u32(layer.generation());
    }
}

fn mode_code(mode: SurfaceInitMode) -> u8 {
    match mode {
        SurfaceInitMode::Clear => 0,
        SurfaceInitMode::CopyFromPrevious => 1,
        SurfaceInitMode::None => 2,
    }
}

fn reason_code(reason: SkipReason) -> u8 {
    match reason {
        SkipReason::EmptyVisibleRegion => 0,
        SkipReason::EmptyScissor => 1,
        SkipReason::Hidden => 2,
        SkipReason::AsyncNotReady => 3,
        SkipReason::SurfaceAllocationFailed => 4,
        SkipReason::NothingToDraw => 5,
    }
}

impl CompositeSink for RecorderSink {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        self.header(TAG_FRAME_BEGIN, e.frame_index);
        self.write_rect(e.viewport);
    }

    fn on_surface(&mut self, e: &SurfaceEvent) {
        self.header(TAG_SURFACE, e.frame_index);
        self.write_layer(e.layer);
        self.write_rect(e.rect);
        self.write_u8(mode_code(e.mode));
    }

    fn on_layer_skipped(&mut self, e: &LayerSkippedEvent) {
        self.header(TAG_LAYER_SKIPPED, e.frame_index);
        self.write_layer(e.layer);
        self.write_u8(reason_code(e.reason));
    }

    fn on_frame_end(&mut self, e: &FrameEndEvent) {
        self.header(TAG_FRAME_END, e.frame_index);
        self.write_count(e.draws);
        self.write_count(e.surfaces);
        self.write_count(e.skipped);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A layer as it appeared in a recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerRef {
    /// Slot index.
    pub index: u32,
    /// Generation of the slot when the event fired.
    pub generation: u32,
}

impl From<LayerId> for LayerRef {
    fn from(id: LayerId) -> Self {
        Self {
            index: id.index(),
            generation: id.generation(),
        }
    }
}

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    /// A [`FrameBeginEvent`].
    FrameBegin {
        /// Frame-buffer viewport.
        viewport: IntRect,
    },
    /// A [`SurfaceEvent`].
    Surface {
        /// Owning container.
        layer: LayerRef,
        /// Surface rectangle.
        rect: IntRect,
        /// Seeding.
        mode: SurfaceInitMode,
    },
    /// A [`LayerSkippedEvent`].
    LayerSkipped {
        /// Skipped layer.
        layer: LayerRef,
        /// Why.
        reason: SkipReason,
    },
    /// A [`FrameEndEvent`].
    FrameEnd {
        /// Quads issued.
        draws: u32,
        /// Surfaces allocated.
        surfaces: u32,
        /// Layers skipped.
        skipped: u32,
    },
}

/// One decoded record.
#[derive(Clone, Debug, PartialEq)]
pub struct Recorded {
    /// Nanoseconds since the recorder was created.
    pub at_nanos: u64,
    /// Pass counter.
    pub frame_index: u64,
    /// The event.
    pub event: RecordedEvent,
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`Recorded`] events.
///
/// Decoding stops at the first truncated record or unknown tag.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?;
        self.pos += N;
        bytes.try_into().ok()
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_i32(&mut self) -> Option<i32> {
        self.take().map(i32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_rect(&mut self) -> Option<IntRect> {
        Some(IntRect::new(
            self.read_i32()?,
            self.read_i32()?,
            self.read_u32()?,
            self.read_u32()?,
        ))
    }

    fn read_layer(&mut self) -> Option<LayerRef> {
        Some(LayerRef {
            index: self.read_u32()?,
            generation: self.read_u32()?,
        })
    }

    fn read_mode(&mut self) -> Option<SurfaceInitMode> {
        Some(match self.read_u8()? {
            0 => SurfaceInitMode::Clear,
            1 => SurfaceInitMode::CopyFromPrevious,
            2 => SurfaceInitMode::None,
            _ => return None,
        })
    }

    fn read_reason(&mut self) -> Option<SkipReason> {
        Some(match self.read_u8()? {
            0 => SkipReason::EmptyVisibleRegion,
            1 => SkipReason::EmptyScissor,
            2 => SkipReason::Hidden,
            3 => SkipReason::AsyncNotReady,
            4 => SkipReason::SurfaceAllocationFailed,
            5 => SkipReason::NothingToDraw,
            _ => return None,
        })
    }

    fn decode_event(&mut self, tag: u8) -> Option<RecordedEvent> {
        Some(match tag {
            TAG_FRAME_BEGIN => RecordedEvent::FrameBegin {
                viewport: self.read_rect()?,
            },
            TAG_SURFACE => RecordedEvent::Surface {
                layer: self.read_layer()?,
                rect: self.read_rect()?,
                mode: self.read_mode()?,
            },
            TAG_LAYER_SKIPPED => RecordedEvent::LayerSkipped {
                layer: self.read_layer()?,
                reason: self.read_reason()?,
            },
            TAG_FRAME_END => RecordedEvent::FrameEnd {
                draws: self.read_u32()?,
                surfaces: self.read_u32()?,
                skipped: self.read_u32()?,
            },
            _ => return None,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = Recorded;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        let at_nanos = self.read_u64()?;
        let frame_index = self.read_u64()?;
        let event = self.decode_event(tag)?;
        Some(Recorded {
            at_nanos,
            frame_index,
            event,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
