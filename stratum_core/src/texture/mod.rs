// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend texture contract and the [`TextureHost`] that drives it.
//!
//! Backends implement [`TextureSource`] once per representation in the
//! closed [`TextureKind`] set. Capabilities are split into small traits:
//! every source is [`Sizeable`]; sources that split content across several
//! backing textures also expose [`TileIterable`] through
//! [`TextureSource::as_tiled`].

mod handles;
mod host;

use core::fmt;

use crate::geom::{IntRect, IntSize};
use crate::image::SharedImage;
use crate::region::Region;

pub use handles::SharedHandleTable;
pub use host::{Buffering, TextureHost, UpdateOutcome};

/// Texture representation, one per shared-image variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureKind {
    /// Pixels uploaded from CPU memory on every update.
    Direct,
    /// A GPU resource opened from a producer's handle.
    SharedHandle,
    /// Three planes (Y, Cb, Cr) combined at draw time.
    Planar,
}

impl TextureKind {
    /// All kinds, in slot order.
    pub const ALL: [Self; 3] = [Self::Direct, Self::SharedHandle, Self::Planar];

    /// Dense index for per-kind storage.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Direct => 0,
            Self::SharedHandle => 1,
            Self::Planar => 2,
        }
    }
}

/// Reports pixel dimensions.
pub trait Sizeable {
    /// Size of the content in pixels.
    fn size(&self) -> IntSize;
}

/// Content split across several backing textures.
pub trait TileIterable {
    /// Number of tiles.
    fn tile_count(&self) -> usize;

    /// Rectangle covered by tile `index`, in whole-image pixels.
    ///
    /// # Panics
    ///
    /// May panic if `index >= tile_count()`.
    fn tile_rect(&self, index: usize) -> IntRect;
}

/// Restartable iterator over `(index, rect)` for every tile.
///
/// Created by [`Tiles::new`]; create another to start over.
#[derive(Clone)]
pub struct Tiles<'a> {
    source: &'a dyn TileIterable,
    next: usize,
}

impl<'a> Tiles<'a> {
    /// Starts iterating at the first tile.
    #[must_use]
    pub fn new(source: &'a dyn TileIterable) -> Self {
        Self { source, next: 0 }
    }
}

impl fmt::Debug for Tiles<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tiles")
            .field("next", &self.next)
            .field("count", &self.source.tile_count())
            .finish()
    }
}

impl Iterator for Tiles<'_> {
    type Item = (usize, IntRect);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.source.tile_count() {
            return None;
        }
        let i = self.next;
        self.next += 1;
        Some((i, self.source.tile_rect(i)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.source.tile_count().saturating_sub(self.next);
        (left, Some(left))
    }
}

/// What an upload did to the backing storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadStatus {
    /// Storage was (re)allocated because size or format changed.
    pub reset: bool,
}

/// A backend texture holding one representation of an image.
pub trait TextureSource: Sizeable + fmt::Debug {
    /// Representation handled by this source.
    fn kind(&self) -> TextureKind;

    /// Stable identity of the backing resource, for diagnostics.
    fn handle(&self) -> u64;

    /// Replaces the content with `image`.
    ///
    /// Implementations validate the whole descriptor before touching any
    /// storage, so a failed update leaves the previous content intact.
    ///
    /// # Errors
    ///
    /// Returns a [`TextureError`] if the descriptor does not match this
    /// representation or is malformed.
    fn update(&mut self, image: &SharedImage) -> Result<UploadStatus, TextureError>;

    /// Refreshes only the pixels of `image` inside `region`.
    ///
    /// Sources that cannot do partial uploads, or whose storage does not
    /// match `image`, fall back to a full [`update`](Self::update), which is
    /// what the default does.
    ///
    /// # Errors
    ///
    /// As for [`update`](Self::update).
    fn update_region(
        &mut self,
        image: &SharedImage,
        region: &Region,
    ) -> Result<UploadStatus, TextureError> {
        let _ = region;
        self.update(image)
    }

    /// Returns `true` if the source holds drawable content.
    fn is_initialized(&self) -> bool;

    /// Returns the tile view if content spans several backing textures.
    fn as_tiled(&self) -> Option<&dyn TileIterable> {
        None
    }

    /// Ends a draw-time lock. Most sources need no work here.
    fn unlock(&self) {}
}

/// Why an upload failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TextureError {
    /// The descriptor's representation does not match the texture.
    #[error("{found:?} image cannot be uploaded to a {expected:?} texture")]
    KindMismatch {
        /// Representation of the texture.
        expected: TextureKind,
        /// Representation of the descriptor.
        found: TextureKind,
    },
    /// The buffer holds fewer bytes than its size and stride require.
    #[error("buffer holds {len} bytes but {needed} are required")]
    BufferTooSmall {
        /// Bytes required.
        needed: u64,
        /// Bytes present.
        len: u64,
    },
    /// Row stride is shorter than one row of pixels.
    #[error("stride {stride} is shorter than a {width}-pixel row")]
    InvalidStride {
        /// Declared stride.
        stride: u32,
        /// Row width in pixels.
        width: u32,
    },
    /// Planes of a planar image disagree or are missing.
    #[error("planar image rejected: {0}")]
    PlaneMismatch(&'static str),
    /// Dimensions exceed what the backend can allocate.
    #[error("{width}x{height} exceeds the maximum texture size")]
    TooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// The shared handle is not registered with the backend.
    #[error("unknown shared handle {0:#x}")]
    UnknownHandle(u64),
}
