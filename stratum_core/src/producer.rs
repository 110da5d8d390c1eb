// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interfaces implemented by the producer side of the image transport.
//!
//! The compositor never frees producer resources itself. Buffered texture
//! hosts hand swapped-out descriptors to a [`SurfaceDeallocator`], and async
//! image containers are polled through an [`AsyncImageRegistry`].

use core::fmt;

use crate::image::SharedImage;

/// Releases producer-side resources behind a [`SharedImage`].
///
/// A de-allocator is borrowed by the texture hosts it is bound to; the
/// hosts never own it.
pub trait SurfaceDeallocator {
    /// Destroys the resources behind `image`. Called with
    /// [`SharedImage::Null`] when a buffered host held nothing.
    fn destroy_shared_surface(&self, image: SharedImage);
}

/// Identifies an image container fed outside the per-frame update path.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AsyncContainerId(pub u64);

impl fmt::Debug for AsyncContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AsyncContainerId({})", self.0)
    }
}

/// An image taken from an async container, with the version it was
/// published under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsyncFrame {
    /// The published descriptor.
    pub image: SharedImage,
    /// Version of the container when `image` was published.
    pub version: u32,
}

/// Source of asynchronously produced images.
///
/// Producers publish images from other threads; implementations must read
/// the version counter with acquire ordering so that a changed version
/// implies the matching image is visible. Versions are only compared for
/// inequality.
///
/// Unbuffered consumers read the current image with
/// [`image`](Self::image) and never own it. Buffered consumers take it
/// with [`swap_image`](Self::swap_image), which hands their previous
/// descriptor back to the container so no descriptor is ever held by
/// both sides.
pub trait AsyncImageRegistry {
    /// Returns the current version of the container.
    fn version(&self, id: AsyncContainerId) -> u32;

    /// Returns a copy of the published image the container still owns, or
    /// `None` if there is none.
    fn image(&self, id: AsyncContainerId) -> Option<AsyncFrame>;

    /// Takes the published image and stores `previous` in its place.
    ///
    /// Returns `Err(previous)` untouched if no published image is waiting.
    fn swap_image(
        &self,
        id: AsyncContainerId,
        previous: SharedImage,
    ) -> Result<AsyncFrame, SharedImage>;

    /// Records which compositor consumes the container.
    fn bind_compositor_id(&self, id: AsyncContainerId, compositor_id: u64);
}
