// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compositor-side owner of one texture.

use alloc::rc::Rc;
use core::fmt;
use core::mem;

use crate::effect::{Filter, TextureEffect};
use crate::geom::{IntRect, IntSize};
use crate::image::SharedImage;
use crate::producer::{AsyncContainerId, AsyncImageRegistry, SurfaceDeallocator};
use crate::region::Region;

use super::{Sizeable, TextureSource};

/// How many producer descriptors a host keeps alive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Buffering {
    /// The producer keeps ownership; nothing is retained.
    #[default]
    None,
    /// One descriptor is retained until the next update.
    Single,
    /// One descriptor is retained while the producer fills the other.
    Double,
}

impl Buffering {
    /// Returns `true` if descriptors are retained and swapped.
    #[must_use]
    pub const fn is_buffered(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Result of [`TextureHost::update`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The descriptor handed back to the caller: the previously held one
    /// for buffered hosts, the input itself otherwise.
    pub previous: SharedImage,
    /// Whether the texture holds drawable content afterwards.
    pub initialized: bool,
    /// Whether backing storage was reallocated.
    pub reset: bool,
}

/// Owns one backend texture plus, when buffered, the producer descriptor
/// currently backing it.
///
/// A buffered host must have a [`SurfaceDeallocator`] bound before it is
/// dropped; dropping releases the held descriptor through it exactly once.
pub struct TextureHost<T> {
    source: T,
    buffering: Buffering,
    slot: SharedImage,
    async_container: Option<(AsyncContainerId, u64)>,
    async_version: Option<u32>,
    deallocator: Option<Rc<dyn SurfaceDeallocator>>,
}

impl<T: TextureSource> TextureHost<T> {
    /// Wraps a backend texture.
    #[must_use]
    pub fn new(source: T, buffering: Buffering) -> Self {
        Self {
            source,
            buffering,
            slot: SharedImage::Null,
            async_container: None,
            async_version: None,
            deallocator: None,
        }
    }

    /// Buffering mode.
    #[must_use]
    pub fn buffering(&self) -> Buffering {
        self.buffering
    }

    /// The descriptor currently retained by a buffered host.
    #[must_use]
    pub fn held(&self) -> &SharedImage {
        &self.slot
    }

    /// The backend texture.
    #[must_use]
    pub fn primary_texture_source(&self) -> &T {
        &self.source
    }

    /// Size of the texture content.
    #[must_use]
    pub fn size(&self) -> IntSize {
        self.source.size()
    }

    /// Uploads `image` and, for buffered hosts, swaps it into the slot.
    ///
    /// Buffered hosts return the previously held descriptor so the caller
    /// can release it; unbuffered hosts return the input. A failed upload
    /// is logged and reported as `initialized: false`; the swap still
    /// happens so descriptor ownership stays consistent.
    pub fn update(&mut self, image: SharedImage) -> UpdateOutcome {
        let (initialized, reset) = self.upload(&image, None);
        let previous = if self.buffering.is_buffered() {
            mem::replace(&mut self.slot, image)
        } else {
            image
        };

        UpdateOutcome {
            previous,
            initialized,
            reset,
        }
    }

    /// Uploads only the pixels of `image` inside `region`.
    ///
    /// The rest of the texture keeps what the previous update left there,
    /// so the producer must still own the pixels backing it. The input is
    /// returned as `previous`.
    ///
    /// # Panics
    ///
    /// Panics on a buffered host: its held descriptor would no longer
    /// describe the texture content.
    pub fn update_region(&mut self, image: SharedImage, region: &Region) -> UpdateOutcome {
        assert!(
            !self.buffering.is_buffered(),
            "region updates need an unbuffered TextureHost"
        );
        let (initialized, reset) = self.upload(&image, Some(region));
        UpdateOutcome {
            previous: image,
            initialized,
            reset,
        }
    }

    /// Returns `(initialized, reset)`.
    fn upload(&mut self, image: &SharedImage, region: Option<&Region>) -> (bool, bool) {
        if image.is_null() {
            return (self.source.is_initialized(), false);
        }
        let result = match region {
            Some(region) => self.source.update_region(image, region),
            None => self.source.update(image),
        };
        match result {
            Ok(status) => (self.source.is_initialized(), status.reset),
            Err(err) => {
                tracing::warn!(
                    texture = self.source.handle(),
                    error = %err,
                    "texture upload failed"
                );
                (false, false)
            }
        }
    }

    /// Binds an async image container and the compositor consuming it.
    pub fn set_async_container(&mut self, id: AsyncContainerId, compositor_id: u64) {
        if self.async_container.map(|(c, _)| c) != Some(id) {
            self.async_version = None;
        }
        self.async_container = Some((id, compositor_id));
    }

    /// Bound async container, if any.
    #[must_use]
    pub fn async_container(&self) -> Option<AsyncContainerId> {
        self.async_container.map(|(id, _)| id)
    }

    /// Pulls a new image from the async container if its version changed.
    ///
    /// The version is polled first; the image is only fetched when it
    /// differs from the last one observed. Returns `false` (and changes
    /// nothing on this host) if the version moved but no image is waiting.
    /// A host with no container bound returns `true` without touching the
    /// registry.
    ///
    /// Unbuffered hosts upload a copy the registry keeps owning. Buffered
    /// hosts exchange descriptors with the container: the one they held
    /// goes back to the registry, never to the de-allocator.
    pub fn update_async_texture(&mut self, registry: &dyn AsyncImageRegistry) -> bool {
        let Some((id, compositor_id)) = self.async_container else {
            return true;
        };
        registry.bind_compositor_id(id, compositor_id);

        if self.async_version == Some(registry.version(id)) {
            return true;
        }

        let frame = if self.buffering.is_buffered() {
            let held = mem::take(&mut self.slot);
            match registry.swap_image(id, held) {
                Ok(frame) => frame,
                Err(held) => {
                    self.slot = held;
                    tracing::trace!(container = ?id, "async container has no image");
                    return false;
                }
            }
        } else {
            let Some(frame) = registry.image(id) else {
                tracing::trace!(container = ?id, "async container has no image");
                return false;
            };
            frame
        };

        // The slot is empty here, so a buffered swap hands back `Null`.
        let _ = self.update(frame.image);
        self.async_version = Some(frame.version);
        true
    }

    /// Binds the de-allocator that releases retained descriptors.
    ///
    /// # Panics
    ///
    /// Panics if a different de-allocator is already bound.
    pub fn set_deallocator(&mut self, deallocator: Rc<dyn SurfaceDeallocator>) {
        if let Some(existing) = &self.deallocator {
            assert!(
                Rc::ptr_eq(existing, &deallocator),
                "TextureHost already has a different de-allocator"
            );
            return;
        }
        self.deallocator = Some(deallocator);
    }

    /// Locks the texture for drawing `rect` (whole-image pixels; `None`
    /// means the whole texture).
    ///
    /// Returns `None` if there is nothing to draw.
    #[must_use]
    pub fn lock(&self, filter: Filter, rect: Option<IntRect>) -> Option<TextureEffect<'_, T>> {
        if !self.source.is_initialized() {
            return None;
        }
        let full = IntRect::from_size(self.source.size());
        let source_rect = rect.map_or(full, |r| r.intersect(full));
        if source_rect.is_empty() {
            return None;
        }
        Some(TextureEffect {
            source: &self.source,
            tile: None,
            source_rect,
            filter,
        })
    }

    /// Ends a lock taken with [`lock`](Self::lock).
    pub fn unlock(&self) {
        self.source.unlock();
    }
}

impl<T> Drop for TextureHost<T> {
    fn drop(&mut self) {
        if !self.buffering.is_buffered() {
            return;
        }
        let held = mem::take(&mut self.slot);
        match &self.deallocator {
            Some(d) => d.destroy_shared_surface(held),
            None => panic!("buffered TextureHost dropped without a de-allocator"),
        }
    }
}

impl<T: TextureSource> fmt::Debug for TextureHost<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureHost")
            .field("source", &self.source)
            .field("buffering", &self.buffering)
            .field("slot", &self.slot.kind())
            .field("async_container", &self.async_container)
            .field("async_version", &self.async_version)
            .field("deallocator", &self.deallocator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};

    use super::*;
    use crate::geom::IntSize;
    use crate::image::{PixelBuffer, PixelFormat};
    use crate::producer::AsyncFrame;
    use crate::texture::{TextureError, TextureKind, UploadStatus};

    #[derive(Debug, Default)]
    struct FakeTexture {
        size: IntSize,
        uploads: u32,
        partial: Vec<Region>,
    }

    impl Sizeable for FakeTexture {
        fn size(&self) -> IntSize {
            self.size
        }
    }

    impl TextureSource for FakeTexture {
        fn kind(&self) -> TextureKind {
            TextureKind::Direct
        }

        fn handle(&self) -> u64 {
            1
        }

        fn update(&mut self, image: &SharedImage) -> Result<UploadStatus, TextureError> {
            match image {
                SharedImage::Pixels(p) => {
                    let reset = p.size != self.size;
                    self.size = p.size;
                    self.uploads += 1;
                    Ok(UploadStatus { reset })
                }
                other => Err(TextureError::KindMismatch {
                    expected: TextureKind::Direct,
                    found: other.kind().unwrap_or(TextureKind::Direct),
                }),
            }
        }

        fn update_region(
            &mut self,
            image: &SharedImage,
            region: &Region,
        ) -> Result<UploadStatus, TextureError> {
            self.partial.push(region.clone());
            self.update(image)
        }

        fn is_initialized(&self) -> bool {
            self.uploads > 0
        }
    }

    #[derive(Default)]
    struct Recorder {
        destroyed: RefCell<Vec<SharedImage>>,
    }

    impl SurfaceDeallocator for Recorder {
        fn destroy_shared_surface(&self, image: SharedImage) {
            self.destroyed.borrow_mut().push(image);
        }
    }

    /// One async container. `next` is published the moment the container
    /// hands out an image, as a producer racing the compositor would.
    #[derive(Default)]
    struct Registry {
        version: Cell<u32>,
        slot: RefCell<Option<SharedImage>>,
        fresh: Cell<bool>,
        next: RefCell<Option<SharedImage>>,
        recycled: RefCell<Vec<SharedImage>>,
        bound: Cell<Option<u64>>,
    }

    impl Registry {
        fn publish(&self, image: SharedImage) {
            if let Some(old) = self.slot.replace(Some(image)) {
                self.recycled.borrow_mut().push(old);
            }
            self.fresh.set(true);
            self.version.set(self.version.get() + 1);
        }

        fn race(&self) {
            if let Some(image) = self.next.take() {
                self.publish(image);
            }
        }
    }

    impl AsyncImageRegistry for Registry {
        fn version(&self, _id: AsyncContainerId) -> u32 {
            self.version.get()
        }

        fn image(&self, _id: AsyncContainerId) -> Option<AsyncFrame> {
            if !self.fresh.get() {
                return None;
            }
            let frame = AsyncFrame {
                image: self.slot.borrow().clone()?,
                version: self.version.get(),
            };
            self.race();
            Some(frame)
        }

        fn swap_image(
            &self,
            _id: AsyncContainerId,
            previous: SharedImage,
        ) -> Result<AsyncFrame, SharedImage> {
            if !self.fresh.get() {
                return Err(previous);
            }
            let stored = (!previous.is_null()).then_some(previous);
            let Some(image) = self.slot.replace(stored) else {
                unreachable!("fresh container without an image");
            };
            self.fresh.set(false);
            let frame = AsyncFrame {
                image,
                version: self.version.get(),
            };
            self.race();
            Ok(frame)
        }

        fn bind_compositor_id(&self, _id: AsyncContainerId, compositor_id: u64) {
            self.bound.set(Some(compositor_id));
        }
    }

    fn pixels(w: u32, fill: u8) -> SharedImage {
        SharedImage::Pixels(PixelBuffer::new(
            IntSize::new(w, 1),
            PixelFormat::Rgba8,
            Arc::from(vec![fill; (w * 4) as usize]),
        ))
    }

    fn buffered(recorder: &Rc<Recorder>) -> TextureHost<FakeTexture> {
        let mut host = TextureHost::new(FakeTexture::default(), Buffering::Double);
        host.set_deallocator(recorder.clone());
        host
    }

    #[test]
    fn unbuffered_update_returns_input() {
        let mut host = TextureHost::new(FakeTexture::default(), Buffering::None);
        let img = pixels(2, 9);
        let out = host.update(img.clone());
        assert_eq!(out.previous, img);
        assert!(out.initialized);
        assert!(out.reset);
        assert!(host.held().is_null());
    }

    #[test]
    fn buffered_update_is_a_swap() {
        let recorder = Rc::new(Recorder::default());
        let mut host = buffered(&recorder);
        let a = pixels(2, 1);
        let b = pixels(2, 2);

        assert_eq!(host.update(a.clone()).previous, SharedImage::Null);
        let out = host.update(b.clone());
        assert_eq!(out.previous, a);
        assert!(!out.reset);
        assert_eq!(host.held(), &b);

        // Swapping in the held value hands the same value back.
        let again = host.update(b.clone());
        assert_eq!(again.previous, b);
        assert_eq!(host.held(), &b);
    }

    #[test]
    fn failed_upload_still_swaps() {
        let recorder = Rc::new(Recorder::default());
        let mut host = buffered(&recorder);
        let bad = SharedImage::Handle(crate::image::SharedHandle {
            handle: 3,
            share_type: crate::image::ShareType::SameProcess,
            size: IntSize::new(1, 1),
        });
        let out = host.update(bad.clone());
        assert!(!out.initialized);
        assert_eq!(host.held(), &bad);
    }

    #[test]
    fn region_update_reaches_the_texture() {
        let mut host = TextureHost::new(FakeTexture::default(), Buffering::None);
        let _ = host.update(pixels(4, 1));
        let region = Region::from_rect(IntRect::new(1, 0, 2, 1));
        let out = host.update_region(pixels(4, 5), &region);
        assert_eq!(out.previous, pixels(4, 5));
        assert!(out.initialized);
        assert!(!out.reset);
        assert_eq!(host.primary_texture_source().partial, [region]);
        assert!(host.held().is_null());
    }

    #[test]
    #[should_panic(expected = "unbuffered TextureHost")]
    fn region_update_on_buffered_host_panics() {
        let recorder = Rc::new(Recorder::default());
        let mut host = buffered(&recorder);
        let _ = host.update_region(pixels(1, 1), &Region::new());
    }

    #[test]
    fn drop_of_buffered_host_destroys_once() {
        let recorder = Rc::new(Recorder::default());
        {
            let mut host = buffered(&recorder);
            let _ = host.update(pixels(1, 7));
        }
        let destroyed = recorder.destroyed.borrow();
        assert_eq!(destroyed.len(), 1);
        assert_eq!(destroyed[0], pixels(1, 7));
    }

    #[test]
    fn drop_of_unbuffered_host_never_destroys() {
        let recorder = Rc::new(Recorder::default());
        {
            let mut host = TextureHost::new(FakeTexture::default(), Buffering::None);
            host.set_deallocator(recorder.clone());
            let _ = host.update(pixels(1, 7));
        }
        assert!(recorder.destroyed.borrow().is_empty());
    }

    #[test]
    #[should_panic(expected = "dropped without a de-allocator")]
    fn buffered_drop_without_deallocator_panics() {
        let _host = TextureHost::new(FakeTexture::default(), Buffering::Single);
    }

    #[test]
    #[should_panic(expected = "different de-allocator")]
    fn deallocator_stomping_panics() {
        let mut host = TextureHost::new(FakeTexture::default(), Buffering::None);
        host.set_deallocator(Rc::new(Recorder::default()));
        host.set_deallocator(Rc::new(Recorder::default()));
    }

    #[test]
    fn same_deallocator_can_be_rebound() {
        let recorder = Rc::new(Recorder::default());
        let mut host = buffered(&recorder);
        host.set_deallocator(recorder.clone());
    }

    #[test]
    fn async_without_image_fails_without_mutation() {
        let recorder = Rc::new(Recorder::default());
        let mut host = buffered(&recorder);
        let _ = host.update(pixels(1, 3));
        host.set_async_container(AsyncContainerId(1), 77);
        let registry = Registry::default();
        registry.version.set(4);

        assert!(!host.update_async_texture(&registry));
        assert_eq!(registry.bound.get(), Some(77));
        assert_eq!(host.held(), &pixels(1, 3), "held descriptor kept");
        assert_eq!(host.primary_texture_source().uploads, 1);
        assert_eq!(*registry.slot.borrow(), None, "registry untouched");
    }

    #[test]
    fn async_update_follows_version() {
        let mut host = TextureHost::new(FakeTexture::default(), Buffering::None);
        host.set_async_container(AsyncContainerId(1), 0);
        let registry = Registry::default();
        registry.publish(pixels(1, 1));

        assert!(host.update_async_texture(&registry));
        assert_eq!(host.primary_texture_source().uploads, 1);

        // Same version: nothing happens.
        assert!(host.update_async_texture(&registry));
        assert_eq!(host.primary_texture_source().uploads, 1);

        registry.publish(pixels(2, 2));
        assert!(host.update_async_texture(&registry));
        assert_eq!(host.primary_texture_source().uploads, 2);
        assert!(host.held().is_null(), "unbuffered hosts hold nothing");
        assert_eq!(*registry.slot.borrow(), Some(pixels(2, 2)));
    }

    #[test]
    fn publish_during_fetch_is_picked_up_next_poll() {
        for buffering in [Buffering::None, Buffering::Double] {
            let recorder = Rc::new(Recorder::default());
            let mut host = TextureHost::new(FakeTexture::default(), buffering);
            host.set_deallocator(recorder.clone());
            host.set_async_container(AsyncContainerId(1), 0);
            let registry = Registry::default();
            registry.publish(pixels(1, 1));
            *registry.next.borrow_mut() = Some(pixels(3, 2));

            assert!(host.update_async_texture(&registry));
            assert_eq!(host.size(), IntSize::new(1, 1), "{buffering:?}");
            assert_eq!(registry.version.get(), 2);

            assert!(host.update_async_texture(&registry));
            assert_eq!(host.size(), IntSize::new(3, 1), "{buffering:?}: newest frame shown");
            assert_eq!(host.primary_texture_source().uploads, 2);
        }
    }

    #[test]
    fn buffered_async_exchanges_descriptors_with_the_registry() {
        let recorder = Rc::new(Recorder::default());
        {
            let mut host = buffered(&recorder);
            host.set_async_container(AsyncContainerId(1), 0);
            let registry = Registry::default();

            registry.publish(pixels(1, 1));
            assert!(host.update_async_texture(&registry));
            assert_eq!(host.held(), &pixels(1, 1));
            assert_eq!(*registry.slot.borrow(), None, "image moved, not copied");

            registry.publish(pixels(1, 2));
            assert!(host.update_async_texture(&registry));
            assert_eq!(host.held(), &pixels(1, 2));
            assert_eq!(*registry.slot.borrow(), Some(pixels(1, 1)), "previous returned");
            assert!(recorder.destroyed.borrow().is_empty(), "nothing released twice");

            // Nothing new: the host keeps its frame.
            assert!(host.update_async_texture(&registry));
            assert_eq!(host.primary_texture_source().uploads, 2);

            registry.publish(pixels(1, 3));
            assert_eq!(registry.recycled.borrow().as_slice(), &[pixels(1, 1)]);
        }
        assert_eq!(recorder.destroyed.borrow().as_slice(), &[pixels(1, 2)]);
    }

    #[test]
    fn async_without_container_is_a_no_op() {
        let mut host = TextureHost::new(FakeTexture::default(), Buffering::None);
        let registry = Registry::default();
        assert!(host.update_async_texture(&registry));
        assert_eq!(registry.bound.get(), None);
    }

    #[test]
    fn lock_requires_content() {
        let mut host = TextureHost::new(FakeTexture::default(), Buffering::None);
        assert!(host.lock(Filter::Linear, None).is_none());
        let _ = host.update(pixels(4, 0));
        let fx = host.lock(Filter::Nearest, None).unwrap();
        assert_eq!(fx.source_rect, IntRect::new(0, 0, 4, 1));
        let cropped = host
            .lock(Filter::Nearest, Some(IntRect::new(1, 0, 10, 1)))
            .unwrap();
        assert_eq!(cropped.source_rect, IntRect::new(1, 0, 3, 1));
    }
}
