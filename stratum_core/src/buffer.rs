// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer hosts: the texture hosts behind one composited unit.

use alloc::rc::Rc;
use core::fmt;

use crate::backend::Compositor;
use crate::effect::{EffectChain, Filter, MaskEffect, TextureEffect};
use crate::geom::{IntPoint, IntRect, IntSize};
use crate::image::SharedImage;
use crate::producer::{AsyncContainerId, AsyncImageRegistry, SurfaceDeallocator};
use crate::region::Region;
use crate::texture::{TextureHost, TextureKind, TextureSource, Tiles, UpdateOutcome};
use crate::transform::Transform3d;

/// Owns the [`TextureHost`]s needed to present one layer, at most one per
/// [`TextureKind`].
///
/// The *primary* kind is the one drawn; it follows the most recent
/// successful update, and defaults to the first host attached.
pub struct BufferHost<T> {
    hosts: [Option<TextureHost<T>>; 3],
    primary: Option<TextureKind>,
    picture_rect: Option<IntRect>,
    deallocator: Option<Rc<dyn SurfaceDeallocator>>,
    async_container: Option<(AsyncContainerId, u64)>,
}

impl<T: TextureSource> Default for BufferHost<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TextureSource> BufferHost<T> {
    /// Creates a buffer host with no textures.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hosts: [None, None, None],
            primary: None,
            picture_rect: None,
            deallocator: None,
            async_container: None,
        }
    }

    /// Attaches `host` as the texture for `kind`.
    ///
    /// A host already attached for `kind` is dropped, releasing its held
    /// descriptor. The buffer host's de-allocator and async container are
    /// bound to the new host.
    ///
    /// # Panics
    ///
    /// Panics if the host's texture is not of `kind`.
    pub fn add_texture_host(&mut self, kind: TextureKind, mut host: TextureHost<T>) {
        assert!(
            host.primary_texture_source().kind() == kind,
            "texture host kind does not match its slot"
        );
        if let Some(d) = &self.deallocator {
            host.set_deallocator(d.clone());
        }
        if let Some((id, compositor_id)) = self.async_container {
            host.set_async_container(id, compositor_id);
        }
        self.hosts[kind.index()] = Some(host);
        if self.primary.is_none() {
            self.primary = Some(kind);
        }
    }

    /// Returns `true` if a host is attached for `kind`.
    #[must_use]
    pub fn has_texture_host(&self, kind: TextureKind) -> bool {
        self.hosts[kind.index()].is_some()
    }

    /// Returns the host attached for `kind`.
    #[must_use]
    pub fn texture_host(&self, kind: TextureKind) -> Option<&TextureHost<T>> {
        self.hosts[kind.index()].as_ref()
    }

    /// The kind that will be drawn.
    #[must_use]
    pub fn primary_kind(&self) -> Option<TextureKind> {
        self.primary
    }

    fn primary_host(&self) -> Option<&TextureHost<T>> {
        self.primary.and_then(|k| self.hosts[k.index()].as_ref())
    }

    /// Size of the primary texture.
    #[must_use]
    pub fn size(&self) -> IntSize {
        self.primary_host().map_or(IntSize::default(), TextureHost::size)
    }

    /// Restricts drawing to `rect` (image pixels).
    pub fn set_picture_rect(&mut self, rect: Option<IntRect>) {
        self.picture_rect = rect;
    }

    /// The picture rectangle, if set.
    #[must_use]
    pub fn picture_rect(&self) -> Option<IntRect> {
        self.picture_rect
    }

    /// Binds the de-allocator to this buffer host and every attached host.
    ///
    /// # Panics
    ///
    /// Panics if a different de-allocator is already bound.
    pub fn set_deallocator(&mut self, deallocator: Rc<dyn SurfaceDeallocator>) {
        if let Some(existing) = &self.deallocator {
            assert!(
                Rc::ptr_eq(existing, &deallocator),
                "BufferHost already has a different de-allocator"
            );
        }
        for host in self.hosts.iter_mut().flatten() {
            host.set_deallocator(deallocator.clone());
        }
        self.deallocator = Some(deallocator);
    }

    /// Binds an async container to this buffer host and every attached host.
    pub fn set_async_container(&mut self, id: AsyncContainerId, compositor_id: u64) {
        self.async_container = Some((id, compositor_id));
        for host in self.hosts.iter_mut().flatten() {
            host.set_async_container(id, compositor_id);
        }
    }

    /// Bound async container, if any.
    #[must_use]
    pub fn async_container(&self) -> Option<AsyncContainerId> {
        self.async_container.map(|(id, _)| id)
    }

    /// Forwards `image` to the host for its representation.
    ///
    /// [`SharedImage::Null`] goes to the primary host. If no host matches,
    /// the image is passed straight back as `previous`.
    pub fn update(&mut self, image: SharedImage) -> UpdateOutcome {
        let Some(kind) = image.kind().or(self.primary) else {
            return pass_through(image);
        };
        let Some(host) = self.hosts[kind.index()].as_mut() else {
            tracing::debug!(?kind, "no texture host for image; passing through");
            return pass_through(image);
        };
        let outcome = host.update(image);
        if outcome.initialized {
            self.primary = Some(kind);
        }
        outcome
    }

    /// Refreshes the primary host from its async container.
    ///
    /// Returns `false` if the registry has no image yet. A buffer host with
    /// no texture host has nothing to refresh and returns `true`.
    pub fn update_async_texture(&mut self, registry: &dyn AsyncImageRegistry) -> bool {
        let Some(kind) = self.primary else {
            return true;
        };
        match self.hosts[kind.index()].as_mut() {
            Some(host) => host.update_async_texture(registry),
            None => true,
        }
    }

    /// Draws the primary texture.
    ///
    /// Tiled textures issue one draw per tile; with a visible region, each
    /// piece is further split by the region's rectangles. Returns the number
    /// of quads drawn; `0` means there was nothing to draw.
    pub fn composite<'a, C>(
        &'a self,
        compositor: &mut C,
        mut effects: EffectChain<'a, T>,
        opacity: f32,
        transform: &Transform3d,
        offset: IntPoint,
        filter: Filter,
        clip: IntRect,
        visible: Option<&Region>,
    ) -> usize
    where
        C: Compositor<Texture = T>,
    {
        let Some(host) = self.primary_host() else {
            return 0;
        };
        let Some(locked) = host.lock(filter, self.picture_rect) else {
            return 0;
        };
        let picture = locked.source_rect;

        let mut draws = 0;
        let mut draw_piece = |tile: Option<usize>, piece: IntRect| {
            let pieces = match visible {
                Some(region) => region.intersect_rect(piece),
                None => Region::from_rect(piece),
            };
            for rect in pieces.rects() {
                effects.texture = Some(TextureEffect {
                    tile,
                    source_rect: rect,
                    ..locked
                });
                compositor.draw_quad(rect.to_rect(), &effects, opacity, transform, clip, offset);
                draws += 1;
            }
        };

        match host.primary_texture_source().as_tiled() {
            Some(tiled) => {
                for (index, tile_rect) in Tiles::new(tiled) {
                    let piece = tile_rect.intersect(picture);
                    if !piece.is_empty() {
                        draw_piece(Some(index), piece);
                    }
                }
            }
            None => draw_piece(None, picture),
        }

        host.unlock();
        draws
    }

    /// Installs a mask effect built from the primary texture.
    ///
    /// Returns `false`, leaving `effects` untouched, if there is no primary
    /// texture with content.
    pub fn add_mask_effect<'a>(
        &'a self,
        effects: &mut EffectChain<'a, T>,
        transform: Transform3d,
        is_3d: bool,
    ) -> bool {
        let Some(host) = self.primary_host() else {
            return false;
        };
        let source = host.primary_texture_source();
        if !source.is_initialized() {
            return false;
        }
        effects.mask = Some(MaskEffect {
            source,
            size: source.size(),
            transform,
            is_3d,
        });
        true
    }
}

fn pass_through(image: SharedImage) -> UpdateOutcome {
    UpdateOutcome {
        previous: image,
        initialized: false,
        reset: false,
    }
}

impl<T: TextureSource> fmt::Debug for BufferHost<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHost")
            .field("hosts", &self.hosts)
            .field("primary", &self.primary)
            .field("picture_rect", &self.picture_rect)
            .field("deallocator", &self.deallocator.is_some())
            .field("async_container", &self.async_container)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;

    use super::*;
    use crate::effect::Color;
    use crate::testing::{RecordingCompositor, RecordingDeallocator, pixels};
    use crate::texture::Buffering;

    const CLIP: IntRect = IntRect::new(0, 0, 100, 100);

    fn composite_into(
        host: &BufferHost<crate::testing::FakeTexture>,
        compositor: &mut RecordingCompositor,
        visible: Option<&Region>,
    ) -> usize {
        host.composite(
            compositor,
            EffectChain::new(),
            1.0,
            &Transform3d::IDENTITY,
            IntPoint::ZERO,
            Filter::Linear,
            CLIP,
            visible,
        )
    }

    #[test]
    fn update_without_matching_host_passes_through() {
        let mut host: BufferHost<crate::testing::FakeTexture> = BufferHost::new();
        let img = pixels(2, 2);
        let out = host.update(img.clone());
        assert_eq!(out.previous, img);
        assert!(!out.initialized);
    }

    #[test]
    fn update_routes_by_kind_and_sets_primary() {
        let mut compositor = RecordingCompositor::default();
        let mut host = compositor.create_buffer_host(TextureKind::Direct, Buffering::None);
        let out = host.update(pixels(3, 2));
        assert!(out.initialized);
        assert_eq!(host.primary_kind(), Some(TextureKind::Direct));
        assert_eq!(host.size(), IntSize::new(3, 2));

        // No shared-handle host is attached, so a handle passes through.
        let handle = SharedImage::Handle(crate::image::SharedHandle {
            handle: 1,
            share_type: crate::image::ShareType::CrossProcess,
            size: IntSize::new(1, 1),
        });
        assert_eq!(host.update(handle.clone()).previous, handle);
    }

    #[test]
    fn replacing_a_host_releases_its_descriptor() {
        let mut compositor = RecordingCompositor::default();
        let dealloc = Rc::new(RecordingDeallocator::default());
        let mut host = BufferHost::new();
        host.set_deallocator(dealloc.clone());
        host.add_texture_host(
            TextureKind::Direct,
            TextureHost::new(compositor.create_texture(TextureKind::Direct), Buffering::Double),
        );
        let _ = host.update(pixels(1, 1));
        host.add_texture_host(
            TextureKind::Direct,
            TextureHost::new(compositor.create_texture(TextureKind::Direct), Buffering::None),
        );
        assert_eq!(dealloc.destroyed.borrow().as_slice(), &[pixels(1, 1)]);
    }

    #[test]
    fn composite_draws_nothing_before_upload() {
        let mut compositor = RecordingCompositor::default();
        let host = compositor.create_buffer_host(TextureKind::Direct, Buffering::None);
        assert_eq!(composite_into(&host, &mut compositor, None), 0);
        assert!(compositor.calls.is_empty());
    }

    #[test]
    fn composite_splits_tiles_and_visible_region() {
        let mut compositor = RecordingCompositor {
            tile: Some(4),
            ..RecordingCompositor::default()
        };
        let mut host = compositor.create_buffer_host(TextureKind::Direct, Buffering::None);
        let _ = host.update(pixels(8, 4));

        // Two tiles, each drawn once.
        assert_eq!(composite_into(&host, &mut compositor, None), 2);
        let draws = compositor.draws();
        assert_eq!(draws[0].texture.map(|t| t.1), Some(Some(0)));
        assert_eq!(draws[1].texture.map(|t| t.2), Some(IntRect::new(4, 0, 4, 4)));

        // A visible strip crossing the tile seam splits into two pieces.
        compositor.calls.clear();
        let strip = Region::from_rect(IntRect::new(2, 1, 4, 1));
        assert_eq!(composite_into(&host, &mut compositor, Some(&strip)), 2);
        let rects: alloc::vec::Vec<_> = compositor.draws().iter().map(|d| d.rect).collect();
        assert_eq!(rects[0], kurbo::Rect::new(2.0, 1.0, 4.0, 2.0));
        assert_eq!(rects[1], kurbo::Rect::new(4.0, 1.0, 6.0, 2.0));
    }

    #[test]
    fn picture_rect_crops() {
        let mut compositor = RecordingCompositor::default();
        let mut host = compositor.create_buffer_host(TextureKind::Direct, Buffering::None);
        let _ = host.update(pixels(10, 10));
        host.set_picture_rect(Some(IntRect::new(2, 2, 4, 4)));
        assert_eq!(composite_into(&host, &mut compositor, None), 1);
        assert_eq!(
            compositor.draws()[0].texture.map(|t| t.2),
            Some(IntRect::new(2, 2, 4, 4))
        );
    }

    #[test]
    fn add_mask_effect_without_texture_leaves_chain() {
        let host: BufferHost<crate::testing::FakeTexture> = BufferHost::new();
        let mut chain = EffectChain::new();
        chain.solid_color = Some(Color::WHITE);
        assert!(!host.add_mask_effect(&mut chain, Transform3d::IDENTITY, false));
        assert!(chain.mask.is_none());
        assert_eq!(chain.solid_color, Some(Color::WHITE));
    }

    #[test]
    fn add_mask_effect_installs_primary_texture() {
        let mut compositor = RecordingCompositor::default();
        let mut host = compositor.create_buffer_host(TextureKind::Direct, Buffering::None);
        let _ = host.update(pixels(5, 5));
        let mut chain = EffectChain::new();
        assert!(host.add_mask_effect(&mut chain, Transform3d::IDENTITY, true));
        let mask = chain.mask.unwrap();
        assert_eq!(mask.size, IntSize::new(5, 5));
        assert!(mask.is_3d);
        assert!(compositor.calls.is_empty());
    }
}
