// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test doubles shared by unit tests.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use crate::backend::{Compositor, CompositorError, SurfaceInitMode, SurfaceSnapshot};
use crate::effect::{Color, EffectChain};
use crate::geom::{IntPoint, IntRect, IntSize};
use crate::image::SharedImage;
use crate::layer::SurfaceId;
use crate::producer::{AsyncContainerId, AsyncFrame, AsyncImageRegistry, SurfaceDeallocator};
use crate::texture::{
    Sizeable, TextureError, TextureKind, TextureSource, TileIterable, UploadStatus,
};
use crate::transform::Transform3d;

#[derive(Debug)]
pub(crate) struct FakeTexture {
    pub(crate) kind: TextureKind,
    pub(crate) id: u64,
    pub(crate) size: IntSize,
    pub(crate) uploads: u32,
    pub(crate) tile: Option<u32>,
}

impl Sizeable for FakeTexture {
    fn size(&self) -> IntSize {
        self.size
    }
}

impl TileIterable for FakeTexture {
    fn tile_count(&self) -> usize {
        let t = self.tile.unwrap_or(1);
        (self.size.width.div_ceil(t) * self.size.height.div_ceil(t)) as usize
    }

    fn tile_rect(&self, index: usize) -> IntRect {
        let t = self.tile.unwrap_or(1);
        let cols = self.size.width.div_ceil(t);
        let i = u32::try_from(index).unwrap();
        let (x, y) = ((i % cols) * t, (i / cols) * t);
        IntRect::new(x as i32, y as i32, t, t).intersect(IntRect::from_size(self.size))
    }
}

impl TextureSource for FakeTexture {
    fn kind(&self) -> TextureKind {
        self.kind
    }

    fn handle(&self) -> u64 {
        self.id
    }

    fn update(&mut self, image: &SharedImage) -> Result<UploadStatus, TextureError> {
        let found = image.kind().unwrap_or(self.kind);
        if found != self.kind {
            return Err(TextureError::KindMismatch {
                expected: self.kind,
                found,
            });
        }
        let reset = image.size() != self.size;
        self.size = image.size();
        self.uploads += 1;
        Ok(UploadStatus { reset })
    }

    fn is_initialized(&self) -> bool {
        self.uploads > 0
    }

    fn as_tiled(&self) -> Option<&dyn TileIterable> {
        self.tile.map(|_| self as &dyn TileIterable)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DrawCall {
    pub(crate) rect: kurbo::Rect,
    pub(crate) opacity: f32,
    pub(crate) transform: Transform3d,
    pub(crate) clip: IntRect,
    pub(crate) offset: IntPoint,
    pub(crate) target: Option<SurfaceId>,
    pub(crate) solid_color: Option<Color>,
    pub(crate) texture: Option<(u64, Option<usize>, IntRect)>,
    pub(crate) surface: Option<SurfaceId>,
    pub(crate) mask: Option<(u64, bool)>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    CreateSurface(IntRect, SurfaceInitMode),
    ReleaseSurface(SurfaceId),
    SetTarget(Option<SurfaceId>),
    SaveViewport,
    RestoreViewport,
    Draw(DrawCall),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingCompositor {
    pub(crate) calls: Vec<Call>,
    pub(crate) next_texture: u64,
    pub(crate) next_surface: u32,
    pub(crate) live_surfaces: BTreeMap<u32, IntRect>,
    pub(crate) target: Option<SurfaceId>,
    pub(crate) viewport: IntRect,
    pub(crate) viewports: Vec<IntRect>,
    pub(crate) tile: Option<u32>,
    pub(crate) fail_surfaces: bool,
}

impl RecordingCompositor {
    pub(crate) fn draws(&self) -> Vec<&DrawCall> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn surfaces_created(&self) -> Vec<(IntRect, SurfaceInitMode)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::CreateSurface(r, m) => Some((*r, *m)),
                _ => None,
            })
            .collect()
    }
}

impl Compositor for RecordingCompositor {
    type Texture = FakeTexture;

    fn create_texture(&mut self, kind: TextureKind) -> FakeTexture {
        self.next_texture += 1;
        FakeTexture {
            kind,
            id: self.next_texture,
            size: IntSize::default(),
            uploads: 0,
            tile: self.tile,
        }
    }

    fn create_surface(
        &mut self,
        rect: IntRect,
        init: SurfaceInitMode,
    ) -> Result<SurfaceId, CompositorError> {
        self.calls.push(Call::CreateSurface(rect, init));
        if rect.is_empty() {
            return Err(CompositorError::EmptySurface(rect));
        }
        if self.fail_surfaces {
            return Err(CompositorError::SurfaceTooLarge { rect, max: 0 });
        }
        self.next_surface += 1;
        self.live_surfaces.insert(self.next_surface, rect);
        Ok(SurfaceId(self.next_surface))
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        self.calls.push(Call::ReleaseSurface(surface));
        self.live_surfaces.remove(&surface.0);
    }

    fn render_target(&self) -> Option<SurfaceId> {
        self.target
    }

    fn set_render_target(&mut self, target: Option<SurfaceId>) {
        self.calls.push(Call::SetTarget(target));
        self.target = target;
        if let Some(s) = target {
            if let Some(r) = self.live_surfaces.get(&s.0) {
                self.viewport = IntRect::from_size(r.size());
            }
        }
    }

    fn save_viewport(&mut self) {
        self.calls.push(Call::SaveViewport);
        self.viewports.push(self.viewport);
    }

    fn restore_viewport(&mut self) {
        self.calls.push(Call::RestoreViewport);
        if let Some(v) = self.viewports.pop() {
            self.viewport = v;
        }
    }

    fn viewport(&self) -> IntRect {
        self.viewport
    }

    fn draw_quad(
        &mut self,
        rect: kurbo::Rect,
        effects: &EffectChain<'_, FakeTexture>,
        opacity: f32,
        transform: &Transform3d,
        clip: IntRect,
        offset: IntPoint,
    ) {
        self.calls.push(Call::Draw(DrawCall {
            rect,
            opacity,
            transform: *transform,
            clip,
            offset,
            target: self.target,
            solid_color: effects.solid_color,
            texture: effects
                .texture
                .map(|t| (t.source.id, t.tile, t.source_rect)),
            surface: effects.surface.map(|s| s.surface),
            mask: effects.mask.map(|m| (m.source.id, m.is_3d)),
        }));
    }

    fn begin_frame(&mut self, viewport: IntRect, _clear: Color) {
        self.viewport = viewport;
        self.target = None;
    }

    fn end_frame(&mut self) {}

    fn max_texture_size(&self) -> u32 {
        4096
    }

    fn snapshot_surface(&mut self, surface: SurfaceId) -> Option<SurfaceSnapshot> {
        let size = self.live_surfaces.get(&surface.0)?.size();
        Some(SurfaceSnapshot {
            size,
            pixels: alloc::vec![0; (size.area() * 4) as usize],
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingDeallocator {
    pub(crate) destroyed: RefCell<Vec<SharedImage>>,
}

impl SurfaceDeallocator for RecordingDeallocator {
    fn destroy_shared_surface(&self, image: SharedImage) {
        self.destroyed.borrow_mut().push(image);
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeRegistry {
    pub(crate) version: Cell<u32>,
    pub(crate) image: RefCell<Option<SharedImage>>,
}

impl AsyncImageRegistry for FakeRegistry {
    fn version(&self, _id: AsyncContainerId) -> u32 {
        self.version.get()
    }

    fn image(&self, _id: AsyncContainerId) -> Option<AsyncFrame> {
        Some(AsyncFrame {
            image: self.image.borrow().clone()?,
            version: self.version.get(),
        })
    }

    fn swap_image(
        &self,
        _id: AsyncContainerId,
        previous: SharedImage,
    ) -> Result<AsyncFrame, SharedImage> {
        let mut slot = self.image.borrow_mut();
        let Some(image) = slot.take() else {
            return Err(previous);
        };
        *slot = (!previous.is_null()).then_some(previous);
        Ok(AsyncFrame {
            image,
            version: self.version.get(),
        })
    }

    fn bind_compositor_id(&self, _id: AsyncContainerId, _compositor_id: u64) {}
}

pub(crate) fn pixels(width: u32, height: u32) -> SharedImage {
    use alloc::sync::Arc;
    use alloc::vec;

    use crate::image::{PixelBuffer, PixelFormat};

    SharedImage::Pixels(PixelBuffer::new(
        IntSize::new(width, height),
        PixelFormat::Rgba8,
        Arc::from(vec![0xff_u8; (width * height * 4) as usize]),
    ))
}
