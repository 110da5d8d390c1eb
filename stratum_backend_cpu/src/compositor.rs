// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The software [`Compositor`].

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;
use std::sync::Arc;

use hashbrown::HashMap;
use stratum_core::backend::{Compositor, CompositorError, SurfaceInitMode, SurfaceSnapshot};
use stratum_core::effect::{Color, EffectChain, Filter};
use stratum_core::geom::{IntPoint, IntRect};
use stratum_core::layer::SurfaceId;
use stratum_core::texture::{SharedHandleTable, TextureKind};
use stratum_core::transform::Transform3d;

use crate::pixmap::Pixmap;
use crate::raster::{self, Mask, Quad, Source};
use crate::texture::{CpuTexture, HandleTable};

/// Settings for a [`CpuCompositor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuCompositorConfig {
    /// Largest texture or surface side, in pixels. Direct textures above it
    /// are tiled; larger surfaces fail to allocate.
    pub max_texture_size: u32,
}

impl Default for CpuCompositorConfig {
    fn default() -> Self {
        Self {
            max_texture_size: 4096,
        }
    }
}

/// Counters for the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Quads that shaded at least one pixel.
    pub quads: u32,
    /// Pixels shaded.
    pub pixels: u64,
    /// Surfaces allocated.
    pub surfaces: u32,
    /// Most surfaces alive at once.
    pub peak_surfaces: u32,
}

#[derive(Debug)]
struct Surface {
    rect: IntRect,
    pixmap: Pixmap,
}

/// Composites into a premultiplied RGBA8 frame buffer in memory.
///
/// The frame buffer covers the viewport passed to
/// [`begin_frame`](Compositor::begin_frame); device pixel `(x, y)` of the
/// frame lives at `(x - viewport.x, y - viewport.y)` in [`frame`](Self::frame).
/// Surfaces are addressed from their own top-left corner.
#[derive(Debug)]
pub struct CpuCompositor {
    config: CpuCompositorConfig,
    frame: Pixmap,
    frame_rect: IntRect,
    surfaces: HashMap<u32, Surface>,
    next_surface: u32,
    next_texture: u64,
    target: Option<SurfaceId>,
    viewport: IntRect,
    saved_viewports: Vec<IntRect>,
    handles: HandleTable,
    stats: FrameStats,
}

impl Default for CpuCompositor {
    fn default() -> Self {
        Self::new(CpuCompositorConfig::default())
    }
}

impl CpuCompositor {
    /// Creates a compositor with an empty frame buffer.
    #[must_use]
    pub fn new(config: CpuCompositorConfig) -> Self {
        Self {
            config,
            frame: Pixmap::default(),
            frame_rect: IntRect::default(),
            surfaces: HashMap::new(),
            next_surface: 0,
            next_texture: 0,
            target: None,
            viewport: IntRect::default(),
            saved_viewports: Vec::new(),
            handles: Rc::new(RefCell::new(SharedHandleTable::new())),
            stats: FrameStats::default(),
        }
    }

    /// The settings this compositor was created with.
    #[must_use]
    pub fn config(&self) -> CpuCompositorConfig {
        self.config
    }

    /// The frame buffer.
    #[must_use]
    pub fn frame(&self) -> &Pixmap {
        &self.frame
    }

    /// Counters for the frame in progress (or the last one finished).
    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Number of surfaces currently allocated.
    #[must_use]
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    /// Makes `pixmap` available to shared-handle textures as `handle`.
    pub fn register_shared_handle(&mut self, handle: u64, pixmap: Pixmap) {
        self.handles.borrow_mut().register(handle, Arc::new(pixmap));
    }

    /// Withdraws a shared handle. Textures that already opened it keep
    /// their content.
    pub fn unregister_shared_handle(&mut self, handle: u64) -> bool {
        self.handles.borrow_mut().unregister(handle).is_some()
    }

    /// Number of textures holding `handle` open.
    #[must_use]
    pub fn shared_handle_opens(&self, handle: u64) -> u32 {
        self.handles.borrow().open_count(handle)
    }

    fn target_origin(&self) -> IntPoint {
        match self.target {
            None => self.frame_rect.origin(),
            Some(_) => IntPoint::ZERO,
        }
    }

    fn target_pixmap(&self) -> Option<&Pixmap> {
        match self.target {
            None => Some(&self.frame),
            Some(s) => self.surfaces.get(&s.0).map(|s| &s.pixmap),
        }
    }

    /// Moves the bound target's pixels out so they can be drawn into while
    /// other surfaces are sampled.
    fn take_target(&mut self) -> Option<Pixmap> {
        match self.target {
            None => Some(mem::take(&mut self.frame)),
            Some(s) => self.surfaces.get_mut(&s.0).map(|s| mem::take(&mut s.pixmap)),
        }
    }

    fn put_target(&mut self, pixmap: Pixmap) {
        match self.target {
            None => self.frame = pixmap,
            Some(s) => {
                if let Some(surface) = self.surfaces.get_mut(&s.0) {
                    surface.pixmap = pixmap;
                }
            }
        }
    }
}

impl Compositor for CpuCompositor {
    type Texture = CpuTexture;

    fn create_texture(&mut self, kind: TextureKind) -> CpuTexture {
        self.next_texture += 1;
        CpuTexture::new(
            self.next_texture,
            kind,
            self.config.max_texture_size,
            self.handles.clone(),
        )
    }

    fn create_surface(
        &mut self,
        rect: IntRect,
        init: SurfaceInitMode,
    ) -> Result<SurfaceId, CompositorError> {
        if rect.is_empty() {
            return Err(CompositorError::EmptySurface(rect));
        }
        let max = self.config.max_texture_size;
        if rect.width > max || rect.height > max {
            return Err(CompositorError::SurfaceTooLarge { rect, max });
        }

        let mut pixmap = Pixmap::new(rect.size());
        if init == SurfaceInitMode::CopyFromPrevious {
            let origin = self.target_origin();
            if let Some(previous) = self.target_pixmap() {
                pixmap.copy_from(
                    previous,
                    rect.translate(-origin.x, -origin.y),
                    IntPoint::ZERO,
                );
            }
        }

        self.next_surface += 1;
        let id = SurfaceId(self.next_surface);
        self.surfaces.insert(id.0, Surface { rect, pixmap });
        self.stats.surfaces += 1;
        let live = u32::try_from(self.surfaces.len()).unwrap_or(u32::MAX);
        self.stats.peak_surfaces = self.stats.peak_surfaces.max(live);
        tracing::trace!(?id, ?rect, ?init, "surface created");
        Ok(id)
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        if self.target == Some(surface) {
            tracing::warn!(?surface, "releasing the bound surface; binding the frame buffer");
            self.target = None;
        }
        if self.surfaces.remove(&surface.0).is_none() {
            tracing::debug!(?surface, "release of unknown surface ignored");
        }
    }

    fn render_target(&self) -> Option<SurfaceId> {
        self.target
    }

    fn set_render_target(&mut self, target: Option<SurfaceId>) {
        match target {
            None => {
                self.target = None;
                self.viewport = self.frame_rect;
            }
            Some(s) => match self.surfaces.get(&s.0) {
                Some(surface) => {
                    self.target = target;
                    self.viewport = IntRect::from_size(surface.rect.size());
                }
                None => tracing::warn!(surface = ?s, "cannot bind unknown surface"),
            },
        }
    }

    fn save_viewport(&mut self) {
        self.saved_viewports.push(self.viewport);
    }

    fn restore_viewport(&mut self) {
        match self.saved_viewports.pop() {
            Some(v) => self.viewport = v,
            None => tracing::warn!("viewport restore without a matching save"),
        }
    }

    fn viewport(&self) -> IntRect {
        self.viewport
    }

    fn draw_quad(
        &mut self,
        rect: kurbo::Rect,
        effects: &EffectChain<'_, CpuTexture>,
        opacity: f32,
        transform: &Transform3d,
        clip: IntRect,
        offset: IntPoint,
    ) {
        let Some(mut target) = self.take_target() else {
            tracing::warn!(target = ?self.target, "bound surface is gone; draw dropped");
            return;
        };
        let origin = self.target_origin();

        let source = if let Some(color) = effects.solid_color {
            Some(Source::Solid(color.premultiplied()))
        } else if let Some(t) = &effects.texture {
            Some(Source::Texture {
                texture: t.source,
                tile: t.tile,
                rect: t.source_rect,
                filter: t.filter,
            })
        } else if let Some(s) = effects.surface {
            // Whole-pixel placement keeps surface blits exact.
            let filter = if transform.as_integer_translation().is_some() {
                Filter::Nearest
            } else {
                Filter::Linear
            };
            self.surfaces.get(&s.surface.0).map(|surface| Source::Surface {
                pixmap: &surface.pixmap,
                filter,
            })
        } else {
            None
        };

        let mask = match &effects.mask {
            Some(m) => match Mask::new(m.source, m.size, &m.transform) {
                Some(mask) => Some(mask),
                None => {
                    tracing::debug!("mask transform is singular; quad fully masked");
                    self.put_target(target);
                    return;
                }
            },
            None => None,
        };

        let shaded = match source {
            Some(source) => {
                let quad = Quad {
                    rect,
                    source,
                    mask,
                    opacity,
                    transform: *transform,
                    offset,
                };
                raster::draw(&mut target, origin, clip.intersect(self.viewport), &quad)
            }
            None => {
                tracing::debug!("quad has no colour source");
                0
            }
        };
        if shaded > 0 {
            self.stats.quads += 1;
            self.stats.pixels += shaded;
        }
        self.put_target(target);
    }

    fn begin_frame(&mut self, viewport: IntRect, clear: Color) {
        if self.frame.size() == viewport.size() {
            self.frame.fill(clear);
        } else {
            self.frame = Pixmap::filled(viewport.size(), clear);
        }
        self.frame_rect = viewport;
        self.viewport = viewport;
        self.target = None;
        self.saved_viewports.clear();
        self.stats = FrameStats::default();
    }

    fn end_frame(&mut self) {
        if !self.surfaces.is_empty() {
            tracing::warn!(count = self.surfaces.len(), "surfaces outlived the frame");
        }
        if !self.saved_viewports.is_empty() {
            tracing::warn!(depth = self.saved_viewports.len(), "unbalanced viewport saves");
        }
        tracing::debug!(stats = ?self.stats, "frame finished");
    }

    fn max_texture_size(&self) -> u32 {
        self.config.max_texture_size
    }

    fn snapshot_surface(&mut self, surface: SurfaceId) -> Option<SurfaceSnapshot> {
        self.surfaces.get(&surface.0).map(|s| s.pixmap.to_snapshot())
    }
}
