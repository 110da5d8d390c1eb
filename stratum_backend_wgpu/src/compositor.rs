// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The wgpu [`Compositor`].

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;
use stratum_core::backend::{Compositor, CompositorError, SurfaceInitMode, SurfaceSnapshot};
use stratum_core::effect::{Color, EffectChain, Filter};
use stratum_core::geom::{IntPoint, IntRect, IntSize};
use stratum_core::layer::SurfaceId;
use stratum_core::texture::{SharedHandleTable, TextureKind};
use stratum_core::transform::Transform3d;
use wgpu::util::DeviceExt as _;

use crate::gpu::{Gpu, WgpuError};
use crate::pipeline::{QuadPipeline, QuadUniforms, SourceKind};
use crate::readback;
use crate::texture::{Content, HandleTable, SharedTexture, WgpuTexture};

/// Settings for a [`WgpuCompositor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WgpuCompositorConfig {
    /// Largest texture or surface side, in pixels. The device limit wins
    /// when it is smaller.
    pub max_texture_size: u32,
    /// Format of the frame buffer and every surface.
    pub format: wgpu::TextureFormat,
}

impl Default for WgpuCompositorConfig {
    fn default() -> Self {
        Self {
            max_texture_size: 4096,
            format: wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

#[derive(Debug)]
struct Target {
    rect: IntRect,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Composites into a GPU texture.
///
/// Device pixel `(x, y)` of the frame lives at
/// `(x - viewport.x, y - viewport.y)` of the frame texture, as with the
/// software backend. Every draw is recorded and submitted on its own.
#[derive(Debug)]
pub struct WgpuCompositor {
    gpu: Gpu,
    config: WgpuCompositorConfig,
    pipeline: QuadPipeline,
    frame: Option<Target>,
    surfaces: HashMap<u32, Target>,
    next_surface: u32,
    next_texture: u64,
    target: Option<SurfaceId>,
    viewport: IntRect,
    saved_viewports: Vec<IntRect>,
    handles: HandleTable,
}

/// Where a draw lands: the texture to render into, its size, and the device
/// position of its top-left pixel.
struct Bound<'a> {
    view: &'a wgpu::TextureView,
    size: IntSize,
    origin: IntPoint,
}

/// Scissor for a draw, in target pixels; `None` when nothing is visible.
pub(crate) fn scissor(clip: IntRect, viewport: IntRect, origin: IntPoint, size: IntSize) -> Option<IntRect> {
    let r = clip
        .intersect(viewport)
        .translate(-origin.x, -origin.y)
        .intersect(IntRect::from_size(size));
    (!r.is_empty()).then_some(r)
}

/// Maps `rect` (pixels of a texture whose top-left pixel is `origin`) to
/// normalised coordinates.
fn uv_rect(rect: IntRect, origin: IntPoint, size: IntSize) -> [f32; 4] {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "texture coordinates are bounded by the texture limit"
    )]
    let n = |v: i32, o: i32, s: u32| ((f64::from(v) - f64::from(o)) / f64::from(s.max(1))) as f32;
    [
        n(rect.x, origin.x, size.width),
        n(rect.y, origin.y, size.height),
        n(rect.x1(), origin.x, size.width),
        n(rect.y1(), origin.y, size.height),
    ]
}

impl WgpuCompositor {
    /// Acquires a device and builds the pipeline.
    ///
    /// # Errors
    ///
    /// [`WgpuError::NoAdapter`] when no GPU is available, and
    /// [`WgpuError::UnsupportedFormat`] for targets other than 8-bit RGBA or
    /// BGRA.
    pub fn new(config: WgpuCompositorConfig) -> Result<Self, WgpuError> {
        Self::with_gpu(Gpu::new()?, config)
    }

    /// Builds on a device the application already owns.
    ///
    /// # Errors
    ///
    /// [`WgpuError::UnsupportedFormat`] for targets other than 8-bit RGBA or
    /// BGRA.
    pub fn with_gpu(gpu: Gpu, config: WgpuCompositorConfig) -> Result<Self, WgpuError> {
        if !matches!(
            config.format,
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Bgra8Unorm
        ) {
            return Err(WgpuError::UnsupportedFormat(config.format));
        }
        let pipeline = QuadPipeline::new(&gpu.device, config.format);
        Ok(Self {
            gpu,
            config,
            pipeline,
            frame: None,
            surfaces: HashMap::new(),
            next_surface: 0,
            next_texture: 0,
            target: None,
            viewport: IntRect::default(),
            saved_viewports: Vec::new(),
            handles: Rc::new(RefCell::new(SharedHandleTable::new())),
        })
    }

    /// The settings this compositor was created with.
    #[must_use]
    pub fn config(&self) -> WgpuCompositorConfig {
        self.config
    }

    /// The device and queue.
    #[must_use]
    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    /// The frame texture, once a frame has begun.
    #[must_use]
    pub fn frame_texture(&self) -> Option<&wgpu::Texture> {
        self.frame.as_ref().map(|f| &f.texture)
    }

    /// Number of surfaces currently allocated.
    #[must_use]
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    /// Makes `texture` available to shared-handle textures as `handle`.
    pub fn register_shared_handle(&mut self, handle: u64, texture: SharedTexture) {
        self.handles.borrow_mut().register(handle, texture);
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

    /// Reads the frame buffer back as premultiplied RGBA8.
    ///
    /// # Errors
    ///
    /// [`WgpuError::NoFrame`] before the first
    /// [`begin_frame`](Compositor::begin_frame), or a device error.
    pub fn read_frame(&self) -> Result<SurfaceSnapshot, WgpuError> {
        let frame = self.frame.as_ref().ok_or(WgpuError::NoFrame)?;
        readback::read_texture(&self.gpu, &frame.texture, self.config.format)
    }

    /// Reads a surface back as premultiplied RGBA8.
    ///
    /// # Errors
    ///
    /// [`WgpuError::UnknownSurface`] for ids that are not live, or a device
    /// error.
    pub fn read_surface(&self, surface: SurfaceId) -> Result<SurfaceSnapshot, WgpuError> {
        let target = self
            .surfaces
            .get(&surface.0)
            .ok_or(WgpuError::UnknownSurface(surface))?;
        readback::read_texture(&self.gpu, &target.texture, self.config.format)
    }

    fn limit(&self) -> u32 {
        self.config
            .max_texture_size
            .min(self.gpu.device.limits().max_texture_dimension_2d)
    }

    fn create_target(&self, label: &str, rect: IntRect) -> Target {
        let texture = self.gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: rect.width.max(1),
                height: rect.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Target { rect, texture, view }
    }

    fn bound_target(&self) -> Option<&Target> {
        match self.target {
            None => self.frame.as_ref(),
            Some(s) => self.surfaces.get(&s.0),
        }
    }

    fn bound(&self) -> Option<Bound<'_>> {
        let target = self.bound_target()?;
        Some(Bound {
            view: &target.view,
            size: target.rect.size(),
            origin: match self.target {
                None => target.rect.origin(),
                Some(_) => IntPoint::ZERO,
            },
        })
    }

    /// Clears `target` to `color`.
    fn clear(&self, target: &Target, color: Color) {
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("stratum clear"),
            });
        let [r, g, b, a] = color.premultiplied().map(f64::from);
        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("stratum clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        drop(pass);
        self.gpu.queue.submit(Some(encoder.finish()));
    }

    /// Copies the part of the bound target under `rect` (bound-target
    /// pixels) into `surface`.
    fn copy_from_bound(&self, rect: IntRect, surface: &Target) {
        let Some(previous) = self.bound_target() else {
            return;
        };
        let origin = match self.target {
            None => previous.rect.origin(),
            Some(_) => IntPoint::ZERO,
        };
        let src = rect
            .translate(-origin.x, -origin.y)
            .intersect(IntRect::from_size(previous.rect.size()));
        if src.is_empty() {
            return;
        }
        // Where the copied block starts inside the new surface.
        let dst_x = src.x + origin.x - rect.x;
        let dst_y = src.y + origin.y - rect.y;
        let to_u32 = |v: i32| u32::try_from(v).unwrap_or(0);

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("stratum copy from previous"),
            });
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &previous.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: to_u32(src.x),
                    y: to_u32(src.y),
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &surface.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: to_u32(dst_x),
                    y: to_u32(dst_y),
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: src.width,
                height: src.height,
                depth_or_array_layers: 1,
            },
        );
        self.gpu.queue.submit(Some(encoder.finish()));
    }

    /// Picks the views and uniforms for the colour source of a draw.
    ///
    /// Returns `None` when there is nothing to sample.
    fn source<'a>(
        &'a self,
        effects: &EffectChain<'a, WgpuTexture>,
        transform: &Transform3d,
        rect: kurbo::Rect,
        opacity: f32,
    ) -> Option<(QuadUniforms, [&'a wgpu::TextureView; 3], Filter)> {
        let placeholder = &self.pipeline.placeholder;
        if let Some(color) = effects.solid_color {
            let mut u = QuadUniforms::new(transform, rect, opacity, SourceKind::Solid);
            u.color = color.premultiplied();
            return Some((u, [placeholder; 3], Filter::Nearest));
        }
        if let Some(t) = &effects.texture {
            let (kind, views, uv) = match &t.source.content {
                Content::Empty => return None,
                Content::Direct { tiles, .. } => {
                    let tile = tiles.get(t.tile.unwrap_or(0))?;
                    let uv = uv_rect(t.source_rect, tile.rect.origin(), tile.rect.size());
                    (SourceKind::Rgba, [&tile.view, placeholder, placeholder], uv)
                }
                Content::Shared { texture, .. } => {
                    let uv = uv_rect(t.source_rect, IntPoint::ZERO, texture.size);
                    (SourceKind::Rgba, [&texture.view, placeholder, placeholder], uv)
                }
                Content::Planar(planes) => {
                    let picture = planes.picture.origin();
                    let uv = uv_rect(
                        t.source_rect,
                        IntPoint::new(-picture.x, -picture.y),
                        planes.luma,
                    );
                    (SourceKind::Planar, [&planes.y, &planes.cb, &planes.cr], uv)
                }
            };
            let mut u = QuadUniforms::new(transform, rect, opacity, kind);
            u.uv_rect = uv;
            return Some((u, views, t.filter));
        }
        if let Some(s) = effects.surface {
            let surface = self.surfaces.get(&s.surface.0)?;
            // Whole-pixel placement keeps surface blits exact.
            let filter = if transform.as_integer_translation().is_some() {
                Filter::Nearest
            } else {
                Filter::Linear
            };
            let u = QuadUniforms::new(transform, rect, opacity, SourceKind::Rgba);
            return Some((u, [&surface.view, placeholder, placeholder], filter));
        }
        None
    }
}

/// The view a mask samples alpha from.
fn mask_view(texture: &WgpuTexture) -> Option<&wgpu::TextureView> {
    match &texture.content {
        Content::Empty => None,
        Content::Direct { tiles, .. } => tiles.first().map(|t| &t.view),
        Content::Shared { texture, .. } => Some(&texture.view),
        Content::Planar(planes) => Some(&planes.y),
    }
}

impl Compositor for WgpuCompositor {
    type Texture = WgpuTexture;

    fn create_texture(&mut self, kind: TextureKind) -> WgpuTexture {
        self.next_texture += 1;
        WgpuTexture::new(
            self.next_texture,
            kind,
            self.limit(),
            self.gpu.clone(),
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
        let max = self.limit();
        if rect.width > max || rect.height > max {
            return Err(CompositorError::SurfaceTooLarge { rect, max });
        }

        let surface = self.create_target("stratum surface", rect);
        match init {
            SurfaceInitMode::Clear => self.clear(&surface, Color::TRANSPARENT),
            SurfaceInitMode::CopyFromPrevious => {
                self.clear(&surface, Color::TRANSPARENT);
                self.copy_from_bound(rect, &surface);
            }
            SurfaceInitMode::None => {}
        }

        self.next_surface += 1;
        let id = SurfaceId(self.next_surface);
        self.surfaces.insert(id.0, surface);
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
                self.viewport = self.frame.as_ref().map(|f| f.rect).unwrap_or_default();
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
        effects: &EffectChain<'_, WgpuTexture>,
        opacity: f32,
        transform: &Transform3d,
        clip: IntRect,
        offset: IntPoint,
    ) {
        if rect.width() <= 0.0 || rect.height() <= 0.0 || opacity <= 0.0 {
            return;
        }
        let Some(bound) = self.bound() else {
            tracing::warn!(target = ?self.target, "no bound target; draw dropped");
            return;
        };
        let Some(scissor) = scissor(clip, self.viewport, bound.origin, bound.size) else {
            return;
        };
        let Some((mut uniforms, views, filter)) = self.source(effects, transform, rect, opacity)
        else {
            tracing::debug!("quad has no colour source");
            return;
        };
        uniforms.set_viewport(
            bound.size.width,
            bound.size.height,
            bound.origin.x + offset.x,
            bound.origin.y + offset.y,
        );

        let mut mask_tex = &self.pipeline.placeholder;
        if let Some(m) = &effects.mask {
            let Some(inverse) = m.transform.plane_homography().inverse() else {
                tracing::debug!("mask transform is singular; quad fully masked");
                return;
            };
            let Some(view) = mask_view(m.source) else {
                return;
            };
            uniforms.set_mask(&inverse, m.size.width, m.size.height);
            mask_tex = view;
        }

        let device = &self.gpu.device;
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("stratum quad uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let sampler = match filter {
            Filter::Nearest => &self.pipeline.nearest,
            Filter::Linear => &self.pipeline.linear,
        };
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("stratum quad bind group"),
            layout: &self.pipeline.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(views[2]),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(mask_tex),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&self.pipeline.linear),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("stratum quad encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("stratum quad pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: bound.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            let to_u32 = |v: i32| u32::try_from(v).unwrap_or(0);
            pass.set_scissor_rect(to_u32(scissor.x), to_u32(scissor.y), scissor.width, scissor.height);
            pass.set_pipeline(&self.pipeline.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        self.gpu.queue.submit(Some(encoder.finish()));
    }

    fn begin_frame(&mut self, viewport: IntRect, clear: Color) {
        let frame = match self.frame.take() {
            Some(mut f) if f.rect.size() == viewport.size() => {
                f.rect = viewport;
                f
            }
            _ => self.create_target("stratum frame", viewport),
        };
        self.clear(&frame, clear);
        self.frame = Some(frame);
        self.viewport = viewport;
        self.target = None;
        self.saved_viewports.clear();
    }

    fn end_frame(&mut self) {
        if !self.surfaces.is_empty() {
            tracing::warn!(count = self.surfaces.len(), "surfaces outlived the frame");
        }
        if !self.saved_viewports.is_empty() {
            tracing::warn!(depth = self.saved_viewports.len(), "unbalanced viewport saves");
        }
        tracing::debug!("frame submitted");
    }

    fn max_texture_size(&self) -> u32 {
        self.limit()
    }

    fn snapshot_surface(&mut self, surface: SurfaceId) -> Option<SurfaceSnapshot> {
        match self.read_surface(surface) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!(?surface, %err, "surface readback failed");
                None
            }
        }
    }
}
