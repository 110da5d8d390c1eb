// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for GPU (and software) compositors.
//!
//! A backend crate provides three pieces:
//!
//! - **Textures**: one [`TextureSource`] type covering every
//!   [`TextureKind`], created through [`Compositor::create_texture`].
//! - **Render targets**: intermediate surfaces created per container pass,
//!   plus a bound-target stack managed by the composition pass through
//!   [`render_target`](Compositor::render_target),
//!   [`set_render_target`](Compositor::set_render_target), and the viewport
//!   save/restore pair.
//! - **The draw primitive**: [`Compositor::draw_quad`].
//!
//! # Crate boundaries
//!
//! `stratum_core` owns the layer tree, texture hosts, and the composition
//! algorithm. Backend crates depend on `stratum_core` and implement this
//! trait. Application code wires a [`LayerManager`] to a backend:
//!
//! ```rust,ignore
//! compositor.begin_frame(viewport, config.clear_color);
//! let report = manager.composite(&mut compositor, &mut ctx);
//! compositor.end_frame();
//! ```
//!
//! [`LayerManager`]: crate::composite::LayerManager

use alloc::vec::Vec;

use crate::buffer::BufferHost;
use crate::effect::{Color, EffectChain};
use crate::geom::{IntPoint, IntRect, IntSize};
use crate::layer::SurfaceId;
use crate::texture::{Buffering, TextureHost, TextureKind, TextureSource};
use crate::transform::Transform3d;

/// How a new intermediate surface is seeded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SurfaceInitMode {
    /// Cleared to transparent.
    #[default]
    Clear,
    /// Copied from the currently bound target; the surface rectangle is in
    /// that target's pixel space.
    CopyFromPrevious,
    /// Left as allocated; the caller will cover every pixel.
    None,
}

/// Why a surface could not be created.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompositorError {
    /// The requested rectangle has no pixels.
    #[error("cannot create an empty {0:?} surface")]
    EmptySurface(IntRect),
    /// The requested rectangle exceeds the backend's limit.
    #[error("surface {rect:?} exceeds the maximum size {max}")]
    SurfaceTooLarge {
        /// Requested rectangle.
        rect: IntRect,
        /// Backend limit per dimension.
        max: u32,
    },
    /// The surface id does not name a live surface.
    #[error("unknown surface {0:?}")]
    UnknownSurface(SurfaceId),
}

/// Premultiplied RGBA8 pixels read back from a surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceSnapshot {
    /// Dimensions in pixels.
    pub size: IntSize,
    /// Tightly packed rows, premultiplied RGBA8.
    pub pixels: Vec<u8>,
}

/// Resource factory and draw primitive for the composition pass.
///
/// All methods run on the rendering thread.
pub trait Compositor {
    /// The backend's texture type.
    type Texture: TextureSource;

    /// Creates an empty texture of the given representation.
    fn create_texture(&mut self, kind: TextureKind) -> Self::Texture;

    /// Creates a buffer host holding one texture host of `kind`.
    fn create_buffer_host(
        &mut self,
        kind: TextureKind,
        buffering: Buffering,
    ) -> BufferHost<Self::Texture> {
        let mut host = BufferHost::new();
        host.add_texture_host(kind, TextureHost::new(self.create_texture(kind), buffering));
        host
    }

    /// Allocates an intermediate render target covering `rect`.
    ///
    /// With [`SurfaceInitMode::CopyFromPrevious`], pixels are copied from
    /// the currently bound target at `rect`; parts of `rect` outside that
    /// target start transparent.
    ///
    /// # Errors
    ///
    /// Returns [`CompositorError`] if `rect` is empty or too large.
    fn create_surface(
        &mut self,
        rect: IntRect,
        init: SurfaceInitMode,
    ) -> Result<SurfaceId, CompositorError>;

    /// Frees a surface. Unknown ids are ignored.
    fn release_surface(&mut self, surface: SurfaceId);

    /// The bound target; `None` is the frame buffer.
    fn render_target(&self) -> Option<SurfaceId>;

    /// Binds a target for subsequent draws. Binding a surface makes the
    /// viewport cover that surface.
    fn set_render_target(&mut self, target: Option<SurfaceId>);

    /// Pushes the current viewport.
    fn save_viewport(&mut self);

    /// Pops the viewport pushed by the matching
    /// [`save_viewport`](Self::save_viewport).
    fn restore_viewport(&mut self);

    /// Current viewport in target pixels.
    fn viewport(&self) -> IntRect;

    /// Draws `rect` (layer space) through `transform`, minus `offset`, into
    /// the bound target, limited to `clip` (target pixels).
    ///
    /// Non-integer translations, rotations, and perspective are all
    /// honoured; pixels outside `clip` are never touched.
    fn draw_quad(
        &mut self,
        rect: kurbo::Rect,
        effects: &EffectChain<'_, Self::Texture>,
        opacity: f32,
        transform: &Transform3d,
        clip: IntRect,
        offset: IntPoint,
    );

    /// Starts a frame: binds the frame buffer, sizes it to `viewport`, and
    /// clears it to `clear`.
    fn begin_frame(&mut self, viewport: IntRect, clear: Color);

    /// Finishes a frame.
    fn end_frame(&mut self);

    /// Largest texture or surface dimension the backend supports.
    fn max_texture_size(&self) -> u32;

    /// Reads a surface back for diagnostics.
    fn snapshot_surface(&mut self, surface: SurfaceId) -> Option<SurfaceSnapshot> {
        _ = surface;
        None
    }
}
