// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-draw effect chains.
//!
//! An [`EffectChain`] is built fresh for every
//! [`draw_quad`](crate::backend::Compositor::draw_quad) call and never
//! stored. Its slots are, in order: solid colour, texture, surface, mask.
//! The first three are alternative colour sources (a backend uses the first
//! one present); the mask modulates whichever source is used.

use core::fmt;

use crate::geom::{IntRect, IntSize};
use crate::layer::SurfaceId;
use crate::texture::TextureSource;
use crate::transform::Transform3d;

/// A straight-alpha RGBA colour with components in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Creates a colour from straight-alpha components.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the colour with alpha premultiplied into RGB.
    #[must_use]
    pub fn premultiplied(self) -> [f32; 4] {
        [self.r * self.a, self.g * self.a, self.b * self.a, self.a]
    }
}

/// Texture sampling filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Filter {
    /// Nearest-neighbour sampling.
    Nearest,
    /// Bilinear sampling.
    #[default]
    Linear,
}

/// Samples a locked texture.
///
/// `source_rect` (in image pixels) is stretched over the quad. When `tile`
/// is set, the backend samples that tile's storage; `source_rect` stays in
/// whole-image coordinates.
pub struct TextureEffect<'a, T> {
    /// The texture to sample.
    pub source: &'a T,
    /// Tile index for tiled sources.
    pub tile: Option<usize>,
    /// Sampled region in whole-image pixels.
    pub source_rect: IntRect,
    /// Sampling filter.
    pub filter: Filter,
}

/// Samples an intermediate surface, stretching all of it over the quad.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceEffect {
    /// Surface to sample.
    pub surface: SurfaceId,
}

/// Modulates coverage by a mask texture's alpha.
///
/// The mask is positioned by `transform`, which maps mask pixels into the
/// same space as the draw's transform output (before the draw offset is
/// subtracted). Outside the mask every pixel is masked out.
pub struct MaskEffect<'a, T> {
    /// Mask texture.
    pub source: &'a T,
    /// Mask size in pixels.
    pub size: IntSize,
    /// Mask placement.
    pub transform: Transform3d,
    /// Whether the masked quad's transform needs perspective-correct mask
    /// sampling.
    pub is_3d: bool,
}

/// Optional effects applied to one draw.
pub struct EffectChain<'a, T> {
    /// Flat colour fill.
    pub solid_color: Option<Color>,
    /// Texture sampling.
    pub texture: Option<TextureEffect<'a, T>>,
    /// Intermediate surface sampling.
    pub surface: Option<SurfaceEffect>,
    /// Mask modulation.
    pub mask: Option<MaskEffect<'a, T>>,
}

impl<T> EffectChain<'_, T> {
    /// Creates an empty chain.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            solid_color: None,
            texture: None,
            surface: None,
            mask: None,
        }
    }

    /// Returns `true` if no colour source is set.
    #[must_use]
    pub const fn has_no_source(&self) -> bool {
        self.solid_color.is_none() && self.texture.is_none() && self.surface.is_none()
    }
}

impl<T> Default for EffectChain<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impls: the chain only holds shared references to `T`, so copying
// it never requires `T: Copy`.

impl<T> Clone for TextureEffect<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TextureEffect<'_, T> {}

impl<T> Clone for MaskEffect<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MaskEffect<'_, T> {}

impl<T> Clone for EffectChain<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EffectChain<'_, T> {}

impl<T: TextureSource> fmt::Debug for TextureEffect<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureEffect")
            .field("source", &self.source.handle())
            .field("tile", &self.tile)
            .field("source_rect", &self.source_rect)
            .field("filter", &self.filter)
            .finish()
    }
}

impl<T: TextureSource> fmt::Debug for MaskEffect<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskEffect")
            .field("source", &self.source.handle())
            .field("size", &self.size)
            .field("transform", &self.transform)
            .field("is_3d", &self.is_3d)
            .finish()
    }
}

impl<T: TextureSource> fmt::Debug for EffectChain<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectChain")
            .field("solid_color", &self.solid_color)
            .field("texture", &self.texture)
            .field("surface", &self.surface)
            .field("mask", &self.mask)
            .finish()
    }
}
