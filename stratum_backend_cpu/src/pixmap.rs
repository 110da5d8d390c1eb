// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Premultiplied RGBA8 pixel storage.

use stratum_core::backend::SurfaceSnapshot;
use stratum_core::effect::{Color, Filter};
use stratum_core::geom::{IntPoint, IntRect, IntSize};

/// A tightly packed grid of premultiplied RGBA8 pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct Pixmap {
    size: IntSize,
    data: Vec<u8>,
}

impl core::fmt::Debug for Pixmap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pixmap")
            .field("size", &self.size)
            .field("bytes", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl Default for Pixmap {
    fn default() -> Self {
        Self::new(IntSize::default())
    }
}

impl Pixmap {
    /// Creates a transparent pixmap.
    #[must_use]
    pub fn new(size: IntSize) -> Self {
        Self {
            size,
            data: vec![0; byte_len(size)],
        }
    }

    /// Wraps tightly packed premultiplied RGBA8 bytes.
    ///
    /// Returns `None` if `data` does not hold exactly `size` pixels.
    #[must_use]
    pub fn from_rgba8(size: IntSize, data: Vec<u8>) -> Option<Self> {
        (data.len() == byte_len(size)).then_some(Self { size, data })
    }

    /// Creates a pixmap filled with `color`.
    #[must_use]
    pub fn filled(size: IntSize, color: Color) -> Self {
        let mut p = Self::new(size);
        p.fill(color);
        p
    }

    /// Dimensions in pixels.
    #[must_use]
    pub fn size(&self) -> IntSize {
        self.size
    }

    /// Raw premultiplied RGBA8 bytes, row-major.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Sets every pixel to `color`.
    pub fn fill(&mut self, color: Color) {
        let px = to_rgba8(color.premultiplied());
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    /// Returns the pixel at `(x, y)`, or transparent outside the pixmap.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        match self.offset_of(x, y) {
            Some(i) => [
                self.data[i],
                self.data[i + 1],
                self.data[i + 2],
                self.data[i + 3],
            ],
            None => [0; 4],
        }
    }

    /// Overwrites the pixel at `(x, y)`. Writes outside the pixmap are
    /// ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, px: [u8; 4]) {
        if let Some(i) = self.offset_of(x, y) {
            self.data[i..i + 4].copy_from_slice(&px);
        }
    }

    /// Copies `src_rect` of `src` so that its origin lands on `dst`.
    ///
    /// Parts of the rectangle outside either pixmap are skipped.
    pub fn copy_from(&mut self, src: &Self, src_rect: IntRect, dst: IntPoint) {
        let clipped = src_rect.intersect(IntRect::from_size(src.size));
        for y in clipped.y..clipped.y1() {
            for x in clipped.x..clipped.x1() {
                let dx = dst.x + (x - src_rect.x);
                let dy = dst.y + (y - src_rect.y);
                self.set_pixel(dx, dy, src.pixel(x, y));
            }
        }
    }

    /// Source-over blends a premultiplied colour onto `(x, y)`.
    pub(crate) fn blend(&mut self, x: i32, y: i32, src: [f32; 4]) {
        let Some(i) = self.offset_of(x, y) else {
            return;
        };
        let inv = 1.0 - src[3];
        for (c, s) in src.iter().enumerate() {
            let d = f32::from(self.data[i + c]) / 255.0;
            self.data[i + c] = unit_to_u8(s + d * inv);
        }
    }

    /// Samples the pixmap as premultiplied `[0, 1]` components.
    ///
    /// `(u, v)` are in pixel units; pixel `i` spans `i..i + 1`. Samples
    /// clamp to the edge.
    #[must_use]
    pub fn sample(&self, u: f64, v: f64, filter: Filter) -> [f32; 4] {
        let texel = |x: i32, y: i32| {
            let p = self.pixel(
                x.clamp(0, self.size.width as i32 - 1),
                y.clamp(0, self.size.height as i32 - 1),
            );
            p.map(|c| f32::from(c) / 255.0)
        };
        if self.size.is_empty() {
            return [0.0; 4];
        }
        sample_with(u, v, filter, texel)
    }

    /// Copies the pixels out as a diagnostics snapshot.
    #[must_use]
    pub fn to_snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            size: self.size,
            pixels: self.data.clone(),
        }
    }

    fn offset_of(&self, x: i32, y: i32) -> Option<usize> {
        let (x, y) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        Some((y as usize * self.size.width as usize + x as usize) * 4)
    }
}

/// Nearest or bilinear lookup over any texel fetch.
pub(crate) fn sample_with<const N: usize>(
    u: f64,
    v: f64,
    filter: Filter,
    texel: impl Fn(i32, i32) -> [f32; N],
) -> [f32; N] {
    match filter {
        Filter::Nearest => texel(floor_i32(u), floor_i32(v)),
        Filter::Linear => {
            let (fu, fv) = (u - 0.5, v - 0.5);
            let (x0, y0) = (floor_i32(fu), floor_i32(fv));
            #[expect(
                clippy::cast_possible_truncation,
                reason = "bilinear weights are in 0..1"
            )]
            let (tx, ty) = ((fu - fu.floor()) as f32, (fv - fv.floor()) as f32);
            let (a, b) = (texel(x0, y0), texel(x0 + 1, y0));
            let (c, d) = (texel(x0, y0 + 1), texel(x0 + 1, y0 + 1));
            core::array::from_fn(|i| {
                let top = a[i] + (b[i] - a[i]) * tx;
                let bottom = c[i] + (d[i] - c[i]) * tx;
                top + (bottom - top) * ty
            })
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "texture coordinates are far inside the i32 range"
)]
fn floor_i32(v: f64) -> i32 {
    v.floor() as i32
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "value is clamped to the u8 range before the cast"
)]
pub(crate) fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub(crate) fn to_rgba8(c: [f32; 4]) -> [u8; 4] {
    c.map(unit_to_u8)
}

fn byte_len(size: IntSize) -> usize {
    size.width as usize * size.height as usize * 4
}
