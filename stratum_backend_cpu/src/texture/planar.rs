// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Planar Y/Cb/Cr textures, converted to RGB at sample time.

use stratum_core::effect::Filter;
use stratum_core::geom::{IntRect, IntSize};
use stratum_core::image::{Plane, YCbCrImage};
use stratum_core::texture::TextureError;

use crate::pixmap::sample_with;

/// One plane copied into tightly packed storage.
#[derive(Debug)]
pub(crate) struct PlaneData {
    size: IntSize,
    samples: Vec<u8>,
}

impl PlaneData {
    fn copy(plane: &Plane) -> Self {
        let w = plane.size.width as usize;
        let mut samples = Vec::with_capacity(w * plane.size.height as usize);
        for y in 0..plane.size.height as usize {
            let start = y * plane.stride as usize;
            samples.extend_from_slice(&plane.data[start..start + w]);
        }
        Self {
            size: plane.size,
            samples,
        }
    }

    fn texel(&self, x: i32, y: i32) -> [f32; 1] {
        let x = x.clamp(0, self.size.width as i32 - 1) as usize;
        let y = y.clamp(0, self.size.height as i32 - 1) as usize;
        [f32::from(self.samples[y * self.size.width as usize + x])]
    }

    fn sample(&self, u: f64, v: f64, filter: Filter) -> f32 {
        sample_with(u, v, filter, |x, y| self.texel(x, y))[0]
    }
}

/// The three planes of one picture.
#[derive(Debug)]
pub(crate) struct PlanarFrame {
    y: PlaneData,
    cb: PlaneData,
    cr: PlaneData,
    picture: IntRect,
}

impl PlanarFrame {
    /// Validates every plane, then copies all three.
    pub(crate) fn upload(image: &YCbCrImage, max: u32) -> Result<Self, TextureError> {
        image.validate(max)?;
        Ok(Self {
            y: PlaneData::copy(&image.y),
            cb: PlaneData::copy(&image.cb),
            cr: PlaneData::copy(&image.cr),
            picture: image.picture,
        })
    }

    /// Displayed size.
    pub(crate) fn size(&self) -> IntSize {
        self.picture.size()
    }

    /// Samples the picture at `(u, v)` (picture pixels), returning opaque
    /// premultiplied RGBA.
    pub(crate) fn sample(&self, u: f64, v: f64, filter: Filter) -> [f32; 4] {
        let lu = u + f64::from(self.picture.x);
        let lv = v + f64::from(self.picture.y);
        let sx = f64::from(self.cb.size.width) / f64::from(self.y.size.width);
        let sy = f64::from(self.cb.size.height) / f64::from(self.y.size.height);
        let luma = self.y.sample(lu, lv, filter);
        let cb = self.cb.sample(lu * sx, lv * sy, filter);
        let cr = self.cr.sample(lu * sx, lv * sy, filter);
        let [r, g, b] = bt601_limited(luma, cb, cr);
        [r, g, b, 1.0]
    }
}

/// Converts 8-bit limited-range BT.601 samples to RGB in `[0, 1]`.
pub(crate) fn bt601_limited(y: f32, cb: f32, cr: f32) -> [f32; 3] {
    let y = (y - 16.0) / 219.0;
    let cb = (cb - 128.0) / 224.0;
    let cr = (cr - 128.0) / 224.0;
    [
        (y + 1.402 * cr).clamp(0.0, 1.0),
        (y - 0.344_136 * cb - 0.714_136 * cr).clamp(0.0, 1.0),
        (y + 1.772 * cb).clamp(0.0, 1.0),
    ]
}
