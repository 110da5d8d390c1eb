// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Quad rasterisation.
//!
//! Every device pixel whose centre maps back inside the quad is shaded.
//! The map is the inverse of the transform's plane homography, so affine
//! and perspective transforms share one path. There is no edge
//! anti-aliasing.

use kurbo::{Point, Rect};
use stratum_core::effect::Filter;
use stratum_core::geom::{IntPoint, IntRect, IntSize};
use stratum_core::transform::{Homography, Transform3d};

use crate::pixmap::Pixmap;
use crate::texture::CpuTexture;

/// Where a quad's colour comes from.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Source<'a> {
    /// Premultiplied colour.
    Solid([f32; 4]),
    /// `rect` of the texture (whole-image pixels) stretched over the quad.
    Texture {
        texture: &'a CpuTexture,
        tile: Option<usize>,
        rect: IntRect,
        filter: Filter,
    },
    /// A whole pixmap stretched over the quad.
    Surface { pixmap: &'a Pixmap, filter: Filter },
}

/// Alpha modulation by a texture placed with its own transform.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Mask<'a> {
    pub(crate) texture: &'a CpuTexture,
    pub(crate) size: IntSize,
    pub(crate) inverse: Homography,
}

impl<'a> Mask<'a> {
    /// Returns `None` when the mask transform cannot be inverted; such a
    /// mask covers nothing.
    pub(crate) fn new(texture: &'a CpuTexture, size: IntSize, transform: &Transform3d) -> Option<Self> {
        Some(Self {
            texture,
            size,
            inverse: transform.plane_homography().inverse()?,
        })
    }

    fn coverage(&self, q: Point) -> f32 {
        let m = self.inverse.apply_unchecked(q);
        let inside = m.x >= 0.0
            && m.y >= 0.0
            && m.x < f64::from(self.size.width)
            && m.y < f64::from(self.size.height);
        if !inside {
            return 0.0;
        }
        self.texture.sample(None, m.x, m.y, Filter::Linear)[3]
    }
}

/// One draw, in the terms of [`Compositor::draw_quad`].
///
/// [`Compositor::draw_quad`]: stratum_core::backend::Compositor::draw_quad
#[derive(Clone, Copy, Debug)]
pub(crate) struct Quad<'a> {
    pub(crate) rect: Rect,
    pub(crate) source: Source<'a>,
    pub(crate) mask: Option<Mask<'a>>,
    pub(crate) opacity: f32,
    pub(crate) transform: Transform3d,
    pub(crate) offset: IntPoint,
}

impl Quad<'_> {
    fn color_at(&self, p: Point) -> [f32; 4] {
        let r = self.rect;
        let fx = (p.x - r.x0) / r.width();
        let fy = (p.y - r.y0) / r.height();
        match self.source {
            Source::Solid(c) => c,
            Source::Texture {
                texture,
                tile,
                rect,
                filter,
            } => {
                let u = f64::from(rect.x) + fx * f64::from(rect.width);
                let v = f64::from(rect.y) + fy * f64::from(rect.height);
                texture.sample(tile, u, v, filter)
            }
            Source::Surface { pixmap, filter } => {
                let size = pixmap.size();
                pixmap.sample(
                    fx * f64::from(size.width),
                    fy * f64::from(size.height),
                    filter,
                )
            }
        }
    }
}

/// Draws `quad` into `target`, whose pixel `(0, 0)` sits at device
/// position `origin`. Only device pixels inside `bounds` are touched.
///
/// Returns the number of pixels shaded.
pub(crate) fn draw(target: &mut Pixmap, origin: IntPoint, bounds: IntRect, quad: &Quad<'_>) -> u64 {
    if quad.rect.width() <= 0.0 || quad.rect.height() <= 0.0 || quad.opacity <= 0.0 {
        return 0;
    }
    let forward = quad.transform.plane_homography();
    let Some(inverse) = forward.inverse() else {
        tracing::trace!("singular transform; quad covers nothing");
        return 0;
    };
    let target_rect = IntRect::from_size(target.size()).translate(origin.x, origin.y);
    let mut area = bounds.intersect(target_rect);
    // Off-plane corners leave the whole area to be scanned.
    if let Some(b) = quad
        .transform
        .transform_rect_bounds(quad.rect)
        .and_then(|b| IntRect::round_from(b.expand()))
    {
        area = area.intersect(b.translate(-quad.offset.x, -quad.offset.y));
    }

    let (ox, oy) = (f64::from(quad.offset.x), f64::from(quad.offset.y));
    let mut shaded = 0;
    for y in area.y..area.y1() {
        for x in area.x..area.x1() {
            let q = Point::new(f64::from(x) + 0.5 + ox, f64::from(y) + 0.5 + oy);
            let p = inverse.apply_unchecked(q);
            if !contains(quad.rect, p) || forward.apply(p).is_none() {
                continue;
            }
            let coverage = match &quad.mask {
                Some(mask) => quad.opacity * mask.coverage(q),
                None => quad.opacity,
            };
            if coverage <= 0.0 {
                continue;
            }
            let c = quad.color_at(p).map(|v| v * coverage);
            target.blend(x - origin.x, y - origin.y, c);
            shaded += 1;
        }
    }
    shaded
}

fn contains(r: Rect, p: Point) -> bool {
    p.x >= r.x0 && p.x < r.x1 && p.y >= r.y0 && p.y < r.y1
}
