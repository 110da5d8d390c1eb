// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal column-major 4×4 transform.
//!
//! This type covers the subset of 3-D transforms that layer composition
//! needs (identity, multiply, classification, projection of the `z = 0`
//! plane) without pulling in a full linear-algebra crate.
//!
//! Layer content lives on the `z = 0` plane of its local space, so drawing
//! only ever needs the 3×3 [`Homography`] formed by columns 0, 1 and 3.
//! Backends invert that homography to map device pixels back to content.

use core::ops::Mul;

use kurbo::{Point, Rect};
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// A column-major 4×4 affine transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix, matching the memory layout
/// used by GPU APIs and Core Animation's `CATransform3D`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a transform from four column arrays.
    #[inline]
    #[must_use]
    pub const fn from_cols(col0: [f64; 4], col1: [f64; 4], col2: [f64; 4], col3: [f64; 4]) -> Self {
        Self {
            cols: [col0, col1, col2, col3],
        }
    }

    /// Creates a transform from a column-major 2-D array.
    #[inline]
    #[must_use]
    pub const fn from_cols_array_2d(cols: [[f64; 4]; 4]) -> Self {
        Self { cols }
    }

    /// Returns the columns as a 2-D array.
    #[inline]
    #[must_use]
    pub const fn to_cols_array_2d(self) -> [[f64; 4]; 4] {
        self.cols
    }

    /// Returns column `i` (0-based).
    ///
    /// # Panics
    ///
    /// Panics if `i >= 4`.
    #[inline]
    #[must_use]
    pub const fn col(self, i: usize) -> [f64; 4] {
        self.cols[i]
    }

    /// Creates a pure translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    /// Creates a non-uniform scale transform.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Z axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_z(radians: f64) -> Self {
        #[cfg(feature = "std")]
        let (s, c) = radians.sin_cos();
        #[cfg(not(feature = "std"))]
        let (s, c) = (radians.sin(), radians.cos());
        Self {
            cols: [
                [c, s, 0.0, 0.0],
                [-s, c, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Is this transform [finite]?
    ///
    /// [finite]: f64::is_finite
    #[inline]
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        let c = &self.cols;
        c[0][0].is_finite()
            && c[0][1].is_finite()
            && c[0][2].is_finite()
            && c[0][3].is_finite()
            && c[1][0].is_finite()
            && c[1][1].is_finite()
            && c[1][2].is_finite()
            && c[1][3].is_finite()
            && c[2][0].is_finite()
            && c[2][1].is_finite()
            && c[2][2].is_finite()
            && c[2][3].is_finite()
            && c[3][0].is_finite()
            && c[3][1].is_finite()
            && c[3][2].is_finite()
            && c[3][3].is_finite()
    }

    /// Is this transform [NaN]?
    ///
    /// [NaN]: f64::is_nan
    #[inline]
    #[must_use]
    pub const fn is_nan(&self) -> bool {
        let c = &self.cols;
        c[0][0].is_nan()
            || c[0][1].is_nan()
            || c[0][2].is_nan()
            || c[0][3].is_nan()
            || c[1][0].is_nan()
            || c[1][1].is_nan()
            || c[1][2].is_nan()
            || c[1][3].is_nan()
            || c[2][0].is_nan()
            || c[2][1].is_nan()
            || c[2][2].is_nan()
            || c[2][3].is_nan()
            || c[3][0].is_nan()
            || c[3][1].is_nan()
            || c[3][2].is_nan()
            || c[3][3].is_nan()
    }

    /// Returns `true` if the transform keeps the `z = 0` plane flat and
    /// applies no perspective: a 2-D affine map in disguise.
    #[must_use]
    pub fn is_2d(&self) -> bool {
        let c = &self.cols;
        c[0][2] == 0.0
            && c[0][3] == 0.0
            && c[1][2] == 0.0
            && c[1][3] == 0.0
            && c[2] == [0.0, 0.0, 1.0, 0.0]
            && c[3][2] == 0.0
            && c[3][3] == 1.0
    }

    /// Returns `true` if content can be drawn without a perspective divide.
    ///
    /// Weaker than [`is_2d`](Self::is_2d): `z` terms are allowed since they
    /// do not change where the `z = 0` plane lands on screen.
    #[must_use]
    pub fn can_draw_2d(&self) -> bool {
        let c = &self.cols;
        c[0][3] == 0.0 && c[1][3] == 0.0 && c[3][3] == 1.0
    }

    /// Returns the translation if the transform is a pure 2-D translation
    /// by whole pixels.
    ///
    /// Any rotation, scale, skew, perspective, or fractional offset yields
    /// `None`.
    #[must_use]
    pub fn as_integer_translation(&self) -> Option<(i32, i32)> {
        if !self.is_2d() {
            return None;
        }
        let c = &self.cols;
        if c[0][0] != 1.0 || c[0][1] != 0.0 || c[1][0] != 0.0 || c[1][1] != 1.0 {
            return None;
        }
        let (tx, ty) = (c[3][0], c[3][1]);
        if tx != tx.round() || ty != ty.round() {
            return None;
        }
        if tx.abs() > f64::from(i32::MAX) || ty.abs() > f64::from(i32::MAX) {
            return None;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "integral and range-checked above"
        )]
        Some((tx as i32, ty as i32))
    }

    /// Returns the 2-D translation component.
    #[inline]
    #[must_use]
    pub const fn translation_2d(&self) -> (f64, f64) {
        (self.cols[3][0], self.cols[3][1])
    }

    /// Returns the homography mapping the local `z = 0` plane to the
    /// projected `(x, y)` plane.
    #[must_use]
    pub const fn plane_homography(&self) -> Homography {
        let c = &self.cols;
        Homography {
            cols: [
                [c[0][0], c[0][1], c[0][3]],
                [c[1][0], c[1][1], c[1][3]],
                [c[3][0], c[3][1], c[3][3]],
            ],
        }
    }

    /// Maps a point on the local `z = 0` plane through the transform,
    /// including the perspective divide.
    ///
    /// Returns `None` for points that land on or behind the projection
    /// plane.
    #[must_use]
    pub fn transform_point(&self, p: Point) -> Option<Point> {
        self.plane_homography().apply(p)
    }

    /// Returns the axis-aligned bounds of `rect` after transformation.
    ///
    /// Returns `None` if any corner cannot be projected.
    #[must_use]
    pub fn transform_rect_bounds(&self, rect: Rect) -> Option<Rect> {
        let h = self.plane_homography();
        let corners = [
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x0, rect.y1),
            Point::new(rect.x1, rect.y1),
        ];
        let mut out: Option<Rect> = None;
        for c in corners {
            let p = h.apply(c)?;
            out = Some(match out {
                None => Rect::from_points(p, p),
                Some(r) => r.union_pt(p),
            });
        }
        out
    }

    /// Returns the local-space depth of a point after transformation, used
    /// for back-to-front ordering.
    #[must_use]
    pub fn depth_at(&self, p: Point) -> f64 {
        let c = &self.cols;
        let z = c[0][2] * p.x + c[1][2] * p.y + c[3][2];
        let w = c[0][3] * p.x + c[1][3] * p.y + c[3][3];
        if w.abs() > f64::EPSILON { z / w } else { z }
    }
}

/// A column-major 3×3 projective map of the plane.
///
/// Produced by [`Transform3d::plane_homography`]. Backends invert it to find
/// which content point lands on a given device pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    /// Three columns, each `[x, y, w]`.
    pub cols: [[f64; 3]; 3],
}

impl Homography {
    /// Maps `p`, dividing by the projective coordinate.
    ///
    /// Returns `None` when `w` is not positive.
    #[must_use]
    pub fn apply(&self, p: Point) -> Option<Point> {
        let c = &self.cols;
        let x = c[0][0] * p.x + c[1][0] * p.y + c[2][0];
        let y = c[0][1] * p.x + c[1][1] * p.y + c[2][1];
        let w = c[0][2] * p.x + c[1][2] * p.y + c[2][2];
        (w > 1e-12).then(|| Point::new(x / w, y / w))
    }

    /// Returns the inverse map, or `None` if the homography is singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        // Row-major view: m[row][col] = cols[col][row].
        let m = |r: usize, c: usize| self.cols[c][r];
        let cof00 = m(1, 1) * m(2, 2) - m(1, 2) * m(2, 1);
        let cof01 = m(1, 2) * m(2, 0) - m(1, 0) * m(2, 2);
        let cof02 = m(1, 0) * m(2, 1) - m(1, 1) * m(2, 0);
        let det = m(0, 0) * cof00 + m(0, 1) * cof01 + m(0, 2) * cof02;
        if !det.is_finite() || det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        // inverse[row][col] = adjugate[row][col] / det, adjugate = cofactor^T.
        let inv = [
            [
                cof00,
                m(0, 2) * m(2, 1) - m(0, 1) * m(2, 2),
                m(0, 1) * m(1, 2) - m(0, 2) * m(1, 1),
            ],
            [
                cof01,
                m(0, 0) * m(2, 2) - m(0, 2) * m(2, 0),
                m(0, 2) * m(1, 0) - m(0, 0) * m(1, 2),
            ],
            [
                cof02,
                m(0, 1) * m(2, 0) - m(0, 0) * m(2, 1),
                m(0, 0) * m(1, 1) - m(0, 1) * m(1, 0),
            ],
        ];
        // Back to column-major.
        let mut cols = [[0.0_f64; 3]; 3];
        for (r, row) in inv.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                cols[c][r] = v * inv_det;
            }
        }
        Some(Self { cols })
    }

    /// Maps `p` without the positivity check on `w`, returning the raw
    /// `(x / w, y / w)`; used by rasterisers scanning inverse maps.
    #[must_use]
    pub fn apply_unchecked(&self, p: Point) -> Point {
        let c = &self.cols;
        let x = c[0][0] * p.x + c[1][0] * p.y + c[2][0];
        let y = c[0][1] * p.x + c[1][1] * p.y + c[2][1];
        let w = c[0][2] * p.x + c[1][2] * p.y + c[2][2];
        if w.abs() < 1e-12 {
            Point::new(f64::NAN, f64::NAN)
        } else {
            Point::new(x / w, y / w)
        }
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        let mut j = 0;
        while j < 4 {
            let mut i = 0;
            while i < 4 {
                out[j][i] =
                    a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
                i += 1;
            }
            j += 1;
        }
        Self { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        assert_eq!(Transform3d::default(), Transform3d::IDENTITY);
    }

    #[test]
    fn identity_multiply() {
        let t = Transform3d::from_translation(1.0, 2.0, 3.0);
        assert_eq!(Transform3d::IDENTITY * t, t);
        assert_eq!(t * Transform3d::IDENTITY, t);
    }

    #[test]
    fn translation_composition() {
        let a = Transform3d::from_translation(1.0, 0.0, 0.0);
        let b = Transform3d::from_translation(0.0, 2.0, 0.0);
        let c = a * b;
        // Combined translation should be (1, 2, 0).
        let col3 = c.col(3);
        assert_eq!(col3, [1.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn scale() {
        let s = Transform3d::from_scale(2.0, 3.0, 4.0);
        assert_eq!(s.col(0)[0], 2.0);
        assert_eq!(s.col(1)[1], 3.0);
        assert_eq!(s.col(2)[2], 4.0);
        assert_eq!(s.col(3), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn round_trip_cols_array_2d() {
        let t = Transform3d::from_translation(5.0, 6.0, 7.0);
        let arr = t.to_cols_array_2d();
        assert_eq!(Transform3d::from_cols_array_2d(arr), t);
    }

    #[test]
    fn scale_then_translate() {
        let s = Transform3d::from_scale(2.0, 2.0, 2.0);
        let t = Transform3d::from_translation(3.0, 4.0, 0.0);
        // Scale first, then translate: T * S
        let combined = t * s;
        // Column 0 should be scaled.
        assert_eq!(combined.col(0), [2.0, 0.0, 0.0, 0.0]);
        // Translation column should be unchanged (translation applied after).
        assert_eq!(combined.col(3), [3.0, 4.0, 0.0, 1.0]);
    }

    #[test]
    fn rotation_z_ninety_degrees() {
        let r = Transform3d::from_rotation_z(core::f64::consts::FRAC_PI_2);
        // cos=0, sin=1 for +90deg.
        let eps = 1e-6;
        assert!((r.col(0)[0] - 0.0).abs() < eps);
        assert!((r.col(0)[1] - 1.0).abs() < eps);
        assert!((r.col(1)[0] + 1.0).abs() < eps);
        assert!((r.col(1)[1] - 0.0).abs() < eps);
    }

    #[test]
    fn identity_is_finite() {
        assert!(Transform3d::IDENTITY.is_finite());
        assert!(!Transform3d::IDENTITY.is_nan());
    }

    #[test]
    fn nan_detected() {
        let mut t = Transform3d::IDENTITY;
        t.cols[2][1] = f64::NAN;
        assert!(!t.is_finite());
        assert!(t.is_nan());
    }

    #[test]
    fn infinity_detected() {
        let mut t = Transform3d::IDENTITY;
        t.cols[0][3] = f64::INFINITY;
        assert!(!t.is_finite());
        assert!(!t.is_nan());
    }

    #[test]
    fn integer_translation_classification() {
        assert_eq!(
            Transform3d::from_translation(3.0, -4.0, 0.0).as_integer_translation(),
            Some((3, -4))
        );
        assert_eq!(
            Transform3d::from_translation(3.5, 0.0, 0.0).as_integer_translation(),
            None
        );
        assert_eq!(
            Transform3d::from_scale(2.0, 2.0, 1.0).as_integer_translation(),
            None
        );
        assert_eq!(
            Transform3d::from_rotation_z(0.3).as_integer_translation(),
            None
        );
    }

    #[test]
    fn perspective_is_not_2d() {
        let mut t = Transform3d::IDENTITY;
        t.cols[2][3] = -0.01;
        // z terms alone do not affect the z = 0 plane.
        assert!(!t.is_2d());
        assert!(t.can_draw_2d());
        t.cols[0][3] = 0.001;
        assert!(!t.can_draw_2d());
    }

    #[test]
    fn homography_inverse_round_trips() {
        let mut t = Transform3d::from_translation(10.0, 20.0, 0.0)
            * Transform3d::from_rotation_z(0.7)
            * Transform3d::from_scale(2.0, 3.0, 1.0);
        t.cols[0][3] = 0.001;
        let h = t.plane_homography();
        let inv = h.inverse().unwrap();
        let p = Point::new(5.0, 7.0);
        let q = h.apply(p).unwrap();
        let back = inv.apply_unchecked(q);
        assert!((back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn singular_homography_has_no_inverse() {
        let t = Transform3d::from_scale(0.0, 1.0, 1.0);
        assert!(t.plane_homography().inverse().is_none());
    }

    #[test]
    fn rect_bounds_under_rotation() {
        let t = Transform3d::from_rotation_z(core::f64::consts::FRAC_PI_2);
        let b = t
            .transform_rect_bounds(Rect::new(0.0, 0.0, 10.0, 5.0))
            .unwrap();
        let eps = 1e-9;
        assert!((b.x0 + 5.0).abs() < eps && b.x1.abs() < eps);
        assert!(b.y0.abs() < eps && (b.y1 - 10.0).abs() < eps);
    }

    #[test]
    fn depth_follows_translation() {
        let t = Transform3d::from_translation(0.0, 0.0, 4.0);
        assert_eq!(t.depth_at(Point::new(3.0, 3.0)), 4.0);
    }
}
