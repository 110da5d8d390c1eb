// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer pixel geometry.
//!
//! Visible regions, scissor rectangles, surface rectangles, and tile
//! rectangles are all whole-pixel quantities. Floating-point geometry
//! (quads, transformed bounds) uses [`kurbo`] directly.

use core::fmt;

/// A point in integer pixel coordinates.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntPoint {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl IntPoint {
    /// The origin.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts to a floating-point [`kurbo::Point`].
    #[inline]
    #[must_use]
    pub fn to_point(self) -> kurbo::Point {
        kurbo::Point::new(f64::from(self.x), f64::from(self.y))
    }
}

impl fmt::Debug for IntPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A size in whole pixels.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl IntSize {
    /// Creates a size.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    #[inline]
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Debug for IntSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle in integer pixel coordinates.
///
/// Rectangles are half-open: `x..x + width` by `y..y + height`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl IntRect {
    /// Creates a rectangle from origin and size components.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle at the origin with the given size.
    #[inline]
    #[must_use]
    pub const fn from_size(size: IntSize) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Creates a rectangle from edge coordinates. Inverted edges produce an
    /// empty rectangle anchored at `(x0, y0)`.
    #[must_use]
    pub fn from_edges(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        let width = u32::try_from(i64::from(x1) - i64::from(x0)).unwrap_or(0);
        let height = u32::try_from(i64::from(y1) - i64::from(y0)).unwrap_or(0);
        Self::new(x0, y0, width, height)
    }

    /// Top-left corner.
    #[inline]
    #[must_use]
    pub const fn origin(self) -> IntPoint {
        IntPoint::new(self.x, self.y)
    }

    /// Size of the rectangle.
    #[inline]
    #[must_use]
    pub const fn size(self) -> IntSize {
        IntSize::new(self.width, self.height)
    }

    /// Right edge (exclusive).
    #[inline]
    #[must_use]
    pub fn x1(self) -> i32 {
        saturate(i64::from(self.x) + i64::from(self.width))
    }

    /// Bottom edge (exclusive).
    #[inline]
    #[must_use]
    pub fn y1(self) -> i32 {
        saturate(i64::from(self.y) + i64::from(self.height))
    }

    /// Returns `true` if the rectangle covers no pixels.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    #[inline]
    #[must_use]
    pub const fn area(self) -> u64 {
        self.size().area()
    }

    /// Returns the overlap of two rectangles.
    ///
    /// A disjoint pair yields an empty rectangle anchored at the clamped
    /// top-left corner, so callers can still read an origin from it.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.x1().min(other.x1());
        let y1 = self.y1().min(other.y1());
        Self::from_edges(x0, y0, x1, y1)
    }

    /// Returns the smallest rectangle containing both. Empty inputs are
    /// ignored.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.x1().max(other.x1()),
            self.y1().max(other.y1()),
        )
    }

    /// Returns `true` if `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains_rect(self, other: Self) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.x1() <= self.x1()
                && other.y1() <= self.y1())
    }

    /// Returns `true` if the pixel at `(x, y)` lies inside.
    #[must_use]
    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x1() && y < self.y1()
    }

    /// Moves the rectangle by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Self::new(
            saturate(i64::from(self.x) + i64::from(dx)),
            saturate(i64::from(self.y) + i64::from(dy)),
            self.width,
            self.height,
        )
    }

    /// Converts to a floating-point [`kurbo::Rect`].
    #[inline]
    #[must_use]
    pub fn to_rect(self) -> kurbo::Rect {
        kurbo::Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.x1()),
            f64::from(self.y1()),
        )
    }

    /// Rounds a floating-point rectangle to the nearest pixel edges.
    ///
    /// Returns `None` if any edge is not finite or falls outside the `i32`
    /// range.
    #[must_use]
    pub fn round_from(rect: kurbo::Rect) -> Option<Self> {
        let r = rect.round();
        let edges = [r.x0, r.y0, r.x1, r.y1];
        if edges
            .iter()
            .any(|e| !e.is_finite() || *e < f64::from(i32::MIN) || *e > f64::from(i32::MAX))
        {
            return None;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "edges are range-checked above"
        )]
        let [x0, y0, x1, y1] = edges.map(|e| e as i32);
        Some(Self::from_edges(x0, y0, x1, y1))
    }

    /// Returns the pieces of `self` not covered by `other` (at most four).
    pub(crate) fn subtract(self, other: Self) -> impl Iterator<Item = Self> {
        let overlap = self.intersect(other);
        let pieces: [Self; 4] = if overlap.is_empty() {
            [self, Self::default(), Self::default(), Self::default()]
        } else {
            [
                // Band above the overlap.
                Self::from_edges(self.x, self.y, self.x1(), overlap.y),
                // Band below the overlap.
                Self::from_edges(self.x, overlap.y1(), self.x1(), self.y1()),
                // Left of the overlap, within its rows.
                Self::from_edges(self.x, overlap.y, overlap.x, overlap.y1()),
                // Right of the overlap, within its rows.
                Self::from_edges(overlap.x1(), overlap.y, self.x1(), overlap.y1()),
            ]
        };
        pieces.into_iter().filter(|r| !r.is_empty())
    }
}

impl fmt::Debug for IntRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntRect({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

fn saturate(v: i64) -> i32 {
    #[expect(clippy::cast_possible_truncation, reason = "value is clamped first")]
    let out = v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    out
}
