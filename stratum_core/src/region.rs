// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel regions built from disjoint rectangles.

use alloc::vec::Vec;

use crate::geom::IntRect;

/// A set of pixels represented as pairwise-disjoint rectangles.
///
/// Adding a rectangle only stores the parts not already covered, so the
/// rectangles never overlap and [`area`](Self::area) is exact.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    rects: Vec<IntRect>,
}

impl Region {
    /// Creates an empty region.
    #[must_use]
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Creates a region covering one rectangle.
    #[must_use]
    pub fn from_rect(rect: IntRect) -> Self {
        let mut region = Self::new();
        region.add_rect(rect);
        region
    }

    /// Adds a rectangle to the region.
    pub fn add_rect(&mut self, rect: IntRect) {
        if rect.is_empty() {
            return;
        }
        let mut pending = Vec::from([rect]);
        for existing in &self.rects {
            pending = pending
                .into_iter()
                .flat_map(|r| r.subtract(*existing))
                .collect();
            if pending.is_empty() {
                return;
            }
        }
        self.rects.extend(pending);
    }

    /// Returns `true` if the region covers no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Number of stored rectangles.
    #[must_use]
    pub fn rect_count(&self) -> usize {
        self.rects.len()
    }

    /// Total number of pixels covered.
    #[must_use]
    pub fn area(&self) -> u64 {
        self.rects.iter().map(|r| r.area()).sum()
    }

    /// Smallest rectangle containing the whole region.
    #[must_use]
    pub fn bounds(&self) -> IntRect {
        self.rects
            .iter()
            .fold(IntRect::default(), |acc, r| acc.union(*r))
    }

    /// Returns `true` if the region is exactly one non-empty rectangle.
    ///
    /// Coverage decides, not storage: a region assembled from pieces that
    /// tile their bounds counts as a single rectangle.
    #[must_use]
    pub fn is_single_rect(&self) -> bool {
        !self.is_empty() && self.area() == self.bounds().area()
    }

    /// Iterates the disjoint rectangles.
    pub fn rects(&self) -> impl Iterator<Item = IntRect> + '_ {
        self.rects.iter().copied()
    }

    /// Moves every rectangle by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        for r in &mut self.rects {
            *r = r.translate(dx, dy);
        }
    }

    /// Returns the parts of the region inside `clip`.
    #[must_use]
    pub fn intersect_rect(&self, clip: IntRect) -> Self {
        Self {
            rects: self
                .rects
                .iter()
                .map(|r| r.intersect(clip))
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }
}

impl From<IntRect> for Region {
    fn from(rect: IntRect) -> Self {
        Self::from_rect(rect)
    }
}

impl FromIterator<IntRect> for Region {
    fn from_iter<I: IntoIterator<Item = IntRect>>(iter: I) -> Self {
        let mut region = Self::new();
        for r in iter {
            region.add_rect(r);
        }
        region
    }
}
