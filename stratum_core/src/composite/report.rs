// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::vec::Vec;

use crate::backend::SurfaceInitMode;
use crate::geom::{IntPoint, IntRect};
use crate::layer::LayerId;

/// Why a layer contributed nothing to a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SkipReason {
    /// The layer's visible region is empty.
    EmptyVisibleRegion,
    /// The layer's scissor rectangle is empty.
    EmptyScissor,
    /// The layer or an ancestor is hidden.
    Hidden,
    /// The layer's async container has not published an image yet.
    AsyncNotReady,
    /// The backend refused the container's intermediate surface.
    SurfaceAllocationFailed,
    /// The layer has no drawable content (no buffer host, or an
    /// uninitialised texture).
    NothingToDraw,
}

/// What the pass decided for one layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerRecord {
    /// The layer.
    pub layer: LayerId,
    /// Offset subtracted from the layer's device positions.
    pub offset: IntPoint,
    /// Scissor rectangle in target pixels.
    pub scissor: IntRect,
    /// Seeding of the layer's intermediate surface, for surface-backed
    /// containers.
    pub init_mode: Option<SurfaceInitMode>,
    /// Whether descendants may use component alpha.
    pub component_alpha: bool,
    /// Set when the layer was left out.
    pub skipped: Option<SkipReason>,
}

impl LayerRecord {
    pub(crate) fn new(layer: LayerId, offset: IntPoint, scissor: IntRect) -> Self {
        Self {
            layer,
            offset,
            scissor,
            init_mode: None,
            component_alpha: false,
            skipped: None,
        }
    }
}

/// Outcome of one [`LayerManager::composite`](super::LayerManager::composite)
/// call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PassReport {
    /// Pass counter, starting at 1.
    pub frame_index: u64,
    /// One record per visited layer, in traversal order.
    pub records: Vec<LayerRecord>,
    /// Layers that were rendered, in the order they were rendered.
    pub draw_order: Vec<LayerId>,
    /// Intermediate surfaces allocated.
    pub surfaces_created: usize,
    /// Quads issued.
    pub draws: usize,
}

impl PassReport {
    pub(crate) fn new(frame_index: u64) -> Self {
        Self {
            frame_index,
            ..Self::default()
        }
    }

    /// Returns the record for `layer`, if it was visited.
    #[must_use]
    pub fn record(&self, layer: LayerId) -> Option<&LayerRecord> {
        self.records.iter().find(|r| r.layer == layer)
    }

    /// Iterates over skipped layers and their reasons.
    pub fn skipped(&self) -> impl Iterator<Item = (LayerId, SkipReason)> + '_ {
        self.records
            .iter()
            .filter_map(|r| r.skipped.map(|reason| (r.layer, reason)))
    }
}
