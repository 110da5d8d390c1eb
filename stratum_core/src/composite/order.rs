// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Back-to-front ordering of a container's children.

use alloc::vec::Vec;

use crate::layer::{LayerId, LayerStore};

/// Depth of a layer: the transformed `z` at the centre of its visible
/// bounds.
pub(crate) fn depth(store: &LayerStore, layer: LayerId) -> f64 {
    let center = store.visible_region(layer).bounds().to_rect().center();
    store.effective_transform(layer).depth_at(center)
}

/// Returns the children of `container` sorted by ascending depth.
///
/// The sort is stable, so children at equal depth keep sibling order.
pub(crate) fn z_sorted(store: &LayerStore, container: LayerId) -> Vec<LayerId> {
    let mut children: Vec<(f64, LayerId)> = store
        .children(container)
        .map(|c| (depth(store, c), c))
        .collect();
    children.sort_by(|a, b| a.0.total_cmp(&b.0));
    children.into_iter().map(|(_, c)| c).collect()
}
