// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scissor rectangles for child layers.

use crate::geom::{IntPoint, IntRect};
use crate::layer::{LayerId, LayerStore};
use crate::transform::Transform3d;

/// Computes the device-space scissor for `child` of `container`.
///
/// `parent_clip` is the container's own scissor and `child_offset` the
/// offset its children are drawn with. When the container renders into a
/// surface, the starting clip is the whole surface and the child's clip
/// rectangle is already in surface space; otherwise the clip is mapped
/// through the container's effective transform.
///
/// A clip that cannot be projected yields an empty scissor.
pub(crate) fn child_scissor(
    store: &LayerStore,
    container: LayerId,
    parent_clip: IntRect,
    child: LayerId,
    child_offset: IntPoint,
) -> IntRect {
    let uses_surface = store.flags(container).use_intermediate_surface;
    let current = if uses_surface {
        IntRect::from_size(store.visible_region(container).bounds().size())
    } else {
        parent_clip
    };

    let Some(clip) = store.clip(child) else {
        return current;
    };
    let to_target = if uses_surface {
        Transform3d::IDENTITY
    } else {
        store.effective_transform(container)
    };
    to_target
        .transform_rect_bounds(clip.to_rect())
        .and_then(IntRect::round_from)
        .map_or(IntRect::default(), |r| {
            current.intersect(r.translate(-child_offset.x, -child_offset.y))
        })
}
