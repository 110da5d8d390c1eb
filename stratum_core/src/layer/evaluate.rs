// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame evaluation and change tracking.
//!
//! Evaluation follows a drain-recompute pattern for each dirty channel:
//!
//! 1. **TRANSFORM**: drain dirty indices and recompute, per layer,
//!    `world_transform = parent_world * local`,
//!    `effective_transform` (the same product, restarted at every
//!    intermediate-surface boundary), and
//!    `effective_hidden = parent_effective_hidden || flags.hidden`.
//! 2. **OPACITY**: drain dirty indices and recompute `effective_opacity`,
//!    which also restarts at surface boundaries.
//! 3. **CLIP** / **CONTENT**: drain dirty indices (no recomputation; the
//!    composition pass reads current values directly from the store).
//! 4. **TOPOLOGY**: drain and discard (the traversal order was already
//!    rebuilt at the start of evaluation if needed).
//!
//! A container that renders into an intermediate surface draws that surface
//! with its own effective transform and opacity; its children are drawn
//! into the surface, so their accumulation starts fresh below it.

use alloc::vec::Vec;

use super::id::INVALID;
use super::store::LayerStore;
use crate::dirty;
use crate::transform::Transform3d;

/// The set of changes produced by a single [`LayerStore::evaluate`] call.
///
/// Each field contains the raw slot indices of layers that changed in the
/// corresponding category. Map them back to handles with
/// [`LayerStore::handle_at`].
#[derive(Clone, Debug, Default)]
pub struct FrameChanges {
    /// Layers whose world and effective transforms were recomputed.
    pub transforms: Vec<u32>,
    /// Layers whose effective opacity was recomputed.
    pub opacities: Vec<u32>,
    /// Layers whose clip rectangle changed.
    pub clips: Vec<u32>,
    /// Layers whose visible region, colour, mask, or opacity flag changed.
    pub content: Vec<u32>,
    /// Layers that transitioned from visible to effectively hidden.
    pub hidden: Vec<u32>,
    /// Layers that transitioned from effectively hidden to visible.
    pub unhidden: Vec<u32>,
    /// Layers added since the last evaluate.
    pub added: Vec<u32>,
    /// Layers removed since the last evaluate.
    pub removed: Vec<u32>,
    /// Whether the tree topology changed (traversal order was rebuilt).
    pub topology_changed: bool,
}

impl FrameChanges {
    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.transforms.clear();
        self.opacities.clear();
        self.clips.clear();
        self.content.clear();
        self.hidden.clear();
        self.unhidden.clear();
        self.added.clear();
        self.removed.clear();
        self.topology_changed = false;
    }

    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
            && self.opacities.is_empty()
            && self.clips.is_empty()
            && self.content.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
            && !self.topology_changed
    }
}

impl LayerStore {
    /// Evaluates the layer tree, recomputing dirty properties and returning
    /// the set of changes.
    pub fn evaluate(&mut self) -> FrameChanges {
        let mut changes = FrameChanges::default();
        self.evaluate_into(&mut changes);
        changes
    }

    /// Like [`evaluate`](Self::evaluate), but reuses a caller-provided buffer
    /// to avoid allocation.
    pub fn evaluate_into(&mut self, changes: &mut FrameChanges) {
        changes.clear();

        if self.traversal_dirty {
            self.rebuild_traversal_order();
            changes.topology_changed = true;
            self.traversal_dirty = false;
        }

        let dirty_transforms: Vec<u32> = self
            .dirty
            .drain(dirty::TRANSFORM)
            .affected()
            .deterministic()
            .run()
            .collect();
        for &idx in &dirty_transforms {
            let i = idx as usize;
            let parent_idx = self.parent[i];
            let local = self.local_transform[i];
            let (parent_world, parent_effective, parent_hidden) = if parent_idx != INVALID {
                let p = parent_idx as usize;
                let effective = if self.flags[p].use_intermediate_surface {
                    Transform3d::IDENTITY
                } else {
                    self.effective_transform[p]
                };
                (self.world_transform[p], effective, self.effective_hidden[p])
            } else {
                (Transform3d::IDENTITY, Transform3d::IDENTITY, false)
            };
            self.world_transform[i] = parent_world * local;
            self.effective_transform[i] = parent_effective * local;

            let new_hidden = parent_hidden || self.flags[i].hidden;
            if new_hidden != self.effective_hidden[i] {
                if new_hidden {
                    changes.hidden.push(idx);
                } else {
                    changes.unhidden.push(idx);
                }
                self.effective_hidden[i] = new_hidden;
            }
        }
        changes.transforms = dirty_transforms;

        let dirty_opacities: Vec<u32> = self
            .dirty
            .drain(dirty::OPACITY)
            .affected()
            .deterministic()
            .run()
            .collect();
        for &idx in &dirty_opacities {
            let i = idx as usize;
            let parent_idx = self.parent[i];
            let parent_opacity = if parent_idx == INVALID
                || self.flags[parent_idx as usize].use_intermediate_surface
            {
                1.0
            } else {
                self.effective_opacity[parent_idx as usize]
            };
            self.effective_opacity[i] = parent_opacity * self.local_opacity[i];
        }
        changes.opacities = dirty_opacities;

        changes.clips = self
            .dirty
            .drain(dirty::CLIP)
            .deterministic()
            .run()
            .collect();

        changes.content = self
            .dirty
            .drain(dirty::CONTENT)
            .deterministic()
            .run()
            .collect();

        let _: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();

        core::mem::swap(&mut self.pending_added, &mut changes.added);
        core::mem::swap(&mut self.pending_removed, &mut changes.removed);
    }

    /// Returns the current traversal order (depth-first pre-order).
    ///
    /// Only valid after [`evaluate`](Self::evaluate) has been called at least
    /// once.
    #[must_use]
    pub fn traversal_order(&self) -> &[u32] {
        &self.traversal_order
    }

    /// Rebuilds the depth-first pre-order traversal of all live layers.
    fn rebuild_traversal_order(&mut self) {
        self.traversal_order.clear();
        for idx in 0..self.len {
            if self.parent[idx as usize] == INVALID && !self.free_list.contains(&idx) {
                self.dfs_collect(idx);
            }
        }
    }

    fn dfs_collect(&mut self, idx: u32) {
        self.traversal_order.push(idx);
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            self.dfs_collect(child);
            child = self.next_sibling[child as usize];
        }
    }
}
