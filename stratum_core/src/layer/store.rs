// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays layer storage with allocation, topology, and property management.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use crate::dirty;
use crate::effect::{Color, Filter};
use crate::geom::IntRect;
use crate::region::Region;
use crate::transform::Transform3d;

use super::id::{INVALID, LayerId};
use super::traverse::{Ancestors, Children};

static NEXT_STORE_ID: AtomicU32 = AtomicU32::new(0);

/// What a layer draws.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayerKind {
    /// Groups children; draws nothing itself.
    #[default]
    Container,
    /// Fills its visible region with a solid colour.
    Color,
    /// Presents the texture held by its buffer host.
    Image,
}

/// Per-layer boolean flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerFlags {
    /// Whether the layer (and its subtree) is hidden.
    pub hidden: bool,
    /// Whether a container composites its children into an intermediate
    /// surface before drawing them.
    ///
    /// Effective transforms and opacities of descendants are measured
    /// relative to the nearest ancestor with this flag set.
    pub use_intermediate_surface: bool,
}

/// Struct-of-arrays storage for all layers.
///
/// Layers are addressed by [`LayerId`] handles. Internally, each layer occupies
/// a slot in parallel arrays. Destroyed layers are recycled via a free list,
/// and generation counters prevent stale handle access.
#[derive(Debug)]
pub struct LayerStore {
    pub(crate) id: u32,

    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) last_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Local properties (set by callers) --
    pub(crate) kind: Vec<LayerKind>,
    pub(crate) local_transform: Vec<Transform3d>,
    pub(crate) local_opacity: Vec<f32>,
    pub(crate) clip: Vec<Option<IntRect>>,
    pub(crate) visible_region: Vec<Region>,
    pub(crate) opaque: Vec<bool>,
    pub(crate) mask: Vec<Option<LayerId>>,
    pub(crate) color: Vec<Color>,
    pub(crate) filter: Vec<Option<Filter>>,
    pub(crate) flags: Vec<LayerFlags>,

    // -- Computed properties (written by evaluate) --
    pub(crate) world_transform: Vec<Transform3d>,
    pub(crate) effective_transform: Vec<Transform3d>,
    pub(crate) effective_opacity: Vec<f32>,
    pub(crate) effective_hidden: Vec<bool>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Traversal cache --
    pub(crate) traversal_order: Vec<u32>,
    pub(crate) traversal_dirty: bool,

    // -- Lifecycle tracking --
    pub(crate) pending_added: Vec<u32>,
    pub(crate) pending_removed: Vec<u32>,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore {
    /// Creates an empty layer store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            parent: Vec::new(),
            first_child: Vec::new(),
            last_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            kind: Vec::new(),
            local_transform: Vec::new(),
            local_opacity: Vec::new(),
            clip: Vec::new(),
            visible_region: Vec::new(),
            opaque: Vec::new(),
            mask: Vec::new(),
            color: Vec::new(),
            filter: Vec::new(),
            flags: Vec::new(),
            world_transform: Vec::new(),
            effective_transform: Vec::new(),
            effective_opacity: Vec::new(),
            effective_hidden: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            traversal_order: Vec::new(),
            traversal_dirty: true,
            pending_added: Vec::new(),
            pending_removed: Vec::new(),
        }
    }

    // -- Allocation API --

    /// Creates a new layer of the given kind and returns its handle.
    ///
    /// The layer starts with an identity transform, full opacity, no clip,
    /// an empty visible region, and no parent.
    pub fn create_layer(&mut self, kind: LayerKind) -> LayerId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot; destroy already bumped the generation.
            let i = idx as usize;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.last_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.kind[i] = kind;
            self.local_transform[i] = Transform3d::IDENTITY;
            self.local_opacity[i] = 1.0;
            self.clip[i] = None;
            self.visible_region[i] = Region::new();
            self.opaque[i] = false;
            self.mask[i] = None;
            self.color[i] = Color::TRANSPARENT;
            self.filter[i] = None;
            self.flags[i] = LayerFlags::default();
            self.world_transform[i] = Transform3d::IDENTITY;
            self.effective_transform[i] = Transform3d::IDENTITY;
            self.effective_opacity[i] = 1.0;
            self.effective_hidden[i] = false;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.last_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.kind.push(kind);
            self.local_transform.push(Transform3d::IDENTITY);
            self.local_opacity.push(1.0);
            self.clip.push(None);
            self.visible_region.push(Region::new());
            self.opaque.push(false);
            self.mask.push(None);
            self.color.push(Color::TRANSPARENT);
            self.filter.push(None);
            self.flags.push(LayerFlags::default());
            self.world_transform.push(Transform3d::IDENTITY);
            self.effective_transform.push(Transform3d::IDENTITY);
            self.effective_opacity.push(1.0);
            self.effective_hidden.push(false);
            self.generation.push(0);
            idx
        };

        self.traversal_dirty = true;
        self.pending_added.push(idx);
        self.dirty.mark(idx, dirty::TOPOLOGY);
        self.dirty.mark(idx, dirty::TRANSFORM);
        self.dirty.mark(idx, dirty::OPACITY);

        self.handle(idx)
    }

    /// Destroys a leaf layer, freeing its slot for reuse.
    ///
    /// # Panics
    ///
    /// Panics if the layer has children (use
    /// [`destroy_subtree`](Self::destroy_subtree)) or if the handle is stale.
    pub fn destroy_layer(&mut self, id: LayerId) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy layer with children"
        );

        if self.parent[idx as usize] != INVALID {
            let p = self.parent[idx as usize];
            self.unlink_from_parent(idx);
            self.dirty.mark(p, dirty::TOPOLOGY);
        }

        self.dirty.remove_key(idx);

        // Bump generation so old handles (including weak mask references)
        // immediately fail validation.
        self.generation[idx as usize] += 1;

        self.free_list.push(idx);
        self.traversal_dirty = true;
        self.pending_removed.push(idx);
        self.dirty.mark(idx, dirty::TOPOLOGY);
    }

    /// Destroys a layer and all of its descendants.
    ///
    /// Returns the destroyed handles, children before parents.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn destroy_subtree(&mut self, id: LayerId) -> Vec<LayerId> {
        self.validate(id);
        let mut destroyed = Vec::new();
        self.collect_post_order(id.idx, &mut destroyed);
        for &layer in &destroyed {
            self.destroy_layer(layer);
        }
        destroyed
    }

    /// Returns whether the given handle refers to a live layer of this store.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        id.owner == self.id
            && id.idx < self.len
            && self.generation[id.idx as usize] == id.generation
            && !self.free_list.contains(&id.idx)
    }

    /// Returns the handle currently occupying raw slot `idx`, if live.
    ///
    /// Useful for mapping indices from [`FrameChanges`](super::FrameChanges)
    /// back to handles.
    #[must_use]
    pub fn handle_at(&self, idx: u32) -> Option<LayerId> {
        (idx < self.len && !self.free_list.contains(&idx)).then(|| self.handle(idx))
    }

    // -- Topology API --

    /// Appends `child` as the last child of `container`.
    ///
    /// # Panics
    ///
    /// Same conditions as [`insert_after`](Self::insert_after).
    pub fn append_child(&mut self, container: LayerId, child: LayerId) {
        let after = self.last_child(container);
        self.insert_after(container, child, after);
    }

    /// Inserts `child` into `container` immediately after `after`, or as the
    /// first child when `after` is `None`.
    ///
    /// Marks inherited channels for `child`'s subtree so that its computed
    /// properties are recomputed under the new ancestry.
    ///
    /// # Panics
    ///
    /// Panics if any handle is stale or belongs to another store, if
    /// `container` is not a container layer, if `child` already has a
    /// parent, if `child` is `container` or one of its ancestors, or if
    /// `after` is not a child of `container`.
    pub fn insert_after(&mut self, container: LayerId, child: LayerId, after: Option<LayerId>) {
        self.validate(container);
        self.validate(child);
        let p = container.idx;
        let c = child.idx;
        assert!(
            self.kind[p as usize] == LayerKind::Container,
            "insertion target is not a container layer"
        );
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        assert!(
            c != p && !self.ancestors(container).any(|a| a == child),
            "inserting a layer under itself would create a cycle"
        );
        if let Some(after) = after {
            self.validate(after);
            assert!(
                self.parent[after.idx as usize] == p,
                "`after` sibling is not a child of this container"
            );
        }

        self.link(p, c, after.map(|a| a.idx));

        let _ = self.dirty.add_dependency(c, p, dirty::TRANSFORM);
        let _ = self.dirty.add_dependency(c, p, dirty::OPACITY);

        self.mark_subtree_inherited_dirty(c);
        self.traversal_dirty = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Removes `child` from `container`.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale or `child` is not a child of `container`.
    pub fn remove_child(&mut self, container: LayerId, child: LayerId) {
        self.validate(container);
        self.validate(child);
        let p = container.idx;
        let c = child.idx;
        assert!(
            self.parent[c as usize] == p,
            "layer is not a child of this container"
        );

        self.unlink_from_parent(c);

        self.dirty.remove_dependency(c, p, dirty::TRANSFORM);
        self.dirty.remove_dependency(c, p, dirty::OPACITY);

        self.mark_subtree_inherited_dirty(c);
        self.traversal_dirty = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Moves `child` within `container` so that it follows `after`, or to
    /// the front when `after` is `None`.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale, if `child` or `after` is not a child of
    /// `container`, or if `after` is `child`.
    pub fn reposition_child(
        &mut self,
        container: LayerId,
        child: LayerId,
        after: Option<LayerId>,
    ) {
        self.validate(container);
        self.validate(child);
        let p = container.idx;
        let c = child.idx;
        assert!(
            self.parent[c as usize] == p,
            "layer is not a child of this container"
        );
        if let Some(after) = after {
            self.validate(after);
            assert!(after != child, "cannot reposition a layer after itself");
            assert!(
                self.parent[after.idx as usize] == p,
                "`after` sibling is not a child of this container"
            );
            if self.prev_sibling[c as usize] == after.idx {
                return;
            }
        } else if self.first_child[p as usize] == c {
            return;
        }

        self.unlink_from_parent(c);
        self.link(p, c, after.map(|a| a.idx));

        self.traversal_dirty = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Returns the parent of a layer, if any.
    #[must_use]
    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.link_at(self.parent[id.idx as usize])
    }

    /// Returns the first child of a layer, if any.
    #[must_use]
    pub fn first_child(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.link_at(self.first_child[id.idx as usize])
    }

    /// Returns the last child of a layer, if any.
    #[must_use]
    pub fn last_child(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.link_at(self.last_child[id.idx as usize])
    }

    /// Returns the next sibling of a layer, if any.
    #[must_use]
    pub fn next_sibling(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.link_at(self.next_sibling[id.idx as usize])
    }

    /// Returns the previous sibling of a layer, if any.
    #[must_use]
    pub fn prev_sibling(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.link_at(self.prev_sibling[id.idx as usize])
    }

    /// Returns an iterator over the direct children of a layer.
    #[must_use]
    pub fn children(&self, id: LayerId) -> Children<'_> {
        self.validate(id);
        Children::new(
            self,
            self.first_child[id.idx as usize],
            self.last_child[id.idx as usize],
        )
    }

    /// Returns an iterator over the ancestors of a layer, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: LayerId) -> Ancestors<'_> {
        self.validate(id);
        Ancestors::new(self, id.idx)
    }

    // -- Property getters (read-only, no dirty marking) --

    /// Returns the kind of a layer.
    #[must_use]
    pub fn kind(&self, id: LayerId) -> LayerKind {
        self.validate(id);
        self.kind[id.idx as usize]
    }

    /// Returns the local transform of a layer.
    #[must_use]
    pub fn local_transform(&self, id: LayerId) -> Transform3d {
        self.validate(id);
        self.local_transform[id.idx as usize]
    }

    /// Returns the local opacity of a layer.
    #[must_use]
    pub fn local_opacity(&self, id: LayerId) -> f32 {
        self.validate(id);
        self.local_opacity[id.idx as usize]
    }

    /// Returns the clip rectangle of a layer, in its parent's space.
    #[must_use]
    pub fn clip(&self, id: LayerId) -> Option<IntRect> {
        self.validate(id);
        self.clip[id.idx as usize]
    }

    /// Returns the visible region of a layer, in its local space.
    #[must_use]
    pub fn visible_region(&self, id: LayerId) -> &Region {
        self.validate(id);
        &self.visible_region[id.idx as usize]
    }

    /// Returns whether the layer declares its content fully opaque.
    #[must_use]
    pub fn is_opaque(&self, id: LayerId) -> bool {
        self.validate(id);
        self.opaque[id.idx as usize]
    }

    /// Returns the layer's mask layer, if one is set and still alive.
    ///
    /// Mask references are weak: destroying the mask layer makes this return
    /// `None` without touching the masked layer.
    #[must_use]
    pub fn mask(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.mask[id.idx as usize].filter(|m| self.is_alive(*m))
    }

    /// Returns the solid colour of a colour layer.
    #[must_use]
    pub fn color(&self, id: LayerId) -> Color {
        self.validate(id);
        self.color[id.idx as usize]
    }

    /// Returns the sampling filter override of an image layer.
    #[must_use]
    pub fn filter(&self, id: LayerId) -> Option<Filter> {
        self.validate(id);
        self.filter[id.idx as usize]
    }

    /// Returns the flags of a layer.
    #[must_use]
    pub fn flags(&self, id: LayerId) -> LayerFlags {
        self.validate(id);
        self.flags[id.idx as usize]
    }

    /// Returns the computed world transform of a layer (product of every
    /// ancestor transform).
    ///
    /// Only valid after [`evaluate`](Self::evaluate) has been called.
    #[must_use]
    pub fn world_transform(&self, id: LayerId) -> Transform3d {
        self.validate(id);
        self.world_transform[id.idx as usize]
    }

    /// Returns the computed transform from layer space to the space of the
    /// nearest ancestor that renders into an intermediate surface.
    ///
    /// Only valid after [`evaluate`](Self::evaluate) has been called.
    #[must_use]
    pub fn effective_transform(&self, id: LayerId) -> Transform3d {
        self.validate(id);
        self.effective_transform[id.idx as usize]
    }

    /// Returns the computed opacity accumulated up to the nearest
    /// intermediate-surface ancestor.
    ///
    /// Only valid after [`evaluate`](Self::evaluate) has been called.
    #[must_use]
    pub fn effective_opacity(&self, id: LayerId) -> f32 {
        self.validate(id);
        self.effective_opacity[id.idx as usize]
    }

    /// Returns whether the layer is effectively hidden (including by an
    /// ancestor's hidden flag).
    ///
    /// Only valid after [`evaluate`](Self::evaluate) has been called.
    #[must_use]
    pub fn effective_hidden(&self, id: LayerId) -> bool {
        self.validate(id);
        self.effective_hidden[id.idx as usize]
    }

    /// Returns `true` if any ancestor declares opaque content.
    #[must_use]
    pub fn has_opaque_ancestor(&self, id: LayerId) -> bool {
        self.ancestors(id).any(|a| self.opaque[a.idx as usize])
    }

    // -- Mutation API (auto-marks dirty) --

    /// Sets the local transform of a layer.
    pub fn set_transform(&mut self, id: LayerId, transform: Transform3d) {
        self.validate(id);
        self.local_transform[id.idx as usize] = transform;
        self.dirty.mark_with(id.idx, dirty::TRANSFORM, &EagerPolicy);
    }

    /// Sets the local opacity of a layer.
    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) {
        self.validate(id);
        self.local_opacity[id.idx as usize] = opacity;
        self.dirty.mark_with(id.idx, dirty::OPACITY, &EagerPolicy);
    }

    /// Sets the clip rectangle of a layer, in its parent's space.
    pub fn set_clip(&mut self, id: LayerId, clip: Option<IntRect>) {
        self.validate(id);
        self.clip[id.idx as usize] = clip;
        self.dirty.mark(id.idx, dirty::CLIP);
    }

    /// Sets the visible region of a layer, in its local space.
    pub fn set_visible_region(&mut self, id: LayerId, region: Region) {
        self.validate(id);
        self.visible_region[id.idx as usize] = region;
        self.dirty.mark(id.idx, dirty::CONTENT);
    }

    /// Declares whether the layer's content covers its visible region with
    /// opaque pixels.
    pub fn set_opaque(&mut self, id: LayerId, opaque: bool) {
        self.validate(id);
        self.opaque[id.idx as usize] = opaque;
        self.dirty.mark(id.idx, dirty::CONTENT);
    }

    /// Sets (or clears) the mask layer of a layer.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale or belongs to another store, or if a
    /// layer is set as its own mask.
    pub fn set_mask(&mut self, id: LayerId, mask: Option<LayerId>) {
        self.validate(id);
        if let Some(m) = mask {
            self.validate(m);
            assert!(m != id, "a layer cannot mask itself");
        }
        self.mask[id.idx as usize] = mask;
        self.dirty.mark(id.idx, dirty::CONTENT);
    }

    /// Sets the solid colour of a colour layer.
    pub fn set_color(&mut self, id: LayerId, color: Color) {
        self.validate(id);
        self.color[id.idx as usize] = color;
        self.dirty.mark(id.idx, dirty::CONTENT);
    }

    /// Sets the sampling filter override of an image layer.
    pub fn set_filter(&mut self, id: LayerId, filter: Option<Filter>) {
        self.validate(id);
        self.filter[id.idx as usize] = filter;
        self.dirty.mark(id.idx, dirty::CONTENT);
    }

    /// Sets the flags of a layer.
    pub fn set_flags(&mut self, id: LayerId, flags: LayerFlags) {
        self.validate(id);
        let old = self.flags[id.idx as usize];
        self.flags[id.idx as usize] = flags;
        // Hidden and surface-boundary changes alter how descendants inherit.
        self.dirty.mark_with(id.idx, dirty::TRANSFORM, &EagerPolicy);
        if old.use_intermediate_surface != flags.use_intermediate_surface {
            self.dirty.mark_with(id.idx, dirty::OPACITY, &EagerPolicy);
        }
    }

    // -- Internal helpers --

    /// Panics if the handle is stale or foreign.
    pub(crate) fn validate(&self, id: LayerId) {
        assert!(
            id.owner == self.id,
            "LayerId {id:?} belongs to a different LayerStore"
        );
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale LayerId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    pub(crate) fn handle(&self, idx: u32) -> LayerId {
        LayerId {
            idx,
            generation: self.generation[idx as usize],
            owner: self.id,
        }
    }

    fn link_at(&self, idx: u32) -> Option<LayerId> {
        (idx != INVALID).then(|| self.handle(idx))
    }

    /// Links `c` into `p`'s child list after `after` (front when `None`).
    fn link(&mut self, p: u32, c: u32, after: Option<u32>) {
        self.parent[c as usize] = p;
        let next = match after {
            Some(a) => {
                let next = self.next_sibling[a as usize];
                self.next_sibling[a as usize] = c;
                self.prev_sibling[c as usize] = a;
                next
            }
            None => {
                let next = self.first_child[p as usize];
                self.first_child[p as usize] = c;
                self.prev_sibling[c as usize] = INVALID;
                next
            }
        };
        self.next_sibling[c as usize] = next;
        if next != INVALID {
            self.prev_sibling[next as usize] = c;
        } else {
            self.last_child[p as usize] = c;
        }
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        } else {
            self.last_child[p as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }

    fn collect_post_order(&self, idx: u32, out: &mut Vec<LayerId>) {
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            self.collect_post_order(child, out);
            child = self.next_sibling[child as usize];
        }
        out.push(self.handle(idx));
    }

    /// Marks the subtree rooted at `idx` dirty for inherited channels.
    fn mark_subtree_inherited_dirty(&mut self, idx: u32) {
        self.dirty.mark_with(idx, dirty::TRANSFORM, &EagerPolicy);
        self.dirty.mark_with(idx, dirty::OPACITY, &EagerPolicy);
    }
}
