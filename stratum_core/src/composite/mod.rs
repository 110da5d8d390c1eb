// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Container composition: walking the layer tree into backend draws.
//!
//! [`LayerManager`] owns a [`LayerStore`] together with the
//! [`BufferHost`]s of its image layers, and runs one composition pass per
//! [`composite`](LayerManager::composite) call.
//!
//! # The pass
//!
//! 1. The store is evaluated, and buffer hosts of destroyed layers are
//!    dropped (releasing their held descriptors).
//! 2. Image layers bound to an async container are refreshed from the
//!    frame's registry; those with no published image sit this frame out.
//! 3. The tree is walked from the root with offset zero and the viewport
//!    as scissor. For each container:
//!    - If it is flagged `use_intermediate_surface`, a surface covering its
//!      visible bounds is allocated and bound. The surface is left
//!      uninitialised when the container is a single opaque rectangle, is
//!      seeded from the previous target when an ancestor is opaque and the
//!      container sits at a whole-pixel translation, and is cleared
//!      otherwise. Children draw relative to the visible bounds origin.
//!    - Children are visited back to front. A child whose visible region or
//!      scissor is empty is skipped.
//!    - The surface, if any, is unbound, optionally dumped, drawn into the
//!      previous target with the container's transform, opacity, clip and
//!      mask, and released.
//! 4. Every decision is recorded in the returned [`PassReport`].
//!
//! With [`CompositorConfig::compositing_disabled`](crate::config::CompositorConfig::compositing_disabled)
//! set, the walk and the report are unchanged but no surface is allocated
//! and nothing is drawn.

mod order;
mod pass;
mod report;
mod scissor;

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use crate::backend::Compositor;
use crate::buffer::BufferHost;
use crate::config::FrameContext;
use crate::geom::IntPoint;
use crate::image::SharedImage;
use crate::layer::{LayerId, LayerKind, LayerStore};
use crate::producer::{AsyncContainerId, AsyncImageRegistry, SurfaceDeallocator};
use crate::texture::{Buffering, TextureHost, TextureKind, TextureSource, UpdateOutcome};
use crate::trace::{FrameBeginEvent, FrameEndEvent};

use pass::{HostEntry, Pass, host_of};

pub use report::{LayerRecord, PassReport, SkipReason};

/// A layer tree plus the buffer hosts that give its image layers content.
pub struct LayerManager<T> {
    store: LayerStore,
    hosts: Vec<Option<HostEntry<T>>>,
    root: Option<LayerId>,
    deallocator: Option<Rc<dyn SurfaceDeallocator>>,
    frame_index: u64,
}

impl<T: TextureSource> Default for LayerManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TextureSource> LayerManager<T> {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: LayerStore::new(),
            hosts: Vec::new(),
            root: None,
            deallocator: None,
            frame_index: 0,
        }
    }

    /// The layer tree.
    #[must_use]
    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    /// Mutable access to the layer tree.
    ///
    /// Layers destroyed through the store lose their buffer hosts at the
    /// next [`composite`](Self::composite).
    pub fn store_mut(&mut self) -> &mut LayerStore {
        &mut self.store
    }

    /// Creates a layer. See [`LayerStore::create_layer`].
    pub fn create_layer(&mut self, kind: LayerKind) -> LayerId {
        self.store.create_layer(kind)
    }

    /// Sets the layer the pass starts from.
    pub fn set_root(&mut self, root: Option<LayerId>) {
        self.root = root;
    }

    /// The root layer, if set and alive.
    #[must_use]
    pub fn root(&self) -> Option<LayerId> {
        self.root.filter(|r| self.store.is_alive(*r))
    }

    /// Number of passes run so far.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Binds the de-allocator used by every buffer host, present and future.
    ///
    /// # Panics
    ///
    /// Panics if a host is already bound to a different de-allocator.
    pub fn set_deallocator(&mut self, deallocator: Rc<dyn SurfaceDeallocator>) {
        for entry in self.hosts.iter_mut().flatten() {
            entry.host.set_deallocator(deallocator.clone());
        }
        self.deallocator = Some(deallocator);
    }

    /// Gives `layer` its buffer host, dropping any previous one.
    ///
    /// # Panics
    ///
    /// Panics if `layer` is not alive.
    pub fn attach_buffer_host(&mut self, layer: LayerId, mut host: BufferHost<T>) {
        assert!(
            self.store.is_alive(layer),
            "cannot attach a buffer host to {layer:?}: layer is not alive"
        );
        if let Some(d) = &self.deallocator {
            host.set_deallocator(d.clone());
        }
        let slot = layer.index() as usize;
        if self.hosts.len() <= slot {
            self.hosts.resize_with(slot + 1, || None);
        }
        self.hosts[slot] = Some(HostEntry { layer, host });
    }

    /// Makes sure `layer` has a texture host of `kind`, creating the
    /// buffer host and texture through `compositor` as needed.
    ///
    /// # Panics
    ///
    /// Panics if `layer` is not alive.
    pub fn ensure_texture_host<C>(
        &mut self,
        compositor: &mut C,
        layer: LayerId,
        kind: TextureKind,
        buffering: Buffering,
    ) where
        C: Compositor<Texture = T>,
    {
        if self.buffer_host(layer).is_none() {
            self.attach_buffer_host(layer, BufferHost::new());
        }
        if let Some(host) = self.buffer_host_mut(layer) {
            if !host.has_texture_host(kind) {
                host.add_texture_host(
                    kind,
                    TextureHost::new(compositor.create_texture(kind), buffering),
                );
            }
        }
    }

    /// The buffer host of `layer`.
    #[must_use]
    pub fn buffer_host(&self, layer: LayerId) -> Option<&BufferHost<T>> {
        host_of(&self.hosts, layer)
    }

    /// Mutable access to the buffer host of `layer`.
    pub fn buffer_host_mut(&mut self, layer: LayerId) -> Option<&mut BufferHost<T>> {
        self.hosts
            .get_mut(layer.index() as usize)?
            .as_mut()
            .filter(|e| e.layer == layer)
            .map(|e| &mut e.host)
    }

    /// Delivers a new image to `layer`.
    ///
    /// Without a buffer host, the image is handed straight back in
    /// [`UpdateOutcome::previous`].
    pub fn update_image(&mut self, layer: LayerId, image: SharedImage) -> UpdateOutcome {
        match self.buffer_host_mut(layer) {
            Some(host) => host.update(image),
            None => UpdateOutcome {
                previous: image,
                initialized: false,
                reset: false,
            },
        }
    }

    /// Feeds `layer` from an async container. Returns `false` if the layer
    /// has no buffer host.
    pub fn set_async_container(
        &mut self,
        layer: LayerId,
        container: AsyncContainerId,
        compositor_id: u64,
    ) -> bool {
        match self.buffer_host_mut(layer) {
            Some(host) => {
                host.set_async_container(container, compositor_id);
                true
            }
            None => false,
        }
    }

    /// Destroys `layer` and its subtree together with their buffer hosts.
    ///
    /// Returns the destroyed handles, children before parents.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn destroy_layer(&mut self, layer: LayerId) -> Vec<LayerId> {
        let destroyed = self.store.destroy_subtree(layer);
        for id in &destroyed {
            if let Some(slot) = self.hosts.get_mut(id.index() as usize) {
                if slot.as_ref().is_some_and(|e| e.layer == *id) {
                    *slot = None;
                }
            }
        }
        destroyed
    }

    fn purge_dead_hosts(&mut self) {
        let store = &self.store;
        for slot in &mut self.hosts {
            if slot.as_ref().is_some_and(|e| !store.is_alive(e.layer)) {
                *slot = None;
            }
        }
    }

    fn refresh_async(&mut self, registry: Option<&dyn AsyncImageRegistry>) -> Vec<LayerId> {
        let mut not_ready = Vec::new();
        let Some(registry) = registry else {
            return not_ready;
        };
        for entry in self.hosts.iter_mut().flatten() {
            if entry.host.async_container().is_some() && !entry.host.update_async_texture(registry)
            {
                tracing::debug!(layer = ?entry.layer, "async image not published yet");
                not_ready.push(entry.layer);
            }
        }
        not_ready
    }

    /// Runs one composition pass into `compositor`.
    ///
    /// The caller brackets the pass with
    /// [`begin_frame`](Compositor::begin_frame) and
    /// [`end_frame`](Compositor::end_frame); the frame buffer's viewport is
    /// the root scissor.
    pub fn composite<C>(&mut self, compositor: &mut C, ctx: &mut FrameContext<'_>) -> PassReport
    where
        C: Compositor<Texture = T>,
    {
        self.frame_index += 1;
        let frame_index = self.frame_index;

        let changes = self.store.evaluate();
        if !changes.removed.is_empty() {
            self.purge_dead_hosts();
        }

        let viewport = compositor.viewport();
        ctx.tracer.frame_begin(&FrameBeginEvent {
            frame_index,
            viewport,
        });

        let not_ready = self.refresh_async(ctx.registry);
        let root = self.root();
        let mut pass = Pass::new(
            &self.store,
            &self.hosts,
            compositor,
            ctx,
            &not_ready,
            frame_index,
        );
        match root {
            Some(root) => pass.visit(root, IntPoint::ZERO, viewport, false),
            None => tracing::debug!("no root layer; nothing to composite"),
        }
        let report = pass.finish();

        ctx.tracer.frame_end(&FrameEndEvent {
            frame_index,
            draws: report.draws,
            surfaces: report.surfaces_created,
            skipped: report.skipped().count(),
        });
        report
    }
}

impl<T: TextureSource> fmt::Debug for LayerManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerManager")
            .field("store", &self.store)
            .field("hosts", &self.hosts)
            .field("root", &self.root)
            .field("deallocator", &self.deallocator.is_some())
            .field("frame_index", &self.frame_index)
            .finish()
    }
}

#[cfg(test)]
mod tests;
