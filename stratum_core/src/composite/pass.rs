// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The recursive walk that turns the layer tree into draw calls.

use core::fmt;

use crate::backend::{Compositor, SurfaceInitMode};
use crate::buffer::BufferHost;
use crate::config::FrameContext;
use crate::effect::{EffectChain, SurfaceEffect};
use crate::geom::{IntPoint, IntRect};
use crate::layer::{LayerId, LayerKind, LayerStore, SurfaceId};
use crate::texture::TextureSource;
use crate::trace::{LayerSkippedEvent, SurfaceEvent};

use super::report::{LayerRecord, PassReport, SkipReason};
use super::{order, scissor};

/// A buffer host together with the layer it belongs to.
pub(crate) struct HostEntry<T> {
    pub(crate) layer: LayerId,
    pub(crate) host: BufferHost<T>,
}

impl<T: TextureSource> fmt::Debug for HostEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEntry")
            .field("layer", &self.layer)
            .field("host", &self.host)
            .finish()
    }
}

/// Looks up the buffer host of a live layer.
pub(crate) fn host_of<T>(hosts: &[Option<HostEntry<T>>], layer: LayerId) -> Option<&BufferHost<T>> {
    hosts
        .get(layer.index() as usize)?
        .as_ref()
        .filter(|e| e.layer == layer)
        .map(|e| &e.host)
}

/// Picks how a container's surface is seeded.
///
/// Returns the mode and, for [`SurfaceInitMode::CopyFromPrevious`], the
/// whole-pixel translation the surface rectangle must be shifted by.
pub(crate) fn choose_init_mode(
    store: &LayerStore,
    container: LayerId,
) -> (SurfaceInitMode, Option<(i32, i32)>) {
    if store.visible_region(container).is_single_rect() && store.is_opaque(container) {
        return (SurfaceInitMode::None, None);
    }
    if store.has_opaque_ancestor(container) {
        if let Some(t) = store.effective_transform(container).as_integer_translation() {
            return (SurfaceInitMode::CopyFromPrevious, Some(t));
        }
    }
    (SurfaceInitMode::Clear, None)
}

pub(crate) struct Pass<'p, 'c, 'h, C: Compositor> {
    store: &'h LayerStore,
    hosts: &'h [Option<HostEntry<C::Texture>>],
    compositor: &'p mut C,
    ctx: &'p mut FrameContext<'c>,
    not_ready: &'p [LayerId],
    report: PassReport,
}

impl<'p, 'c, 'h, C: Compositor> Pass<'p, 'c, 'h, C> {
    pub(crate) fn new(
        store: &'h LayerStore,
        hosts: &'h [Option<HostEntry<C::Texture>>],
        compositor: &'p mut C,
        ctx: &'p mut FrameContext<'c>,
        not_ready: &'p [LayerId],
        frame_index: u64,
    ) -> Self {
        Self {
            store,
            hosts,
            compositor,
            ctx,
            not_ready,
            report: PassReport::new(frame_index),
        }
    }

    pub(crate) fn finish(self) -> PassReport {
        self.report
    }

    /// Renders `layer` unless something rules it out.
    pub(crate) fn visit(
        &mut self,
        layer: LayerId,
        offset: IntPoint,
        scissor: IntRect,
        parent_component_alpha: bool,
    ) {
        let store = self.store;
        let reason = if store.effective_hidden(layer) {
            Some(SkipReason::Hidden)
        } else if self.not_ready.contains(&layer) {
            Some(SkipReason::AsyncNotReady)
        } else if store.visible_region(layer).is_empty() {
            Some(SkipReason::EmptyVisibleRegion)
        } else if scissor.is_empty() {
            Some(SkipReason::EmptyScissor)
        } else {
            None
        };

        let mut record = LayerRecord::new(layer, offset, scissor);
        record.component_alpha = parent_component_alpha;
        if let Some(reason) = reason {
            self.skip(record, reason);
            return;
        }
        match store.kind(layer) {
            LayerKind::Container => self.render_container(record),
            LayerKind::Color | LayerKind::Image => self.render_leaf(record),
        }
    }

    fn skip(&mut self, mut record: LayerRecord, reason: SkipReason) {
        tracing::debug!(layer = ?record.layer, ?reason, "layer skipped");
        record.skipped = Some(reason);
        self.ctx.tracer.layer_skipped(&LayerSkippedEvent {
            frame_index: self.report.frame_index,
            layer: record.layer,
            reason,
        });
        self.report.records.push(record);
    }

    fn render_container(&mut self, mut record: LayerRecord) {
        let store = self.store;
        let id = record.layer;
        let offset = record.offset;
        let clip = record.scissor;
        let disabled = self.ctx.config.compositing_disabled;
        let visible_rect = store.visible_region(id).bounds();
        let uses_surface = store.flags(id).use_intermediate_surface;
        let previous = self.compositor.render_target();

        let mut surface: Option<SurfaceId> = None;
        let child_offset = if uses_surface {
            let (mode, translation) = choose_init_mode(store, id);
            let mut surface_rect = visible_rect;
            if let Some((tx, ty)) = translation {
                surface_rect = surface_rect.translate(tx, ty);
            }
            let surface_rect = surface_rect.translate(-offset.x, -offset.y);
            tracing::debug!(layer = ?id, ?mode, rect = ?surface_rect, "intermediate surface");
            record.init_mode = Some(mode);
            record.component_alpha = mode != SurfaceInitMode::Clear;

            self.compositor.save_viewport();
            if !disabled {
                match self.compositor.create_surface(surface_rect, mode) {
                    Ok(s) => {
                        self.compositor.set_render_target(Some(s));
                        surface = Some(s);
                        self.report.surfaces_created += 1;
                        self.ctx.tracer.surface(&SurfaceEvent {
                            frame_index: self.report.frame_index,
                            layer: id,
                            rect: surface_rect,
                            mode,
                        });
                    }
                    Err(err) => {
                        tracing::warn!(layer = ?id, %err, "cannot allocate intermediate surface");
                        self.compositor.restore_viewport();
                        self.skip(record, SkipReason::SurfaceAllocationFailed);
                        return;
                    }
                }
            }
            visible_rect.origin()
        } else {
            record.component_alpha = store.is_opaque(id) || record.component_alpha;
            offset
        };

        let component_alpha = record.component_alpha;
        self.report.records.push(record);
        self.report.draw_order.push(id);

        for child in order::z_sorted(store, id) {
            let child_scissor = scissor::child_scissor(store, id, clip, child, child_offset);
            self.visit(child, child_offset, child_scissor, component_alpha);
        }

        if !uses_surface {
            return;
        }
        if let Some(s) = surface {
            self.compositor.set_render_target(previous);
            if self.ctx.config.dump_surfaces {
                self.dump(id, s);
            }
        }
        self.compositor.restore_viewport();
        if let Some(s) = surface {
            let mut effects = EffectChain::new();
            effects.surface = Some(SurfaceEffect { surface: s });
            self.attach_mask(id, &mut effects);
            self.compositor.draw_quad(
                visible_rect.to_rect(),
                &effects,
                store.effective_opacity(id),
                &store.effective_transform(id),
                clip,
                offset,
            );
            self.report.draws += 1;
            self.compositor.release_surface(s);
        }
    }

    fn render_leaf(&mut self, record: LayerRecord) {
        let store = self.store;
        let id = record.layer;
        if self.ctx.config.compositing_disabled {
            self.report.records.push(record);
            self.report.draw_order.push(id);
            return;
        }

        let transform = store.effective_transform(id);
        let opacity = store.effective_opacity(id);
        let visible = store.visible_region(id);
        let drawn = if store.kind(id) == LayerKind::Color {
            let mut effects = EffectChain::new();
            effects.solid_color = Some(store.color(id));
            self.attach_mask(id, &mut effects);
            self.compositor.draw_quad(
                visible.bounds().to_rect(),
                &effects,
                opacity,
                &transform,
                record.scissor,
                record.offset,
            );
            1
        } else if let Some(host) = host_of(self.hosts, id) {
            let mut effects = EffectChain::new();
            self.attach_mask(id, &mut effects);
            let filter = store.filter(id).unwrap_or(self.ctx.config.default_filter);
            host.composite(
                &mut *self.compositor,
                effects,
                opacity,
                &transform,
                record.offset,
                filter,
                record.scissor,
                Some(visible),
            )
        } else {
            0
        };

        if drawn == 0 {
            self.skip(record, SkipReason::NothingToDraw);
            return;
        }
        self.report.draws += drawn;
        self.report.records.push(record);
        self.report.draw_order.push(id);
    }

    /// Adds the mask of `layer`, if it has a usable one.
    fn attach_mask(&self, layer: LayerId, effects: &mut EffectChain<'h, C::Texture>) {
        let store = self.store;
        let Some(mask) = store.mask(layer) else {
            return;
        };
        let Some(host) = host_of(self.hosts, mask) else {
            tracing::debug!(?layer, ?mask, "mask layer has no buffer host");
            return;
        };
        let transform = store.effective_transform(layer) * store.local_transform(mask);
        let is_3d = !store.local_transform(layer).can_draw_2d();
        if !host.add_mask_effect(effects, transform, is_3d) {
            tracing::debug!(?layer, ?mask, "mask texture not ready; drawing unmasked");
        }
    }

    fn dump(&mut self, layer: LayerId, surface: SurfaceId) {
        let Some(hook) = self.ctx.dump.as_deref_mut() else {
            return;
        };
        let Some(snapshot) = self.compositor.snapshot_surface(surface) else {
            tracing::debug!(?layer, "backend cannot read back surfaces");
            return;
        };
        if let Err(err) = hook.dump_surface(layer, &snapshot) {
            tracing::warn!(?layer, %err, "surface dump failed");
        }
    }
}
