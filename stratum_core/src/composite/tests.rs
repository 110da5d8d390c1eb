// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::rc::Rc;
use alloc::vec::Vec;

use super::*;
use crate::backend::{SurfaceInitMode, SurfaceSnapshot};
use crate::config::CompositorConfig;
use crate::effect::Color;
use crate::geom::{IntRect, IntSize};
use crate::layer::{LayerFlags, SurfaceId};
use crate::region::Region;
use crate::testing::{
    Call, FakeRegistry, FakeTexture, RecordingCompositor, RecordingDeallocator, pixels,
};
use crate::trace::{DumpHook, DumpResult};
use crate::transform::Transform3d;

type Manager = LayerManager<FakeTexture>;

const VIEWPORT: IntRect = IntRect::new(0, 0, 100, 100);

fn compositor() -> RecordingCompositor {
    let mut c = RecordingCompositor::default();
    c.begin_frame(VIEWPORT, Color::TRANSPARENT);
    c
}

fn run(m: &mut Manager, c: &mut RecordingCompositor) -> PassReport {
    m.composite(c, &mut FrameContext::default())
}

fn surface_flags() -> LayerFlags {
    LayerFlags {
        use_intermediate_surface: true,
        ..LayerFlags::default()
    }
}

/// A root container covering the viewport.
fn root(m: &mut Manager, opaque: bool) -> LayerId {
    let root = m.create_layer(LayerKind::Container);
    let store = m.store_mut();
    store.set_visible_region(root, Region::from_rect(VIEWPORT));
    store.set_opaque(root, opaque);
    m.set_root(Some(root));
    root
}

fn layer(m: &mut Manager, kind: LayerKind, parent: LayerId, region: Region) -> LayerId {
    let l = m.create_layer(kind);
    let store = m.store_mut();
    store.append_child(parent, l);
    store.set_visible_region(l, region);
    store.set_color(l, Color::WHITE);
    l
}

fn rect(x: i32, y: i32, w: u32, h: u32) -> Region {
    Region::from_rect(IntRect::new(x, y, w, h))
}

fn targets(c: &RecordingCompositor) -> Vec<Option<SurfaceId>> {
    c.calls
        .iter()
        .filter_map(|call| match call {
            Call::SetTarget(t) => Some(*t),
            _ => None,
        })
        .collect()
}

#[test]
fn opaque_single_rect_surface_is_not_initialised() {
    let mut m = Manager::new();
    let root = root(&mut m, false);
    let group = layer(&mut m, LayerKind::Container, root, rect(10, 10, 20, 20));
    m.store_mut().set_flags(group, surface_flags());
    m.store_mut().set_opaque(group, true);
    let child = layer(&mut m, LayerKind::Color, group, rect(10, 10, 20, 20));

    let mut c = compositor();
    let report = run(&mut m, &mut c);

    let record = report.record(group).unwrap();
    assert_eq!(record.init_mode, Some(SurfaceInitMode::None));
    assert!(record.component_alpha);
    assert_eq!(
        c.surfaces_created(),
        [(IntRect::new(10, 10, 20, 20), SurfaceInitMode::None)]
    );

    let draws = c.draws();
    assert_eq!(draws.len(), 2);
    // The child lands in the surface, relative to the visible origin.
    assert_eq!(draws[0].target, Some(SurfaceId(1)));
    assert_eq!(draws[0].offset, IntPoint::new(10, 10));
    assert_eq!(draws[0].clip, IntRect::new(0, 0, 20, 20));
    assert_eq!(report.record(child).unwrap().scissor, IntRect::new(0, 0, 20, 20));
    // Then the surface lands in the frame buffer.
    assert_eq!(draws[1].target, None);
    assert_eq!(draws[1].surface, Some(SurfaceId(1)));
    assert_eq!(draws[1].rect, kurbo::Rect::new(10.0, 10.0, 30.0, 30.0));
    assert_eq!(draws[1].clip, VIEWPORT);

    assert_eq!(c.calls.last(), Some(&Call::ReleaseSurface(SurfaceId(1))));
    assert!(c.live_surfaces.is_empty());
    assert_eq!(c.viewport, VIEWPORT);
}

#[test]
fn two_opaque_children_under_opaque_ancestor_copy_from_previous() {
    let mut m = Manager::new();
    let root = root(&mut m, true);
    let visible: Region = [IntRect::new(0, 0, 10, 10), IntRect::new(20, 0, 10, 10)]
        .into_iter()
        .collect();
    let group = layer(&mut m, LayerKind::Container, root, visible);
    m.store_mut().set_flags(group, surface_flags());
    m.store_mut()
        .set_transform(group, Transform3d::from_translation(3.0, 4.0, 0.0));
    let a = layer(&mut m, LayerKind::Color, group, rect(0, 0, 10, 10));
    let b = layer(&mut m, LayerKind::Color, group, rect(20, 0, 10, 10));
    m.store_mut().set_opaque(a, true);
    m.store_mut().set_opaque(b, true);

    let mut c = compositor();
    let report = run(&mut m, &mut c);

    let record = report.record(group).unwrap();
    assert_eq!(record.init_mode, Some(SurfaceInitMode::CopyFromPrevious));
    assert!(record.component_alpha);
    assert_eq!(
        c.surfaces_created(),
        [(IntRect::new(3, 4, 30, 10), SurfaceInitMode::CopyFromPrevious)]
    );
    for child in [a, b] {
        let r = report.record(child).unwrap();
        assert!(!r.scissor.is_empty());
        assert_eq!(r.skipped, None);
    }
    assert_eq!(report.draw_order, [root, group, a, b]);
    assert_eq!(report.draws, 3);
}

fn group_mode(opaque_root: bool, transform: Transform3d) -> (SurfaceInitMode, bool) {
    let mut m = Manager::new();
    let root = root(&mut m, opaque_root);
    let visible: Region = [IntRect::new(0, 0, 10, 10), IntRect::new(20, 0, 10, 10)]
        .into_iter()
        .collect();
    let group = layer(&mut m, LayerKind::Container, root, visible);
    m.store_mut().set_flags(group, surface_flags());
    m.store_mut().set_transform(group, transform);
    let report = run(&mut m, &mut compositor());
    let record = report.record(group).unwrap();
    (record.init_mode.unwrap(), record.component_alpha)
}

#[test]
fn copy_from_previous_requires_opaque_ancestor() {
    assert_eq!(
        group_mode(false, Transform3d::from_translation(3.0, 4.0, 0.0)),
        (SurfaceInitMode::Clear, false)
    );
}

#[test]
fn copy_from_previous_requires_integer_translation() {
    for t in [
        Transform3d::from_translation(2.5, 0.0, 0.0),
        Transform3d::from_rotation_z(0.3),
        Transform3d::from_scale(2.0, 2.0, 1.0),
    ] {
        assert_eq!(group_mode(true, t), (SurfaceInitMode::Clear, false));
    }
}

#[test]
fn surface_draw_uses_container_opacity_and_transform() {
    let mut m = Manager::new();
    let root = root(&mut m, false);
    let group = layer(&mut m, LayerKind::Container, root, rect(0, 0, 10, 10));
    let t = Transform3d::from_translation(3.0, 4.0, 0.0);
    m.store_mut().set_flags(group, surface_flags());
    m.store_mut().set_transform(group, t);
    m.store_mut().set_opacity(group, 0.5);
    layer(&mut m, LayerKind::Color, group, rect(0, 0, 10, 10));

    let mut c = compositor();
    run(&mut m, &mut c);
    let draws = c.draws();
    // Inside the surface, transform and opacity start over.
    assert_eq!(draws[0].opacity, 1.0);
    assert_eq!(draws[0].transform, Transform3d::IDENTITY);
    assert_eq!(draws[1].opacity, 0.5);
    assert_eq!(draws[1].transform, t);
}

#[test]
fn children_render_back_to_front() {
    let mut m = Manager::new();
    let root = root(&mut m, false);
    let mut by_depth = Vec::new();
    for z in [5.0, -3.0, 1.0] {
        let l = layer(&mut m, LayerKind::Color, root, rect(0, 0, 10, 10));
        m.store_mut()
            .set_transform(l, Transform3d::from_translation(0.0, 0.0, z));
        by_depth.push(l);
    }
    let (near, far, mid) = (by_depth[0], by_depth[1], by_depth[2]);

    let report = run(&mut m, &mut compositor());
    assert_eq!(report.draw_order, [root, far, mid, near]);
}

#[test]
fn skipped_children_are_recorded() {
    let mut m = Manager::new();
    let root = root(&mut m, false);
    let empty = layer(&mut m, LayerKind::Color, root, Region::new());
    let clipped = layer(&mut m, LayerKind::Color, root, rect(0, 0, 10, 10));
    m.store_mut()
        .set_clip(clipped, Some(IntRect::new(200, 200, 10, 10)));
    let hidden = layer(&mut m, LayerKind::Color, root, rect(0, 0, 10, 10));
    m.store_mut().set_flags(
        hidden,
        LayerFlags {
            hidden: true,
            ..LayerFlags::default()
        },
    );
    let hostless = layer(&mut m, LayerKind::Image, root, rect(0, 0, 10, 10));
    let drawn = layer(&mut m, LayerKind::Color, root, rect(0, 0, 10, 10));

    let mut c = compositor();
    let report = run(&mut m, &mut c);
    let skipped: Vec<_> = report.skipped().collect();
    assert_eq!(
        skipped,
        [
            (empty, SkipReason::EmptyVisibleRegion),
            (clipped, SkipReason::EmptyScissor),
            (hidden, SkipReason::Hidden),
            (hostless, SkipReason::NothingToDraw),
        ]
    );
    assert_eq!(report.draw_order, [root, drawn]);
    assert_eq!(c.draws().len(), 1);
}

#[test]
fn disabled_compositing_records_without_drawing() {
    let mut m = Manager::new();
    let root = root(&mut m, false);
    let group = layer(&mut m, LayerKind::Container, root, rect(10, 10, 20, 20));
    m.store_mut().set_flags(group, surface_flags());
    let child = layer(&mut m, LayerKind::Color, group, rect(10, 10, 20, 20));

    let mut c = compositor();
    let mut ctx = FrameContext::new(CompositorConfig {
        compositing_disabled: true,
        ..CompositorConfig::default()
    });
    let report = m.composite(&mut c, &mut ctx);

    assert_eq!(c.calls, [Call::SaveViewport, Call::RestoreViewport]);
    assert_eq!(report.draws, 0);
    assert_eq!(report.surfaces_created, 0);
    assert_eq!(report.draw_order, [root, group, child]);
    let record = report.record(child).unwrap();
    assert_eq!(record.offset, IntPoint::new(10, 10));
    assert_eq!(record.scissor, IntRect::new(0, 0, 20, 20));
    assert_eq!(
        report.record(group).unwrap().init_mode,
        Some(SurfaceInitMode::Clear)
    );
}

#[test]
fn failed_surface_skips_subtree() {
    let mut m = Manager::new();
    let root = root(&mut m, false);
    let group = layer(&mut m, LayerKind::Container, root, rect(0, 0, 20, 20));
    m.store_mut().set_flags(group, surface_flags());
    let child = layer(&mut m, LayerKind::Color, group, rect(0, 0, 20, 20));

    let mut c = compositor();
    c.fail_surfaces = true;
    let report = run(&mut m, &mut c);

    assert_eq!(
        report.record(group).unwrap().skipped,
        Some(SkipReason::SurfaceAllocationFailed)
    );
    assert!(report.record(child).is_none());
    assert_eq!(
        c.calls,
        [
            Call::SaveViewport,
            Call::CreateSurface(IntRect::new(0, 0, 20, 20), SurfaceInitMode::Clear),
            Call::RestoreViewport,
        ]
    );
}

#[test]
fn nested_surfaces_restore_targets() {
    let mut m = Manager::new();
    let root = root(&mut m, false);
    let outer = layer(&mut m, LayerKind::Container, root, rect(0, 0, 50, 50));
    m.store_mut().set_flags(outer, surface_flags());
    let inner = layer(&mut m, LayerKind::Container, outer, rect(0, 0, 10, 10));
    m.store_mut().set_flags(inner, surface_flags());
    m.store_mut()
        .set_transform(inner, Transform3d::from_translation(5.0, 5.0, 0.0));
    layer(&mut m, LayerKind::Color, inner, rect(0, 0, 10, 10));

    let mut c = compositor();
    let report = run(&mut m, &mut c);

    assert_eq!(report.surfaces_created, 2);
    assert_eq!(
        targets(&c),
        [
            Some(SurfaceId(1)),
            Some(SurfaceId(2)),
            Some(SurfaceId(1)),
            None
        ]
    );
    let releases: Vec<_> = c
        .calls
        .iter()
        .filter(|call| matches!(call, Call::ReleaseSurface(_)))
        .cloned()
        .collect();
    assert_eq!(
        releases,
        [
            Call::ReleaseSurface(SurfaceId(2)),
            Call::ReleaseSurface(SurfaceId(1))
        ]
    );
    // The inner surface is drawn into the outer one with its own transform.
    let draws = c.draws();
    assert_eq!(draws[1].target, Some(SurfaceId(1)));
    assert_eq!(
        draws[1].transform,
        Transform3d::from_translation(5.0, 5.0, 0.0)
    );
    assert!(c.live_surfaces.is_empty());
}

#[test]
fn image_layer_draws_texture_with_mask() {
    let mut m = Manager::new();
    let mut c = compositor();
    let root = root(&mut m, false);
    let image = layer(&mut m, LayerKind::Image, root, rect(0, 0, 4, 4));
    m.ensure_texture_host(&mut c, image, TextureKind::Direct, Buffering::None);
    let _ = m.update_image(image, pixels(4, 4));

    let mask = m.create_layer(LayerKind::Image);
    m.ensure_texture_host(&mut c, mask, TextureKind::Direct, Buffering::None);
    let _ = m.update_image(mask, pixels(8, 8));
    m.store_mut().set_mask(image, Some(mask));

    let report = run(&mut m, &mut c);
    assert_eq!(report.draws, 1);
    let draws = c.draws();
    assert_eq!(draws[0].texture, Some((1, None, IntRect::new(0, 0, 4, 4))));
    assert_eq!(draws[0].mask, Some((2, false)));
}

#[test]
fn perspective_container_mask_is_3d() {
    let mut m = Manager::new();
    let mut c = compositor();
    let root = root(&mut m, true);
    let group = layer(&mut m, LayerKind::Container, root, rect(0, 0, 10, 10));
    let mut t = Transform3d::IDENTITY;
    t.cols[0][3] = 0.001;
    m.store_mut().set_flags(group, surface_flags());
    m.store_mut().set_transform(group, t);
    layer(&mut m, LayerKind::Color, group, rect(0, 0, 10, 10));

    let mask = m.create_layer(LayerKind::Image);
    m.ensure_texture_host(&mut c, mask, TextureKind::Direct, Buffering::None);
    let _ = m.update_image(mask, pixels(10, 10));
    m.store_mut().set_mask(group, Some(mask));

    let report = run(&mut m, &mut c);
    assert_eq!(
        report.record(group).unwrap().init_mode,
        Some(SurfaceInitMode::Clear)
    );
    let draws = c.draws();
    assert_eq!(draws.last().unwrap().mask, Some((1, true)));
}

#[test]
fn async_layer_waits_for_first_image() {
    let mut m = Manager::new();
    let mut c = compositor();
    let root = root(&mut m, false);
    let image = layer(&mut m, LayerKind::Image, root, rect(0, 0, 2, 2));
    m.ensure_texture_host(&mut c, image, TextureKind::Direct, Buffering::None);
    assert!(m.set_async_container(image, AsyncContainerId(7), 1));

    let registry = FakeRegistry::default();
    let report = m.composite(&mut c, &mut FrameContext::default().with_registry(&registry));
    assert_eq!(
        report.skipped().collect::<Vec<_>>(),
        [(image, SkipReason::AsyncNotReady)]
    );

    *registry.image.borrow_mut() = Some(pixels(2, 2));
    registry.version.set(1);
    let report = m.composite(&mut c, &mut FrameContext::default().with_registry(&registry));
    assert_eq!(report.skipped().count(), 0);
    assert_eq!(report.draw_order, [root, image]);
    assert_eq!(report.frame_index, 2);
}

#[derive(Default)]
struct Dumps {
    layers: Vec<(LayerId, IntSize)>,
    fail: bool,
}

impl DumpHook for Dumps {
    fn dump_surface(&mut self, layer: LayerId, snapshot: &SurfaceSnapshot) -> DumpResult {
        if self.fail {
            return Err("disk full".into());
        }
        self.layers.push((layer, snapshot.size));
        Ok(())
    }
}

fn dump_scene(m: &mut Manager) -> LayerId {
    let root = root(m, false);
    let group = layer(m, LayerKind::Container, root, rect(0, 0, 6, 3));
    m.store_mut().set_flags(group, surface_flags());
    layer(m, LayerKind::Color, group, rect(0, 0, 6, 3));
    group
}

#[test]
fn dump_hook_sees_each_surface() {
    let mut m = Manager::new();
    let group = dump_scene(&mut m);
    let mut dumps = Dumps::default();
    let config = CompositorConfig {
        dump_surfaces: true,
        ..CompositorConfig::default()
    };
    let mut c = compositor();
    let report = m.composite(&mut c, &mut FrameContext::new(config).with_dump(&mut dumps));
    assert_eq!(report.draws, 2);
    assert_eq!(dumps.layers, [(group, IntSize::new(6, 3))]);
}

#[test]
fn dump_failure_does_not_change_output() {
    let mut m = Manager::new();
    dump_scene(&mut m);
    let mut dumps = Dumps {
        fail: true,
        ..Dumps::default()
    };
    let config = CompositorConfig {
        dump_surfaces: true,
        ..CompositorConfig::default()
    };
    let mut c = compositor();
    let report = m.composite(&mut c, &mut FrameContext::new(config).with_dump(&mut dumps));
    assert_eq!(report.draws, 2);
    assert!(c.live_surfaces.is_empty());
}

#[test]
fn destroying_a_layer_releases_its_descriptor() {
    let mut m = Manager::new();
    let dealloc = Rc::new(RecordingDeallocator::default());
    m.set_deallocator(dealloc.clone());
    let mut c = compositor();
    let root = root(&mut m, false);
    let image = layer(&mut m, LayerKind::Image, root, rect(0, 0, 1, 1));
    m.ensure_texture_host(&mut c, image, TextureKind::Direct, Buffering::Double);
    let _ = m.update_image(image, pixels(1, 1));

    assert_eq!(m.destroy_layer(image), [image]);
    assert!(m.buffer_host(image).is_none());
    assert_eq!(dealloc.destroyed.borrow().as_slice(), &[pixels(1, 1)]);
}

#[test]
fn hosts_of_layers_destroyed_through_the_store_are_dropped() {
    let mut m = Manager::new();
    let dealloc = Rc::new(RecordingDeallocator::default());
    m.set_deallocator(dealloc.clone());
    let mut c = compositor();
    let root = root(&mut m, false);
    let image = layer(&mut m, LayerKind::Image, root, rect(0, 0, 1, 1));
    m.ensure_texture_host(&mut c, image, TextureKind::Direct, Buffering::Single);
    let _ = m.update_image(image, pixels(1, 1));

    m.store_mut().destroy_layer(image);
    assert!(dealloc.destroyed.borrow().is_empty());
    run(&mut m, &mut c);
    assert_eq!(dealloc.destroyed.borrow().len(), 1);
}

#[test]
fn update_without_host_passes_image_back() {
    let mut m = Manager::new();
    let l = m.create_layer(LayerKind::Image);
    let out = m.update_image(l, pixels(3, 3));
    assert_eq!(out.previous, pixels(3, 3));
    assert!(!out.initialized);
    assert!(!m.set_async_container(l, AsyncContainerId(1), 0));
}

#[test]
fn missing_root_draws_nothing() {
    let mut m = Manager::new();
    let mut c = compositor();
    let report = run(&mut m, &mut c);
    assert!(report.records.is_empty());
    assert!(c.calls.is_empty());
    assert!(report.draw_order.is_empty());
}
