// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer tree, texture hosts, and container composition for a
//! compositor-side rendering pipeline.
//!
//! `stratum_core` turns a tree of layer descriptions, plus pixel and handle
//! buffers supplied by a producer, into draw calls against a backend. It is
//! `no_std` compatible (with `alloc`) and backend-agnostic: GPU and software
//! backends live in their own crates and implement
//! [`Compositor`](backend::Compositor).
//!
//! # Architecture
//!
//! ```text
//!   producer ──► SharedImage ──► TextureHost::update ──► TextureSource
//!                                     │                  (backend texture)
//!                                 BufferHost
//!                                     │
//!   LayerStore::evaluate ──► LayerManager::composite ──► Compositor::draw_quad
//!                                     │
//!                                 PassReport
//! ```
//!
//! **[`layer`]**: Struct-of-arrays layer tree with generational handles.
//! Properties (transform, opacity, clip, visible region, mask) are set by
//! the caller; world and effective transforms and effective opacities are
//! computed by evaluation.
//!
//! **[`dirty`]**: Multi-channel dirty tracking via `understory_dirty`.
//!
//! **[`texture`]**: The [`TextureSource`](texture::TextureSource) contract
//! that backend textures implement, and the
//! [`TextureHost`](texture::TextureHost) that owns one texture plus its
//! optional double-buffer slot.
//!
//! **[`buffer`]**: [`BufferHost`](buffer::BufferHost), the texture hosts
//! behind one composited unit.
//!
//! **[`backend`]**: The [`Compositor`](backend::Compositor) trait: resource
//! factory, render-target stack, and the draw primitive.
//!
//! **[`composite`]**: The recursive container composition pass and its
//! [`PassReport`](composite::PassReport).
//!
//! **[`effect`]**: Per-draw [`EffectChain`](effect::EffectChain)s.
//!
//! **[`image`]** and **[`producer`]**: Shared-image descriptors and the
//! producer-side interfaces (de-allocation, async containers).
//!
//! **[`config`]**: Per-pass [`CompositorConfig`](config::CompositorConfig)
//! and [`FrameContext`](config::FrameContext).
//!
//! **[`geom`]**, **[`region`]**, **[`transform`]**: Integer geometry, pixel
//! regions, and the 3D transform type.
//!
//! **[`trace`]**: [`CompositeSink`](trace::CompositeSink) trait and event
//! types for pass instrumentation, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper, plus the surface
//! [`DumpHook`](trace::DumpHook).
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `serde` (disabled by default): Derives `Serialize`/`Deserialize` for
//!   configuration, geometry, and report types.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod backend;
pub mod buffer;
pub mod composite;
pub mod config;
pub mod dirty;
pub mod effect;
pub mod geom;
pub mod image;
pub mod layer;
pub mod producer;
pub mod region;
pub mod texture;
pub mod trace;
pub mod transform;

#[cfg(test)]
mod testing;
