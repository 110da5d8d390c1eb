// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer tree data model.
//!
//! A *layer* is a node in a compositing tree. Each layer has:
//!
//! - An identity ([`LayerId`]): a generational handle that becomes stale when
//!   the layer is destroyed, preventing use-after-free bugs at the API level.
//! - Topology: parent, first/last child, and doubly linked siblings forming
//!   an ordered tree, mutated through
//!   [`insert_after`](LayerStore::insert_after),
//!   [`remove_child`](LayerStore::remove_child),
//!   [`reposition_child`](LayerStore::reposition_child), and
//!   [`append_child`](LayerStore::append_child).
//! - **Local properties** set by the caller: kind, transform, opacity, clip
//!   rectangle, visible region, opaque-content flag, mask layer, colour,
//!   filter, and [`LayerFlags`].
//! - **Computed properties** produced by [`evaluate`](LayerStore::evaluate):
//!   world transform, effective transform and opacity (relative to the
//!   nearest intermediate surface), and effective hidden state.
//!
//! Layers are stored in struct-of-arrays layout with index-based handles
//! for cache-friendly traversal.
//!
//! # Dirty tracking
//!
//! Property mutations automatically mark the corresponding dirty channel
//! (see [`dirty`](crate::dirty)).

mod evaluate;
mod id;
mod store;
mod traverse;

pub use evaluate::FrameChanges;
pub use id::{INVALID, LayerId, SurfaceId};
pub use store::{LayerFlags, LayerKind, LayerStore};
pub use traverse::{Ancestors, Children};
