// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The layer store uses multi-channel dirty tracking (via
//! [`understory_dirty`]) so that evaluation only recomputes what changed.
//!
//! # Propagation semantics
//!
//! - **Propagating**: [`TRANSFORM`] and [`OPACITY`] use
//!   [`EagerPolicy`](understory_dirty::EagerPolicy) and have dependency
//!   edges from child to parent. World transforms, effective transforms,
//!   effective opacities and effective hidden state are inherited, so
//!   marking a parent marks every descendant. Hidden-flag and
//!   intermediate-surface flag changes are routed through [`TRANSFORM`]
//!   (and the latter also through [`OPACITY`]) because both change how
//!   descendants accumulate.
//!
//! - **Local-only**: [`CLIP`] and [`CONTENT`] are marked with the default
//!   policy. Clip rectangles, visible regions, colours, mask references and
//!   the opaque-content flag are per-layer properties.
//!
//! - **Structural**: [`TOPOLOGY`] is marked on tree mutations and triggers
//!   a traversal-order rebuild during evaluation.

use understory_dirty::Channel;

/// Transform, hidden flag, or surface boundary changed.
pub const TRANSFORM: Channel = Channel::new(0);

/// Opacity or surface boundary changed.
pub const OPACITY: Channel = Channel::new(1);

/// Clip rectangle changed.
pub const CLIP: Channel = Channel::new(2);

/// Visible region, colour, opaque flag, mask, or kind changed.
pub const CONTENT: Channel = Channel::new(3);

/// Tree topology changed.
pub const TOPOLOGY: Channel = Channel::new(4);
