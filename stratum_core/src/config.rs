// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-pass configuration.

use core::fmt;

use crate::effect::{Color, Filter};
use crate::producer::AsyncImageRegistry;
use crate::trace::{DumpHook, Tracer};

/// Options for one composition pass.
///
/// There is no global state: every pass receives its configuration through
/// a [`FrameContext`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CompositorConfig {
    /// Compute ordering, offsets and scissors, but allocate no surfaces and
    /// issue no draws.
    pub compositing_disabled: bool,
    /// Hand every intermediate surface to the frame's [`DumpHook`].
    pub dump_surfaces: bool,
    /// Filter for image layers that do not set one.
    pub default_filter: Filter,
    /// Colour the frame buffer is cleared to.
    pub clear_color: Color,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            compositing_disabled: false,
            dump_surfaces: false,
            default_filter: Filter::Linear,
            clear_color: Color::TRANSPARENT,
        }
    }
}

/// Everything a pass needs besides the tree and the backend.
#[derive(Default)]
pub struct FrameContext<'a> {
    /// Pass options.
    pub config: CompositorConfig,
    /// Structured event sink.
    pub tracer: Tracer<'a>,
    /// Receives surface snapshots when [`CompositorConfig::dump_surfaces`]
    /// is set.
    pub dump: Option<&'a mut dyn DumpHook>,
    /// Source for async image layers. Without one, async layers keep their
    /// last image.
    pub registry: Option<&'a dyn AsyncImageRegistry>,
}

impl<'a> FrameContext<'a> {
    /// Creates a context with `config` and nothing else attached.
    #[must_use]
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Attaches a tracer.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Tracer<'a>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Attaches a dump hook.
    #[must_use]
    pub fn with_dump(mut self, dump: &'a mut dyn DumpHook) -> Self {
        self.dump = Some(dump);
        self
    }

    /// Attaches an async image registry.
    #[must_use]
    pub fn with_registry(mut self, registry: &'a dyn AsyncImageRegistry) -> Self {
        self.registry = Some(registry);
        self
    }
}

impl fmt::Debug for FrameContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameContext")
            .field("config", &self.config)
            .field("tracer", &self.tracer)
            .field("dump", &self.dump.is_some())
            .field("registry", &self.registry.is_some())
            .finish()
    }
}
