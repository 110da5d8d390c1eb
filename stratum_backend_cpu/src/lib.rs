// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference software backend for stratum.
//!
//! [`CpuCompositor`] implements [`Compositor`] by rasterising quads into
//! premultiplied RGBA8 [`Pixmap`]s. It is exact enough for pixel-level
//! tests of the composition pass and small enough to read as a
//! specification of what a GPU backend has to do:
//!
//! - [`CpuTexture`]: direct (tiled above the size limit), shared-handle,
//!   and planar Y/Cb/Cr textures.
//! - Intermediate surfaces with clear and copy-from-previous seeding.
//! - Quads under any 2D or perspective transform, with opacity, clip, and
//!   mask.
//!
//! [`ImageBridge`] and [`return_channel`] stand in for a producer process:
//! the first is a thread-safe [`AsyncImageRegistry`], the second a
//! [`SurfaceDeallocator`] that hands released descriptors back over a
//! channel.
//!
//! ```rust,ignore
//! let mut compositor = CpuCompositor::new(CpuCompositorConfig::default());
//! compositor.begin_frame(viewport, Color::WHITE);
//! let report = manager.composite(&mut compositor, &mut FrameContext::default());
//! compositor.end_frame();
//! let pixels = compositor.frame();
//! ```
//!
//! [`Compositor`]: stratum_core::backend::Compositor
//! [`AsyncImageRegistry`]: stratum_core::producer::AsyncImageRegistry
//! [`SurfaceDeallocator`]: stratum_core::producer::SurfaceDeallocator

mod bridge;
mod compositor;
mod pixmap;
mod raster;
mod texture;

pub use bridge::{ImageBridge, ReturnChannel, return_channel};
pub use compositor::{CpuCompositor, CpuCompositorConfig, FrameStats};
pub use pixmap::Pixmap;
pub use texture::CpuTexture;
