// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! wgpu backend for stratum.
//!
//! [`WgpuCompositor`] implements [`Compositor`] with a single quad
//! pipeline. Intermediate surfaces are render-attachment textures in the
//! frame format; copy-from-previous seeding is a texture-to-texture copy.
//! Planar Y/Cb/Cr images are converted (BT.601, limited range) in the
//! fragment shader, and masks are sampled through the inverse of their
//! placement so perspective masks stay exact.
//!
//! Device acquisition goes through [`Gpu`]. Without a usable adapter,
//! [`WgpuCompositor::new`] returns [`WgpuError::NoAdapter`]:
//!
//! ```rust,ignore
//! let mut compositor = match WgpuCompositor::new(WgpuCompositorConfig::default()) {
//!     Ok(c) => c,
//!     Err(WgpuError::NoAdapter) => return,
//!     Err(e) => panic!("{e}"),
//! };
//! compositor.begin_frame(viewport, Color::WHITE);
//! manager.composite(&mut compositor, &mut FrameContext::default());
//! compositor.end_frame();
//! let pixels = compositor.read_frame()?;
//! ```
//!
//! [`Compositor`]: stratum_core::backend::Compositor

mod compositor;
mod gpu;
mod pipeline;
mod readback;
mod texture;

pub use compositor::{WgpuCompositor, WgpuCompositorConfig};
pub use gpu::{Gpu, WgpuError};
pub use texture::{SharedTexture, WgpuTexture};
