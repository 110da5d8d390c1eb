// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Writing intermediate surfaces to PNG files.
//!
//! [`PngDumpHook`] implements [`DumpHook`]. Each snapshot lands in the
//! hook's directory as `<prefix>-<seq>-layer<index>v<generation>.png`,
//! converted from premultiplied to straight alpha so the files look right
//! in ordinary image viewers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use stratum_core::backend::SurfaceSnapshot;
use stratum_core::geom::IntSize;
use stratum_core::layer::LayerId;
use stratum_core::trace::{DumpHook, DumpResult};

/// Why a surface could not be written.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    /// Creating the directory failed.
    #[error("cannot create dump directory: {0}")]
    Io(#[from] io::Error),
    /// Encoding or writing the PNG failed.
    #[error("cannot write PNG: {0}")]
    Encode(#[from] image::ImageError),
    /// The snapshot's pixel count does not match its size.
    #[error("snapshot of {size:?} carries {len} bytes")]
    Malformed {
        /// Declared size.
        size: IntSize,
        /// Bytes present.
        len: usize,
    },
}

/// A [`DumpHook`] that writes each snapshot to a PNG file.
#[derive(Debug)]
pub struct PngDumpHook {
    dir: PathBuf,
    prefix: String,
    seq: u64,
    written: Vec<PathBuf>,
}

impl PngDumpHook {
    /// Writes into `dir`, creating it on the first dump.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "surface".to_owned(),
            seq: 0,
            written: Vec::new(),
        }
    }

    /// Sets the file-name prefix (default `surface`).
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// The directory files are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far, oldest first.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Writes one snapshot and returns its path.
    ///
    /// # Errors
    ///
    /// [`DumpError`] if the directory cannot be created, the snapshot is
    /// malformed, or the PNG cannot be written.
    pub fn write(&mut self, layer: LayerId, snapshot: &SurfaceSnapshot) -> Result<PathBuf, DumpError> {
        let size = snapshot.size;
        let expected = size.width as usize * size.height as usize * 4;
        if snapshot.pixels.len() != expected {
            return Err(DumpError::Malformed {
                size,
                len: snapshot.pixels.len(),
            });
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!(
            "{}-{:04}-layer{}v{}.png",
            self.prefix,
            self.seq,
            layer.index(),
            layer.generation()
        ));
        image::save_buffer_with_format(
            &path,
            &unpremultiply(&snapshot.pixels),
            size.width,
            size.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )?;
        tracing::debug!(path = %path.display(), ?layer, "surface dumped");
        self.seq += 1;
        self.written.push(path.clone());
        Ok(path)
    }
}

impl DumpHook for PngDumpHook {
    fn dump_surface(&mut self, layer: LayerId, snapshot: &SurfaceSnapshot) -> DumpResult {
        self.write(layer, snapshot)?;
        Ok(())
    }
}

/// Converts premultiplied RGBA8 to straight alpha.
pub(crate) fn unpremultiply(pixels: &[u8]) -> Vec<u8> {
    let mut out = pixels.to_vec();
    for px in out.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
        } else if a < 255 {
            for c in &mut px[..3] {
                let v = (u32::from(*c) * 255 + a / 2) / a;
                *c = u8::try_from(v).unwrap_or(u8::MAX);
            }
        }
    }
    out
}
