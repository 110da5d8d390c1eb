// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Software textures.
//!
//! One [`CpuTexture`] type covers every [`TextureKind`]:
//!
//! - **Direct**: pixels are copied out of the producer's buffer on each
//!   update and split into tiles when a side exceeds the texture limit.
//! - **Shared handle**: the handle is resolved through the compositor's
//!   [`SharedHandleTable`]; the texture holds the open until it switches
//!   handles or is dropped.
//! - **Planar**: the three planes are validated together and converted
//!   (BT.601, limited range) when sampled.

mod direct;
mod planar;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use stratum_core::effect::Filter;
use stratum_core::geom::{IntRect, IntSize};
use stratum_core::image::SharedImage;
use stratum_core::region::Region;
use stratum_core::texture::{
    Sizeable, SharedHandleTable, TextureError, TextureKind, TextureSource, TileIterable,
    UploadStatus,
};

use crate::pixmap::Pixmap;

use direct::TiledPixels;
use planar::PlanarFrame;

/// Handle table shared by a compositor and its shared-handle textures.
pub(crate) type HandleTable = Rc<RefCell<SharedHandleTable<Arc<Pixmap>>>>;

#[derive(Debug)]
enum Content {
    Empty,
    Direct(TiledPixels),
    Shared { handle: u64, pixmap: Arc<Pixmap> },
    Planar(PlanarFrame),
}

/// A texture living in CPU memory.
#[derive(Debug)]
pub struct CpuTexture {
    id: u64,
    kind: TextureKind,
    max_size: u32,
    content: Content,
    handles: HandleTable,
}

impl CpuTexture {
    pub(crate) fn new(id: u64, kind: TextureKind, max_size: u32, handles: HandleTable) -> Self {
        Self {
            id,
            kind,
            max_size,
            content: Content::Empty,
            handles,
        }
    }

    /// Samples whole-image pixel coordinates `(u, v)` as premultiplied
    /// RGBA in `[0, 1]`.
    ///
    /// With `tile` set, only that tile's storage is read. Uninitialised
    /// textures sample transparent.
    #[must_use]
    pub fn sample(&self, tile: Option<usize>, u: f64, v: f64, filter: Filter) -> [f32; 4] {
        match &self.content {
            Content::Empty => [0.0; 4],
            Content::Direct(pixels) => match tile {
                None if pixels.tiles.len() > 1 => sample_any_tile(pixels, u, v, filter),
                _ => match pixels.tile(tile.unwrap_or(0)) {
                    Some((rect, pixmap)) => {
                        pixmap.sample(u - f64::from(rect.x), v - f64::from(rect.y), filter)
                    }
                    None => [0.0; 4],
                },
            },
            Content::Shared { pixmap, .. } => pixmap.sample(u, v, filter),
            Content::Planar(frame) => frame.sample(u, v, filter),
        }
    }

    /// The shared handle currently held open, if any.
    #[must_use]
    pub fn open_handle(&self) -> Option<u64> {
        match self.content {
            Content::Shared { handle, .. } => Some(handle),
            _ => None,
        }
    }

    fn release_handle(&self) {
        if let Some(handle) = self.open_handle() {
            self.handles.borrow_mut().release(handle);
        }
    }

    fn upload(&self, image: &SharedImage) -> Result<Content, TextureError> {
        match image {
            SharedImage::Null => Ok(Content::Empty),
            SharedImage::Pixels(buffer) => {
                buffer.validate()?;
                Ok(Content::Direct(direct::upload(buffer, self.max_size)))
            }
            SharedImage::Handle(h) => {
                let pixmap = self.handles.borrow_mut().open(h.handle)?;
                Ok(Content::Shared {
                    handle: h.handle,
                    pixmap,
                })
            }
            SharedImage::YCbCr(img) => PlanarFrame::upload(img, self.max_size).map(Content::Planar),
        }
    }
}

/// Samples an untiled coordinate out of whichever tile covers it.
fn sample_any_tile(pixels: &TiledPixels, u: f64, v: f64, filter: Filter) -> [f32; 4] {
    let covering = pixels.tiles.iter().find(|(r, _)| {
        u >= f64::from(r.x) && u < f64::from(r.x1()) && v >= f64::from(r.y) && v < f64::from(r.y1())
    });
    match covering {
        Some((r, p)) => p.sample(u - f64::from(r.x), v - f64::from(r.y), filter),
        None => [0.0; 4],
    }
}

impl Sizeable for CpuTexture {
    fn size(&self) -> IntSize {
        match &self.content {
            Content::Empty => IntSize::default(),
            Content::Direct(pixels) => pixels.size,
            Content::Shared { pixmap, .. } => pixmap.size(),
            Content::Planar(frame) => frame.size(),
        }
    }
}

impl TileIterable for CpuTexture {
    fn tile_count(&self) -> usize {
        match &self.content {
            Content::Direct(pixels) => pixels.tiles.len(),
            _ => 1,
        }
    }

    fn tile_rect(&self, index: usize) -> IntRect {
        match &self.content {
            Content::Direct(pixels) => pixels.tiles[index].0,
            _ => IntRect::from_size(self.size()),
        }
    }
}

impl TextureSource for CpuTexture {
    fn kind(&self) -> TextureKind {
        self.kind
    }

    fn handle(&self) -> u64 {
        self.id
    }

    fn update(&mut self, image: &SharedImage) -> Result<UploadStatus, TextureError> {
        if let Some(found) = image.kind() {
            if found != self.kind {
                return Err(TextureError::KindMismatch {
                    expected: self.kind,
                    found,
                });
            }
        }
        let before = self.size();
        // Validate and open the new content before releasing the old.
        let content = self.upload(image)?;
        self.release_handle();
        self.content = content;
        let reset = self.size() != before;
        tracing::trace!(texture = self.id, kind = ?self.kind, size = ?self.size(), reset, "texture updated");
        Ok(UploadStatus { reset })
    }

    fn update_region(
        &mut self,
        image: &SharedImage,
        region: &Region,
    ) -> Result<UploadStatus, TextureError> {
        let (SharedImage::Pixels(buffer), Content::Direct(pixels)) = (image, &mut self.content)
        else {
            return self.update(image);
        };
        if buffer.size != pixels.size {
            return self.update(image);
        }
        buffer.validate()?;
        direct::upload_region(pixels, buffer, region);
        tracing::trace!(texture = self.id, rects = region.rect_count(), "texture region updated");
        Ok(UploadStatus { reset: false })
    }

    fn is_initialized(&self) -> bool {
        !matches!(self.content, Content::Empty) && !self.size().is_empty()
    }

    fn as_tiled(&self) -> Option<&dyn TileIterable> {
        match &self.content {
            Content::Direct(pixels) if pixels.tiles.len() > 1 => Some(self),
            _ => None,
        }
    }
}

impl Drop for CpuTexture {
    fn drop(&mut self) {
        self.release_handle();
    }
}
