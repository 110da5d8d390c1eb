// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GPU textures for every [`TextureKind`].
//!
//! Direct pixels are written with `Queue::write_texture`, one GPU texture
//! per tile when a side exceeds the size limit. BGRA buffers upload into
//! `Bgra8Unorm` textures, so sampling always yields RGBA. Planar images
//! become three `R8Unorm` textures converted in the fragment shader.

use std::cell::RefCell;
use std::rc::Rc;

use stratum_core::geom::{IntRect, IntSize};
use stratum_core::image::{PixelBuffer, PixelFormat, Plane, SharedImage, YCbCrImage};
use stratum_core::texture::{
    Sizeable, SharedHandleTable, TextureError, TextureKind, TextureSource, TileIterable,
    UploadStatus,
};

use crate::gpu::Gpu;

/// A texture registered under a shared handle.
#[derive(Clone, Debug)]
pub struct SharedTexture {
    /// Sampled view; the texture must carry `TEXTURE_BINDING` usage.
    pub view: wgpu::TextureView,
    /// Dimensions in pixels.
    pub size: IntSize,
}

impl SharedTexture {
    /// Wraps `texture`, taking its size from the texture itself.
    #[must_use]
    pub fn new(texture: &wgpu::Texture) -> Self {
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            size: IntSize::new(texture.width(), texture.height()),
        }
    }
}

pub(crate) type HandleTable = Rc<RefCell<SharedHandleTable<SharedTexture>>>;

#[derive(Debug)]
pub(crate) struct Tile {
    pub(crate) rect: IntRect,
    pub(crate) view: wgpu::TextureView,
}

#[derive(Debug)]
pub(crate) struct Planes {
    pub(crate) y: wgpu::TextureView,
    pub(crate) cb: wgpu::TextureView,
    pub(crate) cr: wgpu::TextureView,
    pub(crate) luma: IntSize,
    pub(crate) picture: IntRect,
}

#[derive(Debug)]
pub(crate) enum Content {
    Empty,
    Direct { size: IntSize, tiles: Vec<Tile> },
    Shared { handle: u64, texture: SharedTexture },
    Planar(Planes),
}

/// A texture living on the GPU.
#[derive(Debug)]
pub struct WgpuTexture {
    id: u64,
    kind: TextureKind,
    max_size: u32,
    gpu: Gpu,
    pub(crate) content: Content,
    handles: HandleTable,
}

impl WgpuTexture {
    pub(crate) fn new(id: u64, kind: TextureKind, max_size: u32, gpu: Gpu, handles: HandleTable) -> Self {
        Self {
            id,
            kind,
            max_size,
            gpu,
            content: Content::Empty,
            handles,
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
                Ok(Content::Direct {
                    size: buffer.size,
                    tiles: self.upload_tiles(buffer),
                })
            }
            SharedImage::Handle(h) => {
                let texture = self.handles.borrow_mut().open(h.handle)?;
                Ok(Content::Shared {
                    handle: h.handle,
                    texture,
                })
            }
            SharedImage::YCbCr(img) => {
                img.validate(self.max_size)?;
                Ok(Content::Planar(self.upload_planes(img)))
            }
        }
    }

    fn upload_tiles(&self, buffer: &PixelBuffer) -> Vec<Tile> {
        let size = buffer.size;
        let max = self.max_size.max(1);
        let format = match buffer.format {
            PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
        };
        let mut tiles = Vec::new();
        for ty in (0..size.height).step_by(max as usize) {
            for tx in (0..size.width).step_by(max as usize) {
                let rect = IntRect::new(
                    tx as i32,
                    ty as i32,
                    max.min(size.width - tx),
                    max.min(size.height - ty),
                );
                let offset = u64::from(ty) * u64::from(buffer.stride) + u64::from(tx) * 4;
                let view = self.write(
                    "stratum direct tile",
                    rect.size(),
                    format,
                    &buffer.data,
                    offset,
                    buffer.stride,
                );
                tiles.push(Tile { rect, view });
            }
        }
        tiles
    }

    fn upload_planes(&self, img: &YCbCrImage) -> Planes {
        let plane = |label, p: &Plane| {
            self.write(label, p.size, wgpu::TextureFormat::R8Unorm, &p.data, 0, p.stride)
        };
        Planes {
            y: plane("stratum luma plane", &img.y),
            cb: plane("stratum cb plane", &img.cb),
            cr: plane("stratum cr plane", &img.cr),
            luma: img.y.size,
            picture: img.picture,
        }
    }

    /// Creates a texture of `size` and fills it from `data`, whose first
    /// texel is at `offset` and whose rows are `stride` bytes apart.
    fn write(
        &self,
        label: &str,
        size: IntSize,
        format: wgpu::TextureFormat,
        data: &[u8],
        offset: u64,
        stride: u32,
    ) -> wgpu::TextureView {
        let extent = wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        };
        let texture = self.gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset,
                bytes_per_row: Some(stride),
                rows_per_image: None,
            },
            extent,
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }
}

impl Sizeable for WgpuTexture {
    fn size(&self) -> IntSize {
        match &self.content {
            Content::Empty => IntSize::default(),
            Content::Direct { size, .. } => *size,
            Content::Shared { texture, .. } => texture.size,
            Content::Planar(planes) => planes.picture.size(),
        }
    }
}

impl TileIterable for WgpuTexture {
    fn tile_count(&self) -> usize {
        match &self.content {
            Content::Direct { tiles, .. } => tiles.len(),
            _ => 1,
        }
    }

    fn tile_rect(&self, index: usize) -> IntRect {
        match &self.content {
            Content::Direct { tiles, .. } => tiles[index].rect,
            _ => IntRect::from_size(self.size()),
        }
    }
}

impl TextureSource for WgpuTexture {
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
        let content = self.upload(image)?;
        self.release_handle();
        self.content = content;
        let reset = self.size() != before;
        tracing::trace!(texture = self.id, kind = ?self.kind, size = ?self.size(), reset, "texture updated");
        Ok(UploadStatus { reset })
    }

    fn is_initialized(&self) -> bool {
        !matches!(self.content, Content::Empty) && !self.size().is_empty()
    }

    fn as_tiled(&self) -> Option<&dyn TileIterable> {
        match &self.content {
            Content::Direct { tiles, .. } if tiles.len() > 1 => Some(self),
            _ => None,
        }
    }
}

impl Drop for WgpuTexture {
    fn drop(&mut self) {
        self.release_handle();
    }
}
