// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Copying render targets back to memory.

use std::sync::mpsc;

use stratum_core::backend::SurfaceSnapshot;
use stratum_core::geom::IntSize;

use crate::gpu::{Gpu, WgpuError};

/// Bytes per row of a `width`-pixel RGBA8 copy, padded to the alignment
/// `copy_texture_to_buffer` requires.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Reads `texture` into tightly packed premultiplied RGBA8.
pub(crate) fn read_texture(
    gpu: &Gpu,
    texture: &wgpu::Texture,
    format: wgpu::TextureFormat,
) -> Result<SurfaceSnapshot, WgpuError> {
    let size = IntSize::new(texture.width(), texture.height());
    let padded = padded_bytes_per_row(size.width);
    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("stratum readback"),
        size: u64::from(padded) * u64::from(size.height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("stratum readback encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(size.height),
            },
        },
        wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        _ = tx.send(result);
    });
    gpu.device.poll(wgpu::PollType::wait_indefinitely())?;
    rx.recv().map_err(|_| WgpuError::ReadbackLost)??;

    let mapped = slice.get_mapped_range();
    let pixels = unpad(&mapped, size, padded, format == wgpu::TextureFormat::Bgra8Unorm);
    drop(mapped);
    buffer.unmap();
    Ok(SurfaceSnapshot { size, pixels })
}

/// Drops row padding, swapping red and blue when `bgra` is set.
pub(crate) fn unpad(data: &[u8], size: IntSize, padded: u32, bgra: bool) -> Vec<u8> {
    let row = size.width as usize * 4;
    let mut pixels = Vec::with_capacity(row * size.height as usize);
    for chunk in data.chunks(padded as usize).take(size.height as usize) {
        pixels.extend_from_slice(&chunk[..row]);
    }
    if bgra {
        for px in pixels.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }

    #[test]
    fn unpad_strips_padding_and_swizzles() {
        let mut data = vec![0_u8; 512];
        data[..4].copy_from_slice(&[1, 2, 3, 4]);
        data[256..260].copy_from_slice(&[5, 6, 7, 8]);
        let size = IntSize::new(1, 2);
        assert_eq!(unpad(&data, size, 256, false), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(unpad(&data, size, 256, true), vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }
}
