// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Direct textures: CPU pixels copied in on every update.

use stratum_core::geom::{IntPoint, IntRect, IntSize};
use stratum_core::image::{PixelBuffer, PixelFormat};
use stratum_core::region::Region;

use crate::pixmap::Pixmap;

/// Uploaded pixels, split into tiles no larger than the texture limit.
#[derive(Debug)]
pub(crate) struct TiledPixels {
    pub(crate) size: IntSize,
    pub(crate) tiles: Vec<(IntRect, Pixmap)>,
}

impl TiledPixels {
    pub(crate) fn tile(&self, index: usize) -> Option<&(IntRect, Pixmap)> {
        self.tiles.get(index)
    }
}

/// Copies `buffer` into tiles of at most `max` pixels per side, converting
/// to RGBA byte order.
pub(crate) fn upload(buffer: &PixelBuffer, max: u32) -> TiledPixels {
    let size = buffer.size;
    let max = max.max(1);
    let mut tiles = Vec::new();
    for ty in (0..size.height).step_by(max as usize) {
        for tx in (0..size.width).step_by(max as usize) {
            let rect = IntRect::new(
                tx as i32,
                ty as i32,
                max.min(size.width - tx),
                max.min(size.height - ty),
            );
            tiles.push((rect, copy_tile(buffer, rect)));
        }
    }
    TiledPixels { size, tiles }
}

/// Copies only the parts of `buffer` inside `region` over existing tiles.
///
/// `pixels` must have been uploaded from a buffer of the same size.
pub(crate) fn upload_region(pixels: &mut TiledPixels, buffer: &PixelBuffer, region: &Region) {
    for (tile_rect, tile) in &mut pixels.tiles {
        for rect in region.rects() {
            let piece = rect.intersect(*tile_rect);
            if piece.is_empty() {
                continue;
            }
            let src = copy_tile(buffer, piece);
            tile.copy_from(
                &src,
                IntRect::from_size(piece.size()),
                IntPoint::new(piece.x - tile_rect.x, piece.y - tile_rect.y),
            );
        }
    }
}

fn copy_tile(buffer: &PixelBuffer, rect: IntRect) -> Pixmap {
    let mut data = Vec::with_capacity(rect.area() as usize * 4);
    for y in rect.y..rect.y1() {
        let start = y as usize * buffer.stride as usize + rect.x as usize * 4;
        let row = &buffer.data[start..start + rect.width as usize * 4];
        match buffer.format {
            PixelFormat::Rgba8 => data.extend_from_slice(row),
            PixelFormat::Bgra8 => {
                for px in row.chunks_exact(4) {
                    data.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                }
            }
        }
    }
    match Pixmap::from_rgba8(rect.size(), data) {
        Some(p) => p,
        // Lengths always agree with a validated buffer.
        None => Pixmap::new(rect.size()),
    }
}
