// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared image descriptors delivered by a producer.
//!
//! A [`SharedImage`] is a value-typed reference to pixels or a GPU handle
//! that lives on the producer side of the process boundary. Ownership moves
//! by value: a texture host takes one in, and hands the previous one back so
//! the producer's resources can be released.

use alloc::sync::Arc;

use crate::geom::{IntRect, IntSize};
use crate::texture::{TextureError, TextureKind};

/// Byte layout of a CPU pixel buffer. Both layouts carry premultiplied
/// alpha.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    /// Red, green, blue, alpha; 8 bits each.
    #[default]
    Rgba8,
    /// Blue, green, red, alpha; 8 bits each.
    Bgra8,
}

impl PixelFormat {
    /// Bytes per pixel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        4
    }
}

/// Pixels in shared CPU memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Dimensions in pixels.
    pub size: IntSize,
    /// Bytes between the starts of consecutive rows.
    pub stride: u32,
    /// Byte layout.
    pub format: PixelFormat,
    /// Row-major pixel bytes.
    pub data: Arc<[u8]>,
}

impl PixelBuffer {
    /// Creates a tightly packed buffer.
    #[must_use]
    pub fn new(size: IntSize, format: PixelFormat, data: Arc<[u8]>) -> Self {
        Self {
            size,
            stride: size.width * format.bytes_per_pixel(),
            format,
            data,
        }
    }
}

impl PixelBuffer {
    /// Checks that the buffer holds every row its size and stride describe.
    ///
    /// The last row needs no stride padding.
    ///
    /// # Errors
    ///
    /// [`TextureError::InvalidStride`] if a row does not fit in the stride,
    /// [`TextureError::BufferTooSmall`] if rows are missing.
    pub fn validate(&self) -> Result<(), TextureError> {
        let row = u64::from(self.size.width) * u64::from(self.format.bytes_per_pixel());
        if u64::from(self.stride) < row {
            return Err(TextureError::InvalidStride {
                stride: self.stride,
                width: self.size.width,
            });
        }
        check_len(self.data.len(), self.size.height, self.stride, row)
    }
}

fn check_len(len: usize, rows: u32, stride: u32, row: u64) -> Result<(), TextureError> {
    let needed = match rows {
        0 => 0,
        n => u64::from(n - 1) * u64::from(stride) + row,
    };
    let len = len as u64;
    if len < needed {
        return Err(TextureError::BufferTooSmall { needed, len });
    }
    Ok(())
}

/// How a cross-process GPU handle was shared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShareType {
    /// Shared with another context in the same process.
    #[default]
    SameProcess,
    /// Shared across a process boundary.
    CrossProcess,
}

/// A GPU resource owned by the producer, referenced by handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SharedHandle {
    /// Producer-assigned handle value.
    pub handle: u64,
    /// How the handle was shared.
    pub share_type: ShareType,
    /// Dimensions in pixels.
    pub size: IntSize,
}

/// One 8-bit plane of a planar image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plane {
    /// Dimensions in samples.
    pub size: IntSize,
    /// Bytes between the starts of consecutive rows.
    pub stride: u32,
    /// Row-major samples.
    pub data: Arc<[u8]>,
}

/// A planar Y/Cb/Cr image. Chroma planes may be subsampled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YCbCrImage {
    /// Luma plane.
    pub y: Plane,
    /// Blue-difference chroma plane.
    pub cb: Plane,
    /// Red-difference chroma plane.
    pub cr: Plane,
    /// Rectangle of the luma plane that holds the picture.
    pub picture: IntRect,
}

impl Plane {
    fn validate(&self, missing: &'static str) -> Result<(), TextureError> {
        if self.size.is_empty() {
            return Err(TextureError::PlaneMismatch(missing));
        }
        if self.stride < self.size.width {
            return Err(TextureError::InvalidStride {
                stride: self.stride,
                width: self.size.width,
            });
        }
        check_len(
            self.data.len(),
            self.size.height,
            self.stride,
            u64::from(self.size.width),
        )
    }
}

impl YCbCrImage {
    /// Checks the three planes as one unit before any of them is uploaded.
    ///
    /// # Errors
    ///
    /// [`TextureError::PlaneMismatch`] if a plane is missing, the chroma
    /// planes disagree or outgrow the luma plane, or the picture does not
    /// fit in the luma plane. Stride and length errors as for
    /// [`PixelBuffer::validate`]. [`TextureError::TooLarge`] if the luma
    /// plane exceeds `max_size` on either side.
    pub fn validate(&self, max_size: u32) -> Result<(), TextureError> {
        self.y.validate("luma plane is empty")?;
        self.cb.validate("blue chroma plane is empty")?;
        self.cr.validate("red chroma plane is empty")?;
        if self.cb.size != self.cr.size {
            return Err(TextureError::PlaneMismatch("chroma planes differ in size"));
        }
        let (y, c) = (self.y.size, self.cb.size);
        if c.width > y.width || c.height > y.height {
            return Err(TextureError::PlaneMismatch("chroma is larger than luma"));
        }
        if self.picture.is_empty() || !IntRect::from_size(y).contains_rect(self.picture) {
            return Err(TextureError::PlaneMismatch("picture is outside the luma plane"));
        }
        if y.width > max_size || y.height > max_size {
            return Err(TextureError::TooLarge {
                width: y.width,
                height: y.height,
            });
        }
        Ok(())
    }
}

/// A producer-side image reference.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SharedImage {
    /// No image.
    #[default]
    Null,
    /// Pixels in shared memory.
    Pixels(PixelBuffer),
    /// A cross-process GPU handle.
    Handle(SharedHandle),
    /// Three independently sized planes.
    YCbCr(YCbCrImage),
}

impl SharedImage {
    /// Returns the texture representation needed to present this image, or
    /// `None` for [`SharedImage::Null`].
    #[must_use]
    pub const fn kind(&self) -> Option<TextureKind> {
        match self {
            Self::Null => None,
            Self::Pixels(_) => Some(TextureKind::Direct),
            Self::Handle(_) => Some(TextureKind::SharedHandle),
            Self::YCbCr(_) => Some(TextureKind::Planar),
        }
    }

    /// Returns `true` for [`SharedImage::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the displayed size of the image.
    #[must_use]
    pub fn size(&self) -> IntSize {
        match self {
            Self::Null => IntSize::default(),
            Self::Pixels(p) => p.size,
            Self::Handle(h) => h.size,
            Self::YCbCr(y) => y.picture.size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn kinds_map_to_texture_kinds() {
        let px = SharedImage::Pixels(PixelBuffer::new(
            IntSize::new(1, 1),
            PixelFormat::Rgba8,
            Arc::from(vec![0_u8; 4]),
        ));
        assert_eq!(px.kind(), Some(TextureKind::Direct));
        assert_eq!(px.size(), IntSize::new(1, 1));
        assert_eq!(SharedImage::Null.kind(), None);
        let h = SharedImage::Handle(SharedHandle {
            handle: 7,
            share_type: ShareType::CrossProcess,
            size: IntSize::new(3, 2),
        });
        assert_eq!(h.kind(), Some(TextureKind::SharedHandle));
    }

    fn buffer(width: u32, height: u32, stride: u32, len: usize) -> PixelBuffer {
        PixelBuffer {
            size: IntSize::new(width, height),
            stride,
            format: PixelFormat::Rgba8,
            data: Arc::from(vec![0_u8; len]),
        }
    }

    #[test]
    fn short_stride_is_rejected() {
        assert_eq!(
            buffer(4, 2, 12, 32).validate(),
            Err(TextureError::InvalidStride {
                stride: 12,
                width: 4
            })
        );
    }

    #[test]
    fn last_row_needs_no_padding() {
        assert_eq!(buffer(2, 2, 16, 16 + 8).validate(), Ok(()));
        assert_eq!(
            buffer(2, 2, 16, 16 + 7).validate(),
            Err(TextureError::BufferTooSmall { needed: 24, len: 23 })
        );
    }

    fn plane(width: u32, height: u32) -> Plane {
        Plane {
            size: IntSize::new(width, height),
            stride: width,
            data: Arc::from(vec![0_u8; (width * height) as usize]),
        }
    }

    fn planar() -> YCbCrImage {
        YCbCrImage {
            y: plane(4, 4),
            cb: plane(2, 2),
            cr: plane(2, 2),
            picture: IntRect::new(0, 0, 4, 4),
        }
    }

    #[test]
    fn planes_are_validated_together() {
        assert_eq!(planar().validate(64), Ok(()));

        let mut img = planar();
        img.cr = plane(1, 2);
        assert_eq!(
            img.validate(64),
            Err(TextureError::PlaneMismatch("chroma planes differ in size"))
        );

        let mut img = planar();
        img.cb = plane(0, 0);
        assert!(
            matches!(img.validate(64), Err(TextureError::PlaneMismatch(_))),
            "an empty plane counts as missing"
        );

        let mut img = planar();
        img.picture = IntRect::new(2, 2, 4, 4);
        assert!(img.validate(64).is_err(), "picture overhangs");

        assert_eq!(
            planar().validate(2),
            Err(TextureError::TooLarge {
                width: 4,
                height: 4
            })
        );
    }

    #[test]
    fn packed_stride() {
        let b = PixelBuffer::new(IntSize::new(5, 2), PixelFormat::Bgra8, Arc::from(vec![0_u8; 40]));
        assert_eq!(b.stride, 20);
    }
}
