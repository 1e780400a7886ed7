// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Pixel format conversion between staging buffers.
//!
//! Every pixel goes through 8-bit RGBA, except that identical formats are
//! copied row by row without decoding.

use crate::error::ConvertError;
use crate::format::PixelFormat;

use euclid::default::{Point2D, Size2D};

type Rgba = [u8; 4];

fn expand(value: u16, bits: u32) -> u8 {
    let max = (1u16 << bits) - 1;
    ((value & max) as u32 * 255 / max as u32) as u8
}

fn narrow(value: u8, bits: u32) -> u16 {
    (value as u16) >> (8 - bits)
}

fn decode(format: PixelFormat, p: &[u8]) -> Rgba {
    match format {
        PixelFormat::Argb8888 => [p[2], p[1], p[0], p[3]],
        PixelFormat::Rgba8888 => [p[3], p[2], p[1], p[0]],
        PixelFormat::Abgr8888Le => [p[0], p[1], p[2], p[3]],
        PixelFormat::Xbgr8888 => [p[0], p[1], p[2], 255],
        PixelFormat::Rgb888 => [p[2], p[1], p[0], 255],
        PixelFormat::Bgr888 => [p[0], p[1], p[2], 255],
        PixelFormat::Rgb565 => {
            let v = u16::from_le_bytes([p[0], p[1]]);
            [expand(v >> 11, 5), expand(v >> 5, 6), expand(v, 5), 255]
        }
        PixelFormat::Rgba4444 => {
            let v = u16::from_le_bytes([p[0], p[1]]);
            [expand(v >> 12, 4), expand(v >> 8, 4), expand(v >> 4, 4), expand(v, 4)]
        }
        PixelFormat::Rgba5551 => {
            let v = u16::from_le_bytes([p[0], p[1]]);
            [expand(v >> 11, 5), expand(v >> 6, 5), expand(v >> 1, 5), expand(v, 1)]
        }
        PixelFormat::SingleChannel8 => [p[0], p[0], p[0], 255],
        PixelFormat::AbgrF32 => {
            let mut rgba = [0; 4];
            for (i, channel) in rgba.iter_mut().enumerate() {
                let bytes = [p[i * 4], p[i * 4 + 1], p[i * 4 + 2], p[i * 4 + 3]];
                let value = f32::from_le_bytes(bytes).max(0.0).min(1.0);
                *channel = (value * 255.0 + 0.5) as u8;
            }
            rgba
        }
        PixelFormat::Any |
        PixelFormat::CompressedRgbaDxt1 |
        PixelFormat::CompressedRgbaDxt3 |
        PixelFormat::CompressedRgbaDxt5 => unreachable!("checked by check_format"),
    }
}

fn encode(format: PixelFormat, rgba: Rgba, p: &mut [u8]) {
    let [r, g, b, a] = rgba;
    match format {
        PixelFormat::Argb8888 => p[..4].copy_from_slice(&[b, g, r, a]),
        PixelFormat::Rgba8888 => p[..4].copy_from_slice(&[a, b, g, r]),
        PixelFormat::Abgr8888Le => p[..4].copy_from_slice(&[r, g, b, a]),
        PixelFormat::Xbgr8888 => p[..4].copy_from_slice(&[r, g, b, 0]),
        PixelFormat::Rgb888 => p[..3].copy_from_slice(&[b, g, r]),
        PixelFormat::Bgr888 => p[..3].copy_from_slice(&[r, g, b]),
        PixelFormat::Rgb565 => {
            let v = narrow(r, 5) << 11 | narrow(g, 6) << 5 | narrow(b, 5);
            p[..2].copy_from_slice(&v.to_le_bytes());
        }
        PixelFormat::Rgba4444 => {
            let v = narrow(r, 4) << 12 | narrow(g, 4) << 8 | narrow(b, 4) << 4 | narrow(a, 4);
            p[..2].copy_from_slice(&v.to_le_bytes());
        }
        PixelFormat::Rgba5551 => {
            let v = narrow(r, 5) << 11 | narrow(g, 5) << 6 | narrow(b, 5) << 1 | narrow(a, 1);
            p[..2].copy_from_slice(&v.to_le_bytes());
        }
        PixelFormat::SingleChannel8 => p[0] = r,
        PixelFormat::AbgrF32 => {
            for (i, &channel) in rgba.iter().enumerate() {
                let value = channel as f32 / 255.0;
                p[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
            }
        }
        PixelFormat::Any |
        PixelFormat::CompressedRgbaDxt1 |
        PixelFormat::CompressedRgbaDxt3 |
        PixelFormat::CompressedRgbaDxt5 => unreachable!("checked by check_format"),
    }
}

fn check_format(format: PixelFormat) -> Result<usize, ConvertError> {
    if format == PixelFormat::Any || format.is_compressed() {
        return Err(ConvertError::Unsupported(format));
    }
    Ok(format.pixel_size())
}

fn check_len(len: usize, pitch: usize, origin: Point2D<usize>, pixel_size: usize,
             size: Size2D<usize>) -> Result<(), ConvertError> {
    if size.is_empty() {
        return Ok(());
    }
    let needed = (origin.y + size.height - 1) * pitch + (origin.x + size.width) * pixel_size;
    if len < needed {
        return Err(ConvertError::BufferTooSmall { needed: needed, len: len });
    }
    Ok(())
}

/// Converts `size` pixels at `src_origin` in `src` into `dst` at `dst_origin`.
/// Both pitches are positive byte strides.
pub fn convert_pixels(src: &[u8],
                      src_format: PixelFormat,
                      src_pitch: usize,
                      dst: &mut [u8],
                      dst_format: PixelFormat,
                      dst_pitch: usize,
                      src_origin: Point2D<usize>,
                      dst_origin: Point2D<usize>,
                      size: Size2D<usize>)
                      -> Result<(), ConvertError> {
    let src_size = check_format(src_format)?;
    let dst_size = check_format(dst_format)?;
    check_len(src.len(), src_pitch, src_origin, src_size, size)?;
    check_len(dst.len(), dst_pitch, dst_origin, dst_size, size)?;

    for row in 0..size.height {
        let src_start = (src_origin.y + row) * src_pitch + src_origin.x * src_size;
        let dst_start = (dst_origin.y + row) * dst_pitch + dst_origin.x * dst_size;
        let src_row = &src[src_start..src_start + size.width * src_size];
        let dst_row = &mut dst[dst_start..dst_start + size.width * dst_size];

        if src_format == dst_format {
            dst_row.copy_from_slice(src_row);
            continue;
        }
        for (s, d) in src_row.chunks_exact(src_size).zip(dst_row.chunks_exact_mut(dst_size)) {
            encode(dst_format, decode(src_format, s), d);
        }
    }
    Ok(())
}

/// Converts a `size` region at the start of `buffer` from `src_format` to
/// `dst_format` within the same allocation.
///
/// Narrowing conversions walk the pixels forwards and widening ones walk them
/// backwards, so no pixel is overwritten before it has been read. A
/// conversion that narrows the pixels while widening the rows, or the other
/// way round, cannot be done in place.
pub fn convert_in_place(buffer: &mut [u8],
                        src_format: PixelFormat,
                        src_pitch: usize,
                        dst_format: PixelFormat,
                        dst_pitch: usize,
                        size: Size2D<usize>)
                        -> Result<(), ConvertError> {
    let src_size = check_format(src_format)?;
    let dst_size = check_format(dst_format)?;
    let narrowing = dst_size <= src_size && dst_pitch <= src_pitch;
    let widening = dst_size >= src_size && dst_pitch >= src_pitch;
    if !(narrowing || widening) || size.width * dst_size > dst_pitch {
        return Err(ConvertError::Overlap);
    }
    check_len(buffer.len(), src_pitch, Point2D::zero(), src_size, size)?;
    check_len(buffer.len(), dst_pitch, Point2D::zero(), dst_size, size)?;

    let mut convert = |row: usize, column: usize| {
        let src_start = row * src_pitch + column * src_size;
        let rgba = decode(src_format, &buffer[src_start..src_start + src_size]);
        let dst_start = row * dst_pitch + column * dst_size;
        encode(dst_format, rgba, &mut buffer[dst_start..dst_start + dst_size]);
    };
    if narrowing {
        for row in 0..size.height {
            for column in 0..size.width {
                convert(row, column);
            }
        }
    } else {
        for row in (0..size.height).rev() {
            for column in (0..size.width).rev() {
                convert(row, column);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_to_bgr_drops_alpha() {
        let src = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut dst = [0; 6];
        convert_pixels(&src, PixelFormat::Abgr8888Le, 8, &mut dst, PixelFormat::Rgb888, 6,
                       Point2D::zero(), Point2D::zero(), Size2D::new(2, 1)).unwrap();
        assert_eq!(dst, [3, 2, 1, 7, 6, 5]);
    }

    #[test]
    fn rgb565_keeps_primary_colors() {
        let red = [255, 0, 0, 255, 0, 0, 255, 255];
        let mut packed = [0; 4];
        convert_pixels(&red, PixelFormat::Abgr8888Le, 8, &mut packed, PixelFormat::Rgb565, 4,
                       Point2D::zero(), Point2D::zero(), Size2D::new(2, 1)).unwrap();
        assert_eq!(u16::from_le_bytes([packed[0], packed[1]]), 0xf800);
        assert_eq!(u16::from_le_bytes([packed[2], packed[3]]), 0x001f);

        let mut back = [0; 8];
        convert_pixels(&packed, PixelFormat::Rgb565, 4, &mut back, PixelFormat::Abgr8888Le, 8,
                       Point2D::zero(), Point2D::zero(), Size2D::new(2, 1)).unwrap();
        assert_eq!(back, red);
    }

    #[test]
    fn origins_offset_both_buffers() {
        let src: Vec<u8> = (0..16).collect();
        let mut dst = [0xff; 8];
        convert_pixels(&src, PixelFormat::SingleChannel8, 4, &mut dst, PixelFormat::SingleChannel8, 4,
                       Point2D::new(1, 2), Point2D::new(2, 0), Size2D::new(2, 2)).unwrap();
        assert_eq!(dst, [0xff, 0xff, 9, 10, 0xff, 0xff, 13, 14]);
    }

    #[test]
    fn in_place_narrows_rows() {
        // Two rows of two RGBA pixels, narrowed to packed BGR rows of 6 bytes.
        let mut buffer = vec![10, 20, 30, 255, 40, 50, 60, 255,
                              70, 80, 90, 255, 100, 110, 120, 255];
        convert_in_place(&mut buffer, PixelFormat::Abgr8888Le, 8, PixelFormat::Bgr888, 6,
                         Size2D::new(2, 2)).unwrap();
        assert_eq!(&buffer[..12], &[10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120]);
    }

    #[test]
    fn in_place_widens_from_the_end() {
        let mut buffer = vec![0; 16];
        buffer[..4].copy_from_slice(&[1, 2, 3, 4]);
        buffer[4..8].copy_from_slice(&[5, 6, 7, 8]);
        convert_in_place(&mut buffer, PixelFormat::Bgr888, 4, PixelFormat::Abgr8888Le, 8,
                         Size2D::new(1, 2)).unwrap();
        assert_eq!(&buffer[..4], &[1, 2, 3, 255]);
        assert_eq!(&buffer[8..12], &[5, 6, 7, 255]);
    }

    #[test]
    fn in_place_refuses_mixed_growth() {
        let mut buffer = vec![0; 16];
        assert_eq!(convert_in_place(&mut buffer, PixelFormat::Rgb565, 8, PixelFormat::Abgr8888Le, 4,
                                    Size2D::new(1, 2)),
                   Err(ConvertError::Overlap));
    }

    #[test]
    fn compressed_formats_are_rejected() {
        let mut dst = [0; 4];
        let result = convert_pixels(&[0; 4], PixelFormat::CompressedRgbaDxt1, 4, &mut dst,
                                    PixelFormat::Abgr8888Le, 4, Point2D::zero(), Point2D::zero(),
                                    Size2D::new(1, 1));
        assert_eq!(result, Err(ConvertError::Unsupported(PixelFormat::CompressedRgbaDxt1)));
    }

    #[test]
    fn short_destination_is_an_error() {
        let mut dst = [0; 3];
        let result = convert_pixels(&[0; 8], PixelFormat::Abgr8888Le, 8, &mut dst,
                                    PixelFormat::Abgr8888Le, 8, Point2D::zero(), Point2D::zero(),
                                    Size2D::new(2, 1));
        assert_eq!(result, Err(ConvertError::BufferTooSmall { needed: 8, len: 3 }));
    }
}
