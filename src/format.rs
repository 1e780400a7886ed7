// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Pixel formats and their GLES equivalents.
//!
//! Variant names give channel order from the most significant bits of a pixel
//! word down, so `Argb8888` is stored in memory as B, G, R, A. The `Le` suffix
//! marks formats named by their memory byte order instead.

use crate::context::Extensions;

use gleam::gl;
use gleam::gl::GLenum;

// EXT_texture_compression_s3tc.
const COMPRESSED_RGBA_S3TC_DXT1_EXT: GLenum = 0x83F1;
const COMPRESSED_RGBA_S3TC_DXT3_EXT: GLenum = 0x83F2;
const COMPRESSED_RGBA_S3TC_DXT5_EXT: GLenum = 0x83F3;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Sentinel accepted by `lock_region`: use the bitmap's own format.
    Any,
    Argb8888,
    Rgba8888,
    /// R, G, B, A in memory. This is the only format a GLES readback from a
    /// framebuffer object is guaranteed to return.
    Abgr8888Le,
    Xbgr8888,
    Rgb888,
    Bgr888,
    Rgb565,
    Rgba4444,
    Rgba5551,
    SingleChannel8,
    /// R, G, B, A as little-endian `f32`s.
    AbgrF32,
    CompressedRgbaDxt1,
    CompressedRgbaDxt3,
    CompressedRgbaDxt5,
}

/// The format substituted for `Any` when the bitmap itself is compressed.
pub const DEFAULT_LOCK_FORMAT: PixelFormat = PixelFormat::Abgr8888Le;

/// The format GLES hands back from `glReadPixels` on a framebuffer object.
pub const READBACK_FORMAT: PixelFormat = PixelFormat::Abgr8888Le;

impl PixelFormat {
    /// Bytes per pixel. Zero for `Any` and for block-compressed formats,
    /// which have no per-pixel size.
    pub fn pixel_size(self) -> usize {
        match self {
            PixelFormat::Argb8888 |
            PixelFormat::Rgba8888 |
            PixelFormat::Abgr8888Le |
            PixelFormat::Xbgr8888 => 4,
            PixelFormat::Rgb888 | PixelFormat::Bgr888 => 3,
            PixelFormat::Rgb565 | PixelFormat::Rgba4444 | PixelFormat::Rgba5551 => 2,
            PixelFormat::SingleChannel8 => 1,
            PixelFormat::AbgrF32 => 16,
            PixelFormat::Any |
            PixelFormat::CompressedRgbaDxt1 |
            PixelFormat::CompressedRgbaDxt3 |
            PixelFormat::CompressedRgbaDxt5 => 0,
        }
    }

    pub fn is_compressed(self) -> bool {
        match self {
            PixelFormat::CompressedRgbaDxt1 |
            PixelFormat::CompressedRgbaDxt3 |
            PixelFormat::CompressedRgbaDxt5 => true,
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Any => "ANY",
            PixelFormat::Argb8888 => "ARGB_8888",
            PixelFormat::Rgba8888 => "RGBA_8888",
            PixelFormat::Abgr8888Le => "ABGR_8888_LE",
            PixelFormat::Xbgr8888 => "XBGR_8888",
            PixelFormat::Rgb888 => "RGB_888",
            PixelFormat::Bgr888 => "BGR_888",
            PixelFormat::Rgb565 => "RGB_565",
            PixelFormat::Rgba4444 => "RGBA_4444",
            PixelFormat::Rgba5551 => "RGBA_5551",
            PixelFormat::SingleChannel8 => "SINGLE_CHANNEL_8",
            PixelFormat::AbgrF32 => "ABGR_F32",
            PixelFormat::CompressedRgbaDxt1 => "COMPRESSED_RGBA_DXT1",
            PixelFormat::CompressedRgbaDxt3 => "COMPRESSED_RGBA_DXT3",
            PixelFormat::CompressedRgbaDxt5 => "COMPRESSED_RGBA_DXT5",
        }
    }
}

/// Which half of a format's GL description to look up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GlFormatPart {
    /// The pixel type, e.g. `UNSIGNED_BYTE`.
    DataType,
    /// The component layout, e.g. `RGBA`.
    Layout,
}

/// A `format`/`type` pair as passed to `glReadPixels` and `glTexSubImage2D`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlFormat {
    pub layout: GLenum,
    pub data_type: GLenum,
}

impl GlFormat {
    pub fn new(layout: GLenum, data_type: GLenum) -> GlFormat {
        GlFormat {
            layout: layout,
            data_type: data_type,
        }
    }
}

/// Returns the GLES description of a pixel format, or `None` if GLES cannot
/// transfer it directly.
pub fn gl_format(format: PixelFormat) -> Option<GlFormat> {
    let (layout, data_type) = match format {
        PixelFormat::Argb8888 => (gl::BGRA_EXT, gl::UNSIGNED_BYTE),
        PixelFormat::Abgr8888Le | PixelFormat::Xbgr8888 => (gl::RGBA, gl::UNSIGNED_BYTE),
        PixelFormat::Bgr888 => (gl::RGB, gl::UNSIGNED_BYTE),
        PixelFormat::Rgb565 => (gl::RGB, gl::UNSIGNED_SHORT_5_6_5),
        PixelFormat::Rgba4444 => (gl::RGBA, gl::UNSIGNED_SHORT_4_4_4_4),
        PixelFormat::Rgba5551 => (gl::RGBA, gl::UNSIGNED_SHORT_5_5_5_1),
        PixelFormat::SingleChannel8 => (gl::LUMINANCE, gl::UNSIGNED_BYTE),
        PixelFormat::AbgrF32 => (gl::RGBA, gl::FLOAT),
        PixelFormat::CompressedRgbaDxt1 => (COMPRESSED_RGBA_S3TC_DXT1_EXT, gl::UNSIGNED_BYTE),
        PixelFormat::CompressedRgbaDxt3 => (COMPRESSED_RGBA_S3TC_DXT3_EXT, gl::UNSIGNED_BYTE),
        PixelFormat::CompressedRgbaDxt5 => (COMPRESSED_RGBA_S3TC_DXT5_EXT, gl::UNSIGNED_BYTE),
        PixelFormat::Any | PixelFormat::Rgba8888 | PixelFormat::Rgb888 => return None,
    };
    Some(GlFormat::new(layout, data_type))
}

pub fn native_gl_enum(format: PixelFormat, part: GlFormatPart) -> Option<GLenum> {
    gl_format(format).map(|gl_format| match part {
        GlFormatPart::DataType => gl_format.data_type,
        GlFormatPart::Layout => gl_format.layout,
    })
}

/// The inverse of `gl_format` for uncompressed formats.
pub fn from_gl(gl_format: GlFormat) -> Option<PixelFormat> {
    match (gl_format.layout, gl_format.data_type) {
        (gl::RGBA, gl::UNSIGNED_BYTE) => Some(PixelFormat::Abgr8888Le),
        (gl::BGRA_EXT, gl::UNSIGNED_BYTE) => Some(PixelFormat::Argb8888),
        (gl::RGB, gl::UNSIGNED_BYTE) => Some(PixelFormat::Bgr888),
        (gl::RGB, gl::UNSIGNED_SHORT_5_6_5) => Some(PixelFormat::Rgb565),
        (gl::RGBA, gl::UNSIGNED_SHORT_4_4_4_4) => Some(PixelFormat::Rgba4444),
        (gl::RGBA, gl::UNSIGNED_SHORT_5_5_5_1) => Some(PixelFormat::Rgba5551),
        (gl::LUMINANCE, gl::UNSIGNED_BYTE) => Some(PixelFormat::SingleChannel8),
        (gl::RGBA, gl::FLOAT) => Some(PixelFormat::AbgrF32),
        _ => None,
    }
}

/// Maps a logical format onto the format the GLES backend actually stores.
pub fn real_pixel_format(extensions: &Extensions, format: PixelFormat) -> PixelFormat {
    match format {
        PixelFormat::Any => PixelFormat::Abgr8888Le,
        PixelFormat::Argb8888 if extensions.bgra => PixelFormat::Argb8888,
        PixelFormat::Argb8888 | PixelFormat::Rgba8888 => PixelFormat::Abgr8888Le,
        PixelFormat::Rgb888 => PixelFormat::Bgr888,
        format => format,
    }
}

/// Resolves the format a lock request asked for. `Any` becomes the bitmap's
/// own format, except that a compressed bitmap format is never picked: pixel
/// sizes and pitches downstream only make sense for uncompressed formats, so
/// `DEFAULT_LOCK_FORMAT` is used instead.
pub fn resolve_lock_format(bitmap_format: PixelFormat, requested: PixelFormat) -> PixelFormat {
    if requested != PixelFormat::Any {
        return requested;
    }
    if bitmap_format.is_compressed() {
        DEFAULT_LOCK_FORMAT
    } else {
        bitmap_format
    }
}
