// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The GL operations the lock and unlock paths are written against.
//!
//! Every call that can leave a GL error behind returns it as a `GlError`
//! instead of leaving it for a later `glGetError`.

use crate::context::DisplayId;
use crate::error::GlError;
use crate::format::{GlFormat, PixelFormat};
use crate::geometry::GlRect;

use euclid::default::{Size2D, Transform3D};
use gleam::gl;
use gleam::gl::{GLenum, GLint, GLuint};

pub type TextureId = GLuint;
pub type FramebufferId = GLuint;

/// The window-system provided framebuffer of the current context.
pub const DEFAULT_FRAMEBUFFER: FramebufferId = 0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelStore {
    PackAlignment,
    UnpackAlignment,
}

impl PixelStore {
    pub fn as_gl(self) -> GLenum {
        match self {
            PixelStore::PackAlignment => gl::PACK_ALIGNMENT,
            PixelStore::UnpackAlignment => gl::UNPACK_ALIGNMENT,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

impl BlendFactor {
    pub fn as_gl(self) -> GLenum {
        match self {
            BlendFactor::Zero => gl::ZERO,
            BlendFactor::One => gl::ONE,
            BlendFactor::SrcAlpha => gl::SRC_ALPHA,
            BlendFactor::OneMinusSrcAlpha => gl::ONE_MINUS_SRC_ALPHA,
        }
    }

    /// The factor's value for one channel, given the source alpha in 0..=1.
    pub fn weight(self, src_alpha: f32) -> f32 {
        match self {
            BlendFactor::Zero => 0.0,
            BlendFactor::One => 1.0,
            BlendFactor::SrcAlpha => src_alpha,
            BlendFactor::OneMinusSrcAlpha => 1.0 - src_alpha,
        }
    }
}

/// An additive blend equation: `src * src_factor + dst * dst_factor`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Blender {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl Blender {
    /// Replaces the destination outright.
    pub const COPY: Blender = Blender { src: BlendFactor::One, dst: BlendFactor::Zero };

    pub const ALPHA: Blender = Blender {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };

    pub const PREMULTIPLIED_ALPHA: Blender = Blender {
        src: BlendFactor::One,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
}

impl Default for Blender {
    fn default() -> Blender {
        Blender::PREMULTIPLIED_ALPHA
    }
}

/// A GLES 2 context, or a group of contexts the backend switches between.
///
/// Binding state (framebuffer, texture, pixel store) belongs to whichever
/// context is current. Object names are shared between all of them.
pub trait GpuDevice {
    /// Tells the device about a display's default framebuffer.
    fn register_display(&self, _display: DisplayId, _size: Size2D<i32>, _format: PixelFormat) {}

    /// Makes the display's context current on this thread, or releases the
    /// current context when `display` is `None`.
    fn make_current(&self, display: Option<DisplayId>) -> Result<(), GlError>;

    fn bound_framebuffer(&self) -> FramebufferId;

    fn bind_framebuffer(&self, framebuffer: FramebufferId) -> Result<(), GlError>;

    /// The texture bound to `TEXTURE_2D`.
    fn bound_texture(&self) -> TextureId;

    fn bind_texture(&self, texture: TextureId) -> Result<(), GlError>;

    fn pixel_store(&self, param: PixelStore) -> GLint;

    fn set_pixel_store(&self, param: PixelStore, value: GLint) -> Result<(), GlError>;

    /// Reads `rect` of the bound framebuffer into `dst`, honouring the pack
    /// alignment.
    fn read_pixels(&self, rect: GlRect, format: GlFormat, dst: &mut [u8]) -> Result<(), GlError>;

    /// Replaces `rect` of the bound texture with `data`, honouring the unpack
    /// alignment.
    fn tex_sub_image_2d(&self, rect: GlRect, format: GlFormat, data: &[u8]) -> Result<(), GlError>;

    fn generate_mipmap(&self) -> Result<(), GlError>;

    fn flush(&self);

    fn create_texture(&self, size: Size2D<i32>, format: GlFormat) -> Result<TextureId, GlError>;

    fn delete_texture(&self, texture: TextureId);

    /// Creates a framebuffer object with `texture` as its color attachment.
    fn create_framebuffer(&self, texture: TextureId) -> Result<FramebufferId, GlError>;

    fn delete_framebuffer(&self, framebuffer: FramebufferId);

    /// Draws `texture` into the bound framebuffer. `transform` maps texture
    /// pixels (top row first) to target pixels and `projection` maps target
    /// pixels to clip space.
    fn draw_texture(&self,
                    texture: TextureId,
                    texture_size: Size2D<i32>,
                    transform: &Transform3D<f32>,
                    projection: &Transform3D<f32>,
                    blender: Blender)
                    -> Result<(), GlError>;
}
