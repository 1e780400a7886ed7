// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types for locking and unlocking.

use crate::format::PixelFormat;

use gleam::gl;
use gleam::gl::GLenum;
use std::fmt;

/// A GL call that left an error code behind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlError {
    pub call: &'static str,
    pub code: GLenum,
}

impl GlError {
    pub fn new(call: &'static str, code: GLenum) -> GlError {
        GlError {
            call: call,
            code: code,
        }
    }
}

impl fmt::Display for GlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} failed ({})", self.call, gl_error_string(self.code))
    }
}

impl std::error::Error for GlError {}

pub fn gl_error_string(code: GLenum) -> &'static str {
    match code {
        gl::NO_ERROR => "GL_NO_ERROR",
        gl::INVALID_ENUM => "GL_INVALID_ENUM",
        gl::INVALID_VALUE => "GL_INVALID_VALUE",
        gl::INVALID_OPERATION => "GL_INVALID_OPERATION",
        gl::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        gl::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        _ => "unknown GL error",
    }
}

/// Errors from the pixel conversion routines.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// The format has no per-pixel layout to convert through.
    #[error("cannot convert pixels of format {}", .0.name())]
    Unsupported(PixelFormat),

    /// A buffer does not cover the region being converted.
    #[error("buffer too small: {needed} bytes needed, {len} available")]
    BufferTooSmall { needed: usize, len: usize },

    /// An in-place conversion would overwrite pixels it has not read yet.
    #[error("in-place conversion would grow the pixel data")]
    Overlap,
}

/// Reasons a lock request fails. A failed lock leaves the bitmap unlocked
/// and without a staging buffer.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum LockError {
    /// The staging buffer could not be allocated.
    #[error("out of memory allocating a {bytes} byte staging buffer")]
    OutOfMemory { bytes: usize },

    /// A GL call reported an error.
    #[error(transparent)]
    Gl(#[from] GlError),

    /// The bitmap has no framebuffer object to read back from.
    #[error("no framebuffer object available for readback")]
    NoFramebuffer,

    /// The bitmap already has an active locked region.
    #[error("bitmap is already locked")]
    AlreadyLocked,

    /// The format has no GLES transfer layout; compressed formats never do.
    #[error("cannot lock bitmap in format {}", .0.name())]
    UnsupportedFormat(PixelFormat),

    /// The backbuffer proxy bitmap could not be created.
    #[error("failed to create proxy bitmap: {0}")]
    BitmapCreation(GlError),

    /// Converting the read back pixels into the requested format failed.
    #[error(transparent)]
    Convert(#[from] ConvertError),
}
