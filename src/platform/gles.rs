// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A `GpuDevice` backed by a real GLES 2 context through `gleam`.
//!
//! Drawing a bitmap onto another is left to the embedder's compositor, which
//! is handed to the device as a `ProxyDrawer`.

use crate::config::BackendConfig;
use crate::context::DisplayId;
use crate::convert::convert_pixels;
use crate::device::{Blender, FramebufferId, GpuDevice, PixelStore, TextureId, DEFAULT_FRAMEBUFFER};
use crate::error::GlError;
use crate::format::{from_gl, GlFormat, PixelFormat, READBACK_FORMAT};
use crate::geometry::{pitch, GlRect};
use crate::texturegl::bind_texture;

use euclid::default::{Point2D, Size2D, Transform3D};
use gleam::gl;
use gleam::gl::{GLint, GLsizei, Gl};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

const COMPRESSED_RGBA_S3TC_DXT1_EXT: gl::GLenum = 0x83F1;

/// The window-system side of a display's GL context (EGL, GLX, ...).
pub trait NativeContext {
    fn make_current(&self, display: DisplayId) -> Result<(), GlError>;

    /// Leaves no context current on this thread.
    fn release(&self) -> Result<(), GlError>;
}

/// Composites a texture into the bound framebuffer with the texture bound to
/// `TEXTURE_2D`. Any viewport, program or blend state it changes must be put
/// back before it returns.
pub trait ProxyDrawer {
    fn draw_texture(&self,
                    gl: &dyn Gl,
                    texture: TextureId,
                    texture_size: Size2D<i32>,
                    target_size: Size2D<i32>,
                    transform: &Transform3D<f32>,
                    projection: &Transform3D<f32>,
                    blender: Blender)
                    -> Result<(), GlError>;
}

pub struct GlesDevice {
    gl: Rc<dyn Gl>,
    native: Box<dyn NativeContext>,
    drawer: Box<dyn ProxyDrawer>,
    track_framebuffer_binding: bool,
    current: Cell<Option<DisplayId>>,
    displays: RefCell<HashMap<DisplayId, Size2D<i32>>>,
    /// Bound framebuffer per context, when the driver is not asked.
    framebuffers: RefCell<HashMap<DisplayId, FramebufferId>>,
    texture_sizes: RefCell<HashMap<TextureId, Size2D<i32>>>,
    framebuffer_textures: RefCell<HashMap<FramebufferId, TextureId>>,
}

impl GlesDevice {
    pub fn new(gl: Rc<dyn Gl>,
               native: Box<dyn NativeContext>,
               drawer: Box<dyn ProxyDrawer>,
               config: &BackendConfig)
               -> GlesDevice {
        GlesDevice {
            gl: gl,
            native: native,
            drawer: drawer,
            track_framebuffer_binding: config.track_framebuffer_binding,
            current: Cell::new(None),
            displays: RefCell::new(HashMap::new()),
            framebuffers: RefCell::new(HashMap::new()),
            texture_sizes: RefCell::new(HashMap::new()),
            framebuffer_textures: RefCell::new(HashMap::new()),
        }
    }

    fn check_error(&self, call: &'static str) -> Result<(), GlError> {
        match self.gl.get_error() {
            gl::NO_ERROR => Ok(()),
            code => Err(GlError::new(call, code)),
        }
    }

    fn get_integer(&self, name: gl::GLenum) -> GLint {
        let mut result = [0];
        unsafe {
            self.gl.get_integer_v(name, &mut result);
        }
        result[0]
    }

    fn target_size(&self) -> Size2D<i32> {
        let framebuffer = self.bound_framebuffer();
        let texture = self.framebuffer_textures.borrow().get(&framebuffer).cloned();
        let size = match texture {
            Some(texture) => self.texture_sizes.borrow().get(&texture).cloned(),
            None => self.current.get().and_then(|display| self.displays.borrow().get(&display).cloned()),
        };
        size.unwrap_or_else(|| {
            let viewport = {
                let mut viewport = [0; 4];
                unsafe {
                    self.gl.get_integer_v(gl::VIEWPORT, &mut viewport);
                }
                viewport
            };
            Size2D::new(viewport[2], viewport[3])
        })
    }
}

/// Bytes taken by a block-compressed image; DXT1 packs 4x4 texels into 8
/// bytes and DXT3/DXT5 into 16.
fn compressed_image_size(size: Size2D<i32>, layout: gl::GLenum) -> usize {
    let blocks = ((size.width + 3) / 4) as usize * ((size.height + 3) / 4) as usize;
    if layout == COMPRESSED_RGBA_S3TC_DXT1_EXT { blocks * 8 } else { blocks * 16 }
}

impl GpuDevice for GlesDevice {
    fn register_display(&self, display: DisplayId, size: Size2D<i32>, _format: PixelFormat) {
        self.displays.borrow_mut().insert(display, size);
    }

    fn make_current(&self, display: Option<DisplayId>) -> Result<(), GlError> {
        match display {
            Some(display) => self.native.make_current(display)?,
            None => self.native.release()?,
        }
        self.current.set(display);
        Ok(())
    }

    fn bound_framebuffer(&self) -> FramebufferId {
        if self.track_framebuffer_binding {
            return self.current.get()
                       .and_then(|display| self.framebuffers.borrow().get(&display).cloned())
                       .unwrap_or(DEFAULT_FRAMEBUFFER);
        }
        self.get_integer(gl::FRAMEBUFFER_BINDING) as FramebufferId
    }

    fn bind_framebuffer(&self, framebuffer: FramebufferId) -> Result<(), GlError> {
        self.gl.bind_framebuffer(gl::FRAMEBUFFER, framebuffer);
        self.check_error("glBindFramebuffer")?;
        if let Some(display) = self.current.get() {
            self.framebuffers.borrow_mut().insert(display, framebuffer);
        }
        Ok(())
    }

    fn bound_texture(&self) -> TextureId {
        self.get_integer(gl::TEXTURE_BINDING_2D) as TextureId
    }

    fn bind_texture(&self, texture: TextureId) -> Result<(), GlError> {
        self.gl.bind_texture(gl::TEXTURE_2D, texture);
        self.check_error("glBindTexture")
    }

    fn pixel_store(&self, param: PixelStore) -> GLint {
        self.get_integer(param.as_gl())
    }

    fn set_pixel_store(&self, param: PixelStore, value: GLint) -> Result<(), GlError> {
        self.gl.pixel_store_i(param.as_gl(), value);
        self.check_error("glPixelStorei")
    }

    fn read_pixels(&self, rect: GlRect, format: GlFormat, dst: &mut [u8]) -> Result<(), GlError> {
        let pixel_format = match from_gl(format) {
            Some(pixel_format) => pixel_format,
            None => return Err(GlError::new("glReadPixels", gl::INVALID_ENUM)),
        };
        let (w, h) = (rect.size.width, rect.size.height);
        let len = pitch(w, pixel_format.pixel_size()) * h as usize;
        if dst.len() < len {
            return Err(GlError::new("glReadPixels", gl::INVALID_VALUE));
        }

        match format.data_type {
            gl::UNSIGNED_BYTE | gl::FLOAT => {
                self.gl.read_pixels_into_buffer(rect.origin.x, rect.origin.y, w, h,
                                                format.layout, format.data_type, &mut dst[..len]);
                self.check_error("glReadPixels")
            }
            _ => {
                // Packed 16-bit types go through RGBA; gleam sizes reads by
                // component count.
                let row = pitch(w, READBACK_FORMAT.pixel_size());
                let mut rgba = vec![0u8; row * h as usize];
                self.gl.read_pixels_into_buffer(rect.origin.x, rect.origin.y, w, h,
                                                gl::RGBA, gl::UNSIGNED_BYTE, &mut rgba);
                self.check_error("glReadPixels")?;
                convert_pixels(&rgba, READBACK_FORMAT, row,
                               dst, pixel_format, pitch(w, pixel_format.pixel_size()),
                               Point2D::zero(), Point2D::zero(),
                               Size2D::new(w as usize, h as usize))
                    .map_err(|err| {
                        error!("converting read back pixels: {}", err);
                        GlError::new("glReadPixels", gl::INVALID_OPERATION)
                    })
            }
        }
    }

    fn tex_sub_image_2d(&self, rect: GlRect, format: GlFormat, data: &[u8]) -> Result<(), GlError> {
        self.gl.tex_sub_image_2d(gl::TEXTURE_2D,
                                 0,
                                 rect.origin.x,
                                 rect.origin.y,
                                 rect.size.width,
                                 rect.size.height,
                                 format.layout,
                                 format.data_type,
                                 data);
        self.check_error("glTexSubImage2D")
    }

    fn generate_mipmap(&self) -> Result<(), GlError> {
        self.gl.generate_mipmap(gl::TEXTURE_2D);
        self.check_error("glGenerateMipmap")
    }

    fn flush(&self) {
        self.gl.flush();
    }

    fn create_texture(&self, size: Size2D<i32>, format: GlFormat) -> Result<TextureId, GlError> {
        let texture = self.gl.gen_textures(1)[0];
        {
            let _bound = bind_texture(self, texture)?;
            if from_gl(format).is_some() {
                self.gl.tex_image_2d(gl::TEXTURE_2D, 0, format.layout as GLint,
                                     size.width as GLsizei, size.height as GLsizei, 0,
                                     format.layout, format.data_type, None);
            } else {
                let data = vec![0u8; compressed_image_size(size, format.layout)];
                self.gl.compressed_tex_image_2d(gl::TEXTURE_2D, 0, format.layout,
                                                size.width, size.height, 0, &data);
            }
            self.gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as GLint);
            self.gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as GLint);
            self.gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR as GLint);
            self.gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as GLint);
            if let Err(err) = self.check_error("glTexImage2D") {
                self.gl.delete_textures(&[texture]);
                return Err(err);
            }
        }
        self.texture_sizes.borrow_mut().insert(texture, size);
        Ok(texture)
    }

    fn delete_texture(&self, texture: TextureId) {
        self.texture_sizes.borrow_mut().remove(&texture);
        self.gl.delete_textures(&[texture]);
    }

    fn create_framebuffer(&self, texture: TextureId) -> Result<FramebufferId, GlError> {
        let framebuffer = self.gl.gen_framebuffers(1)[0];
        let previous = self.bound_framebuffer();
        let status = self.bind_framebuffer(framebuffer).and_then(|_| {
            self.gl.framebuffer_texture_2d(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, texture, 0);
            let status = self.gl.check_frame_buffer_status(gl::FRAMEBUFFER);
            self.bind_framebuffer(previous).map(|_| status)
        });
        let status = match status {
            Ok(status) => status,
            Err(err) => {
                self.delete_framebuffer(framebuffer);
                return Err(err);
            }
        };

        if status != gl::FRAMEBUFFER_COMPLETE {
            error!("framebuffer for texture {} is incomplete ({:#x})", texture, status);
            self.gl.delete_framebuffers(&[framebuffer]);
            return Err(GlError::new("glCheckFramebufferStatus", gl::INVALID_FRAMEBUFFER_OPERATION));
        }
        self.framebuffer_textures.borrow_mut().insert(framebuffer, texture);
        Ok(framebuffer)
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        self.framebuffer_textures.borrow_mut().remove(&framebuffer);
        for bound in self.framebuffers.borrow_mut().values_mut() {
            if *bound == framebuffer {
                *bound = DEFAULT_FRAMEBUFFER;
            }
        }
        self.gl.delete_framebuffers(&[framebuffer]);
    }

    fn draw_texture(&self,
                    texture: TextureId,
                    texture_size: Size2D<i32>,
                    transform: &Transform3D<f32>,
                    projection: &Transform3D<f32>,
                    blender: Blender)
                    -> Result<(), GlError> {
        if self.current.get().is_none() {
            return Err(GlError::new("glDrawArrays", gl::INVALID_OPERATION));
        }
        let target_size = self.target_size();
        let _bound = bind_texture(self, texture)?;
        self.drawer.draw_texture(&*self.gl,
                                 texture,
                                 texture_size,
                                 target_size,
                                 transform,
                                 projection,
                                 blender)?;
        self.check_error("glDrawArrays").map_err(|err| {
            error!("drawing texture {} failed: {}", texture, err);
            err
        })
    }
}
