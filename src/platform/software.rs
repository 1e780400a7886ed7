// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A CPU implementation of the GLES subset the lock engines use.
//!
//! Each display gets its own context with its own bindings and pixel store
//! state, while textures and framebuffers live in one shared namespace.
//! Backbuffers and textures keep their rows bottom-up, as GL does, and only
//! `RGBA`/`UNSIGNED_BYTE` may be read back from a framebuffer object.
//!
//! The device can be told to fail the next call of a given name, which is how
//! the error paths of the engines are exercised.

use crate::context::DisplayId;
use crate::convert::convert_pixels;
use crate::device::{Blender, FramebufferId, GpuDevice, PixelStore, TextureId, DEFAULT_FRAMEBUFFER};
use crate::error::GlError;
use crate::format::{from_gl, GlFormat, PixelFormat, READBACK_FORMAT};
use crate::geometry::{aligned_row, pitch, GlRect};

use euclid::default::{Point2D, Size2D, Transform3D};
use euclid::rect;
use gleam::gl;
use gleam::gl::{GLenum, GLint, GLuint};
use std::cell::RefCell;
use std::collections::HashMap;

type Rgba = [u8; 4];

const DEFAULT_ALIGNMENT: GLint = 4;

#[derive(Copy, Clone, Debug)]
struct Bindings {
    framebuffer: FramebufferId,
    texture: TextureId,
    pack_alignment: GLint,
    unpack_alignment: GLint,
}

impl Default for Bindings {
    fn default() -> Bindings {
        Bindings {
            framebuffer: DEFAULT_FRAMEBUFFER,
            texture: 0,
            pack_alignment: DEFAULT_ALIGNMENT,
            unpack_alignment: DEFAULT_ALIGNMENT,
        }
    }
}

/// Pixels of a backbuffer or texture, bottom row first and tightly packed.
struct Image {
    size: Size2D<i32>,
    /// `None` for compressed textures, whose contents are opaque.
    format: Option<PixelFormat>,
    pixels: Vec<u8>,
}

impl Image {
    fn new(size: Size2D<i32>, format: Option<PixelFormat>) -> Image {
        let pixel_size = format.map_or(0, |format| format.pixel_size());
        Image {
            size: size,
            format: format,
            pixels: vec![0; pitch(size.width, pixel_size) * size.height.max(0) as usize],
        }
    }

    fn pitch(&self) -> usize {
        pitch(self.size.width, self.format.map_or(0, |format| format.pixel_size()))
    }

    fn contains(&self, rect: &GlRect) -> bool {
        rect.origin.x >= 0 && rect.origin.y >= 0 && rect.size.width >= 0 && rect.size.height >= 0 &&
            rect.max_x() <= self.size.width && rect.max_y() <= self.size.height
    }

    /// Copies `rect` out as RGBA, bottom row first.
    fn to_rgba(&self, rect: &GlRect) -> Option<Vec<u8>> {
        let format = self.format?;
        let row = pitch(rect.size.width, READBACK_FORMAT.pixel_size());
        let mut rgba = vec![0; row * rect.size.height as usize];
        convert_pixels(&self.pixels, format, self.pitch(), &mut rgba, READBACK_FORMAT, row,
                       Point2D::new(rect.origin.x as usize, rect.origin.y as usize),
                       Point2D::zero(),
                       Size2D::new(rect.size.width as usize, rect.size.height as usize)).ok()?;
        Some(rgba)
    }

    fn store_rgba(&mut self, rect: &GlRect, rgba: &[u8]) -> Option<()> {
        let format = self.format?;
        let row = pitch(rect.size.width, READBACK_FORMAT.pixel_size());
        let pitch = self.pitch();
        convert_pixels(rgba, READBACK_FORMAT, row, &mut self.pixels, format, pitch,
                       Point2D::zero(),
                       Point2D::new(rect.origin.x as usize, rect.origin.y as usize),
                       Size2D::new(rect.size.width as usize, rect.size.height as usize)).ok()
    }

    fn pixel(&self, x: i32, y: i32) -> Option<Rgba> {
        let rgba = self.to_rgba(&rect(x, y, 1, 1))?;
        Some([rgba[0], rgba[1], rgba[2], rgba[3]])
    }
}

struct Texture {
    image: Image,
    mipmaps_generated: usize,
}

struct Failure {
    call: &'static str,
    skip: usize,
    code: GLenum,
}

#[derive(Default)]
struct State {
    current: Option<DisplayId>,
    bindings: HashMap<DisplayId, Bindings>,
    backbuffers: HashMap<DisplayId, Image>,
    textures: HashMap<TextureId, Texture>,
    framebuffers: HashMap<FramebufferId, TextureId>,
    next_name: GLuint,
    failures: Vec<Failure>,
    context_switches: usize,
    flushes: usize,
}

impl State {
    fn take_failure(&mut self, call: &'static str) -> Result<(), GlError> {
        let index = match self.failures.iter().position(|failure| failure.call == call) {
            Some(index) => index,
            None => return Ok(()),
        };
        if self.failures[index].skip > 0 {
            self.failures[index].skip -= 1;
            return Ok(());
        }
        let failure = self.failures.remove(index);
        Err(GlError::new(call, failure.code))
    }

    fn bindings(&mut self, call: &'static str) -> Result<&mut Bindings, GlError> {
        match self.current {
            Some(display) => Ok(self.bindings.entry(display).or_insert_with(Bindings::default)),
            None => Err(GlError::new(call, gl::INVALID_OPERATION)),
        }
    }

    fn gen_name(&mut self) -> GLuint {
        self.next_name += 1;
        self.next_name
    }

    /// The image behind the current context's framebuffer binding.
    fn target(&mut self, call: &'static str) -> Result<&mut Image, GlError> {
        let display = self.current.ok_or(GlError::new(call, gl::INVALID_OPERATION))?;
        let framebuffer = self.bindings(call)?.framebuffer;
        if framebuffer == DEFAULT_FRAMEBUFFER {
            return self.backbuffers.get_mut(&display)
                       .ok_or(GlError::new(call, gl::INVALID_FRAMEBUFFER_OPERATION));
        }
        let texture = *self.framebuffers.get(&framebuffer)
                           .ok_or(GlError::new(call, gl::INVALID_FRAMEBUFFER_OPERATION))?;
        self.textures.get_mut(&texture)
            .map(|texture| &mut texture.image)
            .ok_or(GlError::new(call, gl::INVALID_FRAMEBUFFER_OPERATION))
    }
}

#[derive(Default)]
pub struct SoftwareDevice {
    state: RefCell<State>,
}

impl SoftwareDevice {
    pub fn new() -> SoftwareDevice {
        SoftwareDevice::default()
    }

    /// Makes the next call to `call` (e.g. `"glReadPixels"`) fail with `code`.
    pub fn fail_next(&self, call: &'static str, code: GLenum) {
        self.fail_nth(call, 0, code);
    }

    /// Lets `skip` calls to `call` through, then fails the one after.
    pub fn fail_nth(&self, call: &'static str, skip: usize, code: GLenum) {
        self.state.borrow_mut().failures.push(Failure {
            call: call,
            skip: skip,
            code: code,
        });
    }

    pub fn current(&self) -> Option<DisplayId> {
        self.state.borrow().current
    }

    /// How many times the current context actually changed.
    pub fn context_switches(&self) -> usize {
        self.state.borrow().context_switches
    }

    pub fn flush_count(&self) -> usize {
        self.state.borrow().flushes
    }

    pub fn texture_count(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn framebuffer_count(&self) -> usize {
        self.state.borrow().framebuffers.len()
    }

    pub fn mipmaps_generated(&self, texture: TextureId) -> usize {
        self.state.borrow().textures.get(&texture).map_or(0, |texture| texture.mipmaps_generated)
    }

    /// The bindings of `display`'s context, whether or not it is current.
    pub fn bound_framebuffer_of(&self, display: DisplayId) -> FramebufferId {
        self.state.borrow().bindings.get(&display).map_or(DEFAULT_FRAMEBUFFER, |b| b.framebuffer)
    }

    pub fn pixel_store_of(&self, display: DisplayId, param: PixelStore) -> GLint {
        let state = self.state.borrow();
        let bindings = state.bindings.get(&display).cloned().unwrap_or_default();
        match param {
            PixelStore::PackAlignment => bindings.pack_alignment,
            PixelStore::UnpackAlignment => bindings.unpack_alignment,
        }
    }

    /// Reads pixel `(x, y)` of a backbuffer, counting rows from the top.
    pub fn backbuffer_pixel(&self, display: DisplayId, x: i32, y: i32) -> Option<Rgba> {
        let state = self.state.borrow();
        let image = state.backbuffers.get(&display)?;
        image.pixel(x, image.size.height - 1 - y)
    }

    pub fn set_backbuffer_pixel(&self, display: DisplayId, x: i32, y: i32, color: Rgba) {
        let mut state = self.state.borrow_mut();
        if let Some(image) = state.backbuffers.get_mut(&display) {
            let y = image.size.height - 1 - y;
            image.store_rgba(&rect(x, y, 1, 1), &color);
        }
    }

    pub fn fill_backbuffer(&self, display: DisplayId, color: Rgba) {
        let mut state = self.state.borrow_mut();
        if let Some(image) = state.backbuffers.get_mut(&display) {
            fill(image, color);
        }
    }

    /// Reads texel `(x, y)` of a texture, counting rows from the top.
    pub fn texture_pixel(&self, texture: TextureId, x: i32, y: i32) -> Option<Rgba> {
        let state = self.state.borrow();
        let image = &state.textures.get(&texture)?.image;
        image.pixel(x, image.size.height - 1 - y)
    }

    pub fn fill_texture(&self, texture: TextureId, color: Rgba) {
        let mut state = self.state.borrow_mut();
        if let Some(texture) = state.textures.get_mut(&texture) {
            fill(&mut texture.image, color);
        }
    }
}

fn fill(image: &mut Image, color: Rgba) {
    let whole = rect(0, 0, image.size.width, image.size.height);
    let rgba: Vec<u8> = color.iter().cloned().cycle().take(image.size.area().max(0) as usize * 4).collect();
    image.store_rgba(&whole, &rgba);
}

fn blend(blender: Blender, src: &[u8], dst: &mut [u8]) {
    let alpha = src[3] as f32 / 255.0;
    let src_weight = blender.src.weight(alpha);
    let dst_weight = blender.dst.weight(alpha);
    for (d, &s) in dst.iter_mut().zip(src) {
        let value = s as f32 * src_weight + *d as f32 * dst_weight;
        *d = value.round().max(0.0).min(255.0) as u8;
    }
}

/// Where a texture-space point lands in window coordinates.
fn to_window(combined: &Transform3D<f32>, target: Size2D<i32>, x: f32, y: f32) -> Option<(f32, f32)> {
    let ndc = combined.transform_point2d(Point2D::new(x, y))?;
    Some(((ndc.x + 1.0) / 2.0 * target.width as f32, (ndc.y + 1.0) / 2.0 * target.height as f32))
}

impl GpuDevice for SoftwareDevice {
    fn register_display(&self, display: DisplayId, size: Size2D<i32>, _format: PixelFormat) {
        let mut state = self.state.borrow_mut();
        state.bindings.insert(display, Bindings::default());
        state.backbuffers.insert(display, Image::new(size, Some(READBACK_FORMAT)));
    }

    fn make_current(&self, display: Option<DisplayId>) -> Result<(), GlError> {
        let mut state = self.state.borrow_mut();
        state.take_failure("eglMakeCurrent")?;
        if let Some(display) = display {
            if !state.backbuffers.contains_key(&display) {
                return Err(GlError::new("eglMakeCurrent", gl::INVALID_VALUE));
            }
        }
        if state.current != display {
            state.context_switches += 1;
            state.current = display;
        }
        Ok(())
    }

    fn bound_framebuffer(&self) -> FramebufferId {
        let mut state = self.state.borrow_mut();
        state.bindings("glGetIntegerv").map_or(DEFAULT_FRAMEBUFFER, |b| b.framebuffer)
    }

    fn bind_framebuffer(&self, framebuffer: FramebufferId) -> Result<(), GlError> {
        let mut state = self.state.borrow_mut();
        state.take_failure("glBindFramebuffer")?;
        if framebuffer != DEFAULT_FRAMEBUFFER && !state.framebuffers.contains_key(&framebuffer) {
            return Err(GlError::new("glBindFramebuffer", gl::INVALID_OPERATION));
        }
        state.bindings("glBindFramebuffer")?.framebuffer = framebuffer;
        Ok(())
    }

    fn bound_texture(&self) -> TextureId {
        let mut state = self.state.borrow_mut();
        state.bindings("glGetIntegerv").map_or(0, |b| b.texture)
    }

    fn bind_texture(&self, texture: TextureId) -> Result<(), GlError> {
        let mut state = self.state.borrow_mut();
        state.take_failure("glBindTexture")?;
        if texture != 0 && !state.textures.contains_key(&texture) {
            return Err(GlError::new("glBindTexture", gl::INVALID_OPERATION));
        }
        state.bindings("glBindTexture")?.texture = texture;
        Ok(())
    }

    fn pixel_store(&self, param: PixelStore) -> GLint {
        let mut state = self.state.borrow_mut();
        match state.bindings("glGetIntegerv") {
            Ok(bindings) => match param {
                PixelStore::PackAlignment => bindings.pack_alignment,
                PixelStore::UnpackAlignment => bindings.unpack_alignment,
            },
            Err(_) => DEFAULT_ALIGNMENT,
        }
    }

    fn set_pixel_store(&self, param: PixelStore, value: GLint) -> Result<(), GlError> {
        let mut state = self.state.borrow_mut();
        state.take_failure("glPixelStorei")?;
        if ![1, 2, 4, 8].contains(&value) {
            return Err(GlError::new("glPixelStorei", gl::INVALID_VALUE));
        }
        let bindings = state.bindings("glPixelStorei")?;
        match param {
            PixelStore::PackAlignment => bindings.pack_alignment = value,
            PixelStore::UnpackAlignment => bindings.unpack_alignment = value,
        }
        Ok(())
    }

    fn read_pixels(&self, rect: GlRect, format: GlFormat, dst: &mut [u8]) -> Result<(), GlError> {
        let mut state = self.state.borrow_mut();
        state.take_failure("glReadPixels")?;
        let bindings = *state.bindings("glReadPixels")?;
        let dst_format = from_gl(format).ok_or(GlError::new("glReadPixels", gl::INVALID_ENUM))?;
        if bindings.framebuffer != DEFAULT_FRAMEBUFFER && dst_format != READBACK_FORMAT {
            // Framebuffer objects only promise RGBA/UNSIGNED_BYTE.
            return Err(GlError::new("glReadPixels", gl::INVALID_OPERATION));
        }

        let image = state.target("glReadPixels")?;
        if !image.contains(&rect) {
            return Err(GlError::new("glReadPixels", gl::INVALID_VALUE));
        }
        let rgba = image.to_rgba(&rect).ok_or(GlError::new("glReadPixels", gl::INVALID_OPERATION))?;

        let dst_pitch = aligned_row(pitch(rect.size.width, dst_format.pixel_size()),
                                    bindings.pack_alignment);
        convert_pixels(&rgba, READBACK_FORMAT, pitch(rect.size.width, READBACK_FORMAT.pixel_size()),
                       dst, dst_format, dst_pitch,
                       Point2D::zero(), Point2D::zero(),
                       Size2D::new(rect.size.width as usize, rect.size.height as usize))
            .map_err(|_| GlError::new("glReadPixels", gl::INVALID_OPERATION))
    }

    fn tex_sub_image_2d(&self, rect: GlRect, format: GlFormat, data: &[u8]) -> Result<(), GlError> {
        let mut state = self.state.borrow_mut();
        state.take_failure("glTexSubImage2D")?;
        let bindings = *state.bindings("glTexSubImage2D")?;
        let src_format = from_gl(format).ok_or(GlError::new("glTexSubImage2D", gl::INVALID_ENUM))?;

        let texture = state.textures.get_mut(&bindings.texture)
                           .ok_or(GlError::new("glTexSubImage2D", gl::INVALID_OPERATION))?;
        let image = &mut texture.image;
        if image.format != Some(src_format) {
            return Err(GlError::new("glTexSubImage2D", gl::INVALID_OPERATION));
        }
        if !image.contains(&rect) {
            return Err(GlError::new("glTexSubImage2D", gl::INVALID_VALUE));
        }

        let src_pitch = aligned_row(pitch(rect.size.width, src_format.pixel_size()),
                                    bindings.unpack_alignment);
        let dst_pitch = image.pitch();
        convert_pixels(data, src_format, src_pitch, &mut image.pixels, src_format, dst_pitch,
                       Point2D::zero(),
                       Point2D::new(rect.origin.x as usize, rect.origin.y as usize),
                       Size2D::new(rect.size.width as usize, rect.size.height as usize))
            .map_err(|_| GlError::new("glTexSubImage2D", gl::INVALID_VALUE))
    }

    fn generate_mipmap(&self) -> Result<(), GlError> {
        let mut state = self.state.borrow_mut();
        state.take_failure("glGenerateMipmap")?;
        let texture = state.bindings("glGenerateMipmap")?.texture;
        match state.textures.get_mut(&texture) {
            Some(texture) => {
                texture.mipmaps_generated += 1;
                Ok(())
            }
            None => Err(GlError::new("glGenerateMipmap", gl::INVALID_OPERATION)),
        }
    }

    fn flush(&self) {
        self.state.borrow_mut().flushes += 1;
    }

    fn create_texture(&self, size: Size2D<i32>, format: GlFormat) -> Result<TextureId, GlError> {
        let mut state = self.state.borrow_mut();
        state.take_failure("glTexImage2D")?;
        state.bindings("glTexImage2D")?;
        if size.width <= 0 || size.height <= 0 {
            return Err(GlError::new("glTexImage2D", gl::INVALID_VALUE));
        }
        let pixel_format = from_gl(format);
        if pixel_format.is_none() && !(0x83F1..=0x83F3).contains(&format.layout) {
            return Err(GlError::new("glTexImage2D", gl::INVALID_ENUM));
        }

        let texture = state.gen_name();
        state.textures.insert(texture, Texture {
            image: Image::new(size, pixel_format),
            mipmaps_generated: 0,
        });
        Ok(texture)
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut state = self.state.borrow_mut();
        state.textures.remove(&texture);
        for bindings in state.bindings.values_mut() {
            if bindings.texture == texture {
                bindings.texture = 0;
            }
        }
    }

    fn create_framebuffer(&self, texture: TextureId) -> Result<FramebufferId, GlError> {
        let mut state = self.state.borrow_mut();
        state.take_failure("glFramebufferTexture2D")?;
        state.bindings("glFramebufferTexture2D")?;
        match state.textures.get(&texture) {
            Some(attached) if attached.image.format.is_some() => {}
            _ => return Err(GlError::new("glCheckFramebufferStatus", gl::INVALID_FRAMEBUFFER_OPERATION)),
        }
        let framebuffer = state.gen_name();
        state.framebuffers.insert(framebuffer, texture);
        Ok(framebuffer)
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        let mut state = self.state.borrow_mut();
        state.framebuffers.remove(&framebuffer);
        for bindings in state.bindings.values_mut() {
            if bindings.framebuffer == framebuffer {
                bindings.framebuffer = DEFAULT_FRAMEBUFFER;
            }
        }
    }

    /// Nearest-texel rasterization of an axis-aligned quad.
    fn draw_texture(&self,
                    texture: TextureId,
                    texture_size: Size2D<i32>,
                    transform: &Transform3D<f32>,
                    projection: &Transform3D<f32>,
                    blender: Blender)
                    -> Result<(), GlError> {
        let mut state = self.state.borrow_mut();
        state.take_failure("glDrawArrays")?;
        let source = match state.textures.get(&texture) {
            Some(source) => source.image.to_rgba(&rect(0, 0, source.image.size.width, source.image.size.height)),
            None => None,
        };
        let source = source.ok_or(GlError::new("glDrawArrays", gl::INVALID_OPERATION))?;

        let target = state.target("glDrawArrays")?;
        let target_size = target.size;
        let combined = transform.then(projection);
        let corners = (to_window(&combined, target_size, 0.0, 0.0),
                       to_window(&combined, target_size,
                                 texture_size.width as f32, texture_size.height as f32));
        let ((left, top), (right, bottom)) = match corners {
            (Some(first), Some(second)) => (first, second),
            _ => return Ok(()),
        };
        if left == right || top == bottom {
            return Ok(());
        }

        let whole = rect(0, 0, target_size.width, target_size.height);
        let mut pixels = target.to_rgba(&whole).ok_or(GlError::new("glDrawArrays", gl::INVALID_OPERATION))?;

        let (x0, x1) = (left.min(right).round() as i32, left.max(right).round() as i32);
        let (y0, y1) = (top.min(bottom).round() as i32, top.max(bottom).round() as i32);
        for y in y0.max(0)..y1.min(target_size.height) {
            for x in x0.max(0)..x1.min(target_size.width) {
                let u = ((x as f32 + 0.5 - left) / (right - left) * texture_size.width as f32) as i32;
                let v = ((y as f32 + 0.5 - top) / (bottom - top) * texture_size.height as f32) as i32;
                if u < 0 || v < 0 || u >= texture_size.width || v >= texture_size.height {
                    continue;
                }
                // `v` counts from the image's top row; texture rows are bottom-up.
                let texel = ((texture_size.height - 1 - v) * texture_size.width + u) as usize * 4;
                let pixel = (y * target_size.width + x) as usize * 4;
                blend(blender, &source[texel..texel + 4], &mut pixels[pixel..pixel + 4]);
            }
        }

        target.store_rgba(&whole, &pixels).ok_or(GlError::new("glDrawArrays", gl::INVALID_OPERATION))
    }
}
