// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scoped GL bindings. Each guard puts back the value it replaced when it is
//! dropped, so helpers can nest without disturbing their callers.

use crate::device::{FramebufferId, GpuDevice, PixelStore, TextureId};
use crate::error::GlError;

use gleam::gl::GLint;

/// Encapsulates a bound texture. This ensures that the previous texture is
/// rebound properly.
pub struct BoundTexture<'a, D: GpuDevice + ?Sized> {
    device: &'a D,
    pub texture: TextureId,
    previous: TextureId,
}

impl<'a, D: GpuDevice + ?Sized> Drop for BoundTexture<'a, D> {
    fn drop(&mut self) {
        if let Err(err) = self.device.bind_texture(self.previous) {
            error!("restoring texture {}: {}", self.previous, err);
        }
    }
}

/// Binds `texture` to `TEXTURE_2D` until the returned guard is dropped.
pub fn bind_texture<D: GpuDevice + ?Sized>(device: &D, texture: TextureId)
                                           -> Result<BoundTexture<D>, GlError> {
    let previous = device.bound_texture();
    device.bind_texture(texture)?;
    Ok(BoundTexture {
        device: device,
        texture: texture,
        previous: previous,
    })
}

/// A framebuffer binding that reverts to the previously bound framebuffer.
pub struct BoundFramebuffer<'a, D: GpuDevice + ?Sized> {
    device: &'a D,
    pub framebuffer: FramebufferId,
    previous: FramebufferId,
}

impl<'a, D: GpuDevice + ?Sized> Drop for BoundFramebuffer<'a, D> {
    fn drop(&mut self) {
        if let Err(err) = self.device.bind_framebuffer(self.previous) {
            error!("restoring framebuffer {}: {}", self.previous, err);
        }
    }
}

pub fn bind_framebuffer<D: GpuDevice + ?Sized>(device: &D, framebuffer: FramebufferId)
                                               -> Result<BoundFramebuffer<D>, GlError> {
    let previous = device.bound_framebuffer();
    device.bind_framebuffer(framebuffer)?;
    Ok(BoundFramebuffer {
        device: device,
        framebuffer: framebuffer,
        previous: previous,
    })
}

/// A pixel store parameter that is reset when the guard goes away.
pub struct PixelStoreGuard<'a, D: GpuDevice + ?Sized> {
    device: &'a D,
    param: PixelStore,
    previous: GLint,
}

impl<'a, D: GpuDevice + ?Sized> Drop for PixelStoreGuard<'a, D> {
    fn drop(&mut self) {
        if let Err(err) = self.device.set_pixel_store(self.param, self.previous) {
            error!("restoring {:?} to {}: {}", self.param, self.previous, err);
        }
    }
}

pub fn set_pixel_store<D: GpuDevice + ?Sized>(device: &D, param: PixelStore, value: GLint)
                                              -> Result<PixelStoreGuard<D>, GlError> {
    let previous = device.pixel_store(param);
    device.set_pixel_store(param, value)?;
    Ok(PixelStoreGuard {
        device: device,
        param: param,
        previous: previous,
    })
}
