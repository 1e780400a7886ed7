// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Committing locked regions back to the GPU.
//!
//! Unlocking never fails from the caller's point of view. GL errors are
//! logged and the lock is released regardless, so a bitmap is always
//! lockable again afterwards.

use crate::bitmap::{Bitmap, BitmapFlags, LockFlags, LockState};
use crate::context::{default_projection, GraphicsContext};
use crate::convert::convert_pixels;
use crate::device::{Blender, GpuDevice, PixelStore, DEFAULT_FRAMEBUFFER};
use crate::error::{ConvertError, LockError};
use crate::format::{gl_format, real_pixel_format, PixelFormat};
use crate::geometry::{pitch, pixel_alignment, to_gl_rect, GlRect};
use crate::texturegl::{bind_framebuffer, bind_texture, set_pixel_store};

use euclid::default::{Point2D, Size2D, Transform3D};

/// Releases the lock on `bitmap`, uploading the staging buffer unless the
/// lock was read-only.
pub fn unlock_region<D: GpuDevice>(context: &GraphicsContext<D>, bitmap: &mut Bitmap) {
    let lock = match bitmap.lock {
        Some(lock) => lock,
        None => {
            warn!("unlocking bitmap {:?}, which is not locked", bitmap.id);
            return;
        }
    };

    if lock.flags.contains(LockFlags::READONLY) {
        debug!("Unlocking READONLY, nothing to upload");
    } else if let Some(proxy) = bitmap.extra.lock_proxy.take() {
        unlock_backbuffer_proxy(context, bitmap, *proxy, &lock);
    } else if bitmap.is_backbuffer() {
        error!("backbuffer {:?} was locked for writing without a proxy", bitmap.id);
    } else {
        unlock_texture(context, bitmap, &lock);
    }

    bitmap.extra.lock_buffer = None;
    bitmap.lock = None;
}

fn unlock_backbuffer_proxy<D: GpuDevice>(context: &GraphicsContext<D>,
                                         backbuffer: &mut Bitmap,
                                         mut proxy: Bitmap,
                                         lock: &LockState) {
    debug!("Unlocking backbuffer proxy bitmap");
    unlock_region(context, &mut proxy);

    let held = context.is_drawing_held();
    let projection = context.projection(backbuffer.display);
    let state = context.store_state();

    context.hold_drawing(false);
    if let Err(err) = draw_proxy(context, backbuffer, &proxy, lock.rect.origin.to_untyped()) {
        error!("drawing proxy bitmap onto the backbuffer: {}", err);
    }

    context.restore_state(state);
    context.set_projection(backbuffer.display, projection);
    context.hold_drawing(held);

    context.destroy_bitmap(proxy);
}

/// Copies the proxy's texture onto the backbuffer at `origin`, replacing what
/// is there.
fn draw_proxy<D: GpuDevice>(context: &GraphicsContext<D>,
                            backbuffer: &mut Bitmap,
                            proxy: &Bitmap,
                            origin: Point2D<i32>)
                            -> Result<(), LockError> {
    context.set_target_bitmap(backbuffer)?;
    context.use_transform(Transform3D::identity());
    context.set_projection(backbuffer.display, default_projection(backbuffer.size));
    context.set_blender(Blender::COPY);
    context.draw_bitmap(proxy, origin.x as f32, origin.y as f32)?;
    Ok(())
}

fn unlock_texture<D: GpuDevice>(context: &GraphicsContext<D>, bitmap: &Bitmap, lock: &LockState) {
    let extensions = context.display(bitmap.display).extensions;
    let orig_format = real_pixel_format(&extensions, bitmap.format);
    let region = lock.region;

    let buffer = match bitmap.extra.lock_buffer {
        Some(ref buffer) => buffer,
        None => {
            error!("bitmap {:?} is locked without a staging buffer", bitmap.id);
            return;
        }
    };

    let _context = match context.ensure_context(bitmap.display) {
        Ok(guard) => guard,
        Err(err) => {
            error!("cannot unlock bitmap {:?}: {}", bitmap.id, err);
            return;
        }
    };
    let device = context.device();

    // Keep the texture from being attached to whatever is bound while it is
    // written.
    let _framebuffer = match bind_framebuffer(device, DEFAULT_FRAMEBUFFER) {
        Ok(guard) => guard,
        Err(err) => {
            error!("glBindFramebuffer failed: {}", err);
            return;
        }
    };
    let _texture = match bind_texture(device, bitmap.extra.texture) {
        Ok(guard) => guard,
        Err(err) => {
            error!("glBindTexture failed: {}", err);
            return;
        }
    };

    let gl_rect = to_gl_rect(bitmap.size.height, &lock.rect);
    let result = if region.format != orig_format {
        debug!("Unlocking non-backbuffer with conversion {} -> {}",
               region.format.name(), orig_format.name());
        upload_converted(context, &gl_rect, region.format, buffer, orig_format)
    } else {
        debug!("Unlocking non-backbuffer in format {}", region.format.name());
        upload(context, &gl_rect, region.format, buffer)
    };
    if let Err(err) = result {
        error!("glTexSubImage2D for format {} failed: {}", orig_format.name(), err);
    }

    if bitmap.flags.contains(BitmapFlags::MIPMAP) && extensions.framebuffer_object {
        if let Err(err) = device.generate_mipmap() {
            error!("glGenerateMipmap for texture {} failed: {}", bitmap.extra.texture, err);
        }
    }
}

/// Uploads tightly packed, bottom-up rows in `format` into the bound texture.
fn upload<D: GpuDevice>(context: &GraphicsContext<D>,
                        gl_rect: &GlRect,
                        format: PixelFormat,
                        data: &[u8])
                        -> Result<(), LockError> {
    let device = context.device();
    let description = gl_format(format).ok_or(LockError::UnsupportedFormat(format))?;
    let len = pitch(gl_rect.size.width, format.pixel_size()) * gl_rect.size.height as usize;
    let data = data.get(..len).ok_or(ConvertError::BufferTooSmall { needed: len, len: data.len() })?;

    let _unpack = set_pixel_store(device, PixelStore::UnpackAlignment,
                                  pixel_alignment(format.pixel_size()))?;
    device.tex_sub_image_2d(*gl_rect, description, data)?;
    Ok(())
}

fn upload_converted<D: GpuDevice>(context: &GraphicsContext<D>,
                                  gl_rect: &GlRect,
                                  locked_format: PixelFormat,
                                  data: &[u8],
                                  orig_format: PixelFormat)
                                  -> Result<(), LockError> {
    let (w, h) = (gl_rect.size.width, gl_rect.size.height);
    let dst_pitch = pitch(w, orig_format.pixel_size());
    let mut converted = vec![0u8; dst_pitch * h as usize];
    convert_pixels(data,
                   locked_format,
                   pitch(w, locked_format.pixel_size()),
                   &mut converted,
                   orig_format,
                   dst_pitch,
                   Point2D::zero(),
                   Point2D::zero(),
                   Size2D::new(w as usize, h as usize))?;
    upload(context, gl_rect, orig_format, &converted)
}
