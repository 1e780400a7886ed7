// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Locking bitmap regions for CPU access on GLES.
//!
//! There are three ways in:
//!
//! * a read-only lock of the backbuffer reads it straight into the staging
//!   buffer;
//! * any other backbuffer lock goes through a proxy bitmap, which is drawn
//!   back onto the backbuffer on unlock;
//! * texture bitmaps are read through a framebuffer object, or not read at
//!   all for write-only locks.
//!
//! GLES has no way to read a texture without a framebuffer object, and a
//! framebuffer object can only be read as 8-bit RGBA, so texture readbacks
//! are converted to the requested format in place.

use crate::bitmap::{allocate_staging, Bitmap, BitmapFlags, LockFlags, LockState, LockedRegion};
use crate::context::GraphicsContext;
use crate::convert::convert_in_place;
use crate::device::{FramebufferId, GpuDevice, PixelStore, DEFAULT_FRAMEBUFFER};
use crate::error::LockError;
use crate::format::{gl_format, real_pixel_format, resolve_lock_format, GlFormat, PixelFormat};
use crate::format::READBACK_FORMAT;
use crate::geometry::{aligned_row, pitch, pixel_alignment, pixel_rect, to_gl_rect, GlRect, PixelRect};
use crate::texturegl::{bind_framebuffer, set_pixel_store};

use euclid::default::Size2D;

/// Locks `w`x`h` pixels at `(x, y)` of `bitmap` and returns where to find
/// them. The rectangle must lie inside the bitmap.
///
/// On failure the bitmap is left unlocked with no staging buffer.
pub fn lock_region<D: GpuDevice>(context: &GraphicsContext<D>,
                                 bitmap: &mut Bitmap,
                                 x: i32,
                                 y: i32,
                                 w: i32,
                                 h: i32,
                                 format: PixelFormat,
                                 flags: LockFlags)
                                 -> Result<LockedRegion, LockError> {
    if bitmap.is_locked() {
        return Err(LockError::AlreadyLocked);
    }
    let rect = pixel_rect(x, y, w, h);
    debug_assert!(x >= 0 && y >= 0 && x + w <= bitmap.size.width && y + h <= bitmap.size.height,
                  "lock rectangle {:?} outside {:?}", rect, bitmap.size);

    let format = resolve_lock_format(bitmap.format, format);
    let display = context.current_display().unwrap_or(bitmap.display);
    let real_format = real_pixel_format(&context.display(display).extensions, format);
    if real_format.is_compressed() || gl_format(real_format).is_none() {
        return Err(LockError::UnsupportedFormat(real_format));
    }

    let region = if bitmap.is_backbuffer() {
        if flags.contains(LockFlags::READONLY) {
            lock_backbuffer_read_only(context, bitmap, &rect, real_format)?
        } else {
            lock_backbuffer_proxy(context, bitmap, &rect, real_format, flags)?
        }
    } else {
        lock_texture(context, bitmap, &rect, real_format, flags)?
    };

    bitmap.lock = Some(LockState {
        rect: rect,
        flags: flags,
        region: region,
    });
    Ok(region)
}

/// Reads `rect` of a backbuffer into `dst` as `format`, bottom row first.
fn read_backbuffer<D: GpuDevice>(context: &GraphicsContext<D>,
                                 backbuffer: &Bitmap,
                                 rect: &PixelRect,
                                 format: PixelFormat,
                                 dst: &mut [u8])
                                 -> Result<(), LockError> {
    let device = context.device();
    let description = gl_description(format)?;
    let _context = context.ensure_context(backbuffer.display)?;
    let _framebuffer = bind_framebuffer(device, DEFAULT_FRAMEBUFFER)?;
    let _pack = set_pixel_store(device, PixelStore::PackAlignment,
                                pixel_alignment(format.pixel_size()))?;

    device.read_pixels(to_gl_rect(backbuffer.size.height, rect), description, dst).map_err(|err| {
        error!("glReadPixels for format {} failed: {}", format.name(), err);
        LockError::from(err)
    })
}

fn gl_description(format: PixelFormat) -> Result<GlFormat, LockError> {
    gl_format(format).ok_or(LockError::UnsupportedFormat(format))
}

fn lock_backbuffer_read_only<D: GpuDevice>(context: &GraphicsContext<D>,
                                           bitmap: &mut Bitmap,
                                           rect: &PixelRect,
                                           real_format: PixelFormat)
                                           -> Result<LockedRegion, LockError> {
    let pitch = pitch(rect.size.width, real_format.pixel_size());
    let mut buffer = allocate_staging(context.config(), pitch * rect.size.height as usize)?;

    read_backbuffer(context, bitmap, rect, real_format, &mut buffer)?;

    bitmap.extra.lock_buffer = Some(buffer);
    Ok(LockedRegion::flipped(real_format, pitch, rect.size.width, rect.size.height))
}

fn lock_backbuffer_proxy<D: GpuDevice>(context: &GraphicsContext<D>,
                                       bitmap: &mut Bitmap,
                                       rect: &PixelRect,
                                       real_format: PixelFormat,
                                       flags: LockFlags)
                                       -> Result<LockedRegion, LockError> {
    debug!("Creating backbuffer proxy bitmap");
    let display = context.current_display().unwrap_or(bitmap.display);
    let mut proxy = context.create_bitmap(display,
                                          rect.size.width,
                                          rect.size.height,
                                          real_format,
                                          BitmapFlags::VIDEO | BitmapFlags::NO_PRESERVE_TEXTURE)
                           .map_err(LockError::BitmapCreation)?;

    debug!("Locking backbuffer proxy bitmap");
    let proxy_rect = pixel_rect(0, 0, rect.size.width, rect.size.height);
    let region = match lock_texture(context, &mut proxy, &proxy_rect, real_format, flags) {
        Ok(region) => region,
        Err(err) => {
            context.destroy_bitmap(proxy);
            return Err(err);
        }
    };

    if !flags.contains(LockFlags::WRITEONLY) {
        let result = match proxy.extra.lock_buffer.as_deref_mut() {
            Some(buffer) => read_backbuffer(context, bitmap, rect, real_format, buffer),
            None => Ok(()),
        };
        if let Err(err) = result {
            proxy.extra.lock_buffer = None;
            context.destroy_bitmap(proxy);
            return Err(err);
        }
    }

    proxy.lock = Some(LockState {
        rect: proxy_rect,
        flags: flags,
        region: region,
    });
    bitmap.extra.lock_proxy = Some(Box::new(proxy));
    Ok(region)
}

fn lock_texture<D: GpuDevice>(context: &GraphicsContext<D>,
                              bitmap: &mut Bitmap,
                              rect: &PixelRect,
                              real_format: PixelFormat,
                              flags: LockFlags)
                              -> Result<LockedRegion, LockError> {
    let gl_rect = to_gl_rect(bitmap.size.height, rect);

    // Switch to the bitmap's context unless its objects are visible from here.
    let _context = context.ensure_context(bitmap.display)?;

    let old_target = context.target();
    let result = lock_texture_aligned(context, bitmap, &gl_rect, real_format, flags);
    if context.target() != old_target {
        context.restore_target(old_target, bitmap.id);
    }

    if let Err(ref err) = result {
        error!("Failed to lock region: {}", err);
        debug_assert!(bitmap.extra.lock_buffer.is_none());
    }
    result
}

fn lock_texture_aligned<D: GpuDevice>(context: &GraphicsContext<D>,
                                      bitmap: &mut Bitmap,
                                      gl_rect: &GlRect,
                                      real_format: PixelFormat,
                                      flags: LockFlags)
                                      -> Result<LockedRegion, LockError> {
    // Unlocking has to use the same row alignment.
    let alignment = pixel_alignment(real_format.pixel_size());
    let _pack = set_pixel_store(context.device(), PixelStore::PackAlignment, alignment)
        .map_err(|err| {
            error!("glPixelStorei(GL_PACK_ALIGNMENT, {}) failed: {}", alignment, err);
            err
        })?;

    if flags.contains(LockFlags::WRITEONLY) {
        debug!("Locking non-backbuffer WRITEONLY");
        lock_texture_write_only(context, bitmap, gl_rect, real_format)
    } else {
        debug!("Locking non-backbuffer {}",
               if flags.contains(LockFlags::READONLY) { "READONLY" } else { "READWRITE" });
        lock_texture_read_write(context, bitmap, gl_rect, real_format)
    }
}

fn lock_texture_write_only<D: GpuDevice>(context: &GraphicsContext<D>,
                                         bitmap: &mut Bitmap,
                                         gl_rect: &GlRect,
                                         real_format: PixelFormat)
                                         -> Result<LockedRegion, LockError> {
    let pitch = pitch(gl_rect.size.width, real_format.pixel_size());
    let buffer = allocate_staging(context.config(), pitch * gl_rect.size.height as usize)?;
    bitmap.extra.lock_buffer = Some(buffer);

    if context.config().flush_after_write_only_lock {
        context.device().flush();
    }

    Ok(LockedRegion::flipped(real_format, pitch, gl_rect.size.width, gl_rect.size.height))
}

fn lock_texture_read_write<D: GpuDevice>(context: &GraphicsContext<D>,
                                         bitmap: &mut Bitmap,
                                         gl_rect: &GlRect,
                                         real_format: PixelFormat)
                                         -> Result<LockedRegion, LockError> {
    debug_assert!(bitmap.parent.is_none());

    // Unlike desktop GL there is nothing to read a texture through but a
    // framebuffer object. The caller restores the render target.
    match context.setup_framebuffer(bitmap) {
        Some(framebuffer) => {
            lock_texture_from_framebuffer(context, bitmap, framebuffer, gl_rect, real_format)
        }
        None => {
            error!("no fbo");
            Err(LockError::NoFramebuffer)
        }
    }
}

fn lock_texture_from_framebuffer<D: GpuDevice>(context: &GraphicsContext<D>,
                                               bitmap: &mut Bitmap,
                                               framebuffer: FramebufferId,
                                               gl_rect: &GlRect,
                                               real_format: PixelFormat)
                                               -> Result<LockedRegion, LockError> {
    let device = context.device();
    let (w, h) = (gl_rect.size.width, gl_rect.size.height);
    let pitch = pitch(w, real_format.pixel_size());

    let _framebuffer = bind_framebuffer(device, framebuffer).map_err(|err| {
        error!("glBindFramebuffer failed: {}", err);
        err
    })?;

    // One buffer serves both the RGBA readback and the converted pixels.
    let alignment = device.pixel_store(PixelStore::PackAlignment);
    let readback_pitch = aligned_row(self::pitch(w, READBACK_FORMAT.pixel_size()), alignment);
    let size = (pitch * h as usize).max(readback_pitch * h as usize);
    let mut buffer = allocate_staging(context.config(), size)?;

    device.read_pixels(*gl_rect, gl_description(READBACK_FORMAT)?, &mut buffer).map_err(|err| {
        error!("glReadPixels for format {} failed: {}", real_format.name(), err);
        err
    })?;

    debug!("Converting from format {} -> {}", READBACK_FORMAT.name(), real_format.name());
    convert_in_place(&mut buffer,
                     READBACK_FORMAT,
                     readback_pitch,
                     real_format,
                     pitch,
                     Size2D::new(w as usize, h as usize))?;

    bitmap.extra.lock_buffer = Some(buffer);
    Ok(LockedRegion::flipped(real_format, pitch, w, h))
}
