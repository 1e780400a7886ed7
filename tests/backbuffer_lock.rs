// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod common;

use common::{single_display, solid_row, BLUE, GREEN, RED};

use gles_lock::bitmap::LockFlags;
use gles_lock::device::Blender;
use gles_lock::error::{GlError, LockError};
use gles_lock::format::PixelFormat;
use gles_lock::{lock_region, unlock_region};

use euclid::default::Transform3D;
use gleam::gl;

#[test]
fn read_only_lock_reads_rows_top_down() {
    let (context, display) = single_display();
    let mut backbuffer = context.create_backbuffer(display);
    let device = context.device();
    device.set_backbuffer_pixel(display, 2, 1, RED);
    device.set_backbuffer_pixel(display, 4, 2, GREEN);

    let region = lock_region(&context, &mut backbuffer, 2, 1, 3, 2, PixelFormat::Any, LockFlags::READONLY)
                     .unwrap();
    assert_eq!(region.pitch, -12);
    assert_eq!(region.offset(), 12);
    assert!(backbuffer.lock_proxy().is_none());

    let top = backbuffer.locked_row(0).unwrap();
    assert_eq!(&top[0..4], &RED);
    assert_eq!(&top[4..12], &[0; 8]);
    let bottom = backbuffer.locked_row(1).unwrap();
    assert_eq!(&bottom[8..12], &GREEN);

    unlock_region(&context, &mut backbuffer);
    assert!(!backbuffer.is_locked());
    assert!(backbuffer.staging_buffer().is_none());
    assert_eq!(device.backbuffer_pixel(display, 2, 1), Some(RED));
    assert_eq!(context.current_display(), None);
}

#[test]
fn read_only_lock_converts_through_gl() {
    let (context, display) = single_display();
    let mut backbuffer = context.create_backbuffer(display);
    context.device().fill_backbuffer(display, BLUE);

    let region = lock_region(&context, &mut backbuffer, 0, 0, 3, 3, PixelFormat::Rgb888, LockFlags::READONLY)
                     .unwrap();
    // RGB_888 is stored as BGR_888 on GLES.
    assert_eq!(region.format, PixelFormat::Bgr888);
    assert_eq!(region.pitch, -9);
    assert_eq!(backbuffer.locked_row(2).unwrap(), &[0, 0, 255, 0, 0, 255, 0, 0, 255]);
    unlock_region(&context, &mut backbuffer);
}

#[test]
fn read_write_lock_goes_through_a_proxy() {
    let (context, display) = single_display();
    let mut backbuffer = context.create_backbuffer(display);
    let device = context.device();
    device.fill_backbuffer(display, BLUE);

    let region = lock_region(&context, &mut backbuffer, 10, 10, 32, 32, PixelFormat::Abgr8888Le,
                             LockFlags::READWRITE).unwrap();
    assert_eq!(region.width, 32);
    assert_eq!(region.height, 32);
    assert_eq!(region.pitch, -128);
    {
        let proxy = backbuffer.lock_proxy().unwrap();
        assert!(proxy.is_locked());
        assert_eq!(proxy.size.width, 32);
        assert!(backbuffer.staging_buffer().is_none());
    }
    assert_eq!(device.texture_count(), 1);

    // The proxy starts out with the backbuffer's pixels.
    assert_eq!(backbuffer.locked_row(0).unwrap(), &solid_row(BLUE, 32)[..]);
    for row in 0..32 {
        backbuffer.locked_row_mut(row).unwrap().copy_from_slice(&solid_row(RED, 32));
    }
    unlock_region(&context, &mut backbuffer);

    assert!(!backbuffer.is_locked());
    assert!(backbuffer.lock_proxy().is_none());
    assert_eq!(device.texture_count(), 0);
    assert_eq!(device.framebuffer_count(), 0);
    assert_eq!(device.backbuffer_pixel(display, 10, 10), Some(RED));
    assert_eq!(device.backbuffer_pixel(display, 41, 41), Some(RED));
    assert_eq!(device.backbuffer_pixel(display, 9, 10), Some(BLUE));
    assert_eq!(device.backbuffer_pixel(display, 42, 41), Some(BLUE));
    assert_eq!(device.backbuffer_pixel(display, 41, 42), Some(BLUE));

    lock_region(&context, &mut backbuffer, 10, 10, 32, 32, PixelFormat::Any, LockFlags::READONLY).unwrap();
    for row in 0..32 {
        assert_eq!(backbuffer.locked_row(row).unwrap(), &solid_row(RED, 32)[..]);
    }
    unlock_region(&context, &mut backbuffer);
}

#[test]
fn write_only_proxy_replaces_the_region() {
    let (context, display) = single_display();
    let mut backbuffer = context.create_backbuffer(display);
    let device = context.device();
    device.fill_backbuffer(display, BLUE);

    lock_region(&context, &mut backbuffer, 0, 60, 4, 4, PixelFormat::Any, LockFlags::WRITEONLY).unwrap();
    for row in 0..4 {
        backbuffer.locked_row_mut(row).unwrap().copy_from_slice(&solid_row(GREEN, 4));
    }
    unlock_region(&context, &mut backbuffer);

    assert_eq!(device.backbuffer_pixel(display, 0, 60), Some(GREEN));
    assert_eq!(device.backbuffer_pixel(display, 3, 63), Some(GREEN));
    assert_eq!(device.backbuffer_pixel(display, 4, 63), Some(BLUE));
    assert_eq!(device.backbuffer_pixel(display, 0, 59), Some(BLUE));
}

#[test]
fn proxy_flush_leaves_the_drawing_state_alone() {
    let (context, display) = single_display();
    let mut backbuffer = context.create_backbuffer(display);
    let transform = Transform3D::translation(3.0, 4.0, 0.0);
    let projection = Transform3D::ortho(0.0, 32.0, 32.0, 0.0, -1.0, 1.0);
    context.use_transform(transform);
    context.set_blender(Blender::ALPHA);
    context.set_projection(display, projection);
    context.hold_drawing(true);

    lock_region(&context, &mut backbuffer, 0, 0, 8, 8, PixelFormat::Any, LockFlags::WRITEONLY).unwrap();
    unlock_region(&context, &mut backbuffer);

    assert_eq!(context.transform(), transform);
    assert_eq!(context.blender(), Blender::ALPHA);
    assert_eq!(context.projection(display), projection);
    assert!(context.is_drawing_held());
    assert_eq!(context.target(), None);
    assert_eq!(context.current_display(), None);
}

#[test]
fn failed_backbuffer_read_destroys_the_proxy() {
    let (context, display) = single_display();
    let mut backbuffer = context.create_backbuffer(display);

    // The proxy's own readback fails.
    context.device().fail_next("glReadPixels", gl::OUT_OF_MEMORY);
    assert_eq!(lock_region(&context, &mut backbuffer, 0, 0, 8, 8, PixelFormat::Any, LockFlags::READWRITE),
               Err(LockError::Gl(GlError::new("glReadPixels", gl::OUT_OF_MEMORY))));
    assert!(!backbuffer.is_locked());
    assert!(backbuffer.lock_proxy().is_none());
    assert_eq!(context.device().texture_count(), 0);

    // The proxy reads back fine, then reading the backbuffer into it fails.
    context.device().fail_nth("glReadPixels", 1, gl::INVALID_OPERATION);
    assert_eq!(lock_region(&context, &mut backbuffer, 0, 0, 8, 8, PixelFormat::Any, LockFlags::READWRITE),
               Err(LockError::Gl(GlError::new("glReadPixels", gl::INVALID_OPERATION))));
    assert!(!backbuffer.is_locked());
    assert_eq!(context.device().texture_count(), 0);
    assert_eq!(context.device().framebuffer_count(), 0);
}

#[test]
fn proxy_creation_failure_is_reported() {
    let (context, display) = single_display();
    let mut backbuffer = context.create_backbuffer(display);

    context.device().fail_next("glTexImage2D", gl::OUT_OF_MEMORY);
    assert_eq!(lock_region(&context, &mut backbuffer, 0, 0, 8, 8, PixelFormat::Any, LockFlags::WRITEONLY),
               Err(LockError::BitmapCreation(GlError::new("glTexImage2D", gl::OUT_OF_MEMORY))));
    assert!(!backbuffer.is_locked());
}

#[test]
fn failed_proxy_draw_still_destroys_the_proxy() {
    let (context, display) = single_display();
    let mut backbuffer = context.create_backbuffer(display);
    let device = context.device();
    device.fill_backbuffer(display, BLUE);
    let transform = Transform3D::translation(3.0, 4.0, 0.0);
    let projection = Transform3D::ortho(0.0, 32.0, 32.0, 0.0, -1.0, 1.0);
    context.use_transform(transform);
    context.set_blender(Blender::ALPHA);
    context.set_projection(display, projection);
    context.hold_drawing(true);

    lock_region(&context, &mut backbuffer, 0, 0, 8, 8, PixelFormat::Any, LockFlags::READWRITE).unwrap();
    for row in 0..8 {
        backbuffer.locked_row_mut(row).unwrap().copy_from_slice(&solid_row(RED, 8));
    }
    device.fail_next("glDrawArrays", gl::OUT_OF_MEMORY);
    unlock_region(&context, &mut backbuffer);

    assert!(!backbuffer.is_locked());
    assert!(backbuffer.lock_proxy().is_none());
    assert_eq!(device.texture_count(), 0);
    assert_eq!(device.framebuffer_count(), 0);
    assert_eq!(device.backbuffer_pixel(display, 0, 0), Some(BLUE));

    assert_eq!(context.transform(), transform);
    assert_eq!(context.blender(), Blender::ALPHA);
    assert_eq!(context.projection(display), projection);
    assert!(context.is_drawing_held());
    assert_eq!(context.target(), None);
    assert_eq!(context.current_display(), None);

    // The backbuffer can be locked again straight away.
    lock_region(&context, &mut backbuffer, 0, 0, 8, 8, PixelFormat::Any, LockFlags::READONLY).unwrap();
    assert_eq!(backbuffer.locked_row(0).unwrap(), &solid_row(BLUE, 8)[..]);
    unlock_region(&context, &mut backbuffer);
}
