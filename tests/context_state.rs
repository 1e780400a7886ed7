// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod common;

use common::{context_with, single_display, RED};

use gles_lock::bitmap::{BitmapFlags, LockFlags};
use gles_lock::config::BackendConfig;
use gles_lock::context::DisplayConfig;
use gles_lock::device::{GpuDevice, PixelStore};
use gles_lock::error::{GlError, LockError};
use gles_lock::format::PixelFormat;
use gles_lock::{lock_region, unlock_region};

use gleam::gl;

const ALL_FLAGS: [LockFlags; 3] = [LockFlags::READONLY, LockFlags::WRITEONLY, LockFlags::READWRITE];

#[test]
fn texture_locks_keep_the_render_target_and_bindings() {
    let (context, display) = single_display();
    let mut target = context.create_bitmap(display, 8, 8, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    let mut bitmap = context.create_bitmap(display, 8, 8, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    context.set_target_bitmap(&mut target).unwrap();
    let device = context.device();
    device.set_pixel_store(PixelStore::PackAlignment, 1).unwrap();
    device.set_pixel_store(PixelStore::UnpackAlignment, 8).unwrap();

    let target_state = context.target();
    let framebuffer = device.bound_framebuffer();
    assert_eq!(target.extra.framebuffer, Some(framebuffer));

    for &flags in ALL_FLAGS.iter() {
        lock_region(&context, &mut bitmap, 1, 2, 3, 4, PixelFormat::Any, flags).unwrap();
        assert_eq!(context.target(), target_state);
        assert_eq!(device.bound_framebuffer(), framebuffer);
        assert_eq!(device.pixel_store(PixelStore::PackAlignment), 1);

        unlock_region(&context, &mut bitmap);
        assert_eq!(context.target(), target_state);
        assert_eq!(context.current_display(), Some(display));
        assert_eq!(device.bound_framebuffer(), framebuffer);
        assert_eq!(device.bound_texture(), 0);
        assert_eq!(device.pixel_store(PixelStore::UnpackAlignment), 8);
    }
}

#[test]
fn locking_the_render_target_itself_keeps_it() {
    let (context, display) = single_display();
    let mut bitmap = context.create_bitmap(display, 8, 8, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    context.set_target_bitmap(&mut bitmap).unwrap();
    let target_state = context.target();
    let framebuffer = context.device().bound_framebuffer();

    lock_region(&context, &mut bitmap, 0, 0, 8, 8, PixelFormat::Any, LockFlags::READWRITE).unwrap();
    bitmap.locked_row_mut(0).unwrap()[..4].copy_from_slice(&RED);
    unlock_region(&context, &mut bitmap);

    assert_eq!(context.target(), target_state);
    assert_eq!(context.device().bound_framebuffer(), framebuffer);
    assert_eq!(context.device().texture_pixel(bitmap.extra.texture, 0, 0), Some(RED));
}

#[test]
fn backbuffer_locks_keep_the_render_target_and_bindings() {
    let (context, display) = single_display();
    let mut target = context.create_bitmap(display, 8, 8, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    let mut backbuffer = context.create_backbuffer(display);
    context.set_target_bitmap(&mut target).unwrap();
    let device = context.device();
    let target_state = context.target();
    let framebuffer = device.bound_framebuffer();

    for &flags in ALL_FLAGS.iter() {
        lock_region(&context, &mut backbuffer, 4, 4, 16, 16, PixelFormat::Any, flags).unwrap();
        assert_eq!(context.target(), target_state);
        assert_eq!(device.bound_framebuffer(), framebuffer);
        assert_eq!(device.pixel_store(PixelStore::PackAlignment), 4);

        unlock_region(&context, &mut backbuffer);
        assert_eq!(context.target(), target_state);
        assert_eq!(context.current_display(), Some(display));
        assert_eq!(device.bound_framebuffer(), framebuffer);
        assert_eq!(device.texture_count(), 1);
    }
}

#[test]
fn failed_locks_keep_the_render_target_and_bindings() {
    let (context, display) = single_display();
    let mut target = context.create_bitmap(display, 8, 8, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    let mut bitmap = context.create_bitmap(display, 8, 8, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    context.set_target_bitmap(&mut target).unwrap();
    let device = context.device();
    let target_state = context.target();
    let framebuffer = device.bound_framebuffer();

    device.fail_next("glReadPixels", gl::INVALID_OPERATION);
    assert!(lock_region(&context, &mut bitmap, 0, 0, 8, 8, PixelFormat::Any, LockFlags::READONLY).is_err());
    assert_eq!(context.target(), target_state);
    assert_eq!(context.current_display(), Some(display));
    assert_eq!(device.bound_framebuffer(), framebuffer);
    assert_eq!(device.pixel_store(PixelStore::PackAlignment), 4);
}

#[test]
fn bitmaps_of_other_displays_switch_contexts_and_back() {
    let (context, displays) = context_with(BackendConfig::default(),
                                           &[DisplayConfig::new(16, 16), DisplayConfig::new(16, 16)]);
    let (first, second) = (displays[0], displays[1]);
    let mut bitmap = context.create_bitmap(second, 4, 4, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    let device = context.device();
    context.set_current_display(Some(second)).unwrap();
    device.set_pixel_store(PixelStore::PackAlignment, 1).unwrap();
    device.set_pixel_store(PixelStore::UnpackAlignment, 2).unwrap();
    context.set_current_display(Some(first)).unwrap();

    for &flags in ALL_FLAGS.iter() {
        let switches = device.context_switches();
        lock_region(&context, &mut bitmap, 0, 0, 4, 4, PixelFormat::Any, flags).unwrap();
        assert_eq!(context.current_display(), Some(first));
        assert_eq!(device.current(), Some(first));
        assert_eq!(device.pixel_store_of(second, PixelStore::PackAlignment), 1);
        assert_eq!(device.bound_framebuffer_of(second), 0);

        unlock_region(&context, &mut bitmap);
        assert_eq!(context.current_display(), Some(first));
        assert!(device.context_switches() > switches);
        assert_eq!(device.pixel_store_of(second, PixelStore::UnpackAlignment), 2);
        assert_eq!(device.bound_framebuffer_of(second), 0);
    }
}

#[test]
fn failed_context_switch_fails_the_lock() {
    let (context, displays) = context_with(BackendConfig::default(),
                                           &[DisplayConfig::new(16, 16), DisplayConfig::new(16, 16)]);
    let (first, second) = (displays[0], displays[1]);
    let mut bitmap = context.create_bitmap(second, 4, 4, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    context.set_current_display(Some(first)).unwrap();
    let device = context.device();

    for &flags in ALL_FLAGS.iter() {
        device.fail_next("eglMakeCurrent", gl::INVALID_OPERATION);
        assert_eq!(lock_region(&context, &mut bitmap, 0, 0, 4, 4, PixelFormat::Any, flags),
                   Err(LockError::Gl(GlError::new("eglMakeCurrent", gl::INVALID_OPERATION))));
        assert!(!bitmap.is_locked());
        assert!(bitmap.staging_buffer().is_none());
        assert_eq!(context.current_display(), Some(first));
        assert_eq!(device.current(), Some(first));
    }
}

#[test]
fn failure_after_a_context_switch_switches_back() {
    let (context, displays) = context_with(BackendConfig::default(),
                                           &[DisplayConfig::new(16, 16), DisplayConfig::new(16, 16)]);
    let (first, second) = (displays[0], displays[1]);
    let mut bitmap = context.create_bitmap(second, 4, 4, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    context.set_current_display(Some(first)).unwrap();
    let device = context.device();

    device.fail_next("glPixelStorei", gl::INVALID_VALUE);
    assert_eq!(lock_region(&context, &mut bitmap, 0, 0, 4, 4, PixelFormat::Any, LockFlags::READWRITE),
               Err(LockError::Gl(GlError::new("glPixelStorei", gl::INVALID_VALUE))));
    assert!(!bitmap.is_locked());
    assert_eq!(context.current_display(), Some(first));
    assert_eq!(device.current(), Some(first));
    assert_eq!(context.target(), None);
    assert_eq!(device.pixel_store_of(second, PixelStore::PackAlignment), 4);
    assert_eq!(device.bound_framebuffer_of(second), 0);
}

#[test]
fn failed_context_switch_on_unlock_still_releases_the_lock() {
    let (context, displays) = context_with(BackendConfig::default(),
                                           &[DisplayConfig::new(16, 16), DisplayConfig::new(16, 16)]);
    let (first, second) = (displays[0], displays[1]);
    let mut bitmap = context.create_bitmap(second, 4, 4, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    context.set_current_display(Some(first)).unwrap();
    let device = context.device();

    lock_region(&context, &mut bitmap, 0, 0, 4, 4, PixelFormat::Any, LockFlags::WRITEONLY).unwrap();
    bitmap.locked_row_mut(0).unwrap()[..4].copy_from_slice(&RED);
    device.fail_next("eglMakeCurrent", gl::INVALID_OPERATION);
    unlock_region(&context, &mut bitmap);

    assert!(!bitmap.is_locked());
    assert!(bitmap.staging_buffer().is_none());
    assert_eq!(context.current_display(), Some(first));
    assert_eq!(device.current(), Some(first));
    assert_eq!(device.texture_pixel(bitmap.extra.texture, 0, 0), Some([0, 0, 0, 0]));

    lock_region(&context, &mut bitmap, 0, 0, 4, 4, PixelFormat::Any, LockFlags::WRITEONLY).unwrap();
    bitmap.locked_row_mut(0).unwrap()[..4].copy_from_slice(&RED);
    unlock_region(&context, &mut bitmap);
    assert_eq!(device.texture_pixel(bitmap.extra.texture, 0, 0), Some(RED));
}

#[test]
fn shared_displays_do_not_switch_contexts() {
    let (context, displays) = context_with(BackendConfig::default(),
                                           &[DisplayConfig::new(16, 16).shared(),
                                             DisplayConfig::new(16, 16).shared()]);
    let (first, second) = (displays[0], displays[1]);
    let mut bitmap = context.create_bitmap(second, 4, 4, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    context.set_current_display(Some(first)).unwrap();
    let device = context.device();

    let switches = device.context_switches();
    lock_region(&context, &mut bitmap, 0, 0, 4, 4, PixelFormat::Any, LockFlags::WRITEONLY).unwrap();
    bitmap.locked_row_mut(3).unwrap()[..4].copy_from_slice(&RED);
    unlock_region(&context, &mut bitmap);

    assert_eq!(device.context_switches(), switches);
    assert_eq!(device.current(), Some(first));
    assert_eq!(device.texture_pixel(bitmap.extra.texture, 0, 3), Some(RED));
}

#[test]
fn locks_without_a_current_display_leave_none_current() {
    let (context, display) = single_display();
    let mut bitmap = context.create_bitmap(display, 4, 4, PixelFormat::Any, BitmapFlags::empty()).unwrap();
    let mut backbuffer = context.create_backbuffer(display);

    for &flags in ALL_FLAGS.iter() {
        lock_region(&context, &mut bitmap, 0, 0, 4, 4, PixelFormat::Any, flags).unwrap();
        unlock_region(&context, &mut bitmap);
        lock_region(&context, &mut backbuffer, 0, 0, 4, 4, PixelFormat::Any, flags).unwrap();
        unlock_region(&context, &mut backbuffer);

        assert_eq!(context.current_display(), None);
        assert_eq!(context.device().current(), None);
        assert_eq!(context.target(), None);
    }
}

#[test]
fn with_context_runs_with_the_display_current() {
    let (context, displays) = context_with(BackendConfig::default(),
                                           &[DisplayConfig::new(16, 16), DisplayConfig::new(16, 16)]);
    context.set_current_display(Some(displays[0])).unwrap();

    let inside = context.with_context(displays[1], || context.device().current()).unwrap();
    assert_eq!(inside, Some(displays[1]));
    assert_eq!(context.current_display(), Some(displays[0]));
}
