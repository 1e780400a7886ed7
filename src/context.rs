// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Displays and the per-thread rendering context.
//!
//! A `GraphicsContext` is what the rest of the backend calls "the current
//! context": which display is current, which bitmap is the render target, and
//! the drawing state used to composite bitmaps. Everything that depends on it
//! takes it explicitly.

use crate::bitmap::{Bitmap, BitmapId};
use crate::config::BackendConfig;
use crate::device::{Blender, FramebufferId, GpuDevice, DEFAULT_FRAMEBUFFER};
use crate::error::{GlError, LockError};
use crate::format::PixelFormat;

use euclid::default::{Size2D, Transform3D};
use gleam::gl;
use std::cell::Cell;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayId(pub u32);

/// Optional GL features a display's context reported at creation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Extensions {
    /// `OES_framebuffer_object` or core framebuffer objects.
    pub framebuffer_object: bool,
    /// `EXT_texture_format_BGRA8888`.
    pub bgra: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DisplayConfig {
    pub size: Size2D<i32>,
    pub format: PixelFormat,
    /// Whether GL objects created under this display's context are visible
    /// from every other context.
    pub shared: bool,
    pub extensions: Extensions,
}

impl DisplayConfig {
    pub fn new(width: i32, height: i32) -> DisplayConfig {
        DisplayConfig {
            size: Size2D::new(width, height),
            format: PixelFormat::Abgr8888Le,
            shared: false,
            extensions: Extensions {
                framebuffer_object: true,
                bgra: false,
            },
        }
    }

    pub fn shared(mut self) -> DisplayConfig {
        self.shared = true;
        self
    }

    pub fn without_framebuffer_objects(mut self) -> DisplayConfig {
        self.extensions.framebuffer_object = false;
        self
    }
}

pub struct Display {
    pub id: DisplayId,
    pub size: Size2D<i32>,
    pub format: PixelFormat,
    pub shared: bool,
    pub extensions: Extensions,
    projection: Cell<Transform3D<f32>>,
}

/// The projection that maps display pixels (top-left origin) to clip space.
pub fn default_projection(size: Size2D<i32>) -> Transform3D<f32> {
    Transform3D::ortho(0.0, size.width as f32, size.height as f32, 0.0, -1.0, 1.0)
}

/// The bitmap GL is currently rendering into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderTarget {
    pub bitmap: BitmapId,
    pub display: DisplayId,
    pub framebuffer: FramebufferId,
}

/// A snapshot of the drawing state, restored after compositing a bitmap.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawState {
    pub display: Option<DisplayId>,
    pub framebuffer: FramebufferId,
    pub target: Option<RenderTarget>,
    pub transform: Transform3D<f32>,
    pub blender: Blender,
}

pub struct GraphicsContext<D: GpuDevice> {
    device: D,
    config: BackendConfig,
    displays: Vec<Display>,
    current: Cell<Option<DisplayId>>,
    target: Cell<Option<RenderTarget>>,
    transform: Cell<Transform3D<f32>>,
    blender: Cell<Blender>,
    drawing_held: Cell<bool>,
    next_bitmap: Cell<u32>,
}

impl<D: GpuDevice> GraphicsContext<D> {
    pub fn new(device: D, config: BackendConfig) -> GraphicsContext<D> {
        GraphicsContext {
            device: device,
            config: config,
            displays: vec!(),
            current: Cell::new(None),
            target: Cell::new(None),
            transform: Cell::new(Transform3D::identity()),
            blender: Cell::new(Blender::default()),
            drawing_held: Cell::new(false),
            next_bitmap: Cell::new(1),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn add_display(&mut self, config: DisplayConfig) -> DisplayId {
        let id = DisplayId(self.displays.len() as u32);
        self.device.register_display(id, config.size, config.format);
        self.displays.push(Display {
            id: id,
            size: config.size,
            format: config.format,
            shared: config.shared,
            extensions: config.extensions,
            projection: Cell::new(default_projection(config.size)),
        });
        id
    }

    pub fn display(&self, id: DisplayId) -> &Display {
        &self.displays[id.0 as usize]
    }

    pub(crate) fn next_bitmap_id(&self) -> BitmapId {
        let id = self.next_bitmap.get();
        self.next_bitmap.set(id + 1);
        BitmapId(id)
    }

    pub fn current_display(&self) -> Option<DisplayId> {
        self.current.get()
    }

    /// Makes a display's context current without touching the render target.
    pub fn set_current_display(&self, display: Option<DisplayId>) -> Result<(), GlError> {
        self.device.make_current(display)?;
        self.current.set(display);
        Ok(())
    }

    /// Makes `display`'s context usable for the lifetime of the returned guard.
    ///
    /// Nothing is switched if `display` is already current or if its objects
    /// are shared with every context. Whatever was current before is current
    /// again once the guard is dropped.
    pub fn ensure_context(&self, display: DisplayId) -> Result<ContextGuard<D>, GlError> {
        let previous = self.current.get();
        let switch = match previous {
            None => true,
            Some(current) => current != display && !self.display(display).shared,
        };
        if switch {
            debug!("switching context {:?} -> {:?}", previous, display);
            self.set_current_display(Some(display))?;
        }
        Ok(ContextGuard {
            context: self,
            previous: previous,
        })
    }

    /// Runs `body` with `display`'s GL objects reachable.
    pub fn with_context<R, F: FnOnce() -> R>(&self, display: DisplayId, body: F) -> Result<R, GlError> {
        let _guard = self.ensure_context(display)?;
        Ok(body())
    }

    pub fn target(&self) -> Option<RenderTarget> {
        self.target.get()
    }

    /// Makes `bitmap` the render target: its display becomes current and its
    /// framebuffer is bound.
    pub fn set_target_bitmap(&self, bitmap: &mut Bitmap) -> Result<(), LockError> {
        if self.current.get() != Some(bitmap.display) {
            self.set_current_display(Some(bitmap.display))?;
        }
        let framebuffer = if bitmap.is_backbuffer() {
            DEFAULT_FRAMEBUFFER
        } else {
            match self.setup_framebuffer(bitmap) {
                Some(framebuffer) => framebuffer,
                None => return Err(LockError::NoFramebuffer),
            }
        };
        self.device.bind_framebuffer(framebuffer)?;
        self.target.set(Some(RenderTarget {
            bitmap: bitmap.id,
            display: bitmap.display,
            framebuffer: framebuffer,
        }));
        Ok(())
    }

    /// Gives a texture bitmap a framebuffer object, creating it on first use,
    /// and records the bitmap as the render target. The caller binds it.
    pub(crate) fn setup_framebuffer(&self, bitmap: &mut Bitmap) -> Option<FramebufferId> {
        let framebuffer = match bitmap.extra.framebuffer {
            Some(framebuffer) => framebuffer,
            None => {
                if !self.display(bitmap.display).extensions.framebuffer_object {
                    return None;
                }
                match self.device.create_framebuffer(bitmap.extra.texture) {
                    Ok(framebuffer) => {
                        bitmap.extra.framebuffer = Some(framebuffer);
                        framebuffer
                    }
                    Err(err) => {
                        error!("creating framebuffer for texture {}: {}", bitmap.extra.texture, err);
                        return None;
                    }
                }
            }
        };
        self.target.set(Some(RenderTarget {
            bitmap: bitmap.id,
            display: bitmap.display,
            framebuffer: framebuffer,
        }));
        Some(framebuffer)
    }

    /// Hands the render target back to whoever had it before `setup_framebuffer`.
    pub(crate) fn restore_target(&self, old_target: Option<RenderTarget>, bitmap: BitmapId) {
        match old_target {
            None => {
                // Nothing was being rendered to; release the context.
                self.target.set(None);
                if let Err(err) = self.set_current_display(None) {
                    error!("releasing context: {}", err);
                }
            }
            Some(target) if target.bitmap == bitmap => {}
            Some(target) => self.target.set(Some(target)),
        }
    }

    /// Forgets the render target if it is `bitmap`.
    pub(crate) fn forget_target(&self, bitmap: BitmapId) {
        if self.target.get().map(|target| target.bitmap) == Some(bitmap) {
            self.target.set(None);
        }
    }

    pub fn transform(&self) -> Transform3D<f32> {
        self.transform.get()
    }

    pub fn use_transform(&self, transform: Transform3D<f32>) {
        self.transform.set(transform);
    }

    pub fn blender(&self) -> Blender {
        self.blender.get()
    }

    pub fn set_blender(&self, blender: Blender) {
        self.blender.set(blender);
    }

    /// Projections are per display.
    pub fn projection(&self, display: DisplayId) -> Transform3D<f32> {
        self.display(display).projection.get()
    }

    pub fn set_projection(&self, display: DisplayId, projection: Transform3D<f32>) {
        self.display(display).projection.set(projection);
    }

    pub fn is_drawing_held(&self) -> bool {
        self.drawing_held.get()
    }

    /// Bitmaps are drawn as soon as they are submitted; holding only changes
    /// what `is_drawing_held` reports to code that batches on top of this.
    pub fn hold_drawing(&self, hold: bool) {
        self.drawing_held.set(hold);
    }

    pub fn store_state(&self) -> DrawState {
        DrawState {
            display: self.current.get(),
            framebuffer: self.device.bound_framebuffer(),
            target: self.target.get(),
            transform: self.transform.get(),
            blender: self.blender.get(),
        }
    }

    pub fn restore_state(&self, state: DrawState) {
        if self.current.get() != state.display {
            if let Err(err) = self.set_current_display(state.display) {
                error!("restoring context {:?}: {}", state.display, err);
            }
        }
        if state.display.is_some() && self.device.bound_framebuffer() != state.framebuffer {
            if let Err(err) = self.device.bind_framebuffer(state.framebuffer) {
                error!("restoring framebuffer {}: {}", state.framebuffer, err);
            }
        }
        self.target.set(state.target);
        self.transform.set(state.transform);
        self.blender.set(state.blender);
    }

    /// Draws `bitmap` with its top-left corner at `(x, y)` on the render
    /// target, through the current transform, projection and blender.
    pub fn draw_bitmap(&self, bitmap: &Bitmap, x: f32, y: f32) -> Result<(), GlError> {
        let target = match self.target.get() {
            Some(target) => target,
            None => return Err(GlError::new("glDrawArrays", gl::INVALID_FRAMEBUFFER_OPERATION)),
        };
        let transform = Transform3D::translation(x, y, 0.0).then(&self.transform.get());
        let projection = self.projection(target.display);
        self.device.draw_texture(bitmap.extra.texture,
                                 bitmap.size,
                                 &transform,
                                 &projection,
                                 self.blender.get())
    }
}

/// Restores the previously current display when dropped.
pub struct ContextGuard<'a, D: GpuDevice> {
    context: &'a GraphicsContext<D>,
    previous: Option<DisplayId>,
}

impl<'a, D: GpuDevice> Drop for ContextGuard<'a, D> {
    fn drop(&mut self) {
        if self.context.current.get() != self.previous {
            if let Err(err) = self.context.set_current_display(self.previous) {
                error!("restoring context {:?}: {}", self.previous, err);
            }
        }
    }
}
