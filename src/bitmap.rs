// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! GPU bitmaps and their lock bookkeeping.

use crate::config::BackendConfig;
use crate::context::{DisplayId, GraphicsContext};
use crate::device::{FramebufferId, GpuDevice, TextureId, DEFAULT_FRAMEBUFFER};
use crate::error::{GlError, LockError};
use crate::format::{gl_format, real_pixel_format, PixelFormat};
use crate::geometry::PixelRect;
use crate::unlock::unlock_region;

use bitflags::bitflags;
use euclid::default::Size2D;
use gleam::gl;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BitmapId(pub u32);

bitflags! {
    /// How a locked region will be used. With neither bit set the lock is
    /// read-write.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct LockFlags: u32 {
        /// Never committed back on unlock.
        const READONLY = 1 << 0;
        /// Never read back from the GPU; the region starts uninitialized.
        const WRITEONLY = 1 << 1;
    }
}

impl LockFlags {
    pub const READWRITE: LockFlags = LockFlags::empty();
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct BitmapFlags: u32 {
        const VIDEO = 1 << 0;
        /// The texture contents need not survive a lost context.
        const NO_PRESERVE_TEXTURE = 1 << 1;
        /// Regenerate mipmaps whenever the texture changes.
        const MIPMAP = 1 << 2;
    }
}

/// Where a locked region's rows live in its staging buffer.
///
/// The pitch is signed. GL hands rows back bottom-up, so every region this
/// backend produces starts at the last row of the buffer and has a negative
/// pitch: logical row `r` sits at `offset + r * pitch`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LockedRegion {
    offset: usize,
    pub pitch: isize,
    pub format: PixelFormat,
    pub pixel_size: usize,
    pub width: i32,
    pub height: i32,
}

impl LockedRegion {
    /// A region over a buffer of `height` bottom-up rows of `pitch` bytes.
    pub fn flipped(format: PixelFormat, pitch: usize, width: i32, height: i32) -> LockedRegion {
        LockedRegion {
            offset: pitch * (height.max(1) as usize - 1),
            pitch: -(pitch as isize),
            format: format,
            pixel_size: format.pixel_size(),
            width: width,
            height: height,
        }
    }

    /// Offset of the start of the region (logical row 0) in the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn row_offset(&self, row: i32) -> usize {
        (self.offset as isize + row as isize * self.pitch) as usize
    }

    pub fn row_bytes(&self) -> usize {
        self.width.max(0) as usize * self.pixel_size
    }

    pub fn row<'a>(&self, buffer: &'a [u8], row: i32) -> Option<&'a [u8]> {
        if row < 0 || row >= self.height {
            return None;
        }
        let start = self.row_offset(row);
        buffer.get(start..start + self.row_bytes())
    }

    pub fn row_mut<'a>(&self, buffer: &'a mut [u8], row: i32) -> Option<&'a mut [u8]> {
        if row < 0 || row >= self.height {
            return None;
        }
        let start = self.row_offset(row);
        let end = start + self.row_bytes();
        buffer.get_mut(start..end)
    }
}

/// The rectangle, flags and region of an active lock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LockState {
    pub rect: PixelRect,
    pub flags: LockFlags,
    pub region: LockedRegion,
}

/// GL-specific bitmap data.
pub struct GlBitmapExtra {
    pub is_backbuffer: bool,
    /// Zero for the backbuffer.
    pub texture: TextureId,
    pub framebuffer: Option<FramebufferId>,
    pub(crate) lock_buffer: Option<Vec<u8>>,
    pub(crate) lock_proxy: Option<Box<Bitmap>>,
}

pub struct Bitmap {
    pub id: BitmapId,
    pub display: DisplayId,
    pub size: Size2D<i32>,
    pub format: PixelFormat,
    pub flags: BitmapFlags,
    pub parent: Option<BitmapId>,
    pub extra: GlBitmapExtra,
    pub(crate) lock: Option<LockState>,
}

impl Bitmap {
    pub fn is_backbuffer(&self) -> bool {
        self.extra.is_backbuffer
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub fn locked_region(&self) -> Option<LockedRegion> {
        self.lock.map(|lock| lock.region)
    }

    /// The bitmap's own staging buffer. A backbuffer locked through a proxy
    /// has none; its pixels live in the proxy's.
    pub fn staging_buffer(&self) -> Option<&[u8]> {
        self.extra.lock_buffer.as_deref()
    }

    pub fn lock_proxy(&self) -> Option<&Bitmap> {
        self.extra.lock_proxy.as_deref()
    }

    fn locked_data(&self) -> Option<&[u8]> {
        match self.extra.lock_proxy {
            Some(ref proxy) => proxy.extra.lock_buffer.as_deref(),
            None => self.extra.lock_buffer.as_deref(),
        }
    }

    fn locked_data_mut(&mut self) -> Option<&mut [u8]> {
        match self.extra.lock_proxy {
            Some(ref mut proxy) => proxy.extra.lock_buffer.as_deref_mut(),
            None => self.extra.lock_buffer.as_deref_mut(),
        }
    }

    /// Row `row` (top row first) of the locked region.
    pub fn locked_row(&self, row: i32) -> Option<&[u8]> {
        let region = self.locked_region()?;
        region.row(self.locked_data()?, row)
    }

    pub fn locked_row_mut(&mut self, row: i32) -> Option<&mut [u8]> {
        let region = self.locked_region()?;
        region.row_mut(self.locked_data_mut()?, row)
    }
}

/// Allocates a zeroed staging buffer, reporting failure instead of aborting.
pub(crate) fn allocate_staging(config: &BackendConfig, bytes: usize) -> Result<Vec<u8>, LockError> {
    if config.staging_limit.map_or(false, |limit| bytes > limit) {
        error!("Out of memory: {} byte staging buffer exceeds the limit", bytes);
        return Err(LockError::OutOfMemory { bytes: bytes });
    }
    let mut buffer = Vec::new();
    if buffer.try_reserve_exact(bytes).is_err() {
        error!("Out of memory: {} byte staging buffer", bytes);
        return Err(LockError::OutOfMemory { bytes: bytes });
    }
    buffer.resize(bytes, 0);
    Ok(buffer)
}

impl<D: GpuDevice> GraphicsContext<D> {
    /// Creates a texture-backed bitmap owned by `display`.
    pub fn create_bitmap(&self,
                         display: DisplayId,
                         width: i32,
                         height: i32,
                         format: PixelFormat,
                         flags: BitmapFlags)
                         -> Result<Bitmap, GlError> {
        let format = if format == PixelFormat::Any { self.display(display).format } else { format };
        let real_format = real_pixel_format(&self.display(display).extensions, format);
        let description = match gl_format(real_format) {
            Some(description) => description,
            None => return Err(GlError::new("glTexImage2D", gl::INVALID_ENUM)),
        };

        let texture = {
            let _context = self.ensure_context(display)?;
            self.device().create_texture(Size2D::new(width, height), description)?
        };
        debug!("created {}x{} {} bitmap (texture {})", width, height, real_format.name(), texture);

        Ok(Bitmap {
            id: self.next_bitmap_id(),
            display: display,
            size: Size2D::new(width, height),
            format: format,
            flags: flags,
            parent: None,
            extra: GlBitmapExtra {
                is_backbuffer: false,
                texture: texture,
                framebuffer: None,
                lock_buffer: None,
                lock_proxy: None,
            },
            lock: None,
        })
    }

    /// The bitmap standing for `display`'s default framebuffer.
    pub fn create_backbuffer(&self, display: DisplayId) -> Bitmap {
        let display = self.display(display);
        Bitmap {
            id: self.next_bitmap_id(),
            display: display.id,
            size: display.size,
            format: display.format,
            flags: BitmapFlags::VIDEO,
            parent: None,
            extra: GlBitmapExtra {
                is_backbuffer: true,
                texture: 0,
                framebuffer: Some(DEFAULT_FRAMEBUFFER),
                lock_buffer: None,
                lock_proxy: None,
            },
            lock: None,
        }
    }

    /// Releases a bitmap's GL objects, committing any outstanding lock first.
    pub fn destroy_bitmap(&self, mut bitmap: Bitmap) {
        if bitmap.is_locked() {
            unlock_region(self, &mut bitmap);
        }
        self.forget_target(bitmap.id);
        if bitmap.is_backbuffer() {
            return;
        }

        let _context = match self.ensure_context(bitmap.display) {
            Ok(guard) => guard,
            Err(err) => {
                error!("cannot destroy bitmap {:?}: {}", bitmap.id, err);
                return;
            }
        };
        if let Some(framebuffer) = bitmap.extra.framebuffer.take() {
            self.device().delete_framebuffer(framebuffer);
        }
        self.device().delete_texture(bitmap.extra.texture);
    }
}
