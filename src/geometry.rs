// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Units and row-layout helpers shared by the lock and unlock paths.

use euclid::{Point2D, Rect, Size2D};

/// One hardware pixel.
///
/// Rectangles in this unit use the bitmap's logical orientation: row 0 is the
/// top row. GL calls take the bottom-up row index produced by `gl_y`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DevicePixel {}

/// One pixel of a GL surface, with rows counted from the bottom.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GlPixel {}

/// A rectangle of a bitmap, in logical (top-down) coordinates.
pub type PixelRect = Rect<i32, DevicePixel>;

/// A rectangle as GL sees it, origin at the bottom-left.
pub type GlRect = Rect<i32, GlPixel>;

pub fn pixel_rect(x: i32, y: i32, w: i32, h: i32) -> PixelRect {
    Rect::new(Point2D::new(x, y), Size2D::new(w, h))
}

/// Flips a logical rectangle of a surface `surface_height` rows tall into GL
/// coordinates.
pub fn to_gl_rect(surface_height: i32, rect: &PixelRect) -> GlRect {
    Rect::new(Point2D::new(rect.origin.x, gl_y(surface_height, rect.origin.y, rect.size.height)),
              Size2D::new(rect.size.width, rect.size.height))
}

/// Returns the GL pack/unpack alignment for rows of pixels of `pixel_size`
/// bytes. GL accepts 1, 2, 4 or 8.
pub fn pixel_alignment(pixel_size: usize) -> i32 {
    match pixel_size {
        1 | 2 | 4 | 8 => pixel_size as i32,
        3 => 1,
        // 32-bit float formats.
        16 => 4,
        _ => {
            warn!("no pixel alignment for {}-byte pixels, using 4", pixel_size);
            4
        }
    }
}

/// Bytes per row of a tightly packed region `w` pixels wide.
pub fn pitch(w: i32, pixel_size: usize) -> usize {
    w.max(0) as usize * pixel_size
}

/// Converts a top-down row origin into GL's bottom-up origin for a region of
/// height `h` inside a surface of height `surface_height`.
pub fn gl_y(surface_height: i32, y: i32, h: i32) -> i32 {
    surface_height - y - h
}

/// Rounds a row length up to a GL pixel-store alignment.
pub fn aligned_row(row_bytes: usize, alignment: i32) -> usize {
    let alignment = alignment.max(1) as usize;
    (row_bytes + alignment - 1) / alignment * alignment
}
