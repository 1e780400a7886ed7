// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Locking rectangular regions of GPU bitmaps for CPU access on OpenGL ES.

#[macro_use]
extern crate log;

pub mod bitmap;
pub mod config;
pub mod context;
pub mod convert;
pub mod device;
pub mod error;
pub mod format;
pub mod geometry;
pub mod lock;
pub mod texturegl;
pub mod unlock;

pub mod platform {
    pub mod gles;
    pub mod software;
}

pub use crate::lock::lock_region;
pub use crate::unlock::unlock_region;
