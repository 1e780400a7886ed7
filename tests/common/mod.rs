// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![allow(dead_code)]

use gles_lock::config::BackendConfig;
use gles_lock::context::{DisplayConfig, DisplayId, GraphicsContext};
use gles_lock::platform::software::SoftwareDevice;

pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const GREEN: [u8; 4] = [0, 255, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];

pub fn context_with(config: BackendConfig, displays: &[DisplayConfig])
                    -> (GraphicsContext<SoftwareDevice>, Vec<DisplayId>) {
    let mut context = GraphicsContext::new(SoftwareDevice::new(), config);
    let ids = displays.iter().cloned().map(|display| context.add_display(display)).collect();
    (context, ids)
}

/// One 64x64 display, not current.
pub fn single_display() -> (GraphicsContext<SoftwareDevice>, DisplayId) {
    let (context, ids) = context_with(BackendConfig::default(), &[DisplayConfig::new(64, 64)]);
    (context, ids[0])
}

pub fn solid_row(color: [u8; 4], width: usize) -> Vec<u8> {
    color.iter().cloned().cycle().take(width * 4).collect()
}
