// Copyright 2013 The Servo Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Backend-wide settings and driver quirks.

#[derive(Clone, Debug, PartialEq)]
pub struct BackendConfig {
    /// Issue a `glFlush` after handing out a write-only texture lock. Some
    /// embedded drivers (the Raspberry Pi's among them) race otherwise.
    pub flush_after_write_only_lock: bool,

    /// Remember the bound framebuffer instead of asking the driver for it.
    pub track_framebuffer_binding: bool,

    /// The largest staging buffer a lock may allocate, in bytes.
    pub staging_limit: Option<usize>,
}

impl Default for BackendConfig {
    #[cfg(target_os = "android")]
    fn default() -> BackendConfig {
        BackendConfig {
            flush_after_write_only_lock: false,
            track_framebuffer_binding: true,
            staging_limit: None,
        }
    }

    #[cfg(not(target_os = "android"))]
    fn default() -> BackendConfig {
        BackendConfig {
            flush_after_write_only_lock: false,
            track_framebuffer_binding: false,
            staging_limit: None,
        }
    }
}

impl BackendConfig {
    pub fn with_staging_limit(mut self, limit: usize) -> BackendConfig {
        self.staging_limit = Some(limit);
        self
    }

    pub fn with_write_only_flush(mut self) -> BackendConfig {
        self.flush_after_write_only_lock = true;
        self
    }
}
