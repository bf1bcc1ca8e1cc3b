// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Compile-time feature manifest and guard rails for modbus-node builds.
// Author: Lukas Bower

//! Compile-time feature manifest and guard rails for modbus-node builds.

use core::fmt::Write;

use heapless::String as HeaplessString;

#[cfg(all(feature = "kernel", feature = "std"))]
compile_error!("features `kernel` and `std` are mutually exclusive; build kernels with --no-default-features");

#[cfg(all(feature = "kernel", feature = "host-stack"))]
compile_error!("feature `host-stack` is host-only and cannot be combined with `kernel`");

/// Built for capability hardware.
pub const CHERI: bool = cfg!(feature = "cheri");
/// Applications may install exception handlers.
pub const APP_EXCEPTION_HANDLERS: bool = cfg!(feature = "app-exception-handlers");
/// Compartmentalised build.
pub const CHERI_COMPARTMENTS: bool = cfg!(feature = "cheri-compartments");
/// smoltcp host stack compiled in.
pub const HOST_STACK: bool = cfg!(feature = "host-stack");

/// One-line summary of the enabled features for the boot banner.
#[must_use]
pub fn summary() -> HeaplessString<96> {
    let mut line = HeaplessString::new();
    let _ = write!(
        line,
        "cheri={} app-handlers={} compartments={} host-stack={} debug={}",
        CHERI,
        APP_EXCEPTION_HANDLERS,
        CHERI_COMPARTMENTS,
        HOST_STACK,
        cfg!(debug_assertions)
    );
    line
}
