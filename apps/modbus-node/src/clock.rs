// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Wall-clock sources used to seed the random stream.
// Author: Lukas Bower

//! Wall-clock abstraction consumed once during bring-up.

/// Source of the current wall-clock time in whole seconds since the Unix epoch.
pub trait WallClock {
    /// Current time in seconds.
    fn now_secs(&self) -> u64;
}

/// Clock that always reports the same instant; used on targets without an RTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl WallClock for FixedClock {
    fn now_secs(&self) -> u64 {
        self.0
    }
}

/// Host system clock.
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[cfg(feature = "std")]
impl WallClock for SystemClock {
    fn now_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

/// Fold a wall-clock reading into the 32-bit seed width.
#[must_use]
pub const fn seed_from_secs(secs: u64) -> u32 {
    secs as u32
}
