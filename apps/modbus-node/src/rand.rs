// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Linear congruential pseudo-random source shared by diagnostics and TCP hooks.
// Author: Lukas Bower

//! Process-wide pseudo-random source.
//!
//! The generator is a plain 32-bit LCG. It is fine for jittering diagnostics
//! and for the demo sequence-number policy, and unsuitable for anything that
//! needs unpredictability.

use core::sync::atomic::Ordering;

use portable_atomic::AtomicU32;

const LCG_MULTIPLIER: u32 = 0x015a_4e35;
const LCG_INCREMENT: u32 = 1;

/// Advance an LCG state by one step.
#[must_use]
pub const fn lcg_step(state: u32) -> u32 {
    state.wrapping_mul(LCG_MULTIPLIER).wrapping_add(LCG_INCREMENT)
}

/// Shared pseudo-random stream, seeded exactly once at construction.
#[derive(Debug)]
pub struct RandomSource {
    seed: u32,
    state: AtomicU32,
}

impl RandomSource {
    /// Create a source whose stream starts from `seed`.
    #[must_use]
    pub const fn seeded(seed: u32) -> Self {
        Self {
            seed,
            state: AtomicU32::new(seed),
        }
    }

    /// Seed value the stream was created with.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    /// Draw the next 32-bit value and advance the shared stream.
    ///
    /// Successive draws never repeat back-to-back: the update has no fixed point.
    pub fn next_u32(&self) -> u32 {
        let previous = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                Some(lcg_step(state))
            })
            .unwrap_or_else(|state| state);
        lcg_step(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_follows_lcg_recurrence() {
        let source = RandomSource::seeded(1);
        assert_eq!(source.next_u32(), 0x015a_4e36);
        assert_eq!(source.next_u32(), lcg_step(0x015a_4e36));
        assert_eq!(source.seed(), 1);
    }

    #[test]
    fn zero_seed_still_advances() {
        let source = RandomSource::seeded(0);
        let first = source.next_u32();
        let second = source.next_u32();
        assert_eq!(first, 1);
        assert_eq!(second, 0x015a_4e36);
    }

    #[test]
    fn consecutive_draws_differ() {
        let source = RandomSource::seeded(0xdead_beef);
        let mut previous = source.next_u32();
        for _ in 0..1024 {
            let next = source.next_u32();
            assert_ne!(previous, next);
            previous = next;
        }
    }
}
