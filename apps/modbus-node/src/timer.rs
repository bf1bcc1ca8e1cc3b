// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Software timer service abstraction and a virtual-time implementation.
// Author: Lukas Bower

//! Timer service used for the periodic liveness check.
//!
//! [`SoftTimerService`] keeps its own millisecond clock. The owner advances it,
//! either from a tick source or directly from tests, and expired callbacks run
//! synchronously inside [`SoftTimerService::advance`].

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::error::TimerError;

/// Default number of timers a [`SoftTimerService`] accepts.
pub const DEFAULT_TIMER_SLOTS: usize = 4;

/// Opaque reference to a created timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(usize);

impl TimerHandle {
    /// Handle for slot `index`, for services implemented outside this module.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Slot index inside the owning service.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Work executed when a timer expires. Runs in the timer-service context and
/// must not block.
pub trait TimerCallback: Send {
    /// Called once per expiry.
    fn on_expiry(&mut self, timer: TimerHandle);
}

/// Creation and control of software timers.
pub trait TimerService {
    /// Create a stopped timer that fires `callback` every `period_ms`.
    fn create_periodic(
        &mut self,
        name: &'static str,
        period_ms: u64,
        auto_reload: bool,
        callback: Box<dyn TimerCallback>,
    ) -> Result<TimerHandle, TimerError>;

    /// Start (or restart) a timer; the first expiry is one period from now.
    fn start(&mut self, timer: TimerHandle) -> Result<(), TimerError>;
}

struct SoftTimer {
    name: &'static str,
    period_ms: u64,
    auto_reload: bool,
    deadline_ms: Option<u64>,
    fired: u64,
    callback: Box<dyn TimerCallback>,
}

/// Virtual-time timer service.
pub struct SoftTimerService {
    now_ms: u64,
    capacity: usize,
    timers: Vec<SoftTimer>,
}

impl SoftTimerService {
    /// Create a service with room for `capacity` timers.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            now_ms: 0,
            capacity,
            timers: Vec::with_capacity(capacity),
        }
    }

    /// Current virtual time in milliseconds.
    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Name the timer was created with.
    #[must_use]
    pub fn name(&self, timer: TimerHandle) -> Option<&'static str> {
        self.timers.get(timer.0).map(|slot| slot.name)
    }

    /// Whether the timer is armed.
    #[must_use]
    pub fn is_running(&self, timer: TimerHandle) -> bool {
        self.timers
            .get(timer.0)
            .is_some_and(|slot| slot.deadline_ms.is_some())
    }

    /// Expiries delivered for `timer` so far.
    #[must_use]
    pub fn fired(&self, timer: TimerHandle) -> u64 {
        self.timers.get(timer.0).map_or(0, |slot| slot.fired)
    }

    /// Move virtual time forward and run every expiry that falls due, in
    /// deadline order per timer. Returns the number of callbacks invoked.
    pub fn advance(&mut self, delta_ms: u64) -> usize {
        self.now_ms = self.now_ms.saturating_add(delta_ms);
        let now = self.now_ms;
        let mut invoked = 0;
        for (index, slot) in self.timers.iter_mut().enumerate() {
            while let Some(deadline) = slot.deadline_ms {
                if deadline > now {
                    break;
                }
                slot.deadline_ms = slot
                    .auto_reload
                    .then(|| deadline.saturating_add(slot.period_ms));
                slot.fired += 1;
                invoked += 1;
                slot.callback.on_expiry(TimerHandle(index));
            }
        }
        invoked
    }
}

impl Default for SoftTimerService {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TIMER_SLOTS)
    }
}

impl fmt::Debug for SoftTimerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftTimerService")
            .field("now_ms", &self.now_ms)
            .field("timers", &self.timers.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl TimerService for SoftTimerService {
    fn create_periodic(
        &mut self,
        name: &'static str,
        period_ms: u64,
        auto_reload: bool,
        callback: Box<dyn TimerCallback>,
    ) -> Result<TimerHandle, TimerError> {
        if period_ms == 0 {
            return Err(TimerError::InvalidPeriod);
        }
        if self.timers.len() >= self.capacity {
            return Err(TimerError::NoCapacity);
        }
        self.timers.push(SoftTimer {
            name,
            period_ms,
            auto_reload,
            deadline_ms: None,
            fired: 0,
            callback,
        });
        Ok(TimerHandle(self.timers.len() - 1))
    }

    fn start(&mut self, timer: TimerHandle) -> Result<(), TimerError> {
        let now = self.now_ms;
        let slot = self
            .timers
            .get_mut(timer.0)
            .ok_or(TimerError::UnknownHandle(timer.0))?;
        slot.deadline_ms = Some(now.saturating_add(slot.period_ms));
        log::debug!(
            target: "modbus_node::timer",
            "[timer] {} armed period={}ms reload={}",
            slot.name,
            slot.period_ms,
            slot.auto_reload
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Count(Arc<AtomicUsize>);

    impl TimerCallback for Count {
        fn on_expiry(&mut self, _timer: TimerHandle) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn rejects_zero_period_and_exhaustion() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut timers = SoftTimerService::with_capacity(1);
        assert_eq!(
            timers
                .create_periodic("zero", 0, true, Box::new(Count(hits.clone())))
                .unwrap_err(),
            TimerError::InvalidPeriod
        );
        timers
            .create_periodic("one", 10, true, Box::new(Count(hits.clone())))
            .unwrap();
        assert_eq!(
            timers
                .create_periodic("two", 10, true, Box::new(Count(hits)))
                .unwrap_err(),
            TimerError::NoCapacity
        );
    }

    #[test]
    fn stopped_timer_never_fires() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut timers = SoftTimerService::default();
        let handle = timers
            .create_periodic("idle", 5, true, Box::new(Count(hits.clone())))
            .unwrap();
        assert_eq!(timers.advance(100), 0);
        assert!(!timers.is_running(handle));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn auto_reload_catches_up_over_long_advance() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut timers = SoftTimerService::default();
        let handle = timers
            .create_periodic("Check", 15_000, true, Box::new(Count(hits.clone())))
            .unwrap();
        timers.start(handle).unwrap();
        assert_eq!(timers.advance(14_999), 0);
        assert_eq!(timers.advance(1), 1);
        assert_eq!(timers.advance(45_000), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert_eq!(timers.fired(handle), 4);
        assert_eq!(timers.name(handle), Some("Check"));
    }

    #[test]
    fn one_shot_disarms_after_expiry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut timers = SoftTimerService::default();
        let handle = timers
            .create_periodic("once", 10, false, Box::new(Count(hits.clone())))
            .unwrap();
        timers.start(handle).unwrap();
        assert_eq!(timers.advance(50), 1);
        assert!(!timers.is_running(handle));
    }

    #[test]
    fn start_rejects_unknown_handle() {
        let mut timers = SoftTimerService::default();
        assert_eq!(
            timers.start(TimerHandle(3)).unwrap_err(),
            TimerError::UnknownHandle(3)
        );
    }
}
