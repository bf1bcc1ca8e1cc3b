// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Periodic liveness probing of long-running network task families.
// Author: Lukas Bower

//! Report-only liveness monitor.
//!
//! Each registered task family is probed once per timer period. A failing probe
//! bumps that family's counter; nothing is restarted and nobody is paged.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::{self, Write};
use core::sync::atomic::Ordering;

use heapless::{String as HeaplessString, Vec as HeaplessVec};
use portable_atomic::AtomicU64;

use crate::timer::{TimerCallback, TimerHandle};

const RENDER_CAP: usize = 256;
const FAMILY_COUNT: usize = TaskFamily::ALL.len();
/// Decimal digits in `u64::MAX`.
const U64_DIGITS: usize = 20;

/// Longest line [`HealthSnapshot::render`] can produce.
const fn render_worst_case() -> usize {
    let mut len = "checks=".len() + U64_DIGITS;
    let mut i = 0;
    while i < FAMILY_COUNT {
        len += " =".len() + TaskFamily::ALL[i].label().len() + U64_DIGITS;
        i += 1;
    }
    len
}

static_assertions::const_assert!(render_worst_case() <= RENDER_CAP);

/// Families of long-running network tasks the node can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskFamily {
    /// TCP echo clients that each run in their own task.
    SeparateEchoClients,
    /// TCP echo clients multiplexed onto a single task.
    SingleEchoClients,
    /// TCP echo servers.
    EchoServers,
    /// UDP echo clients.
    UdpEchoClients,
    /// UDP servers driven by `select`.
    UdpSelectServers,
}

impl TaskFamily {
    /// Every family, in counter order.
    pub const ALL: [TaskFamily; 5] = [
        TaskFamily::SeparateEchoClients,
        TaskFamily::SingleEchoClients,
        TaskFamily::EchoServers,
        TaskFamily::UdpEchoClients,
        TaskFamily::UdpSelectServers,
    ];

    const fn index(self) -> usize {
        match self {
            TaskFamily::SeparateEchoClients => 0,
            TaskFamily::SingleEchoClients => 1,
            TaskFamily::EchoServers => 2,
            TaskFamily::UdpEchoClients => 3,
            TaskFamily::UdpSelectServers => 4,
        }
    }

    /// Short label used in log lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            TaskFamily::SeparateEchoClients => "echo-clients-separate",
            TaskFamily::SingleEchoClients => "echo-clients-single",
            TaskFamily::EchoServers => "echo-servers",
            TaskFamily::UdpEchoClients => "udp-echo-clients",
            TaskFamily::UdpSelectServers => "udp-select",
        }
    }
}

impl fmt::Display for TaskFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Liveness query supplied by a task family.
pub trait LivenessProbe: Send {
    /// Return `true` while every task in the family is still making progress.
    fn still_running(&mut self) -> bool;
}

impl<F> LivenessProbe for F
where
    F: FnMut() -> bool + Send,
{
    fn still_running(&mut self) -> bool {
        self()
    }
}

/// Per-family failure counters. Only the [`HealthMonitor`] writes them.
#[derive(Debug, Default)]
pub struct HealthCounters {
    failures: [AtomicU64; FAMILY_COUNT],
    checks: AtomicU64,
}

impl HealthCounters {
    /// Failures recorded for `family` so far.
    #[must_use]
    pub fn failures(&self, family: TaskFamily) -> u64 {
        self.failures[family.index()].load(Ordering::Acquire)
    }

    /// Number of completed health checks.
    #[must_use]
    pub fn checks(&self) -> u64 {
        self.checks.load(Ordering::Acquire)
    }

    /// Capture every counter at once.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        let mut failures = [0u64; FAMILY_COUNT];
        for family in TaskFamily::ALL {
            failures[family.index()] = self.failures(family);
        }
        HealthSnapshot {
            failures,
            checks: self.checks(),
        }
    }

    fn record_failure(&self, family: TaskFamily) -> u64 {
        self.failures[family.index()].fetch_add(1, Ordering::AcqRel) + 1
    }

    fn record_check(&self) {
        self.checks.fetch_add(1, Ordering::AcqRel);
    }
}

/// Point-in-time copy of [`HealthCounters`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    failures: [u64; FAMILY_COUNT],
    /// Completed checks.
    pub checks: u64,
}

impl HealthSnapshot {
    /// Failures recorded for `family`.
    #[must_use]
    pub fn failures(&self, family: TaskFamily) -> u64 {
        self.failures[family.index()]
    }

    /// Render the counters as a single bounded log line.
    #[must_use]
    pub fn render(&self) -> HeaplessString<RENDER_CAP> {
        let mut line = HeaplessString::new();
        let _ = write!(line, "checks={}", self.checks);
        for family in TaskFamily::ALL {
            let _ = write!(line, " {}={}", family.label(), self.failures(family));
        }
        line
    }
}

/// Families that failed during one check.
pub type HealthReport = HeaplessVec<TaskFamily, FAMILY_COUNT>;

/// Timer-driven probe runner.
pub struct HealthMonitor {
    probes: Vec<(TaskFamily, Box<dyn LivenessProbe>)>,
    counters: Arc<HealthCounters>,
}

impl HealthMonitor {
    /// Create a monitor with no probes registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            probes: Vec::new(),
            counters: Arc::new(HealthCounters::default()),
        }
    }

    /// Register the probe for `family`. A family registered twice is probed twice.
    pub fn register(&mut self, family: TaskFamily, probe: Box<dyn LivenessProbe>) {
        self.probes.push((family, probe));
    }

    /// Read-only handle to the counters for diagnostics.
    #[must_use]
    pub fn counters(&self) -> Arc<HealthCounters> {
        Arc::clone(&self.counters)
    }

    /// Families with at least one registered probe.
    pub fn monitored(&self) -> impl Iterator<Item = TaskFamily> + '_ {
        self.probes.iter().map(|(family, _)| *family)
    }

    /// Probe every registered family once.
    pub fn check(&mut self) -> HealthReport {
        let mut failed = HealthReport::new();
        for (family, probe) in self.probes.iter_mut() {
            if probe.still_running() {
                continue;
            }
            let total = self.counters.record_failure(*family);
            log::warn!(
                target: "modbus_node::health",
                "[health] {} not running (failures={total})",
                family.label()
            );
            if !failed.contains(family) {
                let _ = failed.push(*family);
            }
        }
        self.counters.record_check();
        failed
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("probes", &self.probes.len())
            .field("counters", &self.counters.snapshot())
            .finish()
    }
}

impl TimerCallback for HealthMonitor {
    fn on_expiry(&mut self, _timer: TimerHandle) {
        let _ = self.check();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_probe_increments_only_its_family() {
        let mut monitor = HealthMonitor::new();
        monitor.register(TaskFamily::EchoServers, Box::new(|| false));
        monitor.register(TaskFamily::UdpSelectServers, Box::new(|| true));
        let counters = monitor.counters();

        let report = monitor.check();
        assert_eq!(report.as_slice(), &[TaskFamily::EchoServers]);
        assert_eq!(counters.failures(TaskFamily::EchoServers), 1);
        assert_eq!(counters.failures(TaskFamily::UdpSelectServers), 0);
        assert_eq!(counters.checks(), 1);
    }

    #[test]
    fn render_lists_every_family() {
        let mut monitor = HealthMonitor::new();
        monitor.register(TaskFamily::SeparateEchoClients, Box::new(|| false));
        monitor.check();
        let line = monitor.counters().snapshot().render();
        assert_eq!(
            line.as_str(),
            "checks=1 echo-clients-separate=1 echo-clients-single=0 echo-servers=0 udp-echo-clients=0 udp-select=0"
        );
    }

    #[test]
    fn render_keeps_saturated_counters_intact() {
        let snapshot = HealthSnapshot {
            failures: [u64::MAX; FAMILY_COUNT],
            checks: u64::MAX,
        };
        let line = snapshot.render();
        assert_eq!(line.len(), render_worst_case());
        assert!(line.ends_with(" udp-select=18446744073709551615"));
    }
}
