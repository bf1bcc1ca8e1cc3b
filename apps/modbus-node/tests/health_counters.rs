// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Validate liveness counters against scripted probe results.
// Author: Lukas Bower

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use modbus_node::health::{HealthMonitor, LivenessProbe, TaskFamily};
use modbus_node::timer::{SoftTimerService, TimerService};

/// Probe that replays a fixed script, then reports healthy.
struct ScriptedProbe {
    results: Arc<Mutex<VecDeque<bool>>>,
}

impl ScriptedProbe {
    fn new(results: &[bool]) -> Self {
        Self {
            results: Arc::new(Mutex::new(results.iter().copied().collect())),
        }
    }
}

impl LivenessProbe for ScriptedProbe {
    fn still_running(&mut self) -> bool {
        self.results.lock().unwrap().pop_front().unwrap_or(true)
    }
}

#[test]
fn counters_equal_number_of_failed_probes() {
    let echo_script = [true, false, false, true, false, true];
    let udp_script = [false, true, true, true, true, false];

    let mut monitor = HealthMonitor::new();
    monitor.register(TaskFamily::EchoServers, Box::new(ScriptedProbe::new(&echo_script)));
    monitor.register(
        TaskFamily::UdpSelectServers,
        Box::new(ScriptedProbe::new(&udp_script)),
    );
    let counters = monitor.counters();

    for _ in 0..echo_script.len() {
        monitor.check();
    }

    let failures = |script: &[bool]| script.iter().filter(|ok| !**ok).count() as u64;
    assert_eq!(counters.failures(TaskFamily::EchoServers), failures(&echo_script));
    assert_eq!(counters.failures(TaskFamily::UdpSelectServers), failures(&udp_script));
    assert_eq!(counters.checks(), 6);

    for disabled in [
        TaskFamily::SeparateEchoClients,
        TaskFamily::SingleEchoClients,
        TaskFamily::UdpEchoClients,
    ] {
        assert_eq!(counters.failures(disabled), 0, "{disabled} should stay untouched");
    }
}

#[test]
fn counters_never_decrease_once_probes_recover() {
    let mut monitor = HealthMonitor::new();
    monitor.register(
        TaskFamily::SeparateEchoClients,
        Box::new(ScriptedProbe::new(&[false, false])),
    );
    let counters = monitor.counters();

    let mut previous = 0;
    for _ in 0..10 {
        monitor.check();
        let now = counters.failures(TaskFamily::SeparateEchoClients);
        assert!(now >= previous);
        previous = now;
    }
    assert_eq!(previous, 2);
}

#[test]
fn timer_drives_monitor_once_per_period() {
    let mut monitor = HealthMonitor::new();
    monitor.register(TaskFamily::EchoServers, Box::new(|| false));
    let counters = monitor.counters();

    let mut timers = SoftTimerService::default();
    let handle = timers
        .create_periodic("Check", 15_000, true, Box::new(monitor))
        .unwrap();
    timers.start(handle).unwrap();

    timers.advance(14_000);
    assert_eq!(counters.failures(TaskFamily::EchoServers), 0);
    timers.advance(1_000);
    assert_eq!(counters.failures(TaskFamily::EchoServers), 1);
    timers.advance(30_000);
    assert_eq!(counters.failures(TaskFamily::EchoServers), 3);
    assert_eq!(counters.checks(), 3);
}
