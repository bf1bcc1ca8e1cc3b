// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: End-to-end bring-up against the loopback stack in virtual time.
// Author: Lukas Bower

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use modbus_node::clock::FixedClock;
use modbus_node::config::{NodeConfig, ServerTaskConfig};
use modbus_node::error::SpawnError;
use modbus_node::health::TaskFamily;
use modbus_node::isn::ConnectionTuple;
use modbus_node::names::NameMatch;
use modbus_node::net::{EffectiveAddressing, LoopbackStack, NetworkEvent};
use modbus_node::rand::lcg_step;
use modbus_node::task::{TaskHandle, TaskSpawner};
use modbus_node::timer::SoftTimerService;
use modbus_node::BringupSequencer;

const BOOT_SECS: u64 = 1_718_000_000;

#[derive(Clone, Default)]
struct CountingSpawner(Arc<AtomicUsize>);

impl TaskSpawner for CountingSpawner {
    fn spawn_protocol_server(&mut self, task: &ServerTaskConfig) -> Result<TaskHandle, SpawnError> {
        let id = self.0.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Ok(TaskHandle {
            id,
            name: task.name,
        })
    }
}

fn tuple(source_port: u16, destination: Ipv4Addr) -> ConnectionTuple {
    ConnectionTuple {
        source: Ipv4Addr::new(10, 0, 2, 15),
        source_port,
        destination,
        destination_port: 502,
    }
}

#[test]
fn bringup_then_link_and_health_in_virtual_time() {
    let spawns = CountingSpawner::default();
    let echo_alive = Arc::new(AtomicBool::new(true));
    let probe_flag = Arc::clone(&echo_alive);

    let clock = FixedClock(BOOT_SECS);
    let mut stack = LoopbackStack::new();
    let mut timers = SoftTimerService::default();
    let runtime = BringupSequencer::new(
        NodeConfig::default(),
        &clock,
        &mut stack,
        &mut timers,
        Box::new(spawns.clone()),
    )
    .with_probe(
        TaskFamily::EchoServers,
        Box::new(move || probe_flag.load(Ordering::SeqCst)),
    )
    .with_probe(TaskFamily::UdpSelectServers, Box::new(|| true))
    .run()
    .expect("bring-up");

    // Bring-up never launches the server on its own.
    assert_eq!(spawns.0.load(Ordering::SeqCst), 0);
    assert!(stack.is_initialised());

    stack.set_link(true);
    assert_eq!(stack.poll(100).unwrap(), Some(NetworkEvent::Up));
    assert_eq!(spawns.0.load(Ordering::SeqCst), 1);
    assert!(runtime.lifecycle.tasks_already_created());

    // Flap the link a few times; the server is never relaunched.
    for round in 0..3u64 {
        stack.set_link(false);
        assert_eq!(stack.poll(200 + round * 10).unwrap(), Some(NetworkEvent::Down));
        stack.set_link(true);
        assert_eq!(stack.poll(205 + round * 10).unwrap(), Some(NetworkEvent::Up));
    }
    stack
        .apply_lease(EffectiveAddressing {
            ip: Ipv4Addr::new(10, 0, 2, 77),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(10, 0, 2, 2),
            dns: Ipv4Addr::new(10, 0, 2, 3),
        })
        .unwrap();
    assert_eq!(stack.poll(300).unwrap(), Some(NetworkEvent::Up));
    assert_eq!(spawns.0.load(Ordering::SeqCst), 1);
    assert_eq!(runtime.lifecycle.up_events(), 5);
    assert_eq!(runtime.lifecycle.down_events(), 3);

    // One health period elapses: exactly one check, nothing failing.
    echo_alive.store(false, Ordering::SeqCst);
    assert_eq!(timers.advance(14_999), 0);
    assert_eq!(timers.advance(1), 1);
    assert_eq!(runtime.health.failures(TaskFamily::EchoServers), 1);
    assert_eq!(runtime.health.failures(TaskFamily::UdpSelectServers), 0);
    assert_eq!(runtime.health.checks(), 1);

    echo_alive.store(true, Ordering::SeqCst);
    timers.advance(15_000);
    assert_eq!(runtime.health.failures(TaskFamily::EchoServers), 1);
    assert_eq!(runtime.health.checks(), 2);
}

#[test]
fn stack_hooks_answer_names_and_draw_sequence_numbers() {
    let clock = FixedClock(BOOT_SECS);
    let mut stack = LoopbackStack::new();
    let mut timers = SoftTimerService::default();
    let runtime = BringupSequencer::new(
        NodeConfig::default(),
        &clock,
        &mut stack,
        &mut timers,
        Box::new(CountingSpawner::default()),
    )
    .run()
    .expect("bring-up");

    assert_eq!(stack.resolve_local_name("RTOSDemo").unwrap(), NameMatch::Match);
    assert_eq!(stack.resolve_local_name("rtosdemo").unwrap(), NameMatch::Match);
    assert_eq!(stack.resolve_local_name("windows_demo").unwrap(), NameMatch::Match);
    assert_eq!(stack.resolve_local_name("other").unwrap(), NameMatch::NoMatch);
    assert_eq!(stack.dhcp_hostname().unwrap(), "RTOSDemo");

    let first = stack
        .next_initial_sequence_number(&tuple(49_152, Ipv4Addr::new(10, 0, 2, 2)))
        .unwrap();
    let second = stack
        .next_initial_sequence_number(&tuple(49_153, Ipv4Addr::new(10, 0, 2, 99)))
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(second, lcg_step(first));

    // Four diagnostic draws at bring-up precede the first sequence number.
    let mut expected = BOOT_SECS as u32;
    for _ in 0..5 {
        expected = lcg_step(expected);
    }
    assert_eq!(first, expected);
    assert_eq!(runtime.random.next_u32(), lcg_step(second));
}
