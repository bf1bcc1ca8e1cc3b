// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: One-shot node bring-up: seeding, trap install, stack init, health timer.
// Author: Lukas Bower

//! Process start-up sequence.
//!
//! [`BringupSequencer::run`] consumes the sequencer, so the steps execute at
//! most once per process. The order is fixed:
//!
//! 1. seed the random stream from the wall clock and log a few draws
//! 2. install the capability-fault decoder when the trap policy allows it
//! 3. hand the stack its fallback addressing and hooks (does not wait for link)
//! 4. create the periodic health timer
//! 5. start it
//!
//! The protocol server is not started here; the supervisor launches it when the
//! stack first reports the link up.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;

use modbus_net_constants::CHERI_EXCEPTION_CAUSE;

use crate::clock::{seed_from_secs, WallClock};
use crate::config::NodeConfig;
use crate::error::{self, BringupError};
use crate::fault::{CapabilityFaultDecoder, FaultHandlerRegistry};
use crate::health::{HealthCounters, HealthMonitor, LivenessProbe, TaskFamily};
use crate::isn::InsecureDemoIsn;
use crate::net::{LogPingReplies, NetworkStack, PingReplyHook, StackHooks};
use crate::rand::RandomSource;
use crate::supervisor::{LifecycleStatus, NetworkLifecycleSupervisor};
use crate::task::TaskSpawner;
use crate::timer::{TimerHandle, TimerService};

const TARGET: &str = "modbus_node::bringup";

/// Handles to the long-lived state created by bring-up.
pub struct NodeRuntime {
    /// Seed the random stream started from.
    pub seed: u32,
    /// Shared random stream.
    pub random: Arc<RandomSource>,
    /// Liveness failure counters.
    pub health: Arc<HealthCounters>,
    /// Server launch and link flags.
    pub lifecycle: Arc<LifecycleStatus>,
    /// The periodic health timer.
    pub health_timer: TimerHandle,
    /// Trap vector table for the platform trap entry.
    pub faults: FaultHandlerRegistry,
}

impl fmt::Debug for NodeRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRuntime")
            .field("seed", &self.seed)
            .field("health", &self.health.snapshot())
            .field("lifecycle", &self.lifecycle)
            .field("health_timer", &self.health_timer)
            .field("faults", &self.faults)
            .finish()
    }
}

/// One-shot bring-up routine.
pub struct BringupSequencer<'a> {
    config: NodeConfig,
    clock: &'a dyn WallClock,
    stack: &'a mut dyn NetworkStack,
    timers: &'a mut dyn TimerService,
    spawner: Box<dyn TaskSpawner>,
    monitor: HealthMonitor,
    ping: Box<dyn PingReplyHook>,
}

impl<'a> BringupSequencer<'a> {
    /// Sequencer wired to the platform services it drives.
    pub fn new(
        config: NodeConfig,
        clock: &'a dyn WallClock,
        stack: &'a mut dyn NetworkStack,
        timers: &'a mut dyn TimerService,
        spawner: Box<dyn TaskSpawner>,
    ) -> Self {
        Self {
            config,
            clock,
            stack,
            timers,
            spawner,
            monitor: HealthMonitor::new(),
            ping: Box::new(LogPingReplies),
        }
    }

    /// Register the liveness probe for `family`. Probes for families the
    /// configuration does not monitor are dropped.
    #[must_use]
    pub fn with_probe(mut self, family: TaskFamily, probe: Box<dyn LivenessProbe>) -> Self {
        if self.config.monitored.contains(&family) {
            self.monitor.register(family, probe);
        } else {
            log::debug!(target: TARGET, "[boot] {} not monitored; probe dropped", family.label());
        }
        self
    }

    /// Replace the default logging ping hook.
    #[must_use]
    pub fn with_ping_hook(mut self, hook: Box<dyn PingReplyHook>) -> Self {
        self.ping = hook;
        self
    }

    /// Run every bring-up step in order.
    pub fn run(self) -> Result<NodeRuntime, BringupError> {
        let Self {
            config,
            clock,
            stack,
            timers,
            spawner,
            monitor,
            ping,
        } = self;

        let seed = seed_from_secs(clock.now_secs());
        let random = Arc::new(RandomSource::seeded(seed));
        log::debug!(target: TARGET, "[boot] seed for randomiser: {seed}");
        // Drawn unconditionally so the stream position does not depend on the log level.
        let draws = [
            random.next_u32(),
            random.next_u32(),
            random.next_u32(),
            random.next_u32(),
        ];
        log::debug!(
            target: TARGET,
            "[boot] random numbers: {:08X} {:08X} {:08X} {:08X}",
            draws[0],
            draws[1],
            draws[2],
            draws[3]
        );

        let mut faults = FaultHandlerRegistry::new();
        if config.traps.should_install() {
            faults.install(CHERI_EXCEPTION_CAUSE, Box::new(CapabilityFaultDecoder))?;
        } else {
            log::debug!(target: TARGET, "[boot] capability fault decoder not installed");
        }

        let supervisor = NetworkLifecycleSupervisor::new(spawner, config.server);
        let lifecycle = supervisor.status();
        let hooks = StackHooks {
            events: Box::new(supervisor),
            names: Box::new(config.names),
            isn: Box::new(InsecureDemoIsn::new(Arc::clone(&random))),
            ping,
        };
        stack.init(&config.address, hooks)?;
        log::info!(target: TARGET, "[boot] network stack initialised; awaiting link");

        let health = monitor.counters();
        let families = monitor.monitored().count();
        let health_timer = timers.create_periodic(
            config.health_timer_name,
            config.health_period_ms,
            true,
            Box::new(monitor),
        )?;
        timers.start(health_timer)?;
        log::info!(
            target: TARGET,
            "[boot] {} timer started period={}ms probes={families}",
            config.health_timer_name,
            config.health_period_ms
        );

        Ok(NodeRuntime {
            seed,
            random,
            health,
            lifecycle,
            health_timer,
            faults,
        })
    }
}

/// Run bring-up and halt the node on any fatal defect.
pub fn run_or_halt(sequencer: BringupSequencer<'_>) -> NodeRuntime {
    match sequencer.run() {
        Ok(runtime) => runtime,
        Err(err) => error::halt("bring-up", &err),
    }
}
