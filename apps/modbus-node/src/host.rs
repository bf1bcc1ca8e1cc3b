// Author: Lukas Bower
//! Host-mode simulation: runs bring-up against the smoltcp loopback stack, a
//! thread spawner, and a virtual-time timer service.
#![allow(clippy::module_name_repetitions)]

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result as AnyhowResult};
use log::LevelFilter;

use crate::bringup::{BringupSequencer, NodeRuntime};
use crate::clock::SystemClock;
use crate::config::{LogSinks, NodeConfig, ServerTaskConfig};
use crate::features;
use crate::health::TaskFamily;
use crate::log_sink::{self, StdoutConsole};
use crate::net::{EffectiveAddressing, LoopbackStack, PingReplyStatus};
use crate::task::ThreadSpawner;
use crate::timer::SoftTimerService;

/// Result alias used throughout the host-mode simulation.
pub type Result<T> = AnyhowResult<T>;

/// Virtual milliseconds covered by one simulation tick.
const TICK_MS: u64 = 5_000;
/// Ticks the simulation runs for; enough for several health periods.
const TICK_LIMIT: u64 = 12;
/// Wall-clock pause between ticks.
const TICK_SLEEP: Duration = Duration::from_millis(20);

/// Scripted step applied at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    LinkUp,
    LinkDown,
    Lease(EffectiveAddressing),
    KillUdpSelect,
    Ping(PingReplyStatus),
}

fn plan(tick: u64) -> Option<Step> {
    match tick {
        1 => Some(Step::LinkUp),
        2 => Some(Step::Ping(PingReplyStatus::Success)),
        4 => Some(Step::LinkDown),
        5 => Some(Step::LinkUp),
        6 => Some(Step::Lease(EffectiveAddressing {
            ip: Ipv4Addr::new(192, 168, 10, 40),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 10, 1),
            dns: Ipv4Addr::new(192, 168, 10, 1),
        })),
        8 => Some(Step::KillUdpSelect),
        _ => None,
    }
}

/// Entry point for host-mode execution of the node simulation.
pub fn main() -> Result<()> {
    let config = NodeConfig::default();
    init_logging(config.log_sinks)?;
    log::info!(target: "modbus_node::host", "[host] features {}", features::summary());

    let udp_select_alive = Arc::new(AtomicBool::new(true));
    let mut stack = LoopbackStack::new();
    let mut timers = SoftTimerService::default();
    let spawner = ThreadSpawner::new(Arc::new(|task: ServerTaskConfig| {
        log::info!(
            target: "modbus_node::host",
            "[host] {} task running port={} stack={} words priority={}",
            task.name,
            task.port,
            task.stack_words,
            task.priority
        );
    }));

    let alive = Arc::clone(&udp_select_alive);
    let runtime = BringupSequencer::new(
        config,
        &SystemClock,
        &mut stack,
        &mut timers,
        Box::new(spawner),
    )
    .with_probe(TaskFamily::SeparateEchoClients, Box::new(|| true))
    .with_probe(TaskFamily::EchoServers, Box::new(|| true))
    .with_probe(
        TaskFamily::UdpSelectServers,
        Box::new(move || alive.load(Ordering::Acquire)),
    )
    .run()
    .map_err(|err| anyhow!("bring-up failed: {err}"))?;

    simulate(&runtime, &mut stack, &mut timers, &udp_select_alive)?;

    log::info!(
        target: "modbus_node::host",
        "[host] done server_started={} up={} down={} health {}",
        runtime.lifecycle.tasks_already_created(),
        runtime.lifecycle.up_events(),
        runtime.lifecycle.down_events(),
        runtime.health.snapshot().render()
    );
    Ok(())
}

/// Install the host logger for `sinks`.
///
/// With `RUST_LOG` set, `env_logger` handles filtering; otherwise the node's
/// bounded console logger writes to stdout at debug level.
fn init_logging(sinks: LogSinks) -> Result<()> {
    if std::env::var_os(env_logger::DEFAULT_FILTER_ENV).is_none() {
        return log_sink::install(Box::new(StdoutConsole), sinks, LevelFilter::Debug)
            .context("install console logger");
    }
    log_sink::require_console(sinks).context("select log sinks")?;
    env_logger::Builder::from_default_env()
        .try_init()
        .context("install env_logger")?;
    log_sink::warn_unsupported(sinks);
    Ok(())
}

fn simulate(
    runtime: &NodeRuntime,
    stack: &mut LoopbackStack,
    timers: &mut SoftTimerService,
    udp_select_alive: &AtomicBool,
) -> Result<()> {
    for tick in 1..=TICK_LIMIT {
        match plan(tick) {
            Some(Step::LinkUp) => stack.set_link(true),
            Some(Step::LinkDown) => stack.set_link(false),
            Some(Step::Lease(lease)) => stack.apply_lease(lease).context("apply lease")?,
            Some(Step::KillUdpSelect) => udp_select_alive.store(false, Ordering::Release),
            Some(Step::Ping(status)) => stack
                .deliver_ping_reply(status, 0x0502)
                .context("deliver ping reply")?,
            None => {}
        }
        let now_ms = tick * TICK_MS;
        stack.poll(now_ms).context("poll loopback stack")?;
        let fired = timers.advance(TICK_MS);
        if fired > 0 {
            log::debug!(
                target: "modbus_node::host",
                "[host] t={now_ms}ms health {}",
                runtime.health.snapshot().render()
            );
        }
        thread::sleep(TICK_SLEEP);
    }
    Ok(())
}
