// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Static node configuration assembled from constants and cargo features.
// Author: Lukas Bower

//! Node configuration consumed by bring-up.

use core::net::Ipv4Addr;

use modbus_net_constants as consts;

use crate::health::TaskFamily;

/// Static fallback addressing handed to the network stack at init time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressConfig {
    /// Interface address.
    pub ip: Ipv4Addr,
    /// Subnet mask.
    pub netmask: Ipv4Addr,
    /// Default gateway.
    pub gateway: Ipv4Addr,
    /// DNS server.
    pub dns: Ipv4Addr,
    /// Interface hardware address.
    pub mac: [u8; 6],
}

impl AddressConfig {
    /// Prefix length implied by the netmask.
    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        u32::from(self.netmask).leading_ones() as u8
    }
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::from(consts::DEFAULT_IP_ADDR),
            netmask: Ipv4Addr::from(consts::DEFAULT_NET_MASK),
            gateway: Ipv4Addr::from(consts::DEFAULT_GATEWAY_ADDR),
            dns: Ipv4Addr::from(consts::DEFAULT_DNS_SERVER_ADDR),
            mac: consts::DEFAULT_MAC_ADDR,
        }
    }
}

/// Names the node answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeNames {
    /// Primary host name, registered with DHCP.
    pub hostname: &'static str,
    /// Secondary nickname.
    pub nickname: &'static str,
}

impl Default for NodeNames {
    fn default() -> Self {
        Self {
            hostname: consts::HOST_NAME,
            nickname: consts::DEVICE_NICK_NAME,
        }
    }
}

/// Parameters for the protocol server task launched on first link-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTaskConfig {
    /// Task name as seen by the scheduler.
    pub name: &'static str,
    /// Stack depth in words.
    pub stack_words: usize,
    /// Listening port.
    pub port: u16,
    /// Scheduler priority; zero is the idle priority.
    pub priority: u8,
}

impl Default for ServerTaskConfig {
    fn default() -> Self {
        Self {
            name: "ModbusServer",
            stack_words: consts::MINIMAL_STACK_WORDS,
            port: consts::MODBUS_TCP_PORT,
            priority: consts::IDLE_PRIORITY,
        }
    }
}

/// Conditions that decide whether the capability-fault decoder is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapPolicy {
    /// Built for capability (CHERI purecap) hardware.
    pub capability_aware: bool,
    /// Debug build.
    pub debug: bool,
    /// The platform lets applications supply exception handlers.
    pub app_handlers_permitted: bool,
    /// Compartmentalised build; the compartment manager owns traps.
    pub compartmentalized: bool,
}

impl TrapPolicy {
    /// Policy derived from the enabled cargo features and build profile.
    #[must_use]
    pub const fn from_build() -> Self {
        Self {
            capability_aware: cfg!(feature = "cheri"),
            debug: cfg!(debug_assertions),
            app_handlers_permitted: cfg!(feature = "app-exception-handlers"),
            compartmentalized: cfg!(feature = "cheri-compartments"),
        }
    }

    /// Whether bring-up installs the capability-fault decoder.
    #[must_use]
    pub const fn should_install(&self) -> bool {
        self.capability_aware && self.debug && self.app_handlers_permitted && !self.compartmentalized
    }
}

impl Default for TrapPolicy {
    fn default() -> Self {
        Self::from_build()
    }
}

/// Log destinations requested by the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSinks {
    /// Console output.
    pub stdout: bool,
    /// Log file on local storage.
    pub disk_file: bool,
    /// UDP log forwarding.
    pub udp: bool,
}

impl Default for LogSinks {
    fn default() -> Self {
        Self {
            stdout: true,
            disk_file: false,
            udp: false,
        }
    }
}

/// Full static configuration for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Fallback addressing.
    pub address: AddressConfig,
    /// Names answered by the resolver hook.
    pub names: NodeNames,
    /// Protocol server launched on first link-up.
    pub server: ServerTaskConfig,
    /// Name of the periodic liveness timer.
    pub health_timer_name: &'static str,
    /// Period of the liveness timer in milliseconds.
    pub health_period_ms: u64,
    /// Task families whose probes are registered.
    pub monitored: &'static [TaskFamily],
    /// Trap handler installation policy.
    pub traps: TrapPolicy,
    /// Requested log sinks.
    pub log_sinks: LogSinks,
}

/// Families the firmware builds probes for by default.
pub const DEFAULT_MONITORED: &[TaskFamily] = &[
    TaskFamily::SeparateEchoClients,
    TaskFamily::EchoServers,
    TaskFamily::UdpSelectServers,
];

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: AddressConfig::default(),
            names: NodeNames::default(),
            server: ServerTaskConfig::default(),
            health_timer_name: consts::HEALTH_TIMER_NAME,
            health_period_ms: consts::HEALTH_CHECK_PERIOD_MS,
            monitored: DEFAULT_MONITORED,
            traps: TrapPolicy::from_build(),
            log_sinks: LogSinks::default(),
        }
    }
}
