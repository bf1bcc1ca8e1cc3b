// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Network stack seam: link events, address queries, and the hook bundle.
// Author: Lukas Bower

//! Interfaces between the node and whichever TCP/IP stack hosts it.
//!
//! The stack owns the hooks it is handed at init time and calls back into them
//! from its own event context.

use alloc::boxed::Box;
use core::fmt::{self, Write};
use core::net::Ipv4Addr;

use heapless::String as HeaplessString;

use crate::config::AddressConfig;
use crate::error::NetError;
use crate::isn::SequenceNumberPolicy;
use crate::names::NameResolver;

#[cfg(feature = "host-stack")]
pub mod loopback;

#[cfg(feature = "host-stack")]
pub use loopback::LoopbackStack;

/// Longest dotted-decimal IPv4 rendering.
pub const DOTTED_CAP: usize = 15;

/// Link transition reported by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The interface is configured and passing traffic.
    Up,
    /// The interface lost its link.
    Down,
}

/// Addressing currently in effect on the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveAddressing {
    /// Interface address.
    pub ip: Ipv4Addr,
    /// Subnet mask.
    pub netmask: Ipv4Addr,
    /// Default gateway.
    pub gateway: Ipv4Addr,
    /// DNS server.
    pub dns: Ipv4Addr,
}

impl From<&AddressConfig> for EffectiveAddressing {
    fn from(config: &AddressConfig) -> Self {
        Self {
            ip: config.ip,
            netmask: config.netmask,
            gateway: config.gateway,
            dns: config.dns,
        }
    }
}

/// Read access to the addressing a stack is currently using.
pub trait AddressQuery {
    /// Addressing in effect right now, lease or fallback.
    fn effective_addressing(&self) -> EffectiveAddressing;
}

impl AddressQuery for EffectiveAddressing {
    fn effective_addressing(&self) -> EffectiveAddressing {
        *self
    }
}

/// Receiver of link transitions.
pub trait NetworkEventHook: Send {
    /// Called from the stack's event context on every transition.
    fn on_network_event(&mut self, event: NetworkEvent, addressing: &dyn AddressQuery);
}

/// Outcome of an ICMP echo request the node sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingReplyStatus {
    /// Reply matched the request.
    Success,
    /// Reply failed its checksum.
    InvalidChecksum,
    /// Reply payload differed from the request.
    InvalidData,
}

impl PingReplyStatus {
    /// Log text for the status.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            PingReplyStatus::Success => "Ping reply received",
            PingReplyStatus::InvalidChecksum => "Ping reply received with invalid checksum",
            PingReplyStatus::InvalidData => "Ping reply received with invalid data",
        }
    }
}

/// Receiver of ICMP echo replies.
pub trait PingReplyHook: Send {
    /// Called once per reply.
    fn on_ping_reply(&mut self, status: PingReplyStatus, identifier: u16);
}

/// Ping hook that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPingReplies;

impl PingReplyHook for LogPingReplies {
    fn on_ping_reply(&mut self, status: PingReplyStatus, identifier: u16) {
        log::info!(
            target: "modbus_node::net",
            "[ping] {} id={identifier}",
            status.describe()
        );
    }
}

/// Policy objects a stack receives at init time.
pub struct StackHooks {
    /// Link transition receiver.
    pub events: Box<dyn NetworkEventHook>,
    /// Local name matcher and DHCP hostname.
    pub names: Box<dyn NameResolver>,
    /// TCP initial sequence number policy.
    pub isn: Box<dyn SequenceNumberPolicy>,
    /// ICMP echo reply receiver.
    pub ping: Box<dyn PingReplyHook>,
}

impl fmt::Debug for StackHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackHooks")
            .field("hostname", &self.names.hostname())
            .finish_non_exhaustive()
    }
}

/// TCP/IP stack as seen by bring-up.
pub trait NetworkStack {
    /// Apply the fallback addressing, take ownership of the hooks, and begin
    /// bringing the interface up. Must return without waiting for link.
    fn init(&mut self, address: &AddressConfig, hooks: StackHooks) -> Result<(), NetError>;
}

/// Render an IPv4 address in dotted-decimal form without allocating.
#[must_use]
pub fn format_dotted(addr: Ipv4Addr) -> HeaplessString<DOTTED_CAP> {
    let mut out = HeaplessString::new();
    let [a, b, c, d] = addr.octets();
    let _ = write!(out, "{a}.{b}.{c}.{d}");
    out
}
