// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: smoltcp-backed host network stack used for developer runs and tests.
// Author: Lukas Bower

//! Host reference stack built on a smoltcp interface over a loopback PHY.
//!
//! Link state is driven by the caller through [`LoopbackStack::set_link`];
//! transitions are delivered to the event hook on the next poll, matching how a
//! real driver reports carrier changes from its own context.

use core::net::Ipv4Addr;
use core::sync::atomic::Ordering;

use portable_atomic::AtomicU64;
use smoltcp::iface::{Config as IfaceConfig, Interface, SocketSet, SocketStorage};
use smoltcp::phy::{Loopback, Medium};
use smoltcp::time::Instant;
use smoltcp::wire::{EthernetAddress, HardwareAddress, IpAddress, IpCidr};

use super::{
    AddressQuery, EffectiveAddressing, NetworkEvent, NetworkStack, PingReplyStatus, StackHooks,
};
use crate::config::AddressConfig;
use crate::error::NetError;
use crate::isn::ConnectionTuple;
use crate::names::NameMatch;

const RANDOM_SEED: u64 = 0x6d6f_6462_7573_0502;

/// Monotonic millisecond clock feeding smoltcp timestamps.
#[derive(Debug, Default)]
pub struct NetworkClock {
    ticks_ms: AtomicU64,
}

impl NetworkClock {
    /// Clock starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock to `now_ms` if that is later than the current reading.
    pub fn advance_to(&self, now_ms: u64) -> Instant {
        let previous = self.ticks_ms.fetch_max(now_ms, Ordering::AcqRel);
        to_instant(previous.max(now_ms))
    }

    /// Current instant.
    #[must_use]
    pub fn now(&self) -> Instant {
        to_instant(self.ticks_ms.load(Ordering::Acquire))
    }
}

fn to_instant(ms: u64) -> Instant {
    Instant::from_millis(i64::try_from(ms).unwrap_or(i64::MAX))
}

/// Link counters kept by the loopback stack.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkTelemetry {
    /// Up events delivered.
    pub up_events: u64,
    /// Down events delivered.
    pub down_events: u64,
    /// Time of the most recent poll.
    pub last_poll_ms: u64,
}

/// Loopback smoltcp stack implementing [`NetworkStack`].
pub struct LoopbackStack {
    clock: NetworkClock,
    device: Loopback,
    interface: Option<Interface>,
    gateway: Ipv4Addr,
    dns: Ipv4Addr,
    hooks: Option<StackHooks>,
    link_requested: bool,
    link_reported: bool,
    announce_pending: bool,
    telemetry: LinkTelemetry,
}

impl LoopbackStack {
    /// Uninitialised stack with the link down.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: NetworkClock::new(),
            device: Loopback::new(Medium::Ethernet),
            interface: None,
            gateway: Ipv4Addr::UNSPECIFIED,
            dns: Ipv4Addr::UNSPECIFIED,
            hooks: None,
            link_requested: false,
            link_reported: false,
            announce_pending: false,
            telemetry: LinkTelemetry::default(),
        }
    }

    /// Whether [`NetworkStack::init`] has run.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.interface.is_some()
    }

    /// Request a carrier change; reported on the next [`Self::poll`].
    pub fn set_link(&mut self, up: bool) {
        if up && (self.link_requested || self.link_reported) {
            // Repeated or flapped carrier while reported up: re-announce Up.
            self.announce_pending = true;
        }
        self.link_requested = up;
    }

    /// Replace the fallback addressing with a leased one and re-announce Up.
    pub fn apply_lease(&mut self, lease: EffectiveAddressing) -> Result<(), NetError> {
        let interface = self.interface.as_mut().ok_or(NetError::NotInitialised)?;
        configure_interface(interface, lease.ip, lease.netmask, lease.gateway)?;
        self.gateway = lease.gateway;
        self.dns = lease.dns;
        log::info!(target: "modbus_node::net", "[net] lease applied ip={}", lease.ip);
        if self.link_requested {
            self.announce_pending = true;
        }
        Ok(())
    }

    /// Poll the interface at `now_ms` and deliver any pending link event.
    /// Returns the event delivered, if any.
    pub fn poll(&mut self, now_ms: u64) -> Result<Option<NetworkEvent>, NetError> {
        let timestamp = self.clock.advance_to(now_ms);
        let interface = self.interface.as_mut().ok_or(NetError::NotInitialised)?;
        let storage: &mut [SocketStorage<'static>] = &mut [];
        let mut sockets = SocketSet::new(storage);
        let _ = interface.poll(timestamp, &mut self.device, &mut sockets);
        self.telemetry.last_poll_ms = now_ms;

        let event = if self.link_requested != self.link_reported {
            self.link_reported = self.link_requested;
            self.announce_pending = false;
            Some(if self.link_requested {
                NetworkEvent::Up
            } else {
                NetworkEvent::Down
            })
        } else if self.announce_pending && self.link_reported {
            self.announce_pending = false;
            Some(NetworkEvent::Up)
        } else {
            None
        };

        if let Some(event) = event {
            match event {
                NetworkEvent::Up => self.telemetry.up_events += 1,
                NetworkEvent::Down => self.telemetry.down_events += 1,
            }
            let snapshot = self.effective_addressing();
            if let Some(hooks) = self.hooks.as_mut() {
                hooks.events.on_network_event(event, &snapshot);
            }
        }
        Ok(event)
    }

    /// Ask the installed resolver whether `name` is this node.
    pub fn resolve_local_name(&self, name: &str) -> Result<NameMatch, NetError> {
        let hooks = self.hooks.as_ref().ok_or(NetError::NotInitialised)?;
        Ok(hooks.names.resolve_local_name(name))
    }

    /// Hostname the stack registers with DHCP.
    pub fn dhcp_hostname(&self) -> Result<&str, NetError> {
        let hooks = self.hooks.as_ref().ok_or(NetError::NotInitialised)?;
        Ok(hooks.names.hostname())
    }

    /// Initial sequence number for an outgoing connection.
    pub fn next_initial_sequence_number(&self, tuple: &ConnectionTuple) -> Result<u32, NetError> {
        let hooks = self.hooks.as_ref().ok_or(NetError::NotInitialised)?;
        Ok(hooks.isn.next_initial_sequence_number(tuple))
    }

    /// Hand an ICMP echo reply to the ping hook.
    pub fn deliver_ping_reply(
        &mut self,
        status: PingReplyStatus,
        identifier: u16,
    ) -> Result<(), NetError> {
        let hooks = self.hooks.as_mut().ok_or(NetError::NotInitialised)?;
        hooks.ping.on_ping_reply(status, identifier);
        Ok(())
    }

    /// Link counters.
    #[must_use]
    pub fn telemetry(&self) -> LinkTelemetry {
        self.telemetry
    }
}

impl Default for LoopbackStack {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for LoopbackStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoopbackStack")
            .field("initialised", &self.is_initialised())
            .field("link", &self.link_reported)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

impl AddressQuery for LoopbackStack {
    fn effective_addressing(&self) -> EffectiveAddressing {
        let (ip, netmask) = self
            .interface
            .as_ref()
            .and_then(|interface| {
                interface.ip_addrs().iter().find_map(|cidr| match cidr {
                    IpCidr::Ipv4(v4) => Some((v4.address(), v4.netmask())),
                    #[allow(unreachable_patterns)]
                    _ => None,
                })
            })
            .unwrap_or((Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED));
        EffectiveAddressing {
            ip,
            netmask,
            gateway: self.gateway,
            dns: self.dns,
        }
    }
}

impl NetworkStack for LoopbackStack {
    fn init(&mut self, address: &AddressConfig, hooks: StackHooks) -> Result<(), NetError> {
        if self.interface.is_some() {
            return Err(NetError::AlreadyInitialised);
        }
        let mac = EthernetAddress::from_bytes(&address.mac);
        let mut config = IfaceConfig::new(HardwareAddress::Ethernet(mac));
        config.random_seed = RANDOM_SEED;

        let mut interface = Interface::new(config, &mut self.device, self.clock.now());
        configure_interface(&mut interface, address.ip, address.netmask, address.gateway)?;
        log::info!(
            target: "modbus_node::net",
            "[net] loopback stack init mac={mac} ip={}/{} host={}",
            address.ip,
            address.prefix_len(),
            hooks.names.hostname()
        );

        self.interface = Some(interface);
        self.gateway = address.gateway;
        self.dns = address.dns;
        self.hooks = Some(hooks);
        Ok(())
    }
}

fn configure_interface(
    interface: &mut Interface,
    ip: Ipv4Addr,
    netmask: Ipv4Addr,
    gateway: Ipv4Addr,
) -> Result<(), NetError> {
    let prefix = u32::from(netmask).leading_ones() as u8;
    let cidr = IpCidr::new(IpAddress::Ipv4(ip), prefix);
    let mut pushed = Ok(());
    interface.update_ip_addrs(|addrs| {
        addrs.clear();
        pushed = addrs.push(cidr).map_err(|_| NetError::AddressTableFull);
    });
    pushed?;
    interface
        .routes_mut()
        .add_default_ipv4_route(gateway)
        .map_err(|_| NetError::RouteTableFull)?;
    Ok(())
}
