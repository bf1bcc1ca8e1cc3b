// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Defines the net-constants library and public module surface.
// Author: Lukas Bower

#![no_std]
#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Shared networking constants for the Modbus node.
//!
//! The fallback addressing matches the QEMU user-mode network so the node
//! comes up reachable before any DHCP lease arrives.

/// Well-known Modbus/TCP listening port.
pub const MODBUS_TCP_PORT: u16 = 502;

/// Fallback IPv4 address applied before a lease is obtained.
pub const DEFAULT_IP_ADDR: [u8; 4] = [10, 0, 2, 15];
/// Fallback IPv4 netmask.
pub const DEFAULT_NET_MASK: [u8; 4] = [255, 255, 255, 0];
/// Fallback default gateway.
pub const DEFAULT_GATEWAY_ADDR: [u8; 4] = [10, 0, 2, 2];
/// Fallback DNS server.
pub const DEFAULT_DNS_SERVER_ADDR: [u8; 4] = [10, 0, 2, 3];
/// Hardware address of the primary interface.
pub const DEFAULT_MAC_ADDR: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];

/// Name registered with DHCP and answered for LLMNR/NBNS lookups.
pub const HOST_NAME: &str = "RTOSDemo";
/// Secondary name the node also answers to.
pub const DEVICE_NICK_NAME: &str = "windows_demo";

/// Stack depth, in words, of the smallest task the scheduler supports.
pub const MINIMAL_STACK_WORDS: usize = 512;
/// Lowest scheduler priority; the protocol server runs here.
pub const IDLE_PRIORITY: u8 = 0;

/// Name of the periodic liveness timer.
pub const HEALTH_TIMER_NAME: &str = "Check";
/// Period of the liveness timer in milliseconds.
pub const HEALTH_CHECK_PERIOD_MS: u64 = 15_000;

/// Exception cause code the capability-fault decoder is registered at.
pub const CHERI_EXCEPTION_CAUSE: u32 = 0x1c;
