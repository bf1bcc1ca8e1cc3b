// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Defines the modbus-node library and public module surface.
// Author: Lukas Bower
#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(deprecated)]
#![warn(missing_docs)]

//! Bring-up and liveness supervision for a Modbus/TCP node.
//!
//! The crate seeds the node's pseudo-random source, installs the optional
//! capability-fault decoder, hands the network stack its policy hooks, launches
//! the protocol server the first time the link comes up, and periodically counts
//! liveness failures of the long-running network tasks.

extern crate alloc;

#[cfg(all(target_os = "none", not(feature = "kernel")))]
compile_error!("enable the `kernel` feature when building modbus-node for bare-metal targets");

pub mod bringup;
pub mod clock;
pub mod config;
pub mod error;
pub mod fault;
pub mod features;
pub mod health;
pub mod isn;
pub mod log_sink;
pub mod names;
pub mod net;
pub mod rand;
pub mod supervisor;
pub mod task;
pub mod timer;

#[cfg(all(feature = "host-stack", not(target_os = "none")))]
/// Host-mode simulation used for developer runs of the node.
pub mod host;

pub use bringup::{BringupSequencer, NodeRuntime};
pub use config::NodeConfig;
pub use error::BringupError;
