// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Error taxonomy for bring-up, timers, task spawning, and the fault registry.
// Author: Lukas Bower

//! Error types surfaced by the node and the fatal halt path.

use thiserror::Error;

/// Errors raised by a [`crate::timer::TimerService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    /// Periodic timers require a non-zero period.
    #[error("timer period must be non-zero")]
    InvalidPeriod,
    /// The timer service has no free slots left.
    #[error("timer service has no free timer slots")]
    NoCapacity,
    /// Handle does not name a timer created by this service.
    #[error("unknown timer handle {0}")]
    UnknownHandle(usize),
}

/// Errors raised by a [`crate::task::TaskSpawner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpawnError {
    /// The scheduler could not allocate the task's stack or control block.
    #[error("insufficient memory to spawn `{name}`")]
    OutOfMemory {
        /// Name of the task that failed to start.
        name: &'static str,
    },
    /// The platform refused to start the task.
    #[error("platform rejected task `{name}`")]
    Rejected {
        /// Name of the task that failed to start.
        name: &'static str,
    },
}

/// Errors raised while bringing up a [`crate::net::NetworkStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NetError {
    /// `init` was called on an already initialised stack.
    #[error("network stack already initialised")]
    AlreadyInitialised,
    /// The interface could not take the configured address.
    #[error("interface address table is full")]
    AddressTableFull,
    /// The interface could not take the default route.
    #[error("interface route table is full")]
    RouteTableFull,
    /// Operation requires an initialised stack.
    #[error("network stack not initialised")]
    NotInitialised,
}

/// Errors raised by the [`crate::fault::FaultHandlerRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FaultError {
    /// A handler is already registered at this cause.
    #[error("trap handler already installed at cause {cause:#x}")]
    AlreadyInstalled {
        /// Exception cause code.
        cause: u32,
    },
    /// The registry has no free vector slots.
    #[error("trap vector table is full")]
    TableFull,
    /// The registry has halted; no further installs are accepted.
    #[error("fault registry has halted")]
    Halted,
}

/// Fatal bring-up defects. Any of these stops the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BringupError {
    /// The periodic liveness timer could not be created or started.
    #[error("health timer: {0}")]
    Timer(#[from] TimerError),
    /// The protocol server task could not be spawned.
    #[error("task spawn: {0}")]
    Spawn(#[from] SpawnError),
    /// The network stack rejected initialisation.
    #[error("network init: {0}")]
    Net(#[from] NetError),
    /// The capability-fault decoder could not be installed.
    #[error("fault handler: {0}")]
    Fault(#[from] FaultError),
}

/// Log a fatal defect and stop the current execution context.
///
/// On host builds this panics so tests can observe the halt; kernel builds
/// route the panic into the spinning panic handler.
#[track_caller]
pub fn halt(context: &str, err: &BringupError) -> ! {
    log::error!(target: "modbus_node::fatal", "[fatal] {context}: {err}");
    panic!("fatal defect in {context}: {err}");
}

#[cfg(feature = "kernel")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo<'_>) -> ! {
    log::error!(target: "modbus_node::fatal", "[panic] {info}");
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bringup_error_wraps_sources() {
        let err: BringupError = TimerError::NoCapacity.into();
        assert_eq!(err, BringupError::Timer(TimerError::NoCapacity));
        assert_eq!(
            err.to_string(),
            "health timer: timer service has no free timer slots"
        );
    }

    #[test]
    fn halt_panics_with_context() {
        let result = std::panic::catch_unwind(|| {
            halt(
                "spawn",
                &BringupError::Spawn(SpawnError::OutOfMemory { name: "ModbusServer" }),
            )
        });
        assert!(result.is_err());
    }
}
