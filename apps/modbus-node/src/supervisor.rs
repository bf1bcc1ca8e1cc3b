// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Launch the protocol server on first link-up and report addressing on every up.
// Author: Lukas Bower

//! Network lifecycle supervision.
//!
//! The supervisor is installed as the stack's event hook. The first `Up` event
//! spawns the protocol server; every `Up` event logs the addressing in effect.
//! `Down` events are recorded and otherwise ignored, so a flapping link never
//! spawns a second server.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::Ordering;

use portable_atomic::{AtomicBool, AtomicU64};

use crate::config::ServerTaskConfig;
use crate::error::{self, BringupError};
use crate::net::{format_dotted, AddressQuery, EffectiveAddressing, NetworkEvent, NetworkEventHook};
use crate::task::{TaskHandle, TaskSpawner};

/// Link state as last reported by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No link, or never reported.
    Down,
    /// Link reported up.
    Up,
}

impl LinkState {
    /// Short label used in diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            LinkState::Down => "down",
            LinkState::Up => "up",
        }
    }
}

/// Lifecycle flags shared read-only with diagnostics. Written only by the
/// [`NetworkLifecycleSupervisor`].
#[derive(Debug, Default)]
pub struct LifecycleStatus {
    tasks_already_created: AtomicBool,
    link_up: AtomicBool,
    up_events: AtomicU64,
    down_events: AtomicU64,
}

impl LifecycleStatus {
    /// Whether the protocol server has been launched.
    #[must_use]
    pub fn tasks_already_created(&self) -> bool {
        self.tasks_already_created.load(Ordering::Acquire)
    }

    /// Link state from the most recent event.
    #[must_use]
    pub fn link(&self) -> LinkState {
        if self.link_up.load(Ordering::Acquire) {
            LinkState::Up
        } else {
            LinkState::Down
        }
    }

    /// Up events observed.
    #[must_use]
    pub fn up_events(&self) -> u64 {
        self.up_events.load(Ordering::Acquire)
    }

    /// Down events observed.
    #[must_use]
    pub fn down_events(&self) -> u64 {
        self.down_events.load(Ordering::Acquire)
    }
}

/// What the supervisor did in response to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorOutcome {
    /// Event handled.
    pub event: NetworkEvent,
    /// Server task launched by this event, if any.
    pub spawned: Option<TaskHandle>,
    /// Addressing logged for an `Up` event.
    pub addressing: Option<EffectiveAddressing>,
}

/// Network event hook that owns the one-shot server launch.
pub struct NetworkLifecycleSupervisor {
    spawner: Box<dyn TaskSpawner>,
    server: ServerTaskConfig,
    status: Arc<LifecycleStatus>,
}

impl NetworkLifecycleSupervisor {
    /// Supervisor that launches `server` through `spawner`.
    #[must_use]
    pub fn new(spawner: Box<dyn TaskSpawner>, server: ServerTaskConfig) -> Self {
        Self {
            spawner,
            server,
            status: Arc::new(LifecycleStatus::default()),
        }
    }

    /// Read-only view of the lifecycle flags.
    #[must_use]
    pub fn status(&self) -> Arc<LifecycleStatus> {
        Arc::clone(&self.status)
    }

    /// Handle one link event. A spawn failure leaves the flag clear and is
    /// returned to the caller as a fatal defect.
    pub fn handle_event(
        &mut self,
        event: NetworkEvent,
        query: &dyn AddressQuery,
    ) -> Result<SupervisorOutcome, BringupError> {
        match event {
            NetworkEvent::Down => {
                self.status.link_up.store(false, Ordering::Release);
                self.status.down_events.fetch_add(1, Ordering::AcqRel);
                log::debug!(target: "modbus_node::supervisor", "[net] link down");
                Ok(SupervisorOutcome {
                    event,
                    spawned: None,
                    addressing: None,
                })
            }
            NetworkEvent::Up => {
                self.status.link_up.store(true, Ordering::Release);
                self.status.up_events.fetch_add(1, Ordering::AcqRel);

                let spawned = if self.status.tasks_already_created() {
                    None
                } else {
                    let handle = self.spawner.spawn_protocol_server(&self.server)?;
                    self.status
                        .tasks_already_created
                        .store(true, Ordering::Release);
                    log::info!(
                        target: "modbus_node::supervisor",
                        "[net] {} started port={} id={}",
                        handle.name,
                        self.server.port,
                        handle.id
                    );
                    Some(handle)
                };

                let addressing = query.effective_addressing();
                log_addressing(&addressing);
                Ok(SupervisorOutcome {
                    event,
                    spawned,
                    addressing: Some(addressing),
                })
            }
        }
    }
}

impl fmt::Debug for NetworkLifecycleSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkLifecycleSupervisor")
            .field("server", &self.server)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl NetworkEventHook for NetworkLifecycleSupervisor {
    fn on_network_event(&mut self, event: NetworkEvent, addressing: &dyn AddressQuery) {
        if let Err(err) = self.handle_event(event, addressing) {
            error::halt("network up", &err);
        }
    }
}

fn log_addressing(addressing: &EffectiveAddressing) {
    const TARGET: &str = "modbus_node::supervisor";
    log::info!(target: TARGET, "IP Address: {}", format_dotted(addressing.ip));
    log::info!(target: TARGET, "Subnet Mask: {}", format_dotted(addressing.netmask));
    log::info!(target: TARGET, "Gateway Address: {}", format_dotted(addressing.gateway));
    log::info!(target: TARGET, "DNS Server Address: {}", format_dotted(addressing.dns));
}
