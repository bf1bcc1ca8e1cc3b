// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: TCP initial sequence number policy hook.
// Author: Lukas Bower

//! TCP initial sequence number policy hook.

use alloc::sync::Arc;
use core::net::Ipv4Addr;

use crate::rand::RandomSource;

/// Addresses and ports of an outgoing TCP connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTuple {
    /// Local address.
    pub source: Ipv4Addr,
    /// Local port.
    pub source_port: u16,
    /// Remote address.
    pub destination: Ipv4Addr,
    /// Remote port.
    pub destination_port: u16,
}

/// Hook that picks the initial sequence number for a new connection.
pub trait SequenceNumberPolicy: Send + Sync {
    /// Sequence number for a connection identified by `tuple`.
    fn next_initial_sequence_number(&self, tuple: &ConnectionTuple) -> u32;
}

/// INSECURE demo policy: ignores the connection tuple and returns the next
/// draw from the node's shared LCG stream.
///
/// Sequence numbers are predictable and correlated across connections. Do not
/// ship this outside a lab network.
#[derive(Debug, Clone)]
pub struct InsecureDemoIsn {
    random: Arc<RandomSource>,
}

impl InsecureDemoIsn {
    /// Draw sequence numbers from `random`.
    #[must_use]
    pub fn new(random: Arc<RandomSource>) -> Self {
        Self { random }
    }
}

impl SequenceNumberPolicy for InsecureDemoIsn {
    fn next_initial_sequence_number(&self, _tuple: &ConnectionTuple) -> u32 {
        self.random.next_u32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::lcg_step;

    fn tuple(port: u16) -> ConnectionTuple {
        ConnectionTuple {
            source: Ipv4Addr::new(10, 0, 2, 15),
            source_port: port,
            destination: Ipv4Addr::new(10, 0, 2, 2),
            destination_port: 502,
        }
    }

    #[test]
    fn tuple_is_ignored_and_stream_is_shared() {
        let random = Arc::new(RandomSource::seeded(42));
        let policy = InsecureDemoIsn::new(Arc::clone(&random));

        let first = policy.next_initial_sequence_number(&tuple(49152));
        let second = policy.next_initial_sequence_number(&tuple(49153));
        assert_ne!(first, second);
        assert_eq!(first, lcg_step(42));
        assert_eq!(second, lcg_step(first));
        assert_eq!(random.next_u32(), lcg_step(second));
    }
}
