// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Task spawning seam for the protocol server.
// Author: Lukas Bower

//! Scheduler interface used to launch the protocol server.

use crate::config::ServerTaskConfig;
use crate::error::SpawnError;

/// Identifier of a task started by a [`TaskSpawner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    /// Scheduler-assigned identifier.
    pub id: u64,
    /// Task name.
    pub name: &'static str,
}

/// Scheduler facility that can start the protocol server task.
pub trait TaskSpawner: Send {
    /// Start the server described by `task`.
    fn spawn_protocol_server(&mut self, task: &ServerTaskConfig) -> Result<TaskHandle, SpawnError>;
}

#[cfg(feature = "std")]
pub use self::host::{ServerEntry, ThreadSpawner};

#[cfg(feature = "std")]
mod host {
    use std::sync::Arc;
    use std::thread;

    use super::{ServerTaskConfig, SpawnError, TaskHandle, TaskSpawner};

    /// Smallest host thread stack handed out, regardless of the word count requested.
    const MIN_HOST_STACK_BYTES: usize = 64 * 1024;

    /// Body of the server thread.
    pub type ServerEntry = Arc<dyn Fn(ServerTaskConfig) + Send + Sync>;

    /// Spawner that maps tasks onto named OS threads.
    pub struct ThreadSpawner {
        entry: ServerEntry,
        next_id: u64,
        threads: Vec<thread::JoinHandle<()>>,
    }

    impl ThreadSpawner {
        /// Spawner whose threads run `entry`.
        #[must_use]
        pub fn new(entry: ServerEntry) -> Self {
            Self {
                entry,
                next_id: 1,
                threads: Vec::new(),
            }
        }

        /// Number of threads started so far.
        #[must_use]
        pub fn spawned(&self) -> usize {
            self.threads.len()
        }
    }

    impl core::fmt::Debug for ThreadSpawner {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.debug_struct("ThreadSpawner")
                .field("next_id", &self.next_id)
                .field("threads", &self.threads.len())
                .finish()
        }
    }

    impl TaskSpawner for ThreadSpawner {
        fn spawn_protocol_server(
            &mut self,
            task: &ServerTaskConfig,
        ) -> Result<TaskHandle, SpawnError> {
            let words = task.stack_words.saturating_mul(core::mem::size_of::<usize>());
            let entry = Arc::clone(&self.entry);
            let task = *task;
            let handle = thread::Builder::new()
                .name(task.name.into())
                .stack_size(words.max(MIN_HOST_STACK_BYTES))
                .spawn(move || entry(task))
                .map_err(|_| SpawnError::OutOfMemory { name: task.name })?;
            self.threads.push(handle);
            let id = self.next_id;
            self.next_id += 1;
            Ok(TaskHandle {
                id,
                name: task.name,
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::sync::atomic::{AtomicU16, Ordering};

        #[test]
        fn thread_runs_entry_with_task_config() {
            let port = Arc::new(AtomicU16::new(0));
            let seen = Arc::clone(&port);
            let mut spawner = ThreadSpawner::new(Arc::new(move |task: ServerTaskConfig| {
                seen.store(task.port, Ordering::SeqCst);
            }));
            let handle = spawner
                .spawn_protocol_server(&ServerTaskConfig::default())
                .unwrap();
            assert_eq!(handle.name, "ModbusServer");
            assert_eq!(handle.id, 1);
            for thread in spawner.threads.drain(..) {
                thread.join().unwrap();
            }
            assert_eq!(port.load(Ordering::SeqCst), 502);
        }
    }
}
