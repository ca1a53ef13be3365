//! # Mock Launcher
//!
//! A [`ProcessLauncher`] that starts nothing. It records every launch and
//! termination, and can be told to fail either step for a given container id.
//!
//! ```ignore
//! let mock = MockLauncher::new();
//! mock.fail_terminate_for("c2");
//! let (manager, client) =
//!     ContainerManager::new(8, Arc::new(mock.clone()), "container", TerminationPolicy::Graceful);
//! tokio::spawn(manager.run());
//! // ... drive the client ...
//! assert_eq!(mock.running(), vec!["c2".to_string()]);
//! ```

use super::launcher::{LaunchSpec, ProcessHandle, ProcessLauncher, TerminationPolicy};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockState {
    next_pid: u32,
    launched: Vec<LaunchSpec>,
    terminated: Vec<(String, TerminationPolicy)>,
    running: BTreeSet<String>,
    fail_spawn: HashSet<String>,
    fail_terminate: HashSet<String>,
}

/// Cloning shares the recorded state, so a test can keep one clone for assertions.
#[derive(Debug, Default, Clone)]
pub struct MockLauncher {
    state: Arc<Mutex<MockState>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_spawn_for(&self, id: &str) {
        self.state.lock().fail_spawn.insert(id.to_string());
    }

    pub fn fail_terminate_for(&self, id: &str) {
        self.state.lock().fail_terminate.insert(id.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.fail_spawn.clear();
        state.fail_terminate.clear();
    }

    /// Every successful launch, in order.
    pub fn launched(&self) -> Vec<LaunchSpec> {
        self.state.lock().launched.clone()
    }

    /// Every successful termination with the policy used, in order.
    pub fn terminated(&self) -> Vec<(String, TerminationPolicy)> {
        self.state.lock().terminated.clone()
    }

    /// Ids launched and not yet successfully terminated, sorted.
    pub fn running(&self) -> Vec<String> {
        self.state.lock().running.iter().cloned().collect()
    }
}

impl ProcessLauncher for MockLauncher {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessHandle>> {
        let mut state = self.state.lock();
        if state.fail_spawn.contains(&spec.container_id) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock spawn failure for '{}'", spec.container_id),
            ));
        }
        state.next_pid += 1;
        state.launched.push(spec.clone());
        state.running.insert(spec.container_id.clone());
        Ok(Box::new(MockProcess {
            id: spec.container_id.clone(),
            pid: 1000 + state.next_pid,
            state: self.state.clone(),
        }))
    }
}

#[derive(Debug)]
struct MockProcess {
    id: String,
    pid: u32,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl ProcessHandle for MockProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn terminate(&mut self, policy: TerminationPolicy) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.fail_terminate.contains(&self.id) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("mock terminate failure for '{}'", self.id),
            ));
        }
        state.running.remove(&self.id);
        state.terminated.push((self.id.clone(), policy));
        Ok(())
    }
}
