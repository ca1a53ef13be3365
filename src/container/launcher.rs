//! # Process Launching
//!
//! The manager never touches the operating system directly. It asks a
//! [`ProcessLauncher`] for a [`ProcessHandle`] and later asks that handle to stop,
//! using the configured [`TerminationPolicy`].
//!
//! [`OsProcessLauncher`] is the production implementation built on
//! `tokio::process`. Tests use [`MockLauncher`](super::mock::MockLauncher).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::io;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

/// What to run for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub container_id: String,
    pub program: String,
    pub args: Vec<String>,
}

/// How a running container is asked to stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationPolicy {
    /// `SIGTERM`, letting the process clean up.
    #[default]
    Graceful,
    /// Immediate kill.
    Forceful,
}

/// A started process owned by the container manager.
#[async_trait]
pub trait ProcessHandle: Send + Sync + Debug {
    fn pid(&self) -> Option<u32>;

    /// Sends the termination signal. Does not wait for the process to exit.
    async fn terminate(&mut self, policy: TerminationPolicy) -> io::Result<()>;
}

pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessHandle>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcessLauncher;

impl ProcessLauncher for OsProcessLauncher {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessHandle>> {
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .spawn()?;
        debug!(container_id = %spec.container_id, pid = ?child.id(), "Spawned");
        Ok(Box::new(OsProcess { child }))
    }
}

#[derive(Debug)]
struct OsProcess {
    child: Child,
}

#[async_trait]
impl ProcessHandle for OsProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn terminate(&mut self, policy: TerminationPolicy) -> io::Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        let signalled = match policy {
            TerminationPolicy::Forceful => self.child.start_kill(),
            TerminationPolicy::Graceful => match self.child.id() {
                Some(pid) => send_sigterm(pid).await,
                None => Ok(()),
            },
        };
        self.settle(signalled)
    }
}

impl OsProcess {
    /// A failed signal is fine if the process exited in the meantime.
    fn settle(&mut self, signalled: io::Result<()>) -> io::Result<()> {
        let Err(e) = signalled else {
            return Ok(());
        };
        if self.child.try_wait()?.is_some() {
            debug!(error = %e, "Process exited before it was signalled");
            return Ok(());
        }
        Err(e)
    }
}

#[cfg(unix)]
async fn send_sigterm(pid: u32) -> io::Result<()> {
    let status = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("kill -TERM {pid} exited with {status}")))
    }
}

#[cfg(not(unix))]
async fn send_sigterm(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "graceful termination requires a unix platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_deserializes_snake_case() {
        let policy: TerminationPolicy = serde_yaml::from_str("forceful").unwrap();
        assert_eq!(policy, TerminationPolicy::Forceful);
        assert_eq!(TerminationPolicy::default(), TerminationPolicy::Graceful);
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let spec = LaunchSpec {
            container_id: "c1".into(),
            program: "/definitely/not/a/real/program".into(),
            args: vec![],
        };
        let err = OsProcessLauncher.launch(&spec).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_failure_after_exit_is_not_an_error() {
        let child = Command::new("/bin/sh").args(["-c", "exit 0"]).spawn().unwrap();
        let mut process = OsProcess { child };
        process.child.wait().await.unwrap();
        assert!(process.settle(Err(io::Error::other("no such process"))).is_ok());

        let child = Command::new("/bin/sh").args(["-c", "sleep 30"]).spawn().unwrap();
        let mut running = OsProcess { child };
        assert!(running.settle(Err(io::Error::other("permission denied"))).is_err());
        running.terminate(TerminationPolicy::Forceful).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_graceful_and_forceful_termination() {
        for policy in [TerminationPolicy::Graceful, TerminationPolicy::Forceful] {
            let spec = LaunchSpec {
                container_id: "c1".into(),
                program: "/bin/sh".into(),
                args: vec!["-c".into(), "sleep 30".into()],
            };
            let mut handle = OsProcessLauncher.launch(&spec).unwrap();
            assert!(handle.pid().is_some());
            handle.terminate(policy).await.unwrap();
        }
    }
}
