//! # Container Manager
//!
//! Owns every running container process of this participant.
//!
//! The manager is an actor: it owns the record table and the receiving end of a
//! channel, and handles one request at a time. That sequential loop is the single
//! guard over container state, so `create`, `destroy` and `destroy_all` never
//! interleave, whichever provider or task issued them. Providers share the manager
//! by cloning its [`ContainerClient`].
//!
//! Rules enforced here:
//!
//! - at most one record per container id (`AlreadyExists`);
//! - only the configured container type is accepted (`UnsupportedType`);
//! - a failed spawn leaves no record behind (`Spawn`);
//! - `destroy` removes the record before signalling, so a failed signal still
//!   unregisters the container (`Terminate`);
//! - `destroy_all` works on a snapshot of ids and keeps going past failures.

use super::client::ContainerClient;
use super::error::ContainerError;
use super::launcher::{ProcessHandle, ProcessLauncher, TerminationPolicy};
use super::message::{ContainerInfo, ContainerRequest, CreateContainer};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A running container as tracked by the manager.
#[derive(Debug)]
pub struct ContainerRecord {
    pub id: String,
    pub owner: String,
    pub kind: String,
    pub started_at: DateTime<Utc>,
    handle: Box<dyn ProcessHandle>,
}

impl ContainerRecord {
    pub fn info(&self) -> ContainerInfo {
        ContainerInfo {
            id: self.id.clone(),
            owner: self.owner.clone(),
            kind: self.kind.clone(),
            pid: self.handle.pid(),
            started_at: self.started_at,
        }
    }
}

pub struct ContainerManager {
    receiver: mpsc::Receiver<ContainerRequest>,
    records: HashMap<String, ContainerRecord>,
    launcher: Arc<dyn ProcessLauncher>,
    required_kind: String,
    policy: TerminationPolicy,
}

impl ContainerManager {
    pub fn new(
        buffer_size: usize,
        launcher: Arc<dyn ProcessLauncher>,
        required_kind: impl Into<String>,
        policy: TerminationPolicy,
    ) -> (Self, ContainerClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let manager = Self {
            receiver,
            records: HashMap::new(),
            launcher,
            required_kind: required_kind.into(),
            policy,
        };
        (manager, ContainerClient::new(sender))
    }

    /// Processes requests until every client has been dropped.
    pub async fn run(mut self) {
        info!(required_kind = %self.required_kind, policy = ?self.policy, "Container manager started");

        while let Some(request) = self.receiver.recv().await {
            match request {
                ContainerRequest::Create { request, respond_to } => {
                    let _ = respond_to.send(self.create(request));
                }
                ContainerRequest::Destroy { id, respond_to } => {
                    let _ = respond_to.send(self.destroy(&id).await);
                }
                ContainerRequest::DestroyAll { respond_to } => {
                    let _ = respond_to.send(Ok(self.destroy_all().await));
                }
                ContainerRequest::List { respond_to } => {
                    let mut containers: Vec<_> = self.records.values().map(ContainerRecord::info).collect();
                    containers.sort_by(|a, b| a.id.cmp(&b.id));
                    let _ = respond_to.send(Ok(containers));
                }
                ContainerRequest::Contains { id, respond_to } => {
                    let found = self.records.contains_key(&id);
                    debug!(container_id = %id, found, "Contains");
                    let _ = respond_to.send(Ok(found));
                }
            }
        }

        if !self.records.is_empty() {
            warn!(remaining = self.records.len(), "Manager stopped with containers still registered");
        }
        info!(size = self.records.len(), "Shutdown");
    }

    fn create(&mut self, request: CreateContainer) -> Result<ContainerInfo, ContainerError> {
        let id = request.id().to_string();
        if self.records.contains_key(&id) {
            warn!(container_id = %id, "Already exists");
            return Err(ContainerError::AlreadyExists(id));
        }
        if request.kind != self.required_kind {
            warn!(container_id = %id, kind = %request.kind, "Unsupported type");
            return Err(ContainerError::UnsupportedType(request.kind));
        }

        info!(
            container_id = %id,
            program = %request.launch.program,
            args = ?request.launch.args,
            "Running container"
        );
        let handle = self.launcher.launch(&request.launch).map_err(|source| {
            warn!(container_id = %id, error = %source, "Spawn failed");
            ContainerError::Spawn {
                id: id.clone(),
                source,
            }
        })?;

        let record = ContainerRecord {
            id: id.clone(),
            owner: request.owner,
            kind: request.kind,
            started_at: Utc::now(),
            handle,
        };
        let container = record.info();
        self.records.insert(id, record);
        info!(container_id = %container.id, pid = ?container.pid, size = self.records.len(), "Created");
        Ok(container)
    }

    async fn destroy(&mut self, id: &str) -> Result<(), ContainerError> {
        let Some(mut record) = self.records.remove(id) else {
            warn!(container_id = %id, "Not found");
            return Err(ContainerError::NotFound(id.to_string()));
        };

        info!(container_id = %id, owner = %record.owner, "Destroying container");
        record
            .handle
            .terminate(self.policy)
            .await
            .map_err(|source| ContainerError::Terminate {
                id: id.to_string(),
                source,
            })?;
        info!(container_id = %id, size = self.records.len(), "Destroyed");
        Ok(())
    }

    async fn destroy_all(&mut self) -> usize {
        let mut ids: Vec<String> = self.records.keys().cloned().collect();
        ids.sort();
        info!(count = ids.len(), "Destroying all containers");

        let mut destroyed = 0;
        for id in ids {
            match self.destroy(&id).await {
                Ok(()) => destroyed += 1,
                Err(e) => warn!(container_id = %id, error = %e, "Ignoring teardown failure"),
            }
        }
        destroyed
    }
}
