//! Requests understood by the [`ContainerManager`](super::ContainerManager) task.

use super::error::ContainerError;
use super::launcher::LaunchSpec;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

/// One-shot channel carrying the manager's answer back to the client.
pub type Response<T> = oneshot::Sender<Result<T, ContainerError>>;

/// Everything needed to start one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContainer {
    pub owner: String,
    pub kind: String,
    pub launch: LaunchSpec,
}

impl CreateContainer {
    pub fn id(&self) -> &str {
        &self.launch.container_id
    }
}

/// Read-only view of a registered container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    pub id: String,
    pub owner: String,
    pub kind: String,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum ContainerRequest {
    Create {
        request: CreateContainer,
        respond_to: Response<ContainerInfo>,
    },
    Destroy {
        id: String,
        respond_to: Response<()>,
    },
    DestroyAll {
        respond_to: Response<usize>,
    },
    List {
        respond_to: Response<Vec<ContainerInfo>>,
    },
    Contains {
        id: String,
        respond_to: Response<bool>,
    },
}
