use super::error::ContainerError;
use super::message::{ContainerInfo, ContainerRequest, CreateContainer, Response};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

/// Client for interacting with the [`ContainerManager`](super::ContainerManager).
///
/// Cheap to clone. Every clone talks to the same manager task.
#[derive(Debug, Clone)]
pub struct ContainerClient {
    sender: mpsc::Sender<ContainerRequest>,
}

impl ContainerClient {
    pub fn new(sender: mpsc::Sender<ContainerRequest>) -> Self {
        Self { sender }
    }

    #[instrument(skip(self, request), fields(container_id = %request.id(), kind = %request.kind))]
    pub async fn create(&self, request: CreateContainer) -> Result<ContainerInfo, ContainerError> {
        debug!("Sending request");
        self.call(|respond_to| ContainerRequest::Create { request, respond_to })
            .await
    }

    #[instrument(skip(self))]
    pub async fn destroy(&self, id: &str) -> Result<(), ContainerError> {
        debug!("Sending request");
        let id = id.to_string();
        self.call(|respond_to| ContainerRequest::Destroy { id, respond_to })
            .await
    }

    /// Destroys every registered container, returning how many were torn down cleanly.
    #[instrument(skip(self))]
    pub async fn destroy_all(&self) -> Result<usize, ContainerError> {
        debug!("Sending request");
        self.call(|respond_to| ContainerRequest::DestroyAll { respond_to })
            .await
    }

    pub async fn list(&self) -> Result<Vec<ContainerInfo>, ContainerError> {
        self.call(|respond_to| ContainerRequest::List { respond_to }).await
    }

    pub async fn contains(&self, id: &str) -> Result<bool, ContainerError> {
        let id = id.to_string();
        self.call(|respond_to| ContainerRequest::Contains { id, respond_to })
            .await
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(Response<T>) -> ContainerRequest,
    ) -> Result<T, ContainerError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(request(respond_to))
            .await
            .map_err(|_| ContainerError::ManagerClosed)?;
        response.await.map_err(|_| ContainerError::ManagerDropped)?
    }
}
