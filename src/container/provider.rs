//! Shell-based container provider.
//!
//! Each container is started as `run_command command coordination_address cluster_name id`,
//! e.g. `/bin/sh ./start-node.sh zk:2181 my-cluster node_7`.

use super::client::ContainerClient;
use super::error::ContainerError;
use super::launcher::LaunchSpec;
use super::message::{ContainerInfo, CreateContainer};
use crate::config::ParticipantConfig;
use tracing::{info, instrument};

/// Container type accepted unless configured otherwise.
pub const DEFAULT_CONTAINER_KIND: &str = "container";
/// Interpreter used to run the container command unless configured otherwise.
pub const DEFAULT_RUN_COMMAND: &str = "/bin/sh";

#[derive(Debug, Clone)]
pub struct ContainerProvider {
    client: ContainerClient,
    owner: String,
    coordination_address: String,
    cluster_name: String,
    run_command: String,
    command: String,
}

impl ContainerProvider {
    pub fn new(
        client: ContainerClient,
        owner: impl Into<String>,
        coordination_address: impl Into<String>,
        cluster_name: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            client,
            owner: owner.into(),
            coordination_address: coordination_address.into(),
            cluster_name: cluster_name.into(),
            run_command: DEFAULT_RUN_COMMAND.to_string(),
            command: command.into(),
        }
    }

    /// Provider owned by this participant instance, with every setting taken from `config`.
    pub fn from_config(client: ContainerClient, config: &ParticipantConfig) -> Self {
        Self::new(
            client,
            config.instance_name.clone(),
            config.coordination_address.clone(),
            config.cluster_name.clone(),
            config.container.command.clone(),
        )
        .with_run_command(config.container.run_command.clone())
    }

    pub fn with_run_command(mut self, run_command: impl Into<String>) -> Self {
        self.run_command = run_command.into();
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn client(&self) -> &ContainerClient {
        &self.client
    }

    pub fn launch_spec(&self, id: &str) -> LaunchSpec {
        LaunchSpec {
            container_id: id.to_string(),
            program: self.run_command.clone(),
            args: vec![
                self.command.clone(),
                self.coordination_address.clone(),
                self.cluster_name.clone(),
                id.to_string(),
            ],
        }
    }

    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn create(&self, id: &str, kind: &str) -> Result<ContainerInfo, ContainerError> {
        info!(
            coordination_address = %self.coordination_address,
            cluster_name = %self.cluster_name,
            command = %self.command,
            "Requesting container"
        );
        self.client
            .create(CreateContainer {
                owner: self.owner.clone(),
                kind: kind.to_string(),
                launch: self.launch_spec(id),
            })
            .await
    }

    pub async fn destroy(&self, id: &str) -> Result<(), ContainerError> {
        self.client.destroy(id).await
    }

    /// Tears down every container of the shared manager, not only this provider's.
    pub async fn destroy_all(&self) -> Result<usize, ContainerError> {
        self.client.destroy_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::mock::MockLauncher;
    use crate::container::{ContainerManager, TerminationPolicy};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_passes_coordination_arguments() {
        let mock = MockLauncher::new();
        let (manager, client) = ContainerManager::new(
            8,
            Arc::new(mock.clone()),
            DEFAULT_CONTAINER_KIND,
            TerminationPolicy::Graceful,
        );
        tokio::spawn(manager.run());

        let provider = ContainerProvider::new(client, "owner_1", "localhost:2181", "cluster_a", "node.sh");
        let info = provider.create("node_7", "container").await.unwrap();
        assert_eq!(info.owner, "owner_1");

        let launched = mock.launched();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].program, "/bin/sh");
        assert_eq!(launched[0].args, vec!["node.sh", "localhost:2181", "cluster_a", "node_7"]);
    }

    #[tokio::test]
    async fn test_providers_share_one_manager() {
        let mock = MockLauncher::new();
        let (manager, client) = ContainerManager::new(
            8,
            Arc::new(mock.clone()),
            DEFAULT_CONTAINER_KIND,
            TerminationPolicy::Forceful,
        );
        tokio::spawn(manager.run());

        let first = ContainerProvider::new(client.clone(), "owner_1", "zk", "c", "a.sh");
        let second = ContainerProvider::new(client, "owner_2", "zk", "c", "b.sh");

        first.create("shared", "container").await.unwrap();
        let err = second.create("shared", "container").await.unwrap_err();
        assert!(matches!(err, ContainerError::AlreadyExists(_)));

        second.destroy("shared").await.unwrap();
        assert_eq!(first.destroy_all().await.unwrap(), 0);
        assert!(mock.running().is_empty());
    }
}
