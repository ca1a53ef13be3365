//! Error types for the container manager.

use std::io;
use thiserror::Error;

/// Errors that can occur during container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// A container with this id is already registered.
    #[error("Process '{0}' already exists")]
    AlreadyExists(String),

    /// The requested container type is not the one this manager runs.
    #[error("Type '{0}' not supported")]
    UnsupportedType(String),

    /// No container is registered under this id.
    #[error("Process '{0}' does not exist")]
    NotFound(String),

    /// The process could not be started. Nothing was registered.
    #[error("Failed to spawn process '{id}'")]
    Spawn {
        id: String,
        #[source]
        source: io::Error,
    },

    /// The termination signal could not be delivered. The record is already gone.
    #[error("Failed to terminate process '{id}'")]
    Terminate {
        id: String,
        #[source]
        source: io::Error,
    },

    #[error("Container manager closed")]
    ManagerClosed,

    #[error("Container manager dropped response channel")]
    ManagerDropped,
}
