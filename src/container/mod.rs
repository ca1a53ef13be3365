//! Lifecycle of externally spawned container processes.
//!
//! # Main Components
//!
//! - [`ContainerManager`] - actor owning every container record
//! - [`ContainerClient`] - cloneable handle used to talk to the manager
//! - [`ContainerProvider`] - builds the shell launch line for one owner
//! - [`ProcessLauncher`] - seam between the manager and the operating system
//!
//! # Testing
//!
//! See the [`mock`] module for a launcher that records instead of spawning.

pub mod client;
pub mod error;
pub mod launcher;
pub mod manager;
pub mod message;
pub mod mock;
pub mod provider;

pub use client::ContainerClient;
pub use error::ContainerError;
pub use launcher::{LaunchSpec, OsProcessLauncher, ProcessHandle, ProcessLauncher, TerminationPolicy};
pub use manager::{ContainerManager, ContainerRecord};
pub use message::{ContainerInfo, ContainerRequest, CreateContainer};
pub use provider::{ContainerProvider, DEFAULT_CONTAINER_KIND, DEFAULT_RUN_COMMAND};
