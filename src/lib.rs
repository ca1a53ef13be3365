#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Participant Core
//!
//! > **The member-side coordination core of a cluster manager.**
//!
//! A cluster member receives control messages from its peers and from the controller.
//! This crate decides what to do with them, and also manages the worker processes
//! ("containers") the member runs.
//!
//! ## 🏗️ Design
//!
//! ### Three independent engines
//! - **Reply correlation**: requests sent earlier register a callback under a
//!   correlation id. Replies are validated and fed to it until every request has been
//!   answered, or until its timeout fires. Exactly one of the two happens.
//! - **State transitions**: each `(resource, partition)` pair runs a small declared
//!   state machine. A `STATE_TRANSITION` message moves it along one edge, and only if
//!   the message agrees with the current state.
//! - **Containers**: a single actor task owns every spawned process, so create and
//!   destroy requests from any number of providers are serialized.
//!
//! ### One entry point
//! [`MessageDispatcher`](messaging::MessageDispatcher) maps a message type string to
//! the component that handles it. The map is built once at startup.
//!
//! ### Concurrency Model
//! Messages may be delivered from many tasks at once. The callback registry is a
//! sharded concurrent map with one lock per callback. The engine holds one async lock
//! per partition. The container manager is an actor and needs no lock at all.
//!
//! ### Observability
//! `tracing` everywhere, with structured fields. See [`lifecycle::tracing`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Data ([`model`])
//! [`Message`](model::Message), ids, and the session context a message is delivered in.
//!
//! ### 2. Messaging ([`messaging`])
//! - [`CallbackRegistry`](messaging::CallbackRegistry), [`AsyncCallbackService`](messaging::AsyncCallbackService)
//! - [`MessageDispatcher`](messaging::MessageDispatcher)
//!
//! ### 3. State Machines ([`statemachine`])
//! - [`StateModelDefinition`](statemachine::StateModelDefinition) and its validating builder
//! - [`StateTransitionEngine`](statemachine::StateTransitionEngine)
//!
//! ### 4. Containers ([`container`])
//! - [`ContainerManager`](container::ContainerManager) / [`ContainerClient`](container::ContainerClient)
//! - [`ContainerProvider`](container::ContainerProvider)
//!
//! ### 5. The Orchestrator ([`lifecycle`], [`config`])
//! [`Participant`](lifecycle::Participant) wires everything from a
//! [`ParticipantConfig`](config::ParticipantConfig) and shuts it down again.
//!
//! ## 🚀 Quick Start
//!
//! ```rust,ignore
//! use participant_core::config::ParticipantConfig;
//! use participant_core::lifecycle::Participant;
//!
//! let config = ParticipantConfig::from_file("participant.yaml")?.with_env()?;
//! let participant = Participant::builder(config).start()?;
//!
//! participant.deliver(message).await?;
//! participant.shutdown().await?;
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod config;
pub mod container;
pub mod lifecycle;
pub mod messaging;
pub mod model;
pub mod statemachine;
