//! Error types for state model definitions and transition execution.

use crate::model::MessageId;
use thiserror::Error;

/// Boxed error returned by user transition handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure to execute a `STATE_TRANSITION` message.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The message lacks a field every transition needs.
    #[error("Message {message_id} is missing required field '{field}'")]
    InvalidMessage {
        message_id: MessageId,
        field: &'static str,
    },

    #[error("No state model registered under '{0}'")]
    UnknownStateModel(String),

    /// The partition is already managed by a different state model.
    #[error("Partition {resource}/{partition} uses state model '{existing}', message names '{requested}'")]
    StateModelMismatch {
        resource: String,
        partition: String,
        existing: String,
        requested: String,
    },

    /// The instance is not in the state the message expects.
    #[error("Stale transition for {resource}/{partition}: current state is '{current}', message expects '{from}'")]
    StaleTransition {
        resource: String,
        partition: String,
        current: String,
        from: String,
    },

    #[error("Transition {from} -> {to} is not defined")]
    IllegalTransition { from: String, to: String },

    #[error("Partition {resource}/{partition} has been dropped")]
    InstanceDropped { resource: String, partition: String },

    /// The user handler failed. The instance keeps its previous state.
    #[error("Transition {from} -> {to} failed for {resource}/{partition}")]
    Handler {
        resource: String,
        partition: String,
        from: String,
        to: String,
        #[source]
        source: BoxError,
    },
}

/// Invalid state model definition, detected at build time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("State model '{0}' has no initial state")]
    MissingInitialState(String),

    #[error("Initial state '{state}' of '{model}' is not a valid state")]
    InvalidInitialState { model: String, state: String },

    #[error("Transition {from} -> {to} references unknown state '{state}'")]
    UnknownState {
        from: String,
        to: String,
        state: String,
    },

    #[error("Transition {from} -> {to} is declared twice")]
    DuplicateTransition { from: String, to: String },

    #[error("Transition {from} -> {to} leaves DROPPED")]
    TransitionFromDropped { from: String, to: String },

    #[error("State '{0}' is unreachable from the initial state")]
    UnreachableState(String),
}
