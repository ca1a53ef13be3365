//! Error types for reply correlation and message dispatch.

use crate::model::MessageId;
use crate::statemachine::TransitionError;
use thiserror::Error;

/// Errors raised by the [`CallbackRegistry`](super::CallbackRegistry).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallbackError {
    /// No callback is registered under the correlation id.
    #[error("No callback registered for correlation id '{0}'")]
    NotFound(String),

    /// A reply referenced a correlation id nobody is waiting on.
    #[error("Message {message_id} references unknown correlation id '{correlation_id}'")]
    UnknownCorrelation {
        message_id: MessageId,
        correlation_id: String,
    },

    /// A reply carried no correlation id at all.
    #[error("Message {0} has no correlation id")]
    MissingCorrelation(MessageId),
}

/// The reason an inbound message was rejected by the async callback service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchErrorKind {
    #[error("message type '{actual}' does not match expected type '{expected}'")]
    TypeMismatch { expected: String, actual: String },

    #[error("message has no correlation id")]
    MissingCorrelation,

    #[error("target session '{target}' does not match current session '{current}'")]
    SessionMismatch { target: String, current: String },

    #[error("no callback registered for correlation id '{0}'")]
    UnknownCorrelation(String),
}

/// A validation failure, attributed to the message that caused it.
///
/// The rendered text always contains the message id so that a rejection can be
/// matched to the original request in logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Rejected message {message_id}: {kind}")]
pub struct DispatchError {
    pub kind: DispatchErrorKind,
    pub message_id: MessageId,
}

impl DispatchError {
    pub fn new(kind: DispatchErrorKind, message_id: MessageId) -> Self {
        Self { kind, message_id }
    }
}

/// Errors surfaced by the [`MessageDispatcher`](super::MessageDispatcher).
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("No handler registered for message type '{message_type}' (message {message_id})")]
    UnregisteredType {
        message_type: String,
        message_id: MessageId,
    },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
