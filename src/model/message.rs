//! # Cluster Messages
//!
//! A [`Message`] is the unit of work delivered to a participant by the transport layer.
//! It is immutable once built: every field is set through [`MessageBuilder`] and only
//! read afterwards.
//!
//! The same type carries two very different payloads:
//!
//! - **Replies** (`TASK_REPLY`) point back at an earlier request through their
//!   `correlation_id` and are routed to the [`CallbackRegistry`](crate::messaging::CallbackRegistry).
//! - **State transitions** (`STATE_TRANSITION`) name a resource partition plus a
//!   `from_state` / `to_state` pair and are executed by the
//!   [`StateTransitionEngine`](crate::statemachine::StateTransitionEngine).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// Globally unique message identifier. Assigned at creation, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MessageId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a participant's live session.
///
/// The literal `*` is a wildcard that matches every session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// The session wildcard.
    pub const ANY: &'static str = "*";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn any() -> Self {
        Self(Self::ANY.to_string())
    }

    pub fn is_any(&self) -> bool {
        self.0 == Self::ANY
    }

    /// True when a message addressed to `self` may be consumed by the `current` session.
    pub fn accepts(&self, current: &SessionId) -> bool {
        self.is_any() || self == current
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known message type tags. Custom tags are plain strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    StateTransition,
    TaskReply,
    NoOp,
}

impl MessageType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MessageType::StateTransition => "STATE_TRANSITION",
            MessageType::TaskReply => "TASK_REPLY",
            MessageType::NoOp => "NO_OP",
        }
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        kind.as_str().to_string()
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable control message.
///
/// See [`Message::builder`] for construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    msg_type: String,
    target_session_id: Option<SessionId>,
    correlation_id: Option<String>,
    from_state: Option<String>,
    to_state: Option<String>,
    resource_name: Option<String>,
    partition_name: Option<String>,
    state_model_def: Option<String>,
    src_name: Option<String>,
    tgt_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a bare message of the given type with a fresh id.
    pub fn new(msg_type: impl Into<String>) -> Self {
        Self::builder(msg_type).build()
    }

    pub fn builder(msg_type: impl Into<String>) -> MessageBuilder {
        MessageBuilder::new(msg_type)
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    pub fn target_session_id(&self) -> Option<&SessionId> {
        self.target_session_id.as_ref()
    }

    /// The correlation id, treating an empty string as absent.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn from_state(&self) -> Option<&str> {
        self.from_state.as_deref()
    }

    pub fn to_state(&self) -> Option<&str> {
        self.to_state.as_deref()
    }

    pub fn resource_name(&self) -> Option<&str> {
        self.resource_name.as_deref()
    }

    pub fn partition_name(&self) -> Option<&str> {
        self.partition_name.as_deref()
    }

    pub fn state_model_def(&self) -> Option<&str> {
        self.state_model_def.as_deref()
    }

    pub fn src_name(&self) -> Option<&str> {
        self.src_name.as_deref()
    }

    pub fn tgt_name(&self) -> Option<&str> {
        self.tgt_name.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Builder for [`Message`].
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    pub fn new(msg_type: impl Into<String>) -> Self {
        Self {
            message: Message {
                id: MessageId::new(),
                msg_type: msg_type.into(),
                target_session_id: None,
                correlation_id: None,
                from_state: None,
                to_state: None,
                resource_name: None,
                partition_name: None,
                state_model_def: None,
                src_name: None,
                tgt_name: None,
                created_at: Utc::now(),
            },
        }
    }

    /// Overrides the generated id. Meant for replaying messages received from a peer.
    pub fn id(mut self, id: MessageId) -> Self {
        self.message.id = id;
        self
    }

    pub fn target_session(mut self, session: impl Into<SessionId>) -> Self {
        self.message.target_session_id = Some(session.into());
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.message.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn transition(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.message.from_state = Some(from.into());
        self.message.to_state = Some(to.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.message.resource_name = Some(resource.into());
        self
    }

    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.message.partition_name = Some(partition.into());
        self
    }

    pub fn state_model(mut self, state_model: impl Into<String>) -> Self {
        self.message.state_model_def = Some(state_model.into());
        self
    }

    pub fn src_name(mut self, name: impl Into<String>) -> Self {
        self.message.src_name = Some(name.into());
        self
    }

    pub fn tgt_name(mut self, name: impl Into<String>) -> Self {
        self.message.tgt_name = Some(name.into());
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}
