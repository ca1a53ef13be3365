//! Per-delivery context handed to handlers alongside a [`Message`](super::Message).

use super::SessionId;
use std::sync::Arc;

/// Supplies the identity of the local participant.
///
/// Implemented by whatever owns the connection to the coordination service; the
/// session id changes every time that connection is re-established.
pub trait SessionProvider: Send + Sync {
    fn session_id(&self) -> SessionId;
    fn instance_name(&self) -> &str;
}

/// A fixed identity, for tests and single-session embedding.
#[derive(Debug, Clone)]
pub struct StaticSession {
    session_id: SessionId,
    instance_name: String,
}

impl StaticSession {
    pub fn new(session_id: impl Into<SessionId>, instance_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            instance_name: instance_name.into(),
        }
    }
}

impl SessionProvider for StaticSession {
    fn session_id(&self) -> SessionId {
        self.session_id.clone()
    }

    fn instance_name(&self) -> &str {
        &self.instance_name
    }
}

/// Context injected into every handler. Bound at delivery time, so a handler always
/// sees the session that is current when the message arrives.
#[derive(Clone)]
pub struct NotificationContext {
    session: Arc<dyn SessionProvider>,
}

impl NotificationContext {
    pub fn new(session: Arc<dyn SessionProvider>) -> Self {
        Self { session }
    }

    pub fn session_id(&self) -> SessionId {
        self.session.session_id()
    }

    pub fn instance_name(&self) -> &str {
        self.session.instance_name()
    }
}

impl std::fmt::Debug for NotificationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationContext")
            .field("session_id", &self.session_id())
            .field("instance_name", &self.instance_name())
            .finish()
    }
}
