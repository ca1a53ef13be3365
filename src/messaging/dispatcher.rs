//! # Message Dispatcher
//!
//! Routes a delivered [`Message`] to the factory registered for its type string.
//! The table is built once through [`MessageDispatcherBuilder`] and is read-only
//! afterwards, so dispatch never inspects types dynamically.

use super::error::RouteError;
use super::handler::{HandlerResult, MessageHandlerFactory};
use crate::model::{Message, NotificationContext};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Clone, Default)]
pub struct MessageDispatcher {
    factories: Arc<HashMap<String, Arc<dyn MessageHandlerFactory>>>,
}

impl MessageDispatcher {
    pub fn builder() -> MessageDispatcherBuilder {
        MessageDispatcherBuilder::default()
    }

    pub fn message_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Validates and executes `message` with the handler registered for its type.
    #[instrument(skip_all, fields(message_id = %message.id(), message_type = %message.msg_type()))]
    pub async fn dispatch(
        &self,
        message: Message,
        context: &NotificationContext,
    ) -> Result<HandlerResult, RouteError> {
        let Some(factory) = self.factories.get(message.msg_type()) else {
            warn!("No handler registered");
            return Err(RouteError::UnregisteredType {
                message_type: message.msg_type().to_string(),
                message_id: message.id(),
            });
        };
        debug!("Dispatching");
        let handler = factory.create_handler(message, context)?;
        handler.handle_message().await
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("message_types", &self.message_types())
            .finish()
    }
}

#[derive(Default)]
pub struct MessageDispatcherBuilder {
    factories: HashMap<String, Arc<dyn MessageHandlerFactory>>,
}

impl MessageDispatcherBuilder {
    /// Registers `factory` under its own message type. A later registration for the
    /// same type replaces the earlier one.
    pub fn register(mut self, factory: Arc<dyn MessageHandlerFactory>) -> Self {
        let message_type = factory.message_type().to_string();
        if self.factories.insert(message_type.clone(), factory).is_some() {
            warn!(%message_type, "Replacing handler factory");
        }
        self
    }

    pub fn build(self) -> MessageDispatcher {
        MessageDispatcher {
            factories: Arc::new(self.factories),
        }
    }
}
