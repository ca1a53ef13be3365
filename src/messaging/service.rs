//! # Async Callback Service
//!
//! Accepts `TASK_REPLY` messages and hands them to the callback registered under their
//! correlation id.
//!
//! Validation runs in a fixed order and stops at the first failure:
//!
//! 1. the message type must be `TASK_REPLY`;
//! 2. a non-empty correlation id must be present;
//! 3. the target session must be the current one, or `*`;
//! 4. the correlation id must resolve to a registered callback.
//!
//! Every rejection is a [`DispatchError`] carrying the offending message id.

use super::callback::{CallbackHandle, CallbackRegistration, ReplyOutcome};
use super::error::{DispatchError, DispatchErrorKind, RouteError};
use super::handler::{HandlerResult, MessageHandler, MessageHandlerFactory};
use super::registry::CallbackRegistry;
use crate::model::{Message, MessageType, NotificationContext};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AsyncCallbackService {
    registry: Arc<CallbackRegistry>,
}

impl AsyncCallbackService {
    pub fn new(registry: Arc<CallbackRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// The only message type this service accepts.
    pub fn get_message_type(&self) -> &'static str {
        MessageType::TaskReply.as_str()
    }

    /// Registers a callback for replies correlated with `correlation_id`.
    pub fn register_async_callback(
        &self,
        correlation_id: impl Into<String>,
        registration: CallbackRegistration,
    ) -> Arc<CallbackHandle> {
        self.registry.register(correlation_id, registration)
    }

    /// Validates `message` and binds it to its callback.
    pub fn create_handler(
        &self,
        message: Message,
        context: &NotificationContext,
    ) -> Result<AsyncCallbackHandler, DispatchError> {
        let reject = |kind: DispatchErrorKind| {
            warn!(message_id = %message.id(), reason = %kind, "Rejecting reply");
            DispatchError::new(kind, message.id())
        };

        if message.msg_type() != self.get_message_type() {
            return Err(reject(DispatchErrorKind::TypeMismatch {
                expected: self.get_message_type().to_string(),
                actual: message.msg_type().to_string(),
            }));
        }

        let correlation_id = message
            .correlation_id()
            .ok_or_else(|| reject(DispatchErrorKind::MissingCorrelation))?
            .to_string();

        let current = context.session_id();
        match message.target_session_id() {
            Some(target) if target.accepts(&current) => {}
            target => {
                return Err(reject(DispatchErrorKind::SessionMismatch {
                    target: target.map(|t| t.to_string()).unwrap_or_default(),
                    current: current.to_string(),
                }));
            }
        }

        let callback = self
            .registry
            .lookup(&correlation_id)
            .map_err(|_| reject(DispatchErrorKind::UnknownCorrelation(correlation_id.clone())))?;

        debug!(message_id = %message.id(), %correlation_id, "Reply accepted");
        Ok(AsyncCallbackHandler {
            message,
            correlation_id,
            callback,
            registry: self.registry.clone(),
        })
    }
}

impl MessageHandlerFactory for AsyncCallbackService {
    fn message_type(&self) -> &str {
        self.get_message_type()
    }

    fn create_handler(
        &self,
        message: Message,
        context: &NotificationContext,
    ) -> Result<Box<dyn MessageHandler>, RouteError> {
        let handler = AsyncCallbackService::create_handler(self, message, context)?;
        Ok(Box::new(handler))
    }
}

/// A validated reply bound to its callback.
#[derive(Debug)]
pub struct AsyncCallbackHandler {
    message: Message,
    correlation_id: String,
    callback: Arc<CallbackHandle>,
    registry: Arc<CallbackRegistry>,
}

impl AsyncCallbackHandler {
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn callback(&self) -> &Arc<CallbackHandle> {
        &self.callback
    }

    /// Delivers the reply. Cannot fail once the handler exists; a callback that
    /// finished in the meantime simply ignores the reply.
    pub fn handle_message(self) -> HandlerResult {
        info!(
            message_id = %self.message.id(),
            correlation_id = %self.correlation_id,
            "Invoking reply callback"
        );
        let outcome = self.registry.deliver(&self.callback, &self.message);
        HandlerResult::success()
            .with("correlationId", self.correlation_id)
            .with("completed", (outcome == ReplyOutcome::Completed).to_string())
    }
}

#[async_trait]
impl MessageHandler for AsyncCallbackHandler {
    async fn handle_message(self: Box<Self>) -> Result<HandlerResult, RouteError> {
        Ok(AsyncCallbackHandler::handle_message(*self))
    }
}
