//! Adapter exposing the [`StateTransitionEngine`] to the message dispatcher.

use super::engine::StateTransitionEngine;
use crate::messaging::{HandlerResult, MessageHandler, MessageHandlerFactory, RouteError};
use crate::model::{Message, MessageType, NotificationContext};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct StateTransitionService {
    engine: Arc<StateTransitionEngine>,
}

impl StateTransitionService {
    pub fn new(engine: Arc<StateTransitionEngine>) -> Self {
        Self { engine }
    }
}

impl MessageHandlerFactory for StateTransitionService {
    fn message_type(&self) -> &str {
        MessageType::StateTransition.as_str()
    }

    fn create_handler(
        &self,
        message: Message,
        context: &NotificationContext,
    ) -> Result<Box<dyn MessageHandler>, RouteError> {
        Ok(Box::new(StateTransitionHandler {
            engine: self.engine.clone(),
            message,
            context: context.clone(),
        }))
    }
}

struct StateTransitionHandler {
    engine: Arc<StateTransitionEngine>,
    message: Message,
    context: NotificationContext,
}

#[async_trait]
impl MessageHandler for StateTransitionHandler {
    async fn handle_message(self: Box<Self>) -> Result<HandlerResult, RouteError> {
        self.engine.execute(&self.message, &self.context).await?;
        Ok(HandlerResult::success()
            .with("fromState", self.message.from_state().unwrap_or_default())
            .with("toState", self.message.to_state().unwrap_or_default()))
    }
}
