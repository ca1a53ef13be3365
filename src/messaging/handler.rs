//! The two-phase handler contract shared by every message type.
//!
//! A [`MessageHandlerFactory`] validates a message and binds it to whatever state it
//! needs ([`create_handler`](MessageHandlerFactory::create_handler)). Only a message
//! that passed validation ever reaches [`MessageHandler::handle_message`], so a stale or
//! malformed message is rejected before any callback or state model is touched.

use super::error::RouteError;
use crate::model::{Message, NotificationContext};
use async_trait::async_trait;
use std::collections::HashMap;

/// Outcome returned to the dispatch loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerResult {
    pub success: bool,
    pub result: HashMap<String, String>,
}

impl HandlerResult {
    pub fn success() -> Self {
        Self {
            success: true,
            result: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.result.insert(key.into(), value.into());
        self
    }
}

/// A validated message bound to its target.
#[async_trait]
pub trait MessageHandler: Send {
    async fn handle_message(self: Box<Self>) -> Result<HandlerResult, RouteError>;
}

/// Builds handlers for exactly one message type.
pub trait MessageHandlerFactory: Send + Sync {
    fn message_type(&self) -> &str;

    fn create_handler(
        &self,
        message: Message,
        context: &NotificationContext,
    ) -> Result<Box<dyn MessageHandler>, RouteError>;
}
