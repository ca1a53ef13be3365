//! Built-in `OnlineOffline` state model used by simple agent participants.

use super::definition::{StateModelDefinition, DROPPED};
use super::error::{BoxError, DefinitionError};
use crate::model::{Message, NotificationContext};
use tracing::info;

pub const ONLINE_OFFLINE: &str = "OnlineOffline";
pub const ONLINE: &str = "ONLINE";
pub const OFFLINE: &str = "OFFLINE";

/// `OFFLINE` (initial) <-> `ONLINE`, plus an explicit `OFFLINE -> DROPPED`.
pub fn online_offline() -> Result<StateModelDefinition, DefinitionError> {
    StateModelDefinition::builder(ONLINE_OFFLINE)
        .initial_state(OFFLINE)
        .states([ONLINE])
        .transition_fn(OFFLINE, ONLINE, log_become)
        .transition_fn(ONLINE, OFFLINE, log_become)
        .transition_fn(OFFLINE, DROPPED, log_become)
        .build()
}

fn log_become(message: &Message, context: &NotificationContext) -> Result<(), BoxError> {
    info!(
        instance = context.instance_name(),
        "Become {} from {} for resource: {}, partition: {}",
        message.to_state().unwrap_or_default(),
        message.from_state().unwrap_or_default(),
        message.resource_name().unwrap_or_default(),
        message.partition_name().unwrap_or_default()
    );
    Ok(())
}
