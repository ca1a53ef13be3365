//! # Callback Registry
//!
//! Maps correlation ids to [`CallbackHandle`]s and owns their timeout clocks.
//!
//! ## Concurrency
//!
//! Entries live in a sharded [`DashMap`], so unrelated correlation ids never contend on
//! a single lock. Resolution of one callback (reply vs. timeout) is linearized by the
//! handle's own mutex: the first to take it wins and the loser is a no-op.
//!
//! Finished callbacks are evicted, but only when the map still points at the same
//! handle. A re-registration that raced the eviction is left untouched.

use super::callback::{CallbackHandle, CallbackRegistration, ReplyOutcome};
use super::error::CallbackError;
use crate::model::Message;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type Entries = Arc<DashMap<String, Arc<CallbackHandle>>>;

#[derive(Debug, Default)]
pub struct CallbackRegistry {
    entries: Entries,
    default_timeout: Option<Duration>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `timeout` to registrations that do not carry their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Stores a callback under `correlation_id`, replacing any previous one.
    ///
    /// The replaced callback is discarded without notification. When a deadline is
    /// configured the timeout clock starts now; this needs a Tokio runtime.
    pub fn register(
        &self,
        correlation_id: impl Into<String>,
        mut registration: CallbackRegistration,
    ) -> Arc<CallbackHandle> {
        let correlation_id = correlation_id.into();
        if registration.timeout.is_none() {
            registration.timeout = self.default_timeout;
        }
        let handle = Arc::new(CallbackHandle::new(correlation_id.clone(), registration));

        // The entry must be visible before the timer can fire, or its eviction misses.
        if let Some(previous) = self.entries.insert(correlation_id.clone(), handle.clone()) {
            previous.discard();
            debug!(%correlation_id, "Replaced existing callback");
        }
        self.arm_timer(&correlation_id, &handle);
        debug!(%correlation_id, size = self.entries.len(), "Registered callback");
        handle
    }

    pub fn lookup(&self, correlation_id: &str) -> Result<Arc<CallbackHandle>, CallbackError> {
        self.entries
            .get(correlation_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CallbackError::NotFound(correlation_id.to_string()))
    }

    /// Routes a reply to the callback named by its correlation id.
    pub fn on_reply(&self, message: &Message) -> Result<ReplyOutcome, CallbackError> {
        let correlation_id = message
            .correlation_id()
            .ok_or(CallbackError::MissingCorrelation(message.id()))?;
        let handle = self
            .lookup(correlation_id)
            .map_err(|_| CallbackError::UnknownCorrelation {
                message_id: message.id(),
                correlation_id: correlation_id.to_string(),
            })?;
        Ok(self.deliver(&handle, message))
    }

    /// Fires the timeout outcome for `correlation_id` unless it already finished.
    ///
    /// Returns true if the timeout hook ran.
    pub fn on_timeout(&self, correlation_id: &str) -> bool {
        match self.lookup(correlation_id) {
            Ok(handle) => expire(&self.entries, correlation_id, &handle),
            Err(_) => false,
        }
    }

    /// Removes a callback without running any hook.
    pub fn cancel(&self, correlation_id: &str) -> Option<Arc<CallbackHandle>> {
        let (_, handle) = self.entries.remove(correlation_id)?;
        handle.discard();
        debug!(%correlation_id, "Cancelled callback");
        Some(handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hands `message` to an already resolved callback.
    pub(crate) fn deliver(&self, handle: &Arc<CallbackHandle>, message: &Message) -> ReplyOutcome {
        let outcome = handle.accept_reply(message);
        match outcome {
            ReplyOutcome::Completed => {
                let correlation_id = handle.correlation_id();
                evict(&self.entries, &correlation_id, handle);
                info!(%correlation_id, message_id = %message.id(), "Callback completed");
            }
            ReplyOutcome::Recorded => {
                debug!(message_id = %message.id(), "Reply recorded");
            }
            ReplyOutcome::Ignored => {
                debug!(message_id = %message.id(), "Late or duplicate reply ignored");
            }
        }
        outcome
    }

    fn arm_timer(&self, correlation_id: &str, handle: &Arc<CallbackHandle>) {
        let Some(deadline) = handle.deadline() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%correlation_id, "No Tokio runtime, callback timeout not scheduled");
            return;
        };

        let entries = self.entries.clone();
        let key = correlation_id.to_string();
        let target = Arc::downgrade(handle);
        let timer = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(handle) = target.upgrade() {
                expire(&entries, &key, &handle);
            }
        });
        handle.arm_timer(timer);
    }
}

fn expire(entries: &Entries, correlation_id: &str, handle: &Arc<CallbackHandle>) -> bool {
    let fired = handle.expire();
    if fired {
        evict(entries, correlation_id, handle);
        warn!(%correlation_id, "Callback timed out");
    }
    fired
}

fn evict(entries: &Entries, correlation_id: &str, handle: &Arc<CallbackHandle>) {
    entries.remove_if(correlation_id, |_, current| Arc::ptr_eq(current, handle));
}
