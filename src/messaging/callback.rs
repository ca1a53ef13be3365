//! # Pending Callbacks
//!
//! A callback is registered before a batch of requests is sent out and is resolved
//! as replies come back. It ends in exactly one of two terminal outcomes:
//!
//! - **Completed**: every sent message has a reply.
//! - **Timed out**: the deadline passed first.
//!
//! The decision is taken under the callback's own lock, so a reply racing a timeout
//! always produces one winner. User hooks run after that lock is released but under a
//! second per-callback lock, so they never overlap: every `on_reply_message` of an
//! accepted reply returns before `on_complete` or `on_timeout` starts. A hook must not
//! feed a reply to, or expire, its own callback.

use crate::model::{Message, MessageId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Hooks invoked by the registry as a callback progresses.
pub trait AsyncCallback: Send + Sync {
    /// Called once per distinct reply accepted before the callback finished.
    fn on_reply_message(&self, reply: &Message);

    /// Called exactly once when every sent message has been answered.
    fn on_complete(&self) {}

    /// Called exactly once when the deadline passes before completion.
    fn on_timeout(&self) {}
}

/// Everything needed to register a callback.
pub struct CallbackRegistration {
    pub(crate) hooks: Arc<dyn AsyncCallback>,
    pub(crate) sent_messages: Vec<Message>,
    pub(crate) timeout: Option<Duration>,
}

impl CallbackRegistration {
    pub fn new(hooks: Arc<dyn AsyncCallback>) -> Self {
        Self {
            hooks,
            sent_messages: Vec::new(),
            timeout: None,
        }
    }

    /// The requests this callback expects replies for.
    pub fn with_messages_sent(mut self, messages: Vec<Message>) -> Self {
        self.sent_messages = messages;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for CallbackRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistration")
            .field("sent_messages", &self.sent_messages.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Snapshot of a callback's bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCallback {
    pub correlation_id: String,
    pub sent_messages: Vec<Message>,
    pub received_replies: HashSet<MessageId>,
    pub done: bool,
    pub timed_out: bool,
    pub deadline: Option<Instant>,
}

/// What happened to a reply handed to a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Recorded; more replies are still expected.
    Recorded,
    /// Recorded, and it was the last one missing.
    Completed,
    /// The callback had already finished, was replaced, or saw this reply before.
    Ignored,
}

/// A registered callback, shared between the registry, its timer and in-flight handlers.
pub struct CallbackHandle {
    hooks: Arc<dyn AsyncCallback>,
    state: Mutex<State>,
    hook_order: Mutex<()>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

struct State {
    pending: PendingCallback,
    discarded: bool,
}

impl CallbackHandle {
    pub(crate) fn new(correlation_id: String, registration: CallbackRegistration) -> Self {
        let deadline = registration.timeout.map(|timeout| Instant::now() + timeout);
        Self {
            hooks: registration.hooks,
            state: Mutex::new(State {
                pending: PendingCallback {
                    correlation_id,
                    sent_messages: registration.sent_messages,
                    received_replies: HashSet::new(),
                    done: false,
                    timed_out: false,
                    deadline,
                },
                discarded: false,
            }),
            hook_order: Mutex::new(()),
            timer: Mutex::new(None),
        }
    }

    pub fn correlation_id(&self) -> String {
        self.state.lock().pending.correlation_id.clone()
    }

    pub fn is_done(&self) -> bool {
        self.state.lock().pending.done
    }

    pub fn is_timed_out(&self) -> bool {
        self.state.lock().pending.timed_out
    }

    pub fn received_replies(&self) -> HashSet<MessageId> {
        self.state.lock().pending.received_replies.clone()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.state.lock().pending.deadline
    }

    pub fn snapshot(&self) -> PendingCallback {
        self.state.lock().pending.clone()
    }

    /// Replaces the set of requests awaiting replies. Ignored once the callback finished.
    pub fn set_messages_sent(&self, messages: Vec<Message>) {
        let mut state = self.state.lock();
        if !state.pending.done {
            state.pending.sent_messages = messages;
        }
    }

    pub(crate) fn arm_timer(&self, timer: JoinHandle<()>) {
        *self.timer.lock() = Some(timer);
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
    }

    pub(crate) fn accept_reply(&self, reply: &Message) -> ReplyOutcome {
        let _hooks = self.hook_order.lock();
        let completed = {
            let mut state = self.state.lock();
            if state.pending.done || state.discarded {
                return ReplyOutcome::Ignored;
            }
            if !state.pending.received_replies.insert(reply.id()) {
                return ReplyOutcome::Ignored;
            }
            let completed =
                state.pending.received_replies.len() >= state.pending.sent_messages.len();
            if completed {
                state.pending.done = true;
            }
            completed
        };

        self.hooks.on_reply_message(reply);
        if completed {
            self.cancel_timer();
            self.hooks.on_complete();
            ReplyOutcome::Completed
        } else {
            ReplyOutcome::Recorded
        }
    }

    /// Fires the timeout outcome. Returns false when the callback had already finished.
    pub(crate) fn expire(&self) -> bool {
        let _hooks = self.hook_order.lock();
        {
            let mut state = self.state.lock();
            if state.pending.done || state.discarded {
                return false;
            }
            state.pending.done = true;
            state.pending.timed_out = true;
        }
        self.cancel_timer();
        self.hooks.on_timeout();
        true
    }

    /// Drops the callback silently, as happens when its key is re-registered.
    pub(crate) fn discard(&self) {
        self.state.lock().discarded = true;
        self.cancel_timer();
    }
}

impl std::fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CallbackHandle")
            .field("correlation_id", &state.pending.correlation_id)
            .field("sent", &state.pending.sent_messages.len())
            .field("replied", &state.pending.received_replies.len())
            .field("done", &state.pending.done)
            .field("timed_out", &state.pending.timed_out)
            .finish()
    }
}
