//! Observability sink for attempted transitions.

use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Succeeded,
    Stale,
    Illegal,
    Dropped,
    HandlerFailed(String),
}

impl fmt::Display for TransitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionOutcome::Succeeded => write!(f, "succeeded"),
            TransitionOutcome::Stale => write!(f, "stale"),
            TransitionOutcome::Illegal => write!(f, "illegal"),
            TransitionOutcome::Dropped => write!(f, "instance dropped"),
            TransitionOutcome::HandlerFailed(reason) => write!(f, "handler failed: {reason}"),
        }
    }
}

/// One attempted transition, as reported to a [`TransitionObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    pub resource: String,
    pub partition: String,
    pub state_model: String,
    pub from: String,
    pub to: String,
    pub outcome: TransitionOutcome,
}

/// Receives one record per attempted transition. Implementations must not fail.
pub trait TransitionObserver: Send + Sync {
    fn record(&self, record: &TransitionRecord);
}

/// Default sink: writes every record to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl TransitionObserver for LoggingObserver {
    fn record(&self, r: &TransitionRecord) {
        match r.outcome {
            TransitionOutcome::Succeeded => info!(
                resource = %r.resource,
                partition = %r.partition,
                state_model = %r.state_model,
                from = %r.from,
                to = %r.to,
                "Transition completed"
            ),
            _ => warn!(
                resource = %r.resource,
                partition = %r.partition,
                state_model = %r.state_model,
                from = %r.from,
                to = %r.to,
                outcome = %r.outcome,
                "Transition not applied"
            ),
        }
    }
}
