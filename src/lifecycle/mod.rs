//! Participant wiring, startup and shutdown.

pub mod participant;
pub mod tracing;

pub use participant::{LifecycleError, Participant, ParticipantBuilder};
