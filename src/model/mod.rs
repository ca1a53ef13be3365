//! Plain data carried through the participant: messages, ids and delivery context.

pub mod context;
pub mod message;

pub use context::*;
pub use message::*;
