//! Reply correlation and type-based message routing.
//!
//! - [`CallbackRegistry`] - correlation id to pending callback, with timeouts
//! - [`AsyncCallbackService`] - validates `TASK_REPLY` messages and feeds the registry
//! - [`MessageDispatcher`] - routes any message to the factory registered for its type

pub mod callback;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod registry;
pub mod service;

pub use callback::*;
pub use dispatcher::*;
pub use error::*;
pub use handler::*;
pub use registry::*;
pub use service::*;
