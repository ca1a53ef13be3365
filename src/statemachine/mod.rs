//! Declarative per-partition state models and the engine that executes them.

pub mod definition;
pub mod engine;
pub mod error;
pub mod observer;
pub mod online_offline;
pub mod service;

pub use definition::*;
pub use engine::*;
pub use error::*;
pub use observer::*;
pub use service::*;
