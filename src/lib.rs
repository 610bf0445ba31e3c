// Clippy allows for reasonable defaults
#![allow(clippy::too_many_arguments)] // Synthesis takes the whole evidence set at once
#![allow(clippy::new_without_default)] // Default not always appropriate for stateful types
#![allow(clippy::derivable_impls)] // Explicit Default impls can be clearer

// Module declarations
pub mod config;
pub mod error;
pub mod events;
pub mod interview;
pub mod models;
pub mod orchestration;
pub mod shutdown;
pub mod storage;
pub mod synthesis;

// Server module (HTTP/WebSocket API)
pub mod server;

pub use error::{EngineError, EngineResult};
pub use interview::InterviewEngine;
