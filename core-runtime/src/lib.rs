//! # Core Runtime
//!
//! Shared plumbing for the content crates: the validated [`config::CoreConfig`],
//! the [`events::EventBus`] that hosts subscribe to, and process-wide
//! [`logging`] setup.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
