//! Pipeline event bus.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PipelineEvent`] -- lifecycle event emitted by the process launcher
//!   (queued, started, progress, completed, failed).

pub mod bus;

pub use bus::{EventBus, PipelineEvent, PipelineEventKind};
