//! Backend runtime entry point and public API surface.
//!
//! This crate owns playback coordination and incremental subtitle generation:
//! the chunk scheduler, the two-priority job queue, the single transcription
//! worker and the caption timeline cache they share. The runtime routes bridge
//! messages to the coordinator and drives it from periodic ticks.

mod app;
pub mod config;
pub mod coordinator;
pub mod display;
pub mod job;
pub mod queue;
mod runtime;
pub mod scheduler;
pub mod sidecar;
pub mod state;
pub mod timeline;
pub mod worker;

pub use crate::runtime::run;
