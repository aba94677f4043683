//! Projection runtime for streamfold
//!
//! Replays events from append-only streams through user handlers with:
//! - Per-stream position cursors checkpointed in a shared control table
//! - A cooperative lease (`locked_until`) coordinating competing runners
//! - Remote lifecycle control (stop / reset / delete) via the status column
//! - Batched persistence with at-least-once delivery semantics

mod config;
mod engine;
mod handlers;
mod lease;
mod poller;
mod projector;
mod read_model;

pub use config::ProjectorConfig;
pub use engine::StopHandle;
pub use handlers::{handler, sync_handler, EventHandler, HandlerFuture, Handlers};
pub use lease::Lease;
pub use poller::StatusPoller;
pub use projector::Projector;
pub use read_model::ReadModelProjector;
