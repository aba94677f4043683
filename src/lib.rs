//! Streamfold
//!
//! An event-sourcing projection engine: continuously replays events from
//! append-only streams through user handlers, maintains derived state (an
//! in-memory projection state or an externally persisted read model), and
//! coordinates competing projection workers across processes via a shared
//! control table with a cooperative lease.
//!
//! ## Modules
//!
//! - [`domain`] - Passive data (events, positions, status, matchers, queries)
//! - [`infra`] - Errors, store traits, PostgreSQL and in-memory backends
//! - [`projection`] - Lease, remote-control poller, and the projector runtime
//! - [`telemetry`] - Logging setup
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use streamfold::{
//!     InMemoryControlStore, InMemoryEventStore, InMemoryProjectionManager,
//!     Projector, ProjectorConfig, sync_handler,
//! };
//!
//! # async fn example() -> streamfold::Result<()> {
//! let events = Arc::new(InMemoryEventStore::new());
//! let control = Arc::new(InMemoryControlStore::new());
//! let manager = Arc::new(InMemoryProjectionManager::new(control.clone(), events.clone()));
//!
//! let mut projector = Projector::new("order-totals", events, control, manager,
//!         ProjectorConfig::default())
//!     .init(|| json!({"count": 0}))?
//!     .from_stream("orders", None)?
//!     .when_any(sync_handler(|mut state, _event| {
//!         state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
//!         state
//!     }))?;
//!
//! projector.run(false).await?;
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod infra;
pub mod migrations;
pub mod projection;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    EventMetadata, LoadRequest, MatchCriterion, MatchField, MatchOp, MetadataMatcher, PositionMap,
    ProjectionStatus, RecordedEvent, SourceQuery,
};

pub use infra::{
    ControlRecord, ControlStore, EventStore, EventStream, InMemoryControlStore, InMemoryEventStore,
    InMemoryProjectionManager, PgControlStore, PgProjectionManager, ProjectionError,
    ProjectionManager, ReadModel, Result,
};

pub use projection::{
    handler, sync_handler, EventHandler, Handlers, Projector, ProjectorConfig, ReadModelProjector,
    StopHandle,
};
