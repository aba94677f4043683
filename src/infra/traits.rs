//! Trait definitions for streamfold's store boundaries

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use tokio_stream::Stream;

use crate::domain::{LoadRequest, PositionMap, ProjectionStatus, RecordedEvent};

use super::Result;

/// Lazy event sequence returned by a merge-load. Finite per call; the
/// projector restarts it each pass.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RecordedEvent>> + Send>>;

/// Append-only event streams.
///
/// The store owns ordering within a stream; a merge-load returns events in
/// an order consistent with the store's own merge policy and the projector
/// never reorders.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn has_stream(&self, stream: &str) -> Result<bool>;

    async fn create_stream(&self, stream: &str) -> Result<()>;

    async fn delete_stream(&self, stream: &str) -> Result<()>;

    async fn append_to(&self, stream: &str, events: Vec<RecordedEvent>) -> Result<()>;

    /// Load events from several streams at once, each from its own cursor,
    /// each optionally filtered by a matcher.
    async fn merge_and_load(&self, requests: Vec<LoadRequest>) -> Result<EventStream>;
}

/// CRUD over the projection control row plus the lease statements.
///
/// Every mutating statement verifies that exactly one row was affected and
/// raises [`ProjectionError::ProjectionNotFound`] otherwise; that check is
/// the only local signal that the row was deleted out from under a runner.
/// The one exception is [`acquire_lock`](ControlStore::acquire_lock), whose
/// conditional update legitimately affects zero rows under contention and
/// reports that as `false`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ControlStore: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Insert a fresh row with empty position/state and no lock.
    async fn create(&self, name: &str, status: ProjectionStatus) -> Result<()>;

    /// Load the persisted checkpoint: `(position, state)`.
    async fn load(&self, name: &str) -> Result<(PositionMap, Value)>;

    /// The canonical checkpoint write: position, state, and a refreshed
    /// lease in one statement.
    async fn persist(
        &self,
        name: &str,
        locked_until: DateTime<Utc>,
        state: &Value,
        position: &PositionMap,
    ) -> Result<()>;

    async fn update_status(&self, name: &str, status: ProjectionStatus) -> Result<()>;

    /// Release the lease: `locked_until = NULL` plus the given status.
    async fn clear_lock(&self, name: &str, status: ProjectionStatus) -> Result<()>;

    /// Conditional lease grab: succeeds only while `locked_until` is null
    /// or expired relative to `now`. Returns whether a row was claimed.
    async fn acquire_lock(
        &self,
        name: &str,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Unconditional lease extension, used on idle passes.
    async fn refresh_lock(&self, name: &str, locked_until: DateTime<Utc>) -> Result<()>;

    /// Flip a projection back to `running` with a fresh lease, used after a
    /// reset when the runner keeps going.
    async fn resume(&self, name: &str, locked_until: DateTime<Utc>) -> Result<()>;

    /// Zero the position, replace the state, and set the given status.
    async fn reset_row(&self, name: &str, state: &Value, status: ProjectionStatus) -> Result<()>;

    async fn delete_row(&self, name: &str) -> Result<()>;
}

/// Facade the remote-control poller talks to.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProjectionManager: Send + Sync {
    async fn fetch_projection_status(&self, name: &str) -> Result<ProjectionStatus>;

    /// Mark a projection idle, e.g. when honoring a stop command.
    async fn idle_projection(&self, name: &str) -> Result<()>;

    /// All non-internal stream names known to the store. Names beginning
    /// with `$` are internal and never enumerated.
    async fn fetch_all_stream_names(&self) -> Result<Vec<String>>;
}

/// Externally persisted read model driven by a read-model projector.
///
/// The projector calls `persist` *before* writing its own checkpoint, so
/// the checkpoint never claims progress the read model has not externalized.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReadModel: Send + Sync {
    async fn init(&mut self) -> Result<()>;

    async fn is_initialized(&self) -> Result<bool>;

    async fn persist(&mut self) -> Result<()>;

    async fn reset(&mut self) -> Result<()>;

    async fn delete(&mut self) -> Result<()>;
}
