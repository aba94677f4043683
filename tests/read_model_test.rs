//! Read-model projector tests: lifecycle hook ordering and delete/reset
//! semantics against a tracking read model.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;

use common::{counter, numbered_events, Fixture};
use streamfold::{
    sync_handler, ControlStore, InMemoryControlStore, PositionMap, ProjectionStatus,
    ProjectorConfig, ReadModel, Result,
};

#[derive(Default)]
struct Tracking {
    initialized: bool,
    init_calls: u32,
    persist_calls: u32,
    reset_calls: u32,
    delete_calls: u32,
    row_position_at_first_persist: Option<PositionMap>,
}

/// Read model that records every lifecycle call. Cloning shares the record,
/// so tests keep a handle while the projector owns the boxed copy.
#[derive(Clone)]
struct TrackingReadModel {
    inner: Arc<RwLock<Tracking>>,
    control: Arc<InMemoryControlStore>,
    projection: String,
}

impl TrackingReadModel {
    fn new(control: Arc<InMemoryControlStore>, projection: &str) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Tracking::default())),
            control,
            projection: projection.to_string(),
        }
    }
}

#[async_trait]
impl ReadModel for TrackingReadModel {
    async fn init(&mut self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.initialized = true;
        inner.init_calls += 1;
        Ok(())
    }

    async fn is_initialized(&self) -> Result<bool> {
        Ok(self.inner.read().await.initialized)
    }

    async fn persist(&mut self) -> Result<()> {
        let row_position = self
            .control
            .snapshot(&self.projection)
            .await
            .map(|record| record.position);
        let mut inner = self.inner.write().await;
        inner.persist_calls += 1;
        if inner.row_position_at_first_persist.is_none() {
            inner.row_position_at_first_persist = row_position;
        }
        Ok(())
    }

    async fn reset(&mut self) -> Result<()> {
        self.inner.write().await.reset_calls += 1;
        Ok(())
    }

    async fn delete(&mut self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.delete_calls += 1;
        inner.initialized = false;
        Ok(())
    }
}

fn tracking_projector(
    fixture: &Fixture,
    name: &str,
) -> (streamfold::ReadModelProjector, TrackingReadModel) {
    let model = TrackingReadModel::new(fixture.control.clone(), name);
    let projector = fixture
        .read_model_projector(name, Box::new(model.clone()), ProjectorConfig::default())
        .init(|| json!({"seen": 0}))
        .unwrap()
        .from_stream("s", None)
        .unwrap()
        .when_any(sync_handler(|mut state, _| {
            state["seen"] = json!(counter(&state, "seen") + 1);
            state
        }))
        .unwrap();
    (projector, model)
}

#[tokio::test]
async fn read_model_is_initialized_exactly_once() {
    let fixture = Fixture::new();
    fixture.seed_stream("s", numbered_events("s", "E", 2)).await;

    let (mut projector, model) = tracking_projector(&fixture, "views");

    projector.run(false).await.unwrap();
    projector.run(false).await.unwrap();

    let inner = model.inner.read().await;
    assert_eq!(inner.init_calls, 1);
    assert!(inner.initialized);
}

#[tokio::test]
async fn read_model_persists_before_the_checkpoint_write() {
    let fixture = Fixture::new();
    fixture.seed_stream("s", numbered_events("s", "E", 3)).await;

    let (mut projector, model) = tracking_projector(&fixture, "views");
    projector.run(false).await.unwrap();

    let inner = model.inner.read().await;
    assert!(inner.persist_calls >= 1);

    // At the moment the read model persisted, the control row had not yet
    // recorded the new positions.
    let at_persist = inner
        .row_position_at_first_persist
        .as_ref()
        .expect("control row must exist when the read model persists");
    assert_eq!(at_persist.get("s"), 0);

    let record = fixture.control.snapshot("views").await.unwrap();
    assert_eq!(record.position.get("s"), 3);
    assert_eq!(record.state, json!({"seen": 3}));
}

#[tokio::test]
async fn remote_reset_drives_the_read_model_hook() {
    let fixture = Fixture::new();
    fixture.seed_stream("s", numbered_events("s", "E", 2)).await;

    let (mut projector, model) = tracking_projector(&fixture, "views");
    projector.run(false).await.unwrap();

    fixture
        .control
        .update_status("views", ProjectionStatus::Resetting)
        .await
        .unwrap();
    projector.run(false).await.unwrap();

    let inner = model.inner.read().await;
    assert_eq!(inner.reset_calls, 1);

    // The replay after the reset rebuilt the same state from scratch.
    let record = fixture.control.snapshot("views").await.unwrap();
    assert_eq!(record.position.get("s"), 2);
    assert_eq!(record.state, json!({"seen": 2}));
}

#[tokio::test]
async fn remote_delete_keeps_the_read_model_unless_purged() {
    let fixture = Fixture::new();
    fixture.seed_stream("s", numbered_events("s", "E", 1)).await;

    let (mut projector, model) = tracking_projector(&fixture, "views");
    projector.run(false).await.unwrap();

    fixture
        .control
        .update_status("views", ProjectionStatus::Deleting)
        .await
        .unwrap();
    projector.run(false).await.unwrap();

    assert!(fixture.control.snapshot("views").await.is_none());
    assert_eq!(model.inner.read().await.delete_calls, 0);
}

#[tokio::test]
async fn remote_purge_deletes_the_read_model_too() {
    let fixture = Fixture::new();
    fixture.seed_stream("s", numbered_events("s", "E", 1)).await;

    let (mut projector, model) = tracking_projector(&fixture, "views");
    projector.run(false).await.unwrap();

    fixture
        .control
        .update_status("views", ProjectionStatus::DeletingInclEmitted)
        .await
        .unwrap();
    projector.run(false).await.unwrap();

    assert!(fixture.control.snapshot("views").await.is_none());
    let inner = model.inner.read().await;
    assert_eq!(inner.delete_calls, 1);
    assert!(!inner.initialized);
}

#[tokio::test]
async fn explicit_delete_with_purge_flag() {
    let fixture = Fixture::new();
    fixture.seed_stream("s", numbered_events("s", "E", 1)).await;

    let (mut projector, model) = tracking_projector(&fixture, "views");
    projector.run(false).await.unwrap();

    projector.delete(true).await.unwrap();

    assert!(fixture.control.snapshot("views").await.is_none());
    assert_eq!(model.inner.read().await.delete_calls, 1);
}
