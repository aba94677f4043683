//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};

use streamfold::{
    EventStore, InMemoryControlStore, InMemoryEventStore, InMemoryProjectionManager, Projector,
    ProjectorConfig, ReadModel, ReadModelProjector, RecordedEvent,
};

/// In-memory backend trio shared by a test.
pub struct Fixture {
    pub events: Arc<InMemoryEventStore>,
    pub control: Arc<InMemoryControlStore>,
    pub manager: Arc<InMemoryProjectionManager>,
}

impl Fixture {
    pub fn new() -> Self {
        let events = Arc::new(InMemoryEventStore::new());
        let control = Arc::new(InMemoryControlStore::new());
        let manager = Arc::new(InMemoryProjectionManager::new(control.clone(), events.clone()));
        Self {
            events,
            control,
            manager,
        }
    }

    pub fn projector(&self, name: &str, config: ProjectorConfig) -> Projector {
        Projector::new(
            name,
            self.events.clone(),
            self.control.clone(),
            self.manager.clone(),
            config,
        )
    }

    pub fn read_model_projector(
        &self,
        name: &str,
        read_model: Box<dyn ReadModel>,
        config: ProjectorConfig,
    ) -> ReadModelProjector {
        ReadModelProjector::new(
            name,
            self.events.clone(),
            self.control.clone(),
            self.manager.clone(),
            read_model,
            config,
        )
    }

    /// Create `stream` and append the given events to it.
    pub async fn seed_stream(&self, stream: &str, events: Vec<RecordedEvent>) {
        self.events.create_stream(stream).await.unwrap();
        if !events.is_empty() {
            self.events.append_to(stream, events).await.unwrap();
        }
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand event constructor.
pub fn event(stream: &str, no: u64, name: &str) -> RecordedEvent {
    RecordedEvent::new(stream, no, name, json!({"no": no}))
}

/// A numbered run of same-named events.
pub fn numbered_events(stream: &str, name: &str, count: u64) -> Vec<RecordedEvent> {
    (1..=count).map(|no| event(stream, no, name)).collect()
}

/// Read an integer counter out of a JSON state object.
pub fn counter(state: &Value, key: &str) -> i64 {
    state[key].as_i64().unwrap_or(0)
}
