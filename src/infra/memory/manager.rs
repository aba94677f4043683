//! In-memory projection manager facade.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::ProjectionStatus;
use crate::infra::{ControlStore, ProjectionManager, Result};

use super::{InMemoryControlStore, InMemoryEventStore};

/// In-memory implementation of [`ProjectionManager`], delegating to the
/// in-memory control store and event store it was built over.
pub struct InMemoryProjectionManager {
    control: Arc<InMemoryControlStore>,
    events: Arc<InMemoryEventStore>,
}

impl InMemoryProjectionManager {
    pub fn new(control: Arc<InMemoryControlStore>, events: Arc<InMemoryEventStore>) -> Self {
        Self { control, events }
    }
}

#[async_trait]
impl ProjectionManager for InMemoryProjectionManager {
    async fn fetch_projection_status(&self, name: &str) -> Result<ProjectionStatus> {
        match self.control.snapshot(name).await {
            Some(record) => Ok(record.status),
            None => Err(crate::infra::ProjectionError::ProjectionNotFound(
                name.to_string(),
            )),
        }
    }

    async fn idle_projection(&self, name: &str) -> Result<()> {
        self.control.update_status(name, ProjectionStatus::Idle).await
    }

    async fn fetch_all_stream_names(&self) -> Result<Vec<String>> {
        Ok(self
            .events
            .stream_names()
            .await
            .into_iter()
            .filter(|name| !name.starts_with('$'))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::EventStore;

    #[tokio::test]
    async fn internal_streams_are_excluded_from_enumeration() {
        let control = Arc::new(InMemoryControlStore::new());
        let events = Arc::new(InMemoryEventStore::new());
        events.create_stream("orders").await.unwrap();
        events.create_stream("$internal").await.unwrap();

        let manager = InMemoryProjectionManager::new(control, events);
        let names = manager.fetch_all_stream_names().await.unwrap();
        assert_eq!(names, vec!["orders".to_string()]);
    }

    #[tokio::test]
    async fn status_fetch_reflects_the_control_row() {
        let control = Arc::new(InMemoryControlStore::new());
        let events = Arc::new(InMemoryEventStore::new());
        control.create("p", ProjectionStatus::Stopping).await.unwrap();

        let manager = InMemoryProjectionManager::new(control.clone(), events);
        let status = manager.fetch_projection_status("p").await.unwrap();
        assert_eq!(status, ProjectionStatus::Stopping);

        manager.idle_projection("p").await.unwrap();
        let record = control.snapshot("p").await.unwrap();
        assert_eq!(record.status, ProjectionStatus::Idle);
    }
}
