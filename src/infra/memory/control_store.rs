//! In-memory control-record store for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::{PositionMap, ProjectionStatus};
use crate::infra::{ControlStore, ProjectionError, Result};

/// A full control record, exposed for inspection in tests and tooling.
#[derive(Debug, Clone)]
pub struct ControlRecord {
    pub position: PositionMap,
    pub state: Value,
    pub status: ProjectionStatus,
    pub locked_until: Option<DateTime<Utc>>,
}

impl ControlRecord {
    fn fresh(status: ProjectionStatus) -> Self {
        Self {
            position: PositionMap::new(),
            state: Value::Object(serde_json::Map::new()),
            status,
            locked_until: None,
        }
    }
}

/// In-memory implementation of [`ControlStore`].
#[derive(Default)]
pub struct InMemoryControlStore {
    records: RwLock<HashMap<String, ControlRecord>>,
}

impl InMemoryControlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a record for inspection. Not part of the trait.
    pub async fn snapshot(&self, name: &str) -> Option<ControlRecord> {
        self.records.read().await.get(name).cloned()
    }

    /// Overwrite a record wholesale, e.g. to seed a checkpoint in tests.
    pub async fn put(&self, name: impl Into<String>, record: ControlRecord) {
        self.records.write().await.insert(name.into(), record);
    }

    async fn with_record<F, T>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut ControlRecord) -> T,
    {
        let mut records = self.records.write().await;
        match records.get_mut(name) {
            Some(record) => Ok(f(record)),
            None => Err(ProjectionError::ProjectionNotFound(name.to_string())),
        }
    }
}

#[async_trait]
impl ControlStore for InMemoryControlStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.records.read().await.contains_key(name))
    }

    async fn create(&self, name: &str, status: ProjectionStatus) -> Result<()> {
        self.records
            .write()
            .await
            .insert(name.to_string(), ControlRecord::fresh(status));
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<(PositionMap, Value)> {
        let records = self.records.read().await;
        match records.get(name) {
            Some(record) => Ok((record.position.clone(), record.state.clone())),
            None => Err(ProjectionError::ProjectionNotFound(name.to_string())),
        }
    }

    async fn persist(
        &self,
        name: &str,
        locked_until: DateTime<Utc>,
        state: &Value,
        position: &PositionMap,
    ) -> Result<()> {
        self.with_record(name, |record| {
            record.position = position.clone();
            record.state = state.clone();
            record.locked_until = Some(locked_until);
        })
        .await
    }

    async fn update_status(&self, name: &str, status: ProjectionStatus) -> Result<()> {
        self.with_record(name, |record| record.status = status).await
    }

    async fn clear_lock(&self, name: &str, status: ProjectionStatus) -> Result<()> {
        self.with_record(name, |record| {
            record.locked_until = None;
            record.status = status;
        })
        .await
    }

    async fn acquire_lock(
        &self,
        name: &str,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(name) {
            Some(record) => {
                let free = record.locked_until.map_or(true, |until| until < now);
                if free {
                    record.locked_until = Some(locked_until);
                    record.status = ProjectionStatus::Running;
                }
                Ok(free)
            }
            None => Ok(false),
        }
    }

    async fn refresh_lock(&self, name: &str, locked_until: DateTime<Utc>) -> Result<()> {
        self.with_record(name, |record| record.locked_until = Some(locked_until))
            .await
    }

    async fn resume(&self, name: &str, locked_until: DateTime<Utc>) -> Result<()> {
        self.with_record(name, |record| {
            record.status = ProjectionStatus::Running;
            record.locked_until = Some(locked_until);
        })
        .await
    }

    async fn reset_row(&self, name: &str, state: &Value, status: ProjectionStatus) -> Result<()> {
        self.with_record(name, |record| {
            record.position = PositionMap::new();
            record.state = state.clone();
            record.status = status;
        })
        .await
    }

    async fn delete_row(&self, name: &str) -> Result<()> {
        let mut records = self.records.write().await;
        match records.remove(name) {
            Some(_) => Ok(()),
            None => Err(ProjectionError::ProjectionNotFound(name.to_string())),
        }
    }
}
