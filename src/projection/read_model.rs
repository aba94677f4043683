//! Read-model projector: folds events into an externally persisted view.
//!
//! Same loop as the plain projector; the difference is the sink. The read
//! model is initialized before the first pass, persisted *before* every
//! control-row checkpoint, reset alongside the projection, and deleted when
//! `delete(true)` (or the `deleting-incl-emitted` command) asks for it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{MetadataMatcher, PositionMap, ProjectionStatus, SourceQuery};
use crate::infra::{ControlStore, EventStore, ProjectionManager, ReadModel, Result};

use super::engine::{Engine, ProjectionSink, StopHandle};
use super::handlers::{EventHandler, Handlers};
use super::ProjectorConfig;

struct ReadModelSink {
    read_model: Box<dyn ReadModel>,
}

#[async_trait]
impl ProjectionSink for ReadModelSink {
    async fn on_init(&mut self) -> Result<()> {
        if !self.read_model.is_initialized().await? {
            self.read_model.init().await?;
        }
        Ok(())
    }

    async fn on_persist(&mut self) -> Result<()> {
        self.read_model.persist().await
    }

    async fn on_reset(&mut self) -> Result<()> {
        self.read_model.reset().await
    }

    async fn on_delete(&mut self, purge: bool) -> Result<()> {
        if purge {
            self.read_model.delete().await?;
        }
        Ok(())
    }
}

/// A projection that drives a user-supplied [`ReadModel`] while tracking
/// positions and scratch state in the shared control table.
pub struct ReadModelProjector {
    engine: Engine,
}

impl ReadModelProjector {
    pub fn new(
        name: impl Into<String>,
        event_store: Arc<dyn EventStore>,
        control: Arc<dyn ControlStore>,
        manager: Arc<dyn ProjectionManager>,
        read_model: Box<dyn ReadModel>,
        config: ProjectorConfig,
    ) -> Self {
        let sink = Box::new(ReadModelSink { read_model });
        Self {
            engine: Engine::new(name, event_store, control, manager, config, sink),
        }
    }

    // --- configuration ------------------------------------------------

    /// Seed the scratch state. The thunk re-runs on every reset.
    pub fn init<F>(mut self, thunk: F) -> Result<Self>
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.engine.set_init(Arc::new(thunk))?;
        Ok(self)
    }

    pub fn from_all(mut self) -> Result<Self> {
        self.engine.set_query(SourceQuery::All)?;
        Ok(self)
    }

    pub fn from_stream(
        mut self,
        stream: impl Into<String>,
        matcher: Option<MetadataMatcher>,
    ) -> Result<Self> {
        self.engine.set_query(SourceQuery::stream(stream, matcher))?;
        Ok(self)
    }

    pub fn from_streams<I, S>(mut self, streams: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Option<MetadataMatcher>)>,
        S: Into<String>,
    {
        self.engine.set_query(SourceQuery::streams(streams))?;
        Ok(self)
    }

    pub fn when(mut self, handlers: HashMap<String, EventHandler>) -> Result<Self> {
        self.engine.set_handlers(Handlers::Named(handlers))?;
        Ok(self)
    }

    pub fn when_any(mut self, handler: EventHandler) -> Result<Self> {
        self.engine.set_handlers(Handlers::Any(handler))?;
        Ok(self)
    }

    // --- running ------------------------------------------------------

    pub async fn run(&mut self, keep_running: bool) -> Result<()> {
        self.engine.run(keep_running).await
    }

    /// Delete the projection row, and the read model itself when
    /// `delete_projection` is set.
    pub async fn delete(&mut self, delete_projection: bool) -> Result<()> {
        self.engine.delete(delete_projection).await
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.engine.stop_handle()
    }

    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// Current scratch state, if initialized.
    pub fn state(&self) -> Option<&Value> {
        self.engine.state()
    }

    pub fn positions(&self) -> &PositionMap {
        self.engine.positions()
    }

    pub fn status(&self) -> ProjectionStatus {
        self.engine.status()
    }
}
