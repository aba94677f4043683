//! Plain projector: folds events into an in-memory JSON state.
//!
//! Emitted events go to a stream named after the projection; `delete(true)`
//! and operator `deleting-incl-emitted` commands remove that stream along
//! with the control row.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::domain::{MetadataMatcher, PositionMap, ProjectionStatus, RecordedEvent, SourceQuery};
use crate::infra::{ControlStore, EventStore, ProjectionManager, Result};

use super::engine::{Engine, ProjectionSink, StopHandle};
use super::handlers::{EventHandler, Handlers};
use super::ProjectorConfig;

/// Sink for the plain projector: manages the emitted-events stream.
struct EmittedStreamSink {
    stream: String,
    event_store: Arc<dyn EventStore>,
}

impl EmittedStreamSink {
    async fn delete_emitted_stream(&self) -> Result<()> {
        if self.event_store.has_stream(&self.stream).await? {
            self.event_store.delete_stream(&self.stream).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectionSink for EmittedStreamSink {
    async fn on_reset(&mut self) -> Result<()> {
        self.delete_emitted_stream().await
    }

    async fn on_delete(&mut self, purge: bool) -> Result<()> {
        if purge {
            self.delete_emitted_stream().await?;
        }
        Ok(())
    }
}

/// A projection over one or more event streams, folding into JSON state
/// checkpointed in the shared control table.
///
/// Configuration is write-once: `init`, one of the `from_*` methods, and
/// one of the `when*` methods must each be called exactly once before
/// [`run`](Projector::run). Second calls fail synchronously.
pub struct Projector {
    engine: Engine,
    event_store: Arc<dyn EventStore>,
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector").finish_non_exhaustive()
    }
}

impl Projector {
    pub fn new(
        name: impl Into<String>,
        event_store: Arc<dyn EventStore>,
        control: Arc<dyn ControlStore>,
        manager: Arc<dyn ProjectionManager>,
        config: ProjectorConfig,
    ) -> Self {
        let name = name.into();
        let sink = Box::new(EmittedStreamSink {
            stream: name.clone(),
            event_store: event_store.clone(),
        });
        Self {
            engine: Engine::new(name, event_store.clone(), control, manager, config, sink),
            event_store,
        }
    }

    // --- configuration ------------------------------------------------

    /// Seed the projection state. The thunk re-runs on every reset.
    pub fn init<F>(mut self, thunk: F) -> Result<Self>
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.engine.set_init(Arc::new(thunk))?;
        Ok(self)
    }

    /// Consume every non-internal stream known to the store.
    pub fn from_all(mut self) -> Result<Self> {
        self.engine.set_query(SourceQuery::All)?;
        Ok(self)
    }

    /// Consume a single stream.
    pub fn from_stream(
        mut self,
        stream: impl Into<String>,
        matcher: Option<MetadataMatcher>,
    ) -> Result<Self> {
        self.engine.set_query(SourceQuery::stream(stream, matcher))?;
        Ok(self)
    }

    /// Consume a fixed set of streams.
    pub fn from_streams<I, S>(mut self, streams: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Option<MetadataMatcher>)>,
        S: Into<String>,
    {
        self.engine.set_query(SourceQuery::streams(streams))?;
        Ok(self)
    }

    /// Route events to handlers by event name. Events without a matching
    /// handler still advance positions.
    pub fn when(mut self, handlers: HashMap<String, EventHandler>) -> Result<Self> {
        self.engine.set_handlers(Handlers::Named(handlers))?;
        Ok(self)
    }

    /// Route every event to one handler.
    pub fn when_any(mut self, handler: EventHandler) -> Result<Self> {
        self.engine.set_handlers(Handlers::Any(handler))?;
        Ok(self)
    }

    // --- running ------------------------------------------------------

    /// Run the projection; see [`Engine::run`] semantics in the module docs.
    pub async fn run(&mut self, keep_running: bool) -> Result<()> {
        self.engine.run(keep_running).await
    }

    /// Delete the projection row, and the emitted-events stream when
    /// `delete_emitted_events` is set.
    pub async fn delete(&mut self, delete_emitted_events: bool) -> Result<()> {
        self.engine.delete(delete_emitted_events).await
    }

    /// Handle for stopping a running projector from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.engine.stop_handle()
    }

    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// Current folded state, if initialized.
    pub fn state(&self) -> Option<&Value> {
        self.engine.state()
    }

    pub fn positions(&self) -> &PositionMap {
        self.engine.positions()
    }

    /// Last lifecycle status observed from the control row.
    pub fn status(&self) -> ProjectionStatus {
        self.engine.status()
    }

    // --- emit / link --------------------------------------------------

    /// Append an event to this projection's own stream, creating the
    /// stream on first use.
    pub async fn emit(&mut self, event: RecordedEvent) -> Result<()> {
        let stream = self.engine.name().to_string();
        if !self.engine.stream_created {
            self.ensure_stream(&stream).await?;
            self.engine.stream_created = true;
        }
        self.event_store.append_to(&stream, vec![event]).await
    }

    /// Append an event to the named stream, creating it on demand.
    pub async fn link_to(&mut self, stream: &str, event: RecordedEvent) -> Result<()> {
        self.ensure_stream(stream).await?;
        self.event_store.append_to(stream, vec![event]).await
    }

    async fn ensure_stream(&self, stream: &str) -> Result<()> {
        if !self.event_store.has_stream(stream).await? {
            if let Err(err) = self.event_store.create_stream(stream).await {
                // A concurrent writer may have created it in between.
                if self.event_store.has_stream(stream).await? {
                    warn!(stream = %stream, error = %err, "stream appeared concurrently");
                } else {
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}
