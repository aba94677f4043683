//! Projection engine: the long-running replay loop.
//!
//! One `Engine` drives one projection: it merge-loads events past the
//! current positions, folds them through the configured handlers, persists
//! checkpoints in blocks, honors operator commands found in the control
//! row, and keeps the advisory lease alive while it works. The plain and
//! read-model projectors are this engine plus a [`ProjectionSink`] that
//! differs in what `persist`/`reset`/`delete` additionally touch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{LoadRequest, PositionMap, ProjectionStatus, SourceQuery};
use crate::infra::{ControlStore, EventStore, ProjectionError, ProjectionManager, Result};

use super::handlers::{EventHandler, Handlers};
use super::lease::Lease;
use super::poller::StatusPoller;
use super::ProjectorConfig;

/// Thunk producing the initial projection state.
pub type InitThunk = Arc<dyn Fn() -> Value + Send + Sync>;

/// Cloneable handle that stops a running projector from outside the loop,
/// e.g. from a signal handler. The flag is checked after every handled
/// event and between passes.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Variant-specific lifecycle hooks.
///
/// The engine owns the loop; a sink only decides what else happens at the
/// lifecycle edges. `on_persist` runs *before* the control-row checkpoint
/// write, so external effects are always at least as advanced as the
/// recorded positions.
#[async_trait]
pub(crate) trait ProjectionSink: Send + Sync {
    async fn on_init(&mut self) -> Result<()> {
        Ok(())
    }

    async fn on_persist(&mut self) -> Result<()> {
        Ok(())
    }

    async fn on_reset(&mut self) -> Result<()> {
        Ok(())
    }

    async fn on_delete(&mut self, purge: bool) -> Result<()> {
        let _ = purge;
        Ok(())
    }
}

/// Outcome of a remote-status dispatch or a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    /// Keep going.
    Continue,
    /// The pass was interrupted (reset); re-prepare and start a new pass.
    Restart,
    /// The run is over.
    Halt,
}

pub(crate) struct Engine {
    name: String,
    config: ProjectorConfig,
    event_store: Arc<dyn EventStore>,
    control: Arc<dyn ControlStore>,
    manager: Arc<dyn ProjectionManager>,
    poller: StatusPoller,
    sink: Box<dyn ProjectionSink>,
    lease: Lease,

    query: Option<SourceQuery>,
    init_thunk: Option<InitThunk>,
    handlers: Option<Handlers>,

    positions: PositionMap,
    state: Option<Value>,
    status: ProjectionStatus,
    stopped: StopHandle,
    event_counter: u64,
    pub(crate) stream_created: bool,
}

impl Engine {
    pub(crate) fn new(
        name: impl Into<String>,
        event_store: Arc<dyn EventStore>,
        control: Arc<dyn ControlStore>,
        manager: Arc<dyn ProjectionManager>,
        config: ProjectorConfig,
        sink: Box<dyn ProjectionSink>,
    ) -> Self {
        let lease = Lease::new(config.lock_timeout_ms(), config.update_lock_threshold_ms());
        Self {
            name: name.into(),
            config,
            event_store,
            control,
            poller: StatusPoller::new(manager.clone()),
            manager,
            sink,
            lease,
            query: None,
            init_thunk: None,
            handlers: None,
            positions: PositionMap::new(),
            state: None,
            status: ProjectionStatus::Idle,
            stopped: StopHandle::new(),
            event_counter: 0,
            stream_created: false,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> Option<&Value> {
        self.state.as_ref()
    }

    pub(crate) fn positions(&self) -> &PositionMap {
        &self.positions
    }

    pub(crate) fn status(&self) -> ProjectionStatus {
        self.status
    }

    pub(crate) fn stop_handle(&self) -> StopHandle {
        self.stopped.clone()
    }

    // --- write-once configuration -------------------------------------

    pub(crate) fn set_init(&mut self, thunk: InitThunk) -> Result<()> {
        if self.init_thunk.is_some() {
            return Err(ProjectionError::AlreadyInitialized);
        }
        self.state = Some(thunk());
        self.init_thunk = Some(thunk);
        Ok(())
    }

    pub(crate) fn set_query(&mut self, query: SourceQuery) -> Result<()> {
        if self.query.is_some() {
            return Err(ProjectionError::FromAlreadyCalled);
        }
        self.query = Some(query);
        Ok(())
    }

    pub(crate) fn set_handlers(&mut self, handlers: Handlers) -> Result<()> {
        if self.handlers.is_some() {
            return Err(ProjectionError::WhenAlreadyCalled);
        }
        self.handlers = Some(handlers);
        Ok(())
    }

    // --- run ----------------------------------------------------------

    /// Run the projection.
    ///
    /// With `keep_running` the loop polls for new events until stopped; a
    /// single pass otherwise. The lease is released on every exit path once
    /// it has been acquired.
    #[instrument(skip(self), fields(projection = %self.name))]
    pub(crate) async fn run(&mut self, keep_running: bool) -> Result<()> {
        if self.handlers.is_none() {
            return Err(ProjectionError::NoHandler);
        }
        if self.state.is_none() {
            return Err(ProjectionError::StateNotInitialised);
        }

        self.stopped.clear();

        // Operator commands issued while this runner was away take effect
        // before anything else.
        let mut lease_armed = false;
        match self.apply_remote_status(keep_running).await? {
            Transition::Halt => return Ok(()),
            Transition::Restart => lease_armed = keep_running,
            Transition::Continue => {}
        }

        if !self.control.exists(&self.name).await? {
            info!(projection = %self.name, "creating projection control row");
            self.control.create(&self.name, ProjectionStatus::Idle).await?;
        }

        if !lease_armed {
            self.lease.acquire(self.control.as_ref(), &self.name).await?;
        }

        let outcome = self.run_locked(keep_running).await;
        if let Err(err) = &outcome {
            error!(projection = %self.name, error = %err, "projection run aborted");
        }

        // The row may be gone (delete transition); a failed release is
        // logged, never raised over the run's own outcome.
        if let Err(err) = self
            .lease
            .release(self.control.as_ref(), &self.name, ProjectionStatus::Idle)
            .await
        {
            debug!(projection = %self.name, error = %err, "lease release skipped");
        }

        outcome
    }

    async fn run_locked(&mut self, keep_running: bool) -> Result<()> {
        self.sink.on_init().await?;
        self.prepare_stream_positions().await?;
        self.load().await?;

        loop {
            let flow = self.run_pass(keep_running).await?;
            match flow {
                Transition::Halt => break,
                Transition::Restart => {}
                Transition::Continue => {
                    if self.apply_remote_status(keep_running).await? == Transition::Halt {
                        break;
                    }
                }
            }

            // Picks up newly created streams when the query covers all.
            self.prepare_stream_positions().await?;

            if !(keep_running && !self.stopped.is_stopped()) {
                break;
            }
        }

        Ok(())
    }

    /// One pass: drain a merge-load, then either checkpoint or idle.
    async fn run_pass(&mut self, keep_running: bool) -> Result<Transition> {
        let requests = self.load_requests();
        let mut events = self.event_store.merge_and_load(requests).await?;

        while let Some(event) = events.next().await {
            let event = event?;
            let handler = self.handler_for(&event.name);

            self.positions.advance(event.stream(), event.no);
            self.event_counter += 1;

            if let Some(handler) = handler {
                // The handler gets its own copy; a failed call must leave
                // the last good state in place for the next run to resume
                // from the previous checkpoint.
                let state = self
                    .state
                    .clone()
                    .ok_or(ProjectionError::StateNotInitialised)?;
                let next = handler(state, event).await?;
                self.state = Some(next);
            }

            if self.event_counter % self.config.persist_block_size() == 0 {
                self.persist().await?;
                let flow = self.apply_remote_status(keep_running).await?;
                if flow != Transition::Continue {
                    self.event_counter = 0;
                    return Ok(flow);
                }
            }

            if self.stopped.is_stopped() {
                break;
            }
        }
        drop(events);

        if self.event_counter == 0 {
            tokio::time::sleep(Duration::from_millis(self.config.idle_sleep_ms())).await;
            self.lease.refresh(self.control.as_ref(), &self.name).await?;
        } else {
            self.persist().await?;
        }
        self.event_counter = 0;

        Ok(Transition::Continue)
    }

    fn handler_for(&self, event_name: &str) -> Option<EventHandler> {
        self.handlers
            .as_ref()
            .and_then(|handlers| handlers.for_event(event_name))
    }

    /// Fetch the remote status and dispatch on it. Stop, delete, and reset
    /// commands all funnel through here, whether observed before the run,
    /// at a block boundary, or between passes.
    async fn apply_remote_status(&mut self, keep_running: bool) -> Result<Transition> {
        let status = self.poller.fetch(&self.name).await;
        self.status = status;
        match status {
            ProjectionStatus::Stopping => {
                self.load().await?;
                self.stop().await?;
                Ok(Transition::Halt)
            }
            ProjectionStatus::Deleting => {
                self.delete(false).await?;
                Ok(Transition::Halt)
            }
            ProjectionStatus::DeletingInclEmitted => {
                self.delete(true).await?;
                Ok(Transition::Halt)
            }
            ProjectionStatus::Resetting => {
                self.reset().await?;
                if keep_running {
                    self.start_again().await?;
                }
                Ok(Transition::Restart)
            }
            ProjectionStatus::Idle | ProjectionStatus::Running => Ok(Transition::Continue),
        }
    }

    // --- positions & checkpoints --------------------------------------

    /// Seed positions from the source query, then let already-tracked
    /// cursors win. Re-run between passes so an all-streams query sees
    /// streams created after the run began.
    async fn prepare_stream_positions(&mut self) -> Result<()> {
        let streams: Vec<String> = match &self.query {
            None => return Err(ProjectionError::NoStreamsConfigured),
            Some(SourceQuery::All) => self.manager.fetch_all_stream_names().await?,
            Some(SourceQuery::Streams(map)) => {
                if map.is_empty() {
                    return Err(ProjectionError::NoStreamsConfigured);
                }
                map.keys().cloned().collect()
            }
        };

        let mut prepared = PositionMap::seeded(streams);
        prepared.overlay(&self.positions);
        self.positions = prepared;
        Ok(())
    }

    fn load_requests(&self) -> Vec<LoadRequest> {
        self.positions
            .iter()
            .map(|(stream, position)| LoadRequest {
                stream: stream.clone(),
                from_no: position + 1,
                matcher: self.query.as_ref().and_then(|q| q.matcher_for(stream)),
            })
            .collect()
    }

    /// Merge the persisted checkpoint into the working copies. Persisted
    /// positions always win; persisted state replaces the working state
    /// unless it is still the empty seed.
    async fn load(&mut self) -> Result<()> {
        let (position, state) = self.control.load(&self.name).await?;
        self.positions.overlay(&position);
        if !is_empty_state(&state) {
            self.state = Some(state);
        }
        Ok(())
    }

    /// The canonical checkpoint: external effects first, then position,
    /// state, and a refreshed lease in one control-row write.
    async fn persist(&mut self) -> Result<()> {
        self.sink.on_persist().await?;
        let now = Utc::now();
        let state = self.state.clone().unwrap_or(Value::Null);
        self.control
            .persist(&self.name, self.lease.lock_until(now), &state, &self.positions)
            .await
    }

    // --- lifecycle transitions ----------------------------------------

    async fn stop(&mut self) -> Result<()> {
        info!(projection = %self.name, "stopping projection");
        self.stopped.stop();
        self.status = ProjectionStatus::Idle;
        self.manager.idle_projection(&self.name).await
    }

    async fn reset(&mut self) -> Result<()> {
        info!(projection = %self.name, "resetting projection");
        self.positions.clear();
        let state = match &self.init_thunk {
            Some(thunk) => thunk(),
            None => return Err(ProjectionError::StateNotInitialised),
        };
        self.state = Some(state.clone());
        self.stream_created = false;

        if let Err(err) = self.sink.on_reset().await {
            // Best effort: a failed cleanup must not abort the reset.
            warn!(projection = %self.name, error = %err, "reset cleanup failed");
        }

        self.control
            .reset_row(&self.name, &state, ProjectionStatus::Idle)
            .await
    }

    async fn start_again(&mut self) -> Result<()> {
        self.stopped.clear();
        let now = Utc::now();
        self.control
            .resume(&self.name, self.lease.lock_until(now))
            .await?;
        self.lease.touch(now);
        self.status = ProjectionStatus::Running;
        Ok(())
    }

    pub(crate) async fn delete(&mut self, purge: bool) -> Result<()> {
        info!(projection = %self.name, purge, "deleting projection");
        self.control.delete_row(&self.name).await?;
        self.sink.on_delete(purge).await?;

        self.positions.clear();
        if let Some(thunk) = &self.init_thunk {
            self.state = Some(thunk());
        }
        self.stream_created = false;
        self.stopped.stop();
        Ok(())
    }
}

fn is_empty_state(state: &Value) -> bool {
    match state {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
