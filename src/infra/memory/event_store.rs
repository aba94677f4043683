//! In-memory event store for development and tests.
//!
//! Streams are plain vectors in append order. The merge policy is global
//! append order: every stored event carries an internal insertion sequence
//! and a merge-load interleaves streams by it, which keeps multi-stream
//! tests deterministic regardless of wall-clock resolution.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{LoadRequest, RecordedEvent};
use crate::infra::{EventStore, EventStream, ProjectionError, Result};

struct StoredEntry {
    seq: u64,
    event: RecordedEvent,
}

#[derive(Default)]
struct Streams {
    streams: BTreeMap<String, Vec<StoredEntry>>,
    next_seq: u64,
}

/// In-memory implementation of [`EventStore`].
#[derive(Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Streams>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stream names in lexical order. Not part of the trait; the
    /// in-memory manager uses this for enumeration.
    pub async fn stream_names(&self) -> Vec<String> {
        self.inner.read().await.streams.keys().cloned().collect()
    }

    /// Events of one stream in append order, for inspection in tests.
    pub async fn stream_events(&self, stream: &str) -> Option<Vec<RecordedEvent>> {
        let inner = self.inner.read().await;
        inner
            .streams
            .get(stream)
            .map(|entries| entries.iter().map(|e| e.event.clone()).collect())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn has_stream(&self, stream: &str) -> Result<bool> {
        Ok(self.inner.read().await.streams.contains_key(stream))
    }

    async fn create_stream(&self, stream: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.streams.contains_key(stream) {
            return Err(ProjectionError::StreamExists(stream.to_string()));
        }
        inner.streams.insert(stream.to_string(), Vec::new());
        Ok(())
    }

    async fn delete_stream(&self, stream: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.streams.remove(stream) {
            Some(_) => Ok(()),
            None => Err(ProjectionError::StreamNotFound(stream.to_string())),
        }
    }

    async fn append_to(&self, stream: &str, events: Vec<RecordedEvent>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let start = inner.next_seq;
        let count = events.len() as u64;
        let Some(entries) = inner.streams.get_mut(stream) else {
            return Err(ProjectionError::StreamNotFound(stream.to_string()));
        };
        for (offset, event) in events.into_iter().enumerate() {
            entries.push(StoredEntry {
                seq: start + offset as u64,
                event,
            });
        }
        inner.next_seq = start + count;
        Ok(())
    }

    async fn merge_and_load(&self, requests: Vec<LoadRequest>) -> Result<EventStream> {
        let inner = self.inner.read().await;
        let mut merged: Vec<(u64, RecordedEvent)> = Vec::new();
        for request in &requests {
            let Some(entries) = inner.streams.get(&request.stream) else {
                continue;
            };
            for entry in entries {
                if entry.event.no < request.from_no {
                    continue;
                }
                if let Some(matcher) = &request.matcher {
                    if !matcher.matches(&entry.event) {
                        continue;
                    }
                }
                merged.push((entry.seq, entry.event.clone()));
            }
        }
        merged.sort_by_key(|(seq, _)| *seq);
        let events: Vec<Result<RecordedEvent>> =
            merged.into_iter().map(|(_, event)| Ok(event)).collect();
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}
