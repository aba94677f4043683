//! Handler registry.
//!
//! A projection folds events into state through exactly one of two shapes:
//! a single catch-all handler, or a map keyed by event name. The registry is
//! a tagged variant so the ambiguous both-set shape is unrepresentable.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::RecordedEvent;
use crate::infra::Result;

/// Boxed future returned by an event handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// An event handler: folds the current state and an event into the next
/// state. The returned value *becomes* the state; handlers hand over
/// ownership rather than mutating in place.
pub type EventHandler = Arc<dyn Fn(Value, RecordedEvent) -> HandlerFuture + Send + Sync>;

/// Wrap an async fold function into an [`EventHandler`].
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Value, RecordedEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |state, event| Box::pin(f(state, event)))
}

/// Wrap a synchronous fold function into an [`EventHandler`].
pub fn sync_handler<F>(f: F) -> EventHandler
where
    F: Fn(Value, RecordedEvent) -> Value + Send + Sync + 'static,
{
    Arc::new(move |state, event| {
        let next = f(state, event);
        Box::pin(async move { Ok(next) })
    })
}

/// The configured handler set.
#[derive(Clone)]
pub enum Handlers {
    /// One handler receives every event.
    Any(EventHandler),

    /// Handlers keyed by event name. Events without a matching entry still
    /// advance positions; they are simply not folded.
    Named(HashMap<String, EventHandler>),
}

impl Handlers {
    /// Handler responsible for an event with the given name, if any.
    pub fn for_event(&self, name: &str) -> Option<EventHandler> {
        match self {
            Handlers::Any(handler) => Some(handler.clone()),
            Handlers::Named(map) => map.get(name).cloned(),
        }
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handlers::Any(_) => f.write_str("Handlers::Any"),
            Handlers::Named(map) => {
                let mut names: Vec<_> = map.keys().collect();
                names.sort();
                f.debug_tuple("Handlers::Named").field(&names).finish()
            }
        }
    }
}
