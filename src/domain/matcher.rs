//! Metadata matchers.
//!
//! A matcher is an opaque predicate from the projection engine's point of
//! view: the engine only threads it through to the event store, which
//! evaluates it while loading. Backends that push filtering into a query
//! translate the criteria; the in-memory backend evaluates them directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RecordedEvent;

/// Which field of the event a criterion inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    /// The event name.
    EventName,
    /// A metadata field; `"stream"` resolves to the stream name.
    Metadata(String),
}

/// Comparison operator of a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// One field/op/value criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCriterion {
    pub field: MatchField,
    pub op: MatchOp,
    pub value: Value,
}

/// Conjunction of criteria over an event's name and metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataMatcher(Vec<MatchCriterion>);

impl MetadataMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: MatchField, op: MatchOp, value: Value) -> Self {
        self.0.push(MatchCriterion { field, op, value });
        self
    }

    /// Shorthand for an event-name equality match.
    pub fn event_name(name: impl Into<String>) -> Self {
        Self::new().with(MatchField::EventName, MatchOp::Eq, Value::String(name.into()))
    }

    /// Shorthand for a metadata-field equality match.
    pub fn metadata_eq(field: impl Into<String>, value: Value) -> Self {
        Self::new().with(MatchField::Metadata(field.into()), MatchOp::Eq, value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluate the full conjunction against an event.
    pub fn matches(&self, event: &RecordedEvent) -> bool {
        self.0.iter().all(|criterion| {
            let actual = match &criterion.field {
                MatchField::EventName => Some(Value::String(event.name.clone())),
                MatchField::Metadata(key) => event.metadata.get(key),
            };
            match actual {
                Some(actual) => compare(&actual, criterion.op, &criterion.value),
                None => false,
            }
        })
    }
}

fn compare(actual: &Value, op: MatchOp, expected: &Value) -> bool {
    match op {
        MatchOp::Eq => actual == expected,
        MatchOp::Ne => actual != expected,
        MatchOp::Gt | MatchOp::Gte | MatchOp::Lt | MatchOp::Lte => {
            match (actual.as_f64(), expected.as_f64()) {
                (Some(a), Some(b)) => match op {
                    MatchOp::Gt => a > b,
                    MatchOp::Gte => a >= b,
                    MatchOp::Lt => a < b,
                    MatchOp::Lte => a <= b,
                    _ => unreachable!(),
                },
                // Ordered comparison on non-numeric values never matches.
                _ => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str) -> RecordedEvent {
        RecordedEvent::new("s", 1, name, json!({})).with_metadata(
            crate::domain::EventMetadata::new("s").with("priority", json!(5)),
        )
    }

    #[test]
    fn empty_matcher_matches_everything() {
        assert!(MetadataMatcher::new().matches(&event("anything")));
    }

    #[test]
    fn event_name_matcher() {
        let matcher = MetadataMatcher::event_name("created");
        assert!(matcher.matches(&event("created")));
        assert!(!matcher.matches(&event("deleted")));
    }

    #[test]
    fn metadata_ordering_matcher() {
        let matcher = MetadataMatcher::new().with(
            MatchField::Metadata("priority".into()),
            MatchOp::Gte,
            json!(3),
        );
        assert!(matcher.matches(&event("created")));

        let strict = MetadataMatcher::new().with(
            MatchField::Metadata("priority".into()),
            MatchOp::Gt,
            json!(5),
        );
        assert!(!strict.matches(&event("created")));
    }

    #[test]
    fn missing_metadata_field_never_matches() {
        let matcher = MetadataMatcher::metadata_eq("tenant", json!("acme"));
        assert!(!matcher.matches(&event("created")));
    }

    #[test]
    fn stream_is_addressable_as_metadata() {
        let matcher = MetadataMatcher::metadata_eq("stream", json!("s"));
        assert!(matcher.matches(&event("created")));
    }
}
