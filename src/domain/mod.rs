//! Core domain types for streamfold
//!
//! Passive data only: event envelopes, position cursors, lifecycle status,
//! metadata matchers, and source queries. Everything here is serializable
//! and backend-agnostic.

mod event;
mod matcher;
mod position;
mod query;
mod status;

pub use event::{EventMetadata, RecordedEvent};
pub use matcher::{MatchCriterion, MatchField, MatchOp, MetadataMatcher};
pub use position::PositionMap;
pub use query::{LoadRequest, SourceQuery};
pub use status::ProjectionStatus;
