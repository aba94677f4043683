//! Source queries: what a projection consumes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::MetadataMatcher;

/// The set of streams a projection reads, fixed once at configuration time.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceQuery {
    /// Every non-internal stream known to the store. New streams are picked
    /// up when positions are re-prepared between passes.
    All,

    /// A fixed set of streams, each with an optional metadata matcher.
    Streams(BTreeMap<String, Option<MetadataMatcher>>),
}

impl SourceQuery {
    /// Build a single-stream query.
    pub fn stream(stream: impl Into<String>, matcher: Option<MetadataMatcher>) -> Self {
        let mut streams = BTreeMap::new();
        streams.insert(stream.into(), matcher);
        SourceQuery::Streams(streams)
    }

    /// Build a multi-stream query.
    pub fn streams<I, S>(streams: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<MetadataMatcher>)>,
        S: Into<String>,
    {
        SourceQuery::Streams(streams.into_iter().map(|(s, m)| (s.into(), m)).collect())
    }

    /// Matcher configured for `stream`, if any.
    pub fn matcher_for(&self, stream: &str) -> Option<MetadataMatcher> {
        match self {
            SourceQuery::All => None,
            SourceQuery::Streams(map) => map.get(stream).cloned().flatten(),
        }
    }
}

/// One stream's slice of a merge-load request.
///
/// `from_no` is inclusive: the store returns events with `no >= from_no`,
/// i.e. everything *after* the last processed position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRequest {
    pub stream: String,
    pub from_no: u64,
    pub matcher: Option<MetadataMatcher>,
}
