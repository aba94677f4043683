//! Error types for the streamfold infrastructure
//!
//! One enum covers both the synchronous configuration errors raised by the
//! builder surface and the runtime errors surfaced by stores and the
//! projection loop.

use thiserror::Error;

/// Errors raised by projectors, stores, and the builder surface.
#[derive(Error, Debug)]
pub enum ProjectionError {
    /// `init` was called twice on the same projector.
    #[error("projection state was already initialized")]
    AlreadyInitialized,

    /// A second `from_all` / `from_stream` / `from_streams` call.
    #[error("projection source query was already configured")]
    FromAlreadyCalled,

    /// A second `when` / `when_any` call.
    #[error("projection handlers were already configured")]
    WhenAlreadyCalled,

    /// `run` without any handler configured.
    #[error("no event handler configured")]
    NoHandler,

    /// `run` without `init` having seeded the state.
    #[error("projection state is not initialised")]
    StateNotInitialised,

    /// `run` with neither `from_all` nor any stream configured.
    #[error("no streams configured")]
    NoStreamsConfigured,

    /// A control-row query affected zero rows: the projection row is gone.
    #[error("projection not found: {0}")]
    ProjectionNotFound(String),

    /// The advisory lock is held by another runner.
    #[error("projection lock is held by another runner: {0}")]
    LockHeld(String),

    /// Stream creation hit an existing stream.
    #[error("stream already exists: {0}")]
    StreamExists(String),

    /// Stream operation on a stream the store does not know.
    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for streamfold operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
