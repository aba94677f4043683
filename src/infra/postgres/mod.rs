//! PostgreSQL backends for the shared control table and the manager facade.

mod control_store;
mod manager;

pub use control_store::{PgControlStore, DEFAULT_PROJECTIONS_TABLE};
pub use manager::{PgProjectionManager, DEFAULT_STREAMS_TABLE};
