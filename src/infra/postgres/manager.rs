//! PostgreSQL projection manager facade
//!
//! Thin query surface over the control table and the event-streams table:
//! status reads for the remote-control poller, the idle transition, and
//! stream-name enumeration for `from_all` projections.

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::domain::ProjectionStatus;
use crate::infra::{ProjectionError, ProjectionManager, Result};

use super::control_store::DEFAULT_PROJECTIONS_TABLE;

/// Default event-streams table name.
pub const DEFAULT_STREAMS_TABLE: &str = "event_streams";

/// PostgreSQL-backed [`ProjectionManager`].
pub struct PgProjectionManager {
    pool: PgPool,
    projections_table: String,
    streams_table: String,
}

impl PgProjectionManager {
    pub fn new(pool: PgPool) -> Self {
        Self::with_tables(pool, DEFAULT_PROJECTIONS_TABLE, DEFAULT_STREAMS_TABLE)
    }

    pub fn with_tables(
        pool: PgPool,
        projections_table: impl Into<String>,
        streams_table: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            projections_table: projections_table.into(),
            streams_table: streams_table.into(),
        }
    }
}

#[async_trait]
impl ProjectionManager for PgProjectionManager {
    async fn fetch_projection_status(&self, name: &str) -> Result<ProjectionStatus> {
        let sql = format!(
            "SELECT status FROM {} WHERE name = $1",
            self.projections_table
        );
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((status,)) => status.parse(),
            None => Err(ProjectionError::ProjectionNotFound(name.to_string())),
        }
    }

    async fn idle_projection(&self, name: &str) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET status = $2 WHERE name = $1",
            self.projections_table
        );
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(ProjectionStatus::Idle.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(ProjectionError::ProjectionNotFound(name.to_string()))
        }
    }

    async fn fetch_all_stream_names(&self) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT real_stream_name FROM {} \
             WHERE real_stream_name NOT LIKE '$%' \
             ORDER BY real_stream_name",
            self.streams_table
        );
        let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}
