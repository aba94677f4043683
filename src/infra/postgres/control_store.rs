//! PostgreSQL control-record store
//!
//! One row per projection in the `projections` table (name configurable).
//! The lease lives in `locked_until`; `position` and `state` are JSONB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPool;
use sqlx::types::Json;

use crate::domain::{PositionMap, ProjectionStatus};
use crate::infra::{ControlStore, ProjectionError, Result};

/// Default control table name.
pub const DEFAULT_PROJECTIONS_TABLE: &str = "projections";

/// PostgreSQL-backed [`ControlStore`].
pub struct PgControlStore {
    pool: PgPool,
    table: String,
}

impl PgControlStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_table(pool, DEFAULT_PROJECTIONS_TABLE)
    }

    /// Use a non-default control table.
    pub fn with_table(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn one_row(&self, affected: u64, name: &str) -> Result<()> {
        if affected == 1 {
            Ok(())
        } else {
            Err(ProjectionError::ProjectionNotFound(name.to_string()))
        }
    }
}

#[async_trait]
impl ControlStore for PgControlStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE name = $1)", self.table);
        let row: (bool,) = sqlx::query_as(&sql).bind(name).fetch_one(&self.pool).await?;
        Ok(row.0)
    }

    async fn create(&self, name: &str, status: ProjectionStatus) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (name, position, state, status, locked_until) \
             VALUES ($1, '{{}}', '{{}}', $2, NULL)",
            self.table
        );
        sqlx::query(&sql)
            .bind(name)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<(PositionMap, Value)> {
        let sql = format!("SELECT position, state FROM {} WHERE name = $1", self.table);
        let row: Option<(Json<PositionMap>, Json<Value>)> = sqlx::query_as(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((position, state)) => Ok((position.0, state.0)),
            None => Err(ProjectionError::ProjectionNotFound(name.to_string())),
        }
    }

    async fn persist(
        &self,
        name: &str,
        locked_until: DateTime<Utc>,
        state: &Value,
        position: &PositionMap,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET position = $2, state = $3, locked_until = $4 WHERE name = $1",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(Json(position))
            .bind(Json(state))
            .bind(locked_until)
            .execute(&self.pool)
            .await?;
        self.one_row(result.rows_affected(), name)
    }

    async fn update_status(&self, name: &str, status: ProjectionStatus) -> Result<()> {
        let sql = format!("UPDATE {} SET status = $2 WHERE name = $1", self.table);
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        self.one_row(result.rows_affected(), name)
    }

    async fn clear_lock(&self, name: &str, status: ProjectionStatus) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET locked_until = NULL, status = $2 WHERE name = $1",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        self.one_row(result.rows_affected(), name)
    }

    async fn acquire_lock(
        &self,
        name: &str,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET locked_until = $2, status = $3 \
             WHERE name = $1 AND (locked_until IS NULL OR locked_until < $4)",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(locked_until)
            .bind(ProjectionStatus::Running.as_str())
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn refresh_lock(&self, name: &str, locked_until: DateTime<Utc>) -> Result<()> {
        let sql = format!("UPDATE {} SET locked_until = $2 WHERE name = $1", self.table);
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(locked_until)
            .execute(&self.pool)
            .await?;
        self.one_row(result.rows_affected(), name)
    }

    async fn resume(&self, name: &str, locked_until: DateTime<Utc>) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET status = $2, locked_until = $3 WHERE name = $1",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(ProjectionStatus::Running.as_str())
            .bind(locked_until)
            .execute(&self.pool)
            .await?;
        self.one_row(result.rows_affected(), name)
    }

    async fn reset_row(&self, name: &str, state: &Value, status: ProjectionStatus) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET position = '{{}}', state = $2, status = $3 WHERE name = $1",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(Json(state))
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        self.one_row(result.rows_affected(), name)
    }

    async fn delete_row(&self, name: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE name = $1", self.table);
        let result = sqlx::query(&sql).bind(name).execute(&self.pool).await?;
        self.one_row(result.rows_affected(), name)
    }
}
