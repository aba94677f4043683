//! Cooperative lease over the control row.
//!
//! The lock is a future timestamp in `locked_until`. While it is non-null
//! and ahead of the wall clock, some runner holds the projection; ownership
//! is implied by the acquire protocol, not recorded anywhere. A conditional
//! update that claims zero rows means another runner's lease is live, and
//! this runner refuses to proceed.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::domain::ProjectionStatus;
use crate::infra::{ControlStore, ProjectionError, Result};

/// Lease bookkeeping for one projector instance.
#[derive(Debug)]
pub struct Lease {
    lock_timeout: Duration,
    update_threshold: Duration,
    last_lock_update: Option<DateTime<Utc>>,
}

impl Lease {
    pub fn new(lock_timeout_ms: u64, update_lock_threshold_ms: u64) -> Self {
        Self {
            lock_timeout: Duration::milliseconds(lock_timeout_ms as i64),
            update_threshold: Duration::milliseconds(update_lock_threshold_ms as i64),
            last_lock_update: None,
        }
    }

    /// Lease expiry for a claim made at `now`.
    pub fn lock_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.lock_timeout
    }

    /// Whether an idle poll at `now` should extend the lease. A zero
    /// threshold, or a lease that has never been extended, always refreshes.
    pub fn should_refresh(&self, now: DateTime<Utc>) -> bool {
        if self.update_threshold.is_zero() {
            return true;
        }
        match self.last_lock_update {
            None => true,
            Some(last) => now >= last + self.update_threshold,
        }
    }

    /// Claim the lease, flipping the row to `running`.
    pub async fn acquire(&mut self, control: &dyn ControlStore, name: &str) -> Result<()> {
        let now = Utc::now();
        let acquired = control.acquire_lock(name, self.lock_until(now), now).await?;
        if !acquired {
            return Err(ProjectionError::LockHeld(name.to_string()));
        }
        self.last_lock_update = Some(now);
        Ok(())
    }

    /// Extend the lease if the threshold allows.
    pub async fn refresh(&mut self, control: &dyn ControlStore, name: &str) -> Result<()> {
        let now = Utc::now();
        if !self.should_refresh(now) {
            debug!(projection = %name, "lease refresh skipped, threshold not reached");
            return Ok(());
        }
        control.refresh_lock(name, self.lock_until(now)).await?;
        self.last_lock_update = Some(now);
        Ok(())
    }

    /// Record a lease extension done as part of another statement, e.g. a
    /// checkpoint write or a resume.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_lock_update = Some(now);
    }

    /// Release the lease, leaving the row with the given status.
    pub async fn release(
        &mut self,
        control: &dyn ControlStore,
        name: &str,
        status: ProjectionStatus,
    ) -> Result<()> {
        self.last_lock_update = None;
        control.clear_lock(name, status).await
    }
}
