//! Remote-control status poller.

use std::sync::Arc;

use tracing::debug;

use crate::domain::ProjectionStatus;
use crate::infra::ProjectionManager;

/// Reads the control row's status through the manager facade.
///
/// A projection that cannot observe operator commands keeps working rather
/// than self-stopping, so any read failure is reported as `running`.
pub struct StatusPoller {
    manager: Arc<dyn ProjectionManager>,
}

impl StatusPoller {
    pub fn new(manager: Arc<dyn ProjectionManager>) -> Self {
        Self { manager }
    }

    pub async fn fetch(&self, name: &str) -> ProjectionStatus {
        match self.manager.fetch_projection_status(name).await {
            Ok(status) => status,
            Err(error) => {
                debug!(
                    projection = %name,
                    error = %error,
                    "status check failed, assuming running"
                );
                ProjectionStatus::Running
            }
        }
    }
}
