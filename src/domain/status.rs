//! Projection lifecycle status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::infra::ProjectionError;

/// Status column of the projection control record.
///
/// `idle` and `running` describe the runner itself; the remaining values are
/// operator commands written out-of-band and picked up by the runner at
/// block boundaries and between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectionStatus {
    Idle,
    Running,
    Stopping,
    Deleting,
    DeletingInclEmitted,
    Resetting,
}

impl ProjectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectionStatus::Idle => "idle",
            ProjectionStatus::Running => "running",
            ProjectionStatus::Stopping => "stopping",
            ProjectionStatus::Deleting => "deleting",
            ProjectionStatus::DeletingInclEmitted => "deleting-incl-emitted",
            ProjectionStatus::Resetting => "resetting",
        }
    }
}

impl fmt::Display for ProjectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectionStatus {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(ProjectionStatus::Idle),
            "running" => Ok(ProjectionStatus::Running),
            "stopping" => Ok(ProjectionStatus::Stopping),
            "deleting" => Ok(ProjectionStatus::Deleting),
            "deleting-incl-emitted" => Ok(ProjectionStatus::DeletingInclEmitted),
            "resetting" => Ok(ProjectionStatus::Resetting),
            other => Err(ProjectionError::Internal(format!(
                "unknown projection status: {other}"
            ))),
        }
    }
}
