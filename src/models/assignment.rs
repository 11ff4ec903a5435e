use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub student_id: Uuid,
    pub status: AssignmentStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<i32>,
    pub total_points: Option<i32>,
    pub percentage: Option<i32>,
    pub passed: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
    Graded,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Graded => "graded",
        }
    }

    /// Completed and graded attempts are read-only.
    pub fn is_finished(&self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Graded)
    }
}

impl FromStr for AssignmentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(AssignmentStatus::Assigned),
            "in_progress" => Ok(AssignmentStatus::InProgress),
            "completed" => Ok(AssignmentStatus::Completed),
            "graded" => Ok(AssignmentStatus::Graded),
            other => Err(Error::Internal(format!("Unknown assignment status '{}'", other))),
        }
    }
}

/// Partial update of an assignment row. `None` fields are left untouched.
///
/// When `expected_status` is set the update only applies if the stored status
/// still matches it; stores report a lost race by returning `Ok(None)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentUpdate {
    pub expected_status: Option<AssignmentStatus>,
    pub status: Option<AssignmentStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<i32>,
    pub total_points: Option<i32>,
    pub percentage: Option<i32>,
    pub passed: Option<bool>,
}

impl AssignmentUpdate {
    pub fn apply_to(&self, assignment: &mut Assignment) {
        if let Some(status) = self.status {
            assignment.status = status;
        }
        if let Some(started_at) = self.started_at {
            assignment.started_at = Some(started_at);
        }
        if let Some(completed_at) = self.completed_at {
            assignment.completed_at = Some(completed_at);
        }
        if let Some(score) = self.score {
            assignment.score = Some(score);
        }
        if let Some(total_points) = self.total_points {
            assignment.total_points = Some(total_points);
        }
        if let Some(percentage) = self.percentage {
            assignment.percentage = Some(percentage);
        }
        if let Some(passed) = self.passed {
            assignment.passed = Some(passed);
        }
    }
}
