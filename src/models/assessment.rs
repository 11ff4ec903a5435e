use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    pub title: String,
    pub assessment_type: AssessmentType,
    pub duration_minutes: i32,
    pub total_points: i32,
    /// Percentage threshold, e.g. `70` or `62.5`.
    pub passing_score: Decimal,
    pub due_date: Option<DateTime<Utc>>,
    pub status: AssessmentStatus,
    pub professor_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentType {
    Exam,
    Quiz,
    Assignment,
}

impl AssessmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentType::Exam => "exam",
            AssessmentType::Quiz => "quiz",
            AssessmentType::Assignment => "assignment",
        }
    }
}

impl FromStr for AssessmentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exam" => Ok(AssessmentType::Exam),
            "quiz" => Ok(AssessmentType::Quiz),
            "assignment" => Ok(AssessmentType::Assignment),
            other => Err(Error::Internal(format!("Unknown assessment type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Draft,
    Active,
    Closed,
}

impl AssessmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentStatus::Draft => "draft",
            AssessmentStatus::Active => "active",
            AssessmentStatus::Closed => "closed",
        }
    }
}

impl FromStr for AssessmentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(AssessmentStatus::Draft),
            "active" => Ok(AssessmentStatus::Active),
            "closed" => Ok(AssessmentStatus::Closed),
            other => Err(Error::Internal(format!("Unknown assessment status '{}'", other))),
        }
    }
}
