use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A student's answer to one question. At most one per (assignment, question).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Response {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub question_id: Uuid,
    pub selected_option: i32,
    pub is_correct: bool,
    pub points_earned: i32,
    pub answered_at: DateTime<Utc>,
}

/// Values written by `AssessmentStore::upsert_response`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    pub assignment_id: Uuid,
    pub question_id: Uuid,
    pub selected_option: i32,
    pub is_correct: bool,
    pub points_earned: i32,
    pub answered_at: DateTime<Utc>,
}
