use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::assessment::AssessmentType;
use crate::models::assignment::AssignmentStatus;
use crate::services::grading_service::GradedAnswer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentSummaryDto {
    pub id: Uuid,
    pub title: String,
    pub assessment_type: AssessmentType,
    pub duration_minutes: i32,
    pub total_questions: usize,
    pub passing_score: f64,
    pub due_date: Option<DateTime<Utc>>,
}

/// A question as shown during an attempt; the answer key is withheld.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptQuestion {
    pub id: Uuid,
    pub position: i32,
    pub text: String,
    pub options: Vec<String>,
    pub points: i32,
    pub selected_option: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveAttemptResponse {
    pub assignment_id: Uuid,
    pub status: AssignmentStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub remaining_seconds: i64,
    pub assessment: AssessmentSummaryDto,
    pub questions: Vec<AttemptQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub assignment_id: Uuid,
    pub status: AssignmentStatus,
    pub assessment: AssessmentSummaryDto,
    pub raw_score: i32,
    pub total_points: i32,
    pub percentage: i32,
    pub passed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub answers: Vec<GradedAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OpenAttemptResponse {
    Attempt(ActiveAttemptResponse),
    Review(ReviewResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordAnswerRequest {
    pub question_id: Uuid,
    #[validate(range(min = 0))]
    pub selected_option: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordAnswerResponse {
    pub saved: bool,
    pub question_id: Uuid,
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAnswerResponse {
    pub question_id: Uuid,
    pub selected_option: Option<i32>,
    pub answered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    #[validate(nested)]
    pub answers: Vec<RecordAnswerRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAttemptResponse {
    pub assignment_id: Uuid,
    pub status: AssignmentStatus,
    pub raw_score: i32,
    pub total_points: i32,
    pub percentage: i32,
    pub passed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub already_submitted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptStatusResponse {
    pub status: AssignmentStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub remaining_seconds: i64,
    pub timer_running: bool,
    pub questions_answered: usize,
    pub total_questions: usize,
    pub unsaved_answers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseAttemptResponse {
    pub timer_stopped: bool,
}
