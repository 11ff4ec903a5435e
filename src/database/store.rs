//! The data-access seam the attempt flow is written against.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::assessment::Assessment;
use crate::models::assignment::{Assignment, AssignmentUpdate};
use crate::models::question::Question;
use crate::models::response::{Response, ResponseRecord};

/// Async CRUD over assessments, questions, assignments and responses.
///
/// Lookups of a missing id fail with `Error::NotFound`. Writes are
/// read-your-writes consistent for the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn get_assignment(&self, id: Uuid) -> Result<Assignment>;

    /// Applies `update` and returns the stored row, or `Ok(None)` when
    /// `update.expected_status` no longer matches.
    async fn update_assignment(
        &self,
        id: Uuid,
        update: AssignmentUpdate,
    ) -> Result<Option<Assignment>>;

    async fn list_assignments(&self, assessment_id: Uuid) -> Result<Vec<Assignment>>;

    async fn get_assessment(&self, id: Uuid) -> Result<Assessment>;

    /// Questions of an assessment ordered by position.
    async fn get_questions(&self, assessment_id: Uuid) -> Result<Vec<Question>>;

    async fn get_question(&self, id: Uuid) -> Result<Question>;

    async fn get_response(&self, assignment_id: Uuid, question_id: Uuid)
        -> Result<Option<Response>>;

    /// Inserts or overwrites the response keyed by (assignment, question).
    /// Fails with `Error::Conflict` unless the assignment is `in_progress` at
    /// the moment of the write.
    async fn upsert_response(&self, record: ResponseRecord) -> Result<Response>;

    async fn list_responses(&self, assignment_id: Uuid) -> Result<Vec<Response>>;
}

/// Error returned when a response write finds the assignment no longer open.
pub fn answers_closed(assignment_id: Uuid) -> Error {
    Error::Conflict(format!(
        "Assignment {} is not in progress; the answer was not recorded",
        assignment_id
    ))
}
