use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::database::store::AssessmentStore;
use crate::error::{Error, Result};
use crate::models::assignment::{Assignment, AssignmentStatus};
use crate::models::question::Question;
use crate::models::response::{Response, ResponseRecord};
use crate::models::session::Session;

#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Saved(Response),
    /// The write failed. The answer is remembered as unsaved and submission is
    /// blocked until it is written.
    Unsaved { question_id: Uuid, reason: String },
}

/// Answers whose last write failed, per assignment.
#[derive(Clone, Default)]
pub struct UnsavedAnswers {
    inner: Arc<Mutex<HashMap<Uuid, HashSet<Uuid>>>>,
}

impl UnsavedAnswers {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, HashSet<Uuid>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn mark(&self, assignment_id: Uuid, question_id: Uuid) {
        self.lock().entry(assignment_id).or_default().insert(question_id);
    }

    pub fn clear(&self, assignment_id: Uuid, question_id: Uuid) {
        let mut map = self.lock();
        if let Some(questions) = map.get_mut(&assignment_id) {
            questions.remove(&question_id);
            if questions.is_empty() {
                map.remove(&assignment_id);
            }
        }
    }

    pub fn count(&self, assignment_id: Uuid) -> usize {
        self.lock().get(&assignment_id).map(HashSet::len).unwrap_or(0)
    }

    pub fn forget(&self, assignment_id: Uuid) {
        self.lock().remove(&assignment_id);
    }
}

#[derive(Clone)]
pub struct ResponseRecorder {
    store: Arc<dyn AssessmentStore>,
    unsaved: UnsavedAnswers,
}

impl ResponseRecorder {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self {
            store,
            unsaved: UnsavedAnswers::default(),
        }
    }

    pub fn unsaved(&self) -> &UnsavedAnswers {
        &self.unsaved
    }

    /// Records the student's choice for one question, overwriting any earlier
    /// choice. A transient write failure is logged and reported as `Unsaved`
    /// rather than as an error so the student can carry on.
    pub async fn record_answer(
        &self,
        session: &Session,
        assignment_id: Uuid,
        question_id: Uuid,
        selected_option: i32,
    ) -> Result<RecordOutcome> {
        let assignment = self.store.get_assignment(assignment_id).await?;
        let record = self
            .prepare(session, &assignment, question_id, selected_option)
            .await?;

        match self.write(record).await {
            Ok(response) => Ok(RecordOutcome::Saved(response)),
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    assignment_id = %assignment_id,
                    question_id = %question_id,
                    error = %e,
                    "Failed to record answer"
                );
                Ok(RecordOutcome::Unsaved {
                    question_id,
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Same as `record_answer` but a failed write is returned as an error.
    /// Used on the submission path where nothing may be lost silently.
    pub async fn record_answer_strict(
        &self,
        session: &Session,
        assignment: &Assignment,
        question_id: Uuid,
        selected_option: i32,
    ) -> Result<Response> {
        let record = self
            .prepare(session, assignment, question_id, selected_option)
            .await?;
        self.write(record).await
    }

    async fn prepare(
        &self,
        session: &Session,
        assignment: &Assignment,
        question_id: Uuid,
        selected_option: i32,
    ) -> Result<ResponseRecord> {
        if assignment.student_id != session.user_id {
            return Err(Error::Forbidden(
                "Only the assigned student can answer this assessment".to_string(),
            ));
        }
        if assignment.status != AssignmentStatus::InProgress {
            return Err(Error::Conflict(format!(
                "Answers cannot be recorded while the attempt is '{}'",
                assignment.status.as_str()
            )));
        }

        let question = self.store.get_question(question_id).await?;
        if question.assessment_id != assignment.assessment_id {
            return Err(Error::NotFound(format!(
                "Question {} not found in this assessment",
                question_id
            )));
        }
        if !question.has_option(selected_option) {
            return Err(Error::BadRequest(format!(
                "Option {} does not exist (question has {} options)",
                selected_option,
                question.options.len()
            )));
        }

        Ok(build_record(assignment.id, &question, selected_option))
    }

    async fn write(&self, record: ResponseRecord) -> Result<Response> {
        let (assignment_id, question_id) = (record.assignment_id, record.question_id);
        match self.store.upsert_response(record).await {
            Ok(response) => {
                self.unsaved.clear(assignment_id, question_id);
                tracing::debug!(
                    assignment_id = %assignment_id,
                    question_id = %question_id,
                    selected_option = response.selected_option,
                    "Answer recorded"
                );
                Ok(response)
            }
            Err(e) => {
                if e.is_retryable() {
                    self.unsaved.mark(assignment_id, question_id);
                }
                Err(e)
            }
        }
    }

    pub async fn current_answer(
        &self,
        assignment_id: Uuid,
        question_id: Uuid,
    ) -> Result<Option<Response>> {
        self.store.get_response(assignment_id, question_id).await
    }
}

fn build_record(assignment_id: Uuid, question: &Question, selected_option: i32) -> ResponseRecord {
    ResponseRecord {
        assignment_id,
        question_id: question.id,
        selected_option,
        is_correct: question.is_correct(selected_option),
        points_earned: question.points_for(selected_option),
        answered_at: Utc::now(),
    }
}
