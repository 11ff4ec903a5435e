use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::database::store::{answers_closed, AssessmentStore};
use crate::error::{Error, Result};
use crate::models::assessment::Assessment;
use crate::models::assignment::{Assignment, AssignmentStatus, AssignmentUpdate};
use crate::models::question::Question;
use crate::models::response::{Response, ResponseRecord};

/// Process-local store used by tests and by the server when no database is
/// configured.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    assessments: HashMap<Uuid, Assessment>,
    questions: HashMap<Uuid, Question>,
    assignments: HashMap<Uuid, Assignment>,
    responses: HashMap<(Uuid, Uuid), Response>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.inner
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }

    pub fn insert_assessment(&self, assessment: Assessment) -> Result<()> {
        self.tables()?.assessments.insert(assessment.id, assessment);
        Ok(())
    }

    pub fn insert_question(&self, question: Question) -> Result<()> {
        self.tables()?.questions.insert(question.id, question);
        Ok(())
    }

    pub fn insert_assignment(&self, assignment: Assignment) -> Result<()> {
        self.tables()?.assignments.insert(assignment.id, assignment);
        Ok(())
    }

    pub fn response_count(&self, assignment_id: Uuid) -> Result<usize> {
        Ok(self
            .tables()?
            .responses
            .keys()
            .filter(|(a, _)| *a == assignment_id)
            .count())
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn get_assignment(&self, id: Uuid) -> Result<Assignment> {
        self.tables()?
            .assignments
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Assignment {} not found", id)))
    }

    async fn update_assignment(
        &self,
        id: Uuid,
        update: AssignmentUpdate,
    ) -> Result<Option<Assignment>> {
        let mut tables = self.tables()?;
        let assignment = tables
            .assignments
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Assignment {} not found", id)))?;
        if let Some(expected) = update.expected_status {
            if assignment.status != expected {
                return Ok(None);
            }
        }
        update.apply_to(assignment);
        Ok(Some(assignment.clone()))
    }

    async fn list_assignments(&self, assessment_id: Uuid) -> Result<Vec<Assignment>> {
        let tables = self.tables()?;
        let mut rows: Vec<Assignment> = tables
            .assignments
            .values()
            .filter(|a| a.assessment_id == assessment_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.id);
        Ok(rows)
    }

    async fn get_assessment(&self, id: Uuid) -> Result<Assessment> {
        self.tables()?
            .assessments
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Assessment {} not found", id)))
    }

    async fn get_questions(&self, assessment_id: Uuid) -> Result<Vec<Question>> {
        let tables = self.tables()?;
        let mut rows: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| q.assessment_id == assessment_id)
            .cloned()
            .collect();
        rows.sort_by_key(|q| (q.position, q.id));
        Ok(rows)
    }

    async fn get_question(&self, id: Uuid) -> Result<Question> {
        self.tables()?
            .questions
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Question {} not found", id)))
    }

    async fn get_response(
        &self,
        assignment_id: Uuid,
        question_id: Uuid,
    ) -> Result<Option<Response>> {
        Ok(self
            .tables()?
            .responses
            .get(&(assignment_id, question_id))
            .cloned())
    }

    async fn upsert_response(&self, record: ResponseRecord) -> Result<Response> {
        let mut tables = self.tables()?;
        let status = tables
            .assignments
            .get(&record.assignment_id)
            .map(|a| a.status)
            .ok_or_else(|| {
                Error::NotFound(format!("Assignment {} not found", record.assignment_id))
            })?;
        if status != AssignmentStatus::InProgress {
            return Err(answers_closed(record.assignment_id));
        }
        let key = (record.assignment_id, record.question_id);
        let id = tables
            .responses
            .get(&key)
            .map(|existing| existing.id)
            .unwrap_or_else(Uuid::new_v4);
        let row = Response {
            id,
            assignment_id: record.assignment_id,
            question_id: record.question_id,
            selected_option: record.selected_option,
            is_correct: record.is_correct,
            points_earned: record.points_earned,
            answered_at: record.answered_at,
        };
        tables.responses.insert(key, row.clone());
        Ok(row)
    }

    async fn list_responses(&self, assignment_id: Uuid) -> Result<Vec<Response>> {
        let tables = self.tables()?;
        let mut rows: Vec<Response> = tables
            .responses
            .values()
            .filter(|r| r.assignment_id == assignment_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.answered_at);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn assignment(status: AssignmentStatus) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            assessment_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            status,
            started_at: Some(Utc::now()),
            completed_at: None,
            score: None,
            total_points: None,
            percentage: None,
            passed: None,
        }
    }

    fn record(assignment_id: Uuid, selected_option: i32) -> ResponseRecord {
        ResponseRecord {
            assignment_id,
            question_id: Uuid::new_v4(),
            selected_option,
            is_correct: false,
            points_earned: 0,
            answered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_requires_an_open_attempt() {
        let store = MemoryStore::new();
        let open = assignment(AssignmentStatus::InProgress);
        let done = assignment(AssignmentStatus::Completed);
        let fresh = assignment(AssignmentStatus::Assigned);
        for a in [&open, &done, &fresh] {
            store.insert_assignment(a.clone()).unwrap();
        }

        store.upsert_response(record(open.id, 0)).await.unwrap();
        let err = store.upsert_response(record(done.id, 0)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        let err = store.upsert_response(record(fresh.id, 0)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        let err = store.upsert_response(record(Uuid::new_v4(), 0)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        assert_eq!(store.response_count(open.id).unwrap(), 1);
        assert_eq!(store.response_count(done.id).unwrap(), 0);
    }

    #[tokio::test]
    async fn completing_closes_the_attempt_to_answers() {
        let store = MemoryStore::new();
        let a = assignment(AssignmentStatus::InProgress);
        store.insert_assignment(a.clone()).unwrap();
        let first = record(a.id, 1);
        store.upsert_response(first.clone()).await.unwrap();

        let update = AssignmentUpdate {
            expected_status: Some(AssignmentStatus::InProgress),
            status: Some(AssignmentStatus::Completed),
            ..Default::default()
        };
        store.update_assignment(a.id, update).await.unwrap();

        let overwrite = ResponseRecord {
            selected_option: 2,
            ..first
        };
        let err = store.upsert_response(overwrite).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        let kept = store.list_responses(a.id).await.unwrap();
        assert_eq!(kept[0].selected_option, 1);
    }
}
