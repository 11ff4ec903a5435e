use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::store::{answers_closed, AssessmentStore};
use crate::error::{Error, Result};
use crate::models::assessment::Assessment;
use crate::models::assignment::{Assignment, AssignmentUpdate};
use crate::models::question::Question;
use crate::models::response::{Response, ResponseRecord};

const ASSIGNMENT_COLUMNS: &str = "id, assessment_id, student_id, status, started_at, completed_at, \
     score, total_points, percentage, passed";

const RESPONSE_COLUMNS: &str =
    "id, assignment_id, question_id, selected_option, is_correct, points_earned, answered_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AssessmentRow {
    id: Uuid,
    title: String,
    assessment_type: String,
    duration_minutes: i32,
    total_points: i32,
    passing_score: Decimal,
    due_date: Option<DateTime<Utc>>,
    status: String,
    professor_id: Uuid,
}

impl TryFrom<AssessmentRow> for Assessment {
    type Error = Error;

    fn try_from(row: AssessmentRow) -> Result<Self> {
        Ok(Assessment {
            id: row.id,
            title: row.title,
            assessment_type: row.assessment_type.parse()?,
            duration_minutes: row.duration_minutes,
            total_points: row.total_points,
            passing_score: row.passing_score,
            due_date: row.due_date,
            status: row.status.parse()?,
            professor_id: row.professor_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    assessment_id: Uuid,
    position: i32,
    text: String,
    options: Json<Vec<String>>,
    correct_option: i32,
    points: i32,
    explanation: Option<String>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            assessment_id: row.assessment_id,
            position: row.position,
            text: row.text,
            options: row.options.0,
            correct_option: row.correct_option,
            points: row.points,
            explanation: row.explanation,
        }
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: Uuid,
    assessment_id: Uuid,
    student_id: Uuid,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    score: Option<i32>,
    total_points: Option<i32>,
    percentage: Option<i32>,
    passed: Option<bool>,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = Error;

    fn try_from(row: AssignmentRow) -> Result<Self> {
        Ok(Assignment {
            id: row.id,
            assessment_id: row.assessment_id,
            student_id: row.student_id,
            status: row.status.parse()?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            score: row.score,
            total_points: row.total_points,
            percentage: row.percentage,
            passed: row.passed,
        })
    }
}

#[async_trait]
impl AssessmentStore for PgStore {
    async fn get_assignment(&self, id: Uuid) -> Result<Assignment> {
        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {} FROM assignments WHERE id = $1",
            ASSIGNMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Assignment {} not found", id)))?;
        row.try_into()
    }

    async fn update_assignment(
        &self,
        id: Uuid,
        update: AssignmentUpdate,
    ) -> Result<Option<Assignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            r#"
            UPDATE assignments
            SET status = COALESCE($2, status),
                started_at = COALESCE($3, started_at),
                completed_at = COALESCE($4, completed_at),
                score = COALESCE($5, score),
                total_points = COALESCE($6, total_points),
                percentage = COALESCE($7, percentage),
                passed = COALESCE($8, passed),
                updated_at = NOW()
            WHERE id = $1
              AND ($9::text IS NULL OR status = $9)
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.started_at)
        .bind(update.completed_at)
        .bind(update.score)
        .bind(update.total_points)
        .bind(update.percentage)
        .bind(update.passed)
        .bind(update.expected_status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_into()?)),
            None => {
                // Distinguish a lost status race from a missing row.
                self.get_assignment(id).await?;
                Ok(None)
            }
        }
    }

    async fn list_assignments(&self, assessment_id: Uuid) -> Result<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {} FROM assignments WHERE assessment_id = $1 ORDER BY created_at",
            ASSIGNMENT_COLUMNS
        ))
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Assignment::try_from).collect()
    }

    async fn get_assessment(&self, id: Uuid) -> Result<Assessment> {
        let row = sqlx::query_as::<_, AssessmentRow>(
            r#"
            SELECT id, title, assessment_type, duration_minutes, total_points,
                   passing_score, due_date, status, professor_id
            FROM assessments WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Assessment {} not found", id)))?;
        row.try_into()
    }

    async fn get_questions(&self, assessment_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, assessment_id, position, text, options, correct_option, points, explanation
            FROM questions WHERE assessment_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Question::from).collect())
    }

    async fn get_question(&self, id: Uuid) -> Result<Question> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, assessment_id, position, text, options, correct_option, points, explanation
            FROM questions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Question {} not found", id)))?;
        Ok(row.into())
    }

    async fn get_response(
        &self,
        assignment_id: Uuid,
        question_id: Uuid,
    ) -> Result<Option<Response>> {
        let row = sqlx::query_as::<_, Response>(&format!(
            "SELECT {} FROM responses WHERE assignment_id = $1 AND question_id = $2",
            RESPONSE_COLUMNS
        ))
        .bind(assignment_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_response(&self, record: ResponseRecord) -> Result<Response> {
        // FOR SHARE makes a concurrent status change wait for this write, and
        // makes this write see the new status once that change commits.
        let row = sqlx::query_as::<_, Response>(&format!(
            r#"
            INSERT INTO responses (
                assignment_id, question_id, selected_option, is_correct, points_earned, answered_at
            )
            SELECT $1, $2, $3, $4, $5, $6
            WHERE EXISTS (
                SELECT 1 FROM assignments
                WHERE id = $1 AND status = 'in_progress'
                FOR SHARE
            )
            ON CONFLICT (assignment_id, question_id) DO UPDATE
            SET selected_option = EXCLUDED.selected_option,
                is_correct = EXCLUDED.is_correct,
                points_earned = EXCLUDED.points_earned,
                answered_at = EXCLUDED.answered_at
            RETURNING {}
            "#,
            RESPONSE_COLUMNS
        ))
        .bind(record.assignment_id)
        .bind(record.question_id)
        .bind(record.selected_option)
        .bind(record.is_correct)
        .bind(record.points_earned)
        .bind(record.answered_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row),
            None => {
                self.get_assignment(record.assignment_id).await?;
                Err(answers_closed(record.assignment_id))
            }
        }
    }

    async fn list_responses(&self, assignment_id: Uuid) -> Result<Vec<Response>> {
        let rows = sqlx::query_as::<_, Response>(&format!(
            "SELECT {} FROM responses WHERE assignment_id = $1 ORDER BY answered_at",
            RESPONSE_COLUMNS
        ))
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
