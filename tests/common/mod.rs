#![allow(dead_code)]

use std::sync::Arc;

use assessment_engine::database::{AssessmentStore, MemoryStore};
use assessment_engine::middleware::auth::issue_token;
use assessment_engine::models::assessment::{Assessment, AssessmentStatus, AssessmentType};
use assessment_engine::models::assignment::{Assignment, AssignmentStatus};
use assessment_engine::models::question::Question;
use assessment_engine::models::session::Session;
use assessment_engine::{routes, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "test-secret";

pub struct Seed {
    pub assessment: Assessment,
    pub questions: Vec<Question>,
    pub assignment_id: Uuid,
    pub student: Session,
    pub professor: Session,
}

impl Seed {
    pub fn student_token(&self) -> String {
        issue_token(&self.student, SECRET, 3600).expect("token")
    }

    pub fn professor_token(&self) -> String {
        issue_token(&self.professor, SECRET, 3600).expect("token")
    }
}

pub struct SeedOptions {
    pub points: Vec<i32>,
    pub passing_score: i64,
    pub duration_minutes: i32,
    pub status: AssignmentStatus,
    pub started_at: Option<DateTime<Utc>>,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            points: vec![10, 10, 10, 10],
            passing_score: 70,
            duration_minutes: 30,
            status: AssignmentStatus::Assigned,
            started_at: None,
        }
    }
}

/// Every seeded question has four options and option 1 is correct.
pub fn seed(store: &MemoryStore, opts: SeedOptions) -> Seed {
    let professor = Session::professor(Uuid::new_v4());
    let student = Session::student(Uuid::new_v4());

    let assessment = Assessment {
        id: Uuid::new_v4(),
        title: "Chest pain differentials".into(),
        assessment_type: AssessmentType::Quiz,
        duration_minutes: opts.duration_minutes,
        total_points: opts.points.iter().sum(),
        passing_score: Decimal::from(opts.passing_score),
        due_date: None,
        status: AssessmentStatus::Active,
        professor_id: professor.user_id,
    };
    store.insert_assessment(assessment.clone()).expect("assessment");

    let questions: Vec<Question> = opts
        .points
        .iter()
        .enumerate()
        .map(|(idx, points)| Question {
            id: Uuid::new_v4(),
            assessment_id: assessment.id,
            position: idx as i32 + 1,
            text: format!("Question {}", idx + 1),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_option: 1,
            points: *points,
            explanation: Some(format!("Explanation {}", idx + 1)),
        })
        .collect();
    for q in &questions {
        store.insert_question(q.clone()).expect("question");
    }

    let assignment_id = Uuid::new_v4();
    store
        .insert_assignment(Assignment {
            id: assignment_id,
            assessment_id: assessment.id,
            student_id: student.user_id,
            status: opts.status,
            started_at: opts.started_at,
            completed_at: None,
            score: None,
            total_points: None,
            percentage: None,
            passed: None,
        })
        .expect("assignment");

    Seed {
        assessment,
        questions,
        assignment_id,
        student,
        professor,
    }
}

pub fn app(store: Arc<dyn AssessmentStore>) -> (AppState, Router) {
    let state = AppState::new(store, SECRET);
    let router = routes::router(state.clone());
    (state, router)
}

pub async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
    (status, json)
}

use assessment_engine::error::{Error, Result};
use assessment_engine::models::assignment::AssignmentUpdate;
use assessment_engine::models::response::{Response, ResponseRecord};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::Notify;

/// Wraps the memory store to inject write failures and count completions.
#[derive(Default)]
pub struct InstrumentedStore {
    pub inner: MemoryStore,
    pub fail_response_writes: AtomicBool,
    pub fail_assignment_updates: AtomicBool,
    pub completions: AtomicU32,
    /// When set, the next `list_responses` reads, then signals `paused` and
    /// waits for `resume` before returning.
    pub pause_next_response_read: AtomicBool,
    pub paused: Notify,
    pub resume: Notify,
}

impl InstrumentedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn completions(&self) -> u32 {
        self.completions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssessmentStore for InstrumentedStore {
    async fn get_assignment(&self, id: Uuid) -> Result<Assignment> {
        self.inner.get_assignment(id).await
    }

    async fn update_assignment(&self, id: Uuid, update: AssignmentUpdate) -> Result<Option<Assignment>> {
        if self.fail_assignment_updates.load(Ordering::SeqCst) {
            return Err(Error::TransientWriteFailure("connection refused".into()));
        }
        let completing = update.status == Some(AssignmentStatus::Completed);
        let result = self.inner.update_assignment(id, update).await?;
        if completing && result.is_some() {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
        Ok(result)
    }

    async fn list_assignments(&self, assessment_id: Uuid) -> Result<Vec<Assignment>> {
        self.inner.list_assignments(assessment_id).await
    }

    async fn get_assessment(&self, id: Uuid) -> Result<Assessment> {
        self.inner.get_assessment(id).await
    }

    async fn get_questions(&self, assessment_id: Uuid) -> Result<Vec<Question>> {
        self.inner.get_questions(assessment_id).await
    }

    async fn get_question(&self, id: Uuid) -> Result<Question> {
        self.inner.get_question(id).await
    }

    async fn get_response(&self, assignment_id: Uuid, question_id: Uuid) -> Result<Option<Response>> {
        self.inner.get_response(assignment_id, question_id).await
    }

    async fn upsert_response(&self, record: ResponseRecord) -> Result<Response> {
        if self.fail_response_writes.load(Ordering::SeqCst) {
            return Err(Error::TransientWriteFailure("connection reset".into()));
        }
        self.inner.upsert_response(record).await
    }

    async fn list_responses(&self, assignment_id: Uuid) -> Result<Vec<Response>> {
        let rows = self.inner.list_responses(assignment_id).await?;
        if self.pause_next_response_read.swap(false, Ordering::SeqCst) {
            self.paused.notify_one();
            self.resume.notified().await;
        }
        Ok(rows)
    }
}

pub fn set(flag: &AtomicBool, value: bool) {
    flag.store(value, Ordering::SeqCst);
}

/// Polls until the assignment reaches `status` or about two seconds pass.
pub async fn wait_for_status(store: &dyn AssessmentStore, id: Uuid, status: AssignmentStatus) -> Assignment {
    for _ in 0..200 {
        let current = store.get_assignment(id).await.expect("assignment");
        if current.status == status {
            return current;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("assignment {} never reached {:?}", id, status);
}
