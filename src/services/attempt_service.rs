use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::store::AssessmentStore;
use crate::error::{Error, Result};
use crate::models::assessment::{Assessment, AssessmentStatus};
use crate::models::assignment::{Assignment, AssignmentStatus, AssignmentUpdate};
use crate::models::question::Question;
use crate::models::response::Response;
use crate::models::session::{Role, Session};
use crate::services::grading_service::{GradedAnswer, GradingService, ScoreResult};
use crate::services::response_recorder::{RecordOutcome, ResponseRecorder};
use crate::services::timer::{remaining_seconds, TimerRegistry};

/// What the student sees after opening an assignment.
#[derive(Debug, Clone)]
pub enum AttemptView {
    InProgress(ActiveAttempt),
    /// Finished attempts are only shown read-only.
    Review(AttemptReview),
}

#[derive(Debug, Clone)]
pub struct ActiveAttempt {
    pub assignment: Assignment,
    pub assessment: Assessment,
    pub questions: Vec<Question>,
    pub responses: Vec<Response>,
    pub remaining_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct AttemptReview {
    pub assignment: Assignment,
    pub assessment: Assessment,
    pub score: ScoreResult,
    pub answers: Vec<GradedAnswer>,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub assignment: Assignment,
    pub score: ScoreResult,
    /// `false` when the assignment had already been submitted and this call
    /// changed nothing.
    pub newly_completed: bool,
}

#[derive(Debug, Clone)]
pub struct AttemptStatus {
    pub status: AssignmentStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub remaining_seconds: i64,
    pub timer_running: bool,
    pub questions_answered: usize,
    pub total_questions: usize,
    pub unsaved_answers: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct AnswerInput {
    pub question_id: Uuid,
    pub selected_option: i32,
}

/// Drives an assignment through assigned → in_progress → completed.
#[derive(Clone)]
pub struct AttemptService {
    store: Arc<dyn AssessmentStore>,
    grading: GradingService,
    recorder: ResponseRecorder,
    timers: TimerRegistry,
}

impl AttemptService {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self {
            grading: GradingService::new(store.clone()),
            recorder: ResponseRecorder::new(store.clone()),
            timers: TimerRegistry::new(),
            store,
        }
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    async fn load_owned(&self, session: &Session, assignment_id: Uuid) -> Result<Assignment> {
        let assignment = self.store.get_assignment(assignment_id).await?;
        if assignment.student_id != session.user_id {
            return Err(Error::Forbidden(
                "This assessment is assigned to another student".to_string(),
            ));
        }
        Ok(assignment)
    }

    /// The assigned student, an admin, or the professor who owns the
    /// assessment.
    async fn load_readable(&self, session: &Session, assignment_id: Uuid) -> Result<Assignment> {
        let assignment = self.store.get_assignment(assignment_id).await?;
        let allowed = match session.role {
            _ if assignment.student_id == session.user_id => true,
            Role::Admin => true,
            Role::Professor => {
                let assessment = self.store.get_assessment(assignment.assessment_id).await?;
                assessment.professor_id == session.user_id
            }
            Role::Student => false,
        };
        if !allowed {
            return Err(Error::Forbidden(
                "This assessment is assigned to another student".to_string(),
            ));
        }
        Ok(assignment)
    }

    /// Opens the attempt view. The first open moves the assignment to
    /// `in_progress` and stamps `started_at`; later opens keep the original
    /// start. Finished assignments come back as a review.
    pub async fn open(&self, session: &Session, assignment_id: Uuid) -> Result<AttemptView> {
        let assignment = self.load_owned(session, assignment_id).await?;
        let assessment = self.store.get_assessment(assignment.assessment_id).await?;

        let assignment = match assignment.status {
            AssignmentStatus::Completed | AssignmentStatus::Graded => {
                tracing::info!(
                    assignment_id = %assignment.id,
                    status = assignment.status.as_str(),
                    "Attempt already finished, opening review"
                );
                let review = self.build_review(assignment, assessment).await?;
                return Ok(AttemptView::Review(review));
            }
            AssignmentStatus::Assigned => self.start(assignment, &assessment).await?,
            AssignmentStatus::InProgress => assignment,
        };

        // A concurrent open or submit may have moved the row on.
        if assignment.status.is_finished() {
            let review = self.build_review(assignment, assessment).await?;
            return Ok(AttemptView::Review(review));
        }

        let questions = self.store.get_questions(assessment.id).await?;
        let responses = self.store.list_responses(assignment.id).await?;
        let remaining = remaining_seconds(
            assessment.duration_minutes,
            assignment.started_at,
            Utc::now(),
        );

        self.arm_timer(session, assignment.id, remaining);

        Ok(AttemptView::InProgress(ActiveAttempt {
            assignment,
            assessment,
            questions,
            responses,
            remaining_seconds: remaining,
        }))
    }

    async fn start(&self, assignment: Assignment, assessment: &Assessment) -> Result<Assignment> {
        if assessment.status != AssessmentStatus::Active {
            return Err(Error::Conflict(format!(
                "Assessment is '{}' and cannot be started",
                assessment.status.as_str()
            )));
        }

        let update = AssignmentUpdate {
            expected_status: Some(AssignmentStatus::Assigned),
            status: Some(AssignmentStatus::InProgress),
            started_at: Some(assignment.started_at.unwrap_or_else(Utc::now)),
            ..Default::default()
        };
        match self.store.update_assignment(assignment.id, update).await? {
            Some(started) => {
                tracing::info!(
                    assignment_id = %started.id,
                    assessment_id = %started.assessment_id,
                    "Attempt started"
                );
                Ok(started)
            }
            None => self.store.get_assignment(assignment.id).await,
        }
    }

    fn arm_timer(&self, session: &Session, assignment_id: Uuid, remaining: i64) {
        let svc = self.clone();
        let session = session.clone();
        let started = self.timers.ensure_started(assignment_id, remaining, move || async move {
            tracing::info!(assignment_id = %assignment_id, "Time is up, submitting attempt");
            if let Err(e) = svc.submit(&session, assignment_id, Vec::new()).await {
                tracing::error!(
                    assignment_id = %assignment_id,
                    error = %e,
                    "Automatic submission failed"
                );
            }
        });
        if started {
            tracing::debug!(assignment_id = %assignment_id, remaining, "Countdown started");
        }
    }

    pub async fn record_answer(
        &self,
        session: &Session,
        assignment_id: Uuid,
        question_id: Uuid,
        selected_option: i32,
    ) -> Result<RecordOutcome> {
        self.recorder
            .record_answer(session, assignment_id, question_id, selected_option)
            .await
    }

    pub async fn current_answer(
        &self,
        session: &Session,
        assignment_id: Uuid,
        question_id: Uuid,
    ) -> Result<Option<Response>> {
        let assignment = self.load_readable(session, assignment_id).await?;
        self.recorder.current_answer(assignment.id, question_id).await
    }

    /// Completes the attempt and persists its score.
    ///
    /// `answers` are written first so a client can resend anything whose
    /// earlier write failed. Submitting an already finished assignment is a
    /// no-op that returns the stored result.
    pub async fn submit(
        &self,
        session: &Session,
        assignment_id: Uuid,
        answers: Vec<AnswerInput>,
    ) -> Result<SubmitOutcome> {
        let assignment = self.load_owned(session, assignment_id).await?;

        match assignment.status {
            AssignmentStatus::Completed | AssignmentStatus::Graded => {
                tracing::info!(assignment_id = %assignment.id, "Attempt already submitted");
                return Ok(already_submitted(assignment));
            }
            AssignmentStatus::Assigned => {
                return Err(Error::Conflict(
                    "The attempt has not been started".to_string(),
                ));
            }
            AssignmentStatus::InProgress => {}
        }

        for answer in &answers {
            self.recorder
                .record_answer_strict(session, &assignment, answer.question_id, answer.selected_option)
                .await?;
        }

        let unsaved = self.recorder.unsaved().count(assignment.id);
        if unsaved > 0 {
            tracing::warn!(
                assignment_id = %assignment.id,
                unsaved,
                "Submission blocked by unsaved answers"
            );
            return Err(Error::UnsavedAnswers { count: unsaved });
        }

        let score = self.grading.score_assignment(&assignment).await?;
        let update = AssignmentUpdate {
            expected_status: Some(AssignmentStatus::InProgress),
            status: Some(AssignmentStatus::Completed),
            completed_at: Some(Utc::now()),
            score: Some(score.raw_score),
            total_points: Some(score.total_points),
            percentage: Some(score.percentage),
            passed: Some(score.passed),
            ..Default::default()
        };

        let outcome = match self.store.update_assignment(assignment.id, update).await? {
            Some(completed) => {
                let (completed, score) = self.settle_score(completed, score).await;
                tracing::info!(
                    assignment_id = %completed.id,
                    raw_score = score.raw_score,
                    total_points = score.total_points,
                    percentage = score.percentage,
                    passed = score.passed,
                    "Attempt submitted"
                );
                SubmitOutcome {
                    assignment: completed,
                    score,
                    newly_completed: true,
                }
            }
            None => {
                // Another submission won the race; its score is authoritative.
                let current = self.store.get_assignment(assignment.id).await?;
                tracing::info!(assignment_id = %current.id, "Concurrent submission already completed attempt");
                already_submitted(current)
            }
        };

        self.timers.cancel(assignment.id);
        self.recorder.unsaved().forget(assignment.id);
        Ok(outcome)
    }

    /// Rescores a just-completed assignment. The store refuses answers once
    /// the status is `completed`, so an answer accepted between the first
    /// score read and the status change is visible here.
    async fn settle_score(
        &self,
        completed: Assignment,
        provisional: ScoreResult,
    ) -> (Assignment, ScoreResult) {
        let settled = match self.grading.score_assignment(&completed).await {
            Ok(settled) => settled,
            Err(e) => {
                tracing::error!(
                    assignment_id = %completed.id,
                    error = %e,
                    "Could not rescore completed attempt"
                );
                return (completed, provisional);
            }
        };
        if settled == provisional {
            return (completed, provisional);
        }

        tracing::warn!(
            assignment_id = %completed.id,
            provisional = provisional.raw_score,
            settled = settled.raw_score,
            "Answer recorded during submission, correcting score"
        );
        let update = AssignmentUpdate {
            expected_status: Some(AssignmentStatus::Completed),
            score: Some(settled.raw_score),
            total_points: Some(settled.total_points),
            percentage: Some(settled.percentage),
            passed: Some(settled.passed),
            ..Default::default()
        };
        match self.store.update_assignment(completed.id, update).await {
            Ok(Some(rescored)) => (rescored, settled),
            Ok(None) => (completed, provisional),
            Err(e) => {
                tracing::error!(
                    assignment_id = %completed.id,
                    error = %e,
                    "Could not store corrected score"
                );
                (completed, provisional)
            }
        }
    }

    pub async fn status(&self, session: &Session, assignment_id: Uuid) -> Result<AttemptStatus> {
        let assignment = self.load_readable(session, assignment_id).await?;
        let assessment = self.store.get_assessment(assignment.assessment_id).await?;
        let questions = self.store.get_questions(assessment.id).await?;
        let responses = self.store.list_responses(assignment.id).await?;

        let timer_running = self.timers.is_running(assignment.id);
        let remaining = if assignment.status.is_finished() {
            0
        } else {
            self.timers.remaining(assignment.id).unwrap_or_else(|| {
                remaining_seconds(assessment.duration_minutes, assignment.started_at, Utc::now())
            })
        };

        Ok(AttemptStatus {
            status: assignment.status,
            started_at: assignment.started_at,
            remaining_seconds: remaining,
            timer_running,
            questions_answered: responses.len(),
            total_questions: questions.len(),
            unsaved_answers: self.recorder.unsaved().count(assignment.id),
        })
    }

    /// The student navigated away: stop the countdown. Nothing is persisted.
    pub async fn close(&self, session: &Session, assignment_id: Uuid) -> Result<bool> {
        let assignment = self.load_owned(session, assignment_id).await?;
        let stopped = self.timers.cancel(assignment.id);
        if stopped {
            tracing::debug!(assignment_id = %assignment.id, "Countdown stopped");
        }
        Ok(stopped)
    }

    pub async fn review(&self, session: &Session, assignment_id: Uuid) -> Result<AttemptReview> {
        let assignment = self.load_readable(session, assignment_id).await?;
        if !assignment.status.is_finished() {
            return Err(Error::Conflict(
                "Review is available once the attempt is submitted".to_string(),
            ));
        }
        let assessment = self.store.get_assessment(assignment.assessment_id).await?;
        self.build_review(assignment, assessment).await
    }

    async fn build_review(
        &self,
        assignment: Assignment,
        assessment: Assessment,
    ) -> Result<AttemptReview> {
        let questions = self.store.get_questions(assessment.id).await?;
        let responses = self.store.list_responses(assignment.id).await?;
        Ok(AttemptReview {
            score: ScoreResult::from_stored(&assignment),
            answers: GradingService::breakdown(&questions, &responses),
            assignment,
            assessment,
        })
    }
}

fn already_submitted(assignment: Assignment) -> SubmitOutcome {
    SubmitOutcome {
        score: ScoreResult::from_stored(&assignment),
        assignment,
        newly_completed: false,
    }
}
