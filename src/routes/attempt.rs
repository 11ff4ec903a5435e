use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;
use validator::Validate;

use crate::dto::attempt_dto::{
    ActiveAttemptResponse, AssessmentSummaryDto, AttemptQuestion, AttemptStatusResponse,
    CloseAttemptResponse, CurrentAnswerResponse, OpenAttemptResponse, RecordAnswerRequest,
    RecordAnswerResponse, ReviewResponse, SubmitAttemptRequest, SubmitAttemptResponse,
};
use crate::error::Result;
use crate::models::assessment::Assessment;
use crate::models::session::Session;
use crate::services::attempt_service::{ActiveAttempt, AnswerInput, AttemptReview, AttemptView};
use crate::services::response_recorder::RecordOutcome;
use crate::AppState;

fn assessment_dto(assessment: &Assessment, total_questions: usize) -> AssessmentSummaryDto {
    AssessmentSummaryDto {
        id: assessment.id,
        title: assessment.title.clone(),
        assessment_type: assessment.assessment_type,
        duration_minutes: assessment.duration_minutes,
        total_questions,
        passing_score: assessment.passing_score.to_f64().unwrap_or(0.0),
        due_date: assessment.due_date,
    }
}

fn active_response(active: ActiveAttempt) -> ActiveAttemptResponse {
    let selected: HashMap<Uuid, i32> = active
        .responses
        .iter()
        .map(|r| (r.question_id, r.selected_option))
        .collect();
    let questions = active
        .questions
        .iter()
        .map(|q| AttemptQuestion {
            id: q.id,
            position: q.position,
            text: q.text.clone(),
            options: q.options.clone(),
            points: q.points,
            selected_option: selected.get(&q.id).copied(),
        })
        .collect();

    ActiveAttemptResponse {
        assignment_id: active.assignment.id,
        status: active.assignment.status,
        started_at: active.assignment.started_at,
        remaining_seconds: active.remaining_seconds,
        assessment: assessment_dto(&active.assessment, active.questions.len()),
        questions,
    }
}

fn review_response(review: AttemptReview) -> ReviewResponse {
    ReviewResponse {
        assignment_id: review.assignment.id,
        status: review.assignment.status,
        assessment: assessment_dto(&review.assessment, review.answers.len()),
        raw_score: review.score.raw_score,
        total_points: review.score.total_points,
        percentage: review.score.percentage,
        passed: review.score.passed,
        started_at: review.assignment.started_at,
        completed_at: review.assignment.completed_at,
        answers: review.answers,
    }
}

#[axum::debug_handler]
pub async fn open_attempt(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Response> {
    tracing::info!(assignment_id = %assignment_id, user_id = %session.user_id, "Opening attempt");
    let view = state.attempt_service.open(&session, assignment_id).await?;
    let body = match view {
        AttemptView::InProgress(active) => OpenAttemptResponse::Attempt(active_response(active)),
        AttemptView::Review(review) => OpenAttemptResponse::Review(review_response(review)),
    };
    Ok(Json(body).into_response())
}

#[axum::debug_handler]
pub async fn record_answer(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(assignment_id): Path<Uuid>,
    Json(req): Json<RecordAnswerRequest>,
) -> Result<Response> {
    req.validate()?;
    let outcome = state
        .attempt_service
        .record_answer(&session, assignment_id, req.question_id, req.selected_option)
        .await?;

    let response = match outcome {
        RecordOutcome::Saved(saved) => (
            StatusCode::OK,
            Json(RecordAnswerResponse {
                saved: true,
                question_id: saved.question_id,
                answered_at: Some(saved.answered_at),
                error: None,
            }),
        ),
        RecordOutcome::Unsaved { question_id, reason } => (
            StatusCode::ACCEPTED,
            Json(RecordAnswerResponse {
                saved: false,
                question_id,
                answered_at: None,
                error: Some(reason),
            }),
        ),
    };
    Ok(response.into_response())
}

#[axum::debug_handler]
pub async fn get_answer(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((assignment_id, question_id)): Path<(Uuid, Uuid)>,
) -> Result<Response> {
    let current = state
        .attempt_service
        .current_answer(&session, assignment_id, question_id)
        .await?;
    Ok(Json(CurrentAnswerResponse {
        question_id,
        selected_option: current.as_ref().map(|r| r.selected_option),
        answered_at: current.map(|r| r.answered_at),
    })
    .into_response())
}

/// The body is optional; an empty one submits without resending answers.
fn submit_request(body: &[u8]) -> Result<SubmitAttemptRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SubmitAttemptRequest::default());
    }
    Ok(serde_json::from_slice(body)?)
}

#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(assignment_id): Path<Uuid>,
    body: Bytes,
) -> Result<Response> {
    let req = submit_request(&body)?;
    req.validate()?;
    tracing::info!(
        assignment_id = %assignment_id,
        answers = req.answers.len(),
        "Submitting attempt"
    );
    let answers = req
        .answers
        .iter()
        .map(|a| AnswerInput {
            question_id: a.question_id,
            selected_option: a.selected_option,
        })
        .collect();

    let outcome = match state.attempt_service.submit(&session, assignment_id, answers).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(assignment_id = %assignment_id, error = %e, "Submission failed");
            return Err(e);
        }
    };

    Ok(Json(SubmitAttemptResponse {
        assignment_id: outcome.assignment.id,
        status: outcome.assignment.status,
        raw_score: outcome.score.raw_score,
        total_points: outcome.score.total_points,
        percentage: outcome.score.percentage,
        passed: outcome.score.passed,
        completed_at: outcome.assignment.completed_at,
        already_submitted: !outcome.newly_completed,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn get_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Response> {
    let status = state.attempt_service.status(&session, assignment_id).await?;
    Ok(Json(AttemptStatusResponse {
        status: status.status,
        started_at: status.started_at,
        remaining_seconds: status.remaining_seconds,
        timer_running: status.timer_running,
        questions_answered: status.questions_answered,
        total_questions: status.total_questions,
        unsaved_answers: status.unsaved_answers,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn close_attempt(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Response> {
    let timer_stopped = state.attempt_service.close(&session, assignment_id).await?;
    Ok(Json(CloseAttemptResponse { timer_stopped }).into_response())
}

#[axum::debug_handler]
pub async fn get_review(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Response> {
    let review = state.attempt_service.review(&session, assignment_id).await?;
    Ok(Json(review_response(review)).into_response())
}
