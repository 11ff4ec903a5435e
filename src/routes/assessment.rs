use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::error::Result;
use crate::models::session::Session;
use crate::AppState;

#[axum::debug_handler]
pub async fn get_summary(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(assessment_id): Path<Uuid>,
) -> Result<Response> {
    let summary = state
        .stats_service
        .assessment_summary(&session, assessment_id)
        .await?;
    Ok(Json(summary).into_response())
}
