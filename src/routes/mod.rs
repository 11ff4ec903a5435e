pub mod assessment;
pub mod attempt;
pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::middleware::auth::require_session;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/attempts/:assignment_id/open", post(attempt::open_attempt))
        .route("/api/attempts/:assignment_id/answers", put(attempt::record_answer))
        .route(
            "/api/attempts/:assignment_id/answers/:question_id",
            get(attempt::get_answer),
        )
        .route("/api/attempts/:assignment_id/submit", post(attempt::submit_attempt))
        .route("/api/attempts/:assignment_id/status", get(attempt::get_status))
        .route("/api/attempts/:assignment_id/close", post(attempt::close_attempt))
        .route("/api/attempts/:assignment_id/review", get(attempt::get_review))
        .route(
            "/api/assessments/:assessment_id/summary",
            get(assessment::get_summary),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(api)
        .with_state(state)
}
