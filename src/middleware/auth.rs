use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::models::session::{Role, Session};
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

/// Turns a verified bearer token into a `Session` request extension.
pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(auth_header) = req.headers().get(axum::http::header::AUTHORIZATION) else {
        return unauthorized("missing_authorization");
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return unauthorized("bad_authorization");
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return unauthorized("unsupported_scheme");
    };

    match session_from_token(token, &state.jwt_secret) {
        Ok(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        Err(SessionError::InvalidToken) => unauthorized("invalid_token"),
        Err(SessionError::UnknownRole) => {
            (StatusCode::FORBIDDEN, Json(json!({"error":"forbidden"}))).into_response()
        }
    }
}

fn unauthorized(code: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": code }))).into_response()
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    InvalidToken,
    UnknownRole,
}

pub fn session_from_token(token: &str, secret: &str) -> Result<Session, SessionError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|_| SessionError::InvalidToken)?;

    let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| SessionError::InvalidToken)?;
    let role = match data.claims.role.as_deref() {
        None => Role::Student,
        Some(raw) => Role::parse(raw).ok_or(SessionError::UnknownRole)?,
    };
    Ok(Session { user_id, role })
}

/// Signs a token for `session`, valid for `ttl_seconds`.
pub fn issue_token(
    session: &Session,
    secret: &str,
    ttl_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (chrono::Utc::now().timestamp() + ttl_seconds).max(0) as usize;
    let claims = Claims {
        sub: session.user_id.to_string(),
        exp,
        role: Some(session.role.as_str().to_string()),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}
