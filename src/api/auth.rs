use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use serde_json::json;

use super::AppState;

pub const ORGANIZATION_HEADER: &str = "X-Organization-Id";
pub const USER_HEADER: &str = "X-User-Id";

type Rejection = (StatusCode, Json<serde_json::Value>);

fn unauthorized(message: &str) -> Rejection {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": message, "code": "UNAUTHORIZED"})))
}

pub async fn api_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Rejection> {
    if let Some(expected_token) = state.api_token.as_deref() {
        let auth_header = request.headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok());

        match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) if token == expected_token => {}
            Some(_) => return Err(unauthorized("Invalid API token")),
            None => return Err(unauthorized("Missing Authorization header")),
        }
    }

    Ok(next.run(request).await)
}

/// Caller identity as forwarded by the authenticating gateway.
#[derive(Debug, Clone)]
pub struct Identity {
    pub organization_id: String,
    pub user_id: String,
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let organization_id = header_value(parts, ORGANIZATION_HEADER)
            .ok_or_else(|| unauthorized("Missing X-Organization-Id header"))?;
        let user_id = header_value(parts, USER_HEADER)
            .ok_or_else(|| unauthorized("Missing X-User-Id header"))?;
        Ok(Self { organization_id, user_id })
    }
}
