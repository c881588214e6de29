use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::Level;

use duckgate_core::api_key::mask_key;
use duckgate_core::{log_operation, Operation};

use crate::error::ApiError;
use crate::routes::AppState;

pub const MISSING_HEADER: &str = "Invalid or missing Authorization header";
pub const INVALID_ADMIN_TOKEN: &str = "Invalid admin token";
pub const INVALID_API_KEY: &str = "Invalid API key";

/// Token from an `Authorization: Bearer <token>` header, if well formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}

/// Admin check. Returns the accepted token, or an empty string when key
/// checks are bypassed.
pub fn check_admin<'a>(state: &AppState, headers: &'a HeaderMap) -> Result<&'a str, ApiError> {
    if state.keys.is_bypass() {
        log_operation(Level::DEBUG, Operation::AdminValidate, "bypassed");
        return Ok("");
    }

    let Some(token) = bearer_token(headers) else {
        log_operation(Level::WARN, Operation::Error, MISSING_HEADER);
        return Err(ApiError::Unauthorized(MISSING_HEADER));
    };
    if !constant_time_eq(token, &state.config.admin_token) {
        log_operation(Level::WARN, Operation::Error, INVALID_ADMIN_TOKEN);
        return Err(ApiError::Forbidden(INVALID_ADMIN_TOKEN));
    }

    log_operation(Level::DEBUG, Operation::AdminValidate, "admin token accepted");
    Ok(token)
}

/// Key check. Every accepted key has its usage counter bumped.
pub async fn check_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if state.keys.is_bypass() {
        return Ok(());
    }

    let Some(token) = bearer_token(headers) else {
        log_operation(Level::WARN, Operation::Error, MISSING_HEADER);
        return Err(ApiError::Unauthorized(MISSING_HEADER));
    };
    if !state.keys.validate(token).await? {
        log_operation(
            Level::WARN,
            Operation::Error,
            format!("{INVALID_API_KEY}: {}", mask_key(token)),
        );
        return Err(ApiError::Unauthorized(INVALID_API_KEY));
    }
    Ok(())
}

/// Route layer for the key management routes.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check_admin(&state, request.headers())?;
    Ok(next.run(request).await)
}

/// Route layer for the chat routes.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check_api_key(&state, request.headers()).await?;
    Ok(next.run(request).await)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
