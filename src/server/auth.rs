//! Bearer-token authentication middleware.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;
use tracing::debug;

use super::AppState;
use super::error::ApiError;

/// Reject any request whose `Authorization` header is not
/// `Bearer <configured token>`.
pub async fn require_bearer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorized = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .is_some_and(|token| token_matches(token, &state.token));

    if !authorized {
        debug!(uri = %req.uri(), "rejected unauthenticated request");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}

// Length still leaks; the contents do not.
fn token_matches(presented: &str, expected: &str) -> bool {
    presented.len() == expected.len()
        && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
