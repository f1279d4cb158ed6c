//! Bearer-token authentication for the scheduler trigger endpoints.
//!
//! The external time-based caller presents the shared secret as
//! `Authorization: Bearer <token>`; the comparison is constant-time.

use crate::startup::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use subtle::ConstantTimeEq;

pub async fn cron_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing bearer token"))
        })?;

    let expected = state.config.cron.secret.as_bytes();
    if token.as_bytes().ct_eq(expected).unwrap_u8() != 1 {
        tracing::warn!("Cron trigger rejected: bearer token mismatch");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid bearer token"
        )));
    }

    Ok(next.run(req).await)
}
