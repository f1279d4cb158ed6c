//! Scheduler trigger endpoints, invoked by an external time-based caller.
//!
//! Per-tenancy failures are isolated inside the sweep and reported only in
//! the summary counters; the caller always gets a success acknowledgment
//! when the sweep itself ran.

use crate::models::SweepTrigger;
use crate::services::{GenerationMode, SweepSummary};
use crate::startup::AppState;
use axum::{extract::State, Json};
use chrono::{Days, Utc};
use service_core::error::AppError;

/// Sweep tenancies due today and send receipts to tenants.
pub async fn trigger_immediate(
    State(state): State<AppState>,
) -> Result<Json<SweepSummary>, AppError> {
    let reference = Utc::now().date_naive();
    let summary = state
        .sweep
        .run(SweepTrigger::Scheduled, GenerationMode::Immediate, reference)
        .await?;
    Ok(Json(summary))
}

/// Sweep tenancies due a few days out and ask landlords to review.
pub async fn trigger_review(State(state): State<AppState>) -> Result<Json<SweepSummary>, AppError> {
    let lead = Days::new(state.config.billing.review_lead_days);
    let reference = Utc::now()
        .date_naive()
        .checked_add_days(lead)
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Review reference date out of range"))
        })?;
    let summary = state
        .sweep
        .run(SweepTrigger::Review, GenerationMode::ReviewAhead, reference)
        .await?;
    Ok(Json(summary))
}
