//! Receipt endpoints: ad hoc creation, lookup, status transitions, delivery.

use crate::models::{ListReceiptsFilter, Receipt, ReceiptStatus};
use crate::services::{BillingPeriod, ManualReceipt};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_create_receipt"))]
pub struct CreateReceiptRequest {
    pub tenancy_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_rent: Decimal,
    pub charges: Decimal,
    #[serde(default)]
    pub send_immediately: bool,
}

fn validate_create_receipt(req: &CreateReceiptRequest) -> Result<(), ValidationError> {
    if req.period_end < req.period_start {
        return Err(ValidationError::new("period_end_before_period_start"));
    }
    if req.base_rent < Decimal::ZERO || req.charges < Decimal::ZERO {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ReceiptStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListReceiptsParams {
    pub tenancy_id: Option<Uuid>,
    pub status: Option<ReceiptStatus>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

/// Ad hoc receipt creation, outside the schedule.
pub async fn create_receipt(
    State(state): State<AppState>,
    Json(request): Json<CreateReceiptRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let receipt = state
        .saga
        .generate_manual(ManualReceipt {
            tenancy_id: request.tenancy_id,
            period: BillingPeriod {
                start: request.period_start,
                end: request.period_end,
            },
            base_rent: request.base_rent,
            charges: request.charges,
            send_immediately: request.send_immediately,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn get_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> Result<Json<Receipt>, AppError> {
    let receipt = state
        .repo
        .get_receipt(receipt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receipt {} not found", receipt_id)))?;
    Ok(Json(receipt))
}

pub async fn list_receipts(
    State(state): State<AppState>,
    Query(params): Query<ListReceiptsParams>,
) -> Result<Json<Vec<Receipt>>, AppError> {
    let filter = ListReceiptsFilter {
        tenancy_id: params.tenancy_id,
        status: params.status,
        page_size: params.page_size.unwrap_or(50),
        page_token: params.page_token,
    };
    let receipts = state.repo.list_receipts(&filter).await?;
    Ok(Json(receipts))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Receipt>, AppError> {
    let receipt = state
        .lifecycle
        .update_status(receipt_id, request.status)
        .await?;
    Ok(Json(receipt))
}

pub async fn deliver(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> Result<Json<Receipt>, AppError> {
    let receipt = state.lifecycle.deliver(receipt_id).await?;
    Ok(Json(receipt))
}
