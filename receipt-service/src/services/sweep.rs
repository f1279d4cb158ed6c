//! Scheduling sweep: one evaluation pass over all billable tenancies.

use crate::models::{SweepTrigger, Tenancy};
use crate::services::calendar;
use crate::services::metrics::{RECEIPTS_GENERATED_TOTAL, SWEEPS_TOTAL};
use crate::services::repository::{ReceiptRepository, SweepCounts};
use crate::services::saga::{GenerationMode, ReceiptSaga};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// What a sweep did, returned to the trigger caller.
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub run_id: Uuid,
    pub reference_date: NaiveDate,
    pub tenancies_processed: i32,
    pub receipts_generated: i32,
    pub tenancies_skipped: i32,
    pub tenancies_failed: i32,
}

enum ItemOutcome {
    Generated,
    Skipped,
    Failed,
}

pub struct SweepService {
    repo: Arc<dyn ReceiptRepository>,
    saga: Arc<ReceiptSaga>,
    concurrency: usize,
}

impl SweepService {
    pub fn new(repo: Arc<dyn ReceiptRepository>, saga: Arc<ReceiptSaga>, concurrency: usize) -> Self {
        Self {
            repo,
            saga,
            concurrency: concurrency.max(1),
        }
    }

    /// Evaluate every billable tenancy for `reference` and run the saga for
    /// the due ones. Tenancies are independent, so the due set is processed
    /// through a bounded worker pool; one tenancy's failure never stops the
    /// others.
    #[instrument(skip(self), fields(trigger = trigger.as_str(), mode = mode.as_str(), reference = %reference))]
    pub async fn run(
        &self,
        trigger: SweepTrigger,
        mode: GenerationMode,
        reference: NaiveDate,
    ) -> Result<SweepSummary, AppError> {
        let run = self.repo.create_sweep_run(trigger, reference).await?;

        let tenancies = self.repo.list_billable_tenancies().await?;
        let due: Vec<Tenancy> = tenancies
            .into_iter()
            .filter(|t| {
                t.billing_anchor
                    .map(|anchor| calendar::is_due(anchor, t.frequency(), reference))
                    .unwrap_or(false)
            })
            .collect();

        tracing::info!(
            run_id = %run.run_id,
            due = due.len(),
            "Sweep evaluated due set"
        );

        let outcomes: Vec<ItemOutcome> = stream::iter(due)
            .map(|tenancy| self.process_tenancy(tenancy, reference, mode))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut counts = SweepCounts::default();
        for outcome in &outcomes {
            counts.processed += 1;
            match outcome {
                ItemOutcome::Generated => counts.generated += 1,
                ItemOutcome::Skipped => counts.skipped += 1,
                ItemOutcome::Failed => counts.failed += 1,
            }
        }

        self.repo.complete_sweep_run(run.run_id, counts).await?;
        SWEEPS_TOTAL
            .with_label_values(&[trigger.as_str(), "completed"])
            .inc();

        tracing::info!(
            run_id = %run.run_id,
            processed = counts.processed,
            generated = counts.generated,
            skipped = counts.skipped,
            failed = counts.failed,
            "Sweep completed"
        );

        Ok(SweepSummary {
            run_id: run.run_id,
            reference_date: reference,
            tenancies_processed: counts.processed,
            receipts_generated: counts.generated,
            tenancies_skipped: counts.skipped,
            tenancies_failed: counts.failed,
        })
    }

    async fn process_tenancy(
        &self,
        tenancy: Tenancy,
        reference: NaiveDate,
        mode: GenerationMode,
    ) -> ItemOutcome {
        match self.saga.generate_scheduled(&tenancy, reference, mode).await {
            Ok(receipt) => {
                RECEIPTS_GENERATED_TOTAL
                    .with_label_values(&[mode.as_str(), "generated"])
                    .inc();
                tracing::info!(
                    tenancy_id = %tenancy.tenancy_id,
                    receipt_id = %receipt.receipt_id,
                    "Receipt generated"
                );
                ItemOutcome::Generated
            }
            Err(AppError::Conflict(e)) => {
                RECEIPTS_GENERATED_TOTAL
                    .with_label_values(&[mode.as_str(), "skipped"])
                    .inc();
                tracing::info!(
                    tenancy_id = %tenancy.tenancy_id,
                    reason = %e,
                    "Receipt already exists for this period, skipping"
                );
                // A review-ahead run may have generated this receipt without
                // mailing the tenant; an immediate run still owes that send.
                if mode == GenerationMode::Immediate {
                    if let Err(e) = self.saga.notify_unsent(&tenancy, reference).await {
                        tracing::error!(
                            tenancy_id = %tenancy.tenancy_id,
                            property_id = %tenancy.property_id,
                            error = %e,
                            "Failed to send previously generated receipt"
                        );
                        return ItemOutcome::Failed;
                    }
                }
                ItemOutcome::Skipped
            }
            Err(e) => {
                RECEIPTS_GENERATED_TOTAL
                    .with_label_values(&[mode.as_str(), "failed"])
                    .inc();
                tracing::error!(
                    tenancy_id = %tenancy.tenancy_id,
                    property_id = %tenancy.property_id,
                    error = %e,
                    "Receipt generation failed for tenancy"
                );
                ItemOutcome::Failed
            }
        }
    }
}
