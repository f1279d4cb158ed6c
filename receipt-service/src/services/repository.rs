//! Persistence seam for the saga, sweep, and lifecycle services.

use crate::models::{
    CreateReceipt, ListReceiptsFilter, Receipt, ReceiptStatus, SagaStep, SweepRun, SweepTrigger,
    Tenancy,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use uuid::Uuid;

/// Outcome counters recorded on a completed sweep run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepCounts {
    pub processed: i32,
    pub generated: i32,
    pub skipped: i32,
    pub failed: i32,
}

#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    /// Tenancies with an active occupant and a configured billing anchor.
    async fn list_billable_tenancies(&self) -> Result<Vec<Tenancy>, AppError>;

    async fn get_tenancy(&self, tenancy_id: Uuid) -> Result<Option<Tenancy>, AppError>;

    /// Creates a receipt row. A duplicate `(tenancy, period_start)` pair is
    /// rejected by the database's unique index and surfaces as `Conflict`.
    async fn create_receipt(&self, input: &CreateReceipt) -> Result<Receipt, AppError>;

    async fn get_receipt(&self, receipt_id: Uuid) -> Result<Option<Receipt>, AppError>;

    /// The receipt covering the period that starts on `period_start`, if one
    /// was already generated for this tenancy.
    async fn find_receipt_for_period(
        &self,
        tenancy_id: Uuid,
        period_start: NaiveDate,
    ) -> Result<Option<Receipt>, AppError>;

    async fn list_receipts(&self, filter: &ListReceiptsFilter) -> Result<Vec<Receipt>, AppError>;

    /// Records the artifact reference once the store confirmed the write.
    async fn attach_artifact(&self, receipt_id: Uuid, reference: &str)
        -> Result<Receipt, AppError>;

    /// Advances the persisted saga step cursor and returns the updated row,
    /// so callers always hand out a receipt whose cursor matches storage.
    async fn set_generation_step(&self, receipt_id: Uuid, step: SagaStep)
        -> Result<Receipt, AppError>;

    /// Single conditional update keyed by (id, expected current status).
    /// Returns `None` when the row was not in `from` anymore, so racing
    /// transitions cannot both win.
    async fn transition_status(
        &self,
        receipt_id: Uuid,
        from: ReceiptStatus,
        to: ReceiptStatus,
    ) -> Result<Option<Receipt>, AppError>;

    /// Compensation path only; never exposed as a user-facing operation.
    async fn delete_receipt(&self, receipt_id: Uuid) -> Result<(), AppError>;

    async fn create_sweep_run(
        &self,
        trigger: SweepTrigger,
        reference_date: NaiveDate,
    ) -> Result<SweepRun, AppError>;

    async fn complete_sweep_run(&self, run_id: Uuid, counts: SweepCounts)
        -> Result<(), AppError>;
}
