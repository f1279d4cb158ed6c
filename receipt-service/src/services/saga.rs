//! Receipt generation saga.
//!
//! Creates the receipt row, renders and stores the document, attaches the
//! reference, and notifies. Any failure after the row exists compensates by
//! deleting the row and any stored artifact, so a receipt never survives a
//! partial run. Notification sits inside that all-or-nothing boundary.

use crate::models::{CreateReceipt, Receipt, ReceiptStatus, SagaStep, Tenancy};
use crate::services::calendar::{self, BillingPeriod};
use crate::services::metrics::{COMPENSATIONS_TOTAL, NOTIFICATIONS_TOTAL};
use crate::services::notifier::Notifier;
use crate::services::renderer::Renderer;
use crate::services::repository::ReceiptRepository;
use crate::services::storage::ArtifactStore;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Who gets notified at the end of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Receipt due today: send to the tenant with the landlord copied.
    Immediate,
    /// Receipt due in a few days: ask the landlord to review first.
    ReviewAhead,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Immediate => "immediate",
            GenerationMode::ReviewAhead => "review_ahead",
        }
    }
}

/// Ad hoc creation request, outside the schedule.
#[derive(Debug, Clone)]
pub struct ManualReceipt {
    pub tenancy_id: Uuid,
    pub period: BillingPeriod,
    pub base_rent: Decimal,
    pub charges: Decimal,
    pub send_immediately: bool,
}

struct PipelineFailure {
    failed_step: SagaStep,
    stored_reference: Option<String>,
    error: AppError,
}

pub struct ReceiptSaga {
    repo: Arc<dyn ReceiptRepository>,
    renderer: Arc<dyn Renderer>,
    store: Arc<dyn ArtifactStore>,
    notifier: Arc<dyn Notifier>,
    call_timeout: Duration,
}

impl ReceiptSaga {
    pub fn new(
        repo: Arc<dyn ReceiptRepository>,
        renderer: Arc<dyn Renderer>,
        store: Arc<dyn ArtifactStore>,
        notifier: Arc<dyn Notifier>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            renderer,
            store,
            notifier,
            call_timeout,
        }
    }

    /// Generate the receipt a sweep found due for `reference`.
    #[instrument(skip(self, tenancy), fields(tenancy_id = %tenancy.tenancy_id, mode = mode.as_str()))]
    pub async fn generate_scheduled(
        &self,
        tenancy: &Tenancy,
        reference: NaiveDate,
        mode: GenerationMode,
    ) -> Result<Receipt, AppError> {
        validate_tenancy(tenancy)?;

        let period = calendar::period_for(tenancy.frequency(), reference).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "No billing period precedes reference date {}",
                reference
            ))
        })?;

        let input = CreateReceipt {
            tenancy_id: tenancy.tenancy_id,
            property_id: tenancy.property_id,
            tenant_id: tenancy.tenant_id,
            period_start: period.start,
            period_end: period.end,
            base_rent: tenancy.base_rent,
            charges: tenancy.charges,
            payment_frequency: tenancy.frequency(),
            status: ReceiptStatus::Pending,
        };

        self.create_and_run(tenancy, input, Some(mode)).await
    }

    /// Ad hoc creation with an explicit period and amounts.
    #[instrument(skip(self, request), fields(tenancy_id = %request.tenancy_id))]
    pub async fn generate_manual(&self, request: ManualReceipt) -> Result<Receipt, AppError> {
        let tenancy = self
            .repo
            .get_tenancy(request.tenancy_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Tenancy {} not found", request.tenancy_id))
            })?;
        validate_tenancy(&tenancy)?;

        if request.period.end < request.period.start {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Period end {} precedes period start {}",
                request.period.end,
                request.period.start
            )));
        }
        if request.base_rent < Decimal::ZERO || request.charges < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Receipt amounts must not be negative"
            )));
        }

        let input = CreateReceipt {
            tenancy_id: tenancy.tenancy_id,
            property_id: tenancy.property_id,
            tenant_id: tenancy.tenant_id,
            period_start: request.period.start,
            period_end: request.period.end,
            base_rent: request.base_rent,
            charges: request.charges,
            payment_frequency: tenancy.frequency(),
            status: if request.send_immediately {
                ReceiptStatus::Pending
            } else {
                ReceiptStatus::Draft
            },
        };

        let notify = request.send_immediately.then_some(GenerationMode::Immediate);
        self.create_and_run(&tenancy, input, notify).await
    }

    /// Send the tenant notification for a receipt an earlier sweep already
    /// generated but never sent (review-ahead runs generate without mailing
    /// the tenant). Returns `None` when there is nothing to send: no receipt
    /// for the period, already notified, or no longer pending.
    #[instrument(skip(self, tenancy), fields(tenancy_id = %tenancy.tenancy_id))]
    pub async fn notify_unsent(
        &self,
        tenancy: &Tenancy,
        reference: NaiveDate,
    ) -> Result<Option<Receipt>, AppError> {
        let period = match calendar::period_for(tenancy.frequency(), reference) {
            Some(period) => period,
            None => return Ok(None),
        };

        let receipt = match self
            .repo
            .find_receipt_for_period(tenancy.tenancy_id, period.start)
            .await?
        {
            Some(receipt) => receipt,
            None => return Ok(None),
        };

        if receipt.status_enum() != ReceiptStatus::Pending
            || receipt.generation_step == SagaStep::Notified.as_str()
        {
            return Ok(None);
        }

        let reference_key = receipt
            .artifact_reference
            .clone()
            .ok_or_else(|| AppError::ArtifactMissing(receipt.receipt_id.to_string()))?;

        let document = self
            .bounded("artifact download", self.store.download(&reference_key))
            .await?;

        let send = async {
            self.notifier
                .send_receipt(&receipt, tenancy, document)
                .await
                .map_err(AppError::from)
        };
        match self.bounded("notify", send).await {
            Ok(()) => {
                NOTIFICATIONS_TOTAL
                    .with_label_values(&["receipt", "sent"])
                    .inc();
            }
            Err(e) => {
                NOTIFICATIONS_TOTAL
                    .with_label_values(&["receipt", "failed"])
                    .inc();
                return Err(e);
            }
        }

        let updated = self
            .repo
            .set_generation_step(receipt.receipt_id, SagaStep::Notified)
            .await?;

        tracing::info!(
            receipt_id = %updated.receipt_id,
            "Previously generated receipt sent to tenant"
        );

        Ok(Some(updated))
    }

    async fn create_and_run(
        &self,
        tenancy: &Tenancy,
        input: CreateReceipt,
        notify: Option<GenerationMode>,
    ) -> Result<Receipt, AppError> {
        // Duplicate (tenancy, period) pairs are rejected here by the unique
        // index; nothing exists yet, so there is nothing to compensate.
        let receipt = self.repo.create_receipt(&input).await?;

        match self.run_pipeline(&receipt, tenancy, notify).await {
            Ok(updated) => Ok(updated),
            Err(failure) => {
                COMPENSATIONS_TOTAL
                    .with_label_values(&[failure.failed_step.as_str()])
                    .inc();
                tracing::warn!(
                    receipt_id = %receipt.receipt_id,
                    tenancy_id = %tenancy.tenancy_id,
                    property_id = %tenancy.property_id,
                    failed_step = failure.failed_step.as_str(),
                    error = %failure.error,
                    "Receipt generation failed, compensating"
                );
                self.compensate(receipt.receipt_id, failure.stored_reference.as_deref())
                    .await;
                Err(failure.error)
            }
        }
    }

    async fn run_pipeline(
        &self,
        receipt: &Receipt,
        tenancy: &Tenancy,
        notify: Option<GenerationMode>,
    ) -> Result<Receipt, PipelineFailure> {
        let document = self
            .bounded("render", self.renderer.render(receipt, tenancy))
            .await
            .map_err(|e| fail(SagaStep::Rendered, None, e))?;
        self.repo
            .set_generation_step(receipt.receipt_id, SagaStep::Rendered)
            .await
            .map_err(|e| fail(SagaStep::Rendered, None, e))?;

        let key = format!(
            "receipts/{}/{}.html",
            receipt.tenancy_id, receipt.receipt_id
        );
        let reference = self
            .bounded("artifact store", self.store.store(&key, document.clone()))
            .await
            .map_err(|e| fail(SagaStep::Stored, None, e))?;
        self.repo
            .set_generation_step(receipt.receipt_id, SagaStep::Stored)
            .await
            .map_err(|e| fail(SagaStep::Stored, Some(reference.clone()), e))?;

        self.repo
            .attach_artifact(receipt.receipt_id, &reference)
            .await
            .map_err(|e| fail(SagaStep::Attached, Some(reference.clone()), e))?;
        // Each cursor advance returns the updated row; `current` is always
        // the snapshot the caller may be handed.
        let mut current = self
            .repo
            .set_generation_step(receipt.receipt_id, SagaStep::Attached)
            .await
            .map_err(|e| fail(SagaStep::Attached, Some(reference.clone()), e))?;

        if let Some(mode) = notify {
            let send = async {
                match mode {
                    GenerationMode::Immediate => self
                        .notifier
                        .send_receipt(&current, tenancy, document)
                        .await
                        .map_err(AppError::from),
                    GenerationMode::ReviewAhead => self
                        .notifier
                        .send_review_request(&current, tenancy)
                        .await
                        .map_err(AppError::from),
                }
            };
            let kind = match mode {
                GenerationMode::Immediate => "receipt",
                GenerationMode::ReviewAhead => "review",
            };
            match self.bounded("notify", send).await {
                Ok(()) => {
                    NOTIFICATIONS_TOTAL.with_label_values(&[kind, "sent"]).inc();
                }
                Err(e) => {
                    NOTIFICATIONS_TOTAL
                        .with_label_values(&[kind, "failed"])
                        .inc();
                    return Err(fail(SagaStep::Notified, Some(reference), e));
                }
            }
            current = self
                .repo
                .set_generation_step(receipt.receipt_id, SagaStep::Notified)
                .await
                .map_err(|e| fail(SagaStep::Notified, Some(reference.clone()), e))?;
        }

        Ok(current)
    }

    /// Undo partial progress. Failures here are logged and swallowed; the
    /// caller still sees the original step error.
    async fn compensate(&self, receipt_id: Uuid, stored_reference: Option<&str>) {
        if let Err(e) = self.repo.delete_receipt(receipt_id).await {
            tracing::error!(
                receipt_id = %receipt_id,
                error = %e,
                "Compensation failed to delete receipt record"
            );
        }

        if let Some(reference) = stored_reference {
            let delete = self.store.delete(reference);
            if let Err(e) = self.bounded("artifact delete", delete).await {
                tracing::error!(
                    receipt_id = %receipt_id,
                    reference = %reference,
                    error = %e,
                    "Compensation failed to delete stored artifact"
                );
            }
        }
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::InternalError(anyhow::anyhow!(
                "{} call timed out after {:?}",
                what,
                self.call_timeout
            ))),
        }
    }
}

fn fail(failed_step: SagaStep, stored_reference: Option<String>, error: AppError) -> PipelineFailure {
    PipelineFailure {
        failed_step,
        stored_reference,
        error,
    }
}

fn validate_tenancy(tenancy: &Tenancy) -> Result<(), AppError> {
    if !tenancy.active {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Tenancy {} has no active occupant",
            tenancy.tenancy_id
        )));
    }
    if tenancy.tenant_email.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Tenancy {} has no tenant email",
            tenancy.tenancy_id
        )));
    }
    if tenancy.base_rent < Decimal::ZERO || tenancy.charges < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Tenancy {} has negative rent details",
            tenancy.tenancy_id
        )));
    }
    Ok(())
}
