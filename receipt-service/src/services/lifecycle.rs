//! Receipt lifecycle: status transitions and delivery.

use crate::models::{Receipt, ReceiptStatus};
use crate::services::metrics::NOTIFICATIONS_TOTAL;
use crate::services::notifier::Notifier;
use crate::services::repository::ReceiptRepository;
use crate::services::storage::ArtifactStore;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

pub struct LifecycleService {
    repo: Arc<dyn ReceiptRepository>,
    store: Arc<dyn ArtifactStore>,
    notifier: Arc<dyn Notifier>,
    call_timeout: Duration,
}

impl LifecycleService {
    pub fn new(
        repo: Arc<dyn ReceiptRepository>,
        store: Arc<dyn ArtifactStore>,
        notifier: Arc<dyn Notifier>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            store,
            notifier,
            call_timeout,
        }
    }

    /// Apply a status transition if the lifecycle table allows it.
    #[instrument(skip(self), fields(receipt_id = %receipt_id, new_status = new_status.as_str()))]
    pub async fn update_status(
        &self,
        receipt_id: Uuid,
        new_status: ReceiptStatus,
    ) -> Result<Receipt, AppError> {
        let receipt = self.fetch(receipt_id).await?;
        let current = receipt.status_enum();

        if !current.can_transition_to(new_status) {
            return Err(AppError::InvalidTransition {
                from: current.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        self.apply(receipt_id, current, new_status).await
    }

    /// Re-send the stored receipt document to the tenant (landlord copied)
    /// and mark the receipt paid.
    #[instrument(skip(self), fields(receipt_id = %receipt_id))]
    pub async fn deliver(&self, receipt_id: Uuid) -> Result<Receipt, AppError> {
        let receipt = self.fetch(receipt_id).await?;
        let current = receipt.status_enum();

        // Delivery is only offered while the receipt is still collectible.
        if !current.can_transition_to(ReceiptStatus::Paid) {
            return Err(AppError::InvalidTransition {
                from: current.as_str().to_string(),
                to: ReceiptStatus::Paid.as_str().to_string(),
            });
        }

        let reference = receipt
            .artifact_reference
            .clone()
            .ok_or_else(|| AppError::ArtifactMissing(receipt_id.to_string()))?;

        let tenancy = self
            .repo
            .get_tenancy(receipt.tenancy_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Tenancy {} not found", receipt.tenancy_id))
            })?;

        let document = self
            .bounded("artifact download", self.store.download(&reference))
            .await?;

        let send = async {
            self.notifier
                .send_receipt(&receipt, &tenancy, document)
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

        self.apply(receipt_id, current, ReceiptStatus::Paid).await
    }

    async fn fetch(&self, receipt_id: Uuid) -> Result<Receipt, AppError> {
        self.repo.get_receipt(receipt_id).await?.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Receipt {} not found", receipt_id))
        })
    }

    async fn apply(
        &self,
        receipt_id: Uuid,
        from: ReceiptStatus,
        to: ReceiptStatus,
    ) -> Result<Receipt, AppError> {
        match self.repo.transition_status(receipt_id, from, to).await? {
            Some(updated) => Ok(updated),
            // The row left `from` between our read and the update.
            None => Err(AppError::Conflict(anyhow::anyhow!(
                "Receipt {} was modified concurrently",
                receipt_id
            ))),
        }
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, AppError>
    where
        F: std::future::Future<Output = Result<T, AppError>>,
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
