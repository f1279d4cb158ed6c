//! In-memory collaborators for driving the saga, sweep, and lifecycle
//! services without Postgres or SMTP.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use receipt_service::models::{
    CreateReceipt, Frequency, ListReceiptsFilter, Receipt, ReceiptStatus, SagaStep, SweepRun,
    SweepTrigger, Tenancy,
};
use receipt_service::services::{
    ArtifactStore, HtmlRenderer, LifecycleService, Notifier, NotifierError, ReceiptRepository,
    ReceiptSaga, Renderer, SweepCounts, SweepService,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct RepoState {
    tenancies: Vec<Tenancy>,
    receipts: HashMap<Uuid, Receipt>,
    runs: HashMap<Uuid, SweepRun>,
}

/// Hash-map-backed repository enforcing the same (tenancy, period) uniqueness
/// the database index provides.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<RepoState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenancies(tenancies: Vec<Tenancy>) -> Self {
        let repo = Self::new();
        repo.state.lock().unwrap().tenancies = tenancies;
        repo
    }

    pub fn receipt_count(&self) -> usize {
        self.state.lock().unwrap().receipts.len()
    }

    pub fn receipts(&self) -> Vec<Receipt> {
        self.state.lock().unwrap().receipts.values().cloned().collect()
    }

    pub fn sweep_runs(&self) -> Vec<SweepRun> {
        self.state.lock().unwrap().runs.values().cloned().collect()
    }
}

#[async_trait]
impl ReceiptRepository for InMemoryRepository {
    async fn list_billable_tenancies(&self) -> Result<Vec<Tenancy>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tenancies
            .iter()
            .filter(|t| t.active && t.billing_anchor.is_some())
            .cloned()
            .collect())
    }

    async fn get_tenancy(&self, tenancy_id: Uuid) -> Result<Option<Tenancy>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tenancies
            .iter()
            .find(|t| t.tenancy_id == tenancy_id)
            .cloned())
    }

    async fn create_receipt(&self, input: &CreateReceipt) -> Result<Receipt, AppError> {
        let mut state = self.state.lock().unwrap();
        if state
            .receipts
            .values()
            .any(|r| r.tenancy_id == input.tenancy_id && r.period_start == input.period_start)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "A receipt already exists for tenancy {} and period starting {}",
                input.tenancy_id,
                input.period_start
            )));
        }
        let now = Utc::now();
        let receipt = Receipt {
            receipt_id: Uuid::new_v4(),
            tenancy_id: input.tenancy_id,
            property_id: input.property_id,
            tenant_id: input.tenant_id,
            period_start: input.period_start,
            period_end: input.period_end,
            base_rent: input.base_rent,
            charges: input.charges,
            payment_frequency: input.payment_frequency.as_str().to_string(),
            status: input.status.as_str().to_string(),
            artifact_reference: None,
            generation_step: SagaStep::Created.as_str().to_string(),
            created_utc: now,
            updated_utc: now,
        };
        state.receipts.insert(receipt.receipt_id, receipt.clone());
        Ok(receipt)
    }

    async fn get_receipt(&self, receipt_id: Uuid) -> Result<Option<Receipt>, AppError> {
        Ok(self.state.lock().unwrap().receipts.get(&receipt_id).cloned())
    }

    async fn find_receipt_for_period(
        &self,
        tenancy_id: Uuid,
        period_start: NaiveDate,
    ) -> Result<Option<Receipt>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .receipts
            .values()
            .find(|r| r.tenancy_id == tenancy_id && r.period_start == period_start)
            .cloned())
    }

    async fn list_receipts(&self, filter: &ListReceiptsFilter) -> Result<Vec<Receipt>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .receipts
            .values()
            .filter(|r| filter.tenancy_id.map_or(true, |t| r.tenancy_id == t))
            .filter(|r| filter.status.map_or(true, |s| r.status == s.as_str()))
            .cloned()
            .collect())
    }

    async fn attach_artifact(
        &self,
        receipt_id: Uuid,
        reference: &str,
    ) -> Result<Receipt, AppError> {
        let mut state = self.state.lock().unwrap();
        let receipt = state.receipts.get_mut(&receipt_id).ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Receipt {} not found", receipt_id))
        })?;
        receipt.artifact_reference = Some(reference.to_string());
        receipt.updated_utc = Utc::now();
        Ok(receipt.clone())
    }

    async fn set_generation_step(&self, receipt_id: Uuid, step: SagaStep) -> Result<Receipt, AppError> {
        let mut state = self.state.lock().unwrap();
        let receipt = state.receipts.get_mut(&receipt_id).ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Receipt {} not found", receipt_id))
        })?;
        receipt.generation_step = step.as_str().to_string();
        receipt.updated_utc = Utc::now();
        Ok(receipt.clone())
    }

    async fn transition_status(
        &self,
        receipt_id: Uuid,
        from: ReceiptStatus,
        to: ReceiptStatus,
    ) -> Result<Option<Receipt>, AppError> {
        let mut state = self.state.lock().unwrap();
        match state.receipts.get_mut(&receipt_id) {
            Some(receipt) if receipt.status == from.as_str() => {
                receipt.status = to.as_str().to_string();
                receipt.updated_utc = Utc::now();
                Ok(Some(receipt.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_receipt(&self, receipt_id: Uuid) -> Result<(), AppError> {
        self.state.lock().unwrap().receipts.remove(&receipt_id);
        Ok(())
    }

    async fn create_sweep_run(
        &self,
        trigger: SweepTrigger,
        reference_date: NaiveDate,
    ) -> Result<SweepRun, AppError> {
        let run = SweepRun {
            run_id: Uuid::new_v4(),
            triggered_by: trigger.as_str().to_string(),
            reference_date,
            tenancies_processed: 0,
            receipts_generated: 0,
            tenancies_skipped: 0,
            tenancies_failed: 0,
            started_utc: Utc::now(),
            completed_utc: None,
        };
        self.state
            .lock()
            .unwrap()
            .runs
            .insert(run.run_id, run.clone());
        Ok(run)
    }

    async fn complete_sweep_run(&self, run_id: Uuid, counts: SweepCounts) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(run) = state.runs.get_mut(&run_id) {
            run.tenancies_processed = counts.processed;
            run.receipts_generated = counts.generated;
            run.tenancies_skipped = counts.skipped;
            run.tenancies_failed = counts.failed;
            run.completed_utc = Some(Utc::now());
        }
        Ok(())
    }
}

/// Artifact store that remembers every store and delete call.
#[derive(Default)]
pub struct RecordingStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    stored: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    fail_store: AtomicBool,
    fail_delete: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_store() -> Self {
        let store = Self::default();
        store.fail_store.store(true, Ordering::SeqCst);
        store
    }

    pub fn failing_delete() -> Self {
        let store = Self::default();
        store.fail_delete.store(true, Ordering::SeqCst);
        store
    }

    pub fn stored_references(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }

    pub fn deleted_references(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    async fn store(&self, key: &str, data: Vec<u8>) -> Result<String, AppError> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "artifact store unavailable"
            )));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data);
        self.stored.lock().unwrap().push(key.to_string());
        Ok(key.to_string())
    }

    async fn download(&self, reference: &str) -> Result<Vec<u8>, AppError> {
        self.objects
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Artifact {} missing", reference)))
    }

    async fn delete(&self, reference: &str) -> Result<(), AppError> {
        self.deleted.lock().unwrap().push(reference.to_string());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "artifact store refused the delete"
            )));
        }
        self.objects.lock().unwrap().remove(reference);
        Ok(())
    }
}

/// Notifier that records recipients per message kind.
#[derive(Default)]
pub struct RecordingNotifier {
    receipts_sent: Mutex<Vec<Uuid>>,
    reviews_sent: Mutex<Vec<Uuid>>,
    fail: AtomicBool,
    hang: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    /// Never completes a send; pairs with a paused-clock test to drive the
    /// per-call timeout.
    pub fn hanging() -> Self {
        let notifier = Self::default();
        notifier.hang.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn receipts_sent(&self) -> Vec<Uuid> {
        self.receipts_sent.lock().unwrap().clone()
    }

    pub fn reviews_sent(&self) -> Vec<Uuid> {
        self.reviews_sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_receipt(
        &self,
        receipt: &Receipt,
        _tenancy: &Tenancy,
        _document: Vec<u8>,
    ) -> Result<(), NotifierError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifierError::SendFailed("smtp unreachable".to_string()));
        }
        self.receipts_sent.lock().unwrap().push(receipt.receipt_id);
        Ok(())
    }

    async fn send_review_request(
        &self,
        receipt: &Receipt,
        _tenancy: &Tenancy,
    ) -> Result<(), NotifierError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifierError::SendFailed("smtp unreachable".to_string()));
        }
        self.reviews_sent.lock().unwrap().push(receipt.receipt_id);
        Ok(())
    }
}

/// A tenancy billing 1000 + 100 monthly, anchored on 2024-01-31.
pub fn tenancy_fixture() -> Tenancy {
    Tenancy {
        tenancy_id: Uuid::new_v4(),
        property_id: Uuid::new_v4(),
        property_name: "4 Harbour Lane".to_string(),
        property_address: "4 Harbour Lane, Porto".to_string(),
        tenant_id: Uuid::new_v4(),
        tenant_name: "Grace Hopper".to_string(),
        tenant_email: "grace@example.com".to_string(),
        landlord_email: "landlord@example.com".to_string(),
        base_rent: Decimal::from(1000),
        charges: Decimal::from(100),
        payment_frequency: Frequency::Monthly.as_str().to_string(),
        billing_anchor: NaiveDate::from_ymd_opt(2024, 1, 31),
        active: true,
        created_utc: Utc::now(),
    }
}

pub struct Harness {
    pub repo: Arc<InMemoryRepository>,
    pub store: Arc<RecordingStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub saga: Arc<ReceiptSaga>,
    pub sweep: SweepService,
    pub lifecycle: LifecycleService,
}

/// Wire the services together over in-memory collaborators.
pub fn harness(
    tenancies: Vec<Tenancy>,
    store: RecordingStore,
    notifier: RecordingNotifier,
) -> Harness {
    let repo = Arc::new(InMemoryRepository::with_tenancies(tenancies));
    let store = Arc::new(store);
    let notifier = Arc::new(notifier);
    let renderer: Arc<dyn Renderer> = Arc::new(HtmlRenderer::new());
    let timeout = Duration::from_secs(5);

    let saga = Arc::new(ReceiptSaga::new(
        repo.clone(),
        renderer,
        store.clone(),
        notifier.clone(),
        timeout,
    ));
    let sweep = SweepService::new(repo.clone(), saga.clone(), 4);
    let lifecycle = LifecycleService::new(repo.clone(), store.clone(), notifier.clone(), timeout);

    Harness {
        repo,
        store,
        notifier,
        saga,
        sweep,
        lifecycle,
    }
}
