//! Database service for receipt-service.

use crate::models::{
    CreateReceipt, ListReceiptsFilter, Receipt, ReceiptStatus, SagaStep, SweepRun, SweepTrigger,
    Tenancy,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::repository::{ReceiptRepository, SweepCounts};
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const RECEIPT_COLUMNS: &str = "receipt_id, tenancy_id, property_id, tenant_id, period_start, \
     period_end, base_rent, charges, payment_frequency, status, artifact_reference, \
     generation_step, created_utc, updated_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "receipt-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl ReceiptRepository for Database {
    #[instrument(skip(self))]
    async fn list_billable_tenancies(&self) -> Result<Vec<Tenancy>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_billable_tenancies"])
            .start_timer();

        let tenancies = sqlx::query_as::<_, Tenancy>(
            r#"
            SELECT tenancy_id, property_id, property_name, property_address, tenant_id,
                   tenant_name, tenant_email, landlord_email, base_rent, charges,
                   payment_frequency, billing_anchor, active, created_utc
            FROM tenancies
            WHERE active = TRUE AND billing_anchor IS NOT NULL
            ORDER BY tenancy_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list tenancies: {}", e)))?;

        timer.observe_duration();

        Ok(tenancies)
    }

    #[instrument(skip(self), fields(tenancy_id = %tenancy_id))]
    async fn get_tenancy(&self, tenancy_id: Uuid) -> Result<Option<Tenancy>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_tenancy"])
            .start_timer();

        let tenancy = sqlx::query_as::<_, Tenancy>(
            r#"
            SELECT tenancy_id, property_id, property_name, property_address, tenant_id,
                   tenant_name, tenant_email, landlord_email, base_rent, charges,
                   payment_frequency, billing_anchor, active, created_utc
            FROM tenancies
            WHERE tenancy_id = $1
            "#,
        )
        .bind(tenancy_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get tenancy: {}", e)))?;

        timer.observe_duration();

        Ok(tenancy)
    }

    #[instrument(skip(self, input), fields(tenancy_id = %input.tenancy_id))]
    async fn create_receipt(&self, input: &CreateReceipt) -> Result<Receipt, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_receipt"])
            .start_timer();

        let receipt_id = Uuid::new_v4();
        let receipt = sqlx::query_as::<_, Receipt>(&format!(
            r#"
            INSERT INTO receipts (receipt_id, tenancy_id, property_id, tenant_id, period_start,
                                  period_end, base_rent, charges, payment_frequency, status,
                                  generation_step)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {RECEIPT_COLUMNS}
            "#
        ))
        .bind(receipt_id)
        .bind(input.tenancy_id)
        .bind(input.property_id)
        .bind(input.tenant_id)
        .bind(input.period_start)
        .bind(input.period_end)
        .bind(input.base_rent)
        .bind(input.charges)
        .bind(input.payment_frequency.as_str())
        .bind(input.status.as_str())
        .bind(SagaStep::Created.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A receipt already exists for tenancy {} and period starting {}",
                    input.tenancy_id,
                    input.period_start
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create receipt: {}", e)),
        })?;

        timer.observe_duration();

        info!(
            receipt_id = %receipt.receipt_id,
            tenancy_id = %receipt.tenancy_id,
            period_start = %receipt.period_start,
            "Receipt created"
        );

        Ok(receipt)
    }

    #[instrument(skip(self), fields(receipt_id = %receipt_id))]
    async fn get_receipt(&self, receipt_id: Uuid) -> Result<Option<Receipt>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_receipt"])
            .start_timer();

        let receipt = sqlx::query_as::<_, Receipt>(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts WHERE receipt_id = $1"
        ))
        .bind(receipt_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get receipt: {}", e)))?;

        timer.observe_duration();

        Ok(receipt)
    }

    #[instrument(skip(self), fields(tenancy_id = %tenancy_id, period_start = %period_start))]
    async fn find_receipt_for_period(
        &self,
        tenancy_id: Uuid,
        period_start: NaiveDate,
    ) -> Result<Option<Receipt>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_receipt_for_period"])
            .start_timer();

        let receipt = sqlx::query_as::<_, Receipt>(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts WHERE tenancy_id = $1 AND period_start = $2"
        ))
        .bind(tenancy_id)
        .bind(period_start)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find receipt: {}", e)))?;

        timer.observe_duration();

        Ok(receipt)
    }

    #[instrument(skip(self, filter))]
    async fn list_receipts(&self, filter: &ListReceiptsFilter) -> Result<Vec<Receipt>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_receipts"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let receipts = sqlx::query_as::<_, Receipt>(&format!(
            r#"
            SELECT {RECEIPT_COLUMNS}
            FROM receipts
            WHERE ($1::uuid IS NULL OR tenancy_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR receipt_id > $3)
            ORDER BY receipt_id
            LIMIT $4
            "#
        ))
        .bind(filter.tenancy_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list receipts: {}", e)))?;

        timer.observe_duration();

        Ok(receipts)
    }

    #[instrument(skip(self), fields(receipt_id = %receipt_id))]
    async fn attach_artifact(
        &self,
        receipt_id: Uuid,
        reference: &str,
    ) -> Result<Receipt, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["attach_artifact"])
            .start_timer();

        let receipt = sqlx::query_as::<_, Receipt>(&format!(
            r#"
            UPDATE receipts
            SET artifact_reference = $2, updated_utc = now()
            WHERE receipt_id = $1
            RETURNING {RECEIPT_COLUMNS}
            "#
        ))
        .bind(receipt_id)
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to attach artifact: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receipt {} not found", receipt_id)))?;

        timer.observe_duration();

        Ok(receipt)
    }

    #[instrument(skip(self), fields(receipt_id = %receipt_id, step = step.as_str()))]
    async fn set_generation_step(&self, receipt_id: Uuid, step: SagaStep) -> Result<Receipt, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_generation_step"])
            .start_timer();

        let receipt = sqlx::query_as::<_, Receipt>(&format!(
            r#"
            UPDATE receipts
            SET generation_step = $2, updated_utc = now()
            WHERE receipt_id = $1
            RETURNING {RECEIPT_COLUMNS}
            "#
        ))
        .bind(receipt_id)
        .bind(step.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to record saga step: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receipt {} not found", receipt_id)))?;

        timer.observe_duration();

        Ok(receipt)
    }

    #[instrument(skip(self), fields(receipt_id = %receipt_id, from = from.as_str(), to = to.as_str()))]
    async fn transition_status(
        &self,
        receipt_id: Uuid,
        from: ReceiptStatus,
        to: ReceiptStatus,
    ) -> Result<Option<Receipt>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_status"])
            .start_timer();

        let receipt = sqlx::query_as::<_, Receipt>(&format!(
            r#"
            UPDATE receipts
            SET status = $3, updated_utc = now()
            WHERE receipt_id = $1 AND status = $2
            RETURNING {RECEIPT_COLUMNS}
            "#
        ))
        .bind(receipt_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update receipt status: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref r) = receipt {
            info!(receipt_id = %r.receipt_id, status = %r.status, "Receipt status updated");
        }

        Ok(receipt)
    }

    #[instrument(skip(self), fields(receipt_id = %receipt_id))]
    async fn delete_receipt(&self, receipt_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_receipt"])
            .start_timer();

        sqlx::query("DELETE FROM receipts WHERE receipt_id = $1")
            .bind(receipt_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete receipt: {}", e))
            })?;

        timer.observe_duration();

        info!(receipt_id = %receipt_id, "Receipt deleted");

        Ok(())
    }

    #[instrument(skip(self), fields(trigger = trigger.as_str(), reference_date = %reference_date))]
    async fn create_sweep_run(
        &self,
        trigger: SweepTrigger,
        reference_date: NaiveDate,
    ) -> Result<SweepRun, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_sweep_run"])
            .start_timer();

        let run = sqlx::query_as::<_, SweepRun>(
            r#"
            INSERT INTO sweep_runs (run_id, triggered_by, reference_date)
            VALUES ($1, $2, $3)
            RETURNING run_id, triggered_by, reference_date, tenancies_processed, receipts_generated,
                      tenancies_skipped, tenancies_failed, started_utc, completed_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(trigger.as_str())
        .bind(reference_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create sweep run: {}", e))
        })?;

        timer.observe_duration();

        Ok(run)
    }

    #[instrument(skip(self), fields(run_id = %run_id))]
    async fn complete_sweep_run(&self, run_id: Uuid, counts: SweepCounts) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["complete_sweep_run"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE sweep_runs
            SET tenancies_processed = $2, receipts_generated = $3, tenancies_skipped = $4,
                tenancies_failed = $5, completed_utc = now()
            WHERE run_id = $1
            "#,
        )
        .bind(run_id)
        .bind(counts.processed)
        .bind(counts.generated)
        .bind(counts.skipped)
        .bind(counts.failed)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to complete sweep run: {}", e))
        })?;

        timer.observe_duration();

        Ok(())
    }
}
