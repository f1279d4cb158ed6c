//! Application startup and lifecycle management.

use crate::config::ReceiptConfig;
use crate::handlers::{health, receipts, triggers};
use crate::middleware::cron_auth_middleware;
use crate::services::{
    init_metrics, Database, HtmlRenderer, LifecycleService, LocalArtifactStore, ReceiptRepository,
    ReceiptSaga, SmtpNotifier, SweepService,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ReceiptConfig,
    pub db: Arc<Database>,
    pub repo: Arc<dyn ReceiptRepository>,
    pub saga: Arc<ReceiptSaga>,
    pub sweep: Arc<SweepService>,
    pub lifecycle: Arc<LifecycleService>,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ReceiptConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: ReceiptConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: ReceiptConfig, run_migrations: bool) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let db = Arc::new(db);
        let repo: Arc<dyn ReceiptRepository> = db.clone();

        let renderer = Arc::new(HtmlRenderer::new());
        let store = Arc::new(LocalArtifactStore::new(&config.storage.local_path).await?);
        let notifier = Arc::new(SmtpNotifier::new(config.smtp.clone())?);

        let call_timeout = Duration::from_secs(config.billing.collaborator_timeout_secs);

        let saga = Arc::new(ReceiptSaga::new(
            repo.clone(),
            renderer,
            store.clone(),
            notifier.clone(),
            call_timeout,
        ));
        let sweep = Arc::new(SweepService::new(
            repo.clone(),
            saga.clone(),
            config.billing.sweep_concurrency,
        ));
        let lifecycle = Arc::new(LifecycleService::new(
            repo.clone(),
            store,
            notifier,
            call_timeout,
        ));

        let state = AppState {
            config: config.clone(),
            db,
            repo,
            saga,
            sweep,
            lifecycle,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Receipt service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let cron_routes = Router::new()
            .route("/api/cron/receipts", post(triggers::trigger_immediate))
            .route("/api/cron/receipts/review", post(triggers::trigger_review))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                cron_auth_middleware,
            ));

        let receipt_routes = Router::new()
            .route(
                "/api/receipts",
                post(receipts::create_receipt).get(receipts::list_receipts),
            )
            .route("/api/receipts/:id", get(receipts::get_receipt))
            .route("/api/receipts/:id/status", post(receipts::update_status))
            .route("/api/receipts/:id/deliver", post(receipts::deliver));

        let router = Router::new()
            .route("/health", get(health::health_check))
            .route("/ready", get(health::readiness_check))
            .route("/metrics", get(health::metrics_handler))
            .merge(cron_routes)
            .merge(receipt_routes)
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(self.state);

        tracing::info!(
            service = "receipt-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
