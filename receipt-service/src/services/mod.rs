pub mod calendar;
pub mod database;
pub mod lifecycle;
pub mod metrics;
pub mod notifier;
pub mod renderer;
pub mod repository;
pub mod saga;
pub mod storage;
pub mod sweep;

pub use calendar::BillingPeriod;
pub use database::Database;
pub use lifecycle::LifecycleService;
pub use metrics::{get_metrics, init_metrics};
pub use notifier::{MockNotifier, Notifier, NotifierError, SmtpNotifier};
pub use renderer::{HtmlRenderer, Renderer};
pub use repository::{ReceiptRepository, SweepCounts};
pub use saga::{GenerationMode, ManualReceipt, ReceiptSaga};
pub use storage::{ArtifactStore, LocalArtifactStore};
pub use sweep::{SweepService, SweepSummary};
