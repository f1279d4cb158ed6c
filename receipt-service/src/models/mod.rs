pub mod receipt;
pub mod sweep_run;
pub mod tenancy;

pub use receipt::{
    CreateReceipt, ListReceiptsFilter, Receipt, ReceiptStatus, SagaStep,
};
pub use sweep_run::{SweepRun, SweepTrigger};
pub use tenancy::{Frequency, Tenancy};
