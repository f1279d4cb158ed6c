//! Receipt model and lifecycle status table.

use super::tenancy::Frequency;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Receipt lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Draft,
    Pending,
    Paid,
    Late,
    Unpaid,
    Cancelled,
}

impl ReceiptStatus {
    pub const ALL: [ReceiptStatus; 6] = [
        ReceiptStatus::Draft,
        ReceiptStatus::Pending,
        ReceiptStatus::Paid,
        ReceiptStatus::Late,
        ReceiptStatus::Unpaid,
        ReceiptStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Draft => "draft",
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::Paid => "paid",
            ReceiptStatus::Late => "late",
            ReceiptStatus::Unpaid => "unpaid",
            ReceiptStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "pending" => ReceiptStatus::Pending,
            "paid" => ReceiptStatus::Paid,
            "late" => ReceiptStatus::Late,
            "unpaid" => ReceiptStatus::Unpaid,
            "cancelled" => ReceiptStatus::Cancelled,
            _ => ReceiptStatus::Draft,
        }
    }

    /// Whether the status accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReceiptStatus::Paid | ReceiptStatus::Cancelled)
    }

    /// The lifecycle transition table. Anything not listed here is invalid.
    pub fn can_transition_to(&self, next: ReceiptStatus) -> bool {
        use ReceiptStatus::*;
        match self {
            Draft => matches!(next, Pending | Cancelled),
            Pending => matches!(next, Paid | Late | Unpaid | Cancelled),
            Late => matches!(next, Paid | Unpaid | Cancelled),
            Unpaid => matches!(next, Paid | Late | Cancelled),
            Paid | Cancelled => false,
        }
    }
}

/// Named steps of the generation saga, persisted on the row as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStep {
    Created,
    Rendered,
    Stored,
    Attached,
    Notified,
}

impl SagaStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::Created => "created",
            SagaStep::Rendered => "rendered",
            SagaStep::Stored => "stored",
            SagaStep::Attached => "attached",
            SagaStep::Notified => "notified",
        }
    }
}

/// One billing period for one tenancy.
///
/// Amounts and period are snapshotted at creation and never updated;
/// `artifact_reference` is set only after the artifact store confirmed the
/// write. Rows are deleted only by saga compensation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Receipt {
    pub receipt_id: Uuid,
    pub tenancy_id: Uuid,
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_rent: Decimal,
    pub charges: Decimal,
    pub payment_frequency: String,
    pub status: String,
    pub artifact_reference: Option<String>,
    pub generation_step: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Receipt {
    pub fn status_enum(&self) -> ReceiptStatus {
        ReceiptStatus::from_string(&self.status)
    }

    pub fn total(&self) -> Decimal {
        self.base_rent + self.charges
    }
}

/// Input for creating a receipt row.
#[derive(Debug, Clone)]
pub struct CreateReceipt {
    pub tenancy_id: Uuid,
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_rent: Decimal,
    pub charges: Decimal,
    pub payment_frequency: Frequency,
    pub status: ReceiptStatus,
}

/// Filter parameters for listing receipts.
#[derive(Debug, Clone, Default)]
pub struct ListReceiptsFilter {
    pub tenancy_id: Option<Uuid>,
    pub status: Option<ReceiptStatus>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(from: ReceiptStatus, to: ReceiptStatus) -> bool {
        use ReceiptStatus::*;
        matches!(
            (from, to),
            (Draft, Pending)
                | (Draft, Cancelled)
                | (Pending, Paid)
                | (Pending, Late)
                | (Pending, Unpaid)
                | (Pending, Cancelled)
                | (Late, Paid)
                | (Late, Unpaid)
                | (Late, Cancelled)
                | (Unpaid, Paid)
                | (Unpaid, Late)
                | (Unpaid, Cancelled)
        )
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        for from in ReceiptStatus::ALL {
            for to in ReceiptStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed(from, to),
                    "transition {:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn paid_and_cancelled_are_terminal() {
        assert!(ReceiptStatus::Paid.is_terminal());
        assert!(ReceiptStatus::Cancelled.is_terminal());
        for to in ReceiptStatus::ALL {
            assert!(!ReceiptStatus::Paid.can_transition_to(to));
            assert!(!ReceiptStatus::Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in ReceiptStatus::ALL {
            assert_eq!(ReceiptStatus::from_string(status.as_str()), status);
        }
    }
}
