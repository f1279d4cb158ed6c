//! Tenancy read model.
//!
//! Tenancies are owned by the property-management side of the platform; this
//! service only reads them to decide what to bill and whom to notify.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Recurrence interval of a tenancy's billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Monthly,
    Biweekly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Biweekly => "biweekly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "biweekly" => Frequency::Biweekly,
            "quarterly" => Frequency::Quarterly,
            "yearly" => Frequency::Yearly,
            _ => Frequency::Monthly,
        }
    }
}

/// One property/occupant pairing with its billing parameters.
///
/// A `billing_anchor` of `None` excludes the tenancy from all sweeps.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenancy {
    pub tenancy_id: Uuid,
    pub property_id: Uuid,
    pub property_name: String,
    pub property_address: String,
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub tenant_email: String,
    pub landlord_email: String,
    pub base_rent: Decimal,
    pub charges: Decimal,
    pub payment_frequency: String,
    pub billing_anchor: Option<NaiveDate>,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl Tenancy {
    pub fn frequency(&self) -> Frequency {
        Frequency::from_string(&self.payment_frequency)
    }
}
