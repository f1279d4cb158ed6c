//! Receipt document rendering.

use crate::models::{Receipt, Tenancy};
use async_trait::async_trait;
use service_core::error::AppError;

/// Renders a receipt into document bytes suitable for storage and mailing.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, receipt: &Receipt, tenancy: &Tenancy) -> Result<Vec<u8>, AppError>;
}

/// Renders a self-contained HTML receipt document.
#[derive(Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Renderer for HtmlRenderer {
    async fn render(&self, receipt: &Receipt, tenancy: &Tenancy) -> Result<Vec<u8>, AppError> {
        if tenancy.tenant_name.trim().is_empty() {
            return Err(AppError::RenderError(format!(
                "Tenancy {} has no occupant name",
                tenancy.tenancy_id
            )));
        }

        let html = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Rent receipt {id}</title>
<style>
body {{ font-family: Georgia, serif; margin: 2em; color: #222; }}
table {{ border-collapse: collapse; margin-top: 1em; }}
td, th {{ border: 1px solid #999; padding: 0.4em 0.8em; text-align: left; }}
.total {{ font-weight: bold; }}
</style>
</head>
<body>
<h1>Rent receipt</h1>
<p>Property: {property_name}<br>{property_address}</p>
<p>Issued to: {tenant_name}</p>
<p>Period: {period_start} to {period_end}</p>
<table>
<tr><th>Item</th><th>Amount</th></tr>
<tr><td>Base rent</td><td>{base_rent}</td></tr>
<tr><td>Charges</td><td>{charges}</td></tr>
<tr class="total"><td>Total</td><td>{total}</td></tr>
</table>
<p>Receipt reference: {id}</p>
</body>
</html>
"#,
            id = receipt.receipt_id,
            property_name = escape(&tenancy.property_name),
            property_address = escape(&tenancy.property_address),
            tenant_name = escape(&tenancy.tenant_name),
            period_start = receipt.period_start,
            period_end = receipt.period_end,
            base_rent = receipt.base_rent,
            charges = receipt.charges,
            total = receipt.total(),
        );

        tracing::debug!(
            receipt_id = %receipt.receipt_id,
            bytes = html.len(),
            "Receipt document rendered"
        );

        Ok(html.into_bytes())
    }
}

fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, ReceiptStatus};
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn fixture() -> (Receipt, Tenancy) {
        let tenancy = Tenancy {
            tenancy_id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            property_name: "12 Rose Court".to_string(),
            property_address: "12 Rose Court, Lyon".to_string(),
            tenant_id: Uuid::new_v4(),
            tenant_name: "Ada <Lovelace>".to_string(),
            tenant_email: "ada@example.com".to_string(),
            landlord_email: "owner@example.com".to_string(),
            base_rent: Decimal::from(1000),
            charges: Decimal::from(100),
            payment_frequency: Frequency::Monthly.as_str().to_string(),
            billing_anchor: NaiveDate::from_ymd_opt(2024, 1, 31),
            active: true,
            created_utc: Utc::now(),
        };
        let receipt = Receipt {
            receipt_id: Uuid::new_v4(),
            tenancy_id: tenancy.tenancy_id,
            property_id: tenancy.property_id,
            tenant_id: tenancy.tenant_id,
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            base_rent: Decimal::from(1000),
            charges: Decimal::from(100),
            payment_frequency: "monthly".to_string(),
            status: ReceiptStatus::Pending.as_str().to_string(),
            artifact_reference: None,
            generation_step: "created".to_string(),
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        };
        (receipt, tenancy)
    }

    #[tokio::test]
    async fn renders_amounts_and_escapes_markup() {
        let (receipt, tenancy) = fixture();
        let bytes = HtmlRenderer::new().render(&receipt, &tenancy).await.unwrap();
        let html = String::from_utf8(bytes).unwrap();
        assert!(html.contains("1000"));
        assert!(html.contains("1100"));
        assert!(html.contains("Ada &lt;Lovelace&gt;"));
        assert!(!html.contains("<Lovelace>"));
    }

    #[tokio::test]
    async fn missing_occupant_name_is_a_render_error() {
        let (receipt, mut tenancy) = fixture();
        tenancy.tenant_name = "  ".to_string();
        let err = HtmlRenderer::new().render(&receipt, &tenancy).await;
        assert!(matches!(err, Err(AppError::RenderError(_))));
    }
}
