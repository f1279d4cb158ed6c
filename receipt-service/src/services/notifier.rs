//! Receipt notification delivery.

use crate::config::SmtpConfig;
use crate::models::{Receipt, Tenancy};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Notifier not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Send error: {0}")]
    SendFailed(String),
}

impl From<NotifierError> for AppError {
    fn from(err: NotifierError) -> Self {
        AppError::NotificationError(err.to_string())
    }
}

/// Sends receipt mail to the people on a tenancy.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the receipt document to the tenant, landlord copied.
    async fn send_receipt(
        &self,
        receipt: &Receipt,
        tenancy: &Tenancy,
        document: Vec<u8>,
    ) -> Result<(), NotifierError>;

    /// Ask the landlord to review an upcoming receipt before dispatch.
    async fn send_review_request(
        &self,
        receipt: &Receipt,
        tenancy: &Tenancy,
    ) -> Result<(), NotifierError>;
}

pub struct SmtpNotifier {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self, NotifierError> {
        if !config.enabled {
            return Ok(Self {
                config,
                transport: None,
            });
        }

        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| {
                NotifierError::Configuration(format!("Failed to create SMTP relay: {}", e))
            })?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            config,
            transport: Some(transport),
        })
    }

    fn from_mailbox(&self) -> Result<Mailbox, NotifierError> {
        format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| NotifierError::Configuration(format!("Invalid from address: {}", e)))
    }

    fn mailbox(address: &str) -> Result<Mailbox, NotifierError> {
        address
            .parse()
            .map_err(|e| NotifierError::InvalidRecipient(format!("{}: {}", address, e)))
    }

    async fn dispatch(&self, message: Message) -> Result<(), NotifierError> {
        let transport = self.transport.as_ref().ok_or_else(|| {
            NotifierError::NotEnabled("SMTP notifier is not enabled".to_string())
        })?;

        transport
            .send(message)
            .await
            .map_err(|e| NotifierError::SendFailed(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_receipt(
        &self,
        receipt: &Receipt,
        tenancy: &Tenancy,
        document: Vec<u8>,
    ) -> Result<(), NotifierError> {
        if !self.config.enabled {
            return Err(NotifierError::NotEnabled(
                "SMTP notifier is not enabled".to_string(),
            ));
        }

        let body = format!(
            "Hello {},\n\nPlease find attached your rent receipt for {} \
             covering {} to {}.\n\nTotal: {}\n",
            tenancy.tenant_name,
            tenancy.property_name,
            receipt.period_start,
            receipt.period_end,
            receipt.total(),
        );

        let attachment = Attachment::new(format!("receipt-{}.html", receipt.period_start))
            .body(document, ContentType::TEXT_HTML);

        let message = Message::builder()
            .from(self.from_mailbox()?)
            .to(Self::mailbox(&tenancy.tenant_email)?)
            .cc(Self::mailbox(&tenancy.landlord_email)?)
            .subject(format!(
                "Rent receipt for {} ({} to {})",
                tenancy.property_name, receipt.period_start, receipt.period_end
            ))
            .multipart(
                MultiPart::mixed()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body),
                    )
                    .singlepart(attachment),
            )
            .map_err(|e| NotifierError::SendFailed(format!("Failed to build message: {}", e)))?;

        self.dispatch(message).await?;

        tracing::info!(
            receipt_id = %receipt.receipt_id,
            to = %tenancy.tenant_email,
            cc = %tenancy.landlord_email,
            "Receipt emailed to tenant"
        );

        Ok(())
    }

    async fn send_review_request(
        &self,
        receipt: &Receipt,
        tenancy: &Tenancy,
    ) -> Result<(), NotifierError> {
        if !self.config.enabled {
            return Err(NotifierError::NotEnabled(
                "SMTP notifier is not enabled".to_string(),
            ));
        }

        let body = format!(
            "A rent receipt for {} covering {} to {} (total {}) has been prepared \
             and is awaiting your review before it is sent to {}.\n",
            tenancy.property_name,
            receipt.period_start,
            receipt.period_end,
            receipt.total(),
            tenancy.tenant_name,
        );

        let message = Message::builder()
            .from(self.from_mailbox()?)
            .to(Self::mailbox(&tenancy.landlord_email)?)
            .subject(format!(
                "Review upcoming rent receipt for {}",
                tenancy.property_name
            ))
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifierError::SendFailed(format!("Failed to build message: {}", e)))?;

        self.dispatch(message).await?;

        tracing::info!(
            receipt_id = %receipt.receipt_id,
            to = %tenancy.landlord_email,
            "Review request emailed to landlord"
        );

        Ok(())
    }
}

/// Mock notifier for tests and local development.
pub struct MockNotifier {
    fail: bool,
    sent: std::sync::atomic::AtomicU64,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            fail: false,
            sent: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_receipt(
        &self,
        _receipt: &Receipt,
        tenancy: &Tenancy,
        _document: Vec<u8>,
    ) -> Result<(), NotifierError> {
        if self.fail {
            return Err(NotifierError::SendFailed("mock failure".to_string()));
        }
        self.sent
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tracing::info!(to = %tenancy.tenant_email, "[MOCK] Receipt would be emailed");
        Ok(())
    }

    async fn send_review_request(
        &self,
        _receipt: &Receipt,
        tenancy: &Tenancy,
    ) -> Result<(), NotifierError> {
        if self.fail {
            return Err(NotifierError::SendFailed("mock failure".to_string()));
        }
        self.sent
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tracing::info!(to = %tenancy.landlord_email, "[MOCK] Review request would be emailed");
        Ok(())
    }
}
