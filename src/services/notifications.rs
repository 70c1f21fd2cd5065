use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, instrument};

use crate::entities::{notifier_config, stock_exception};
use crate::errors::ServiceError;
use crate::services::settings::SettingsService;
use crate::services::stock_exceptions::StockExceptionService;

const SMS_MAX_ITEMS: usize = 5;
const SMS_MAX_ORDERS_PER_ITEM: usize = 3;

/// Sends the out-of-stock report over email (SMTP) or SMS (Twilio REST).
#[derive(Clone)]
pub struct NotificationService {
    settings: SettingsService,
    exceptions: StockExceptionService,
    http: reqwest::Client,
}

impl NotificationService {
    pub fn new(settings: SettingsService, exceptions: StockExceptionService) -> Self {
        Self {
            settings,
            exceptions,
            http: reqwest::Client::new(),
        }
    }

    /// Emails the unresolved-shortage report. Recipients default to the
    /// configured notification list; the body defaults to the full report.
    #[instrument(skip(self, recipients, subject, body))]
    pub async fn send_email(
        &self,
        recipients: Option<Vec<String>>,
        subject: Option<String>,
        body: Option<String>,
    ) -> Result<String, ServiceError> {
        let config = self.settings.notifier_config().await?;
        if !config.email_enabled {
            return Err(ServiceError::Validation(
                "email notifications are disabled in settings".to_string(),
            ));
        }

        let recipients = recipients
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| config.email_recipient_list());
        if recipients.is_empty() {
            return Err(ServiceError::Validation(
                "no email recipients configured".to_string(),
            ));
        }

        let body = match body {
            Some(body) => body,
            None => {
                let unresolved = self.exceptions.unresolved().await?;
                build_email_body(&unresolved)
            }
        };
        let subject = subject.unwrap_or_else(|| "Out-of-Stock Report".to_string());

        let mailer = build_mailer(&config)?;
        let from: lettre::message::Mailbox = config.from_email.parse().map_err(|_| {
            ServiceError::Validation(format!("invalid from address {}", config.from_email))
        })?;

        for recipient in &recipients {
            let to: lettre::message::Mailbox = recipient.parse().map_err(|_| {
                ServiceError::Validation(format!("invalid recipient address {recipient}"))
            })?;
            let message = Message::builder()
                .from(from.clone())
                .to(to)
                .subject(&subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())
                .map_err(|e| ServiceError::Internal(format!("failed to build email: {e}")))?;

            mailer
                .send(message)
                .await
                .map_err(|e| ServiceError::Internal(format!("smtp send failed: {e}")))?;
        }

        info!(count = recipients.len(), "out-of-stock email sent");
        Ok(format!("Email sent to {} recipient(s)", recipients.len()))
    }

    /// Sends the shortened report over SMS via the Twilio REST API.
    #[instrument(skip(self, recipients, body))]
    pub async fn send_sms(
        &self,
        recipients: Option<Vec<String>>,
        body: Option<String>,
    ) -> Result<String, ServiceError> {
        let config = self.settings.notifier_config().await?;
        if !config.sms_enabled {
            return Err(ServiceError::Validation(
                "sms notifications are disabled in settings".to_string(),
            ));
        }

        let recipients = recipients
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| config.sms_recipient_list());
        if recipients.is_empty() {
            return Err(ServiceError::Validation(
                "no sms recipients configured".to_string(),
            ));
        }

        let body = match body {
            Some(body) => body,
            None => {
                let unresolved = self.exceptions.unresolved().await?;
                build_sms_body(&unresolved)
            }
        };

        let mut sent = 0usize;
        let mut failed: Vec<String> = Vec::new();
        for recipient in &recipients {
            match self.send_twilio_message(&config, recipient, &body).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::error!(recipient = %recipient, error = %e, "sms send failed");
                    failed.push(recipient.clone());
                }
            }
        }

        if sent == 0 {
            return Err(ServiceError::Internal(format!(
                "failed to send sms to all {} recipient(s)",
                recipients.len()
            )));
        }

        let mut message = format!("SMS sent to {sent} recipient(s)");
        if !failed.is_empty() {
            message.push_str(&format!(", {} failed", failed.len()));
        }
        info!(sent, failed = failed.len(), "out-of-stock sms sent");
        Ok(message)
    }

    /// Sends a one-line test email to the first configured recipient.
    pub async fn test_email(&self) -> Result<String, ServiceError> {
        let config = self.settings.notifier_config().await?;
        if !config.email_enabled {
            return Err(ServiceError::Validation(
                "email notifications are disabled".to_string(),
            ));
        }
        let first = config
            .email_recipient_list()
            .into_iter()
            .next()
            .ok_or_else(|| {
                ServiceError::Validation("no email recipients configured".to_string())
            })?;

        self.send_email(
            Some(vec![first]),
            Some("Test Email - Order Picking System".to_string()),
            Some(
                "This is a test email from the order picking system. \
                 Your email configuration is working correctly."
                    .to_string(),
            ),
        )
        .await?;
        Ok("Test email sent successfully".to_string())
    }

    /// Sends a one-line test SMS to the first configured recipient.
    pub async fn test_sms(&self) -> Result<String, ServiceError> {
        let config = self.settings.notifier_config().await?;
        if !config.sms_enabled {
            return Err(ServiceError::Validation(
                "sms notifications are disabled".to_string(),
            ));
        }
        let first = config
            .sms_recipient_list()
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Validation("no sms recipients configured".to_string()))?;

        self.send_sms(
            Some(vec![first]),
            Some(
                "Test message from the order picking system. \
                 Your SMS configuration is working correctly."
                    .to_string(),
            ),
        )
        .await?;
        Ok("Test SMS sent successfully".to_string())
    }

    async fn send_twilio_message(
        &self,
        config: &notifier_config::Model,
        to: &str,
        body: &str,
    ) -> Result<(), ServiceError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            config.twilio_account_sid
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&config.twilio_account_sid, Some(&config.twilio_auth_token))
            .form(&[
                ("To", to),
                ("From", config.twilio_from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::Internal(format!("twilio request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::Internal(format!(
                "twilio returned {status}: {detail}"
            )));
        }
        Ok(())
    }
}

fn build_mailer(
    config: &notifier_config::Model,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, ServiceError> {
    if config.smtp_host.is_empty() {
        return Err(ServiceError::Validation(
            "smtp host is not configured".to_string(),
        ));
    }

    let builder = if config.smtp_use_ssl {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| ServiceError::Internal(format!("smtp transport error: {e}")))?
    } else if config.smtp_use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| ServiceError::Internal(format!("smtp transport error: {e}")))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    };

    let mut builder = builder.port(config.smtp_port as u16);
    if !config.smtp_username.is_empty() {
        builder = builder.credentials(Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        ));
    }
    Ok(builder.build())
}

/// Plain-text report body for email.
pub fn build_email_body(exceptions: &[stock_exception::Model]) -> String {
    if exceptions.is_empty() {
        return "No unresolved stock exceptions at this time.".to_string();
    }

    let mut body = String::from("Out-of-Stock Report\n");
    body.push_str(&"=".repeat(50));
    body.push_str("\n\n");

    for exc in exceptions {
        body.push_str(&format!("SKU: {}\n", exc.sku));
        body.push_str(&format!("Product: {}\n", exc.product_title));
        body.push_str(&format!("Category: {}\n", exc.category));
        body.push_str(&format!("Quantity Short: {}\n", exc.qty_short));
        body.push_str(&format!(
            "Affected Orders: {}\n",
            exc.order_number_list().join(", ")
        ));
        body.push_str(&format!(
            "Reported: {}\n",
            exc.timestamp.format("%Y-%m-%d %H:%M")
        ));
        if !exc.notes.is_empty() {
            body.push_str(&format!("Notes: {}\n", exc.notes));
        }
        body.push_str(&"-".repeat(50));
        body.push('\n');
    }

    body.push_str(&format!("\nTotal Exceptions: {}\n", exceptions.len()));
    body
}

/// Shortened report body for SMS.
pub fn build_sms_body(exceptions: &[stock_exception::Model]) -> String {
    if exceptions.is_empty() {
        return "No unresolved stock exceptions.".to_string();
    }

    let mut body = String::from("Out-of-Stock Alert:\n");
    for exc in exceptions.iter().take(SMS_MAX_ITEMS) {
        let numbers = exc.order_number_list();
        let mut order_list = numbers
            .iter()
            .take(SMS_MAX_ORDERS_PER_ITEM)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if numbers.len() > SMS_MAX_ORDERS_PER_ITEM {
            order_list.push_str("...");
        }
        body.push_str(&format!(
            "- {}: {} short (Orders: {})\n",
            exc.sku, exc.qty_short, order_list
        ));
    }
    if exceptions.len() > SMS_MAX_ITEMS {
        body.push_str(&format!(
            "...and {} more items\n",
            exceptions.len() - SMS_MAX_ITEMS
        ));
    }
    body
}

/// Renders exceptions as the CSV the operators download.
pub fn export_csv(exceptions: &[stock_exception::Model]) -> String {
    let mut out = String::from(
        "SKU,Product Title,Category,Quantity Short,Order Numbers,Reported By,Timestamp,Resolved,Notes\n",
    );

    for exc in exceptions {
        let row = [
            exc.sku.clone(),
            exc.product_title.clone(),
            exc.category.clone(),
            exc.qty_short.to_string(),
            exc.order_number_list().join(", "),
            exc.reported_by.clone(),
            exc.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            if exc.resolved { "Yes" } else { "No" }.to_string(),
            exc.notes.clone(),
        ];
        let escaped: Vec<String> = row.iter().map(|field| csv_escape(field)).collect();
        out.push_str(&escaped.join(","));
        out.push('\n');
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
