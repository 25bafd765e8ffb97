//! Slack incoming-webhook notifications.
//!
//! The webhook saved through the integrations endpoint wins over
//! `SLACK_WEBHOOK_URL`; with neither configured, messages are skipped.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::domain::appointments::AppointmentStatus;

/// `app_settings` key holding the saved webhook
pub const SLACK_WEBHOOK_KEY: &str = "slack_webhook_url";

const WEBHOOK_PREFIX: &str = "https://hooks.slack.com/";

/// Accept only Slack-hosted incoming webhooks.
pub fn validate_webhook_url(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if !raw.starts_with(WEBHOOK_PREFIX) {
        return Err("Invalid Slack webhook URL".to_string());
    }
    let parsed = url::Url::parse(raw).map_err(|_| "Invalid Slack webhook URL".to_string())?;
    if parsed.path().len() <= 1 {
        return Err("Invalid Slack webhook URL".to_string());
    }
    Ok(parsed.to_string())
}

/// Keep the start of a webhook for logs; the path is a secret.
pub fn redact_webhook(url: &str) -> String {
    let visible: String = url.chars().take(WEBHOOK_PREFIX.len() + 8).collect();
    format!("{}...", visible)
}

/// Booking facts shown in the channel
#[derive(Debug, Clone)]
pub struct BookingNotice<'a> {
    pub client_name: &'a str,
    pub client_email: &'a str,
    pub client_phone: Option<&'a str>,
    pub service_name: &'a str,
    pub professional_name: &'a str,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub price: Decimal,
    pub notes: Option<&'a str>,
}

fn field(label: &str, value: impl std::fmt::Display) -> Value {
    json!({ "type": "mrkdwn", "text": format!("*{}:*\n{}", label, value) })
}

fn context_block(text: &str) -> Value {
    json!({ "type": "context", "elements": [{ "type": "mrkdwn", "text": text }] })
}

pub fn new_booking_message(notice: &BookingNotice<'_>, business_name: &str) -> Value {
    let when = format!(
        "{} at {}",
        notice.date.format("%a %b %-d, %Y"),
        notice.start_time.format("%-I:%M %p")
    );

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": "New Appointment Booking" }
        }),
        json!({
            "type": "section",
            "fields": [
                field("Client", notice.client_name),
                field("Service", notice.service_name),
                field("Date & Time", &when),
                field("Duration", format!("{} minutes", notice.duration_minutes)),
                field("Price", format!("${:.2}", notice.price)),
                field("Email", notice.client_email),
                field("Therapist", notice.professional_name),
            ]
        }),
    ];
    if let Some(phone) = notice.client_phone.filter(|p| !p.trim().is_empty()) {
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Phone:* {}", phone) }
        }));
    }
    if let Some(notes) = notice.notes.filter(|n| !n.trim().is_empty()) {
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Notes:* {}", notes) }
        }));
    }
    blocks.push(json!({ "type": "divider" }));
    blocks.push(context_block(business_name));

    json!({
        "text": format!("New appointment booking: {} - {}", notice.client_name, notice.service_name),
        "blocks": blocks,
    })
}

pub fn status_change_message(
    notice: &BookingNotice<'_>,
    from: AppointmentStatus,
    to: AppointmentStatus,
    business_name: &str,
) -> Value {
    let text = format!(
        "Appointment {}: {} - {} on {} at {}",
        to,
        notice.client_name,
        notice.service_name,
        notice.date.format("%a %b %-d, %Y"),
        notice.start_time.format("%-I:%M %p")
    );
    json!({
        "text": text,
        "blocks": [
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("*Status:* {} → {}\n{}", from, to, text) }
            },
            context_block(business_name),
        ]
    })
}

pub fn test_message(business_name: &str) -> Value {
    json!({
        "text": format!("Test notification from {}", business_name),
        "blocks": [
            {
                "type": "header",
                "text": { "type": "plain_text", "text": "Test Notification" }
            },
            {
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": "This is a test message to verify your Slack integration is working correctly!"
                }
            },
            context_block(&format!("{} - Admin Dashboard", business_name)),
        ]
    })
}

/// Posts block-kit messages to the configured webhook
#[derive(Clone)]
pub struct SlackNotifier {
    client: Client,
    default_webhook: Option<String>,
}

impl SlackNotifier {
    pub fn new(client: Client, default_webhook: Option<String>) -> Self {
        Self {
            client,
            default_webhook,
        }
    }

    /// Saved webhook first, then the environment default.
    pub async fn resolve_webhook(&self, db: &PgPool) -> Option<String> {
        let saved: Option<Value> =
            sqlx::query_scalar("SELECT value FROM app_settings WHERE key = $1")
                .bind(SLACK_WEBHOOK_KEY)
                .fetch_optional(db)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Failed to read saved Slack webhook");
                    None
                });

        saved
            .and_then(|v| v.as_str().map(str::to_string))
            .or_else(|| self.default_webhook.clone())
    }

    /// Persist a validated webhook URL.
    pub async fn save_webhook(&self, db: &PgPool, webhook_url: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(SLACK_WEBHOOK_KEY)
        .bind(Value::String(webhook_url.to_string()))
        .execute(db)
        .await?;

        info!(webhook = %redact_webhook(webhook_url), "Slack webhook configured");
        Ok(())
    }

    /// Best-effort send; returns whether Slack accepted the message.
    pub async fn notify(&self, db: &PgPool, message: &Value) -> bool {
        let Some(webhook) = self.resolve_webhook(db).await else {
            debug!("Slack webhook not configured, skipping notification");
            return false;
        };
        match self.post(&webhook, message).await {
            Ok(()) => {
                info!("Slack notification sent");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to send Slack notification");
                false
            }
        }
    }

    async fn post(&self, webhook: &str, message: &Value) -> Result<()> {
        let response = self
            .client
            .post(webhook)
            .json(message)
            .send()
            .await
            .context("Failed to reach Slack")?;

        if !response.status().is_success() {
            anyhow::bail!("Slack API error: {}", response.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice() -> BookingNotice<'static> {
        BookingNotice {
            client_name: "Jane Doe",
            client_email: "jane@example.com",
            client_phone: None,
            service_name: "Deep Tissue",
            professional_name: "Sam Rivera",
            date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 60,
            price: Decimal::new(95, 0),
            notes: Some("First visit"),
        }
    }

    #[test]
    fn webhook_validation_requires_slack_host() {
        assert!(validate_webhook_url("https://hooks.slack.com/services/T0/B0/xyz").is_ok());
        assert!(validate_webhook_url("  https://hooks.slack.com/services/T0/B0/xyz ").is_ok());
        assert!(validate_webhook_url("http://hooks.slack.com/services/T0").is_err());
        assert!(validate_webhook_url("https://hooks.slack.com.evil.io/x").is_err());
        assert!(validate_webhook_url("https://hooks.slack.com/").is_err());
        assert!(validate_webhook_url("").is_err());
    }

    #[test]
    fn redaction_hides_the_secret_path() {
        let redacted = redact_webhook("https://hooks.slack.com/services/T000/B000/secret");
        assert!(redacted.ends_with("..."));
        assert!(!redacted.contains("secret"));
    }

    #[test]
    fn booking_message_has_fields_and_optional_sections() {
        let msg = new_booking_message(&notice(), "Serenity Touch Massage");
        assert_eq!(msg["text"], "New appointment booking: Jane Doe - Deep Tissue");

        let blocks = msg["blocks"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "header");
        let fields = blocks[1]["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["text"] == "*Price:*\n$95.00"));
        assert!(fields.iter().any(|f| f["text"] == "*Date & Time:*\nWed Jun 12, 2024 at 9:00 AM"));

        // notes but no phone, then divider and context
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[2]["text"]["text"], "*Notes:* First visit");
        assert_eq!(blocks[3]["type"], "divider");
        assert_eq!(blocks[4]["elements"][0]["text"], "Serenity Touch Massage");
    }

    #[test]
    fn status_message_names_both_states() {
        let msg = status_change_message(
            &notice(),
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            "Spa",
        );
        let text = msg["blocks"][0]["text"]["text"].as_str().unwrap();
        assert!(text.starts_with("*Status:* pending → confirmed"));
        assert!(msg["text"].as_str().unwrap().starts_with("Appointment confirmed: Jane Doe"));
    }

    #[test]
    fn test_message_mentions_business() {
        let msg = test_message("Spa");
        assert_eq!(msg["text"], "Test notification from Spa");
        assert_eq!(msg["blocks"][2]["elements"][0]["text"], "Spa - Admin Dashboard");
    }
}
