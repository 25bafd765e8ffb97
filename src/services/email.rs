//! Transactional email through the Resend REST API.
//!
//! Sending is best-effort: every public method reports success as a `bool`
//! and logs failures, so a broken mail provider never fails a booking.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::calendar_invite::{invite_attachment, Attachment, InviteDetails, Organizer};
use crate::config::Settings;
use crate::domain::two_factor::TokenPurpose;

const RESEND_API_URL: &str = "https://api.resend.com";

/// Everything a booking confirmation mentions
#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    pub appointment_id: Uuid,
    pub client_name: String,
    pub client_email: String,
    pub service_name: String,
    pub professional_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub price: Decimal,
    pub notes: Option<String>,
}

impl BookingConfirmation {
    fn invite(&self) -> InviteDetails {
        InviteDetails {
            appointment_id: self.appointment_id,
            client_name: self.client_name.clone(),
            client_email: self.client_email.clone(),
            service_name: self.service_name.clone(),
            date: self.date,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            notes: self.notes.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    html: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

/// Resend client
#[derive(Clone)]
pub struct Mailer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    from: String,
    business_name: String,
}

impl Mailer {
    pub fn new(client: Client, settings: &Settings) -> Self {
        if settings.resend_api_key.is_none() {
            info!("RESEND_API_KEY not set, emails will be skipped");
        }
        Self {
            client,
            base_url: RESEND_API_URL.to_string(),
            api_key: settings.resend_api_key.clone(),
            from: settings.email_from.clone(),
            business_name: settings.business_name.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Confirmation email with the `.ics` invite attached.
    #[instrument(skip(self, booking), fields(appointment_id = %booking.appointment_id))]
    pub async fn send_booking_confirmation(&self, booking: &BookingConfirmation) -> bool {
        let organizer = Organizer::from_mailbox(&self.from, &self.business_name);
        let request = SendEmailRequest {
            from: &self.from,
            to: vec![&booking.client_email],
            subject: format!("Appointment Confirmation - {}", booking.service_name),
            html: booking_confirmation_html(booking, &self.business_name),
            attachments: vec![invite_attachment(&booking.invite(), &organizer, Utc::now())],
        };
        self.deliver(request).await
    }

    /// Email a two-factor code.
    #[instrument(skip(self, code))]
    pub async fn send_two_factor_code(&self, to: &str, code: &str, purpose: TokenPurpose) -> bool {
        let request = SendEmailRequest {
            from: &self.from,
            to: vec![to],
            subject: purpose.email_subject().to_string(),
            html: two_factor_html(purpose, code),
            attachments: Vec::new(),
        };
        self.deliver(request).await
    }

    async fn deliver(&self, request: SendEmailRequest<'_>) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(subject = %request.subject, "RESEND_API_KEY not configured, skipping email");
            return false;
        };

        match self.post(api_key, &request).await {
            Ok(id) => {
                info!(email_id = %id, subject = %request.subject, "Email sent");
                true
            }
            Err(e) => {
                warn!(error = %e, subject = %request.subject, "Email sending failed");
                false
            }
        }
    }

    async fn post(&self, api_key: &str, request: &SendEmailRequest<'_>) -> Result<String> {
        let url = format!("{}/emails", self.base_url);
        debug!(url = %url, "Resend request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .context("Failed to reach email API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Email API returned {}: {}", status, body);
        }

        let sent: SendEmailResponse = response
            .json()
            .await
            .context("Invalid email API response")?;
        Ok(sent.id)
    }
}

/// Minimal HTML escaping for values interpolated into templates.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn detail_row(label: &str, value: &str) -> String {
    format!(
        r#"<div class="detail-row"><span class="detail-label">{}:</span> <span class="detail-value">{}</span></div>"#,
        label, value
    )
}

pub fn booking_confirmation_html(booking: &BookingConfirmation, business_name: &str) -> String {
    let business = escape_html(business_name);
    let notes = booking
        .notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(|n| {
            format!(
                r#"<div class="notes-section"><strong>Your notes:</strong><p>{}</p></div>"#,
                escape_html(n)
            )
        })
        .unwrap_or_default();

    let rows = [
        detail_row("Service", &escape_html(&booking.service_name)),
        detail_row("Therapist", &escape_html(&booking.professional_name)),
        detail_row("Date", &booking.date.format("%A, %B %-d, %Y").to_string()),
        detail_row("Time", &booking.start_time.format("%-I:%M %p").to_string()),
        detail_row("Duration", &format!("{} minutes", booking.duration_minutes)),
        detail_row("Price", &format!("${:.2}", booking.price)),
    ]
    .concat();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Appointment Confirmation</title>
  <style>
    body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; background-color: #f8f9fa; }}
    .container {{ max-width: 600px; margin: 0 auto; background-color: #ffffff; }}
    .header {{ background: #059669; color: white; padding: 40px 30px; text-align: center; }}
    .content {{ padding: 40px 30px; }}
    .appointment-card {{ background-color: #f0fdf4; border: 1px solid #bbf7d0; border-radius: 12px; padding: 24px; }}
    .detail-row {{ margin: 12px 0; padding: 8px 0; border-bottom: 1px solid #e5e7eb; }}
    .detail-label {{ font-weight: 600; color: #374151; }}
    .detail-value {{ color: #059669; font-weight: 500; }}
    .notes-section {{ background-color: #fef3c7; border: 1px solid #fcd34d; border-radius: 8px; padding: 16px; margin: 20px 0; }}
    .calendar-note {{ background-color: #dbeafe; border: 1px solid #93c5fd; border-radius: 8px; padding: 16px; margin: 20px 0; text-align: center; }}
    .footer {{ background-color: #f9fafb; padding: 30px; text-align: center; color: #6b7280; font-size: 14px; }}
  </style>
</head>
<body>
  <div class="container">
    <div class="header">
      <h1>{business}</h1>
      <p>Your appointment is booked</p>
    </div>
    <div class="content">
      <h2>Hello {client}!</h2>
      <p>Thank you for booking with {business}. We look forward to seeing you.</p>
      <div class="appointment-card">
        <h3>Appointment Details</h3>
        {rows}
      </div>
      {notes}
      <div class="calendar-note">The attached calendar invite adds this appointment to your calendar.</div>
    </div>
    <div class="footer">
      <p>{business}</p>
      <p>Need to reschedule? Please contact us at least 24 hours in advance.</p>
    </div>
  </div>
</body>
</html>"#,
        business = business,
        client = escape_html(&booking.client_name),
        rows = rows,
        notes = notes,
    )
}

pub fn two_factor_html(purpose: TokenPurpose, code: &str) -> String {
    let subject = purpose.email_subject();
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2>{subject}</h2>
  <p>{message}</p>
  <div style="background: #f5f5f5; padding: 20px; text-align: center; margin: 20px 0;">
    <h1 style="font-size: 32px; letter-spacing: 8px; margin: 0;">{code}</h1>
  </div>
  <p>If you didn't request this code, please ignore this email.</p>
</div>"#,
        subject = subject,
        message = escape_html(&purpose.email_message(code)),
        code = escape_html(code),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking() -> BookingConfirmation {
        BookingConfirmation {
            appointment_id: Uuid::new_v4(),
            client_name: "Jane <script>".to_string(),
            client_email: "jane@example.com".to_string(),
            service_name: "Hot Stone".to_string(),
            professional_name: "Sam Rivera".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
            start_time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            duration_minutes: 75,
            price: Decimal::new(11000, 2),
            notes: None,
        }
    }

    #[test]
    fn confirmation_html_lists_details_and_escapes_names() {
        let html = booking_confirmation_html(&booking(), "Serenity Touch Massage");
        assert!(html.contains("Hello Jane &lt;script&gt;!"));
        assert!(html.contains("Wednesday, June 12, 2024"));
        assert!(html.contains("2:30 PM"));
        assert!(html.contains("75 minutes"));
        assert!(html.contains("$110.00"));
        assert!(!html.contains("notes-section\">"));
    }

    #[test]
    fn notes_are_rendered_when_present() {
        let mut b = booking();
        b.notes = Some("Allergic to lavender".to_string());
        let html = booking_confirmation_html(&b, "Spa");
        assert!(html.contains("Allergic to lavender"));
    }

    #[test]
    fn two_factor_html_shows_code() {
        let html = two_factor_html(TokenPurpose::Signup, "482913");
        assert!(html.contains("<h2>Verify Your Account</h2>"));
        assert!(html.contains(">482913</h1>"));
        assert!(html.contains("expire in 10 minutes"));
    }

    #[tokio::test]
    async fn unconfigured_mailer_skips_sending() {
        let mailer = Mailer::new(Client::new(), &Settings::for_tests());
        assert!(!mailer.is_configured());
        assert!(!mailer.send_booking_confirmation(&booking()).await);
        assert!(
            !mailer
                .send_two_factor_code("jane@example.com", "123456", TokenPurpose::Login)
                .await
        );
    }
}
