//! Google Calendar events for appointments.
//!
//! Calls are made with the access token from the caller's
//! `google_access_token` cookie against their `primary` calendar.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveTime};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Cookie holding the Google OAuth access token
pub const ACCESS_TOKEN_COOKIE: &str = "google_access_token";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    /// Local wall-clock time, interpreted in `time_zone`
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
    pub attendees: Vec<EventAttendee>,
}

/// Appointment facts that end up on the event
#[derive(Debug, Clone)]
pub struct EventDetails<'a> {
    pub client_name: &'a str,
    pub client_email: &'a str,
    pub service_name: &'a str,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub notes: Option<&'a str>,
}

impl CalendarEvent {
    pub fn for_appointment(details: &EventDetails<'_>, time_zone: &str) -> Self {
        let start = details.date.and_time(details.start_time);
        let end = start + Duration::minutes(i64::from(details.duration_minutes));
        let fmt = "%Y-%m-%dT%H:%M:%S";

        let mut description = format!(
            "Appointment\n\nClient: {}\nService: {}\nDuration: {} minutes",
            details.client_name, details.service_name, details.duration_minutes
        );
        if let Some(notes) = details.notes.filter(|n| !n.trim().is_empty()) {
            description.push_str(&format!("\nNotes: {}", notes));
        }
        description.push_str(&format!("\n\nContact: {}", details.client_email));

        Self {
            summary: format!("{} - {}", details.service_name, details.client_name),
            description,
            start: EventTime {
                date_time: start.format(fmt).to_string(),
                time_zone: time_zone.to_string(),
            },
            end: EventTime {
                date_time: end.format(fmt).to_string(),
                time_zone: time_zone.to_string(),
            },
            attendees: vec![EventAttendee {
                email: details.client_email.to_string(),
                display_name: details.client_name.to_string(),
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

/// Google Calendar REST client
#[derive(Clone)]
pub struct CalendarClient {
    client: Client,
    base_url: String,
    time_zone: String,
}

impl CalendarClient {
    pub fn new(client: Client, time_zone: &str) -> Self {
        Self {
            client,
            base_url: CALENDAR_API_URL.to_string(),
            time_zone: time_zone.to_string(),
        }
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/primary/events", self.base_url)
    }

    /// Create an event and return its id.
    #[instrument(skip(self, access_token, event))]
    pub async fn create_event(&self, access_token: &str, event: &CalendarEvent) -> Result<String> {
        let response = self
            .client
            .post(self.events_url())
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .context("Failed to reach Google Calendar")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Calendar API error: {}", status);
        }

        let created: CreatedEvent = response
            .json()
            .await
            .context("Invalid Google Calendar response")?;
        debug!(event_id = %created.id, "Calendar event created");
        Ok(created.id)
    }

    #[instrument(skip(self, access_token, event))]
    pub async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<()> {
        let response = self
            .client
            .put(format!("{}/{}", self.events_url(), event_id))
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .context("Failed to reach Google Calendar")?;

        if !response.status().is_success() {
            anyhow::bail!("Calendar API error: {}", response.status());
        }
        Ok(())
    }

    #[instrument(skip(self, access_token))]
    pub async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/{}", self.events_url(), event_id))
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to reach Google Calendar")?;

        // Already-deleted events answer 410 Gone
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::GONE {
            anyhow::bail!("Calendar API error: {}", status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_uses_local_times_in_business_zone() {
        let details = EventDetails {
            client_name: "Jane Doe",
            client_email: "jane@example.com",
            service_name: "Swedish Massage",
            date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
            start_time: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            duration_minutes: 45,
            notes: None,
        };
        let event = CalendarEvent::for_appointment(&details, "America/New_York");

        assert_eq!(event.summary, "Swedish Massage - Jane Doe");
        assert_eq!(event.start.date_time, "2024-06-12T23:00:00");
        assert_eq!(event.end.date_time, "2024-06-12T23:45:00");
        assert_eq!(event.start.time_zone, "America/New_York");
        assert!(event.description.ends_with("Contact: jane@example.com"));
        assert!(!event.description.contains("Notes:"));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["start"]["dateTime"], "2024-06-12T23:00:00");
        assert_eq!(json["attendees"][0]["displayName"], "Jane Doe");
    }
}
