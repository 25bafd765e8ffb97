//! iCalendar (RFC 5545) invites attached to booking confirmation emails.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What goes into one invite
#[derive(Debug, Clone)]
pub struct InviteDetails {
    pub appointment_id: Uuid,
    pub client_name: String,
    pub client_email: String,
    pub service_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

/// The business sending the invite
#[derive(Debug, Clone)]
pub struct Organizer {
    pub name: String,
    pub email: String,
}

impl Organizer {
    /// Split a `Name <address>` mailbox; a bare address uses `fallback_name`.
    pub fn from_mailbox(mailbox: &str, fallback_name: &str) -> Self {
        match (mailbox.find('<'), mailbox.rfind('>')) {
            (Some(open), Some(close)) if open < close => {
                let name = mailbox[..open].trim().trim_matches('"');
                Self {
                    name: if name.is_empty() { fallback_name } else { name }.to_string(),
                    email: mailbox[open + 1..close].trim().to_string(),
                }
            }
            _ => Self {
                name: fallback_name.to_string(),
                email: mailbox.trim().to_string(),
            },
        }
    }

    fn domain(&self) -> &str {
        self.email
            .rsplit_once('@')
            .map(|(_, d)| d)
            .unwrap_or("localhost")
    }
}

/// Resend attachment object
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content: String,
    pub content_type: String,
}

fn format_utc(at: NaiveDateTime) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape TEXT values: backslash, semicolon, comma and newlines.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Parameter values (CN) cannot carry quotes or line breaks.
fn escape_param(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '"' | '\r' | '\n'))
        .collect();
    if cleaned.contains([':', ';', ',']) {
        format!("\"{}\"", cleaned)
    } else {
        cleaned
    }
}

/// Content lines are limited to 75 octets.
const MAX_LINE_OCTETS: usize = 75;

/// Fold a content line: CRLF plus one space before each continuation, never
/// splitting a UTF-8 sequence.
fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    for c in line.chars() {
        if width + c.len_utf8() > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += c.len_utf8();
    }
    out
}

/// Build the `.ics` body. Appointment times are written as UTC.
pub fn generate_ics(details: &InviteDetails, organizer: &Organizer, now: DateTime<Utc>) -> String {
    let start = details.date.and_time(details.start_time);
    let end = start + Duration::minutes(i64::from(details.duration_minutes));

    let mut description = format!(
        "Appointment for {}\n\nService: {}\nDuration: {} minutes",
        details.client_name, details.service_name, details.duration_minutes
    );
    if let Some(notes) = details.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        description.push_str("\nNotes: ");
        description.push_str(notes);
    }
    description.push_str("\n\n");
    description.push_str(&organizer.name);

    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:-//{}//Appointment//EN", organizer.name),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:REQUEST".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:appointment-{}@{}", details.appointment_id, organizer.domain()),
        format!("DTSTAMP:{}", format_utc(now.naive_utc())),
        format!("DTSTART:{}", format_utc(start)),
        format!("DTEND:{}", format_utc(end)),
        format!(
            "SUMMARY:{}",
            escape_text(&format!("{} - {}", details.service_name, details.client_name))
        ),
        format!("DESCRIPTION:{}", escape_text(&description)),
        format!(
            "ATTENDEE;CN={};RSVP=TRUE:mailto:{}",
            escape_param(&details.client_name),
            details.client_email
        ),
        format!(
            "ORGANIZER;CN={}:mailto:{}",
            escape_param(&organizer.name),
            organizer.email
        ),
        format!("LOCATION:{}", escape_text(&organizer.name)),
        "STATUS:CONFIRMED".to_string(),
        "SEQUENCE:0".to_string(),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];

    lines
        .iter()
        .map(|line| fold_line(line))
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// The invite as a base64 email attachment.
pub fn invite_attachment(details: &InviteDetails, organizer: &Organizer, now: DateTime<Utc>) -> Attachment {
    Attachment {
        filename: "appointment.ics".to_string(),
        content: STANDARD.encode(generate_ics(details, organizer, now)),
        content_type: "text/calendar".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn details() -> InviteDetails {
        InviteDetails {
            appointment_id: Uuid::nil(),
            client_name: "Jane Doe".to_string(),
            client_email: "jane@example.com".to_string(),
            service_name: "Swedish Massage".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            duration_minutes: 90,
            notes: Some("Lower back, please; no oils".to_string()),
        }
    }

    /// Undo line folding.
    fn unfold(ics: &str) -> String {
        ics.replace("\r\n ", "")
    }

    fn organizer() -> Organizer {
        Organizer::from_mailbox(
            "Serenity Touch Massage <appointments@serenitytouchmassage.com>",
            "fallback",
        )
    }

    #[test]
    fn parses_mailboxes() {
        let org = organizer();
        assert_eq!(org.name, "Serenity Touch Massage");
        assert_eq!(org.email, "appointments@serenitytouchmassage.com");

        let bare = Organizer::from_mailbox("hello@spa.test", "Spa");
        assert_eq!(bare.name, "Spa");
        assert_eq!(bare.email, "hello@spa.test");
    }

    #[test]
    fn ics_has_crlf_lines_and_utc_times() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        let ics = unfold(&generate_ics(&details(), &organizer(), now));

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(ics.ends_with("END:VEVENT\r\nEND:VCALENDAR"));
        assert!(!ics.replace("\r\n", "").contains('\n'));
        assert!(ics.contains("\r\nMETHOD:REQUEST\r\n"));
        assert!(ics.contains("\r\nDTSTAMP:20240601T083000Z\r\n"));
        assert!(ics.contains("\r\nDTSTART:20240612T140000Z\r\n"));
        assert!(ics.contains("\r\nDTEND:20240612T153000Z\r\n"));
        assert!(ics.contains(
            "\r\nUID:appointment-00000000-0000-0000-0000-000000000000@serenitytouchmassage.com\r\n"
        ));
        assert!(ics.contains("\r\nSUMMARY:Swedish Massage - Jane Doe\r\n"));
        assert!(ics.contains("ATTENDEE;CN=Jane Doe;RSVP=TRUE:mailto:jane@example.com"));
    }

    #[test]
    fn description_is_escaped() {
        let ics = unfold(&generate_ics(&details(), &organizer(), Utc::now()));
        let line = ics
            .split("\r\n")
            .find(|l| l.starts_with("DESCRIPTION:"))
            .unwrap();
        assert!(line.contains("\\n\\nService: Swedish Massage\\nDuration: 90 minutes"));
        assert!(line.contains("Notes: Lower back\\, please\\; no oils"));
    }

    #[test]
    fn long_lines_fold_at_75_octets() {
        let mut long = details();
        long.notes = Some(format!(
            "Prefers firm pressure. {}",
            "Shoulder tension, café visit. ".repeat(8)
        ));
        let ics = generate_ics(&long, &organizer(), Utc::now());

        for line in ics.split("\r\n") {
            assert!(line.len() <= 75, "{} octets: {line}", line.len());
        }
        assert!(ics.contains("\r\n "));

        let unfolded = unfold(&ics);
        let description = unfolded
            .split("\r\n")
            .find(|l| l.starts_with("DESCRIPTION:"))
            .unwrap();
        assert!(description.contains(&"Shoulder tension\\, café visit. ".repeat(8)));
    }

    #[test]
    fn short_lines_are_left_alone() {
        assert_eq!(fold_line("VERSION:2.0"), "VERSION:2.0");
        let exact = "X".repeat(75);
        assert_eq!(fold_line(&exact), exact);
        let folded = fold_line(&"é".repeat(40));
        assert!(folded.split("\r\n").all(|l| l.len() <= 75));
        assert_eq!(folded.replace("\r\n ", ""), "é".repeat(40));
    }

    #[test]
    fn attachment_is_base64_calendar() {
        let now = Utc::now();
        let attachment = invite_attachment(&details(), &organizer(), now);
        assert_eq!(attachment.filename, "appointment.ics");
        assert_eq!(attachment.content_type, "text/calendar");
        let decoded = STANDARD.decode(attachment.content).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            generate_ics(&details(), &organizer(), now)
        );
    }
}
