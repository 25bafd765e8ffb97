//! Professional weekly schedules and slot computation

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Day names indexed by `day_of_week` (0 = Sunday)
pub const DAYS_OF_WEEK: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Spacing between offered start times
pub const SLOT_STEP_MINUTES: u32 = 60;

/// One weekday of a professional's schedule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleDay {
    /// `None` when the day has never been saved and defaults apply
    pub id: Option<Uuid>,
    pub professional_id: Uuid,
    pub day_of_week: i16,
    pub day_name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

impl ScheduleDay {
    /// 09:00 to 17:00, available Monday through Friday.
    pub fn default_for(professional_id: Uuid, day_of_week: i16) -> Self {
        Self {
            id: None,
            professional_id,
            day_of_week,
            day_name: day_name(day_of_week).to_string(),
            start_time: hm(9, 0),
            end_time: hm(17, 0),
            is_available: (1..=5).contains(&day_of_week),
        }
    }
}

/// Request DTO for saving one weekday
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateScheduleRequest {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

/// Query for bookable slots on a date
#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub service_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotsResponse {
    pub professional_id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: i32,
    pub slots: Vec<NaiveTime>,
}

pub fn day_name(day_of_week: i16) -> &'static str {
    usize::try_from(day_of_week)
        .ok()
        .and_then(|i| DAYS_OF_WEEK.get(i))
        .copied()
        .unwrap_or("Unknown")
}

pub fn validate_day(day_of_week: i16) -> Result<(), String> {
    if (0..=6).contains(&day_of_week) {
        Ok(())
    } else {
        Err("day_of_week must be between 0 (Sunday) and 6 (Saturday)".to_string())
    }
}

pub fn validate_hours(start: NaiveTime, end: NaiveTime) -> Result<(), String> {
    if start < end {
        Ok(())
    } else {
        Err("start_time must be before end_time".to_string())
    }
}

/// `day_of_week` for a calendar date, Sunday = 0
pub fn weekday_index(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_sunday() as i16
}

/// Merge stored rows over the defaults so all seven days are present, in order.
pub fn fill_week(professional_id: Uuid, stored: Vec<ScheduleDay>) -> Vec<ScheduleDay> {
    (0..7)
        .map(|day| {
            stored
                .iter()
                .find(|s| s.day_of_week == day)
                .cloned()
                .unwrap_or_else(|| ScheduleDay::default_for(professional_id, day))
        })
        .collect()
}

/// End time for an appointment, or `None` when it would run past midnight.
pub fn end_time_for(start: NaiveTime, duration_minutes: i32) -> Option<NaiveTime> {
    let start_secs = start.num_seconds_from_midnight() as i64;
    let end_secs = start_secs + i64::from(duration_minutes) * 60;
    if duration_minutes <= 0 || end_secs >= 24 * 3600 {
        return None;
    }
    NaiveTime::from_num_seconds_from_midnight_opt(end_secs as u32, 0)
}

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)`
pub fn overlaps(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Whether a start on `date` at `start` is already behind `now` (wall clock).
pub fn starts_in_past(date: NaiveDate, start: NaiveTime, now: NaiveDateTime) -> bool {
    date.and_time(start) < now
}

/// Drop start times that have already gone by.
pub fn upcoming_slots(date: NaiveDate, slots: Vec<NaiveTime>, now: NaiveDateTime) -> Vec<NaiveTime> {
    slots
        .into_iter()
        .filter(|&slot| !starts_in_past(date, slot, now))
        .collect()
}

/// Whether `[start, end)` sits inside the working hours of `day`.
pub fn within_schedule(day: &ScheduleDay, start: NaiveTime, end: NaiveTime) -> bool {
    day.is_available && start >= day.start_time && end <= day.end_time
}

/// Start times on `day` where an appointment of `duration_minutes` fits
/// without touching any of the `booked` intervals.
pub fn available_slots(
    day: &ScheduleDay,
    duration_minutes: i32,
    booked: &[(NaiveTime, NaiveTime)],
) -> Vec<NaiveTime> {
    if !day.is_available {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut cursor = day.start_time;
    while cursor < day.end_time {
        let Some(end) = end_time_for(cursor, duration_minutes) else {
            break;
        };
        if end > day.end_time {
            break;
        }
        if !booked.iter().any(|&(s, e)| overlaps(cursor, end, s, e)) {
            slots.push(cursor);
        }
        let next = cursor.num_seconds_from_midnight() + SLOT_STEP_MINUTES * 60;
        match NaiveTime::from_num_seconds_from_midnight_opt(next, 0) {
            Some(t) if next < 24 * 3600 => cursor = t,
            _ => break,
        }
    }
    slots
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}
