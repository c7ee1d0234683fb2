use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::task::id_string;
use super::time;
use super::validate::ValidationError;

/// A read-only mirror of one external calendar event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub all_day: bool,
    pub location: Option<String>,
    pub description: Option<String>,
    pub attendees: Vec<String>,
    pub html_link: Option<String>,
}

impl CalendarEvent {
    /// `start == end` is tolerated (zero-length events exist in the
    /// wild); an end before the start is not.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.end < self.start {
            return Err(ValidationError::EndBeforeStart);
        }
        Ok(())
    }
}

/// Event as it appears in the snapshot. `start`/`end` may be precise
/// instants or bare dates; `summary` is the upstream name for `title`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    pub id: Option<Value>,
    pub summary: Option<String>,
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub all_day: Option<bool>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub attendees: Option<Vec<String>>,
    pub html_link: Option<String>,
}

impl RawEvent {
    pub fn normalize(self) -> Result<CalendarEvent, ValidationError> {
        let id = self
            .id
            .as_ref()
            .and_then(id_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let start_raw = self.start.ok_or(ValidationError::MissingField("start"))?;
        let (start, start_date_only) = parse_when(&start_raw)
            .ok_or_else(|| ValidationError::BadTimestamp(start_raw.clone()))?;

        // A missing end collapses to a zero-length event.
        let end = match self.end.as_deref() {
            Some(s) => {
                parse_when(s)
                    .ok_or_else(|| ValidationError::BadTimestamp(s.to_string()))?
                    .0
            }
            None => start,
        };

        let event = CalendarEvent {
            id,
            title: self
                .summary
                .or(self.title)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            start,
            end,
            all_day: self.all_day.unwrap_or(false) || start_date_only,
            location: self.location.filter(|s| !s.is_empty()),
            description: self.description.filter(|s| !s.is_empty()),
            attendees: self.attendees.unwrap_or_default(),
            html_link: self.html_link.filter(|s| !s.is_empty()),
        };
        event.validate()?;
        Ok(event)
    }
}

/// Parse a snapshot timestamp that is either a precise instant or a
/// date-only string; the latter lands on midnight and flags all-day.
fn parse_when(s: &str) -> Option<(NaiveDateTime, bool)> {
    if let Some(dt) = time::parse_instant(s) {
        return Some((dt, false));
    }
    time::parse_date(s).map(|d| (d.and_time(NaiveTime::MIN), true))
}
