use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use super::{DataService, Source, FRESHNESS_THRESHOLD_MINUTES};
use crate::core::event::{CalendarEvent, RawEvent};
use crate::core::time;

/// How recently the upstream calendar mirror was refreshed.
#[derive(Debug, Clone, PartialEq)]
pub struct Freshness {
    pub fresh: bool,
    pub age: Option<Duration>,
    pub label: String,
}

/// Read-only mirror of the external calendar, sorted by start time.
#[derive(Default)]
pub struct CalendarStore {
    events: Vec<CalendarEvent>,
    refreshed_at: Option<NaiveDateTime>,
    loaded: bool,
    skipped: usize,
}

impl CalendarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, service: &DataService) {
        self.events.clear();
        self.skipped = 0;

        let Some(raw) = service.get_data(Source::Calendar) else {
            self.loaded = true;
            log::info!("no calendar data available — empty state");
            return;
        };

        // The snapshot wraps events with its own refresh timestamp:
        // { refreshedAt, calendar: { events: [...] } }
        self.refreshed_at = raw
            .get("refreshedAt")
            .and_then(Value::as_str)
            .and_then(time::parse_instant);

        if let Some(raw_events) = raw.pointer("/calendar/events").and_then(Value::as_array) {
            for value in raw_events {
                let parsed = serde_json::from_value::<RawEvent>(value.clone())
                    .map_err(|e| e.to_string())
                    .and_then(|r| r.normalize().map_err(|e| e.to_string()));
                match parsed {
                    Ok(event) => self.events.push(event),
                    Err(e) => {
                        self.skipped += 1;
                        log::debug!("skipped invalid event: {}", e);
                    }
                }
            }
        }

        self.events.sort_by_key(|e| e.start);
        self.loaded = true;
        log::info!(
            "loaded {} events ({} invalid skipped)",
            self.events.len(),
            self.skipped
        );
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    pub fn for_date(&self, date: NaiveDate) -> Vec<&CalendarEvent> {
        self.events
            .iter()
            .filter(|e| e.start.date() == date)
            .collect()
    }

    /// Events starting within the 7-day window beginning at `start`.
    pub fn for_week(&self, start: NaiveDate) -> Vec<&CalendarEvent> {
        let window_start = start.and_time(NaiveTime::MIN);
        let window_end = window_start + Duration::days(7);
        self.events
            .iter()
            .filter(|e| e.start >= window_start && e.start < window_end)
            .collect()
    }

    pub fn today(&self, today: NaiveDate) -> Vec<&CalendarEvent> {
        self.for_date(today)
    }

    /// Events still in progress or ahead of `now`, oldest first.
    pub fn upcoming(&self, now: NaiveDateTime, n: usize) -> Vec<&CalendarEvent> {
        self.events.iter().filter(|e| e.end > now).take(n).collect()
    }

    pub fn freshness(&self, now: NaiveDateTime) -> Freshness {
        let Some(refreshed) = self.refreshed_at else {
            return Freshness {
                fresh: false,
                age: None,
                label: "Never synced".to_string(),
            };
        };

        let age = now - refreshed;
        let minutes = age.num_minutes();
        let label = if minutes < 1 {
            "Just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else {
            format!("{}h ago", minutes / 60)
        };

        Freshness {
            fresh: age < Duration::minutes(FRESHNESS_THRESHOLD_MINUTES),
            age: Some(age),
            label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BeaconConfig;

    fn service_with_calendar(data: Value) -> DataService {
        let config = BeaconConfig {
            data_url: "http://127.0.0.1:9".to_string(),
            brain_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let mut service = DataService::new(&config).unwrap();
        service.apply_result(Source::Calendar, Ok(data));
        service
    }

    fn sample() -> Value {
        serde_json::json!({
            "refreshedAt": "2026-02-01T09:00:00Z",
            "calendar": {
                "events": [
                    { "id": "late", "summary": "Debrief",
                      "start": "2026-02-01T15:00:00Z", "end": "2026-02-01T16:00:00Z" },
                    { "id": "early", "summary": "Standup",
                      "start": "2026-02-01T08:00:00Z", "end": "2026-02-01T08:15:00Z" },
                    { "id": "allday", "summary": "Offsite", "start": "2026-02-03" },
                    { "id": "broken", "summary": "No start" }
                ]
            }
        })
    }

    #[test]
    fn loads_sorts_and_skips_invalid() {
        let service = service_with_calendar(sample());
        let mut store = CalendarStore::new();
        store.load(&service);

        assert_eq!(store.events().len(), 3);
        assert_eq!(store.skipped_count(), 1);
        assert_eq!(store.events()[0].id, "early"); // sorted by start
        assert!(store.events()[2].all_day);
    }

    #[test]
    fn date_and_week_windows() {
        let service = service_with_calendar(sample());
        let mut store = CalendarStore::new();
        store.load(&service);

        let feb1 = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert_eq!(store.for_date(feb1).len(), 2);
        assert_eq!(store.for_week(feb1).len(), 3);
        assert_eq!(store.for_week(feb1 + Duration::days(10)).len(), 0);
    }

    #[test]
    fn upcoming_skips_finished_events() {
        let service = service_with_calendar(sample());
        let mut store = CalendarStore::new();
        store.load(&service);

        let midday = NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let upcoming = store.upcoming(midday, 5);
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].id, "late");
    }

    #[test]
    fn freshness_labels() {
        let service = service_with_calendar(sample());
        let mut store = CalendarStore::new();
        store.load(&service);

        let refreshed = NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        let f = store.freshness(refreshed + Duration::seconds(30));
        assert!(f.fresh);
        assert_eq!(f.label, "Just now");

        let f = store.freshness(refreshed + Duration::minutes(12));
        assert!(!f.fresh);
        assert_eq!(f.label, "12m ago");

        let f = store.freshness(refreshed + Duration::hours(3));
        assert_eq!(f.label, "3h ago");

        let empty = CalendarStore::new();
        assert_eq!(empty.freshness(refreshed).label, "Never synced");
    }
}
