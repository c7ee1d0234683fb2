use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Current local wall-clock time, as used for all stamps in this crate.
pub fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Parse an ISO-ish instant from an external snapshot.
///
/// Handles "2026-02-01T12:30:00", with or without fractional seconds,
/// with a trailing "Z", or with a numeric offset ("+02:00").
pub fn parse_instant(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    let bare = trimmed.trim_end_matches('Z');
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(bare, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }
    None
}

/// Parse a plain "YYYY-MM-DD" date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Parse a date from the first 10 characters of a string that may carry
/// a full instant ("2026-02-01T09:00:00Z" -> 2026-02-01).
pub fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    let t = s.trim();
    let head = if t.len() >= 10 { &t[..10] } else { t };
    parse_date(head)
}

/// Day key used by the spend history ("YYYY-MM-DD").
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Month key used by the spend history ("YYYY-MM").
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_zulu_instants() {
        assert_eq!(
            parse_instant("2026-02-01T12:30:00"),
            Some(
                NaiveDate::from_ymd_opt(2026, 2, 1)
                    .unwrap()
                    .and_hms_opt(12, 30, 0)
                    .unwrap()
            )
        );
        assert!(parse_instant("2026-02-01T12:30:00Z").is_some());
        assert!(parse_instant("2026-02-01T12:30:00.123Z").is_some());
        assert!(parse_instant("2026-02-01T12:30:00+02:00").is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_instant("not a date").is_none());
        assert!(parse_date("2026-13-01").is_none());
    }

    #[test]
    fn date_prefix_strips_time() {
        assert_eq!(
            parse_date_prefix("2026-02-01T09:00:00Z"),
            NaiveDate::from_ymd_opt(2026, 2, 1)
        );
        assert_eq!(parse_date_prefix("2026-02-01"), NaiveDate::from_ymd_opt(2026, 2, 1));
    }
}
