use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static DAY_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static MONTH_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());

/// Why a record failed validation. Invalid records are skipped and
/// counted during a load; mutations are rejected with the reason logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unknown status: {0}")]
    UnknownStatus(String),
    #[error("unknown priority: {0}")]
    UnknownPriority(String),
    #[error("unknown agent type: {0}")]
    UnknownAgentType(String),
    #[error("unparseable timestamp: {0}")]
    BadTimestamp(String),
    #[error("completed_at must be set exactly when status is done")]
    CompletionMismatch,
    #[error("event ends before it starts")]
    EndBeforeStart,
}

/// True if `key` looks like a spend-history day key ("2026-02-01").
pub fn is_day_key(key: &str) -> bool {
    DAY_KEY_RE.is_match(key)
}

/// True if `key` looks like a spend-history month key ("2026-02").
pub fn is_month_key(key: &str) -> bool {
    MONTH_KEY_RE.is_match(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_keys() {
        assert!(is_day_key("2026-02-01"));
        assert!(!is_day_key("2026-2-1"));
        assert!(!is_day_key("2026-02-01T00:00:00"));
    }

    #[test]
    fn month_keys() {
        assert!(is_month_key("2026-02"));
        assert!(!is_month_key("2026-02-01"));
    }
}
