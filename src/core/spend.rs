use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Chart colors kept stable per model so every rendering agrees.
static MODEL_COLORS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("opus", "#8b5cf6"),
        ("sonnet", "#3b82f6"),
        ("haiku", "#22c55e"),
        ("minimax", "#f59e0b"),
        ("deepseek", "#06b6d4"),
        ("kimi", "#ec4899"),
        ("gemini", "#ef4444"),
    ])
});

static MODEL_DISPLAY_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("opus", "Claude Opus"),
        ("sonnet", "Claude Sonnet"),
        ("haiku", "Claude Haiku"),
        ("minimax", "Minimax"),
        ("deepseek", "DeepSeek"),
        ("kimi", "Kimi"),
        ("gemini", "Gemini"),
    ])
});

pub const FALLBACK_COLOR: &str = "#888888";

pub fn model_color(model: &str) -> &'static str {
    MODEL_COLORS.get(model).copied().unwrap_or(FALLBACK_COLOR)
}

pub fn model_display_name(model: &str) -> String {
    MODEL_DISPLAY_NAMES
        .get(model)
        .map(|n| n.to_string())
        .unwrap_or_else(|| model.to_string())
}

/// One model's usage inside a single aggregation bucket. Numbers are
/// deserialized leniently: a missing or non-numeric value becomes
/// `None` and the entry counts as invalid instead of failing the load.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelUsage {
    #[serde(default, deserialize_with = "lenient_number")]
    pub count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cost: Option<f64>,
}

impl ModelUsage {
    pub fn is_valid(&self) -> bool {
        self.count.is_some() && self.cost.is_some()
    }
}

/// The three-tier pre-aggregated spend document
/// (all-time / by-month / by-day, each keyed by model name).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpendHistory {
    #[serde(deserialize_with = "lenient_number")]
    pub total_cost: Option<f64>,
    pub all_time: HashMap<String, ModelUsage>,
    pub by_month: HashMap<String, HashMap<String, ModelUsage>>,
    pub by_day: BTreeMap<String, HashMap<String, ModelUsage>>,
}

/// One row of a per-model aggregation answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpend {
    pub model: String,
    pub display_name: String,
    pub color: &'static str,
    pub count: u64,
    pub cost: f64,
}

impl ModelSpend {
    pub fn new(model: &str, count: u64, cost: f64) -> Self {
        Self {
            model: model.to_string(),
            display_name: model_display_name(model),
            color: model_color(model),
            count,
            cost,
        }
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(v.as_f64().filter(|f| f.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_numbers_swallow_garbage() {
        let usage: ModelUsage =
            serde_json::from_str(r#"{"count": "three", "cost": 1.5}"#).unwrap();
        assert_eq!(usage.count, None);
        assert_eq!(usage.cost, Some(1.5));
        assert!(!usage.is_valid());
    }

    #[test]
    fn history_parses_all_tiers() {
        let doc = r#"{
            "totalCost": 12.5,
            "allTime": {"opus": {"count": 4, "cost": 10.0}},
            "byMonth": {"2026-02": {"opus": {"count": 2, "cost": 5.0}}},
            "byDay": {"2026-02-01": {"opus": {"count": 2, "cost": 1.5}}}
        }"#;
        let h: SpendHistory = serde_json::from_str(doc).unwrap();
        assert_eq!(h.total_cost, Some(12.5));
        assert!(h.all_time["opus"].is_valid());
        assert_eq!(h.by_day["2026-02-01"]["opus"].cost, Some(1.5));
    }

    #[test]
    fn known_models_get_stable_colors() {
        assert_eq!(model_color("opus"), "#8b5cf6");
        assert_eq!(model_color("mystery"), FALLBACK_COLOR);
        assert_eq!(model_display_name("sonnet"), "Claude Sonnet");
        assert_eq!(model_display_name("mystery"), "mystery");
    }
}
