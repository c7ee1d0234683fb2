use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use super::{DataService, Source};
use crate::core::spend::{model_color, model_display_name, ModelSpend, ModelUsage, SpendHistory};
use crate::core::time;
use crate::core::validate::{is_day_key, is_month_key};

/// Aggregation window for spend questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    All,
}

/// All-time totals: the headline cost plus the per-model breakdown.
#[derive(Debug, Clone)]
pub struct SpendTotal {
    pub cost: Option<f64>,
    pub by_model: Vec<ModelSpend>,
}

/// Chart-ready extraction: one label per day in the requested range
/// and one aligned, zero-filled series per model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub model: String,
    pub label: String,
    pub color: &'static str,
    pub data: Vec<f64>,
}

/// Model-usage analytics over the three-tier pre-aggregated snapshot.
/// Derived views are computed on demand and never cached.
#[derive(Default)]
pub struct SpendStore {
    raw: Option<SpendHistory>,
    loaded: bool,
    invalid_entries: usize,
}

impl SpendStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, service: &DataService) {
        self.raw = None;
        self.invalid_entries = 0;

        let Some(data) = service.get_data(Source::Spend) else {
            self.loaded = true;
            log::info!("no spend data available — empty state");
            return;
        };

        let history: SpendHistory = match serde_json::from_value(data.clone()) {
            Ok(h) => h,
            Err(e) => {
                self.loaded = true;
                log::warn!("spend data failed validation: {}", e);
                return;
            }
        };

        // Malformed keys and non-numeric entries are counted, not fatal;
        // the aggregations below skip them anyway.
        for (key, models) in &history.by_day {
            if !is_day_key(key) {
                self.invalid_entries += 1;
                log::debug!("invalid day key: {}", key);
                continue;
            }
            for (model, usage) in models {
                if !usage.is_valid() {
                    self.invalid_entries += 1;
                    log::debug!("invalid day entry {} / {}", key, model);
                }
            }
        }
        for key in history.by_month.keys() {
            if !is_month_key(key) {
                self.invalid_entries += 1;
                log::debug!("invalid month key: {}", key);
            }
        }

        self.raw = Some(history);
        self.loaded = true;
        log::info!("loaded spend data ({} invalid entries)", self.invalid_entries);
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn has_data(&self) -> bool {
        self.raw.is_some()
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid_entries
    }

    /// All-time spend; `None` when no data has been loaded at all.
    pub fn total(&self) -> Option<SpendTotal> {
        let raw = self.raw.as_ref()?;
        Some(SpendTotal {
            cost: raw.total_cost,
            by_model: map_usage(&raw.all_time),
        })
    }

    /// Per-model spend for a period ending today. Day and month read
    /// their pre-aggregated buckets when present; week has no bucket
    /// and always sums the trailing 7 days of `by_day`.
    pub fn by_model(&self, period: Period, today: NaiveDate) -> Vec<ModelSpend> {
        let Some(raw) = self.raw.as_ref() else {
            return Vec::new();
        };

        match period {
            Period::All => map_usage(&raw.all_time),
            Period::Day => match raw.by_day.get(&time::day_key(today)) {
                Some(bucket) => map_usage(bucket),
                None => self.aggregate_range(today, today),
            },
            Period::Month => match raw.by_month.get(&time::month_key(today)) {
                Some(bucket) => map_usage(bucket),
                None => {
                    let first = today.with_day(1).unwrap_or(today);
                    self.aggregate_range(first, today)
                }
            },
            Period::Week => self.aggregate_range(today - Duration::days(7), today),
        }
    }

    /// Total cost for a period, or `None` when there is no data at all
    /// for it — callers can tell "zero spend" from "nothing known".
    pub fn total_for_period(&self, period: Period, today: NaiveDate) -> Option<f64> {
        let models = self.by_model(period, today);
        if models.is_empty() {
            return None;
        }
        Some(models.iter().map(|m| m.cost).sum())
    }

    pub fn sessions_for_period(&self, period: Period, today: NaiveDate) -> Option<u64> {
        let models = self.by_model(period, today);
        if models.is_empty() {
            return None;
        }
        Some(models.iter().map(|m| m.count).sum())
    }

    pub fn most_expensive_model(&self, period: Period, today: NaiveDate) -> Option<ModelSpend> {
        self.by_model(period, today)
            .into_iter()
            .max_by(|a, b| a.cost.total_cmp(&b.cost))
    }

    /// Daily cost series over an inclusive date range. Every day in
    /// the range gets exactly one value per model, zero-filled where a
    /// model has no entry that day. `None` when the range holds no
    /// data at all.
    pub fn chart_data(&self, start: NaiveDate, end: NaiveDate) -> Option<ChartData> {
        let raw = self.raw.as_ref()?;
        if end < start {
            return None;
        }

        let mut days = Vec::new();
        let mut day = start;
        while day <= end {
            days.push(day);
            day = day + Duration::days(1);
        }

        let mut model_names: Vec<String> = Vec::new();
        for day in &days {
            if let Some(models) = raw.by_day.get(&time::day_key(*day)) {
                for name in models.keys() {
                    if !model_names.contains(name) {
                        model_names.push(name.clone());
                    }
                }
            }
        }
        if model_names.is_empty() {
            return None;
        }
        model_names.sort();

        let labels: Vec<String> = days.iter().map(|d| time::day_key(*d)).collect();
        let datasets = model_names
            .into_iter()
            .map(|model| {
                let data = days
                    .iter()
                    .map(|d| {
                        raw.by_day
                            .get(&time::day_key(*d))
                            .and_then(|models| models.get(&model))
                            .and_then(|usage| usage.cost)
                            .unwrap_or(0.0)
                    })
                    .collect();
                ChartSeries {
                    label: model_display_name(&model),
                    color: model_color(&model),
                    model,
                    data,
                }
            })
            .collect();

        Some(ChartData { labels, datasets })
    }

    /// Sum `by_day` entries whose date falls inside the inclusive
    /// range, skipping entries whose numbers did not validate.
    fn aggregate_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<ModelSpend> {
        let Some(raw) = self.raw.as_ref() else {
            return Vec::new();
        };

        let mut totals: BTreeMap<&str, (u64, f64)> = BTreeMap::new();
        for (key, models) in &raw.by_day {
            let Some(date) = time::parse_date(key) else {
                continue;
            };
            if date < start || date > end {
                continue;
            }
            for (model, usage) in models {
                let (Some(count), Some(cost)) = (usage.count, usage.cost) else {
                    continue;
                };
                let entry = totals.entry(model.as_str()).or_insert((0, 0.0));
                entry.0 += count as u64;
                entry.1 += cost;
            }
        }

        totals
            .into_iter()
            .map(|(model, (count, cost))| ModelSpend::new(model, count, cost))
            .collect()
    }
}

fn map_usage(models: &std::collections::HashMap<String, ModelUsage>) -> Vec<ModelSpend> {
    let mut rows: Vec<ModelSpend> = models
        .iter()
        .filter_map(|(model, usage)| {
            let (count, cost) = (usage.count?, usage.cost?);
            Some(ModelSpend::new(model, count as u64, cost))
        })
        .collect();
    rows.sort_by(|a, b| a.model.cmp(&b.model));
    rows
}
