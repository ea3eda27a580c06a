use serde::{Deserialize, Serialize};

use crate::model::{SearchableItem, Source, DAY_MS};

pub const RECENCY_WINDOW_MS: i64 = 30 * DAY_MS;
pub const FREQUENCY_CEILING: f64 = 100.0;

const RELEVANCE_WEIGHT: f64 = 0.5;
const TIME_WEIGHT: f64 = 0.3;
const FREQUENCY_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Smart,
    Time,
    Frequency,
}

impl SortMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "smart" | "relevance" => Some(Self::Smart),
            "time" | "recent" => Some(Self::Time),
            "frequency" | "visits" => Some(Self::Frequency),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Smart => "smart",
            Self::Time => "time",
            Self::Frequency => "frequency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Smart ranking on tabs, history or downloads with no query text falls back
/// to recency. Bookmarks keep the requested mode.
pub fn effective_sort_mode(source: Source, query: &str, requested: SortMode) -> SortMode {
    if requested == SortMode::Smart && source != Source::Bookmarks && query.trim().is_empty() {
        return SortMode::Time;
    }
    requested
}

// Title tiers are exclusive (exact 1.0, prefix 0.8, contains 0.6); URL and
// filename hits add 0.4 and 0.5 on top. Clamped to 1.0.
pub fn relevance_score(item: &SearchableItem, query: &str) -> f64 {
    if query.trim().is_empty() {
        return 0.0;
    }
    let needle = query.to_lowercase();
    let mut score: f64 = 0.0;

    if let Some(title) = item.title.as_deref() {
        let title = title.to_lowercase();
        if title == needle {
            score += 1.0;
        } else if title.starts_with(&needle) {
            score += 0.8;
        } else if title.contains(&needle) {
            score += 0.6;
        }
    }
    if contains_lowercase(item.url.as_deref(), &needle) {
        score += 0.4;
    }
    if contains_lowercase(item.filename.as_deref(), &needle) {
        score += 0.5;
    }

    score.min(1.0)
}

pub fn time_score(item: &SearchableItem, now_ms: i64) -> f64 {
    let age = now_ms.saturating_sub(item.ranking_timestamp());
    (1.0 - age as f64 / RECENCY_WINDOW_MS as f64).clamp(0.0, 1.0)
}

pub fn frequency_score(item: &SearchableItem) -> f64 {
    (f64::from(item.visit_count) / FREQUENCY_CEILING).min(1.0)
}

pub fn composite_score(item: &SearchableItem, query: &str, mode: SortMode, now_ms: i64) -> f64 {
    match mode {
        SortMode::Time => time_score(item, now_ms),
        SortMode::Frequency => frequency_score(item),
        SortMode::Smart => {
            RELEVANCE_WEIGHT * relevance_score(item, query)
                + TIME_WEIGHT * time_score(item, now_ms)
                + FREQUENCY_WEIGHT * frequency_score(item)
        }
    }
}

pub fn rank(
    items: &[SearchableItem],
    query: &str,
    mode: SortMode,
    order: SortOrder,
    now_ms: i64,
) -> Vec<SearchableItem> {
    let mut scored: Vec<(f64, usize, &SearchableItem)> = items
        .iter()
        .enumerate()
        .map(|(index, item)| (composite_score(item, query, mode, now_ms), index, item))
        .collect();

    scored.sort_by(|a, b| {
        let by_score = match order {
            SortOrder::Desc => b.0.total_cmp(&a.0),
            SortOrder::Asc => a.0.total_cmp(&b.0),
        };
        by_score.then_with(|| a.1.cmp(&b.1))
    });

    scored.into_iter().map(|(_, _, item)| item.clone()).collect()
}

fn contains_lowercase(field: Option<&str>, needle: &str) -> bool {
    field
        .map(|value| value.to_lowercase().contains(needle))
        .unwrap_or(false)
}
