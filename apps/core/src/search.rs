use serde::{Deserialize, Serialize};

use crate::matcher::matches;
use crate::model::{GroupTab, SearchableItem, TabGroup, UsageStatus};
use crate::query_dsl::ParsedQuery;

pub fn search(items: &[SearchableItem], query: &str) -> Vec<SearchableItem> {
    if query.trim().is_empty() {
        return items.to_vec();
    }

    let parsed = ParsedQuery::parse(query);
    search_parsed(items, &parsed)
}

pub fn search_parsed(items: &[SearchableItem], parsed: &ParsedQuery) -> Vec<SearchableItem> {
    if parsed.is_empty() {
        return items.to_vec();
    }

    items
        .iter()
        .filter(|item| matches(item, parsed))
        .cloned()
        .collect()
}

/// Plain keyword search over tab groups; the query DSL does not apply. A
/// group whose title holds every keyword is kept whole, otherwise it keeps
/// only the tabs whose title or URL holds every keyword.
pub fn search_groups(groups: &[TabGroup], query: &str) -> Vec<TabGroup> {
    let keywords: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if keywords.is_empty() {
        return groups.to_vec();
    }

    groups
        .iter()
        .filter_map(|group| {
            let title = group.title.to_lowercase();
            if keywords.iter().all(|keyword| title.contains(keyword.as_str())) {
                return Some(group.clone());
            }
            let tabs: Vec<GroupTab> = group
                .tabs
                .iter()
                .filter(|tab| tab_matches(tab, &keywords))
                .cloned()
                .collect();
            if tabs.is_empty() {
                None
            } else {
                Some(TabGroup {
                    tabs,
                    ..group.clone()
                })
            }
        })
        .collect()
}

fn tab_matches(tab: &GroupTab, keywords: &[String]) -> bool {
    let title = tab.title.to_lowercase();
    let url = tab.url.to_lowercase();
    keywords
        .iter()
        .all(|keyword| title.contains(keyword.as_str()) || url.contains(keyword.as_str()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UsageFilter {
    #[default]
    All,
    NeverUsed,
    RarelyUsed,
    Dormant,
    Active,
}

impl UsageFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "never_used" | "never-used" => Some(Self::NeverUsed),
            "rarely_used" | "rarely-used" => Some(Self::RarelyUsed),
            "dormant" => Some(Self::Dormant),
            "active" => Some(Self::Active),
            _ => None,
        }
    }

    pub fn accepts(self, item: &SearchableItem) -> bool {
        let wanted = match self {
            Self::All => return true,
            Self::NeverUsed => UsageStatus::NeverUsed,
            Self::RarelyUsed => UsageStatus::RarelyUsed,
            Self::Dormant => UsageStatus::Dormant,
            Self::Active => UsageStatus::Active,
        };
        item.usage_status == Some(wanted)
    }
}

pub fn filter_by_usage(items: &[SearchableItem], filter: UsageFilter) -> Vec<SearchableItem> {
    if filter == UsageFilter::All {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|item| filter.accepts(item))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounts {
    pub never_used: usize,
    pub rarely_used: usize,
    pub dormant: usize,
}

pub fn usage_counts(items: &[SearchableItem]) -> UsageCounts {
    let mut counts = UsageCounts::default();
    for item in items {
        match item.usage_status {
            Some(UsageStatus::NeverUsed) => counts.never_used += 1,
            Some(UsageStatus::RarelyUsed) => counts.rarely_used += 1,
            Some(UsageStatus::Dormant) => counts.dormant += 1,
            Some(UsageStatus::Active) | None => {}
        }
    }
    counts
}
