use serde::{Deserialize, Serialize};

use crate::actions::{ActionOutcome, BatchOutcome, ItemAction};
use crate::model::{SearchableItem, Source, TabGroup, UsageStatus};
use crate::ranking::{SortMode, SortOrder};
use crate::search::{UsageCounts, UsageFilter};
use crate::settings::{Appearance, UiSettings};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadRequest {
    pub source: Source,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadResponse {
    pub source: Source,
    pub count: usize,
    pub applied: bool,
}

/// Unset fields keep the session's current choice. A different `source`
/// triggers a load before searching.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub source: Option<Source>,
    pub sort: Option<SortMode>,
    pub order: Option<SortOrder>,
    pub filter: Option<UsageFilter>,
    pub now_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResultDto {
    pub id: String,
    pub source: Source,
    pub title: Option<String>,
    pub url: Option<String>,
    pub filename: Option<String>,
    pub visit_count: u32,
    pub last_visit: Option<i64>,
    pub usage_status: Option<UsageStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResponse {
    pub source: Source,
    pub effective_sort: SortMode,
    pub total: usize,
    pub counts: UsageCounts,
    pub results: Vec<SearchResultDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<TabGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActRequest {
    pub id: String,
    #[serde(flatten)]
    pub action: ItemAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActResponse {
    pub outcome: ActionOutcome,
    pub reloaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActManyRequest {
    pub ids: Vec<String>,
    #[serde(flatten)]
    pub action: ItemAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActManyResponse {
    pub outcome: BatchOutcome,
    pub reloaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenGroupTabRequest {
    pub group_id: String,
    pub tab_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GetSettingsRequest {
    pub prefers_dark: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveSettingsRequest {
    pub settings: UiSettings,
    #[serde(default)]
    pub prefers_dark: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsResponse {
    pub settings: UiSettings,
    pub appearance: Appearance,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload")]
pub enum CoreRequest {
    Load(LoadRequest),
    Search(SearchRequest),
    Act(ActRequest),
    ActMany(ActManyRequest),
    OpenGroupTab(OpenGroupTabRequest),
    GetSettings(GetSettingsRequest),
    SaveSettings(SaveSettingsRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload")]
pub enum CoreResponse {
    Load(LoadResponse),
    Search(SearchResponse),
    Act(ActResponse),
    ActMany(ActManyResponse),
    OpenGroupTab(ActResponse),
    Settings(SettingsResponse),
}

impl From<SearchableItem> for SearchResultDto {
    fn from(value: SearchableItem) -> Self {
        Self {
            id: value.item_id(),
            source: value.source(),
            title: value.title,
            url: value.url,
            filename: value.filename,
            visit_count: value.visit_count,
            last_visit: value.last_visit,
            usage_status: value.usage_status,
        }
    }
}
