use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub const DAY_MS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    #[default]
    Bookmarks,
    Tabs,
    Groups,
    History,
    Downloads,
}

impl Source {
    pub const ALL: [Source; 5] = [
        Source::Bookmarks,
        Source::Tabs,
        Source::Groups,
        Source::History,
        Source::Downloads,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bookmarks" | "bookmark" => Some(Self::Bookmarks),
            "tabs" | "tab" => Some(Self::Tabs),
            "groups" | "group" => Some(Self::Groups),
            "history" => Some(Self::History),
            "downloads" | "download" => Some(Self::Downloads),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bookmarks => "bookmarks",
            Self::Tabs => "tabs",
            Self::Groups => "groups",
            Self::History => "history",
            Self::Downloads => "downloads",
        }
    }

    pub fn next(self) -> Self {
        let index = self.index();
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        let index = self.index();
        Self::ALL[(index + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|candidate| *candidate == self)
            .unwrap_or(0)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    NeverUsed,
    RarelyUsed,
    Dormant,
    Active,
}

impl UsageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NeverUsed => "never_used",
            Self::RarelyUsed => "rarely_used",
            Self::Dormant => "dormant",
            Self::Active => "active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageThresholds {
    pub rarely_used_max_visits: u32,
    pub dormant_days: u32,
}

impl Default for UsageThresholds {
    fn default() -> Self {
        Self {
            rarely_used_max_visits: 2,
            dormant_days: 180,
        }
    }
}

pub fn classify(visit_count: u32, last_visit: Option<i64>, now_ms: i64) -> UsageStatus {
    classify_with(&UsageThresholds::default(), visit_count, last_visit, now_ms)
}

pub fn classify_with(
    thresholds: &UsageThresholds,
    visit_count: u32,
    last_visit: Option<i64>,
    now_ms: i64,
) -> UsageStatus {
    if visit_count == 0 {
        return UsageStatus::NeverUsed;
    }
    if visit_count <= thresholds.rarely_used_max_visits {
        return UsageStatus::RarelyUsed;
    }
    if let Some(last_visit) = last_visit.filter(|ts| *ts != 0) {
        let dormant_after = i64::from(thresholds.dormant_days) * DAY_MS;
        if now_ms.saturating_sub(last_visit) > dormant_after {
            return UsageStatus::Dormant;
        }
    }
    UsageStatus::Active
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SourceDetails {
    Bookmark {
        id: String,
        #[serde(default)]
        parent_id: Option<String>,
        #[serde(default)]
        date_added: Option<i64>,
    },
    Tab {
        id: i64,
        window_id: i64,
        #[serde(default)]
        active: bool,
    },
    History {
        id: String,
    },
    Download {
        id: i64,
        start_time: i64,
        #[serde(default)]
        file_size: Option<u64>,
    },
}

impl SourceDetails {
    pub fn source(&self) -> Source {
        match self {
            Self::Bookmark { .. } => Source::Bookmarks,
            Self::Tab { .. } => Source::Tabs,
            Self::History { .. } => Source::History,
            Self::Download { .. } => Source::Downloads,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupTab {
    pub id: Option<i64>,
    pub window_id: Option<i64>,
    pub title: String,
    pub url: String,
}

impl GroupTab {
    pub fn saved(title: &str, url: &str) -> Self {
        Self {
            title: title.to_string(),
            url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn open(id: i64, window_id: i64, title: &str, url: &str) -> Self {
        Self {
            id: Some(id),
            window_id: Some(window_id),
            ..Self::saved(title, url)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabGroup {
    pub id: String,
    pub title: String,
    pub color: String,
    pub is_open: bool,
    pub window_id: Option<i64>,
    pub tabs: Vec<GroupTab>,
}

impl Default for TabGroup {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            color: "grey".to_string(),
            is_open: false,
            window_id: None,
            tabs: Vec::new(),
        }
    }
}

impl TabGroup {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Unnamed group"
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchableItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub visit_count: u32,
    #[serde(default)]
    pub last_visit: Option<i64>,
    #[serde(default)]
    pub usage_status: Option<UsageStatus>,
    pub details: SourceDetails,
}

impl SearchableItem {
    pub fn new(details: SourceDetails) -> Self {
        Self {
            title: None,
            url: None,
            filename: None,
            visit_count: 0,
            last_visit: None,
            usage_status: None,
            details,
        }
    }

    pub fn bookmark(id: &str, title: &str, url: &str) -> Self {
        Self::new(SourceDetails::Bookmark {
            id: id.to_string(),
            parent_id: None,
            date_added: None,
        })
        .with_title(title)
        .with_url(url)
    }

    pub fn tab(id: i64, window_id: i64, title: &str, url: &str) -> Self {
        Self::new(SourceDetails::Tab {
            id,
            window_id,
            active: false,
        })
        .with_title(title)
        .with_url(url)
        .with_usage(1, None)
    }

    pub fn history(id: &str, title: &str, url: &str) -> Self {
        Self::new(SourceDetails::History { id: id.to_string() })
            .with_title(title)
            .with_url(url)
    }

    pub fn download(id: i64, path: &str, start_time: i64) -> Self {
        let mut item = Self::new(SourceDetails::Download {
            id,
            start_time,
            file_size: None,
        })
        .with_filename(path)
        .with_usage(1, Some(start_time));
        item.title = display_name_from_path(path);
        item
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }

    pub fn with_usage(mut self, visit_count: u32, last_visit: Option<i64>) -> Self {
        self.visit_count = visit_count;
        self.last_visit = last_visit;
        self
    }

    pub fn with_usage_status(mut self, status: UsageStatus) -> Self {
        self.usage_status = Some(status);
        self
    }

    pub fn source(&self) -> Source {
        self.details.source()
    }

    pub fn item_id(&self) -> String {
        match &self.details {
            SourceDetails::Bookmark { id, .. } | SourceDetails::History { id } => id.clone(),
            SourceDetails::Tab { id, .. } | SourceDetails::Download { id, .. } => id.to_string(),
        }
    }

    pub fn start_time(&self) -> Option<i64> {
        match &self.details {
            SourceDetails::Download { start_time, .. } => Some(*start_time),
            _ => None,
        }
    }

    pub fn date_added(&self) -> Option<i64> {
        match &self.details {
            SourceDetails::Bookmark { date_added, .. } => *date_added,
            _ => None,
        }
    }

    pub fn activity_timestamp(&self) -> i64 {
        first_present(&[self.last_visit, self.start_time()])
    }

    pub fn ranking_timestamp(&self) -> i64 {
        first_present(&[self.last_visit, self.start_time(), self.date_added()])
    }

    pub fn title_or_url(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.is_empty())
            .or(self.url.as_deref())
            .unwrap_or_default()
    }
}

// Zero timestamps count as absent.
fn first_present(candidates: &[Option<i64>]) -> i64 {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|ts| *ts != 0)
        .unwrap_or(0)
}

pub fn display_name_from_path(path: &str) -> Option<String> {
    path.rsplit(|c| c == '/' || c == '\\')
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
