use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{GroupTab, Source, TabGroup};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("{0} source is unavailable: {1}")]
    Unavailable(Source, String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

// Folders have no URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookmarkNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub date_added: Option<i64>,
    pub children: Vec<BookmarkNode>,
}

impl BookmarkNode {
    pub fn folder(id: &str, title: &str, children: Vec<BookmarkNode>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            children,
            ..Self::default()
        }
    }

    pub fn link(id: &str, title: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            url: Some(url.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub visit_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTab {
    pub id: i64,
    pub window_id: i64,
    pub title: String,
    pub url: String,
    pub active: bool,
    pub last_accessed: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawHistoryEntry {
    pub id: String,
    pub url: String,
    pub title: String,
    pub visit_count: u32,
    pub last_visit_time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDownload {
    pub id: i64,
    pub url: String,
    pub filename: String,
    pub start_time: i64,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub text: String,
    pub start_time: i64,
    pub end_time: i64,
    pub max_results: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadQuery {
    pub limit: u32,
    pub newest_first: bool,
}

/// Listing calls feed the normalizer. Action calls default to
/// `Unsupported`, so read-only sources only implement listings.
#[async_trait]
pub trait BrowserSource: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn bookmark_tree(&self) -> Result<Vec<BookmarkNode>, SourceError>;
    async fn url_visits(&self, url: &str) -> Result<Vec<VisitRecord>, SourceError>;
    async fn query_tabs(&self) -> Result<Vec<RawTab>, SourceError>;
    async fn search_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<RawHistoryEntry>, SourceError>;
    async fn search_downloads(
        &self,
        query: &DownloadQuery,
    ) -> Result<Vec<RawDownload>, SourceError>;

    async fn query_tab_groups(&self) -> Result<Vec<TabGroup>, SourceError> {
        Err(SourceError::Unavailable(
            Source::Groups,
            format!("{} does not expose tab groups", self.provider_name()),
        ))
    }

    // Runs once before a bookmark load's visit lookups.
    async fn check_visit_history(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn open_url(&self, _url: &str, _new_tab: bool) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("open url"))
    }
    async fn open_incognito(&self, _url: &str) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("open incognito"))
    }
    async fn copy_to_clipboard(&self, _text: &str) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("copy to clipboard"))
    }
    async fn activate_tab(&self, _tab_id: i64, _window_id: i64) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("activate tab"))
    }
    async fn open_download(&self, _download_id: i64) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("open download"))
    }
    async fn update_bookmark(
        &self,
        _id: &str,
        _title: &str,
        _url: &str,
    ) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("update bookmark"))
    }
    async fn remove_bookmark(&self, _id: &str) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("remove bookmark"))
    }
    async fn close_tab(&self, _tab_id: i64) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("close tab"))
    }
    async fn delete_history_url(&self, _url: &str) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("delete history url"))
    }
    async fn erase_download(&self, _download_id: i64) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("erase download"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSnapshot {
    pub bookmarks: Vec<BookmarkNode>,
    pub visits: HashMap<String, Vec<VisitRecord>>,
    pub tabs: Vec<RawTab>,
    pub groups: Vec<TabGroup>,
    pub history: Vec<RawHistoryEntry>,
    pub downloads: Vec<RawDownload>,
}

impl BrowserSnapshot {
    pub fn from_json_file(path: &Path) -> Result<Self, SourceError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Query(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| SourceError::Query(format!("invalid snapshot {}: {e}", path.display())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    OpenedUrl { url: String, new_tab: bool },
    OpenedIncognito(String),
    ActivatedTab { tab_id: i64, window_id: i64 },
    OpenedDownload(i64),
}

#[derive(Debug, Default)]
struct MemoryState {
    snapshot: BrowserSnapshot,
    failing_sources: HashSet<Source>,
    failing_urls: HashSet<String>,
    visit_history_broken: bool,
    navigations: Vec<Navigation>,
    clipboard: Option<String>,
}

/// In-process browser backed by a [`BrowserSnapshot`]. Supports every
/// action and can be told to fail whole sources or single URL lookups.
#[derive(Debug, Default)]
pub struct MemoryBrowser {
    state: Mutex<MemoryState>,
    in_flight_lookups: AtomicUsize,
    peak_lookups: AtomicUsize,
    total_lookups: AtomicUsize,
}

impl MemoryBrowser {
    pub fn from_snapshot(snapshot: BrowserSnapshot) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                snapshot,
                ..MemoryState::default()
            }),
            ..Self::default()
        }
    }

    pub fn deterministic_fixture(now_ms: i64) -> Self {
        let day = crate::model::DAY_MS;
        let mut visits = HashMap::new();
        visits.insert(
            "https://github.com/".to_string(),
            (1..=50)
                .map(|n| VisitRecord {
                    visit_time: now_ms - day - (50 - n) * 60_000,
                })
                .collect(),
        );
        visits.insert(
            "https://old.example.com/".to_string(),
            (0..4)
                .map(|n| VisitRecord {
                    visit_time: now_ms - 300 * day + n,
                })
                .collect(),
        );

        Self::from_snapshot(BrowserSnapshot {
            bookmarks: vec![BookmarkNode::folder(
                "0",
                "",
                vec![
                    BookmarkNode::folder(
                        "1",
                        "Bookmarks Bar",
                        vec![
                            BookmarkNode::link("10", "GitHub", "https://github.com/"),
                            BookmarkNode::link("11", "Old Site", "https://old.example.com/"),
                        ],
                    ),
                    BookmarkNode::folder(
                        "2",
                        "Other Bookmarks",
                        vec![BookmarkNode::link("20", "Rust Docs", "https://doc.rust-lang.org/")],
                    ),
                ],
            )],
            visits,
            tabs: vec![
                RawTab {
                    id: 7,
                    window_id: 1,
                    title: "Inbox".into(),
                    url: "https://mail.example.com/".into(),
                    active: false,
                    last_accessed: Some(now_ms - 5_000),
                },
                RawTab {
                    id: 8,
                    window_id: 1,
                    title: "Crates".into(),
                    url: "https://crates.io/".into(),
                    active: true,
                    last_accessed: Some(now_ms - 60_000),
                },
            ],
            groups: vec![
                TabGroup {
                    id: "g1".into(),
                    title: "Work".into(),
                    color: "blue".into(),
                    is_open: true,
                    window_id: Some(1),
                    tabs: vec![
                        GroupTab::open(7, 1, "Inbox", "https://mail.example.com/"),
                        GroupTab::open(8, 1, "Crates", "https://crates.io/"),
                    ],
                },
                TabGroup {
                    id: "g2".into(),
                    title: "Reading".into(),
                    color: "green".into(),
                    is_open: false,
                    window_id: None,
                    tabs: vec![
                        GroupTab::saved("Rust Blog", "https://blog.rust-lang.org/"),
                        GroupTab::saved("This Week in Rust", "https://this-week-in-rust.org/"),
                    ],
                },
            ],
            history: vec![RawHistoryEntry {
                id: "h1".into(),
                url: "https://news.example.com/".into(),
                title: "News".into(),
                visit_count: 12,
                last_visit_time: Some(now_ms - 2 * day),
            }],
            downloads: vec![RawDownload {
                id: 31,
                url: "https://example.com/q4.pdf".into(),
                filename: "/home/user/Downloads/Q4_Report.pdf".into(),
                start_time: now_ms - 3 * day,
                file_size: Some(52_000),
            }],
        })
    }

    pub fn fail_source(&self, source: Source) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_sources.insert(source);
        }
    }

    pub fn fail_lookup(&self, url: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_urls.insert(url.to_string());
        }
    }

    pub fn break_visit_history(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.visit_history_broken = true;
        }
    }

    pub fn navigations(&self) -> Vec<Navigation> {
        self.state
            .lock()
            .map(|state| state.navigations.clone())
            .unwrap_or_default()
    }

    pub fn clipboard(&self) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.clipboard.clone())
    }

    pub fn snapshot(&self) -> BrowserSnapshot {
        self.state
            .lock()
            .map(|state| state.snapshot.clone())
            .unwrap_or_default()
    }

    pub fn peak_concurrent_lookups(&self) -> usize {
        self.peak_lookups.load(Ordering::SeqCst)
    }

    pub fn total_lookups(&self) -> usize {
        self.total_lookups.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, SourceError> {
        self.state
            .lock()
            .map_err(|_| SourceError::Query("memory browser state poisoned".to_string()))
    }

    fn listing(&self, source: Source) -> Result<MutexGuard<'_, MemoryState>, SourceError> {
        let state = self.lock()?;
        if state.failing_sources.contains(&source) {
            return Err(SourceError::Unavailable(
                source,
                "listing disabled for this browser".to_string(),
            ));
        }
        Ok(state)
    }
}

#[async_trait]
impl BrowserSource for MemoryBrowser {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn bookmark_tree(&self) -> Result<Vec<BookmarkNode>, SourceError> {
        Ok(self.listing(Source::Bookmarks)?.snapshot.bookmarks.clone())
    }

    async fn url_visits(&self, url: &str) -> Result<Vec<VisitRecord>, SourceError> {
        let current = self.in_flight_lookups.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_lookups.fetch_max(current, Ordering::SeqCst);
        self.total_lookups.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight_lookups.fetch_sub(1, Ordering::SeqCst);

        let state = self.lock()?;
        if state.failing_urls.contains(url) {
            return Err(SourceError::Query(format!("visit lookup failed for {url}")));
        }
        Ok(state.snapshot.visits.get(url).cloned().unwrap_or_default())
    }

    async fn query_tabs(&self) -> Result<Vec<RawTab>, SourceError> {
        Ok(self.listing(Source::Tabs)?.snapshot.tabs.clone())
    }

    async fn query_tab_groups(&self) -> Result<Vec<TabGroup>, SourceError> {
        Ok(self.listing(Source::Groups)?.snapshot.groups.clone())
    }

    async fn check_visit_history(&self) -> Result<(), SourceError> {
        if self.lock()?.visit_history_broken {
            return Err(SourceError::Query("visit history is locked".to_string()));
        }
        Ok(())
    }

    async fn search_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<RawHistoryEntry>, SourceError> {
        let state = self.listing(Source::History)?;
        let text = query.text.to_lowercase();
        Ok(state
            .snapshot
            .history
            .iter()
            .filter(|entry| {
                entry
                    .last_visit_time
                    .is_some_and(|ts| ts >= query.start_time && ts <= query.end_time)
            })
            .filter(|entry| {
                text.is_empty()
                    || entry.url.to_lowercase().contains(&text)
                    || entry.title.to_lowercase().contains(&text)
            })
            .take(query.max_results as usize)
            .cloned()
            .collect())
    }

    async fn search_downloads(
        &self,
        query: &DownloadQuery,
    ) -> Result<Vec<RawDownload>, SourceError> {
        let state = self.listing(Source::Downloads)?;
        let mut downloads = state.snapshot.downloads.clone();
        if query.newest_first {
            downloads.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        }
        downloads.truncate(query.limit as usize);
        Ok(downloads)
    }

    async fn open_url(&self, url: &str, new_tab: bool) -> Result<(), SourceError> {
        self.lock()?.navigations.push(Navigation::OpenedUrl {
            url: url.to_string(),
            new_tab,
        });
        Ok(())
    }

    async fn open_incognito(&self, url: &str) -> Result<(), SourceError> {
        self.lock()?
            .navigations
            .push(Navigation::OpenedIncognito(url.to_string()));
        Ok(())
    }

    async fn copy_to_clipboard(&self, text: &str) -> Result<(), SourceError> {
        self.lock()?.clipboard = Some(text.to_string());
        Ok(())
    }

    async fn activate_tab(&self, tab_id: i64, window_id: i64) -> Result<(), SourceError> {
        let mut state = self.lock()?;
        if !state.snapshot.tabs.iter().any(|tab| tab.id == tab_id) {
            return Err(SourceError::NotFound(format!("tab {tab_id}")));
        }
        for tab in &mut state.snapshot.tabs {
            tab.active = tab.id == tab_id;
        }
        state
            .navigations
            .push(Navigation::ActivatedTab { tab_id, window_id });
        Ok(())
    }

    async fn open_download(&self, download_id: i64) -> Result<(), SourceError> {
        let mut state = self.lock()?;
        if !state
            .snapshot
            .downloads
            .iter()
            .any(|download| download.id == download_id)
        {
            return Err(SourceError::NotFound(format!("download {download_id}")));
        }
        state.navigations.push(Navigation::OpenedDownload(download_id));
        Ok(())
    }

    async fn update_bookmark(
        &self,
        id: &str,
        title: &str,
        url: &str,
    ) -> Result<(), SourceError> {
        let mut state = self.lock()?;
        let node = find_bookmark_mut(&mut state.snapshot.bookmarks, id)
            .ok_or_else(|| SourceError::NotFound(format!("bookmark {id}")))?;
        node.title = title.to_string();
        node.url = Some(url.to_string());
        Ok(())
    }

    async fn remove_bookmark(&self, id: &str) -> Result<(), SourceError> {
        let mut state = self.lock()?;
        if remove_bookmark_node(&mut state.snapshot.bookmarks, id) {
            Ok(())
        } else {
            Err(SourceError::NotFound(format!("bookmark {id}")))
        }
    }

    async fn close_tab(&self, tab_id: i64) -> Result<(), SourceError> {
        let mut state = self.lock()?;
        let before = state.snapshot.tabs.len();
        state.snapshot.tabs.retain(|tab| tab.id != tab_id);
        if state.snapshot.tabs.len() == before {
            return Err(SourceError::NotFound(format!("tab {tab_id}")));
        }
        Ok(())
    }

    async fn delete_history_url(&self, url: &str) -> Result<(), SourceError> {
        let mut state = self.lock()?;
        state.snapshot.history.retain(|entry| entry.url != url);
        state.snapshot.visits.remove(url);
        Ok(())
    }

    async fn erase_download(&self, download_id: i64) -> Result<(), SourceError> {
        let mut state = self.lock()?;
        let before = state.snapshot.downloads.len();
        state
            .snapshot
            .downloads
            .retain(|download| download.id != download_id);
        if state.snapshot.downloads.len() == before {
            return Err(SourceError::NotFound(format!("download {download_id}")));
        }
        Ok(())
    }
}

fn find_bookmark_mut<'a>(
    nodes: &'a mut [BookmarkNode],
    id: &str,
) -> Option<&'a mut BookmarkNode> {
    for node in nodes {
        if node.id == id && node.url.is_some() {
            return Some(node);
        }
        if let Some(found) = find_bookmark_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

fn remove_bookmark_node(nodes: &mut Vec<BookmarkNode>, id: &str) -> bool {
    let before = nodes.len();
    nodes.retain(|node| node.id != id);
    if nodes.len() != before {
        return true;
    }
    nodes
        .iter_mut()
        .any(|node| remove_bookmark_node(&mut node.children, id))
}
