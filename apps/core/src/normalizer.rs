use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::discovery::{
    BookmarkNode, BrowserSource, DownloadQuery, HistoryQuery, RawDownload, RawHistoryEntry,
    RawTab, SourceError, VisitRecord,
};
use crate::model::{
    classify_with, SearchableItem, Source, SourceDetails, TabGroup, UsageThresholds, DAY_MS,
};

pub const LOOKUP_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub now_ms: i64,
    pub lookup_batch_size: usize,
    pub history_window_days: u32,
    pub history_max_results: u32,
    pub download_max_results: u32,
    pub thresholds: UsageThresholds,
}

impl LoadOptions {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms,
            lookup_batch_size: LOOKUP_BATCH_SIZE,
            history_window_days: 30,
            history_max_results: 1000,
            download_max_results: 1000,
            thresholds: UsageThresholds::default(),
        }
    }

    pub fn from_config(config: &Config, now_ms: i64) -> Self {
        Self {
            now_ms,
            lookup_batch_size: config.lookup_batch_size.max(1) as usize,
            history_window_days: config.history_window_days,
            history_max_results: config.history_max_results,
            download_max_results: config.download_max_results,
            thresholds: UsageThresholds {
                rarely_used_max_visits: config.rarely_used_max_visits,
                dormant_days: config.dormant_days,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitStats {
    pub count: u32,
    pub last_visit: Option<i64>,
}

pub async fn load_items(
    browser: Arc<dyn BrowserSource>,
    source: Source,
    options: &LoadOptions,
) -> Vec<SearchableItem> {
    let loaded = match source {
        Source::Bookmarks => load_bookmarks(Arc::clone(&browser), options).await,
        Source::Tabs => load_tabs(browser.as_ref()).await,
        // Groups keep their nested shape and load through `load_groups`.
        Source::Groups => Ok(Vec::new()),
        Source::History => load_history(browser.as_ref(), options).await,
        Source::Downloads => load_downloads(browser.as_ref(), options).await,
    };

    match loaded {
        Ok(items) => {
            info!(
                source = source.as_str(),
                provider = browser.provider_name(),
                count = items.len(),
                "loaded items"
            );
            items
        }
        Err(error) => {
            warn!(
                source = source.as_str(),
                provider = browser.provider_name(),
                %error,
                "source query failed; showing no items"
            );
            Vec::new()
        }
    }
}

pub async fn load_bookmarks(
    browser: Arc<dyn BrowserSource>,
    options: &LoadOptions,
) -> Result<Vec<SearchableItem>, SourceError> {
    let tree = browser.bookmark_tree().await?;
    let leaves = flatten_bookmarks(&tree);
    let stats = match browser.check_visit_history().await {
        Ok(()) => {
            let urls: Vec<String> = leaves
                .iter()
                .map(|leaf| leaf.url.clone().unwrap_or_default())
                .collect();
            lookup_visits(Arc::clone(&browser), &urls, options.lookup_batch_size).await
        }
        Err(error) => {
            warn!(
                provider = browser.provider_name(),
                %error,
                "visit history unreadable; every bookmark counts as unvisited"
            );
            vec![VisitStats::default(); leaves.len()]
        }
    };

    let items = leaves
        .into_iter()
        .zip(stats)
        .map(|(leaf, stats)| normalize_bookmark(leaf, stats, &options.thresholds, options.now_ms))
        .collect();
    Ok(sort_bookmarks(items))
}

pub async fn load_tabs(browser: &dyn BrowserSource) -> Result<Vec<SearchableItem>, SourceError> {
    let mut tabs = browser.query_tabs().await?;
    tabs.sort_by(|a, b| {
        b.active
            .cmp(&a.active)
            .then_with(|| b.last_accessed.unwrap_or(0).cmp(&a.last_accessed.unwrap_or(0)))
    });
    Ok(tabs.into_iter().map(normalize_tab).collect())
}

pub async fn load_groups(browser: &dyn BrowserSource) -> Vec<TabGroup> {
    match browser.query_tab_groups().await {
        Ok(groups) => {
            info!(
                source = Source::Groups.as_str(),
                provider = browser.provider_name(),
                count = groups.len(),
                "loaded groups"
            );
            groups
        }
        Err(error) => {
            warn!(
                source = Source::Groups.as_str(),
                provider = browser.provider_name(),
                %error,
                "source query failed; showing no groups"
            );
            Vec::new()
        }
    }
}

pub async fn load_history(
    browser: &dyn BrowserSource,
    options: &LoadOptions,
) -> Result<Vec<SearchableItem>, SourceError> {
    let query = HistoryQuery {
        text: String::new(),
        start_time: options.now_ms - i64::from(options.history_window_days) * DAY_MS,
        end_time: options.now_ms,
        max_results: options.history_max_results,
    };
    let mut entries = browser.search_history(&query).await?;
    entries.truncate(options.history_max_results as usize);

    let mut items: Vec<SearchableItem> = entries.into_iter().map(normalize_history).collect();
    items.sort_by(|a, b| b.last_visit.unwrap_or(0).cmp(&a.last_visit.unwrap_or(0)));
    Ok(items)
}

pub async fn load_downloads(
    browser: &dyn BrowserSource,
    options: &LoadOptions,
) -> Result<Vec<SearchableItem>, SourceError> {
    let query = DownloadQuery {
        limit: options.download_max_results,
        newest_first: true,
    };
    let mut downloads = browser.search_downloads(&query).await?;
    downloads.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    downloads.truncate(options.download_max_results as usize);
    Ok(downloads.into_iter().map(normalize_download).collect())
}

pub fn flatten_bookmarks(nodes: &[BookmarkNode]) -> Vec<&BookmarkNode> {
    let mut leaves = Vec::new();
    let mut stack: Vec<&BookmarkNode> = nodes.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.url.is_some() {
            leaves.push(node);
        }
        stack.extend(node.children.iter().rev());
    }
    leaves
}

/// Looks up visits for every URL, `batch_size` at a time. Output order
/// matches `urls`; failed lookups come back as zero visits.
pub async fn lookup_visits(
    browser: Arc<dyn BrowserSource>,
    urls: &[String],
    batch_size: usize,
) -> Vec<VisitStats> {
    let mut stats = vec![VisitStats::default(); urls.len()];
    let batch_size = batch_size.max(1);

    for (batch_index, batch) in urls.chunks(batch_size).enumerate() {
        let offset = batch_index * batch_size;
        let mut lookups = JoinSet::new();
        for (position, url) in batch.iter().enumerate() {
            let browser = Arc::clone(&browser);
            let url = url.clone();
            lookups.spawn(async move {
                let visits = browser.url_visits(&url).await;
                (offset + position, url, visits)
            });
        }

        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((index, _, Ok(visits))) => stats[index] = visit_stats(&visits),
                Ok((_, url, Err(error))) => {
                    debug!(%url, %error, "visit lookup failed; treating as unvisited");
                }
                Err(error) => {
                    debug!(%error, "visit lookup task did not complete; treating as unvisited");
                }
            }
        }
    }

    stats
}

pub fn visit_stats(visits: &[VisitRecord]) -> VisitStats {
    VisitStats {
        count: u32::try_from(visits.len()).unwrap_or(u32::MAX),
        last_visit: visits.last().map(|visit| visit.visit_time),
    }
}

pub fn normalize_bookmark(
    node: &BookmarkNode,
    stats: VisitStats,
    thresholds: &UsageThresholds,
    now_ms: i64,
) -> SearchableItem {
    let status = classify_with(thresholds, stats.count, stats.last_visit, now_ms);
    let mut item = SearchableItem::new(SourceDetails::Bookmark {
        id: node.id.clone(),
        parent_id: node.parent_id.clone(),
        date_added: node.date_added,
    })
    .with_title(&node.title)
    .with_usage(stats.count, stats.last_visit)
    .with_usage_status(status);
    item.url = node.url.clone();
    item
}

pub fn normalize_tab(tab: RawTab) -> SearchableItem {
    SearchableItem::new(SourceDetails::Tab {
        id: tab.id,
        window_id: tab.window_id,
        active: tab.active,
    })
    .with_title(&tab.title)
    .with_url(&tab.url)
    .with_usage(1, tab.last_accessed)
}

pub fn normalize_history(entry: RawHistoryEntry) -> SearchableItem {
    SearchableItem::history(&entry.id, &entry.title, &entry.url)
        .with_usage(entry.visit_count, entry.last_visit_time)
}

pub fn normalize_download(download: RawDownload) -> SearchableItem {
    let mut item = SearchableItem::download(download.id, &download.filename, download.start_time);
    if let SourceDetails::Download { file_size, .. } = &mut item.details {
        *file_size = download.file_size;
    }
    if !download.url.is_empty() {
        item.url = Some(download.url);
    }
    item
}

// Most visited first, then most recently visited.
fn sort_bookmarks(mut items: Vec<SearchableItem>) -> Vec<SearchableItem> {
    items.sort_by(|a, b| {
        b.visit_count
            .cmp(&a.visit_count)
            .then_with(|| b.last_visit.unwrap_or(0).cmp(&a.last_visit.unwrap_or(0)))
    });
    items
}
