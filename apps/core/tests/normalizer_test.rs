use std::collections::HashMap;
use std::sync::Arc;

use tabseek_core::discovery::{
    BookmarkNode, BrowserSnapshot, BrowserSource, MemoryBrowser, RawDownload, RawHistoryEntry,
    RawTab, VisitRecord,
};
use tabseek_core::model::{Source, SourceDetails, UsageStatus, DAY_MS};
use tabseek_core::normalizer::{
    load_groups, load_items, lookup_visits, LoadOptions, LOOKUP_BATCH_SIZE,
};

const NOW: i64 = 1_750_000_000_000;

fn visits(times: &[i64]) -> Vec<VisitRecord> {
    times
        .iter()
        .map(|visit_time| VisitRecord {
            visit_time: *visit_time,
        })
        .collect()
}

fn many_bookmarks(count: usize) -> BrowserSnapshot {
    let links = (0..count)
        .map(|i| {
            let url = format!("https://l{i}.example.com/");
            BookmarkNode::link(&i.to_string(), &format!("Link {i}"), &url)
        })
        .collect();
    BrowserSnapshot {
        bookmarks: vec![BookmarkNode::folder("0", "root", links)],
        ..BrowserSnapshot::default()
    }
}

#[tokio::test]
async fn bookmark_lookups_never_exceed_one_batch_in_flight() {
    let browser = Arc::new(MemoryBrowser::from_snapshot(many_bookmarks(130)));
    let items = load_items(browser.clone(), Source::Bookmarks, &LoadOptions::new(NOW)).await;

    assert_eq!(items.len(), 130);
    assert_eq!(browser.total_lookups(), 130);
    assert!(browser.peak_concurrent_lookups() <= LOOKUP_BATCH_SIZE);
    assert!(browser.peak_concurrent_lookups() >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batch_limit_holds_on_a_multi_threaded_runtime() {
    let browser = Arc::new(MemoryBrowser::from_snapshot(many_bookmarks(260)));
    let urls: Vec<String> = (0..260).map(|i| format!("https://l{i}.example.com/")).collect();

    let stats = lookup_visits(browser.clone(), &urls, 20).await;

    assert_eq!(stats.len(), 260);
    assert!(browser.peak_concurrent_lookups() <= 20);
}

#[tokio::test]
async fn bookmarks_get_visit_stats_status_and_sort() {
    let mut visit_map = HashMap::new();
    visit_map.insert(
        "https://busy.example.com/".to_string(),
        visits(&[NOW - 3 * DAY_MS, NOW - 2 * DAY_MS, NOW - DAY_MS]),
    );
    visit_map.insert(
        "https://stale.example.com/".to_string(),
        visits(&[NOW - 400 * DAY_MS, NOW - 300 * DAY_MS, NOW - 250 * DAY_MS, NOW - 200 * DAY_MS]),
    );
    visit_map.insert("https://once.example.com/".to_string(), visits(&[NOW - DAY_MS]));

    let browser = Arc::new(MemoryBrowser::from_snapshot(BrowserSnapshot {
        bookmarks: vec![BookmarkNode::folder(
            "0",
            "",
            vec![
                BookmarkNode::link("never", "Never", "https://never.example.com/"),
                BookmarkNode::link("once", "Once", "https://once.example.com/"),
                BookmarkNode::folder(
                    "f",
                    "Folder",
                    vec![
                        BookmarkNode::link("busy", "Busy", "https://busy.example.com/"),
                        BookmarkNode::link("stale", "Stale", "https://stale.example.com/"),
                    ],
                ),
            ],
        )],
        visits: visit_map,
        ..BrowserSnapshot::default()
    }));

    let items = load_items(browser, Source::Bookmarks, &LoadOptions::new(NOW)).await;
    let summary: Vec<(String, u32, Option<UsageStatus>)> = items
        .iter()
        .map(|item| (item.item_id(), item.visit_count, item.usage_status))
        .collect();

    assert_eq!(
        summary,
        vec![
            ("stale".to_string(), 4, Some(UsageStatus::Dormant)),
            ("busy".to_string(), 3, Some(UsageStatus::Active)),
            ("once".to_string(), 1, Some(UsageStatus::RarelyUsed)),
            ("never".to_string(), 0, Some(UsageStatus::NeverUsed)),
        ]
    );
    assert_eq!(items[1].last_visit, Some(NOW - DAY_MS));
    assert!(matches!(
        &items[1].details,
        SourceDetails::Bookmark { parent_id: None, .. }
    ));
}

#[tokio::test]
async fn failed_lookup_defaults_to_unvisited() {
    let mut snapshot = many_bookmarks(3);
    snapshot
        .visits
        .insert("https://l1.example.com/".to_string(), visits(&[NOW - DAY_MS; 5]));
    snapshot
        .visits
        .insert("https://l2.example.com/".to_string(), visits(&[NOW - DAY_MS; 4]));
    let browser = Arc::new(MemoryBrowser::from_snapshot(snapshot));
    browser.fail_lookup("https://l1.example.com/");

    let items = load_items(browser, Source::Bookmarks, &LoadOptions::new(NOW)).await;

    assert_eq!(items.len(), 3);
    let failed = items
        .iter()
        .find(|item| item.item_id() == "1")
        .expect("failed bookmark is still listed");
    assert_eq!(failed.visit_count, 0);
    assert_eq!(failed.last_visit, None);
    assert_eq!(failed.usage_status, Some(UsageStatus::NeverUsed));
    assert_eq!(items[0].item_id(), "2");
}

#[tokio::test]
async fn unreadable_visit_history_skips_every_lookup() {
    let mut snapshot = many_bookmarks(4);
    snapshot
        .visits
        .insert("https://l2.example.com/".to_string(), visits(&[NOW - DAY_MS; 4]));
    let browser = Arc::new(MemoryBrowser::from_snapshot(snapshot));
    browser.break_visit_history();

    let items = load_items(browser.clone(), Source::Bookmarks, &LoadOptions::new(NOW)).await;

    assert_eq!(items.len(), 4);
    assert_eq!(browser.total_lookups(), 0);
    assert!(items
        .iter()
        .all(|item| item.usage_status == Some(UsageStatus::NeverUsed)));
}

#[tokio::test]
async fn groups_load_separately_from_items() {
    let browser = Arc::new(MemoryBrowser::deterministic_fixture(NOW));

    let groups = load_groups(browser.as_ref()).await;
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[1].title, "Reading");
    assert!(load_items(browser.clone(), Source::Groups, &LoadOptions::new(NOW))
        .await
        .is_empty());

    browser.fail_source(Source::Groups);
    assert!(load_groups(browser.as_ref()).await.is_empty());
}

#[tokio::test]
async fn failing_source_yields_empty_list() {
    let browser = Arc::new(MemoryBrowser::deterministic_fixture(NOW));
    browser.fail_source(Source::History);

    let history = load_items(browser.clone(), Source::History, &LoadOptions::new(NOW)).await;
    assert!(history.is_empty());

    let tabs = load_items(browser, Source::Tabs, &LoadOptions::new(NOW)).await;
    assert_eq!(tabs.len(), 2);
}

#[tokio::test]
async fn tabs_put_active_first_then_most_recent() {
    let tab = |id: i64, active: bool, last_accessed: Option<i64>| RawTab {
        id,
        window_id: 1,
        title: format!("Tab {id}"),
        url: format!("https://t{id}.example.com/"),
        active,
        last_accessed,
    };
    let browser: Arc<dyn BrowserSource> = Arc::new(MemoryBrowser::from_snapshot(BrowserSnapshot {
        tabs: vec![
            tab(1, false, Some(NOW - 1000)),
            tab(2, false, None),
            tab(3, true, Some(NOW - 50_000)),
            tab(4, false, Some(NOW - 10)),
        ],
        ..BrowserSnapshot::default()
    }));

    let items = load_items(browser, Source::Tabs, &LoadOptions::new(NOW)).await;
    let order: Vec<String> = items.iter().map(|item| item.item_id()).collect();
    assert_eq!(order, vec!["3", "4", "1", "2"]);
    assert!(items.iter().all(|item| item.visit_count == 1));
    assert_eq!(items[1].last_visit, Some(NOW - 10));
}

#[tokio::test]
async fn history_is_windowed_capped_and_sorted() {
    let entry = |id: &str, days_ago: i64, visits: u32| RawHistoryEntry {
        id: id.to_string(),
        url: format!("https://{id}.example.com/"),
        title: id.to_uppercase(),
        visit_count: visits,
        last_visit_time: Some(NOW - days_ago * DAY_MS),
    };
    let browser = Arc::new(MemoryBrowser::from_snapshot(BrowserSnapshot {
        history: vec![
            entry("older", 20, 4),
            entry("ancient", 45, 90),
            entry("recent", 1, 2),
            entry("middle", 10, 7),
        ],
        ..BrowserSnapshot::default()
    }));

    let items = load_items(browser.clone(), Source::History, &LoadOptions::new(NOW)).await;
    let order: Vec<String> = items.iter().map(|item| item.item_id()).collect();
    assert_eq!(order, vec!["recent", "middle", "older"]);
    assert_eq!(items[1].visit_count, 7);
    assert_eq!(items[0].usage_status, None);

    let capped = LoadOptions {
        history_max_results: 2,
        ..LoadOptions::new(NOW)
    };
    assert_eq!(load_items(browser, Source::History, &capped).await.len(), 2);
}

#[tokio::test]
async fn downloads_are_newest_first_with_basename_titles() {
    let download = |id: i64, filename: &str, start_time: i64| RawDownload {
        id,
        url: format!("https://files.example.com/{id}"),
        filename: filename.to_string(),
        start_time,
        file_size: Some(1024),
    };
    let browser = Arc::new(MemoryBrowser::from_snapshot(BrowserSnapshot {
        downloads: vec![
            download(1, "C:\\Users\\me\\Downloads\\setup.exe", NOW - 5 * DAY_MS),
            download(2, "/home/me/Downloads/notes.txt", NOW - DAY_MS),
        ],
        ..BrowserSnapshot::default()
    }));

    let items = load_items(browser, Source::Downloads, &LoadOptions::new(NOW)).await;

    assert_eq!(items[0].title.as_deref(), Some("notes.txt"));
    assert_eq!(items[1].title.as_deref(), Some("setup.exe"));
    assert_eq!(items[1].filename.as_deref(), Some("C:\\Users\\me\\Downloads\\setup.exe"));
    assert_eq!(items[0].visit_count, 1);
    assert_eq!(items[0].last_visit, Some(NOW - DAY_MS));
    assert_eq!(items[0].url.as_deref(), Some("https://files.example.com/2"));
    assert!(matches!(
        items[0].details,
        SourceDetails::Download {
            file_size: Some(1024),
            ..
        }
    ));
}
