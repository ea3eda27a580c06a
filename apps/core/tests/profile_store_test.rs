use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection};

use tabseek_core::discovery::{BrowserSource, DownloadQuery, HistoryQuery, SourceError};
use tabseek_core::model::{Source, UsageStatus, DAY_MS};
use tabseek_core::normalizer::{load_items, LoadOptions};
use tabseek_core::profile_store::{
    discover_profiles, epoch_ms_to_webkit, resolve_profile, ChromeProfile,
};

const NOW: i64 = 1_750_000_000_000;

fn write_history(dir: &Path) {
    let db = Connection::open(dir.join("History")).expect("create history db");
    db.execute_batch(
        "CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT, title TEXT,
             visit_count INTEGER, typed_count INTEGER, last_visit_time INTEGER, hidden INTEGER);
         CREATE TABLE visits (id INTEGER PRIMARY KEY, url INTEGER, visit_time INTEGER);
         CREATE TABLE downloads (id INTEGER PRIMARY KEY, target_path TEXT, start_time INTEGER,
             total_bytes INTEGER, tab_url TEXT);",
    )
    .expect("create schema");

    let rows = [
        (1, "https://github.com/", "GitHub", 3, NOW - DAY_MS),
        (2, "https://news.example.com/", "News", 12, NOW - 2 * DAY_MS),
        (3, "https://archive.example.com/", "Archive", 40, NOW - 90 * DAY_MS),
    ];
    for (id, url, title, visits, last) in rows {
        db.execute(
            "INSERT INTO urls (id, url, title, visit_count, typed_count, last_visit_time, hidden)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, 0)",
            params![id, url, title, visits, epoch_ms_to_webkit(last)],
        )
        .expect("insert url");
    }
    for (visit_id, days_ago) in [(1, 3), (2, 2), (3, 1)] {
        db.execute(
            "INSERT INTO visits (id, url, visit_time) VALUES (?1, 1, ?2)",
            params![visit_id, epoch_ms_to_webkit(NOW - days_ago * DAY_MS)],
        )
        .expect("insert visit");
    }
    db.execute(
        "INSERT INTO downloads (id, target_path, start_time, total_bytes, tab_url)
         VALUES (5, '/home/me/Downloads/report.pdf', ?1, 2048, 'https://files.example.com/report')",
        params![epoch_ms_to_webkit(NOW - DAY_MS)],
    )
    .expect("insert download");
}

fn write_bookmarks(dir: &Path) {
    let raw = r#"{
        "roots": {
            "bookmark_bar": {
                "id": "1", "name": "Bookmarks bar", "type": "folder",
                "children": [
                    {"id": "7", "name": "GitHub", "type": "url", "url": "https://github.com/"},
                    {
                        "id": "8", "name": "Unvisited", "type": "url",
                        "url": "https://unvisited.example.com/"
                    }
                ]
            },
            "other": {"id": "2", "name": "Other bookmarks", "type": "folder", "children": []}
        }
    }"#;
    std::fs::write(dir.join("Bookmarks"), raw).expect("write bookmarks");
}

fn profile() -> (tempfile::TempDir, ChromeProfile) {
    let dir = tempfile::tempdir().expect("temp dir");
    write_history(dir.path());
    write_bookmarks(dir.path());
    let profile = ChromeProfile::new(dir.path());
    (dir, profile)
}

#[tokio::test]
async fn visits_come_back_oldest_first_in_epoch_ms() {
    let (_dir, profile) = profile();
    let visits = profile.url_visits("https://github.com/").await.expect("visits");
    let times: Vec<i64> = visits.iter().map(|visit| visit.visit_time).collect();
    assert_eq!(times, vec![NOW - 3 * DAY_MS, NOW - 2 * DAY_MS, NOW - DAY_MS]);
    assert!(profile
        .url_visits("https://unvisited.example.com/")
        .await
        .expect("visits")
        .is_empty());
}

#[tokio::test]
async fn history_search_honors_window_and_limit() {
    let (_dir, profile) = profile();
    let query = HistoryQuery {
        text: String::new(),
        start_time: NOW - 30 * DAY_MS,
        end_time: NOW,
        max_results: 10,
    };
    let entries = profile.search_history(&query).await.expect("history");
    let urls: Vec<&str> = entries.iter().map(|entry| entry.url.as_str()).collect();
    assert_eq!(urls, vec!["https://github.com/", "https://news.example.com/"]);
    assert_eq!(entries[1].visit_count, 12);

    let limited = profile
        .search_history(&HistoryQuery {
            max_results: 1,
            ..query
        })
        .await
        .expect("history");
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn downloads_convert_paths_and_sizes() {
    let (_dir, profile) = profile();
    let downloads = profile
        .search_downloads(&DownloadQuery {
            limit: 10,
            newest_first: true,
        })
        .await
        .expect("downloads");
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].filename, "/home/me/Downloads/report.pdf");
    assert_eq!(downloads[0].start_time, NOW - DAY_MS);
    assert_eq!(downloads[0].file_size, Some(2048));
}

#[tokio::test]
async fn profile_feeds_the_normalizer() {
    let (_dir, profile) = profile();
    let browser: Arc<dyn BrowserSource> = Arc::new(profile);

    let options = LoadOptions::new(NOW);
    let bookmarks = load_items(Arc::clone(&browser), Source::Bookmarks, &options).await;
    assert_eq!(bookmarks.len(), 2);
    assert_eq!(bookmarks[0].item_id(), "7");
    assert_eq!(bookmarks[0].visit_count, 3);
    assert_eq!(bookmarks[0].usage_status, Some(UsageStatus::Active));
    assert_eq!(bookmarks[1].usage_status, Some(UsageStatus::NeverUsed));

    let downloads = load_items(Arc::clone(&browser), Source::Downloads, &options).await;
    assert_eq!(downloads[0].title.as_deref(), Some("report.pdf"));

    assert!(load_items(browser, Source::Tabs, &options).await.is_empty());
}

#[tokio::test]
async fn missing_history_database_is_unavailable() {
    let dir = tempfile::tempdir().expect("temp dir");
    let profile = ChromeProfile::new(dir.path());
    let error = profile
        .url_visits("https://github.com/")
        .await
        .expect_err("no database");
    assert!(matches!(error, SourceError::Unavailable(Source::Bookmarks, _)));
}

#[test]
fn discovers_profile_directories_with_history() {
    let dir = tempfile::tempdir().expect("temp dir");
    for name in ["Default", "Profile 1"] {
        let profile_dir = dir.path().join(name);
        std::fs::create_dir_all(&profile_dir).expect("mkdir");
        std::fs::write(profile_dir.join("History"), b"").expect("touch history");
    }
    std::fs::create_dir_all(dir.path().join("Crashpad")).expect("mkdir");

    let profiles = discover_profiles(dir.path());
    let names: Vec<String> = profiles
        .iter()
        .filter_map(|profile| profile.root().file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["Default", "Profile 1"]);
}

#[tokio::test]
async fn history_connection_is_opened_once_and_shared() {
    let (dir, profile) = profile();
    let shared = profile.clone();
    assert_eq!(profile.url_visits("https://github.com/").await.expect("visits").len(), 3);

    std::fs::remove_file(dir.path().join("History")).expect("remove history");
    let visits = shared
        .url_visits("https://github.com/")
        .await
        .expect("cached connection");
    assert_eq!(visits.len(), 3);
}

#[tokio::test]
async fn unreadable_history_is_checked_once_per_bookmark_load() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_bookmarks(dir.path());
    std::fs::write(dir.path().join("History"), b"not a database").expect("write history");
    let profile = ChromeProfile::new(dir.path());

    let error = profile
        .check_visit_history()
        .await
        .expect_err("garbage history");
    assert!(matches!(error, SourceError::Query(_)));

    let browser: Arc<dyn BrowserSource> = Arc::new(profile);
    let bookmarks = load_items(browser, Source::Bookmarks, &LoadOptions::new(NOW)).await;
    assert_eq!(bookmarks.len(), 2);
    assert!(bookmarks
        .iter()
        .all(|item| item.usage_status == Some(UsageStatus::NeverUsed)));
}

#[test]
fn user_data_directory_resolves_to_default_profile() {
    let dir = tempfile::tempdir().expect("temp dir");
    for name in ["Profile 1", "Default"] {
        let profile_dir = dir.path().join(name);
        std::fs::create_dir_all(&profile_dir).expect("mkdir");
        write_history(&profile_dir);
    }

    let profile = resolve_profile(dir.path()).expect("default profile");
    assert_eq!(profile.root(), dir.path().join("Default"));
}

#[test]
fn profile_directory_resolves_to_itself() {
    let (dir, _) = profile();
    let profile = resolve_profile(dir.path()).expect("profile");
    assert_eq!(profile.root(), dir.path());

    let only_other = tempfile::tempdir().expect("temp dir");
    let other = only_other.path().join("Profile 2");
    std::fs::create_dir_all(&other).expect("mkdir");
    write_history(&other);
    let profile = resolve_profile(only_other.path()).expect("first profile");
    assert_eq!(profile.root(), other);

    let empty = tempfile::tempdir().expect("temp dir");
    assert!(resolve_profile(empty.path()).is_none());
}
