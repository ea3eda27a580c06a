use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::discovery::{
    BookmarkNode, BrowserSource, DownloadQuery, HistoryQuery, RawDownload, RawHistoryEntry,
    RawTab, SourceError, VisitRecord,
};
use crate::model::Source;

const WEBKIT_EPOCH_OFFSET_MS: i64 = 11_644_473_600_000;

pub const HISTORY_FILE: &str = "History";
pub const BOOKMARKS_FILE: &str = "Bookmarks";
pub const DEFAULT_PROFILE: &str = "Default";

// Chromium timestamps are microseconds since 1601; zero means unset.
pub fn webkit_to_epoch_ms(webkit_us: i64) -> Option<i64> {
    if webkit_us <= 0 {
        return None;
    }
    Some(webkit_us / 1000 - WEBKIT_EPOCH_OFFSET_MS)
}

pub fn epoch_ms_to_webkit(epoch_ms: i64) -> i64 {
    (epoch_ms + WEBKIT_EPOCH_OFFSET_MS) * 1000
}

// Open tabs and tab groups are not readable from a profile directory. One
// history connection is shared by every clone of a profile.
#[derive(Debug, Clone)]
pub struct ChromeProfile {
    root: PathBuf,
    history: Arc<Mutex<Option<Connection>>>,
}

impl ChromeProfile {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            history: Arc::new(Mutex::new(None)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    pub fn bookmarks_path(&self) -> PathBuf {
        self.root.join(BOOKMARKS_FILE)
    }

    async fn with_history<T, F>(&self, source: Source, work: F) -> Result<T, SourceError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let path = self.history_path();
        let history = Arc::clone(&self.history);
        tokio::task::spawn_blocking(move || {
            let mut cached = history
                .lock()
                .map_err(|_| SourceError::Query("history connection poisoned".to_string()))?;
            if cached.is_none() {
                *cached = Some(open_history(&path, source)?);
            }
            let Some(conn) = cached.as_ref() else {
                return Err(SourceError::Unavailable(source, "history not open".to_string()));
            };
            work(conn).map_err(|e| SourceError::Query(e.to_string()))
        })
        .await
        .map_err(|e| SourceError::Query(format!("history worker failed: {e}")))?
    }
}

pub fn discover_profiles(user_data_dir: &Path) -> Vec<ChromeProfile> {
    let mut profiles: Vec<ChromeProfile> = WalkDir::new(user_data_dir)
        .max_depth(2)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == HISTORY_FILE)
        .filter_map(|entry| entry.path().parent().map(ChromeProfile::new))
        .collect();
    profiles.sort_by(|a, b| a.root.cmp(&b.root));
    profiles
}

/// `dir` itself when it is a profile, otherwise its `Default` profile, or
/// the first profile found beneath it.
pub fn resolve_profile(dir: &Path) -> Option<ChromeProfile> {
    if dir.join(HISTORY_FILE).is_file() || dir.join(BOOKMARKS_FILE).is_file() {
        return Some(ChromeProfile::new(dir));
    }
    let mut profiles = discover_profiles(dir);
    let default = profiles
        .iter()
        .position(|profile| profile.root.file_name() == Some(OsStr::new(DEFAULT_PROFILE)));
    match default {
        Some(index) => Some(profiles.swap_remove(index)),
        None => profiles.into_iter().next(),
    }
}

fn open_history(path: &Path, source: Source) -> Result<Connection, SourceError> {
    if !path.is_file() {
        return Err(SourceError::Unavailable(
            source,
            format!("missing {}", path.display()),
        ));
    }
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| SourceError::Unavailable(source, e.to_string()))
}

#[derive(Debug, Deserialize)]
struct BookmarksFile {
    roots: BookmarkRoots,
}

#[derive(Debug, Deserialize)]
struct BookmarkRoots {
    bookmark_bar: Option<StoredBookmark>,
    other: Option<StoredBookmark>,
    synced: Option<StoredBookmark>,
}

#[derive(Debug, Deserialize)]
struct StoredBookmark {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    date_added: Option<String>,
    #[serde(default)]
    children: Vec<StoredBookmark>,
}

impl StoredBookmark {
    fn into_node(self, parent_id: Option<&str>) -> BookmarkNode {
        let id = self.id;
        let children = self
            .children
            .into_iter()
            .map(|child| child.into_node(Some(&id)))
            .collect();
        BookmarkNode {
            parent_id: parent_id.map(str::to_string),
            title: self.name,
            url: self.url,
            date_added: self
                .date_added
                .and_then(|raw| raw.parse::<i64>().ok())
                .and_then(webkit_to_epoch_ms),
            children,
            id,
        }
    }
}

pub fn parse_bookmarks(raw: &str) -> Result<Vec<BookmarkNode>, SourceError> {
    let file: BookmarksFile = serde_json::from_str(raw)
        .map_err(|e| SourceError::Query(format!("invalid bookmarks file: {e}")))?;
    let roots = file.roots;
    Ok([roots.bookmark_bar, roots.other, roots.synced]
        .into_iter()
        .flatten()
        .map(|root| root.into_node(None))
        .collect())
}

#[async_trait]
impl BrowserSource for ChromeProfile {
    fn provider_name(&self) -> &'static str {
        "chrome-profile"
    }

    async fn bookmark_tree(&self) -> Result<Vec<BookmarkNode>, SourceError> {
        let path = self.bookmarks_path();
        let raw = tokio::task::spawn_blocking(move || std::fs::read_to_string(&path))
            .await
            .map_err(|e| SourceError::Query(format!("bookmarks worker failed: {e}")))?
            .map_err(|e| SourceError::Unavailable(Source::Bookmarks, e.to_string()))?;
        parse_bookmarks(&raw)
    }

    async fn url_visits(&self, url: &str) -> Result<Vec<VisitRecord>, SourceError> {
        let url = url.to_string();
        self.with_history(Source::Bookmarks, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT v.visit_time FROM visits v JOIN urls u ON v.url = u.id
                 WHERE u.url = ?1 ORDER BY v.visit_time ASC",
            )?;
            let rows = stmt.query_map(params![url], |row| row.get::<_, i64>(0))?;
            let mut visits = Vec::new();
            for row in rows {
                if let Some(visit_time) = webkit_to_epoch_ms(row?) {
                    visits.push(VisitRecord { visit_time });
                }
            }
            Ok(visits)
        })
        .await
    }

    async fn check_visit_history(&self) -> Result<(), SourceError> {
        self.with_history(Source::Bookmarks, |conn| {
            conn.prepare("SELECT 1 FROM visits LIMIT 1")?.exists([])?;
            Ok(())
        })
        .await
    }

    async fn query_tabs(&self) -> Result<Vec<RawTab>, SourceError> {
        Err(SourceError::Unavailable(
            Source::Tabs,
            "open tabs are not readable from a profile directory".to_string(),
        ))
    }

    async fn search_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<RawHistoryEntry>, SourceError> {
        let pattern = format!("%{}%", query.text);
        let start = epoch_ms_to_webkit(query.start_time);
        let end = epoch_ms_to_webkit(query.end_time);
        let limit = i64::from(query.max_results);
        self.with_history(Source::History, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, url, title, visit_count, last_visit_time FROM urls
                 WHERE hidden = 0 AND last_visit_time BETWEEN ?1 AND ?2
                   AND (url LIKE ?3 OR title LIKE ?3)
                 ORDER BY last_visit_time DESC LIMIT ?4",
            )?;
            let rows = stmt.query_map(params![start, end, pattern, limit], |row| {
                Ok(RawHistoryEntry {
                    id: row.get::<_, i64>(0)?.to_string(),
                    url: row.get(1)?,
                    title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    visit_count: row.get::<_, i64>(3)?.clamp(0, i64::from(u32::MAX)) as u32,
                    last_visit_time: webkit_to_epoch_ms(row.get(4)?),
                })
            })?;
            let entries = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
    }

    async fn search_downloads(
        &self,
        query: &DownloadQuery,
    ) -> Result<Vec<RawDownload>, SourceError> {
        let order = if query.newest_first { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT id, target_path, start_time, total_bytes, tab_url FROM downloads
             ORDER BY start_time {order} LIMIT ?1"
        );
        let limit = i64::from(query.limit);
        self.with_history(Source::Downloads, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(RawDownload {
                    id: row.get(0)?,
                    filename: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    start_time: webkit_to_epoch_ms(row.get(2)?).unwrap_or(0),
                    file_size: row
                        .get::<_, Option<i64>>(3)?
                        .and_then(|bytes| u64::try_from(bytes).ok()),
                    url: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                })
            })?;
            let entries = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
    }
}
