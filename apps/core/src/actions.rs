use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::discovery::{BrowserSource, SourceError};
use crate::model::{SearchableItem, Source, SourceDetails, TabGroup};

const MESSAGE_TITLE_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ItemAction {
    Open {
        #[serde(default)]
        new_tab: bool,
    },
    OpenIncognito,
    CopyLink,
    Edit {
        title: String,
        url: String,
    },
    Delete,
}

impl ItemAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::OpenIncognito => "open_incognito",
            Self::CopyLink => "copy_link",
            Self::Edit { .. } => "edit",
            Self::Delete => "delete",
        }
    }

    pub fn requires_reload(&self) -> bool {
        matches!(self, Self::Edit { .. } | Self::Delete)
    }

    // One title and URL cannot be applied to several items.
    pub fn is_batchable(&self) -> bool {
        !matches!(self, Self::Edit { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("title is required")]
    EmptyTitle,
    #[error("url is required")]
    EmptyUrl,
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
    #[error("item has no url")]
    MissingUrl,
    #[error("{action} is not supported for {origin}")]
    Unsupported { action: &'static str, origin: Source },
    #[error("group has no tab at position {0}")]
    NoSuchGroupTab(usize),
    #[error(transparent)]
    Source(#[from] SourceError),
}

pub fn validate_edit(title: &str, url: &str) -> Result<(String, String), ActionError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ActionError::EmptyTitle);
    }
    let url = url.trim();
    if url.is_empty() {
        return Err(ActionError::EmptyUrl);
    }
    Url::parse(url).map_err(|_| ActionError::InvalidUrl(url.to_string()))?;
    Ok((title.to_string(), url.to_string()))
}

pub async fn execute(
    browser: &dyn BrowserSource,
    item: &SearchableItem,
    action: &ItemAction,
) -> Result<(), ActionError> {
    match (&item.details, action) {
        (SourceDetails::Tab { id, window_id, .. }, ItemAction::Open { new_tab: false }) => {
            browser.activate_tab(*id, *window_id).await?;
        }
        (SourceDetails::Download { id, .. }, ItemAction::Open { .. }) => {
            browser.open_download(*id).await?;
        }
        (_, ItemAction::Open { new_tab }) => {
            browser.open_url(item_url(item)?, *new_tab).await?;
        }
        (_, ItemAction::OpenIncognito) => {
            browser.open_incognito(item_url(item)?).await?;
        }
        (_, ItemAction::CopyLink) => {
            browser.copy_to_clipboard(item_url(item)?).await?;
        }
        (SourceDetails::Bookmark { id, .. }, ItemAction::Edit { title, url }) => {
            let (title, url) = validate_edit(title, url)?;
            browser.update_bookmark(id, &title, &url).await?;
        }
        (_, ItemAction::Edit { .. }) => {
            return Err(ActionError::Unsupported {
                action: action.name(),
                origin: item.source(),
            });
        }
        (SourceDetails::Bookmark { id, .. }, ItemAction::Delete) => {
            browser.remove_bookmark(id).await?;
        }
        (SourceDetails::Tab { id, .. }, ItemAction::Delete) => {
            browser.close_tab(*id).await?;
        }
        (SourceDetails::History { .. }, ItemAction::Delete) => {
            browser.delete_history_url(item_url(item)?).await?;
        }
        (SourceDetails::Download { id, .. }, ItemAction::Delete) => {
            browser.erase_download(*id).await?;
        }
    }
    Ok(())
}

pub async fn perform(
    browser: &dyn BrowserSource,
    item: &SearchableItem,
    action: &ItemAction,
) -> ActionOutcome {
    let label = display_title(item.title_or_url());
    match execute(browser, item, action).await {
        Ok(()) => {
            info!(
                action = action.name(),
                source = item.source().as_str(),
                id = %item.item_id(),
                "action completed"
            );
            ActionOutcome::ok(success_message(item.source(), action, &label))
        }
        Err(error) => {
            warn!(
                action = action.name(),
                source = item.source().as_str(),
                id = %item.item_id(),
                %error,
                "action failed"
            );
            ActionOutcome::failed(format!("{} failed for '{label}': {error}", action.name()))
        }
    }
}

/// Applies `action` to every item in order. Copying links writes one
/// newline-separated clipboard entry instead of one entry per item.
pub async fn perform_many(
    browser: &dyn BrowserSource,
    items: &[SearchableItem],
    action: &ItemAction,
) -> BatchOutcome {
    if !action.is_batchable() {
        return BatchOutcome {
            succeeded: 0,
            failed: items.len(),
            message: format!("{} cannot be applied to several items", action.name()),
        };
    }
    if matches!(action, ItemAction::CopyLink) {
        return copy_links(browser, items).await;
    }

    let mut succeeded = 0;
    for item in items {
        if perform(browser, item, action).await.success {
            succeeded += 1;
        }
    }
    let failed = items.len() - succeeded;
    info!(action = action.name(), succeeded, failed, "batch action finished");
    BatchOutcome {
        succeeded,
        failed,
        message: format!("{} succeeded for {succeeded} of {} items", action.name(), items.len()),
    }
}

async fn copy_links(browser: &dyn BrowserSource, items: &[SearchableItem]) -> BatchOutcome {
    let links: Vec<&str> = items.iter().filter_map(|item| item_url(item).ok()).collect();
    let skipped = items.len() - links.len();
    if links.is_empty() {
        return BatchOutcome {
            succeeded: 0,
            failed: skipped,
            message: "No links to copy".to_string(),
        };
    }

    match browser.copy_to_clipboard(&links.join("\n")).await {
        Ok(()) => BatchOutcome {
            succeeded: links.len(),
            failed: skipped,
            message: format!("Copied {} links", links.len()),
        },
        Err(error) => {
            warn!(%error, "copying links failed");
            BatchOutcome {
                succeeded: 0,
                failed: items.len(),
                message: format!("copy_link failed: {error}"),
            }
        }
    }
}

/// Opens the tab at `tab_index` of `group`. A tab of an open group is
/// focused. A tab of a saved group either reopens the whole group or only
/// itself, depending on `restore_all`.
pub async fn open_group_tab(
    browser: &dyn BrowserSource,
    group: &TabGroup,
    tab_index: usize,
    restore_all: bool,
) -> ActionOutcome {
    match open_group_tab_inner(browser, group, tab_index, restore_all).await {
        Ok(message) => {
            info!(group = %group.id, tab_index, restore_all, "group tab opened");
            ActionOutcome::ok(message)
        }
        Err(error) => {
            warn!(group = %group.id, tab_index, %error, "group tab failed to open");
            ActionOutcome::failed(format!(
                "open failed for group '{}': {error}",
                display_title(group.display_title())
            ))
        }
    }
}

async fn open_group_tab_inner(
    browser: &dyn BrowserSource,
    group: &TabGroup,
    tab_index: usize,
    restore_all: bool,
) -> Result<String, ActionError> {
    let tab = group
        .tabs
        .get(tab_index)
        .ok_or(ActionError::NoSuchGroupTab(tab_index))?;
    let label = display_title(if tab.title.is_empty() { &tab.url } else { &tab.title });

    if group.is_open {
        if let Some(id) = tab.id {
            let window_id = tab.window_id.or(group.window_id).unwrap_or_default();
            browser.activate_tab(id, window_id).await?;
            return Ok(format!("Switched to '{label}'"));
        }
    }

    if restore_all {
        let mut opened = 0;
        let urls = group.tabs.iter().map(|tab| tab.url.trim());
        for url in urls.filter(|url| !url.is_empty()) {
            browser.open_url(url, true).await?;
            opened += 1;
        }
        return Ok(format!(
            "Restored {opened} tabs of '{}'",
            display_title(group.display_title())
        ));
    }

    if tab.url.trim().is_empty() {
        return Err(ActionError::MissingUrl);
    }
    browser.open_url(&tab.url, false).await?;
    Ok(format!("Opened '{label}'"))
}

fn item_url(item: &SearchableItem) -> Result<&str, ActionError> {
    item.url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or(ActionError::MissingUrl)
}

fn display_title(title: &str) -> String {
    if title.chars().count() > MESSAGE_TITLE_LIMIT {
        let truncated: String = title.chars().take(MESSAGE_TITLE_LIMIT).collect();
        format!("{truncated}...")
    } else {
        title.to_string()
    }
}

fn success_message(source: Source, action: &ItemAction, label: &str) -> String {
    match (source, action) {
        (Source::Tabs, ItemAction::Open { new_tab: false }) => format!("Switched to '{label}'"),
        (Source::Downloads, ItemAction::Open { .. }) => format!("Opened file '{label}'"),
        (_, ItemAction::Open { .. }) => format!("Opened '{label}'"),
        (_, ItemAction::OpenIncognito) => format!("Opened '{label}' in an incognito window"),
        (_, ItemAction::CopyLink) => format!("Copied link of '{label}'"),
        (_, ItemAction::Edit { .. }) => format!("Updated bookmark '{label}'"),
        (Source::Bookmarks, ItemAction::Delete) => format!("Removed bookmark '{label}'"),
        (Source::Tabs, ItemAction::Delete) => format!("Closed tab '{label}'"),
        (Source::History, ItemAction::Delete) => format!("Deleted '{label}' from history"),
        (Source::Downloads, ItemAction::Delete) => {
            format!("Removed download record '{label}'; the file was kept")
        }
        (Source::Groups, ItemAction::Delete) => format!("Removed '{label}'"),
    }
}
