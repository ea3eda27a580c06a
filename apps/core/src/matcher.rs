use url::Url;

use crate::model::SearchableItem;
use crate::query_dsl::{DateBound, ParsedQuery, QueryCommands, SearchField};

pub fn matches(item: &SearchableItem, query: &ParsedQuery) -> bool {
    if !commands_match(item, &query.commands) {
        return false;
    }

    if !query.has_text_terms() {
        return true;
    }

    let searchable = searchable_text(item, query.commands.in_field);
    query
        .exact_matches
        .iter()
        .chain(query.keywords.iter())
        .all(|term| searchable.contains(&term.to_lowercase()))
}

pub fn searchable_text(item: &SearchableItem, field: Option<SearchField>) -> String {
    match field {
        Some(SearchField::Title) => item.title.as_deref().unwrap_or_default().to_lowercase(),
        Some(SearchField::Url) => item.url.as_deref().unwrap_or_default().to_lowercase(),
        None => [
            item.title.as_deref().unwrap_or_default(),
            item.url.as_deref().unwrap_or_default(),
            item.filename.as_deref().unwrap_or_default(),
        ]
        .join(" ")
        .to_lowercase(),
    }
}

fn commands_match(item: &SearchableItem, commands: &QueryCommands) -> bool {
    if let Some(site) = &commands.site {
        if !site_matches(item, site) {
            return false;
        }
    }
    if let Some(file_type) = &commands.file_type {
        if !file_type_matches(item, file_type) {
            return false;
        }
    }
    if let Some(after) = &commands.after {
        if !date_matches(item, after, |ts, bound| ts >= bound) {
            return false;
        }
    }
    if let Some(before) = &commands.before {
        if !date_matches(item, before, |ts, bound| ts <= bound) {
            return false;
        }
    }
    true
}

fn site_matches(item: &SearchableItem, site: &str) -> bool {
    let Some(raw_url) = item.url.as_deref() else {
        return false;
    };
    let Ok(parsed) = Url::parse(raw_url) else {
        return false;
    };
    parsed
        .host_str()
        .map(|host| host.to_lowercase().contains(&site.to_lowercase()))
        .unwrap_or(false)
}

pub fn file_extension(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn file_type_matches(item: &SearchableItem, file_type: &str) -> bool {
    let Some(filename) = item.filename.as_deref().filter(|name| !name.is_empty()) else {
        return false;
    };
    file_extension(filename) == file_type.to_lowercase()
}

// An invalid bound never matches.
fn date_matches(item: &SearchableItem, bound: &DateBound, accept: fn(i64, i64) -> bool) -> bool {
    match bound.timestamp_ms() {
        Some(bound_ms) => accept(item.activity_timestamp(), bound_ms),
        None => false,
    }
}
