use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static SITE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"site:(\S+)").expect("site pattern should compile"));
static TYPE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"type:(\S+)").expect("type pattern should compile"));
static IN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"in:(title|url)").expect("in pattern should compile"));
static AFTER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"after:(\d{4}-\d{2}(?:-\d{2})?)").expect("after pattern should compile")
});
static BEFORE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"before:(\d{4}-\d{2}(?:-\d{2})?)").expect("before pattern should compile")
});
static PHRASE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("phrase pattern should compile"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Title,
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateBound {
    At(i64),
    // Matched the date shape but is not a calendar date (e.g. `2024-13`).
    Invalid(String),
}

impl DateBound {
    pub fn parse(value: &str) -> Self {
        match parse_day_start_ms(value) {
            Some(ms) => Self::At(ms),
            None => Self::Invalid(value.to_string()),
        }
    }

    pub fn timestamp_ms(&self) -> Option<i64> {
        match self {
            Self::At(ms) => Some(*ms),
            Self::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryCommands {
    pub site: Option<String>,
    pub file_type: Option<String>,
    pub in_field: Option<SearchField>,
    pub after: Option<DateBound>,
    pub before: Option<DateBound>,
}

impl QueryCommands {
    pub fn is_empty(&self) -> bool {
        self.site.is_none()
            && self.file_type.is_none()
            && self.in_field.is_none()
            && self.after.is_none()
            && self.before.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub raw: String,
    pub commands: QueryCommands,
    pub remaining_text: String,
    pub exact_matches: Vec<String>,
    pub keywords: Vec<String>,
}

impl ParsedQuery {
    /// Never fails: malformed commands fall through as keywords and unmatched
    /// quotes stay literal.
    pub fn parse(query: &str) -> Self {
        let raw = query.trim().to_string();
        if raw.is_empty() {
            return Self::default();
        }

        let mut text = raw.clone();
        let mut commands = QueryCommands::default();

        if let Some(value) = extract_first(&SITE_PATTERN, &mut text) {
            commands.site = Some(value);
        }
        if let Some(value) = extract_first(&TYPE_PATTERN, &mut text) {
            commands.file_type = Some(value);
        }
        if let Some(value) = extract_first(&IN_PATTERN, &mut text) {
            commands.in_field = match value.as_str() {
                "title" => Some(SearchField::Title),
                "url" => Some(SearchField::Url),
                _ => None,
            };
        }
        if let Some(value) = extract_first(&AFTER_PATTERN, &mut text) {
            commands.after = Some(DateBound::parse(&value));
        }
        if let Some(value) = extract_first(&BEFORE_PATTERN, &mut text) {
            commands.before = Some(DateBound::parse(&value));
        }

        let (exact_matches, keywords) = split_free_text(&text);

        Self {
            raw,
            commands,
            remaining_text: text,
            exact_matches,
            keywords,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn has_text_terms(&self) -> bool {
        !self.exact_matches.is_empty() || !self.keywords.is_empty()
    }
}

fn extract_first(pattern: &Regex, text: &mut String) -> Option<String> {
    let captures = pattern.captures(text)?;
    let whole = captures.get(0)?;
    let value = captures.get(1)?.as_str().to_string();
    let (start, end) = (whole.start(), whole.end());

    let mut rest = String::with_capacity(text.len() - (end - start));
    rest.push_str(&text[..start]);
    rest.push_str(&text[end..]);
    *text = rest.trim().to_string();
    Some(value)
}

fn split_free_text(text: &str) -> (Vec<String>, Vec<String>) {
    let mut exact_matches = Vec::new();
    let remaining = PHRASE_PATTERN.replace_all(text, |captures: &Captures| {
        let phrase = captures[1].trim();
        if !phrase.is_empty() {
            exact_matches.push(phrase.to_string());
        }
        ""
    });

    let keywords = remaining
        .split_whitespace()
        .map(str::to_string)
        .collect();

    (exact_matches, keywords)
}

// `YYYY-MM` means the first day of the month.
fn parse_day_start_ms(value: &str) -> Option<i64> {
    let mut parts = value.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = match parts.next() {
        Some(day) => day.parse().ok()?,
        None => 1,
    };
    if parts.next().is_some() {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}
