use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::{self, Config, ConfigError};
use crate::contract::SearchResultDto;
use crate::core_service::{CoreService, ServiceError};
use crate::discovery::{BrowserSnapshot, BrowserSource, MemoryBrowser, SourceError};
use crate::logging::{self, LoggingError};
use crate::model::{now_epoch_ms, Source, TabGroup};
use crate::profile_store::resolve_profile;
use crate::ranking::{effective_sort_mode, SortMode, SortOrder};
use crate::search::UsageFilter;
use crate::transport;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error("{0}")]
    Usage(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
    pub source: Option<Source>,
    pub query: String,
    pub sort: Option<SortMode>,
    pub order: Option<SortOrder>,
    pub filter: Option<UsageFilter>,
    pub snapshot: Option<PathBuf>,
    pub profile: Option<PathBuf>,
    pub fixture: bool,
    pub limit: usize,
    pub json: Option<String>,
}

pub const USAGE: &str = "usage: tabseek-core [--config PATH] \
[--source bookmarks|tabs|groups|history|downloads] [--query TEXT] \
[--sort smart|time|frequency] [--order asc|desc] \
[--filter all|never_used|rarely_used|dormant|active] [--limit N] \
[--snapshot FILE | --profile DIR | --fixture] [--json REQUEST]";

pub fn parse_cli_args(args: &[String]) -> Result<RuntimeOptions, String> {
    let mut options = RuntimeOptions::default();
    let mut iter = args.iter();

    while let Some(flag) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{name} requires a value\n{USAGE}"))
        };

        match flag.as_str() {
            "--config" => options.config_path = Some(PathBuf::from(value("--config")?)),
            "--source" => {
                let raw = value("--source")?;
                options.source =
                    Some(Source::parse(&raw).ok_or_else(|| format!("unknown source '{raw}'"))?);
            }
            "--query" | "-q" => options.query = value("--query")?,
            "--sort" => {
                let raw = value("--sort")?;
                options.sort =
                    Some(SortMode::parse(&raw).ok_or_else(|| format!("unknown sort '{raw}'"))?);
            }
            "--order" => {
                let raw = value("--order")?;
                options.order =
                    Some(SortOrder::parse(&raw).ok_or_else(|| format!("unknown order '{raw}'"))?);
            }
            "--filter" => {
                let raw = value("--filter")?;
                options.filter = Some(
                    UsageFilter::parse(&raw).ok_or_else(|| format!("unknown filter '{raw}'"))?,
                );
            }
            "--limit" => {
                let raw = value("--limit")?;
                options.limit = raw
                    .parse()
                    .map_err(|_| format!("--limit expects a number, got '{raw}'"))?;
            }
            "--snapshot" => options.snapshot = Some(PathBuf::from(value("--snapshot")?)),
            "--profile" => options.profile = Some(PathBuf::from(value("--profile")?)),
            "--fixture" => options.fixture = true,
            "--json" => options.json = Some(value("--json")?),
            "--help" | "-h" => return Err(USAGE.to_string()),
            other => return Err(format!("unknown argument '{other}'\n{USAGE}")),
        }
    }

    let chosen = [options.snapshot.is_some(), options.profile.is_some(), options.fixture]
        .iter()
        .filter(|set| **set)
        .count();
    if chosen > 1 {
        return Err("--snapshot, --profile and --fixture are mutually exclusive".to_string());
    }

    Ok(options)
}

pub async fn run_with_options(options: RuntimeOptions) -> Result<String, RuntimeError> {
    let config = config::load(options.config_path.as_deref())?;
    let log_path = logging::init(&config)?;
    info!(
        config_path = %config.config_path.display(),
        log_path = %log_path.display(),
        "starting"
    );

    let browser = build_browser(&options, &config)?;
    let service = CoreService::new(config, browser)?;
    execute(&service, &options).await
}

/// Snapshot file, then explicit profile, then the configured profile. A
/// profile path may also be a browser user-data directory, in which case its
/// `Default` profile is used. The built-in fixture is used only when asked for.
pub fn build_browser(
    options: &RuntimeOptions,
    config: &Config,
) -> Result<Arc<dyn BrowserSource>, RuntimeError> {
    if let Some(path) = &options.snapshot {
        let snapshot = BrowserSnapshot::from_json_file(path)?;
        return Ok(Arc::new(MemoryBrowser::from_snapshot(snapshot)));
    }
    if options.fixture {
        return Ok(Arc::new(MemoryBrowser::deterministic_fixture(now_epoch_ms())));
    }
    let Some(dir) = options.profile.as_ref().or(config.profile_dir.as_ref()) else {
        return Err(RuntimeError::Usage(format!(
            "no browser data: pass --snapshot, --profile or --fixture, or set profile_dir\n{USAGE}"
        )));
    };
    let profile = resolve_profile(dir).ok_or_else(|| {
        RuntimeError::Usage(format!("no browser profile found in {}", dir.display()))
    })?;
    info!(profile = %profile.root().display(), "using browser profile");
    Ok(Arc::new(profile))
}

pub async fn execute(
    service: &CoreService,
    options: &RuntimeOptions,
) -> Result<String, RuntimeError> {
    if let Some(payload) = &options.json {
        return Ok(transport::handle_json(service, payload).await);
    }

    let source = options.source.unwrap_or(service.config().default_source);
    let summary = service.load(source).await;
    if source == Source::Groups {
        let groups = service.search_groups(&options.query).await;
        let mut lines = vec![format!(
            "{} groups ({} loaded)",
            groups.len(),
            summary.count
        )];
        for (index, group) in groups.iter().enumerate() {
            lines.extend(render_group(index + 1, group));
        }
        return Ok(lines.join("\n"));
    }

    if let Some(filter) = options.filter {
        service.set_usage_filter(filter).await;
    }
    let mode = options.sort.unwrap_or(service.config().default_sort);
    service
        .set_sort(mode, options.order.unwrap_or_default())
        .await;

    let results = service.search(&options.query, options.limit).await;
    let effective = effective_sort_mode(source, &options.query, mode);

    let mut lines = vec![format!(
        "{} results from {} ({} loaded, sort={})",
        results.len(),
        source,
        summary.count,
        effective.as_str()
    )];
    lines.extend(
        results
            .into_iter()
            .map(SearchResultDto::from)
            .enumerate()
            .map(|(index, dto)| render_row(index + 1, &dto)),
    );
    Ok(lines.join("\n"))
}

fn render_group(position: usize, group: &TabGroup) -> Vec<String> {
    let state = if group.is_open { "open" } else { "saved" };
    let mut lines = vec![format!(
        "{position:>4}. {} [{state}] ({} tabs)",
        group.display_title(),
        group.tabs.len()
    )];
    lines.extend(group.tabs.iter().map(|tab| format!("        {}  {}", tab.title, tab.url)));
    lines
}

fn render_row(position: usize, dto: &SearchResultDto) -> String {
    let title = dto
        .title
        .as_deref()
        .filter(|title| !title.is_empty())
        .unwrap_or("(untitled)");
    let location = dto
        .filename
        .as_deref()
        .or(dto.url.as_deref())
        .unwrap_or_default();
    let status = dto
        .usage_status
        .map(|status| format!(" [{}]", status.as_str()))
        .unwrap_or_default();
    format!("{position:>4}. {title}{status}  {location}")
}
