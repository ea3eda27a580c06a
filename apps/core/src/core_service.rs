use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::actions::{self, ActionOutcome, ItemAction};
use crate::config::{validate, Config};
use crate::contract::{
    ActManyRequest, ActManyResponse, ActRequest, ActResponse, CoreRequest, CoreResponse,
    GetSettingsRequest, LoadRequest, LoadResponse, OpenGroupTabRequest, SaveSettingsRequest,
    SearchRequest, SearchResponse, SearchResultDto, SettingsResponse,
};
use crate::discovery::BrowserSource;
use crate::model::{now_epoch_ms, SearchableItem, Source, TabGroup};
use crate::normalizer::{load_groups, load_items, LoadOptions};
use crate::ranking::{effective_sort_mode, SortMode, SortOrder};
use crate::search::{UsageCounts, UsageFilter};
use crate::session::SearchSession;
use crate::settings::{
    load_settings, save_settings, JsonFileStore, KeyValueStore, SettingsError, UiSettings,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("item not found: {0}")]
    ItemNotFound(String),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub source: Source,
    pub count: usize,
    pub applied: bool,
}

pub struct CoreService {
    config: Config,
    browser: Arc<dyn BrowserSource>,
    settings: Arc<dyn KeyValueStore>,
    session: Mutex<SearchSession>,
}

impl CoreService {
    pub fn new(config: Config, browser: Arc<dyn BrowserSource>) -> Result<Self, ServiceError> {
        let store = Arc::new(JsonFileStore::new(&config.settings_path));
        Self::with_settings_store(config, browser, store)
    }

    pub fn with_settings_store(
        config: Config,
        browser: Arc<dyn BrowserSource>,
        settings: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ServiceError> {
        validate(&config).map_err(ServiceError::Config)?;
        let session = SearchSession::new(config.default_source, config.default_sort);
        Ok(Self {
            config,
            browser,
            settings,
            session: Mutex::new(session),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn browser(&self) -> Arc<dyn BrowserSource> {
        Arc::clone(&self.browser)
    }

    pub async fn source(&self) -> Source {
        self.session.lock().await.source()
    }

    pub async fn items(&self) -> Vec<SearchableItem> {
        self.session.lock().await.items().to_vec()
    }

    pub async fn groups(&self) -> Vec<TabGroup> {
        self.session.lock().await.groups().to_vec()
    }

    /// Loads `source` into the session. Results of a load overtaken by a
    /// newer one are dropped and reported as not applied.
    pub async fn load(&self, source: Source) -> LoadSummary {
        let ticket = self.session.lock().await.begin_load(source);
        if source == Source::Groups {
            let groups = load_groups(self.browser.as_ref()).await;
            let count = groups.len();
            let applied = self.session.lock().await.complete_group_load(ticket, groups);
            return LoadSummary {
                source,
                count,
                applied,
            };
        }

        let options = LoadOptions::from_config(&self.config, now_epoch_ms());
        let items = load_items(Arc::clone(&self.browser), source, &options).await;
        let count = items.len();
        let applied = self.session.lock().await.complete_load(ticket, items);
        LoadSummary {
            source,
            count,
            applied,
        }
    }

    pub async fn reload(&self) -> LoadSummary {
        let source = self.source().await;
        self.load(source).await
    }

    pub async fn next_source(&self) -> LoadSummary {
        let source = self.session.lock().await.source().next();
        self.load(source).await
    }

    pub async fn previous_source(&self) -> LoadSummary {
        let source = self.session.lock().await.source().previous();
        self.load(source).await
    }

    pub async fn set_sort(&self, mode: SortMode, order: SortOrder) {
        self.session.lock().await.set_sort(mode, order);
    }

    pub async fn set_usage_filter(&self, filter: UsageFilter) {
        self.session.lock().await.set_usage_filter(filter);
    }

    pub async fn usage_counts(&self) -> UsageCounts {
        self.session.lock().await.usage_counts()
    }

    pub async fn search(&self, query: &str, limit: usize) -> Vec<SearchableItem> {
        self.search_at(query, limit, now_epoch_ms()).await
    }

    pub async fn search_at(&self, query: &str, limit: usize, now_ms: i64) -> Vec<SearchableItem> {
        let effective_limit = self.effective_limit(limit);
        let mut session = self.session.lock().await;
        let results = session.refresh(query, now_ms);
        results.iter().take(effective_limit).cloned().collect()
    }

    pub async fn search_groups(&self, query: &str) -> Vec<TabGroup> {
        self.session.lock().await.refresh_groups(query).to_vec()
    }

    pub async fn perform(
        &self,
        id: &str,
        action: &ItemAction,
    ) -> Result<ActResponse, ServiceError> {
        let item = self.find_item(id).await?;
        Ok(self.perform_on(&item, action).await)
    }

    /// Applies `action` to several loaded items and reloads once if any of
    /// them changed the source. Repeated ids are acted on once.
    pub async fn perform_many(
        &self,
        ids: &[String],
        action: &ItemAction,
    ) -> Result<ActManyResponse, ServiceError> {
        if ids.is_empty() {
            return Err(ServiceError::InvalidRequest("ids are required".to_string()));
        }
        if !action.is_batchable() {
            return Err(ServiceError::InvalidRequest(format!(
                "{} cannot be applied to several items",
                action.name()
            )));
        }

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for id in ids.iter().filter(|id| seen.insert(id.as_str())) {
            items.push(self.find_item(id).await?);
        }

        let outcome = actions::perform_many(self.browser.as_ref(), &items, action).await;
        let reloaded = outcome.succeeded > 0 && action.requires_reload();
        if reloaded {
            self.reload().await;
        }
        Ok(ActManyResponse { outcome, reloaded })
    }

    pub async fn open_group_tab(
        &self,
        group_id: &str,
        tab_index: usize,
    ) -> Result<ActResponse, ServiceError> {
        let group = self
            .session
            .lock()
            .await
            .groups()
            .iter()
            .find(|group| group.id == group_id)
            .cloned()
            .ok_or_else(|| ServiceError::ItemNotFound(group_id.to_string()))?;
        if tab_index >= group.tabs.len() {
            return Err(ServiceError::InvalidRequest(format!(
                "group {group_id} has {} tabs",
                group.tabs.len()
            )));
        }

        let restore_all = self.ui_settings().group_child_click_restore_all;
        let outcome =
            actions::open_group_tab(self.browser.as_ref(), &group, tab_index, restore_all).await;
        Ok(ActResponse {
            outcome,
            reloaded: false,
        })
    }

    pub fn ui_settings(&self) -> UiSettings {
        load_settings(self.settings.as_ref()).unwrap_or_else(|error| {
            warn!(%error, "failed to read settings; using defaults");
            UiSettings::default()
        })
    }

    pub fn save_ui_settings(&self, settings: &UiSettings) -> Result<(), ServiceError> {
        save_settings(self.settings.as_ref(), settings)?;
        info!("settings saved");
        Ok(())
    }

    pub async fn perform_selected(
        &self,
        action: &ItemAction,
    ) -> Result<ActResponse, ServiceError> {
        let item = self
            .session
            .lock()
            .await
            .selected_item()
            .cloned()
            .ok_or_else(|| ServiceError::ItemNotFound("no selection".to_string()))?;
        Ok(self.perform_on(&item, action).await)
    }

    pub async fn move_selection(&self, direction: i32) -> Option<SearchableItem> {
        let mut session = self.session.lock().await;
        session.move_selection(direction);
        session.selected_item().cloned()
    }

    pub async fn handle_command(&self, request: CoreRequest) -> Result<CoreResponse, ServiceError> {
        match request {
            CoreRequest::Load(LoadRequest { source }) => {
                let summary = self.load(source).await;
                Ok(CoreResponse::Load(LoadResponse {
                    source: summary.source,
                    count: summary.count,
                    applied: summary.applied,
                }))
            }
            CoreRequest::Search(request) => self.handle_search(request).await,
            CoreRequest::Act(ActRequest { id, action }) => {
                if id.trim().is_empty() {
                    return Err(ServiceError::InvalidRequest("id is required".to_string()));
                }
                Ok(CoreResponse::Act(self.perform(&id, &action).await?))
            }
            CoreRequest::ActMany(ActManyRequest { ids, action }) => {
                Ok(CoreResponse::ActMany(self.perform_many(&ids, &action).await?))
            }
            CoreRequest::OpenGroupTab(OpenGroupTabRequest {
                group_id,
                tab_index,
            }) => Ok(CoreResponse::OpenGroupTab(
                self.open_group_tab(&group_id, tab_index).await?,
            )),
            CoreRequest::GetSettings(GetSettingsRequest { prefers_dark }) => {
                Ok(CoreResponse::Settings(settings_response(
                    self.ui_settings(),
                    prefers_dark,
                )))
            }
            CoreRequest::SaveSettings(SaveSettingsRequest {
                settings,
                prefers_dark,
            }) => {
                self.save_ui_settings(&settings)?;
                Ok(CoreResponse::Settings(settings_response(
                    self.ui_settings(),
                    prefers_dark,
                )))
            }
        }
    }

    async fn handle_search(&self, request: SearchRequest) -> Result<CoreResponse, ServiceError> {
        if request.limit == Some(0) {
            return Err(ServiceError::InvalidRequest(
                "limit must be greater than zero".to_string(),
            ));
        }

        let current = self.source().await;
        if let Some(source) = request.source.filter(|source| *source != current) {
            self.load(source).await;
        } else if self.session.lock().await.generation() == 0 {
            self.load(current).await;
        }

        let (source, mode) = {
            let mut session = self.session.lock().await;
            let mode = request.sort.unwrap_or(session.sort_mode());
            let order = request.order.unwrap_or(session.sort_order());
            session.set_sort(mode, order);
            if let Some(filter) = request.filter {
                session.set_usage_filter(filter);
            }
            (session.source(), mode)
        };

        if source == Source::Groups {
            let groups = self.search_groups(&request.query).await;
            let limit = self.effective_limit(request.limit.unwrap_or(0));
            return Ok(CoreResponse::Search(SearchResponse {
                source,
                effective_sort: effective_sort_mode(source, &request.query, mode),
                total: groups.len(),
                counts: UsageCounts::default(),
                results: Vec::new(),
                groups: groups.into_iter().take(limit).collect(),
            }));
        }

        let now_ms = request.now_ms.unwrap_or_else(now_epoch_ms);
        let matched = {
            let mut session = self.session.lock().await;
            session.refresh(&request.query, now_ms).to_vec()
        };
        let limit = self.effective_limit(request.limit.unwrap_or(0));

        Ok(CoreResponse::Search(SearchResponse {
            source,
            effective_sort: effective_sort_mode(source, &request.query, mode),
            total: matched.len(),
            counts: self.usage_counts().await,
            results: matched
                .into_iter()
                .take(limit)
                .map(SearchResultDto::from)
                .collect(),
            groups: Vec::new(),
        }))
    }

    async fn find_item(&self, id: &str) -> Result<SearchableItem, ServiceError> {
        self.session
            .lock()
            .await
            .items()
            .iter()
            .find(|item| item.item_id() == id)
            .cloned()
            .ok_or_else(|| ServiceError::ItemNotFound(id.to_string()))
    }

    async fn perform_on(&self, item: &SearchableItem, action: &ItemAction) -> ActResponse {
        let outcome: ActionOutcome = actions::perform(self.browser.as_ref(), item, action).await;
        let reloaded = outcome.success && action.requires_reload();
        if reloaded {
            let summary = self.load(item.source()).await;
            info!(
                source = summary.source.as_str(),
                count = summary.count,
                "reloaded after action"
            );
        }
        ActResponse { outcome, reloaded }
    }

    fn effective_limit(&self, limit: usize) -> usize {
        let cap = self.config.max_results as usize;
        if limit == 0 {
            cap
        } else {
            limit.min(cap)
        }
    }
}

fn settings_response(settings: UiSettings, prefers_dark: bool) -> SettingsResponse {
    SettingsResponse {
        appearance: settings.appearance(prefers_dark),
        settings,
    }
}
