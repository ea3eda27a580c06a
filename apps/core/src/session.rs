use tracing::warn;

use crate::model::{SearchableItem, Source, TabGroup};
use crate::ranking::{effective_sort_mode, rank, SortMode, SortOrder};
use crate::search::{
    filter_by_usage, search, search_groups, usage_counts, UsageCounts, UsageFilter,
};

/// Only the ticket of the most recent load can apply its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub source: Source,
}

#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    source: Source,
    sort_mode: SortMode,
    sort_order: SortOrder,
    usage_filter: UsageFilter,
    items: Vec<SearchableItem>,
    groups: Vec<TabGroup>,
    group_results: Vec<TabGroup>,
    generation: u64,
    loading: bool,
    results: Vec<SearchableItem>,
    selected: usize,
}

impl SearchSession {
    pub fn new(source: Source, sort_mode: SortMode) -> Self {
        Self {
            source,
            sort_mode,
            ..Self::default()
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn usage_filter(&self) -> UsageFilter {
        self.usage_filter
    }

    pub fn items(&self) -> &[SearchableItem] {
        &self.items
    }

    pub fn groups(&self) -> &[TabGroup] {
        &self.groups
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_sort(&mut self, mode: SortMode, order: SortOrder) {
        self.sort_mode = mode;
        self.sort_order = order;
    }

    pub fn set_usage_filter(&mut self, filter: UsageFilter) {
        self.usage_filter = filter;
    }

    pub fn set_source(&mut self, source: Source) -> bool {
        if self.source == source {
            return false;
        }
        self.source = source;
        self.items.clear();
        self.groups.clear();
        self.group_results.clear();
        self.results.clear();
        self.selected = 0;
        true
    }

    pub fn next_source(&mut self) -> Source {
        self.set_source(self.source.next());
        self.source
    }

    pub fn previous_source(&mut self) -> Source {
        self.set_source(self.source.previous());
        self.source
    }

    pub fn begin_load(&mut self, source: Source) -> LoadTicket {
        self.set_source(source);
        self.generation += 1;
        self.loading = true;
        LoadTicket {
            generation: self.generation,
            source,
        }
    }

    pub fn complete_load(&mut self, ticket: LoadTicket, items: Vec<SearchableItem>) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        self.items = items;
        self.finish_load();
        true
    }

    pub fn complete_group_load(&mut self, ticket: LoadTicket, groups: Vec<TabGroup>) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        self.groups = groups;
        self.finish_load();
        true
    }

    fn accepts(&self, ticket: LoadTicket) -> bool {
        if ticket.generation == self.generation && ticket.source == self.source {
            return true;
        }
        warn!(
            source = ticket.source.as_str(),
            generation = ticket.generation,
            current = self.generation,
            "discarding stale load"
        );
        false
    }

    fn finish_load(&mut self) {
        self.loading = false;
        self.results.clear();
        self.group_results.clear();
        self.selected = 0;
    }

    pub fn results(&self, query: &str, now_ms: i64) -> Vec<SearchableItem> {
        let filtered;
        let pool = if self.source == Source::Bookmarks {
            filtered = filter_by_usage(&self.items, self.usage_filter);
            &filtered
        } else {
            &self.items
        };

        let matched = search(pool, query);
        let mode = effective_sort_mode(self.source, query, self.sort_mode);
        rank(&matched, query, mode, self.sort_order, now_ms)
    }

    pub fn refresh_groups(&mut self, query: &str) -> &[TabGroup] {
        self.group_results = search_groups(&self.groups, query);
        &self.group_results
    }

    pub fn current_group_results(&self) -> &[TabGroup] {
        &self.group_results
    }

    pub fn refresh(&mut self, query: &str, now_ms: i64) -> &[SearchableItem] {
        self.results = self.results(query, now_ms);
        self.selected = self.selected.min(self.results.len().saturating_sub(1));
        &self.results
    }

    pub fn current_results(&self) -> &[SearchableItem] {
        &self.results
    }

    pub fn usage_counts(&self) -> UsageCounts {
        if self.source != Source::Bookmarks {
            return UsageCounts::default();
        }
        usage_counts(&self.items)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_item(&self) -> Option<&SearchableItem> {
        self.results.get(self.selected)
    }

    pub fn move_selection(&mut self, direction: i32) -> usize {
        self.selected = next_selection_index(self.selected, self.results.len(), direction);
        self.selected
    }

    pub fn select(&mut self, index: usize) -> Option<&SearchableItem> {
        if index >= self.results.len() {
            return None;
        }
        self.selected = index;
        self.results.get(index)
    }
}

fn next_selection_index(current: usize, len: usize, direction: i32) -> usize {
    if len == 0 {
        return 0;
    }

    let max = len - 1;
    if direction < 0 {
        current.saturating_sub(1)
    } else if direction > 0 {
        (current + 1).min(max)
    } else {
        current.min(max)
    }
}
