//! TableController: the per-table state machine.
//!
//! Every filter, sort or page mutation issues a new [`FetchRequest`] tagged
//! with a monotonically increasing sequence token. Only the response carrying
//! the most recently issued token is applied; anything older is stale and
//! discarded, whatever order the responses arrive in. The controller never
//! performs I/O itself.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::TableConfig;
use crate::error::{FetchError, ValidationError};
use crate::filter::{CombinationMode, FilterState};
use crate::models::{normalize_columns, Column, Row};
use crate::page::PageState;
use crate::prefs::ColumnPrefs;
use crate::query::QueryParams;
use crate::selection::SelectionState;
use crate::sort::SortState;

/// Request lifecycle of a table instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    /// The last request failed; previously loaded rows stay visible.
    Error(FetchError),
}

impl LoadState {
    /// `Loaded` and `Error` are settled: nothing the table waits for is in flight.
    pub fn is_settled(&self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Error(_))
    }
}

/// Parameters to hand to the fetch collaborator, tagged with their sequence token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub seq: u64,
    pub params: QueryParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    Applied,
    /// Superseded by a later request; ignored.
    Stale,
}

/// Notifications delivered to [`TableController::subscribe`] receivers.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    RequestIssued(FetchRequest),
    RowsReplaced {
        seq: u64,
        rows: usize,
        total: Option<usize>,
    },
    Failed {
        seq: u64,
        error: FetchError,
    },
    SelectionChanged {
        selected: usize,
        all_filtered: bool,
    },
    /// Column layout changed; persist it with the preference collaborator.
    ColumnsChanged(ColumnPrefs),
    Reset,
}

/// What a query mutation invalidates besides the row set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Filter,
    Sort,
    Page,
}

pub struct TableController {
    config: TableConfig,
    columns: Vec<Column>,
    filter: FilterState,
    sort: SortState,
    page: PageState,
    initial_page: PageState,
    selection: SelectionState,
    rows: Vec<Row>,
    state: LoadState,
    last_seq: u64,
    in_flight: Option<FetchRequest>,
    subscribers: Vec<mpsc::UnboundedSender<TableEvent>>,
}

impl std::fmt::Debug for TableController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableController")
            .field("table_id", &self.config.table_id)
            .field("state", &self.state)
            .field("last_seq", &self.last_seq)
            .field("rows", &self.rows.len())
            .finish_non_exhaustive()
    }
}

impl TableController {
    /// Mounts a table over a column set. Starts `Idle` with empty filter and
    /// sort and the configured default page size.
    pub fn new(columns: Vec<Column>, config: TableConfig) -> Result<Self, ValidationError> {
        let columns = normalize_columns(columns)?;
        let page = Self::default_page(&config)?;
        Ok(Self {
            config,
            columns,
            filter: FilterState::new(),
            sort: SortState::new(),
            page,
            initial_page: page,
            selection: SelectionState::new(),
            rows: Vec::new(),
            state: LoadState::Idle,
            last_seq: 0,
            in_flight: None,
            subscribers: Vec::new(),
        })
    }

    fn default_page(config: &TableConfig) -> Result<PageState, ValidationError> {
        if config.default_page_size > config.max_page_size {
            return Err(ValidationError::PageSizeTooLarge {
                size: config.default_page_size,
                max: config.max_page_size,
            });
        }
        PageState::new(config.default_page_size)
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// All columns in display order, hidden ones included.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.visible)
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        match &self.state {
            LoadState::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Highest sequence token issued so far.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// The request whose response the table is waiting for, if any.
    pub fn pending_request(&self) -> Option<&FetchRequest> {
        self.in_flight.as_ref()
    }

    pub fn selected_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|r| self.selection.is_selected(&r.id))
    }

    /// Registers an observer. Dropped receivers are forgotten on the next event.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TableEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    // ─── Query parameters ────────────────────────────────────────────────────

    /// Combines filter, sort and page state into the normalized parameter object.
    pub fn build_query_parameters(&self) -> QueryParams {
        QueryParams {
            filters: self
                .filter
                .column_filters()
                .iter()
                .map(|(column, values)| (column.clone(), values.iter().cloned().collect()))
                .collect(),
            search_terms: self.filter.search_terms().clone(),
            combination: self.filter.combination(),
            order_by: self.sort.keys().to_vec(),
            offset: self.page.offset(),
            limit: self.page.size,
            global_query: self.filter.global_query().map(str::to_string),
            search_fields: self
                .columns
                .iter()
                .filter(|c| c.global_search)
                .map(|c| c.id.clone())
                .collect(),
        }
    }

    /// Restores filter, sort and page state from a decoded parameter object
    /// (typically read back from the URL). Validates everything before
    /// touching any state.
    pub fn apply_query_params(&mut self, params: &QueryParams) -> Result<FetchRequest, ValidationError> {
        let mut filter = FilterState::new();
        for (column, values) in &params.filters {
            self.filterable(column)?;
            filter.set_column_filter(column, values.iter().cloned())?;
        }
        for (column, term) in &params.search_terms {
            self.filterable(column)?;
            filter.set_column_search_term(column, term)?;
        }
        filter.set_combination_mode(params.combination);
        if let Some(q) = &params.global_query {
            filter.set_global_query(q);
        }

        let mut sort = SortState::new();
        for key in &params.order_by {
            self.sortable(&key.column)?;
        }
        sort.set_keys(params.order_by.clone())?;

        let mut page = PageState::new(params.limit)?;
        self.check_page_size(params.limit)?;
        page.set_page(params.page_index())?;
        page.total = self.page.total;

        self.filter = filter;
        self.sort = sort;
        self.page = page;
        self.clear_selection_for(Change::Filter);
        Ok(self.issue())
    }

    // ─── Request lifecycle ───────────────────────────────────────────────────

    /// Issues a request for the current parameters (initial load or refresh).
    pub fn load(&mut self) -> FetchRequest {
        self.issue()
    }

    /// Re-issues the current parameters with a fresh sequence token.
    pub fn retry(&mut self) -> FetchRequest {
        self.issue()
    }

    fn issue(&mut self) -> FetchRequest {
        self.last_seq += 1;
        let request = FetchRequest {
            seq: self.last_seq,
            params: self.build_query_parameters(),
        };
        debug!(
            table = %self.config.table_id,
            seq = request.seq,
            offset = request.params.offset,
            limit = request.params.limit,
            "Issued table request"
        );
        self.state = LoadState::Loading;
        self.in_flight = Some(request.clone());
        self.emit(TableEvent::RequestIssued(request.clone()));
        request
    }

    fn is_current(&self, seq: u64) -> bool {
        self.in_flight.as_ref().is_some_and(|r| r.seq == seq)
    }

    /// Applies a successful response if it answers the latest request.
    pub fn on_results_received(&mut self, seq: u64, rows: Vec<Row>, total_count: Option<usize>) -> ResponseOutcome {
        if !self.is_current(seq) {
            debug!(table = %self.config.table_id, seq, latest = self.last_seq, "Discarded stale response");
            return ResponseOutcome::Stale;
        }
        self.in_flight = None;
        self.state = LoadState::Loaded;
        self.rows = rows;
        self.page.total = total_count;

        if !self.config.preserve_selection {
            let loaded: HashSet<&str> = self.rows.iter().map(|r| r.id.as_str()).collect();
            if self.selection.prune_to(&loaded) {
                self.emit_selection();
            }
        }

        self.emit(TableEvent::RowsReplaced {
            seq,
            rows: self.rows.len(),
            total: total_count,
        });

        // The rows shrank under the current page: fall back to the last one.
        if self.rows.is_empty() && self.page.clamp_to_total() {
            debug!(table = %self.config.table_id, page = self.page.index, "Page beyond total, reloading last page");
            self.query_changed(Change::Page);
        }
        ResponseOutcome::Applied
    }

    /// Records a failed request. Rows, filters, sort and selection are kept.
    pub fn on_request_failed(&mut self, seq: u64, error: FetchError) -> ResponseOutcome {
        if !self.is_current(seq) {
            debug!(table = %self.config.table_id, seq, latest = self.last_seq, "Discarded stale failure");
            return ResponseOutcome::Stale;
        }
        warn!(table = %self.config.table_id, seq, error = %error, "Table request failed");
        self.in_flight = None;
        self.state = LoadState::Error(error.clone());
        self.emit(TableEvent::Failed { seq, error });
        ResponseOutcome::Applied
    }

    // ─── Filter mutations ────────────────────────────────────────────────────

    pub fn set_column_filter<I, S>(&mut self, column_id: &str, values: I) -> Result<FetchRequest, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filterable(column_id)?;
        self.filter.set_column_filter(column_id, values)?;
        Ok(self.query_changed(Change::Filter))
    }

    pub fn set_column_search_term(&mut self, column_id: &str, term: &str) -> Result<FetchRequest, ValidationError> {
        self.filterable(column_id)?;
        self.filter.set_column_search_term(column_id, term)?;
        Ok(self.query_changed(Change::Filter))
    }

    pub fn set_global_query(&mut self, text: &str) -> FetchRequest {
        self.filter.set_global_query(text);
        self.query_changed(Change::Filter)
    }

    pub fn toggle_combination_mode(&mut self) -> FetchRequest {
        self.filter.toggle_combination_mode();
        self.query_changed(Change::Filter)
    }

    pub fn combination(&self) -> CombinationMode {
        self.filter.combination()
    }

    pub fn clear_column_filter(&mut self, column_id: &str) -> FetchRequest {
        self.filter.clear_column(column_id);
        self.query_changed(Change::Filter)
    }

    pub fn clear_filters(&mut self) -> FetchRequest {
        self.filter.clear_all();
        self.query_changed(Change::Filter)
    }

    // ─── Sort mutations ──────────────────────────────────────────────────────

    pub fn apply_sort(&mut self, column_id: &str, additive: bool) -> Result<FetchRequest, ValidationError> {
        self.sortable(column_id)?;
        self.sort.apply_sort(column_id, additive)?;
        Ok(self.query_changed(Change::Sort))
    }

    pub fn clear_sort(&mut self) -> FetchRequest {
        self.sort.clear_sort();
        self.query_changed(Change::Sort)
    }

    // ─── Page mutations ──────────────────────────────────────────────────────

    pub fn set_page(&mut self, index: usize) -> Result<FetchRequest, ValidationError> {
        self.page.set_page(index)?;
        Ok(self.query_changed(Change::Page))
    }

    /// Changes the page size; the page index always goes back to 0.
    pub fn set_page_size(&mut self, size: usize) -> Result<FetchRequest, ValidationError> {
        self.check_page_size(size)?;
        self.page.set_page_size(size)?;
        Ok(self.query_changed(Change::Page))
    }

    /// Clears filter and sort and returns paging to its defaults.
    pub fn clear_all(&mut self) -> FetchRequest {
        self.filter.clear_all();
        self.sort.clear_sort();
        self.page = self.initial_page;
        self.query_changed(Change::Filter)
    }

    /// Forgets everything tied to the current context (e.g. the user switched
    /// project). Returns to `Idle`; responses still in flight become stale.
    pub fn reset_context(&mut self) {
        self.page = self.initial_page;
        self.filter.clear_all();
        self.sort.clear_sort();
        self.selection.clear();
        self.rows.clear();
        self.state = LoadState::Idle;
        self.in_flight = None;
        self.last_seq += 1;
        self.emit(TableEvent::Reset);
    }

    fn query_changed(&mut self, change: Change) -> FetchRequest {
        if change != Change::Page {
            self.page.index = 0;
        }
        self.clear_selection_for(change);
        self.issue()
    }

    fn clear_selection_for(&mut self, change: Change) {
        let before = self.selection.clone();
        if !self.config.preserve_selection {
            self.selection.clear();
        } else if change == Change::Filter {
            // A different filter means a different "all matching rows".
            self.selection.set_all_filtered(false);
        }
        if before != self.selection {
            self.emit_selection();
        }
    }

    // ─── Selection ───────────────────────────────────────────────────────────

    pub fn toggle_row_selection(&mut self, id: &str) -> Result<bool, ValidationError> {
        if !self.rows.iter().any(|r| r.id == id) {
            return Err(ValidationError::UnknownRow(id.to_string()));
        }
        let selected = self.selection.toggle(id);
        self.emit_selection();
        Ok(selected)
    }

    /// Selects every loaded row; never the rows of other pages.
    pub fn select_all_loaded(&mut self) {
        self.selection
            .select_many(self.rows.iter().map(|r| r.id.as_str()));
        self.emit_selection();
    }

    /// Marks every row matching the current filter as selected, loaded or not.
    pub fn select_all_filtered(&mut self) {
        self.selection
            .select_many(self.rows.iter().map(|r| r.id.as_str()));
        self.selection.set_all_filtered(true);
        self.emit_selection();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.emit_selection();
    }

    fn emit_selection(&mut self) {
        self.emit(TableEvent::SelectionChanged {
            selected: self.selection.len(),
            all_filtered: self.selection.all_filtered(),
        });
    }

    // ─── Columns ─────────────────────────────────────────────────────────────

    /// Hiding a column keeps its filter and sort in effect.
    pub fn set_column_visible(&mut self, column_id: &str, visible: bool) -> Result<(), ValidationError> {
        let column = self.column_mut(column_id)?;
        if column.visible != visible {
            column.visible = visible;
            self.emit_columns();
        }
        Ok(())
    }

    /// Moves a column to `to_index` in display order (clamped to the last slot).
    pub fn move_column(&mut self, column_id: &str, to_index: usize) -> Result<(), ValidationError> {
        let from = self
            .columns
            .iter()
            .position(|c| c.id == column_id)
            .ok_or_else(|| ValidationError::UnknownColumn(column_id.to_string()))?;
        let to = to_index.min(self.columns.len() - 1);
        if from == to {
            return Ok(());
        }
        let column = self.columns.remove(from);
        self.columns.insert(to, column);
        for (i, column) in self.columns.iter_mut().enumerate() {
            column.order = i;
        }
        self.emit_columns();
        Ok(())
    }

    /// Sets a column width, clamped to its constraints. Returns the applied width.
    pub fn resize_column(&mut self, column_id: &str, width: u32) -> Result<u32, ValidationError> {
        let column = self.column_mut(column_id)?;
        let width = column.width_range.clamp(width);
        if column.width != Some(width) {
            column.width = Some(width);
            self.emit_columns();
        }
        Ok(width)
    }

    pub fn apply_column_prefs(&mut self, prefs: &ColumnPrefs) {
        prefs.apply(&mut self.columns);
    }

    pub fn column_prefs(&self) -> ColumnPrefs {
        ColumnPrefs::from_columns(self.config.table_id.clone(), &self.columns)
    }

    /// Replaces the column set. Filters on columns that no longer exist or no
    /// longer accept filters are dropped, and likewise sort keys on columns
    /// that are gone or unsortable; if that changes the query, a request is
    /// issued.
    pub fn set_columns(&mut self, columns: Vec<Column>) -> Result<Option<FetchRequest>, ValidationError> {
        let columns = normalize_columns(columns)?;
        let by_id: HashMap<&str, &Column> = columns.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut filter = self.filter.clone();
        let stale: Vec<String> = filter
            .column_filters()
            .keys()
            .chain(filter.search_terms().keys())
            .filter(|id| !by_id.get(id.as_str()).is_some_and(|c| c.is_filterable()))
            .cloned()
            .collect();
        for id in &stale {
            filter.clear_column(id);
        }
        let mut sort = self.sort.clone();
        sort.set_keys(
            self.sort
                .keys()
                .iter()
                .filter(|k| by_id.get(k.column.as_str()).is_some_and(|c| c.sortable))
                .cloned()
                .collect(),
        )?;

        let changed = filter != self.filter || sort != self.sort;
        self.columns = columns;
        self.filter = filter;
        self.sort = sort;
        Ok(changed.then(|| self.query_changed(Change::Filter)))
    }

    fn emit_columns(&mut self) {
        let prefs = self.column_prefs();
        self.emit(TableEvent::ColumnsChanged(prefs));
    }

    // ─── Helpers ─────────────────────────────────────────────────────────────

    fn emit(&mut self, event: TableEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn column_mut(&mut self, column_id: &str) -> Result<&mut Column, ValidationError> {
        self.columns
            .iter_mut()
            .find(|c| c.id == column_id)
            .ok_or_else(|| ValidationError::UnknownColumn(column_id.to_string()))
    }

    fn known(&self, column_id: &str) -> Result<&Column, ValidationError> {
        if column_id.is_empty() {
            return Err(ValidationError::EmptyColumnId);
        }
        self.column(column_id)
            .ok_or_else(|| ValidationError::UnknownColumn(column_id.to_string()))
    }

    fn filterable(&self, column_id: &str) -> Result<(), ValidationError> {
        if self.known(column_id)?.is_filterable() {
            Ok(())
        } else {
            Err(ValidationError::NotFilterable(column_id.to_string()))
        }
    }

    fn sortable(&self, column_id: &str) -> Result<(), ValidationError> {
        if self.known(column_id)?.sortable {
            Ok(())
        } else {
            Err(ValidationError::NotSortable(column_id.to_string()))
        }
    }

    fn check_page_size(&self, size: usize) -> Result<(), ValidationError> {
        if size > self.config.max_page_size {
            return Err(ValidationError::PageSizeTooLarge {
                size,
                max: self.config.max_page_size,
            });
        }
        Ok(())
    }
}
