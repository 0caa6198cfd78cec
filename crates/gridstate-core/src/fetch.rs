//! The fetch collaborator boundary, plus an in-memory implementation that
//! evaluates [`QueryParams`] locally.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;
use crate::filter::CombinationMode;
use crate::models::{display_value, Column, Row};
use crate::query::QueryParams;
use crate::sort::SortDirection;

/// One page of rows as returned by the fetch collaborator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchResult {
    pub rows: Vec<Row>,
    /// Number of rows matching the filter across all pages, when known.
    pub total_count: Option<usize>,
}

/// Issues the actual request for a set of query parameters.
///
/// Implementations own transport, retries and timeouts; the controller only
/// sees the outcome.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, params: &QueryParams) -> Result<FetchResult, FetchError>;
}

/// Serves rows from memory, applying filters, search, sort and paging the way
/// a backend would.
#[derive(Debug, Clone)]
pub struct InMemoryFetcher {
    rows: Vec<Row>,
    paths: HashMap<String, String>,
}

impl InMemoryFetcher {
    /// Column ids in query parameters are resolved to data paths through
    /// `columns`; ids with no matching column are used as paths directly.
    pub fn new(rows: Vec<Row>, columns: &[Column]) -> Self {
        Self {
            rows,
            paths: columns
                .iter()
                .map(|c| (c.id.clone(), c.path.clone()))
                .collect(),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn evaluate(&self, params: &QueryParams) -> FetchResult {
        let mut matched: Vec<&Row> = self.rows.iter().filter(|row| self.matches(row, params)).collect();

        matched.sort_by(|a, b| {
            params
                .order_by
                .iter()
                .map(|key| {
                    let path = self.path(&key.column);
                    let ord = compare_values(a.value_at(path), b.value_at(path));
                    match key.direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or_else(|| a.id.cmp(&b.id))
        });

        let total = matched.len();
        let rows = matched
            .into_iter()
            .skip(params.offset)
            .take(params.limit)
            .cloned()
            .collect();
        FetchResult {
            rows,
            total_count: Some(total),
        }
    }

    fn path<'a>(&'a self, column: &'a str) -> &'a str {
        self.paths.get(column).map(String::as_str).unwrap_or(column)
    }

    fn matches(&self, row: &Row, params: &QueryParams) -> bool {
        let filters_ok = params.filters.iter().all(|(column, selected)| {
            let cell = cell_values(row.value_at(self.path(column)));
            match params.combination {
                CombinationMode::Or => selected.iter().any(|v| cell.contains(v)),
                CombinationMode::And => selected.iter().all(|v| cell.contains(v)),
            }
        });
        if !filters_ok {
            return false;
        }

        let terms_ok = params
            .search_terms
            .iter()
            .all(|(column, term)| contains_text(row.value_at(self.path(column)), term));
        if !terms_ok {
            return false;
        }

        match &params.global_query {
            Some(q) => params
                .search_fields
                .iter()
                .any(|column| contains_text(row.value_at(self.path(column)), q)),
            None => true,
        }
    }
}

#[async_trait]
impl Fetcher for InMemoryFetcher {
    async fn fetch(&self, params: &QueryParams) -> Result<FetchResult, FetchError> {
        Ok(self.evaluate(params))
    }
}

/// Values a cell offers to an enum filter; array cells offer each element.
fn cell_values(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        None | Some(Value::Null) => BTreeSet::new(),
        Some(Value::Array(items)) => items.iter().map(display_value).collect(),
        Some(v) => BTreeSet::from([display_value(v)]),
    }
}

fn contains_text(value: Option<&Value>, needle: &str) -> bool {
    value
        .map(|v| display_value(v).to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Orders cells null < number < string < object < array < bool, then by
/// value within a type.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x @ Value::Array(_)), Some(y @ Value::Array(_)))
        | (Some(x @ Value::Object(_)), Some(y @ Value::Object(_))) => {
            display_value(x).cmp(&display_value(y))
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
