//! The normalized query-parameter object handed to the fetch collaborator,
//! and its URL query-string encoding.
//!
//! Encoding (`application/x-www-form-urlencoded`):
//!
//! | key             | value                         | repeated |
//! |-----------------|-------------------------------|----------|
//! | `filter.<col>`  | one selected value            | yes      |
//! | `search.<col>`  | column search term            | no       |
//! | `match`         | `and` (absent means `or`)     | no       |
//! | `q`             | global query                  | no       |
//! | `order`         | `<col>:<asc\|desc>`           | yes, in priority order |
//! | `page`          | zero-based page index         | no       |
//! | `size`          | page size                     | no       |
//!
//! Unknown keys are ignored so the table can share a URL with routing state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::ValidationError;
use crate::filter::CombinationMode;
use crate::sort::{SortDirection, SortKey};

const FILTER_PREFIX: &str = "filter.";
const SEARCH_PREFIX: &str = "search.";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryParams {
    /// Selected values per column, sorted and de-duplicated.
    pub filters: BTreeMap<String, Vec<String>>,
    pub search_terms: BTreeMap<String, String>,
    pub combination: CombinationMode,
    pub order_by: Vec<SortKey>,
    pub offset: usize,
    pub limit: usize,
    pub global_query: Option<String>,
    /// Columns the global query applies to. Derived from the column set,
    /// never written to the URL.
    #[serde(default)]
    pub search_fields: Vec<String>,
}

impl QueryParams {
    pub fn page_index(&self) -> usize {
        if self.limit == 0 {
            0
        } else {
            self.offset / self.limit
        }
    }

    /// Human-readable filter clauses, e.g. `status IN (completed, failed)`.
    pub fn filter_clauses(&self) -> Vec<String> {
        let op = match self.combination {
            CombinationMode::Or => "IN",
            CombinationMode::And => "ALL",
        };
        self.filters
            .iter()
            .map(|(column, values)| format!("{column} {op} ({})", values.join(", ")))
            .chain(
                self.search_terms
                    .iter()
                    .map(|(column, term)| format!("{column} LIKE '%{term}%'")),
            )
            .collect()
    }

    /// The `order_by` clause, e.g. `name asc, created desc`.
    pub fn order_by_clause(&self) -> String {
        self.order_by
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn to_query_string(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        for (column, values) in &self.filters {
            let key = format!("{FILTER_PREFIX}{column}");
            for value in values {
                out.append_pair(&key, value);
            }
        }
        for (column, term) in &self.search_terms {
            out.append_pair(&format!("{SEARCH_PREFIX}{column}"), term);
        }
        if self.combination == CombinationMode::And {
            out.append_pair("match", "and");
        }
        if let Some(q) = &self.global_query {
            out.append_pair("q", q);
        }
        for key in &self.order_by {
            out.append_pair("order", &format!("{}:{}", key.column, key.direction));
        }
        out.append_pair("page", &self.page_index().to_string());
        out.append_pair("size", &self.limit.to_string());
        out.finish()
    }

    /// Parses a query string produced by [`QueryParams::to_query_string`].
    /// A leading `?` is accepted. Missing `size` falls back to `default_size`.
    pub fn from_query_string(query: &str, default_size: usize) -> Result<Self, ValidationError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut filters: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut params = QueryParams::default();
        let mut page = 0usize;
        let mut size = default_size;

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if let Some(column) = key.strip_prefix(FILTER_PREFIX) {
                if column.is_empty() {
                    return Err(ValidationError::EmptyColumnId);
                }
                if !value.is_empty() {
                    filters
                        .entry(column.to_string())
                        .or_default()
                        .insert(value.into_owned());
                }
            } else if let Some(column) = key.strip_prefix(SEARCH_PREFIX) {
                if column.is_empty() {
                    return Err(ValidationError::EmptyColumnId);
                }
                if !value.is_empty() {
                    params
                        .search_terms
                        .insert(column.to_string(), value.into_owned());
                }
            } else {
                match &*key {
                    "match" => params.combination = value.parse::<CombinationMode>()?,
                    "q" => {
                        let q = value.trim();
                        params.global_query = (!q.is_empty()).then(|| q.to_string());
                    }
                    "order" => params.order_by.push(parse_order(&value)?),
                    "page" => page = parse_number("page", &value)?,
                    "size" => size = parse_number("size", &value)?,
                    _ => {}
                }
            }
        }

        if size == 0 {
            return Err(ValidationError::InvalidPageSize(size));
        }
        params.filters = filters
            .into_iter()
            .map(|(column, values)| (column, values.into_iter().collect()))
            .collect();
        params.limit = size;
        params.offset = page
            .checked_mul(size)
            .ok_or_else(|| ValidationError::InvalidNumber {
                key: "page".to_string(),
                value: page.to_string(),
            })?;
        Ok(params)
    }
}

fn parse_order(value: &str) -> Result<SortKey, ValidationError> {
    let (column, direction) = value
        .rsplit_once(':')
        .ok_or_else(|| ValidationError::InvalidDirection(value.to_string()))?;
    if column.is_empty() {
        return Err(ValidationError::EmptyColumnId);
    }
    Ok(SortKey {
        column: column.to_string(),
        direction: direction.parse::<SortDirection>()?,
    })
}

fn parse_number(key: &str, value: &str) -> Result<usize, ValidationError> {
    value.parse().map_err(|_| ValidationError::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}
