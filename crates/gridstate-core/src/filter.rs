//! Per-column filter selections, per-column search terms and the global query.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How multiple selected values within one column combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinationMode {
    /// Row matches if its value is any of the selected values.
    #[default]
    Or,
    /// Row matches only if it carries every selected value.
    And,
}

impl CombinationMode {
    pub fn toggled(self) -> Self {
        match self {
            CombinationMode::Or => CombinationMode::And,
            CombinationMode::And => CombinationMode::Or,
        }
    }
}

impl std::fmt::Display for CombinationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CombinationMode::Or => write!(f, "or"),
            CombinationMode::And => write!(f, "and"),
        }
    }
}

impl FromStr for CombinationMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "or" => Ok(CombinationMode::Or),
            "and" => Ok(CombinationMode::And),
            _ => Err(ValidationError::InvalidMatchMode(s.to_string())),
        }
    }
}

/// One entry of the active filter summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFilter {
    pub column: String,
    pub values: Vec<String>,
    pub search_term: Option<String>,
}

/// Filter selections for a single table.
///
/// A column absent from the selection map is unfiltered; it never means
/// "exclude everything".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    columns: BTreeMap<String, BTreeSet<String>>,
    search_terms: BTreeMap<String, String>,
    global_query: String,
    combination: CombinationMode,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the selected values for a column. An empty set removes the entry.
    pub fn set_column_filter<I, S>(&mut self, column_id: &str, values: I) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if column_id.is_empty() {
            return Err(ValidationError::EmptyColumnId);
        }
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.columns.remove(column_id);
        } else {
            self.columns.insert(column_id.to_string(), values);
        }
        Ok(())
    }

    /// Sets the free-text term narrowing one column. An empty term removes it.
    pub fn set_column_search_term(&mut self, column_id: &str, term: &str) -> Result<(), ValidationError> {
        if column_id.is_empty() {
            return Err(ValidationError::EmptyColumnId);
        }
        if term.is_empty() {
            self.search_terms.remove(column_id);
        } else {
            self.search_terms.insert(column_id.to_string(), term.to_string());
        }
        Ok(())
    }

    /// Sets the unscoped search string. Surrounding whitespace is ignored.
    pub fn set_global_query(&mut self, text: &str) {
        self.global_query = text.trim().to_string();
    }

    pub fn toggle_combination_mode(&mut self) {
        self.combination = self.combination.toggled();
    }

    pub fn set_combination_mode(&mut self, mode: CombinationMode) {
        self.combination = mode;
    }

    /// Drops both the selection and the search term of one column.
    pub fn clear_column(&mut self, column_id: &str) {
        self.columns.remove(column_id);
        self.search_terms.remove(column_id);
    }

    pub fn clear_all(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        !self.columns.is_empty() || !self.search_terms.is_empty() || !self.global_query.is_empty()
    }

    pub fn column_filter(&self, column_id: &str) -> Option<&BTreeSet<String>> {
        self.columns.get(column_id)
    }

    pub fn column_filters(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.columns
    }

    pub fn search_term(&self, column_id: &str) -> Option<&str> {
        self.search_terms.get(column_id).map(String::as_str)
    }

    pub fn search_terms(&self) -> &BTreeMap<String, String> {
        &self.search_terms
    }

    pub fn global_query(&self) -> Option<&str> {
        (!self.global_query.is_empty()).then_some(self.global_query.as_str())
    }

    pub fn combination(&self) -> CombinationMode {
        self.combination
    }

    /// Narrows an enum picker's option list by the column's search term
    /// (case-insensitive substring). Without a term every option is kept.
    pub fn visible_options<'a, S: AsRef<str>>(&self, column_id: &str, options: &'a [S]) -> Vec<&'a str> {
        let needle = self.search_term(column_id).map(str::to_lowercase);
        options
            .iter()
            .map(|option| option.as_ref())
            .filter(|option| match &needle {
                Some(needle) => option.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .collect()
    }

    /// Columns that currently restrict the row set, ordered by column id.
    pub fn active_summary(&self) -> Vec<ActiveFilter> {
        let ids: BTreeSet<&String> = self.columns.keys().chain(self.search_terms.keys()).collect();
        ids.into_iter()
            .map(|id| ActiveFilter {
                column: id.clone(),
                values: self
                    .columns
                    .get(id)
                    .map(|v| v.iter().cloned().collect())
                    .unwrap_or_default(),
                search_term: self.search_terms.get(id).cloned(),
            })
            .collect()
    }
}
