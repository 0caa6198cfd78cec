//! Ordered multi-column sort with the header click cycle `none -> desc -> asc -> none`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(ValidationError::InvalidDirection(s.to_string())),
        }
    }
}

/// One `(column, direction)` entry of a sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Renders as `name asc`, the `order_by` form sent to the server.
impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.column, self.direction)
    }
}

/// Ordered list of sort keys; the first key is the primary one. A column appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    keys: Vec<SortKey>,
}

impl SortState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a header click.
    ///
    /// A plain click replaces the whole key list with the next step of the
    /// column's cycle. A shift-click (`additive`) steps only that column,
    /// in place: absent keys are appended, `asc` keys are removed, and the
    /// other keys never move.
    pub fn apply_sort(&mut self, column_id: &str, additive: bool) -> Result<(), ValidationError> {
        if column_id.is_empty() {
            return Err(ValidationError::EmptyColumnId);
        }
        let position = self.position_of(column_id);
        let next = match position.map(|i| self.keys[i].direction) {
            None => Some(SortDirection::Desc),
            Some(SortDirection::Desc) => Some(SortDirection::Asc),
            Some(SortDirection::Asc) => None,
        };

        if !additive {
            self.keys = next
                .map(|direction| SortKey {
                    column: column_id.to_string(),
                    direction,
                })
                .into_iter()
                .collect();
            return Ok(());
        }

        match (position, next) {
            (Some(i), Some(direction)) => self.keys[i].direction = direction,
            (Some(i), None) => {
                self.keys.remove(i);
            }
            (None, Some(direction)) => self.keys.push(SortKey {
                column: column_id.to_string(),
                direction,
            }),
            (None, None) => {}
        }
        Ok(())
    }

    pub fn clear_sort(&mut self) {
        self.keys.clear();
    }

    /// Replaces the keys wholesale, e.g. when restoring from a URL.
    /// Later duplicates of a column are dropped.
    pub fn set_keys(&mut self, keys: Vec<SortKey>) -> Result<(), ValidationError> {
        let mut deduped: Vec<SortKey> = Vec::with_capacity(keys.len());
        for key in keys {
            if key.column.is_empty() {
                return Err(ValidationError::EmptyColumnId);
            }
            if !deduped.iter().any(|k| k.column == key.column) {
                deduped.push(key);
            }
        }
        self.keys = deduped;
        Ok(())
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn direction_of(&self, column_id: &str) -> Option<SortDirection> {
        self.keys
            .iter()
            .find(|k| k.column == column_id)
            .map(|k| k.direction)
    }

    /// Zero-based priority of a column in the key list.
    pub fn position_of(&self, column_id: &str) -> Option<usize> {
        self.keys.iter().position(|k| k.column == column_id)
    }
}
