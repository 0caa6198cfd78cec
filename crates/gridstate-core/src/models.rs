//! Data models for gridstate: columns and rows.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Stable identifier of a server-supplied row.
pub type RowId = String;

/// How a column can be filtered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Pick one or more values from a known option list (status, tags, user).
    Enum,
    /// Free-text matching on the cell value.
    Text,
    #[default]
    None,
}

/// Optional lower/upper bound on a column's width, in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct WidthConstraint {
    #[serde(default)]
    pub min: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
}

impl WidthConstraint {
    pub fn clamp(&self, width: u32) -> u32 {
        let width = self.min.map_or(width, |min| width.max(min));
        self.max.map_or(width, |max| width.min(max))
    }
}

/// A table column as declared by the hosting view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    /// Unique key within the table.
    pub id: String,
    /// Display header.
    pub header: String,
    /// Dot-path into a row (e.g. "last_metrics.loss" or "tags.0").
    pub path: String,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub filter: FilterKind,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Left-to-right display position.
    #[serde(default)]
    pub order: usize,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub width_range: WidthConstraint,
    /// Participates in the table-wide "any field" search.
    #[serde(default)]
    pub global_search: bool,
}

fn default_visible() -> bool {
    true
}

impl Column {
    pub fn new(id: impl Into<String>, header: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            path: id.clone(),
            id,
            header: header.into(),
            sortable: false,
            filter: FilterKind::None,
            visible: true,
            order: 0,
            width: None,
            width_range: WidthConstraint::default(),
            global_search: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn with_filter(mut self, kind: FilterKind) -> Self {
        self.filter = kind;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.global_search = true;
        self
    }

    pub fn with_width(mut self, width: u32, range: WidthConstraint) -> Self {
        self.width_range = range;
        self.width = Some(range.clamp(width));
        self
    }

    pub fn is_filterable(&self) -> bool {
        self.filter != FilterKind::None
    }
}

/// Checks column identifiers are non-empty and unique, then normalises
/// `order` so the indices are a dense 0..n sequence in the declared order.
pub fn normalize_columns(mut columns: Vec<Column>) -> Result<Vec<Column>, ValidationError> {
    let mut seen = HashSet::new();
    for column in &columns {
        if column.id.is_empty() {
            return Err(ValidationError::EmptyColumnId);
        }
        if !seen.insert(column.id.as_str()) {
            return Err(ValidationError::DuplicateColumn(column.id.clone()));
        }
    }
    // Stable: columns sharing an order index keep their declaration order.
    columns.sort_by_key(|c| c.order);
    for (i, column) in columns.iter_mut().enumerate() {
        column.order = i;
    }
    Ok(columns)
}

/// An opaque server-supplied record keyed by a stable identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub data: Value,
}

impl Row {
    pub fn new(id: impl Into<RowId>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Builds a row from a JSON record, taking its identifier from `id_path`.
    /// Returns `None` when the identifier is missing or not a scalar.
    pub fn from_json(data: Value, id_path: &str) -> Option<Self> {
        let id = match value_at(&data, id_path)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self { id, data })
    }

    pub fn value_at(&self, path: &str) -> Option<&Value> {
        value_at(&self.data, path)
    }

    /// Display text for a column's cell.
    pub fn display(&self, column: &Column) -> String {
        self.value_at(&column.path)
            .map(display_value)
            .unwrap_or_default()
    }
}

/// Resolves a dot-path into a JSON value. Numeric segments index arrays.
pub fn value_at<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Renders a cell value as plain text: strings unquoted, null as empty,
/// arrays joined with ", ".
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_at_nested_and_indexed() {
        let row = Row::new(
            "t1",
            json!({"name": "train", "last_metrics": {"loss": 0.25}, "tags": ["a", "b"]}),
        );
        assert_eq!(row.value_at("last_metrics.loss"), Some(&json!(0.25)));
        assert_eq!(row.value_at("tags.1"), Some(&json!("b")));
        assert_eq!(row.value_at("tags.7"), None);
        assert_eq!(row.value_at("name.inner"), None);
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!(null)), "");
        assert_eq!(display_value(&json!("x")), "x");
        assert_eq!(display_value(&json!(["a", 1])), "a, 1");
    }

    #[test]
    fn test_normalize_columns_rejects_duplicates() {
        let cols = vec![Column::new("a", "A"), Column::new("a", "Again")];
        assert_eq!(
            normalize_columns(cols),
            Err(ValidationError::DuplicateColumn("a".to_string()))
        );
    }

    #[test]
    fn test_width_clamp() {
        let range = WidthConstraint {
            min: Some(40),
            max: Some(200),
        };
        assert_eq!(range.clamp(10), 40);
        assert_eq!(range.clamp(500), 200);
        assert_eq!(range.clamp(120), 120);
    }
}
