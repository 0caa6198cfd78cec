//! Per-table configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for a single table instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TableConfig {
    /// Key under which column preferences are stored (e.g. "experiments")
    pub table_id: String,
    /// Page size at mount and after a context reset (default: 50)
    pub default_page_size: usize,
    /// Largest page size `set_page_size` accepts (default: 500)
    pub max_page_size: usize,
    /// Keep selected rows that fall outside the loaded page
    pub preserve_selection: bool,
    /// Driver-side request timeout in milliseconds
    pub fetch_timeout_ms: Option<u64>,
    /// Abort superseded in-flight fetch tasks instead of letting them finish
    pub abort_superseded: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            table_id: "table".to_string(),
            default_page_size: 50,
            max_page_size: 500,
            preserve_selection: false,
            fetch_timeout_ms: None,
            abort_superseded: false,
        }
    }
}

impl TableConfig {
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            ..Default::default()
        }
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size;
        self
    }

    pub fn with_max_page_size(mut self, max: usize) -> Self {
        self.max_page_size = max;
        self
    }

    pub fn with_preserved_selection(mut self, preserve: bool) -> Self {
        self.preserve_selection = preserve;
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.fetch_timeout_ms = Some(ms);
        self
    }

    pub fn with_abort_superseded(mut self, abort: bool) -> Self {
        self.abort_superseded = abort;
        self
    }

    /// Reads a YAML config. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}
