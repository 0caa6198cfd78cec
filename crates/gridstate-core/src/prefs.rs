//! Column layout preferences: what the user hid, reordered or resized.
//!
//! The controller emits a fresh [`ColumnPrefs`] whenever the layout changes;
//! [`PrefsStore`] keeps one entry per table in a YAML file.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::models::Column;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnPref {
    pub id: String,
    pub visible: bool,
    pub order: usize,
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnPrefs {
    pub table_id: String,
    pub columns: Vec<ColumnPref>,
    pub updated_at: DateTime<Utc>,
}

impl ColumnPrefs {
    pub fn from_columns(table_id: impl Into<String>, columns: &[Column]) -> Self {
        Self {
            table_id: table_id.into(),
            columns: columns
                .iter()
                .map(|c| ColumnPref {
                    id: c.id.clone(),
                    visible: c.visible,
                    order: c.order,
                    width: c.width,
                })
                .collect(),
            updated_at: Utc::now(),
        }
    }

    /// Re-applies stored preferences to a column set.
    ///
    /// Preferences for columns that no longer exist are ignored. Columns the
    /// preferences do not mention (added since they were saved) keep their
    /// relative order and go after the known ones. Widths are clamped to the
    /// column's constraints.
    pub fn apply(&self, columns: &mut Vec<Column>) {
        let prefs: HashMap<&str, &ColumnPref> =
            self.columns.iter().map(|p| (p.id.as_str(), p)).collect();

        for column in columns.iter_mut() {
            if let Some(pref) = prefs.get(column.id.as_str()) {
                column.visible = pref.visible;
                if let Some(width) = pref.width {
                    column.width = Some(column.width_range.clamp(width));
                }
            }
        }

        columns.sort_by_key(|c| match prefs.get(c.id.as_str()) {
            Some(pref) => (0, pref.order, c.order),
            None => (1, c.order, c.order),
        });
        for (i, column) in columns.iter_mut().enumerate() {
            column.order = i;
        }
    }
}

/// File-backed preference storage, one YAML mapping keyed by table id.
#[derive(Debug, Clone)]
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self, table_id: &str) -> Result<Option<ColumnPrefs>> {
        let mut all = self.load_all()?;
        Ok(all.remove(table_id))
    }

    pub fn save(&self, prefs: &ColumnPrefs) -> Result<()> {
        let mut all = self.load_all()?;
        all.insert(prefs.table_id.clone(), prefs.clone());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_yaml::to_string(&all)?)?;
        info!(table = %prefs.table_id, path = %self.path.display(), "Saved column preferences");
        Ok(())
    }

    fn load_all(&self) -> Result<BTreeMap<String, ColumnPrefs>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_yaml::from_str(&content)?)
    }
}
