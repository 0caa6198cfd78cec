//! Row selection.

use std::collections::{BTreeSet, HashSet};

use crate::models::RowId;

/// Selected row identifiers plus the "every row matching the filter" flag.
///
/// `all_filtered` is tracked separately from `ids` because the full filtered
/// set may be larger than what is loaded, or unknown client-side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    ids: BTreeSet<RowId>,
    all_filtered: bool,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips one row. Deselecting any row drops the all-filtered flag.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            self.all_filtered = false;
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn select_many<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        self.ids.extend(ids.into_iter().map(str::to_string));
    }

    pub fn set_all_filtered(&mut self, value: bool) {
        self.all_filtered = value;
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.all_filtered = false;
    }

    /// Keeps only identifiers contained in `loaded`. Returns true if anything was removed.
    pub fn prune_to(&mut self, loaded: &HashSet<&str>) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| loaded.contains(id.as_str()));
        before != self.ids.len()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &BTreeSet<RowId> {
        &self.ids
    }

    pub fn all_filtered(&self) -> bool {
        self.all_filtered
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && !self.all_filtered
    }
}
