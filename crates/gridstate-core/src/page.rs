//! Pagination state.

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    /// Zero-based page index.
    pub index: usize,
    /// Rows per page, always positive.
    pub size: usize,
    /// Server-supplied total row count, when known.
    pub total: Option<usize>,
}

impl PageState {
    pub fn new(size: usize) -> Result<Self, ValidationError> {
        if size == 0 {
            return Err(ValidationError::InvalidPageSize(size));
        }
        Ok(Self {
            index: 0,
            size,
            total: None,
        })
    }

    /// Moves to `index`. An index whose row offset does not fit in `usize`
    /// is rejected.
    pub fn set_page(&mut self, index: usize) -> Result<(), ValidationError> {
        if index.checked_mul(self.size).is_none() {
            return Err(ValidationError::InvalidNumber {
                key: "page".to_string(),
                value: index.to_string(),
            });
        }
        self.index = index;
        Ok(())
    }

    /// Changes the page size and always returns to the first page.
    pub fn set_page_size(&mut self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::InvalidPageSize(size));
        }
        self.size = size;
        self.index = 0;
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.index.saturating_mul(self.size)
    }

    /// Number of pages implied by the total-count hint.
    pub fn page_count(&self) -> Option<usize> {
        self.total.map(|total| total.div_ceil(self.size).max(1))
    }

    pub fn has_next(&self) -> bool {
        match self.page_count() {
            Some(count) => self.index + 1 < count,
            None => true,
        }
    }

    /// Moves back to the last page when the total shrank below the current
    /// offset. Returns true if the index changed.
    pub fn clamp_to_total(&mut self) -> bool {
        match self.page_count() {
            Some(count) if self.index >= count => {
                self.index = count - 1;
                true
            }
            _ => false,
        }
    }
}
