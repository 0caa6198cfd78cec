//! Error types for gridstate-core.

use thiserror::Error;

/// Malformed filter, sort, page or selection input.
///
/// Every mutation that returns one of these leaves the table state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("column identifier must not be empty")]
    EmptyColumnId,

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("duplicate column identifier: {0}")]
    DuplicateColumn(String),

    #[error("column is not sortable: {0}")]
    NotSortable(String),

    #[error("column does not accept filters: {0}")]
    NotFilterable(String),

    #[error("page size must be positive, got {0}")]
    InvalidPageSize(usize),

    #[error("page size {size} exceeds the maximum of {max}")]
    PageSizeTooLarge { size: usize, max: usize },

    #[error("invalid sort direction: {0}")]
    InvalidDirection(String),

    #[error("invalid filter combination mode: {0}")]
    InvalidMatchMode(String),

    #[error("invalid number for '{key}': {value}")]
    InvalidNumber { key: String, value: String },

    #[error("row is not loaded: {0}")]
    UnknownRow(String),
}

/// A failed request reported by the fetch collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    /// The request was aborted because a newer one superseded it.
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum GridError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Table driver channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, GridError>;
