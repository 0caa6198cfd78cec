//! gridstate-core: the state engine behind entity list tables.
//!
//! A [`TableController`] owns filter, sort, page, selection and column
//! layout for one table. Mutations produce a [`FetchRequest`] carrying the
//! normalized [`QueryParams`] and a sequence token; the hosting code passes
//! it to a [`Fetcher`] (directly, or through a [`TableDriver`]) and reports
//! the outcome back. Responses to superseded requests are discarded.

pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod models;
pub mod page;
pub mod prefs;
pub mod query;
pub mod selection;
pub mod sort;

pub use config::TableConfig;
pub use controller::{FetchRequest, LoadState, ResponseOutcome, TableController, TableEvent};
pub use driver::TableDriver;
pub use error::{FetchError, GridError, ValidationError};
pub use fetch::{FetchResult, Fetcher, InMemoryFetcher};
pub use filter::{CombinationMode, FilterState};
pub use models::{Column, FilterKind, Row, RowId, WidthConstraint};
pub use page::PageState;
pub use prefs::{ColumnPrefs, PrefsStore};
pub use query::QueryParams;
pub use selection::SelectionState;
pub use sort::{SortDirection, SortKey, SortState};
