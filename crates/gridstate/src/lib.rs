#![doc = include_str!("../../../README.md")]
//!

//! This crate re-exports the table engine from `gridstate-core`.

pub use gridstate_core::*;
