//! # REACH Store
//!
//! Campaign and targeting rule storage for the REACH delivery service.
//!
//! This crate provides the [`RuleStore`] backends:
//!
//! - **Memory**: Concurrent in-memory store for development, tests, and fixtures
//! - **Fixture**: JSON rule files loaded into the memory store at startup
//! - **Sql**: libSQL / Turso store (behind the `turso` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use reach_store::{MemoryRuleStore, RuleStore};
//!
//! let store = MemoryRuleStore::from_file("rules.json").await?;
//!
//! // Aggregate every campaign's country rules against "US"
//! let aggregates = store.rule_aggregates("country", "US").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod file;
mod memory;
#[cfg(feature = "turso")]
mod sql;

pub use file::{load_fixture, RuleFixture};
pub use memory::{ImportSummary, MemoryRuleStore};
#[cfg(feature = "turso")]
pub use sql::SqlRuleStore;

// Re-export the trait from core
pub use reach_core::traits::RuleStore;
