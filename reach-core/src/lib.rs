//! # REACH Core
//!
//! Core types, errors, and traits for the REACH campaign delivery service.
//!
//! This crate provides the foundational building blocks used by all other REACH crates:
//!
//! - **Types**: Campaigns, targeting rules, rule aggregates, and targeting requests
//! - **Errors**: The error taxonomy shared by the store, engine, cache, and API
//! - **Constants**: Mandatory dimensions, pagination bounds, and cache defaults
//! - **Traits**: The rule store and observer interfaces injected into the service
//!
//! ## Example
//!
//! ```rust
//! use reach_core::{Page, TargetingRequest};
//!
//! let mut request = TargetingRequest::new(Page::default());
//! request.insert("country", " US ");
//! assert_eq!(request.get("country"), Some("US"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{ReachError, Result};
pub use traits::*;
pub use types::*;
