//! Domain types for REACH.
//!
//! - [`Campaign`]: An advertising campaign and its delivery status
//! - [`TargetingRule`]: One include/exclude entry on a dimension
//! - [`RuleAggregate`]: Per-campaign summary of the rules on one dimension
//! - [`TargetingRequest`]: Requested dimension values plus pagination

mod campaign;
mod request;
mod rule;

pub use campaign::*;
pub use request::*;
pub use rule::*;

use chrono::{DateTime, Utc};

/// Default timestamp for records deserialized without one.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}
