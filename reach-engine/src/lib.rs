//! # REACH Engine
//!
//! Resolves which campaigns a targeting request may see.
//!
//! ## Features
//!
//! - **Per-dimension verdicts**: include/exclude rules interpreted one dimension at a time
//! - **AND across dimensions**: a campaign must pass every requested dimension
//! - **Keyset scanning**: active campaigns walked in id order, in bounded batches
//! - **Bounded store calls**: every rule store call runs under a timeout
//!
//! ## Example
//!
//! ```rust,ignore
//! use reach_engine::{TargetingEngine, TargetingPlan};
//!
//! let engine = TargetingEngine::new(store);
//! let plan = TargetingPlan::new([("country", "US"), ("os", "android")], Page::default());
//!
//! for campaign in engine.resolve(&plan).await? {
//!     println!("{} -> {}", campaign.campaign_id, campaign.call_to_action);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod engine;
mod plan;

pub use engine::{EngineConfig, TargetingEngine};
pub use plan::{DimensionVerdict, TargetingPlan};
