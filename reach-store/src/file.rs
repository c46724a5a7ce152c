//! JSON rule fixtures.
//!
//! A fixture seeds a store with campaigns and their targeting rules:
//!
//! ```json
//! {
//!   "campaigns": [
//!     { "campaign_id": "spotify", "campaign_name": "Spotify", "image_url": "https://...",
//!       "call_to_action": "Download", "status": "ACTIVE" }
//!   ],
//!   "rules": [
//!     { "campaign_id": "spotify", "dimension": "country", "type": "include", "value": "US" }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, instrument};

use reach_core::error::{ReachError, Result};
use reach_core::types::{Campaign, TargetingRule};

/// Campaigns and rules loaded together.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleFixture {
    /// Campaign records
    pub campaigns: Vec<Campaign>,
    /// Targeting rules; every rule must reference a campaign above
    #[serde(default)]
    pub rules: Vec<TargetingRule>,
}

impl RuleFixture {
    /// Parses a fixture from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Reads and parses a fixture file.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_fixture(path: impl AsRef<Path>) -> Result<RuleFixture> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).await.map_err(|e| {
        ReachError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read rules file {}: {}", path.display(), e),
        ))
    })?;

    let fixture = RuleFixture::from_json(&contents)?;
    info!(
        campaigns = fixture.campaigns.len(),
        rules = fixture.rules.len(),
        "Loaded rules file"
    );
    Ok(fixture)
}
