//! Campaign records and the summaries served to clients.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReachError, Result};

/// Delivery status of a campaign. Only active campaigns are ever served.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    /// Eligible for delivery
    Active,
    /// Never delivered
    Inactive,
}

impl CampaignStatus {
    /// Storage representation (`ACTIVE` / `INACTIVE`).
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "ACTIVE",
            CampaignStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = ReachError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(CampaignStatus::Active),
            "INACTIVE" => Ok(CampaignStatus::Inactive),
            other => Err(ReachError::InvalidRule(format!(
                "unknown campaign status '{}'",
                other
            ))),
        }
    }
}

/// An advertising campaign.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique, immutable identifier
    pub campaign_id: String,
    /// Display name
    pub campaign_name: String,
    /// Creative image reference
    pub image_url: String,
    /// Call-to-action text
    pub call_to_action: String,
    /// Delivery status
    pub status: CampaignStatus,
    /// Creation time
    #[serde(default = "super::now")]
    pub created_at: DateTime<Utc>,
    /// Last update time
    #[serde(default = "super::now")]
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Creates a new active campaign.
    pub fn new(
        campaign_id: impl Into<String>,
        campaign_name: impl Into<String>,
        image_url: impl Into<String>,
        call_to_action: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            campaign_id: campaign_id.into(),
            campaign_name: campaign_name.into(),
            image_url: image_url.into(),
            call_to_action: call_to_action.into(),
            status: CampaignStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the campaign with the given status.
    pub fn with_status(mut self, status: CampaignStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns true if the campaign may be delivered.
    pub fn is_active(&self) -> bool {
        self.status == CampaignStatus::Active
    }

    /// Validates the record before it is written to a store.
    pub fn validate(&self) -> Result<()> {
        if self.campaign_id.trim().is_empty() {
            return Err(ReachError::InvalidRule("campaign_id cannot be empty".into()));
        }
        if self.campaign_id.trim() != self.campaign_id {
            return Err(ReachError::InvalidRule(format!(
                "campaign_id '{}' has surrounding whitespace",
                self.campaign_id
            )));
        }
        Ok(())
    }

    /// Projection served by the delivery endpoint.
    pub fn summary(&self) -> CampaignSummary {
        CampaignSummary::from(self)
    }
}

/// The fields of a campaign returned to delivery clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    /// Campaign identifier
    pub campaign_id: String,
    /// Creative image reference
    pub image_url: String,
    /// Call-to-action text
    pub call_to_action: String,
}

impl From<&Campaign> for CampaignSummary {
    fn from(campaign: &Campaign) -> Self {
        Self {
            campaign_id: campaign.campaign_id.clone(),
            image_url: campaign.image_url.clone(),
            call_to_action: campaign.call_to_action.clone(),
        }
    }
}
