//! Targeting rules and their per-dimension aggregates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReachError, Result};

/// Whether a rule allow-lists or deny-lists its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Allow-list entry
    Include,
    /// Deny-list entry; always wins over an include match
    Exclude,
}

impl RuleType {
    /// Storage representation (`include` / `exclude`).
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Include => "include",
            RuleType::Exclude => "exclude",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = ReachError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" => Ok(RuleType::Include),
            "exclude" => Ok(RuleType::Exclude),
            other => Err(ReachError::InvalidRule(format!("unknown rule type '{}'", other))),
        }
    }
}

/// One targeting rule attached to a campaign.
///
/// `(campaign_id, dimension, rule_type, value)` is unique within a store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetingRule {
    /// Campaign the rule belongs to
    pub campaign_id: String,
    /// Free-form dimension name, e.g. `country`
    pub dimension: String,
    /// Include or exclude
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// Case-sensitive value matched against the request
    pub value: String,
    /// Creation time
    #[serde(default = "super::now")]
    pub created_at: DateTime<Utc>,
    /// Last upsert time
    #[serde(default = "super::now")]
    pub updated_at: DateTime<Utc>,
}

impl TargetingRule {
    /// Creates a rule stamped with the current time.
    pub fn new(
        campaign_id: impl Into<String>,
        dimension: impl Into<String>,
        rule_type: RuleType,
        value: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            campaign_id: campaign_id.into(),
            dimension: dimension.into(),
            rule_type,
            value: value.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an include rule.
    pub fn include(
        campaign_id: impl Into<String>,
        dimension: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(campaign_id, dimension, RuleType::Include, value)
    }

    /// Creates an exclude rule.
    pub fn exclude(
        campaign_id: impl Into<String>,
        dimension: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(campaign_id, dimension, RuleType::Exclude, value)
    }

    /// Validates the rule before it is written to a store.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("campaign_id", &self.campaign_id),
            ("dimension", &self.dimension),
            ("value", &self.value),
        ] {
            if value.trim().is_empty() {
                return Err(ReachError::InvalidRule(format!("{} cannot be empty", field)));
            }
        }
        Ok(())
    }

    /// Identity of the rule for upserts.
    pub fn key(&self) -> RuleKey {
        RuleKey {
            campaign_id: self.campaign_id.clone(),
            dimension: self.dimension.clone(),
            rule_type: self.rule_type,
            value: self.value.clone(),
        }
    }
}

/// Unique identity of a targeting rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    /// Campaign identifier
    pub campaign_id: String,
    /// Dimension name
    pub dimension: String,
    /// Include or exclude
    pub rule_type: RuleType,
    /// Rule value
    pub value: String,
}

/// Summary of one campaign's rules on one dimension, relative to a
/// requested value.
///
/// Stores only produce aggregates for campaigns that have at least one rule
/// on the dimension; a campaign without an aggregate is unconstrained.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAggregate {
    /// Campaign identifier
    pub campaign_id: String,
    /// An include rule matches the requested value
    pub has_include: bool,
    /// An exclude rule matches the requested value
    pub has_exclude: bool,
    /// Number of include rules on the dimension, any value
    pub include_count: u32,
}

impl RuleAggregate {
    /// Creates an empty aggregate for a campaign.
    pub fn new(campaign_id: impl Into<String>) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            ..Self::default()
        }
    }

    /// Folds one rule on the dimension into the aggregate.
    pub fn observe(&mut self, rule_type: RuleType, value: &str, requested: &str) {
        let matches = value == requested;
        match rule_type {
            RuleType::Include => {
                self.include_count += 1;
                self.has_include |= matches;
            }
            RuleType::Exclude => {
                self.has_exclude |= matches;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_type_serde() {
        let rule = TargetingRule::exclude("camp_2", "country", "JP");
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "exclude");

        let back: TargetingRule = serde_json::from_value(json).unwrap();
        assert_eq!(back.rule_type, RuleType::Exclude);
    }

    #[test]
    fn test_rule_type_parse() {
        assert_eq!("INCLUDE".parse::<RuleType>().unwrap(), RuleType::Include);
        assert!("allow".parse::<RuleType>().is_err());
    }

    #[test]
    fn test_validate() {
        assert!(TargetingRule::include("camp_1", "country", "US").validate().is_ok());
        assert!(TargetingRule::include("camp_1", " ", "US").validate().is_err());
        assert!(TargetingRule::include("camp_1", "country", "").validate().is_err());
    }

    #[test]
    fn test_aggregate_observe() {
        let mut agg = RuleAggregate::new("camp_1");
        agg.observe(RuleType::Include, "US", "JP");
        agg.observe(RuleType::Include, "JP", "JP");
        agg.observe(RuleType::Exclude, "DE", "JP");

        assert_eq!(agg.include_count, 2);
        assert!(agg.has_include);
        assert!(!agg.has_exclude);

        agg.observe(RuleType::Exclude, "JP", "JP");
        assert!(agg.has_exclude);
    }

    #[test]
    fn test_aggregate_values_are_case_sensitive() {
        let mut agg = RuleAggregate::new("camp_1");
        agg.observe(RuleType::Include, "us", "US");
        assert!(!agg.has_include);
        assert_eq!(agg.include_count, 1);
    }

    #[test]
    fn test_rule_key_identity() {
        let a = TargetingRule::include("c", "os", "android");
        let mut b = TargetingRule::include("c", "os", "android");
        b.updated_at = b.updated_at + chrono::Duration::seconds(10);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), TargetingRule::exclude("c", "os", "android").key());
    }
}
