//! In-memory rule store.
//!
//! Thread-safe storage for campaigns and targeting rules, suitable for
//! development, tests, and deployments that load their rules from a fixture.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use reach_core::error::{ReachError, Result};
use reach_core::traits::RuleStore;
use reach_core::types::{Campaign, RuleAggregate, TargetingRule};

use crate::file::RuleFixture;

/// Counts of records written by [`MemoryRuleStore::import`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Campaigns inserted or updated
    pub campaigns: usize,
    /// Rules inserted or refreshed
    pub rules: usize,
}

/// In-memory rule store.
///
/// # Indexing
///
/// - Campaigns are kept in a `BTreeMap` keyed by id, so id-ordered keyset
///   pages are a range scan.
/// - Rules are bucketed by dimension, so aggregating one dimension touches
///   only that dimension's rules.
///
/// # Thread Safety
///
/// All operations are thread-safe and can be called concurrently.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    /// Primary storage: campaign_id → Campaign
    campaigns: RwLock<BTreeMap<String, Campaign>>,
    /// Dimension index: dimension → rules on that dimension
    rules: DashMap<String, Vec<TargetingRule>>,
}

impl MemoryRuleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store populated from a fixture.
    pub fn from_fixture(fixture: RuleFixture) -> Result<Self> {
        let store = Self::new();
        store.import(fixture)?;
        Ok(store)
    }

    /// Creates a store populated from a JSON fixture file.
    pub async fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let fixture = crate::file::load_fixture(path).await?;
        Self::from_fixture(fixture)
    }

    /// Inserts a campaign or updates an existing one.
    ///
    /// On update the original `created_at` is kept and `updated_at` is
    /// refreshed. Returns true if the campaign is new.
    pub fn upsert_campaign(&self, mut campaign: Campaign) -> Result<bool> {
        campaign.validate()?;

        let mut campaigns = self.campaigns.write();
        match campaigns.get_mut(&campaign.campaign_id) {
            Some(existing) => {
                campaign.created_at = existing.created_at;
                campaign.updated_at = Utc::now();
                *existing = campaign;
                Ok(false)
            }
            None => {
                debug!(campaign_id = %campaign.campaign_id, "Inserting campaign");
                campaigns.insert(campaign.campaign_id.clone(), campaign);
                Ok(true)
            }
        }
    }

    /// Inserts a rule, or refreshes `updated_at` if an identical rule exists.
    ///
    /// The rule's campaign must already be stored. Returns true if the rule
    /// is new.
    pub fn upsert_rule(&self, rule: TargetingRule) -> Result<bool> {
        rule.validate()?;

        if !self.campaigns.read().contains_key(&rule.campaign_id) {
            return Err(ReachError::InvalidRule(format!(
                "rule references unknown campaign '{}'",
                rule.campaign_id
            )));
        }

        let key = rule.key();
        let mut bucket = self.rules.entry(rule.dimension.clone()).or_default();
        match bucket.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => {
                existing.updated_at = Utc::now();
                Ok(false)
            }
            None => {
                bucket.push(rule);
                Ok(true)
            }
        }
    }

    /// Imports campaigns first, then rules.
    ///
    /// Stops at the first invalid record; records written before it stay.
    pub fn import(&self, fixture: RuleFixture) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for campaign in fixture.campaigns {
            self.upsert_campaign(campaign)?;
            summary.campaigns += 1;
        }
        for rule in fixture.rules {
            self.upsert_rule(rule)?;
            summary.rules += 1;
        }

        debug!(
            campaigns = summary.campaigns,
            rules = summary.rules,
            "Imported fixture"
        );
        Ok(summary)
    }

    /// Number of stored campaigns, any status.
    pub fn campaign_count(&self) -> usize {
        self.campaigns.read().len()
    }

    /// Number of stored rules.
    pub fn rule_count(&self) -> usize {
        self.rules.iter().map(|bucket| bucket.value().len()).sum()
    }

    /// Removes every campaign and rule.
    pub fn clear(&self) {
        self.campaigns.write().clear();
        self.rules.clear();
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    #[instrument(skip(self))]
    async fn active_campaigns(&self, after: Option<&str>, limit: usize) -> Result<Vec<Campaign>> {
        let campaigns = self.campaigns.read();
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };

        let page: Vec<Campaign> = campaigns
            .range::<str, _>((lower, Bound::Unbounded))
            .map(|(_, campaign)| campaign)
            .filter(|campaign| campaign.is_active())
            .take(limit)
            .cloned()
            .collect();

        debug!(count = page.len(), "Fetched active campaigns");
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn rule_aggregates(&self, dimension: &str, value: &str) -> Result<Vec<RuleAggregate>> {
        let Some(bucket) = self.rules.get(dimension) else {
            return Ok(Vec::new());
        };

        let mut by_campaign: BTreeMap<&str, RuleAggregate> = BTreeMap::new();
        for rule in bucket.iter() {
            by_campaign
                .entry(rule.campaign_id.as_str())
                .or_insert_with(|| RuleAggregate::new(rule.campaign_id.clone()))
                .observe(rule.rule_type, &rule.value, value);
        }

        debug!(count = by_campaign.len(), "Aggregated rules");
        Ok(by_campaign.into_values().collect())
    }

    async fn dimensions(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .rules
            .iter()
            .filter(|bucket| !bucket.value().is_empty())
            .map(|bucket| bucket.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn dimension_values(&self, dimension: &str) -> Result<Vec<String>> {
        let values: BTreeSet<String> = match self.rules.get(dimension) {
            Some(bucket) => bucket.iter().map(|rule| rule.value.clone()).collect(),
            None => BTreeSet::new(),
        };
        Ok(values.into_iter().collect())
    }
}
