//! The targeting resolution engine.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use reach_core::constants::{DEFAULT_SCAN_BATCH, DEFAULT_STORE_TIMEOUT};
use reach_core::error::{ReachError, Result};
use reach_core::traits::RuleStore;
use reach_core::types::{Campaign, CampaignSummary, RuleAggregate};

use crate::plan::{DimensionVerdict, TargetingPlan};

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Upper bound on each rule store call
    pub store_timeout: Duration,
    /// Campaigns fetched per keyset batch
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            batch_size: DEFAULT_SCAN_BATCH,
        }
    }
}

impl EngineConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-call store timeout.
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Sets the keyset batch size (at least 1).
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }
}

/// One requested dimension's aggregates, keyed by campaign id.
type DimensionRules = HashMap<String, RuleAggregate>;

/// Resolves targeting plans against a rule store.
///
/// Results are distinct by campaign id, ascending by id, and sliced to the
/// plan's page. Store failures propagate; nothing is retried and no partial
/// result is returned.
#[derive(Clone)]
pub struct TargetingEngine {
    store: Arc<dyn RuleStore>,
    config: EngineConfig,
}

impl TargetingEngine {
    /// Creates an engine with the default configuration.
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Creates an engine with a custom configuration.
    pub fn with_config(store: Arc<dyn RuleStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the underlying rule store.
    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }

    /// Returns the page of eligible campaigns for a plan.
    #[instrument(skip(self, plan), fields(dimensions = plan.predicates().len(), page = plan.page().page()))]
    pub async fn resolve(&self, plan: &TargetingPlan) -> Result<Vec<CampaignSummary>> {
        let start = Instant::now();

        let mut constraints: Vec<DimensionRules> = Vec::with_capacity(plan.predicates().len());
        for (dimension, value) in plan.predicates() {
            let aggregates = self
                .bounded(self.store.rule_aggregates(dimension, value))
                .await?;
            debug!(%dimension, constrained = aggregates.len(), "Loaded dimension rules");
            constraints.push(
                aggregates
                    .into_iter()
                    .map(|agg| (agg.campaign_id.clone(), agg))
                    .collect(),
            );
        }

        let page = plan.page();
        let limit = page.limit() as usize;
        let mut to_skip = page.offset();
        let mut selected = Vec::with_capacity(limit);
        let mut after: Option<String> = None;
        let mut scanned = 0usize;

        'scan: loop {
            let batch = self
                .bounded(
                    self.store
                        .active_campaigns(after.as_deref(), self.config.batch_size),
                )
                .await?;
            let exhausted = batch.len() < self.config.batch_size;
            let mut advanced = false;

            for campaign in &batch {
                // Keyset pages must advance strictly; anything else is skipped.
                if after.as_deref().is_some_and(|last| campaign.campaign_id.as_str() <= last) {
                    continue;
                }
                after = Some(campaign.campaign_id.clone());
                advanced = true;
                scanned += 1;

                if !Self::is_eligible(campaign, &constraints) {
                    continue;
                }
                if to_skip > 0 {
                    to_skip -= 1;
                    continue;
                }
                selected.push(campaign.summary());
                if selected.len() == limit {
                    break 'scan;
                }
            }

            if exhausted || batch.is_empty() {
                break;
            }
            if !advanced {
                warn!(after = ?after, "Rule store returned a page that did not advance");
                return Err(ReachError::Storage(format!(
                    "keyset page did not advance past '{}'",
                    after.unwrap_or_default()
                )));
            }
        }

        info!(
            returned = selected.len(),
            scanned,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Resolved targeting plan"
        );
        Ok(selected)
    }

    /// ACTIVE and passing every requested dimension.
    fn is_eligible(campaign: &Campaign, constraints: &[DimensionRules]) -> bool {
        campaign.is_active()
            && constraints.iter().all(|rules| {
                DimensionVerdict::evaluate(rules.get(&campaign.campaign_id)).passes()
            })
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ReachError::StorageTimeout {
                millis: self.config.store_timeout.as_millis() as u64,
            }),
        }
    }
}
