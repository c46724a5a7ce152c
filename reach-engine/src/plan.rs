//! Targeting plans and the per-dimension eligibility rule.

use std::collections::HashSet;

use reach_core::types::{Page, RuleAggregate, TargetingRequest};

/// Outcome of one campaign's rules on one requested dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DimensionVerdict {
    /// The campaign has no rules on the dimension
    Unconstrained,
    /// Rules exist and the requested value is allowed
    Allowed,
    /// The campaign allow-lists other values only
    NotIncluded,
    /// An exclude rule matches the requested value
    Excluded,
}

impl DimensionVerdict {
    /// Applies the eligibility rule to a campaign's aggregate, if any.
    ///
    /// Exclusion wins over inclusion. Include rules form an allow-list only
    /// when at least one exists on the dimension.
    pub fn evaluate(aggregate: Option<&RuleAggregate>) -> Self {
        match aggregate {
            None => DimensionVerdict::Unconstrained,
            Some(agg) if agg.has_exclude => DimensionVerdict::Excluded,
            Some(agg) if agg.include_count > 0 && !agg.has_include => DimensionVerdict::NotIncluded,
            Some(_) => DimensionVerdict::Allowed,
        }
    }

    /// Returns true if the campaign passes this dimension.
    pub fn passes(&self) -> bool {
        matches!(self, DimensionVerdict::Unconstrained | DimensionVerdict::Allowed)
    }
}

/// The abstract query handed to the engine: dimension predicates plus a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetingPlan {
    predicates: Vec<(String, String)>,
    page: Page,
}

impl TargetingPlan {
    /// Builds a plan from `(dimension, value)` pairs.
    ///
    /// A repeated dimension keeps its first value.
    pub fn new<I, K, V>(pairs: I, page: Page) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut seen = HashSet::new();
        let predicates = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| seen.insert(k.clone()))
            .collect();
        Self { predicates, page }
    }

    /// Requested `(dimension, value)` pairs.
    pub fn predicates(&self) -> &[(String, String)] {
        &self.predicates
    }

    /// Page to return.
    pub fn page(&self) -> Page {
        self.page
    }
}

impl From<&TargetingRequest> for TargetingPlan {
    fn from(request: &TargetingRequest) -> Self {
        Self::new(request.dimensions(), request.page())
    }
}
