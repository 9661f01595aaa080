//! Brand consolidation
//!
//! Multi-branch brands would otherwise flood a short itinerary. Every candidate claimed by
//! a brand rule is collapsed into that brand's branch nearest to the origin.

use tracing::debug;

use crate::geo::distance_km;
use crate::models::{Candidate, Coordinate};

/// Decides whether a candidate name belongs to a brand pattern
pub type BrandMatcher = fn(name: &str, pattern: &str) -> bool;

/// Default matcher: the pattern occurs anywhere in the name
#[must_use]
pub fn contains_pattern(name: &str, pattern: &str) -> bool {
    name.contains(pattern)
}

/// Matches names that start with the pattern
#[must_use]
pub fn starts_with_pattern(name: &str, pattern: &str) -> bool {
    name.starts_with(pattern)
}

#[derive(Debug, Clone)]
pub struct BrandRule {
    pub pattern: String,
    matcher: BrandMatcher,
}

impl BrandRule {
    #[must_use]
    pub fn new(pattern: impl Into<String>, matcher: BrandMatcher) -> Self {
        Self {
            pattern: pattern.into(),
            matcher,
        }
    }

    /// Substring rule, the kind built from configured brand patterns
    #[must_use]
    pub fn substring(pattern: impl Into<String>) -> Self {
        Self::new(pattern, contains_pattern)
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        (self.matcher)(name, &self.pattern)
    }
}

/// Ordered brand rule table, evaluated first-match-wins
#[derive(Debug, Clone, Default)]
pub struct BrandConsolidator {
    rules: Vec<BrandRule>,
}

impl BrandConsolidator {
    /// Build substring rules from patterns, keeping their priority order
    #[must_use]
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rules: patterns.into_iter().map(BrandRule::substring).collect(),
        }
    }

    /// Append a rule with the lowest priority so far
    #[must_use]
    pub fn with_rule(mut self, rule: BrandRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn rules(&self) -> &[BrandRule] {
        &self.rules
    }

    /// Collapse every brand group to its branch nearest `origin` (ties go to the branch
    /// encountered first). Unclaimed candidates are returned first in their input order,
    /// followed by one winner per non-empty group in rule order.
    #[must_use]
    pub fn consolidate(&self, candidates: Vec<Candidate>, origin: &Coordinate) -> Vec<Candidate> {
        let mut groups: Vec<Vec<Candidate>> = vec![Vec::new(); self.rules.len()];
        let mut consolidated = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match self.rules.iter().position(|rule| rule.matches(&candidate.name)) {
                Some(index) => groups[index].push(candidate),
                None => consolidated.push(candidate),
            }
        }

        for (rule, group) in self.rules.iter().zip(groups) {
            let branches = group.len();
            if let Some(nearest) = nearest_to(group, origin) {
                debug!(
                    "Brand '{}': kept {} out of {} branches",
                    rule.pattern, nearest.name, branches
                );
                consolidated.push(nearest);
            }
        }

        consolidated
    }
}

fn nearest_to(group: Vec<Candidate>, origin: &Coordinate) -> Option<Candidate> {
    let mut best: Option<(f64, Candidate)> = None;

    for candidate in group {
        let distance = distance_km(origin, &candidate.coordinate);
        if best.as_ref().is_none_or(|(nearest, _)| distance < *nearest) {
            best = Some((distance, candidate));
        }
    }

    best.map(|(_, candidate)| candidate)
}
