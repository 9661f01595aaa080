//! Candidate aggregation
//!
//! Merges the ranked hits of several search passes (one per submitted photo) into a
//! single candidate list: exact-name dedup, hard similarity cutoff, first-seen order.

use std::collections::HashSet;

use tracing::debug;

use crate::models::{Candidate, SearchHit};

/// Default similarity cutoff; hits scoring at or above it are unreliable matches
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.45;

/// One pass of ranked hits, tagged with the mood classified for its query photo
#[derive(Debug, Clone, Default)]
pub struct SearchPass {
    pub hits: Vec<SearchHit>,
    pub mood: Option<String>,
}

impl SearchPass {
    #[must_use]
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits, mood: None }
    }

    #[must_use]
    pub fn with_mood(hits: Vec<SearchHit>, mood: Option<String>) -> Self {
        Self { hits, mood }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateAggregator {
    threshold: f32,
}

impl Default for CandidateAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl CandidateAggregator {
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Aggregate passes in the order given. Hits inside a pass are taken in their ranked
    /// order and never re-sorted. A name is only marked as seen once a hit with that name
    /// has been kept, so a place rejected in one pass can still be accepted from a later one.
    ///
    /// Names are compared exactly: two distinct places sharing a display name collapse into
    /// the first one, and name variants are kept apart.
    #[must_use]
    pub fn aggregate<I>(&self, passes: I) -> Vec<Candidate>
    where
        I: IntoIterator<Item = SearchPass>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();

        for (index, pass) in passes.into_iter().enumerate() {
            let mood = pass.mood;
            let mut kept = 0usize;

            for hit in pass.hits {
                if seen.contains(&hit.place.name) {
                    continue;
                }
                // strict cutoff, NaN scores are dropped too
                if !(hit.score < self.threshold) {
                    continue;
                }

                seen.insert(hit.place.name.clone());
                candidates.push(Candidate::from_hit(hit, mood.as_deref()));
                kept += 1;
            }

            debug!("Search pass {} contributed {} candidates", index, kept);
        }

        candidates
    }
}
