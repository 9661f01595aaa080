//! Recommendation pipeline
//!
//! Per request: embed every photo, search similar places per embedding, then
//! aggregate -> consolidate brands -> sequence the route from the origin.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{Result, SnapTripError};
use crate::aggregate::{CandidateAggregator, SearchPass};
use crate::brand::BrandConsolidator;
use crate::config::RecommendConfig;
use crate::embedding::ImageEmbedder;
use crate::models::{Coordinate, RouteStop};
use crate::mood::MoodClassifier;
use crate::route::sequence_route;
use crate::search::PlaceSearch;

pub const NO_MATCH_MESSAGE: &str = "No similar places found";
pub const ANALYSIS_FAILED_MESSAGE: &str = "None of the submitted images could be analyzed";

/// Business outcome of one recommendation request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecommendationOutcome {
    /// The sequenced route, first stop first
    Success { data: Vec<RouteStop> },
    /// Nothing to recommend, with a human-readable reason
    Fail { message: String },
}

impl RecommendationOutcome {
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A request that could not be served becomes a `fail` outcome carrying the user message
impl From<SnapTripError> for RecommendationOutcome {
    fn from(error: SnapTripError) -> Self {
        Self::fail(error.user_message())
    }
}

pub struct RecommendationPipeline {
    embedder: Arc<dyn ImageEmbedder>,
    search: Arc<dyn PlaceSearch>,
    moods: MoodClassifier,
    aggregator: CandidateAggregator,
    brands: BrandConsolidator,
    results_per_image: usize,
    default_origin: Coordinate,
}

impl RecommendationPipeline {
    pub fn new(
        config: &RecommendConfig,
        default_origin: Coordinate,
        embedder: Arc<dyn ImageEmbedder>,
        search: Arc<dyn PlaceSearch>,
    ) -> Self {
        Self {
            embedder,
            search,
            moods: MoodClassifier::default(),
            aggregator: CandidateAggregator::new(config.similarity_threshold),
            brands: BrandConsolidator::from_patterns(config.brand_patterns.iter().cloned()),
            results_per_image: config.results_per_image as usize,
            default_origin,
        }
    }

    /// Tag candidates with the mood of the photo that surfaced them
    #[must_use]
    pub fn with_moods(mut self, moods: MoodClassifier) -> Self {
        self.moods = moods;
        self
    }

    /// Replace the brand rule table built from the configured patterns
    #[must_use]
    pub fn with_brands(mut self, brands: BrandConsolidator) -> Self {
        self.brands = brands;
        self
    }

    #[must_use]
    pub fn default_origin(&self) -> Coordinate {
        self.default_origin
    }

    /// Recommend a route for `images`, starting at `origin` or the configured default.
    ///
    /// Photos that cannot be embedded are skipped and an empty candidate set is a `Fail`
    /// outcome. A failing search gateway aborts the request with an `Err`, so callers can
    /// tell an outage from "no match"; convert it with `RecommendationOutcome::from` to
    /// answer the user:
    ///
    /// ```ignore
    /// let outcome = pipeline
    ///     .recommend(&photos, origin)
    ///     .await
    ///     .unwrap_or_else(RecommendationOutcome::from);
    /// ```
    pub async fn recommend<I>(
        &self,
        images: &[I],
        origin: Option<Coordinate>,
    ) -> Result<RecommendationOutcome>
    where
        I: AsRef<[u8]> + Sync,
    {
        let origin = origin.unwrap_or(self.default_origin);
        let passes = self.search_passes(images).await?;

        if passes.is_empty() && !images.is_empty() {
            warn!("All {} submitted images failed to embed", images.len());
            return Ok(RecommendationOutcome::fail(ANALYSIS_FAILED_MESSAGE));
        }

        let route = self.rank(passes, &origin);
        if route.is_empty() {
            info!("No candidates under the similarity threshold");
            return Ok(RecommendationOutcome::fail(NO_MATCH_MESSAGE));
        }

        info!(
            "Recommended {} stops from {} images starting at {}",
            route.len(),
            images.len(),
            origin.format_coordinates()
        );
        Ok(RecommendationOutcome::Success { data: route })
    }

    /// Embed and search every image concurrently. Passes come back in submission order so
    /// the first-seen dedup stays deterministic; images that failed to embed are dropped.
    pub async fn search_passes<I>(&self, images: &[I]) -> Result<Vec<SearchPass>>
    where
        I: AsRef<[u8]> + Sync,
    {
        let lookups = images
            .iter()
            .enumerate()
            .map(|(index, image)| self.search_image(index, image.as_ref()));

        let mut passes = Vec::with_capacity(images.len());
        for pass in join_all(lookups).await {
            if let Some(pass) = pass? {
                passes.push(pass);
            }
        }
        Ok(passes)
    }

    async fn search_image(&self, index: usize, image: &[u8]) -> Result<Option<SearchPass>> {
        let Some(embedding) = self.embedder.embed(image).await else {
            warn!("Skipping image {}: no embedding", index);
            return Ok(None);
        };

        let mood = self.moods.classify(&embedding).map(str::to_string);
        let hits = self
            .search
            .search(&embedding, self.results_per_image)
            .await?;

        debug!(
            "Image {} matched {} places (mood: {:?})",
            index,
            hits.len(),
            mood
        );
        Ok(Some(SearchPass::with_mood(hits, mood)))
    }

    /// The pure ranking stages: aggregate, consolidate brands, sequence the route
    #[must_use]
    pub fn rank(&self, passes: Vec<SearchPass>, origin: &Coordinate) -> Vec<RouteStop> {
        let candidates = self.aggregator.aggregate(passes);
        debug!("Aggregated {} candidates", candidates.len());

        let consolidated = self.brands.consolidate(candidates, origin);
        debug!("{} candidates after brand consolidation", consolidated.len());

        sequence_route(origin, consolidated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlaceRecord, SearchHit, TransportMode};
    use crate::mood::MoodLabel;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Embeds an image as the vector registered for its bytes
    struct FakeEmbedder(HashMap<Vec<u8>, Vec<f32>>);

    #[async_trait]
    impl ImageEmbedder for FakeEmbedder {
        async fn embed(&self, image: &[u8]) -> Option<Vec<f32>> {
            self.0.get(image).cloned()
        }
    }

    /// Returns canned hits keyed by the first vector component
    struct FakeSearch {
        results: HashMap<u32, Vec<SearchHit>>,
        fail: bool,
    }

    #[async_trait]
    impl PlaceSearch for FakeSearch {
        async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
            if self.fail {
                return Err(SnapTripError::search("store offline"));
            }
            let mut hits = self.results.get(&(query[0] as u32)).cloned().unwrap_or_default();
            hits.truncate(limit);
            Ok(hits)
        }
    }

    fn hit(name: &str, latitude: f64, longitude: f64, score: f32) -> SearchHit {
        SearchHit::new(
            PlaceRecord {
                id: None,
                name: name.to_string(),
                description: None,
                address: None,
                image_ref: None,
                latitude,
                longitude,
                manual_mood: None,
            },
            score,
        )
    }

    fn pipeline(results: HashMap<u32, Vec<SearchHit>>, fail: bool) -> RecommendationPipeline {
        let embedder = FakeEmbedder(HashMap::from([
            (b"first".to_vec(), vec![1.0, 0.0]),
            (b"second".to_vec(), vec![2.0, 0.0]),
        ]));
        let config = RecommendConfig {
            brand_patterns: vec!["Chain".to_string()],
            ..RecommendConfig::default()
        };
        RecommendationPipeline::new(
            &config,
            Coordinate::new(36.3325, 127.4342),
            Arc::new(embedder),
            Arc::new(FakeSearch { results, fail }),
        )
    }

    fn stop_names(outcome: &RecommendationOutcome) -> Vec<String> {
        match outcome {
            RecommendationOutcome::Success { data } => {
                data.iter().map(|s| s.candidate.name.clone()).collect()
            }
            RecommendationOutcome::Fail { message } => panic!("unexpected fail: {message}"),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_route() {
        let results = HashMap::from([(
            1,
            vec![
                hit("B", 36.3325, 127.4542, 0.2),
                hit("A", 36.3325, 127.4442, 0.1),
            ],
        )]);

        let outcome = pipeline(results, false)
            .recommend(&[b"first".to_vec()], None)
            .await
            .unwrap();

        assert_eq!(stop_names(&outcome), vec!["A", "B"]);
        if let RecommendationOutcome::Success { data } = outcome {
            assert_eq!(data[0].transport, TransportMode::Walk);
            assert_eq!(data[0].duration, 13);
        }
    }

    #[tokio::test]
    async fn test_failed_embedding_is_skipped() {
        let results = HashMap::from([(2, vec![hit("Only", 36.34, 127.44, 0.3)])]);

        let outcome = pipeline(results, false)
            .recommend(&[b"unknown".to_vec(), b"second".to_vec()], None)
            .await
            .unwrap();

        assert_eq!(stop_names(&outcome), vec!["Only"]);
    }

    #[tokio::test]
    async fn test_all_embeddings_failed() {
        let outcome = pipeline(HashMap::new(), false)
            .recommend(&[b"unknown".to_vec()], None)
            .await
            .unwrap();
        assert_eq!(outcome, RecommendationOutcome::fail(ANALYSIS_FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn test_empty_results_are_no_match() {
        let outcome = pipeline(HashMap::new(), false)
            .recommend(&[b"first".to_vec(), b"second".to_vec()], None)
            .await
            .unwrap();
        assert_eq!(outcome, RecommendationOutcome::fail(NO_MATCH_MESSAGE));
    }

    #[tokio::test]
    async fn test_scores_over_threshold_are_no_match() {
        let results = HashMap::from([(1, vec![hit("Blurry", 36.34, 127.44, 0.45)])]);
        let outcome = pipeline(results, false)
            .recommend(&[b"first".to_vec()], None)
            .await
            .unwrap();
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_search_failure_is_an_error() {
        let result = pipeline(HashMap::new(), true)
            .recommend(&[b"first".to_vec()], None)
            .await;
        assert!(matches!(result, Err(SnapTripError::Search { .. })));
    }

    #[tokio::test]
    async fn test_search_failure_converts_to_fail_outcome() {
        let outcome = pipeline(HashMap::new(), true)
            .recommend(&[b"first".to_vec()], None)
            .await
            .unwrap_or_else(RecommendationOutcome::from);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "fail");
        assert_eq!(
            json["message"],
            SnapTripError::search("store offline").user_message()
        );
    }

    #[tokio::test]
    async fn test_dedup_follows_submission_order() {
        let results = HashMap::from([
            (1, vec![hit("Shared", 36.34, 127.44, 0.40)]),
            (2, vec![hit("Shared", 36.34, 127.44, 0.05)]),
        ]);

        let passes = pipeline(results, false)
            .search_passes(&[b"first".to_vec(), b"second".to_vec()])
            .await
            .unwrap();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].hits[0].score, 0.40);
    }

    #[tokio::test]
    async fn test_brand_branches_collapse_against_request_origin() {
        let results = HashMap::from([(
            1,
            vec![
                hit("Chain Downtown", 36.3276, 127.4273, 0.1),
                hit("Chain Expo", 36.3755, 127.3872, 0.2),
                hit("Museum", 36.3663, 127.3883, 0.3),
            ],
        )]);

        let origin = Coordinate::new(36.3740, 127.3860);
        let outcome = pipeline(results, false)
            .recommend(&[b"first".to_vec()], Some(origin))
            .await
            .unwrap();

        assert_eq!(stop_names(&outcome), vec!["Chain Expo", "Museum"]);
    }

    #[tokio::test]
    async fn test_mood_is_attached_to_candidates() {
        let results = HashMap::from([(1, vec![hit("Lake", 36.34, 127.44, 0.2)])]);
        let moods = MoodClassifier::new(vec![
            MoodLabel {
                label: "calm".to_string(),
                embedding: vec![1.0, 0.0],
            },
            MoodLabel {
                label: "lively".to_string(),
                embedding: vec![0.0, 1.0],
            },
        ]);

        let outcome = pipeline(results, false)
            .with_moods(moods)
            .recommend(&[b"first".to_vec()], None)
            .await
            .unwrap();

        match outcome {
            RecommendationOutcome::Success { data } => {
                assert_eq!(data[0].candidate.mood.as_deref(), Some("calm"));
            }
            RecommendationOutcome::Fail { message } => panic!("unexpected fail: {message}"),
        }
    }

    #[test]
    fn test_outcome_serialization() {
        let fail = serde_json::to_value(RecommendationOutcome::fail(NO_MATCH_MESSAGE)).unwrap();
        assert_eq!(fail["status"], "fail");
        assert_eq!(fail["message"], NO_MATCH_MESSAGE);

        let success = serde_json::to_value(RecommendationOutcome::Success { data: vec![] }).unwrap();
        assert_eq!(success["status"], "success");
        assert!(success["data"].as_array().unwrap().is_empty());
    }
}
