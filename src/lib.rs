//! `SnapTrip` - Photo-driven place recommendation and route sequencing
//!
//! This library turns nearest-neighbor matches for user photos into a
//! deduplicated candidate set, collapses multi-branch brands, and orders
//! the result into a greedy travel route from the user's position. Catalogs of
//! embedded place photos are built with [`seed::CatalogSeeder`].

pub mod aggregate;
pub mod api;
pub mod brand;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod error;
pub mod geo;
pub mod models;
pub mod mood;
pub mod pipeline;
pub mod route;
pub mod search;
pub mod seed;
pub mod vector;
pub mod web;

// Re-export core types for public API
pub use aggregate::{CandidateAggregator, SearchPass};
pub use brand::{BrandConsolidator, BrandRule};
pub use cache::{CachedEmbedder, EmbeddingCache};
pub use config::SnapTripConfig;
pub use embedding::{HttpEmbedder, ImageEmbedder};
pub use error::SnapTripError;
pub use models::{Candidate, Coordinate, PlaceRecord, RouteStop, SearchHit, TransportMode};
pub use mood::{MoodClassifier, MoodLabel};
pub use pipeline::{RecommendationOutcome, RecommendationPipeline};
pub use route::sequence_route;
pub use search::{Catalog, CatalogFile, CatalogIndex, PlaceSearch};
pub use seed::{CatalogSeeder, SeedManifest, SeedReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, SnapTripError>;
