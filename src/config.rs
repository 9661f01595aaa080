//! Configuration management for `SnapTrip`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::SnapTripError;
use crate::aggregate::DEFAULT_SIMILARITY_THRESHOLD;
use crate::models::Coordinate;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `SnapTrip` application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapTripConfig {
    /// Ranking and consolidation settings
    #[serde(default)]
    pub recommend: RecommendConfig,
    /// Default route origin when the caller supplies none
    #[serde(default)]
    pub origin: OriginConfig,
    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Place catalog configuration
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Embedding cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Candidate ranking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    /// Hits scoring at or above this cosine distance are discarded
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Nearest places requested per submitted photo
    #[serde(default = "default_results_per_image")]
    pub results_per_image: u32,
    /// Brand name patterns in priority order
    #[serde(default = "default_brand_patterns")]
    pub brand_patterns: Vec<String>,
}

/// Default route origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    #[serde(default = "default_origin_latitude")]
    pub latitude: f64,
    #[serde(default = "default_origin_longitude")]
    pub longitude: f64,
}

/// Embedding service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding service
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for failed requests
    #[serde(default = "default_embedding_max_retries")]
    pub max_retries: u32,
    /// Expected embedding length
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

/// Place catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON catalog file with place embeddings and mood labels
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether embeddings are cached on disk
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Cache directory location
    #[serde(default = "default_cache_location")]
    pub location: String,
    /// Cache TTL in hours
    #[serde(default = "default_cache_ttl")]
    pub ttl_hours: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Maximum size of an upload request in MB
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u32,
    /// Time limit for a whole request, covering every embedding attempt
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,
}

// Default value functions
fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_results_per_image() -> u32 {
    10
}

fn default_brand_patterns() -> Vec<String> {
    vec!["성심당".to_string()]
}

fn default_origin_latitude() -> f64 {
    36.3325
}

fn default_origin_longitude() -> f64 {
    127.4342
}

fn default_embedding_base_url() -> String {
    "http://127.0.0.1:8001".to_string()
}

fn default_embedding_timeout() -> u32 {
    30
}

fn default_embedding_max_retries() -> u32 {
    3
}

fn default_embedding_dimension() -> usize {
    512
}

fn default_catalog_path() -> String {
    "places.json".to_string()
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_location() -> String {
    "~/.cache/snaptrip".to_string()
}

fn default_cache_ttl() -> u32 {
    168
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_server_port() -> u16 {
    8000
}

fn default_max_upload_mb() -> u32 {
    20
}

fn default_request_timeout() -> u32 {
    120
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            results_per_image: default_results_per_image(),
            brand_patterns: default_brand_patterns(),
        }
    }
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            latitude: default_origin_latitude(),
            longitude: default_origin_longitude(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            timeout_seconds: default_embedding_timeout(),
            max_retries: default_embedding_max_retries(),
            dimension: default_embedding_dimension(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            location: default_cache_location(),
            ttl_hours: default_cache_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            max_upload_mb: default_max_upload_mb(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for SnapTripConfig {
    fn default() -> Self {
        Self {
            recommend: RecommendConfig::default(),
            origin: OriginConfig::default(),
            embedding: EmbeddingConfig::default(),
            catalog: CatalogConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl OriginConfig {
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

impl CacheConfig {
    /// Cache directory with a leading `~` expanded to the home directory
    #[must_use]
    pub fn resolved_location(&self) -> PathBuf {
        match self.location.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.location)),
            None => PathBuf::from(&self.location),
        }
    }
}

impl SnapTripConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Add environment variable overrides with SNAPTRIP_ prefix,
        // e.g. SNAPTRIP_RECOMMEND__SIMILARITY_THRESHOLD=0.4
        builder = builder.add_source(
            Environment::with_prefix("SNAPTRIP")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("recommend.brand_patterns")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: SnapTripConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("snaptrip").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.embedding.base_url.is_empty() {
            self.embedding.base_url = default_embedding_base_url();
        }
        if self.embedding.timeout_seconds == 0 {
            self.embedding.timeout_seconds = default_embedding_timeout();
        }
        if self.embedding.dimension == 0 {
            self.embedding.dimension = default_embedding_dimension();
        }
        if self.catalog.path.is_empty() {
            self.catalog.path = default_catalog_path();
        }
        if self.cache.ttl_hours == 0 {
            self.cache.ttl_hours = default_cache_ttl();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.server.max_upload_mb == 0 {
            self.server.max_upload_mb = default_max_upload_mb();
        }
        if self.server.request_timeout_seconds == 0 {
            self.server.request_timeout_seconds = default_request_timeout();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_recommend()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate ranking settings and the default origin
    fn validate_recommend(&self) -> Result<()> {
        let threshold = self.recommend.similarity_threshold;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 2.0 {
            return Err(SnapTripError::config(format!(
                "Similarity threshold must be within (0, 2], got {threshold}"
            ))
            .into());
        }

        if self.recommend.results_per_image == 0 || self.recommend.results_per_image > 100 {
            return Err(
                SnapTripError::config("Results per image must be between 1 and 100").into(),
            );
        }

        if self
            .recommend
            .brand_patterns
            .iter()
            .any(|p| p.trim().is_empty())
        {
            return Err(SnapTripError::config("Brand patterns cannot be blank").into());
        }

        if !self.origin.coordinate().is_valid() {
            return Err(SnapTripError::config(format!(
                "Default origin is not a valid coordinate: {}",
                self.origin.coordinate().format_coordinates()
            ))
            .into());
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.embedding.timeout_seconds > 300 {
            return Err(SnapTripError::config(
                "Embedding service timeout cannot exceed 300 seconds",
            )
            .into());
        }

        if self.embedding.max_retries > 10 {
            return Err(
                SnapTripError::config("Embedding service max retries cannot exceed 10").into(),
            );
        }

        if self.cache.ttl_hours > 8760 {
            return Err(SnapTripError::config("Cache TTL cannot exceed 8760 hours (1 year)").into());
        }

        if self.server.max_upload_mb > 200 {
            return Err(SnapTripError::config("Maximum upload size cannot exceed 200 MB").into());
        }

        if self.server.request_timeout_seconds > 3600 {
            return Err(
                SnapTripError::config("Request timeout cannot exceed 3600 seconds").into(),
            );
        }

        // a single embedding may take every attempt the retry policy allows
        let embedding_budget =
            u64::from(self.embedding.timeout_seconds) * (u64::from(self.embedding.max_retries) + 1);
        if u64::from(self.server.request_timeout_seconds) < embedding_budget {
            return Err(SnapTripError::config(format!(
                "Request timeout ({}s) must cover the embedding timeout across retries ({}s)",
                self.server.request_timeout_seconds, embedding_budget
            ))
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(SnapTripError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(SnapTripError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if !self.embedding.base_url.starts_with("http://")
            && !self.embedding.base_url.starts_with("https://")
        {
            return Err(SnapTripError::config(
                "Embedding service base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        Ok(())
    }
}
