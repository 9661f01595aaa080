//! Similarity search gateway
//!
//! [`PlaceSearch`] is the seam to whatever vector store holds the place embeddings.
//! [`CatalogIndex`] is the in-process implementation backed by a JSON catalog file.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::models::{PlaceRecord, SearchHit};
use crate::mood::{MoodClassifier, MoodLabel};
use crate::vector::cosine_distance;
use crate::{Result, SnapTripError};

/// Nearest-neighbor search over place embeddings
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Up to `limit` places ordered by ascending cosine distance to `query`
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>>;
}

/// A catalog place together with its image embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub place: PlaceRecord,
    pub embedding: Vec<f32>,
}

/// On-disk catalog layout
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub places: Vec<CatalogEntry>,
    #[serde(default)]
    pub moods: Vec<MoodLabel>,
}

impl CatalogFile {
    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))
    }

    /// Like [`CatalogFile::read`], but a missing file is an empty catalog
    pub fn read_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::read(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn write(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .with_context(|| "Failed to serialize catalog")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write catalog file: {}", path.display()))
    }
}

/// Brute-force cosine index over an in-memory catalog
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    entries: Vec<CatalogEntry>,
    dimension: usize,
}

impl CatalogIndex {
    /// Build an index, rejecting entries whose embedding is not `dimension` long
    pub fn new(entries: Vec<CatalogEntry>, dimension: usize) -> Result<Self> {
        if let Some(entry) = entries.iter().find(|e| e.embedding.len() != dimension) {
            return Err(SnapTripError::validation(format!(
                "Place '{}' has a {}-dimensional embedding, expected {}",
                entry.place.name,
                entry.embedding.len(),
                dimension
            )));
        }

        Ok(Self { entries, dimension })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl PlaceSearch for CatalogIndex {
    #[instrument(name = "catalog_search", level = "debug", skip(self, query))]
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(SnapTripError::search(format!(
                "Query has {} dimensions, catalog uses {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (index, cosine_distance(query, &entry.embedding)))
            .collect();
        // stable, so equal scores keep catalog order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(limit);

        debug!("Returning {} of {} catalog places", scored.len(), self.entries.len());

        Ok(scored
            .into_iter()
            .map(|(index, score)| SearchHit::new(self.entries[index].place.clone(), score))
            .collect())
    }
}

/// A loaded catalog: the search index plus the mood labels shipped with it
#[derive(Debug, Clone)]
pub struct Catalog {
    pub index: CatalogIndex,
    pub moods: MoodClassifier,
}

impl Catalog {
    /// Load a catalog JSON file, checking every embedding against `dimension`
    pub fn load(path: impl AsRef<Path>, dimension: usize) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let catalog = Self::from_file(CatalogFile::read(path)?, dimension)?;
        info!(
            "Loaded {} places from catalog {}",
            catalog.index.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_file(file: CatalogFile, dimension: usize) -> Result<Self> {
        if let Some(mood) = file.moods.iter().find(|m| m.embedding.len() != dimension) {
            return Err(SnapTripError::validation(format!(
                "Mood label '{}' has a {}-dimensional embedding, expected {}",
                mood.label,
                mood.embedding.len(),
                dimension
            )));
        }

        Ok(Self {
            index: CatalogIndex::new(file.places, dimension)?,
            moods: MoodClassifier::new(file.moods),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(name: &str, embedding: Vec<f32>) -> CatalogEntry {
        CatalogEntry {
            place: PlaceRecord {
                id: None,
                name: name.to_string(),
                description: None,
                address: None,
                image_ref: None,
                latitude: 36.33,
                longitude: 127.43,
                manual_mood: None,
            },
            embedding,
        }
    }

    fn index() -> CatalogIndex {
        CatalogIndex::new(
            vec![
                entry("East", vec![1.0, 0.0]),
                entry("North", vec![0.0, 1.0]),
                entry("NorthEast", vec![1.0, 1.0]),
                entry("West", vec![-1.0, 0.0]),
            ],
            2,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_orders_by_ascending_distance() {
        let hits = index().search(&[1.0, 0.1], 10).await.unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.place.name.as_str()).collect();
        assert_eq!(names, vec!["East", "NorthEast", "North", "West"]);
        assert!(hits.windows(2).all(|w| w[0].score <= w[1].score));
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let hits = index().search(&[0.0, 1.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].place.name, "North");
    }

    #[tokio::test]
    async fn test_search_rejects_wrong_dimension() {
        let result = index().search(&[1.0, 0.0, 0.0], 3).await;
        assert!(matches!(result, Err(SnapTripError::Search { .. })));
    }

    #[test]
    fn test_index_rejects_inconsistent_embeddings() {
        let result = CatalogIndex::new(vec![entry("Short", vec![1.0])], 2);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_catalog_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "places": [
                    {{"id": "1", "name": "Sungsimdang", "latitude": 36.3276, "longitude": 127.4273,
                      "manual_mood": "cozy", "embedding": [0.5, 0.5]}}
                ],
                "moods": [{{"label": "cozy", "embedding": [0.0, 1.0]}}]
            }}"#
        )
        .unwrap();

        let catalog = Catalog::load(file.path(), 2).unwrap();
        assert_eq!(catalog.index.len(), 1);
        assert!(!catalog.moods.is_empty());
    }

    #[test]
    fn test_missing_catalog_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = CatalogFile::read_or_default(dir.path().join("places.json")).unwrap();
        assert!(file.places.is_empty());
        assert!(CatalogFile::read(dir.path().join("places.json")).is_err());
    }

    #[test]
    fn test_written_catalog_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.json");
        CatalogFile {
            places: vec![entry("East", vec![1.0, 0.0])],
            moods: Vec::new(),
        }
        .write(&path)
        .unwrap();

        let catalog = Catalog::load(&path, 2).unwrap();
        assert_eq!(catalog.index.len(), 1);
    }
}
