//! Catalog seeding
//!
//! Builds or extends a catalog file from a manifest of places and a directory of photos.
//! Every photo becomes its own catalog entry carrying the place's name, address and
//! coordinates plus the photo's description. Photos the catalog already references are
//! skipped, so re-running a seed only embeds what is new.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::embedding::ImageEmbedder;
use crate::models::PlaceRecord;
use crate::search::{CatalogEntry, CatalogFile};

/// Places to seed, usually read from a JSON manifest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedManifest {
    #[serde(default)]
    pub places: Vec<SeedPlace>,
}

/// A place and its photos.
///
/// Either list the photos under `photos`, or give a single `image` with the place's own
/// `description`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedPlace {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub manual_mood: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub photos: Vec<SeedPhoto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPhoto {
    /// File name relative to the image directory, stored as the entry's `image_ref`
    pub image: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl SeedManifest {
    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed manifest: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse seed manifest: {}", path.display()))
    }
}

impl SeedPlace {
    /// Photos of this place, each with the description it should be stored with
    #[must_use]
    pub fn photos(&self) -> Vec<SeedPhoto> {
        let mut photos: Vec<SeedPhoto> = self
            .photos
            .iter()
            .map(|photo| SeedPhoto {
                image: photo.image.clone(),
                description: photo.description.clone().or_else(|| self.description.clone()),
            })
            .collect();

        if let Some(image) = &self.image {
            photos.push(SeedPhoto {
                image: image.clone(),
                description: self.description.clone(),
            });
        }
        photos
    }

    fn entry(&self, photo: SeedPhoto, embedding: Vec<f32>) -> CatalogEntry {
        CatalogEntry {
            place: PlaceRecord {
                id: None,
                name: self.name.clone(),
                description: photo.description,
                address: self.address.clone(),
                image_ref: Some(photo.image),
                latitude: self.latitude,
                longitude: self.longitude,
                manual_mood: self.manual_mood.clone(),
            },
            embedding,
        }
    }
}

/// What one seeding run did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub added: usize,
    /// Already referenced by the catalog
    pub known: usize,
    /// Not found in the image directory
    pub missing: usize,
    /// Unreadable, or rejected by the embedder
    pub failed: usize,
}

pub struct CatalogSeeder {
    embedder: Arc<dyn ImageEmbedder>,
    images_dir: PathBuf,
    dimension: usize,
}

impl CatalogSeeder {
    pub fn new(
        embedder: Arc<dyn ImageEmbedder>,
        images_dir: impl Into<PathBuf>,
        dimension: usize,
    ) -> Self {
        Self {
            embedder,
            images_dir: images_dir.into(),
            dimension,
        }
    }

    /// Embed every photo of `manifest` that `catalog` does not reference yet and append
    /// it. A photo shared by several places of one manifest is added once per place.
    pub async fn seed(&self, manifest: &SeedManifest, catalog: &mut CatalogFile) -> SeedReport {
        let known: HashSet<String> = catalog
            .places
            .iter()
            .filter_map(|entry| entry.place.image_ref.clone())
            .collect();
        let mut report = SeedReport::default();

        for place in &manifest.places {
            for photo in place.photos() {
                if known.contains(&photo.image) {
                    debug!("Skipping {}: already in the catalog", photo.image);
                    report.known += 1;
                    continue;
                }

                let path = self.images_dir.join(&photo.image);
                if !path.exists() {
                    warn!("Image not found: {}", path.display());
                    report.missing += 1;
                    continue;
                }

                match self.embed_file(&path).await {
                    Some(embedding) => {
                        info!("Embedded {} for {}", photo.image, place.name);
                        catalog.places.push(place.entry(photo, embedding));
                        report.added += 1;
                    }
                    None => report.failed += 1,
                }
            }
        }

        report
    }

    async fn embed_file(&self, path: &Path) -> Option<Vec<f32>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        let embedding = self.embedder.embed(&bytes).await?;
        if embedding.len() != self.dimension {
            warn!(
                "Embedding of {} has {} dimensions, expected {}",
                path.display(),
                embedding.len(),
                self.dimension
            );
            return None;
        }
        Some(embedding)
    }
}
