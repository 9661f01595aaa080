//! Place records from the catalog and the candidates derived from them

use serde::{Deserialize, Serialize};

use super::Coordinate;

/// A place as stored by the similarity search backend
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlaceRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Curated mood tag, preferred over a classified one
    #[serde(default)]
    pub manual_mood: Option<String>,
}

impl PlaceRecord {
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// One ranked result of a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub place: PlaceRecord,
    /// Cosine distance between the query and the place embedding (smaller = more similar)
    pub score: f32,
}

impl SearchHit {
    #[must_use]
    pub fn new(place: PlaceRecord, score: f32) -> Self {
        Self { place, score }
    }
}

/// A place found similar to at least one submitted photo
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Candidate {
    pub id: Option<String>,
    /// Display name, also the dedup and brand key
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub image_ref: Option<String>,
    #[serde(flatten)]
    pub coordinate: Coordinate,
    /// Similarity score of the pass that surfaced this place
    #[serde(rename = "distance")]
    pub score: f32,
    pub mood: Option<String>,
}

impl Candidate {
    /// Build a candidate from a search hit, keeping a curated mood over `classified_mood`
    #[must_use]
    pub fn from_hit(hit: SearchHit, classified_mood: Option<&str>) -> Self {
        let SearchHit { place, score } = hit;
        let coordinate = place.coordinate();
        let mood = place
            .manual_mood
            .or_else(|| classified_mood.map(str::to_string));

        Self {
            id: place.id,
            name: place.name,
            description: place.description,
            address: place.address,
            image_ref: place.image_ref,
            coordinate,
            score,
            mood,
        }
    }
}
