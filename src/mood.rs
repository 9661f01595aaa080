//! Mood tagging of query photos
//!
//! Each label carries a pre-computed prompt embedding; a photo gets the label whose
//! embedding is most similar to its own.

use serde::{Deserialize, Serialize};

use crate::vector::cosine_similarity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodLabel {
    pub label: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct MoodClassifier {
    labels: Vec<MoodLabel>,
}

impl MoodClassifier {
    #[must_use]
    pub fn new(labels: Vec<MoodLabel>) -> Self {
        Self { labels }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label with the highest cosine similarity to `embedding`, ties to the first label
    #[must_use]
    pub fn classify(&self, embedding: &[f32]) -> Option<&str> {
        let mut best: Option<(f32, &str)> = None;

        for mood in &self.labels {
            let Some(similarity) = cosine_similarity(embedding, &mood.embedding) else {
                continue;
            };
            if best.is_none_or(|(top, _)| similarity > top) {
                best = Some((similarity, mood.label.as_str()));
            }
        }

        best.map(|(_, label)| label)
    }
}
