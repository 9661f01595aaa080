//! Stops of a sequenced itinerary

use serde::{Deserialize, Serialize};

use super::Candidate;

/// How a leg of the route is travelled
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Walk,
    Drive,
}

impl TransportMode {
    /// Assumed travel speed in km/h
    #[must_use]
    pub fn speed_kmh(self) -> f64 {
        match self {
            TransportMode::Walk => 4.0,
            TransportMode::Drive => 30.0,
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportMode::Walk => write!(f, "walk"),
            TransportMode::Drive => write!(f, "drive"),
        }
    }
}

/// A candidate placed into the route, with the leg that reaches it
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RouteStop {
    #[serde(flatten)]
    pub candidate: Candidate,
    /// Minutes from the previous stop, or from the origin for the first stop
    pub duration: u32,
    pub transport: TransportMode,
}
