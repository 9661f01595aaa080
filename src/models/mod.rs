//! Data models for the SnapTrip application
//!
//! This module contains the core domain models organized by concern:
//! - Location: Geographic coordinates
//! - Place: Catalog records, search hits and ranked candidates
//! - Route: Annotated stops of a sequenced itinerary

pub mod location;
pub mod place;
pub mod route;

// Re-export all public types for convenient access
pub use location::Coordinate;
pub use place::{Candidate, PlaceRecord, SearchHit};
pub use route::{RouteStop, TransportMode};
