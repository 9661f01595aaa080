//! Great-circle distance and travel time estimation

use crate::models::{Coordinate, TransportMode};

/// Legs shorter than this are walked, anything else is driven
pub const WALKING_LIMIT_KM: f64 = 1.0;

/// Great-circle distance in kilometers (haversine, earth radius 6371 km)
#[must_use]
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    haversine::distance(
        haversine::Location {
            latitude: a.latitude,
            longitude: a.longitude,
        },
        haversine::Location {
            latitude: b.latitude,
            longitude: b.longitude,
        },
        haversine::Units::Kilometers,
    )
}

/// Estimate minutes and transport mode for a leg of `distance_km`.
///
/// Walking is assumed at 4 km/h below [`WALKING_LIMIT_KM`], driving at 30 km/h from
/// there on. Minutes are rounded half away from zero (`f64::round`), so a 0.5 minute
/// leg becomes 1 minute.
#[must_use]
pub fn travel_estimate(distance_km: f64) -> (u32, TransportMode) {
    if distance_km.is_nan() || distance_km <= 0.0 {
        return (0, TransportMode::Walk);
    }

    let mode = if distance_km < WALKING_LIMIT_KM {
        TransportMode::Walk
    } else {
        TransportMode::Drive
    };

    let minutes = (distance_km / mode.speed_kmh() * 60.0).round();
    (minutes.min(f64::from(u32::MAX)) as u32, mode)
}
