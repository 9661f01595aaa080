//! Route sequencing
//!
//! Orders the consolidated candidates into one itinerary with a greedy
//! nearest-unvisited heuristic. This is a nearest-neighbor TSP approximation and is not
//! globally optimal; swapping in an exact solver would change the visiting order.

use tracing::debug;

use crate::geo::{distance_km, travel_estimate};
use crate::models::{Candidate, Coordinate, RouteStop};

/// Sequence `candidates` starting from `origin`.
///
/// Each step visits the remaining candidate closest to the current position (ties go to
/// the earliest one in `candidates` order) and annotates it with the leg estimate from the
/// previous stop, or from the origin for the first stop. O(n^2) in the candidate count.
#[must_use]
pub fn sequence_route(origin: &Coordinate, candidates: Vec<Candidate>) -> Vec<RouteStop> {
    let mut remaining = candidates;
    let mut route = Vec::with_capacity(remaining.len());
    let mut current = *origin;

    while let Some((index, distance)) = nearest_remaining(&current, &remaining) {
        // Vec::remove keeps the relative order the tie-break relies on
        let next = remaining.remove(index);
        let (duration, transport) = travel_estimate(distance);

        debug!(
            "Stop {}: {} ({:.2} km, {} min by {})",
            route.len() + 1,
            next.name,
            distance,
            duration,
            transport
        );

        current = next.coordinate;
        route.push(RouteStop {
            candidate: next,
            duration,
            transport,
        });
    }

    route
}

fn nearest_remaining(current: &Coordinate, remaining: &[Candidate]) -> Option<(usize, f64)> {
    let mut nearest: Option<(usize, f64)> = None;

    for (index, candidate) in remaining.iter().enumerate() {
        let distance = distance_km(current, &candidate.coordinate);
        if nearest.is_none_or(|(_, best)| distance < best) {
            nearest = Some((index, distance));
        }
    }

    nearest
}
