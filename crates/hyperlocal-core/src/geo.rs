//! # Geo Module
//!
//! Great-circle distance math for shop discovery.
//!
//! ## Haversine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  a = sin²(Δφ/2) + cos φ₁ · cos φ₂ · sin²(Δλ/2)                          │
//! │  c = 2 · atan2(√a, √(1−a))                                              │
//! │  d = R · c            R = 6371 km, rounded to 2 decimals               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The result is symmetric and exactly zero for identical points, which the
//! discovery list relies on when sorting shops.

use std::cmp::Ordering;

use crate::types::{Location, Shop};
use crate::EARTH_RADIUS_KM;

// =============================================================================
// Distance
// =============================================================================

/// Great-circle distance between two points, in kilometers, rounded to
/// two decimal places.
///
/// ## Example
/// ```rust
/// use hyperlocal_core::geo::distance_km;
/// use hyperlocal_core::Location;
///
/// let a = Location::new(12.9716, 77.5946);
/// let b = Location::new(13.0827, 80.2707);
/// assert_eq!(distance_km(&a, &b), distance_km(&b, &a));
/// assert_eq!(distance_km(&a, &a), 0.0);
/// ```
pub fn distance_km(a: &Location, b: &Location) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Clamp guards against rounding pushing h just past 1.0 for antipodes
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    round2(EARTH_RADIUS_KM * c)
}

#[inline]
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Renders a distance for display.
///
/// Under 1 km the value is shown in whole meters (`"250m"`), otherwise in
/// kilometers with one decimal (`"3.2km"`).
pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        format!("{}m", (km * 1000.0).round() as i64)
    } else {
        format!("{:.1}km", round_half_up_1(km))
    }
}

/// Rounds exact ties at the second decimal upwards. `{:.1}` already rounds
/// every other value from its exact binary expansion; only quarter values
/// (`1.25`, `3.75`) land exactly on a tie, and there it would pick even.
#[inline]
fn round_half_up_1(value: f64) -> f64 {
    if (value * 4.0).fract() == 0.0 {
        (value * 10.0).round() / 10.0
    } else {
        value
    }
}

// =============================================================================
// Shop Helpers
// =============================================================================

/// Fills in `distance` for every shop that does not already carry one.
///
/// Distances reported by the customer service are kept as-is.
pub fn annotate_distances(shops: &mut [Shop], origin: &Location) {
    for shop in shops.iter_mut().filter(|s| s.distance.is_none()) {
        shop.distance = Some(distance_km(origin, &shop.location()));
    }
}

/// Sorts shops nearest first. Shops without a distance go last, in their
/// original relative order.
pub fn sort_by_distance(shops: &mut [Shop]) {
    shops.sort_by(|a, b| match (a.distance, b.distance) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

// =============================================================================
// Unit Tests
// =============================================================================
