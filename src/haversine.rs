//! Great-circle distance and straight-line travel estimates.
//!
//! Used for the short-hop shortcut and as the fallback whenever the routing
//! provider is unavailable. Less accurate than a road network but always
//! available.

use crate::model::LatLng;

/// Average driving speed assumed for fallback estimates.
pub const DEFAULT_SPEED_KMH: f64 = 30.0;

/// Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters.
pub fn haversine_meters(from: LatLng, to: LatLng) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Straight-line travel estimator.
#[derive(Debug, Clone, Copy)]
pub struct CrowFlight {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for CrowFlight {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl CrowFlight {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Convert a distance in meters to travel seconds, never less than one.
    pub fn seconds_for(&self, meters: f64) -> i64 {
        let meters_per_second = self.speed_kmh * 1000.0 / 3600.0;
        ((meters / meters_per_second).round() as i64).max(1)
    }
}
