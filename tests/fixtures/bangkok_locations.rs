//! Real Bangkok locations for realistic test fixtures.
//!
//! Coordinates are approximate public landmark positions (OpenStreetMap).

use dispatch_planner::model::LatLng;

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn latlng(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

// ============================================================================
// Depots
// ============================================================================

pub const DEMOCRACY_MONUMENT: Location = Location::new("Democracy Monument", 13.7563, 100.5018);
pub const THONBURI_DEPOT: Location = Location::new("Thonburi Depot", 13.75, 100.49);

pub const DEPOTS: &[Location] = &[DEMOCRACY_MONUMENT, THONBURI_DEPOT];

// ============================================================================
// Old town, east bank (close to Democracy Monument)
// ============================================================================

pub const KHAO_SAN_ROAD: Location = Location::new("Khao San Road", 13.7589, 100.4974);
pub const WAT_SAKET: Location = Location::new("Wat Saket", 13.7538, 100.5066);
pub const GIANT_SWING: Location = Location::new("Giant Swing", 13.7515, 100.5013);
pub const PHRA_SUMEN_FORT: Location = Location::new("Phra Sumen Fort", 13.7640, 100.4955);

// ============================================================================
// West bank (close to the Thonburi depot)
// ============================================================================

pub const WAT_ARUN: Location = Location::new("Wat Arun", 13.7437, 100.4888);
pub const WANG_LANG_MARKET: Location = Location::new("Wang Lang Market", 13.7560, 100.4856);
pub const SIRIRAJ_HOSPITAL: Location = Location::new("Siriraj Hospital", 13.7590, 100.4850);

// ============================================================================
// Further out
// ============================================================================

pub const SIAM_PARAGON: Location = Location::new("Siam Paragon", 13.7462, 100.5347);
pub const LUMPHINI_PARK: Location = Location::new("Lumphini Park", 13.7314, 100.5414);
pub const CHATUCHAK_MARKET: Location = Location::new("Chatuchak Market", 13.7999, 100.5500);

pub const DELIVERY_POINTS: &[Location] = &[
    KHAO_SAN_ROAD,
    WAT_SAKET,
    GIANT_SWING,
    PHRA_SUMEN_FORT,
    WAT_ARUN,
    WANG_LANG_MARKET,
    SIRIRAJ_HOSPITAL,
    SIAM_PARAGON,
    LUMPHINI_PARK,
    CHATUCHAK_MARKET,
];

/// A point a few meters north of `location`.
pub fn nudged(location: &Location, meters: f64) -> LatLng {
    LatLng::new(location.lat + meters / 111_195.0, location.lng)
}
