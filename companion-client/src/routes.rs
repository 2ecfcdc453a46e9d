//! Endpoint paths of the trip-planning API.
//!
//! Paths are relative to the configured base URL.

use crate::types::{ResourceId, TripId};

// =============================================================================
// Auth
// =============================================================================

pub const LOGIN: &str = "/api/auth/login";
pub const REGISTER: &str = "/api/auth/register";
pub const CHANGE_USERNAME: &str = "/api/auth/username";
pub const CHANGE_PASSWORD: &str = "/api/auth/password";

// =============================================================================
// Trips
// =============================================================================

pub const TRIPS: &str = "/api/trips";

pub fn trip(trip: TripId) -> String {
    format!("{}/{}", TRIPS, trip)
}

pub fn suggest(trip: TripId) -> String {
    format!("{}/{}/suggest", TRIPS, trip)
}

// =============================================================================
// Places
// =============================================================================

pub fn places(trip: TripId) -> String {
    format!("{}/{}/places", TRIPS, trip)
}

pub fn places_bulk(trip: TripId) -> String {
    format!("{}/bulk", places(trip))
}

pub fn place(trip: TripId, place: ResourceId) -> String {
    format!("{}/{}", places(trip), place)
}

// =============================================================================
// Packing items
// =============================================================================

pub fn items(trip: TripId) -> String {
    format!("{}/{}/items", TRIPS, trip)
}

pub fn items_bulk(trip: TripId) -> String {
    format!("{}/bulk", items(trip))
}

pub fn item(trip: TripId, item: ResourceId) -> String {
    format!("{}/{}", items(trip), item)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_paths() {
        let trip = TripId(4);
        assert_eq!(places(trip), "/api/trips/4/places");
        assert_eq!(places_bulk(trip), "/api/trips/4/places/bulk");
        assert_eq!(place(trip, ResourceId(12)), "/api/trips/4/places/12");
        assert_eq!(items_bulk(trip), "/api/trips/4/items/bulk");
        assert_eq!(item(trip, ResourceId(1)), "/api/trips/4/items/1");
        assert_eq!(suggest(trip), "/api/trips/4/suggest");
    }
}
