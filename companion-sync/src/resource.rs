//! Trip-scoped list resources.
//!
//! [`ListResource`] is what a [`ResourceList`](crate::list::ResourceList)
//! needs to know about its items: where they live on the server, how to
//! create them, and which boolean the user toggles.

use companion_client::{routes, PackingItem, Place, ResourceId, TripId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

/// An item of a remote-backed list owned by a trip.
pub trait ListResource: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Capitalized singular, used in notices ("Place added").
    const NOUN: &'static str;

    /// Notice shown when the list cannot be fetched.
    const LOAD_FAILED: &'static str;

    fn collection_path(trip: TripId) -> String;
    fn bulk_path(trip: TripId) -> String;
    fn item_path(trip: TripId, id: ResourceId) -> String;

    /// Body of a create request for `name`.
    fn create_body(name: &str) -> Value;

    /// Body of a bulk-create request: one create body per name.
    fn bulk_body(names: &[String]) -> Value {
        Value::Array(names.iter().map(|name| Self::create_body(name)).collect())
    }

    fn id(&self) -> ResourceId;
    fn name(&self) -> &str;
    fn status(&self) -> bool;
    fn set_status(&mut self, status: bool);

    /// Record the owning trip. The server omits it from list bodies.
    fn attach(&mut self, trip: TripId);

    /// Lowercase singular ("place").
    fn noun_lower() -> String {
        Self::NOUN.to_lowercase()
    }
}

impl ListResource for Place {
    const NOUN: &'static str = "Place";
    const LOAD_FAILED: &'static str = "Failed to load places";

    fn collection_path(trip: TripId) -> String {
        routes::places(trip)
    }

    fn bulk_path(trip: TripId) -> String {
        routes::places_bulk(trip)
    }

    fn item_path(trip: TripId, id: ResourceId) -> String {
        routes::place(trip, id)
    }

    fn create_body(name: &str) -> Value {
        json!({ "name": name })
    }

    fn id(&self) -> ResourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> bool {
        self.visited
    }

    fn set_status(&mut self, status: bool) {
        self.visited = status;
    }

    fn attach(&mut self, trip: TripId) {
        self.trip_id = trip;
    }
}

impl ListResource for PackingItem {
    const NOUN: &'static str = "Item";
    const LOAD_FAILED: &'static str = "Failed to load packing list";

    fn collection_path(trip: TripId) -> String {
        routes::items(trip)
    }

    fn bulk_path(trip: TripId) -> String {
        routes::items_bulk(trip)
    }

    fn item_path(trip: TripId, id: ResourceId) -> String {
        routes::item(trip, id)
    }

    // New items always start unpacked.
    fn create_body(name: &str) -> Value {
        json!({ "name": name, "packed": false })
    }

    fn id(&self) -> ResourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> bool {
        self.packed
    }

    fn set_status(&mut self, status: bool) {
        self.packed = status;
    }

    fn attach(&mut self, trip: TripId) {
        self.trip_id = trip;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_bodies() {
        let names = vec!["Sunscreen".to_string(), "Adapter".to_string()];
        assert_eq!(
            PackingItem::bulk_body(&names),
            json!([
                {"name": "Sunscreen", "packed": false},
                {"name": "Adapter", "packed": false}
            ])
        );
        assert_eq!(Place::bulk_body(&names[..1]), json!([{"name": "Sunscreen"}]));
    }

    #[test]
    fn test_paths_and_nouns() {
        let trip = TripId(2);
        assert_eq!(Place::item_path(trip, ResourceId(8)), "/api/trips/2/places/8");
        assert_eq!(PackingItem::collection_path(trip), "/api/trips/2/items");
        assert_eq!(PackingItem::noun_lower(), "item");
    }
}
