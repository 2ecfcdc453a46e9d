//! Optimistic mutation controller
//!
//! One [`ResourceList`] per remote-backed list (a trip's places, its packing
//! items). Each operation follows a fixed [`Strategy`]:
//!
//! | Operation | Strategy | Local change | On failure |
//! |-----------|----------|--------------|------------|
//! | toggle    | `Optimistic` | before the request | that item's status reverts |
//! | add       | `InsertOnConfirm` | after the server returns the item | nothing to undo |
//! | remove    | `RemoveOnConfirm` | after the server confirms | nothing to undo |
//!
//! At most one mutation per item id is in flight. A second toggle or remove
//! for the same id fails with [`SyncError::MutationInFlight`] without
//! sending anything.
//!
//! Lists are independent: each holds its own lock, released across every
//! remote call, so operations on different lists (or different items) run
//! concurrently.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use companion_client::{ClientError, Method, Notice, Notifier, ResourceId, TransportClient, TripId};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::resource::ListResource;

/// When a mutation touches local state relative to its remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Apply locally first; revert that item if the call fails.
    Optimistic,
    /// Insert the server's canonical item once it is returned.
    InsertOnConfirm,
    /// Drop the item once the server confirms deletion.
    RemoveOnConfirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Toggle,
    Add,
    Remove,
}

impl Operation {
    pub const fn strategy(self) -> Strategy {
        match self {
            Operation::Toggle => Strategy::Optimistic,
            Operation::Add => Strategy::InsertOnConfirm,
            Operation::Remove => Strategy::RemoveOnConfirm,
        }
    }
}

struct ListState<R> {
    items: Vec<R>,
    in_flight: HashSet<ResourceId>,
}

impl<R: ListResource> ListState<R> {
    fn find_mut(&mut self, id: ResourceId) -> Option<&mut R> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    // Claim `id` for one mutation.
    fn claim(&mut self, id: ResourceId) -> Result<()> {
        if self.in_flight.contains(&id) {
            return Err(SyncError::MutationInFlight(id));
        }
        if !self.items.iter().any(|item| item.id() == id) {
            return Err(SyncError::NotFound(id));
        }
        self.in_flight.insert(id);
        Ok(())
    }
}

/// A trip's list of `R`, kept consistent with the server.
pub struct ResourceList<R: ListResource> {
    trip: TripId,
    transport: TransportClient,
    notifier: Arc<dyn Notifier>,
    state: Mutex<ListState<R>>,
    abandoned: AtomicBool,
}

impl<R: ListResource> ResourceList<R> {
    /// Empty list for `trip`. Call [`load`](Self::load) to fetch it.
    pub fn new(trip: TripId, transport: TransportClient, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            trip,
            transport,
            notifier,
            state: Mutex::new(ListState {
                items: Vec::new(),
                in_flight: HashSet::new(),
            }),
            abandoned: AtomicBool::new(false),
        }
    }

    pub fn trip(&self) -> TripId {
        self.trip
    }

    /// Snapshot of the items in display order.
    pub async fn items(&self) -> Vec<R> {
        self.state.lock().await.items.clone()
    }

    pub async fn get(&self, id: ResourceId) -> Option<R> {
        self.state.lock().await.items.iter().find(|item| item.id() == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether a mutation for `id` is awaiting its response.
    pub async fn is_in_flight(&self, id: ResourceId) -> bool {
        self.state.lock().await.in_flight.contains(&id)
    }

    /// Stop applying responses. Calls still awaiting the server resolve to
    /// [`SyncError::Abandoned`] and leave the list untouched.
    pub fn abandon(&self) {
        if !self.abandoned.swap(true, Ordering::SeqCst) {
            debug!(trip_id = %self.trip, kind = R::NOUN, "List abandoned");
        }
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_abandoned() {
            return Err(SyncError::Abandoned);
        }
        Ok(())
    }

    fn report_failure(&self, err: &ClientError, fallback: &str) {
        if let Some(message) = err.user_message(fallback) {
            self.notifier.notify(Notice::error(message));
        }
    }

    /// Replace the local items with the server's.
    ///
    /// Items with a mutation in flight keep their local copy; the pending
    /// response decides their final state.
    pub async fn load(&self) -> Result<Vec<R>> {
        self.ensure_live()?;
        let fetched = self.transport.get::<Vec<R>>(&R::collection_path(self.trip)).await;

        let mut state = self.state.lock().await;
        self.ensure_live()?;
        let mut fetched = match fetched {
            Ok(items) => items,
            Err(e) => {
                drop(state);
                warn!(trip_id = %self.trip, kind = R::NOUN, error = %e, "Failed to load list");
                self.report_failure(&e, R::LOAD_FAILED);
                return Err(e.into());
            }
        };

        for item in fetched.iter_mut() {
            item.attach(self.trip);
            if state.in_flight.contains(&item.id()) {
                if let Some(local) = state.items.iter().find(|local| local.id() == item.id()) {
                    *item = local.clone();
                }
            }
        }
        state.items = fetched;
        debug!(trip_id = %self.trip, kind = R::NOUN, count = state.items.len(), "List loaded");
        Ok(state.items.clone())
    }

    /// Flip an item's status now and confirm it with the server.
    ///
    /// Returns the item as sent. On failure only this item reverts.
    pub async fn toggle_status(&self, id: ResourceId) -> Result<R> {
        self.ensure_live()?;
        let (previous, updated) = {
            let mut state = self.state.lock().await;
            state.claim(id)?;
            let Some(item) = state.find_mut(id) else {
                state.in_flight.remove(&id);
                return Err(SyncError::NotFound(id));
            };
            let previous = item.status();
            item.set_status(!previous);
            (previous, item.clone())
        };
        debug!(trip_id = %self.trip, kind = R::NOUN, %id, status = !previous, "Toggling status");

        let result = self
            .transport
            .request_with(Method::Put, &R::item_path(self.trip, id), &updated)
            .await;

        let mut state = self.state.lock().await;
        state.in_flight.remove(&id);
        self.ensure_live()?;

        match result {
            Ok(_) => Ok(updated),
            Err(e) => {
                if let Some(item) = state.find_mut(id) {
                    item.set_status(previous);
                }
                drop(state);
                warn!(trip_id = %self.trip, kind = R::NOUN, %id, error = %e, "Status update failed, reverted");
                self.report_failure(&e, "Failed to update status");
                Err(e.into())
            }
        }
    }

    /// Create an item. It joins the list once the server returns it.
    pub async fn add(&self, name: &str) -> Result<R> {
        self.ensure_live()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::EmptyName);
        }

        let result = self
            .transport
            .post::<_, R>(&R::collection_path(self.trip), &R::create_body(name))
            .await;

        let mut state = self.state.lock().await;
        self.ensure_live()?;

        match result {
            Ok(mut created) => {
                created.attach(self.trip);
                // A load that raced the create may already hold it.
                match state.find_mut(created.id()) {
                    Some(existing) => *existing = created.clone(),
                    None => state.items.push(created.clone()),
                }
                drop(state);
                info!(trip_id = %self.trip, kind = R::NOUN, id = %created.id(), name, "Added");
                self.notifier.notify(Notice::success(format!("{} added", R::NOUN)));
                Ok(created)
            }
            Err(e) => {
                drop(state);
                warn!(trip_id = %self.trip, kind = R::NOUN, name, error = %e, "Add failed");
                self.report_failure(&e, &format!("Failed to add {}", R::noun_lower()));
                Err(e.into())
            }
        }
    }

    /// Delete an item. It leaves the list once the server confirms.
    pub async fn remove(&self, id: ResourceId) -> Result<()> {
        self.ensure_live()?;
        self.state.lock().await.claim(id)?;

        let result = self.transport.delete(&R::item_path(self.trip, id)).await;

        let mut state = self.state.lock().await;
        state.in_flight.remove(&id);
        self.ensure_live()?;

        match result {
            Ok(()) => {
                state.items.retain(|item| item.id() != id);
                drop(state);
                info!(trip_id = %self.trip, kind = R::NOUN, %id, "Removed");
                self.notifier.notify(Notice::success(format!("{} removed", R::NOUN)));
                Ok(())
            }
            Err(e) => {
                drop(state);
                warn!(trip_id = %self.trip, kind = R::NOUN, %id, error = %e, "Remove failed");
                self.report_failure(&e, &format!("Failed to remove {}", R::noun_lower()));
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_client::{
        MemoryNotifier, MockBackend, MockReply, PackingItem, Place, SignalEmitter, StaticCredential,
    };
    use serde_json::json;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    const TRIP: TripId = TripId(1);

    struct Harness<R: ListResource> {
        backend: Arc<MockBackend>,
        notifier: MemoryNotifier,
        list: ResourceList<R>,
    }

    fn harness<R: ListResource>() -> Harness<R> {
        let backend = Arc::new(MockBackend::new());
        let notifier = MemoryNotifier::new();
        let transport = TransportClient::new(
            backend.clone(),
            Arc::new(StaticCredential::new("abc123")),
            SignalEmitter::detached(),
        );
        let list = ResourceList::new(TRIP, transport, Arc::new(notifier.clone()));
        Harness {
            backend,
            notifier,
            list,
        }
    }

    async fn loaded_places() -> Harness<Place> {
        let h = harness::<Place>();
        h.backend.enqueue(
            Method::Get,
            "/api/trips/1/places",
            MockReply::json(
                200,
                json!([
                    {"id": 1, "name": "Belem Tower", "visited": false},
                    {"id": 2, "name": "Alfama", "visited": true},
                    {"id": 3, "name": "LX Factory", "visited": false}
                ]),
            ),
        );
        assert_ok!(h.list.load().await);
        h
    }

    fn statuses(items: &[Place]) -> Vec<bool> {
        items.iter().map(|p| p.visited).collect()
    }

    #[test]
    fn test_strategy_table() {
        assert_eq!(Operation::Toggle.strategy(), Strategy::Optimistic);
        assert_eq!(Operation::Add.strategy(), Strategy::InsertOnConfirm);
        assert_eq!(Operation::Remove.strategy(), Strategy::RemoveOnConfirm);
    }

    #[tokio::test]
    async fn test_load_attaches_trip() {
        let h = loaded_places().await;
        let items = h.list.items().await;
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|p| p.trip_id == TRIP));
    }

    #[tokio::test]
    async fn test_load_failure_notices_name_the_list() {
        let places = harness::<Place>();
        places.backend.enqueue(Method::Get, "/api/trips/1/places", MockReply::text(503, "Unavailable"));
        assert_err!(places.list.load().await);
        assert_eq!(places.notifier.errors(), vec!["Failed to load places"]);

        let items = harness::<PackingItem>();
        items.backend.enqueue(Method::Get, "/api/trips/1/items", MockReply::text(503, "Unavailable"));
        assert_err!(items.list.load().await);
        assert_eq!(items.notifier.errors(), vec!["Failed to load packing list"]);
        assert!(items.list.is_empty().await);
    }

    #[tokio::test]
    async fn test_toggle_twice_round_trips() {
        let h = loaded_places().await;
        let before = h.list.items().await;
        h.backend.enqueue(Method::Put, "/api/trips/1/places/1", MockReply::json(200, json!({})));
        h.backend.enqueue(Method::Put, "/api/trips/1/places/1", MockReply::json(200, json!({})));

        let first = h.list.toggle_status(ResourceId(1)).await.unwrap();
        assert!(first.visited);
        let second = h.list.toggle_status(ResourceId(1)).await.unwrap();
        assert!(!second.visited);

        assert_eq!(h.list.items().await, before);
        let sent = h.backend.requests_to(Method::Put, "/api/trips/1/places/1");
        assert_eq!(sent[0].body, Some(json!({"id": 1, "name": "Belem Tower", "visited": true})));
        assert_eq!(sent[1].body, Some(json!({"id": 1, "name": "Belem Tower", "visited": false})));
    }

    #[tokio::test]
    async fn test_failed_toggle_reverts_only_that_item() {
        let h = loaded_places().await;
        let before = h.list.items().await;
        h.backend.enqueue(
            Method::Put,
            "/api/trips/1/places/2",
            MockReply::json(500, json!({"message": "Database unavailable"})),
        );

        let err = assert_err!(h.list.toggle_status(ResourceId(2)).await);
        assert!(matches!(err, SyncError::Client(ClientError::Request { status: 500, .. })));

        assert_eq!(h.list.items().await, before);
        assert!(!h.list.is_in_flight(ResourceId(2)).await);
        assert_eq!(h.notifier.errors(), vec!["Database unavailable"]);
    }

    #[tokio::test]
    async fn test_toggle_is_visible_before_response() {
        let h = loaded_places().await;
        let gate = Arc::new(Notify::new());
        h.backend.enqueue(
            Method::Put,
            "/api/trips/1/places/3",
            MockReply::text(502, "Bad Gateway").gated(gate.clone()),
        );

        let (toggled, observed) = tokio::join!(h.list.toggle_status(ResourceId(3)), async {
            let during = h.list.items().await;
            let second = h.list.toggle_status(ResourceId(3)).await;
            let remove = h.list.remove(ResourceId(3)).await;
            gate.notify_one();
            (during, second, remove)
        });
        let (during, second, remove) = observed;

        assert_eq!(statuses(&during), vec![false, true, true]);
        assert!(matches!(second, Err(SyncError::MutationInFlight(ResourceId(3)))));
        assert!(matches!(remove, Err(SyncError::MutationInFlight(ResourceId(3)))));
        assert!(toggled.is_err());

        // One request only; the rejected calls never reached the server.
        assert_eq!(h.backend.requests_to(Method::Put, "/api/trips/1/places/3").len(), 1);
        assert_eq!(statuses(&h.list.items().await), vec![false, true, false]);
        assert_eq!(h.notifier.errors(), vec!["Failed to update status"]);
    }

    #[tokio::test]
    async fn test_independent_items_toggle_concurrently() {
        let h = loaded_places().await;
        h.backend.enqueue(Method::Put, "/api/trips/1/places/1", MockReply::json(200, json!({})));
        h.backend.enqueue(Method::Put, "/api/trips/1/places/3", MockReply::text(500, "boom"));

        let (a, b) = tokio::join!(
            h.list.toggle_status(ResourceId(1)),
            h.list.toggle_status(ResourceId(3))
        );
        assert!(a.is_ok());
        assert!(b.is_err());
        assert_eq!(statuses(&h.list.items().await), vec![true, true, false]);
    }

    #[tokio::test]
    async fn test_add_inserts_server_item() {
        let h = harness::<PackingItem>();
        h.backend.enqueue(
            Method::Post,
            "/api/trips/1/items",
            MockReply::json(200, json!({"id": 41, "name": "Sunscreen", "packed": false})),
        );

        let item = h.list.add("  Sunscreen ").await.unwrap();
        assert_eq!(item.id, ResourceId(41));
        assert_eq!(item.trip_id, TRIP);
        assert_eq!(h.list.items().await, vec![item]);

        let sent = h.backend.requests_to(Method::Post, "/api/trips/1/items");
        assert_eq!(sent[0].body, Some(json!({"name": "Sunscreen", "packed": false})));
        assert_eq!(h.notifier.messages(), vec!["Item added"]);
    }

    #[tokio::test]
    async fn test_add_racing_load_keeps_ids_unique() {
        let h = harness::<Place>();
        let gate = Arc::new(Notify::new());
        h.backend.enqueue(
            Method::Post,
            "/api/trips/1/places",
            MockReply::json(200, json!({"id": 9, "name": "Sintra", "visited": false})).gated(gate.clone()),
        );
        h.backend.enqueue(
            Method::Get,
            "/api/trips/1/places",
            MockReply::json(200, json!([{"id": 9, "name": "Sintra", "visited": false}])),
        );

        let (added, loaded) = tokio::join!(h.list.add("Sintra"), async {
            let loaded = h.list.load().await;
            gate.notify_one();
            loaded
        });

        assert_eq!(assert_ok!(loaded).len(), 1);
        assert_eq!(assert_ok!(added).id, ResourceId(9));
        let ids: Vec<ResourceId> = h.list.items().await.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![ResourceId(9)]);
        assert_eq!(h.notifier.messages(), vec!["Place added"]);
    }

    #[tokio::test]
    async fn test_add_failure_leaves_list_unchanged() {
        let h = loaded_places().await;
        let before = h.list.items().await;
        h.backend.enqueue(Method::Post, "/api/trips/1/places", MockReply::network_error("refused"));

        assert_err!(h.list.add("Sintra").await);
        assert!(matches!(h.list.add("   ").await, Err(SyncError::EmptyName)));

        assert_eq!(h.list.items().await, before);
        assert_eq!(h.notifier.errors(), vec!["Failed to add place"]);
        assert_eq!(h.backend.requests_to(Method::Post, "/api/trips/1/places").len(), 1);
    }

    #[tokio::test]
    async fn test_remove_waits_for_confirmation() {
        let h = loaded_places().await;
        h.backend.enqueue(Method::Delete, "/api/trips/1/places/2", MockReply::text(500, "nope"));
        h.backend.enqueue(Method::Delete, "/api/trips/1/places/2", MockReply::empty(204));

        assert_err!(h.list.remove(ResourceId(2)).await);
        assert_eq!(h.list.len().await, 3);

        assert_ok!(h.list.remove(ResourceId(2)).await);
        assert!(h.list.get(ResourceId(2)).await.is_none());
        assert!(matches!(
            h.list.remove(ResourceId(2)).await,
            Err(SyncError::NotFound(ResourceId(2)))
        ));
        assert_eq!(h.notifier.messages(), vec!["Failed to remove place", "Place removed"]);
    }

    #[tokio::test]
    async fn test_auth_failure_reverts_without_notice() {
        let h = loaded_places().await;
        h.backend.enqueue(Method::Put, "/api/trips/1/places/1", MockReply::empty(401));

        let err = assert_err!(h.list.toggle_status(ResourceId(1)).await);
        assert!(err.is_auth());
        assert!(!h.list.get(ResourceId(1)).await.unwrap().visited);
        assert!(h.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_list_discards_late_response() {
        let h = loaded_places().await;
        let before = h.list.items().await;
        let gate = Arc::new(Notify::new());
        h.backend.enqueue(
            Method::Post,
            "/api/trips/1/places",
            MockReply::json(200, json!({"id": 9, "name": "Sintra", "visited": false})).gated(gate.clone()),
        );

        let (added, ()) = tokio::join!(h.list.add("Sintra"), async {
            tokio::task::yield_now().await;
            h.list.abandon();
            gate.notify_one();
        });

        assert!(matches!(added, Err(SyncError::Abandoned)));
        assert_eq!(h.list.items().await, before);
        assert!(h.notifier.notices().is_empty());
        assert!(matches!(h.list.toggle_status(ResourceId(1)).await, Err(SyncError::Abandoned)));
    }

    #[tokio::test]
    async fn test_load_keeps_in_flight_local_copy() {
        let h = loaded_places().await;
        let gate = Arc::new(Notify::new());
        h.backend.enqueue(
            Method::Put,
            "/api/trips/1/places/1",
            MockReply::json(200, json!({})).gated(gate.clone()),
        );
        h.backend.enqueue(
            Method::Get,
            "/api/trips/1/places",
            MockReply::json(
                200,
                json!([
                    {"id": 1, "name": "Belem Tower", "visited": false},
                    {"id": 4, "name": "Sintra", "visited": false}
                ]),
            ),
        );

        let (toggled, reloaded) = tokio::join!(h.list.toggle_status(ResourceId(1)), async {
            let reloaded = h.list.load().await;
            gate.notify_one();
            reloaded
        });

        let reloaded = reloaded.unwrap();
        assert!(reloaded[0].visited);
        assert_eq!(reloaded.len(), 2);
        assert!(toggled.unwrap().visited);
        assert!(h.list.get(ResourceId(1)).await.unwrap().visited);
    }
}
