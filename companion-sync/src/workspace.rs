//! Per-trip workspace.
//!
//! Bundles a trip's two lists and its suggestion engine. Accepted
//! suggestions create items behind the lists' backs, so the engine marks
//! the affected list stale and [`TripWorkspace::refresh_if_stale`] reloads
//! it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use companion_client::{Notifier, PackingItem, Place, TransportClient, TripId};
use tracing::debug;

use crate::error::Result;
use crate::list::ResourceList;
use crate::suggestions::{Category, SuggestionEngine};

#[derive(Default)]
struct StaleFlags {
    places: AtomicBool,
    items: AtomicBool,
}

impl StaleFlags {
    fn flag(&self, category: Category) -> &AtomicBool {
        match category {
            Category::Places => &self.places,
            Category::Items => &self.items,
        }
    }
}

/// Everything the client keeps for one open trip.
pub struct TripWorkspace {
    trip: TripId,
    places: ResourceList<Place>,
    items: ResourceList<PackingItem>,
    suggestions: SuggestionEngine,
    stale: Arc<StaleFlags>,
}

impl TripWorkspace {
    pub fn new(trip: TripId, transport: TransportClient, notifier: Arc<dyn Notifier>) -> Self {
        let stale = Arc::new(StaleFlags::default());
        let observer = {
            let stale = stale.clone();
            move |category: Category| {
                debug!(%category, "List marked stale");
                stale.flag(category).store(true, Ordering::SeqCst);
            }
        };

        Self {
            trip,
            places: ResourceList::new(trip, transport.clone(), notifier.clone()),
            items: ResourceList::new(trip, transport.clone(), notifier.clone()),
            suggestions: SuggestionEngine::new(trip, transport, notifier).with_observer(Arc::new(observer)),
            stale,
        }
    }

    pub fn trip(&self) -> TripId {
        self.trip
    }

    pub fn places(&self) -> &ResourceList<Place> {
        &self.places
    }

    pub fn items(&self) -> &ResourceList<PackingItem> {
        &self.items
    }

    pub fn suggestions(&self) -> &SuggestionEngine {
        &self.suggestions
    }

    pub fn is_stale(&self, category: Category) -> bool {
        self.stale.flag(category).load(Ordering::SeqCst)
    }

    /// Fetch both lists. They load concurrently.
    pub async fn load(&self) -> Result<()> {
        self.stale.places.store(false, Ordering::SeqCst);
        self.stale.items.store(false, Ordering::SeqCst);
        let (places, items) = tokio::join!(self.places.load(), self.items.load());
        places?;
        items?;
        Ok(())
    }

    /// Reload the lists changed by accepted suggestions. Returns whether
    /// anything was reloaded.
    pub async fn refresh_if_stale(&self) -> Result<bool> {
        let places = self.stale.places.swap(false, Ordering::SeqCst);
        let items = self.stale.items.swap(false, Ordering::SeqCst);

        let (place_result, item_result) = tokio::join!(
            async {
                if places {
                    self.places.load().await.map(|_| ())
                } else {
                    Ok(())
                }
            },
            async {
                if items {
                    self.items.load().await.map(|_| ())
                } else {
                    Ok(())
                }
            }
        );

        // Failed reloads stay stale.
        if place_result.is_err() {
            self.stale.places.store(true, Ordering::SeqCst);
        }
        if item_result.is_err() {
            self.stale.items.store(true, Ordering::SeqCst);
        }
        place_result?;
        item_result?;
        Ok(places || items)
    }

    /// Tear down: responses still in flight are discarded.
    pub fn abandon(&self) {
        self.places.abandon();
        self.items.abandon();
        self.suggestions.abandon();
    }
}
