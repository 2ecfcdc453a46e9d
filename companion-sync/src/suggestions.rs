//! Suggestion reconciliation engine
//!
//! Holds the ephemeral suggestion set for one trip and moves its entries
//! into the trip's places and packing items:
//! - `accept_one` creates a single resource and drops the value on success
//! - `accept_all` sends one bulk request per non-empty category
//!
//! Categories succeed or fail independently. A failed category keeps its
//! values for a retry; a category that already succeeded is never rolled
//! back.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use companion_client::{
    routes, ClientError, Method, Notice, Notifier, PackingItem, Place, SuggestionSet, TransportClient, TripId,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::resource::ListResource;

/// Which list a suggestion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Places,
    Items,
}

impl Category {
    /// Order in which bulk requests are sent.
    pub const ALL: [Category; 2] = [Category::Places, Category::Items];

    pub fn noun(self) -> &'static str {
        match self {
            Category::Places => "place",
            Category::Items => "item",
        }
    }

    fn create_path(self, trip: TripId) -> String {
        match self {
            Category::Places => Place::collection_path(trip),
            Category::Items => PackingItem::collection_path(trip),
        }
    }

    fn bulk_path(self, trip: TripId) -> String {
        match self {
            Category::Places => Place::bulk_path(trip),
            Category::Items => PackingItem::bulk_path(trip),
        }
    }

    fn create_body(self, name: &str) -> Value {
        match self {
            Category::Places => Place::create_body(name),
            Category::Items => PackingItem::create_body(name),
        }
    }

    fn bulk_body(self, names: &[String]) -> Value {
        match self {
            Category::Places => Place::bulk_body(names),
            Category::Items => PackingItem::bulk_body(names),
        }
    }

    fn values(self, set: &SuggestionSet) -> &Vec<String> {
        match self {
            Category::Places => &set.places,
            Category::Items => &set.items,
        }
    }

    fn values_mut(self, set: &mut SuggestionSet) -> &mut Vec<String> {
        match self {
            Category::Places => &mut set.places,
            Category::Items => &mut set.items,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

/// Told when accepted suggestions changed a list, so the owner can reload it.
pub trait RefreshObserver: Send + Sync {
    fn refresh(&self, category: Category);
}

impl<F> RefreshObserver for F
where
    F: Fn(Category) + Send + Sync,
{
    fn refresh(&self, category: Category) {
        self(category)
    }
}

/// Result of one category within [`SuggestionEngine::accept_all`].
#[derive(Debug)]
pub enum CategoryOutcome {
    /// Nothing to send
    Skipped,
    /// Bulk request succeeded; the values left the set
    Accepted { count: usize },
    /// Bulk request failed; the values stay for a retry
    Failed(ClientError),
    /// Not sent because the session was rejected earlier in the same call
    NotAttempted,
}

impl CategoryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CategoryOutcome::Failed(_) | CategoryOutcome::NotAttempted)
    }
}

/// Per-category outcome of an accept-all.
#[derive(Debug)]
pub struct AcceptAllReport {
    pub places: CategoryOutcome,
    pub items: CategoryOutcome,
}

impl AcceptAllReport {
    pub fn outcome(&self, category: Category) -> &CategoryOutcome {
        match category {
            Category::Places => &self.places,
            Category::Items => &self.items,
        }
    }

    /// Whether every category with values was accepted.
    pub fn is_complete(&self) -> bool {
        !self.places.is_failure() && !self.items.is_failure()
    }

    pub fn accepted(&self) -> usize {
        [&self.places, &self.items]
            .into_iter()
            .map(|o| match o {
                CategoryOutcome::Accepted { count } => *count,
                _ => 0,
            })
            .sum()
    }

    fn first_error(&self) -> Option<&ClientError> {
        [&self.places, &self.items].into_iter().find_map(|o| match o {
            CategoryOutcome::Failed(e) => Some(e),
            _ => None,
        })
    }
}

struct EngineState {
    set: Option<SuggestionSet>,
    /// Bumped whenever a new set replaces the old one.
    generation: u64,
    /// Bumped on every `generate` call; only the latest call may install a set.
    latest_request: u64,
    /// Values with an accept in flight, tagged with their generation.
    pending: HashSet<(u64, Category, String)>,
}

impl EngineState {
    fn is_pending(&self, category: Category, value: &str) -> bool {
        self.pending
            .iter()
            .any(|(g, c, v)| *g == self.generation && *c == category && v == value)
    }

    fn release(&mut self, generation: u64, category: Category, values: &[String]) {
        for value in values {
            self.pending.remove(&(generation, category, value.clone()));
        }
    }

    // Drop accepted values, unless a newer set has replaced the one they came from.
    fn consume(&mut self, generation: u64, category: Category, values: &[String]) {
        if generation != self.generation {
            debug!(category = %category, "Set replaced while accepting, keeping new set");
            return;
        }
        if let Some(set) = self.set.as_mut() {
            category.values_mut(set).retain(|v| !values.contains(v));
        }
    }
}

/// Suggestion set for one trip and its reconciliation into the trip's lists.
pub struct SuggestionEngine {
    trip: TripId,
    transport: TransportClient,
    notifier: Arc<dyn Notifier>,
    observer: Option<Arc<dyn RefreshObserver>>,
    state: Mutex<EngineState>,
    abandoned: AtomicBool,
}

impl SuggestionEngine {
    pub fn new(trip: TripId, transport: TransportClient, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            trip,
            transport,
            notifier,
            observer: None,
            state: Mutex::new(EngineState {
                set: None,
                generation: 0,
                latest_request: 0,
                pending: HashSet::new(),
            }),
            abandoned: AtomicBool::new(false),
        }
    }

    /// Observer told after each successful accept.
    pub fn with_observer(mut self, observer: Arc<dyn RefreshObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Current set, if one has been generated.
    pub async fn suggestions(&self) -> Option<SuggestionSet> {
        self.state.lock().await.set.clone()
    }

    /// Whether `value` has an accept in flight.
    pub async fn is_pending(&self, category: Category, value: &str) -> bool {
        self.state.lock().await.is_pending(category, value)
    }

    /// Stop applying responses. Late responses resolve to
    /// [`SyncError::Abandoned`].
    pub fn abandon(&self) {
        if !self.abandoned.swap(true, Ordering::SeqCst) {
            debug!(trip_id = %self.trip, "Suggestion engine abandoned");
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.abandoned.load(Ordering::SeqCst) {
            return Err(SyncError::Abandoned);
        }
        Ok(())
    }

    fn report_failure(&self, err: &ClientError, fallback: &str) {
        if let Some(message) = err.user_message(fallback) {
            self.notifier.notify(Notice::error(message));
        }
    }

    fn refresh(&self, category: Category) {
        if let Some(observer) = &self.observer {
            observer.refresh(category);
        }
    }

    /// Ask the server for a new set. On failure the previous set, if any,
    /// is kept and nothing is retried.
    pub async fn generate(&self) -> Result<SuggestionSet> {
        self.ensure_live()?;
        let request = {
            let mut state = self.state.lock().await;
            state.latest_request += 1;
            state.latest_request
        };
        debug!(trip_id = %self.trip, request, "Requesting suggestions");

        let result = self.transport.get::<SuggestionSet>(&routes::suggest(self.trip)).await;

        let mut state = self.state.lock().await;
        self.ensure_live()?;

        match result {
            Ok(set) => {
                if state.latest_request == request {
                    state.generation += 1;
                    state.set = Some(set.clone());
                    drop(state);
                    info!(
                        trip_id = %self.trip,
                        places = set.places.len(),
                        items = set.items.len(),
                        "Suggestions generated"
                    );
                    self.notifier.notify(Notice::success("Suggestions generated"));
                } else {
                    debug!(trip_id = %self.trip, request, "Newer generate in flight, discarding set");
                }
                Ok(set)
            }
            Err(e) => {
                drop(state);
                warn!(trip_id = %self.trip, error = %e, "Failed to generate suggestions");
                self.report_failure(&e, "Failed to generate suggestions");
                Err(e.into())
            }
        }
    }

    /// Create one suggested value in its list.
    ///
    /// The value leaves the set only when the server accepted it.
    pub async fn accept_one(&self, category: Category, value: &str) -> Result<()> {
        self.ensure_live()?;
        let generation = {
            let mut state = self.state.lock().await;
            let known = state
                .set
                .as_ref()
                .is_some_and(|set| category.values(set).iter().any(|v| v == value));
            if !known {
                return Err(SyncError::UnknownSuggestion {
                    category,
                    value: value.to_string(),
                });
            }
            if state.is_pending(category, value) {
                return Err(SyncError::SuggestionInFlight(value.to_string()));
            }
            let generation = state.generation;
            state.pending.insert((generation, category, value.to_string()));
            generation
        };

        let result = self
            .transport
            .request_with(Method::Post, &category.create_path(self.trip), &category.create_body(value))
            .await;

        let mut state = self.state.lock().await;
        let accepted = [value.to_string()];
        state.release(generation, category, &accepted);
        self.ensure_live()?;

        match result {
            Ok(_) => {
                state.consume(generation, category, &accepted);
                drop(state);
                info!(trip_id = %self.trip, %category, value, "Suggestion accepted");
                self.notifier.notify(Notice::success(format!("{} added", value)));
                self.refresh(category);
                Ok(())
            }
            Err(e) => {
                drop(state);
                warn!(trip_id = %self.trip, %category, value, error = %e, "Failed to accept suggestion");
                self.report_failure(&e, &format!("Failed to add {}", category.noun()));
                Err(e.into())
            }
        }
    }

    /// Accept every remaining value, one bulk request per category.
    ///
    /// Values with an individual accept in flight are left out. Once a
    /// category fails with an auth error the rest are not attempted.
    pub async fn accept_all(&self) -> Result<AcceptAllReport> {
        self.ensure_live()?;
        let (generation, batches) = {
            let mut state = self.state.lock().await;
            let generation = state.generation;
            let Some(set) = state.set.as_ref() else {
                return Err(SyncError::NoSuggestions);
            };
            let batches: Vec<(Category, Vec<String>)> = Category::ALL
                .into_iter()
                .map(|category| {
                    let values = category
                        .values(set)
                        .iter()
                        .filter(|v| !state.is_pending(category, v))
                        .cloned()
                        .collect();
                    (category, values)
                })
                .collect();
            if batches.iter().all(|(_, values)| values.is_empty()) {
                return Err(SyncError::NoSuggestions);
            }
            for (category, values) in &batches {
                for value in values {
                    state.pending.insert((generation, *category, value.clone()));
                }
            }
            (generation, batches)
        };

        let mut places = CategoryOutcome::Skipped;
        let mut items = CategoryOutcome::Skipped;
        let mut session_lost = false;

        for (category, values) in batches {
            if values.is_empty() {
                continue;
            }
            let outcome = if session_lost {
                self.state.lock().await.release(generation, category, &values);
                CategoryOutcome::NotAttempted
            } else {
                self.accept_batch(generation, category, &values).await?
            };
            if matches!(&outcome, CategoryOutcome::Failed(e) if e.is_auth()) {
                session_lost = true;
            }
            match category {
                Category::Places => places = outcome,
                Category::Items => items = outcome,
            }
        }

        let report = AcceptAllReport { places, items };
        if report.is_complete() {
            info!(trip_id = %self.trip, accepted = report.accepted(), "All suggestions accepted");
            self.notifier.notify(Notice::success("All suggestions added"));
        } else if let Some(e) = report.first_error() {
            self.report_failure(e, "Failed to add all");
        }
        Ok(report)
    }

    async fn accept_batch(&self, generation: u64, category: Category, values: &[String]) -> Result<CategoryOutcome> {
        debug!(trip_id = %self.trip, %category, count = values.len(), "Bulk accepting");
        let result = self
            .transport
            .request_with(Method::Post, &category.bulk_path(self.trip), &category.bulk_body(values))
            .await;

        let mut state = self.state.lock().await;
        state.release(generation, category, values);
        self.ensure_live()?;

        match result {
            Ok(_) => {
                state.consume(generation, category, values);
                drop(state);
                self.refresh(category);
                Ok(CategoryOutcome::Accepted { count: values.len() })
            }
            Err(e) => {
                warn!(trip_id = %self.trip, %category, error = %e, "Bulk accept failed");
                Ok(CategoryOutcome::Failed(e))
            }
        }
    }
}
