//! Travel Companion sync - keeps a trip's lists consistent with the server
//!
//! Built on the session-aware transport from `companion-client`:
//! - [`ResourceList`]: optimistic status toggles with per-item rollback,
//!   confirmed adds and removes, one mutation per item at a time
//! - [`SuggestionEngine`]: ephemeral AI suggestions accepted one by one or
//!   in per-category bulk requests with independent outcomes
//! - [`TripWorkspace`]: one trip's lists and suggestions, torn down together
//!
//! Every container owns its own lock and never holds it across a remote
//! call. Containers can be abandoned; responses that arrive afterwards are
//! dropped instead of applied.

pub mod error;
pub mod list;
pub mod resource;
pub mod suggestions;
pub mod workspace;

pub use error::{Result, SyncError};
pub use list::{Operation, ResourceList, Strategy};
pub use resource::ListResource;
pub use suggestions::{AcceptAllReport, Category, CategoryOutcome, RefreshObserver, SuggestionEngine};
pub use workspace::TripWorkspace;
