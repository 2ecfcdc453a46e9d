//! Error types for list and suggestion synchronization

use companion_client::{ClientError, ResourceId};
use thiserror::Error;

use crate::suggestions::Category;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync error
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote call failed. Local state has been restored where it was
    /// changed ahead of the call.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Another mutation for this item has not resolved yet
    #[error("A change to item {0} is still in progress")]
    MutationInFlight(ResourceId),

    #[error("No item with id {0} in this list")]
    NotFound(ResourceId),

    #[error("Name is required")]
    EmptyName,

    /// Nothing left to accept
    #[error("No suggestions to accept")]
    NoSuggestions,

    #[error("{value:?} is not a current {category} suggestion")]
    UnknownSuggestion { category: Category, value: String },

    #[error("{0:?} is already being added")]
    SuggestionInFlight(String),

    /// The owner tore the list down before the response arrived; the
    /// response was discarded.
    #[error("Response discarded after teardown")]
    Abandoned,
}

impl SyncError {
    /// Whether the session was rejected. The session signal has already
    /// been handled when this is true.
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Client(e) if e.is_auth())
    }

    /// Underlying client error, if the failure was remote.
    pub fn client(&self) -> Option<&ClientError> {
        match self {
            SyncError::Client(e) => Some(e),
            _ => None,
        }
    }
}
