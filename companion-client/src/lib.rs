//! Travel Companion client - session and transport layer
//!
//! Provides the authenticated plumbing every other part of the client sits on:
//! - Trait-based HTTP backends (reqwest for production, scripted mock for tests)
//! - A transport that attaches the bearer credential and classifies auth failures
//! - The session store owning the credential/identity pair and its persistence
//! - A subscription registry carrying the "session is now invalid" signal
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              SessionStore               │
//! │  (login / register / logout / init)     │
//! └──────┬──────────────────────▲───────────┘
//!        │ credential           │ SessionSignal
//!        ▼                      │
//! ┌─────────────────────────────┴───────────┐
//! │            TransportClient              │
//! │  (Authorization, status classification) │
//! └────────────────┬────────────────────────┘
//!                  ▼
//!          ┌───────────────┐
//!          │  HttpBackend  │
//!          │ (reqwest/mock)│
//!          └───────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod notice;
pub mod routes;
pub mod session;
pub mod signal;
pub mod storage;
pub mod transport;
pub mod trips;
pub mod types;

// Re-export main types for convenience
pub use backend::{BackendError, HttpBackend, HttpRequest, HttpResponse, Method, MockBackend, MockReply, ReqwestBackend};
pub use config::{ClientConfig, StorageKeys};
pub use error::{ClientError, Result};
pub use notice::{MemoryNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use session::{SessionState, SessionStore};
pub use signal::{SessionSignal, SignalEmitter, Subscription};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, StorageError};
pub use transport::{CredentialSource, ResponseBody, StaticCredential, TransportClient};
pub use trips::TripsApi;
pub use types::*;
