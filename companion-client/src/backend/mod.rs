//! HTTP backend abstraction layer.
//!
//! Provides a trait-based interface under the transport:
//! - reqwest (production)
//! - Mock backend for testing

pub mod http;
pub mod mock;
pub mod traits;

pub use http::ReqwestBackend;
pub use mock::{MockBackend, MockReply};
pub use traits::{BackendError, HttpBackend, HttpRequest, HttpResponse, Method};
