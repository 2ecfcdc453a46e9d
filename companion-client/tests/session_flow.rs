//! Session lifecycle against a real HTTP server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use companion_client::{
    ClientConfig, Identity, JsonFileStore, KeyValueStore, MemoryNotifier, ReqwestBackend, SessionState,
    SessionStore, TripsApi,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer, storage: Arc<dyn KeyValueStore>, notifier: &MemoryNotifier) -> SessionStore {
    let config = ClientConfig::new(server.uri());
    let backend = ReqwestBackend::from_config(&config).unwrap();
    SessionStore::new(&config, Arc::new(backend), storage, Arc::new(notifier.clone()))
}

#[tokio::test]
async fn login_forbidden_and_restart() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    let notifier = MemoryNotifier::new();

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"username": "alice", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc123"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/trips"))
        .and(header("Authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let storage: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&file).unwrap());
    let session = store_for(&server, storage, &notifier);
    assert_eq!(session.init().unwrap(), SessionState::Unauthenticated);
    assert!(session.login("alice", "secret").await.unwrap());

    // A fresh process sees the persisted pair.
    {
        let reopened: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&file).unwrap());
        let other = store_for(&server, reopened, &MemoryNotifier::new());
        assert_eq!(
            other.init().unwrap(),
            SessionState::Authenticated(Identity::new("alice"))
        );
    }

    let prompts = Arc::new(AtomicUsize::new(0));
    let counter = prompts.clone();
    let _prompt = session.on_reauth_required(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let trips = TripsApi::new(session.transport());
    let (first, second) = tokio::join!(trips.list(), trips.list());
    assert!(first.unwrap_err().is_auth());
    assert!(second.unwrap_err().is_auth());

    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(prompts.load(Ordering::SeqCst), 1);
    assert_eq!(notifier.messages(), vec!["Welcome back!"]);

    let reopened: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&file).unwrap());
    let restarted = store_for(&server, reopened, &MemoryNotifier::new());
    assert_eq!(restarted.init().unwrap(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn login_failure_surfaces_server_message() {
    let server = MockServer::start().await;
    let notifier = MemoryNotifier::new();

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": 400,
            "error": "Bad Request",
            "message": "Username and password are required",
            "path": "/api/auth/login"
        })))
        .mount(&server)
        .await;

    let storage = Arc::new(companion_client::MemoryStore::new());
    let session = store_for(&server, storage.clone(), &notifier);
    session.init().unwrap();

    assert!(!session.login("alice", "").await.unwrap());
    assert!(storage.is_empty());
    assert_eq!(notifier.errors(), vec!["Username and password are required"]);
    assert!(!session.reauth_pending());
}

#[tokio::test]
async fn wrong_password_does_not_end_session() {
    let server = MockServer::start().await;
    let notifier = MemoryNotifier::new();

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"username": "alice", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc123"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"username": "bob", "password": "wrong"})))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": 401,
            "error": "Unauthorized",
            "message": "Invalid username or password",
            "path": "/api/auth/login"
        })))
        .mount(&server)
        .await;

    let storage = Arc::new(companion_client::MemoryStore::new());
    let session = store_for(&server, storage.clone(), &notifier);
    session.init().unwrap();
    assert!(session.login("alice", "secret").await.unwrap());

    assert!(!session.login("bob", "wrong").await.unwrap());
    assert_eq!(session.state(), SessionState::Authenticated(Identity::new("alice")));
    assert_eq!(storage.len(), 2);
    assert_eq!(session.reauth_prompts_opened(), 0);
    assert_eq!(notifier.errors(), vec!["Invalid username or password"]);
}
