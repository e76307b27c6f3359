//! Shared helpers: a mock backend, pre-built clients and sessions.

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use organics_core::{
    AccountSyncController, ApiClient, Credential, MemoryTokenStorage, SessionManager, SyncOptions,
};

pub const TOKEN: &str = "abc123";

/// Starts a mock server and a client pointed at it.
pub async fn setup_backend() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let client = ApiClient::new(&server.uri()).expect("mock server uri is a valid base url");
    (server, client)
}

pub fn account_json(id: &str) -> Value {
    json!({
        "id": id,
        "display_name": format!("@organics{}", id),
        "refresh_token": format!("rft.{}.0123456789abcdefghij", id),
        "refresh_token_expires_at": "2026-11-02T14:30:00Z",
        "scopes": ["user.info.basic", "video.list"]
    })
}

/// Session restored from storage with the test bearer token.
pub fn signed_in_session(client: &ApiClient) -> Arc<SessionManager> {
    let storage = MemoryTokenStorage::with_credential(Credential::bearer(TOKEN));
    Arc::new(SessionManager::initialize(
        Arc::new(client.clone()),
        Box::new(storage),
    ))
}

/// Controller with polling disabled so tests drive every fetch.
pub fn mount_controller(
    session: &Arc<SessionManager>,
    client: &ApiClient,
) -> AccountSyncController {
    AccountSyncController::mount(
        Arc::clone(session),
        Arc::new(client.clone()),
        SyncOptions {
            poll_interval: None,
            connect_url: "https://www.tiktok.com/v2/auth/authorize?client_key=test".to_string(),
        },
    )
    .expect("session is authenticated")
}

/// Mounts GET /accounts answering with the given ids, bearer-checked.
pub async fn mount_accounts(server: &MockServer, ids: &[&str]) {
    let body: Vec<Value> = ids.iter().map(|id| account_json(id)).collect();
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
