//! Login, persistence and logout against a mock backend.

use std::sync::Arc;

use organics_core::{
    ApiClient, ErrorKind, FileTokenStorage, LoginError, SessionManager, SessionStatus,
    TokenStorage,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

fn file_session(client: &ApiClient, dir: &std::path::Path) -> SessionManager {
    SessionManager::initialize(Arc::new(client.clone()), Box::new(FileTokenStorage::new(dir)))
}

#[tokio::test]
async fn test_login_success_persists_to_file() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("username=ops%40example.com"))
        .and(body_string_contains("password=correct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "abc123",
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let session = file_session(&client, dir.path());
    assert_eq!(session.status(), SessionStatus::Unauthenticated);

    session
        .login("ops@example.com", "correct")
        .await
        .expect("login succeeds");
    assert_eq!(session.status(), SessionStatus::Authenticated);

    let stored = FileTokenStorage::new(dir.path())
        .load()
        .expect("read session file")
        .expect("credential persisted");
    assert_eq!(stored.access_token(), "abc123");
    assert_eq!(stored.token_type(), "bearer");

    // A fresh process restores the same credential without a network call
    let restored = file_session(&client, dir.path());
    assert_eq!(restored.status(), SessionStatus::Authenticated);
    assert_eq!(restored.current_credential(), session.current_credential());
}

#[tokio::test]
async fn test_login_rejected_credentials() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Incorrect username or password"})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let session = file_session(&client, dir.path());

    let err = session.login("ops@example.com", "wrong").await.unwrap_err();
    assert_eq!(err, LoginError::InvalidCredentials);
    assert_eq!(err.to_string(), "Invalid email or password");
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert!(!dir.path().join("session.json").exists());
}

#[tokio::test]
async fn test_login_validation_detail_is_surfaced() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [{"loc": ["body", "username"], "msg": "value is not a valid email address", "type": "value_error"}]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let session = file_session(&client, dir.path());

    let err = session.login("not-an-email", "secret").await.unwrap_err();
    assert!(matches!(err, LoginError::MalformedRequest(ref msg) if msg.contains("not a valid email")));
    assert_eq!(err.kind(), ErrorKind::Server);
}

#[tokio::test]
async fn test_login_server_error_is_unreachable() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let session = file_session(&client, dir.path());

    let err = session.login("ops@example.com", "correct").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_login_garbled_token_response() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let session = file_session(&client, dir.path());

    let err = session.login("ops@example.com", "correct").await.unwrap_err();
    assert!(matches!(err, LoginError::Unreachable(_)));
    assert!(session.current_credential().is_none());
}

#[tokio::test]
async fn test_login_connection_refused() {
    // Reserve a port, then release it so nothing is listening
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    };
    let client = ApiClient::new(&format!("http://127.0.0.1:{}", port)).expect("valid base url");
    let dir = tempfile::tempdir().expect("tempdir");
    let session = file_session(&client, dir.path());

    let err = session.login("ops@example.com", "correct").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_logout_clears_file() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "abc123",
            "token_type": "bearer"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let session = file_session(&client, dir.path());
    session.login("ops@example.com", "correct").await.expect("login");

    session.logout();
    session.logout();
    assert!(!dir.path().join("session.json").exists());

    let restored = file_session(&client, dir.path());
    assert_eq!(restored.status(), SessionStatus::Unauthenticated);
}
