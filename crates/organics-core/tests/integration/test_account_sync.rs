//! Account sync over HTTP: listing, deletion and session invalidation.

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use organics_core::{SessionStatus, SyncError, SyncPhase};

use crate::common::{self, TOKEN};

#[tokio::test]
async fn test_refresh_lists_accounts_with_bearer() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(query_param("limit", "10"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            common::account_json("1"),
            common::account_json("2"),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let session = common::signed_in_session(&client);
    let controller = common::mount_controller(&session, &client);

    controller.refresh().await.expect("refresh");
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, SyncPhase::Ready);
    assert_eq!(snapshot.account_ids(), vec!["1", "2"]);

    let first = snapshot.account("1").expect("account 1");
    assert_eq!(first.label(), "@organics1");
    assert_eq!(first.masked_refresh_token(), "rft.1.0123456789abcd...");
    assert_eq!(first.scopes_display(), "user.info.basic, video.list");
}

#[tokio::test]
async fn test_remove_confirmed_by_server() {
    let (server, client) = common::setup_backend().await;
    // First listing sees both accounts, later ones only the survivor
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            common::account_json("1"),
            common::account_json("2"),
        ]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_accounts(&server, &["2"]).await;
    Mock::given(method("DELETE"))
        .and(path("/accounts/1"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let session = common::signed_in_session(&client);
    let controller = common::mount_controller(&session, &client);
    controller.refresh().await.expect("refresh");

    controller.remove("1").await.expect("remove");
    assert_eq!(controller.snapshot().account_ids(), vec!["2"]);

    controller.refresh().await.expect("refresh after delete");
    assert_eq!(controller.snapshot().account_ids(), vec!["2"]);
}

#[tokio::test]
async fn test_remove_rejected_by_server() {
    let (server, client) = common::setup_backend().await;
    common::mount_accounts(&server, &["1", "2"]).await;
    Mock::given(method("DELETE"))
        .and(path("/accounts/1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let session = common::signed_in_session(&client);
    let controller = common::mount_controller(&session, &client);
    controller.refresh().await.expect("refresh");

    let err = controller.remove("1").await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
    assert_eq!(controller.snapshot().account_ids(), vec!["1", "2"]);
    assert!(controller.snapshot().last_error.is_some());
}

#[tokio::test]
async fn test_unauthorized_listing_ends_session() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "detail": "Could not validate credentials"
        })))
        .mount(&server)
        .await;

    let session = common::signed_in_session(&client);
    let mut status = session.subscribe();
    let controller = common::mount_controller(&session, &client);

    let err = controller.refresh().await.unwrap_err();
    assert_eq!(err, SyncError::AuthRejected);
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert!(session.current_credential().is_none());

    status.changed().await.expect("status change published");
    assert!(!status.borrow().is_authenticated());
}
