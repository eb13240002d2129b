#![allow(clippy::unwrap_used)]
// Integration tests for `SupervisorClient` using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use librecoach_api::{Error, PersistentNotification, SupervisorClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, SupervisorClient) {
    let server = MockServer::start().await;
    let token = SecretString::from("test-token".to_string());
    let client =
        SupervisorClient::from_token(&server.uri(), &token, &TransportConfig::default()).unwrap();
    (server, client)
}

// ── Add-on info ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_addon_info_sends_bearer_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/addons/abc_librecoach/info"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "ok",
            "data": { "slug": "abc_librecoach", "version": "2.1.0", "state": "started" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let info = client.addon_info("abc_librecoach").await.unwrap().unwrap();

    assert!(info.is_installed());
    assert_eq!(info.state.as_deref(), Some("started"));
}

#[tokio::test]
async fn test_addon_info_store_entry_is_not_installed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/addons/abc_librecoach/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "ok",
            "data": { "slug": "abc_librecoach", "version": null }
        })))
        .mount(&server)
        .await;

    let info = client.addon_info("abc_librecoach").await.unwrap().unwrap();

    assert!(!info.is_installed());
}

#[tokio::test]
async fn test_addon_info_unknown_slug_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/addons/gone/info"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "result": "error",
            "message": "Addon gone does not exist"
        })))
        .mount(&server)
        .await;

    assert!(client.addon_info("gone").await.unwrap().is_none());
}

#[tokio::test]
async fn test_addon_info_server_error_is_an_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/addons/abc/info"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let result = client.addon_info("abc").await;

    assert!(
        matches!(result, Err(Error::Supervisor { status: 502, .. })),
        "expected Supervisor error, got: {result:?}"
    );
    assert!(result.unwrap_err().is_transient());
}

#[tokio::test]
async fn test_rejected_token_is_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/addons/abc/info"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.addon_info("abc").await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

// ── Add-on listing ──────────────────────────────────────────────────

#[tokio::test]
async fn test_list_addons() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/addons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "ok",
            "data": {
                "addons": [
                    { "slug": "core_mosquitto", "version": "6.4.0" },
                    { "slug": "abc_librecoach", "version": "2.1.0" }
                ]
            }
        })))
        .mount(&server)
        .await;

    let list = client.list_addons().await.unwrap();

    assert_eq!(list.addons.len(), 2);
    assert!(list.contains("abc_librecoach"));
    assert!(!list.contains("librecoach"));
}

#[tokio::test]
async fn test_error_envelope_with_http_200() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/addons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "error",
            "message": "System is not ready"
        })))
        .mount(&server)
        .await;

    let result = client.list_addons().await;

    match result {
        Err(Error::Supervisor { status, message }) => {
            assert_eq!(status, 200);
            assert_eq!(message, "System is not ready");
        }
        other => panic!("expected Supervisor error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/addons"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = client.list_addons().await;

    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_request_timeout_is_transport_error() {
    let server = MockServer::start().await;
    let token = SecretString::from("t".to_string());
    let transport = TransportConfig::with_timeout(Duration::from_millis(50));
    let client = SupervisorClient::from_token(&server.uri(), &token, &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/addons"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({ "result": "ok", "data": { "addons": [] } })),
        )
        .mount(&server)
        .await;

    let err = client.list_addons().await.unwrap_err();

    assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
    assert!(err.is_transient());
}

// ── Notifications ───────────────────────────────────────────────────

#[tokio::test]
async fn test_create_persistent_notification() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/core/api/services/persistent_notification/create"))
        .and(body_json(json!({
            "title": "Hello",
            "message": "World",
            "notification_id": "librecoach_ble_cleanup"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    client
        .create_persistent_notification(&PersistentNotification {
            title: "Hello".into(),
            message: "World".into(),
            notification_id: "librecoach_ble_cleanup".into(),
        })
        .await
        .unwrap();
}
