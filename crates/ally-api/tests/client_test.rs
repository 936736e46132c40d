#![allow(clippy::unwrap_used)]
// Integration tests for `AllyClient` using wiremock.

use pretty_assertions::assert_eq;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ally_api::{AllyClient, CommandPayload, Credentials, Error};

// ── Helpers ─────────────────────────────────────────────────────────

fn credentials() -> Credentials {
    Credentials::new("key", SecretString::from("secret".to_owned()))
}

async fn setup() -> (MockServer, AllyClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = AllyClient::with_client(reqwest::Client::new(), base_url, credentials());
    (server, client)
}

async fn mount_token(server: &MockServer, expires_in: serde_json::Value, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("authorization", "Basic a2V5OnNlY3JldA=="))
        .and(body_string("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "expires_in": expires_in,
        })))
        .expect(calls)
        .mount(server)
        .await;
}

// ── Token lifecycle ─────────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_success() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    client.authenticate().await.unwrap();
    assert!(client.tokens().has_token().await);
}

#[tokio::test]
async fn test_authenticate_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let result = client.authenticate().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.tokens().has_token().await);
}

#[tokio::test]
async fn test_token_endpoint_outage_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client.authenticate().await.unwrap_err();
    assert!(!err.is_auth(), "outage reported as auth failure: {err:?}");
    assert!(err.is_transient());
    assert_eq!(err.status(), Some(503));
    assert!(!client.tokens().has_token().await);
}

#[tokio::test]
async fn test_token_without_access_token_is_auth_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"expires_in": 3600})))
        .mount(&server)
        .await;

    let err = client.authenticate().await.unwrap_err();
    assert!(err.is_auth(), "got: {err:?}");
}

#[tokio::test]
async fn test_token_is_reused_until_margin() {
    let (server, client) = setup().await;
    mount_token(&server, json!("3600"), 1).await;

    Mock::given(method("GET"))
        .and(path("/ally/devices"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(3)
        .mount(&server)
        .await;

    for _ in 0..3 {
        client.list_devices().await.unwrap();
    }
}

#[tokio::test]
async fn test_short_lived_token_is_refetched_every_call() {
    let (server, client) = setup().await;
    // 20s lifetime is already inside the 30s margin.
    mount_token(&server, json!(20), 2).await;

    Mock::given(method("GET"))
        .and(path("/ally/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .mount(&server)
        .await;

    client.list_devices().await.unwrap();
    client.list_devices().await.unwrap();
}

#[tokio::test]
async fn test_unauthorized_data_call_invalidates_token() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    Mock::given(method("GET"))
        .and(path("/ally/devices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    assert!(err.is_auth());
    assert!(!client.tokens().has_token().await);
}

#[tokio::test]
async fn test_forbidden_data_call_invalidates_token() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    Mock::given(method("GET"))
        .and(path("/ally/devices"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    assert!(err.is_auth());
    assert!(!client.tokens().has_token().await);
}

// ── Device endpoints ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    Mock::given(method("GET"))
        .and(path("/ally/devices"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{
                "id": "d1",
                "name": " Living room ",
                "online": true,
                "update_time": 1_700_000_000,
                "model": "Danfoss Ally™ Radiator Thermostat",
                "status": [
                    {"code": "temp_current", "value": 215},
                    {"code": "mode", "value": "at_home"}
                ]
            }]
        })))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    let device = &devices[0];
    assert_eq!(device.id, "d1");
    assert!(device.online);
    assert_eq!(device.update_time, Some(1_700_000_000));
    assert_eq!(device.status.len(), 2);
    assert_eq!(device.status[0].code, "temp_current");
    assert_eq!(device.status[0].value, json!(215));
}

#[tokio::test]
async fn test_list_devices_skips_undecodable_entries() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    Mock::given(method("GET"))
        .and(path("/ally/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"id": "d1", "name": "Kitchen", "online": true, "status": []},
                {"id": "d2", "name": null, "update_time": "1700000000", "status": []},
                {"id": "d3", "status": "broken"},
                {"name": "no id"}
            ]
        })))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();
    let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, ["d1", "d2"]);
    assert_eq!(devices[1].name, "");
    assert_eq!(devices[1].update_time, Some(1_700_000_000));
}

#[tokio::test]
async fn test_get_device() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    Mock::given(method("GET"))
        .and(path("/ally/devices/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"id": "d1", "name": "Office", "online": false, "status": []}
        })))
        .mount(&server)
        .await;

    let device = client.get_device("d1").await.unwrap();
    assert_eq!(device.name, "Office");
    assert!(!device.online);
}

#[tokio::test]
async fn test_get_device_without_result_is_decode_error() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    Mock::given(method("GET"))
        .and(path("/ally/devices/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let result = client.get_device("d1").await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

#[tokio::test]
async fn test_send_commands() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    Mock::given(method("POST"))
        .and(path("/ally/devices/d1/commands"))
        .and(body_json(json!({
            "commands": [{"code": "manual_mode_fast", "value": 210}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .expect(1)
        .mount(&server)
        .await;

    let accepted = client
        .send_commands("d1", &[CommandPayload::new("manual_mode_fast", 210)])
        .await
        .unwrap();
    assert!(accepted);
}

#[tokio::test]
async fn test_send_commands_rejected_flag() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    Mock::given(method("POST"))
        .and(path("/ally/devices/d1/commands"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": false})))
        .mount(&server)
        .await;

    let accepted = client
        .send_commands("d1", &[CommandPayload::new("mode", "manual")])
        .await
        .unwrap();
    assert!(!accepted);
}

// ── Failure classification ──────────────────────────────────────────

#[tokio::test]
async fn test_server_error_is_transient_http_error() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    Mock::given(method("GET"))
        .and(path("/ally/devices"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    Mock::given(method("GET"))
        .and(path("/ally/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    match client.list_devices().await {
        Err(Error::Deserialization { body, .. }) => assert_eq!(body, "not json"),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_reported() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let transport = ally_api::TransportConfig {
        base_url,
        timeout: std::time::Duration::from_millis(200),
        ..Default::default()
    };
    let client = AllyClient::new(credentials(), &transport).unwrap();

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "t", "expires_in": 3600}))
                .set_delay(std::time::Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got: {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_generic_call_returns_json() {
    let (server, client) = setup().await;
    mount_token(&server, json!(3600), 1).await;

    Mock::given(method("GET"))
        .and(path("/ally/devices/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"id": "d1"}})))
        .mount(&server)
        .await;

    let value = client
        .call(Method::GET, "/ally/devices/d1", None)
        .await
        .unwrap();
    assert_eq!(value["result"]["id"], "d1");

    let token = client
        .tokens()
        .valid_token(&reqwest::Client::new(), client.base_url(), 10)
        .await
        .unwrap();
    assert_eq!(token.expose_secret(), "tok-1");
}
