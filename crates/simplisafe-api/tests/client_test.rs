#![allow(clippy::unwrap_used)]
// Integration tests for `ApiClient` using wiremock.

use chrono::{TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use simplisafe_api::models::LockCommand;
use simplisafe_api::{ApiClient, ClientIdentity, Error, LoginCredentials, TokenPair};

const CLIENT_ID: &str = "test-client";
const USER_ID: u64 = 12345;

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = ApiClient::with_client(
        reqwest::Client::new(),
        base_url,
        Url::parse("wss://api.simplisafe.com/socket.io").unwrap(),
        ClientIdentity::new(CLIENT_ID),
    );
    (server, client)
}

fn password() -> LoginCredentials {
    LoginCredentials::Password {
        email: "user@example.com".into(),
        password: SecretString::from("hunter2".to_owned()),
    }
}

fn tokens(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 3600,
        "token_type": "Bearer"
    })
}

async fn mount_password_grant(server: &MockServer, access: &str) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_partial_json(json!({ "grant_type": "password" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens(access, "refresh-1")))
        .mount(server)
        .await;
}

async fn mount_auth_check(server: &MockServer, access: &str) {
    Mock::given(method("GET"))
        .and(path("/api/authCheck"))
        .and(header("authorization", format!("Bearer {access}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "userId": USER_ID })))
        .mount(server)
        .await;
}

async fn logged_in() -> (MockServer, ApiClient) {
    let (server, client) = setup().await;
    mount_password_grant(&server, "access-1").await;
    mount_auth_check(&server, "access-1").await;
    client.login(&password()).await.unwrap();
    (server, client)
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_partial_json(json!({
            "grant_type": "password",
            "username": "user@example.com",
            "password": "hunter2",
            "client_id": "test-client.WebApp.simplisafe.com",
            "app_version": "1.62.0",
            "scope": "offline_access"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens("access-1", "refresh-1")))
        .expect(1)
        .mount(&server)
        .await;
    mount_auth_check(&server, "access-1").await;

    client.login(&password()).await.unwrap();

    assert_eq!(client.user_id(), Some(USER_ID));
    let pair = client.credentials().current().unwrap();
    assert_eq!(pair.access_token().expose_secret(), "access-1");
    assert_eq!(pair.refresh_token().expose_secret(), "refresh-1");
    assert!(!pair.is_expired(Utc::now()));
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Wrong email or password."
        })))
        .mount(&server)
        .await;

    let result = client.login(&password()).await;

    assert!(
        matches!(&result, Err(Error::InvalidCredentials { message }) if message.contains("Wrong email")),
        "expected InvalidCredentials, got: {result:?}"
    );
    assert!(!client.credentials().is_authenticated());
}

#[tokio::test]
async fn test_login_mfa_is_pending_authorization() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_partial_json(json!({ "grant_type": "password" })))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "mfa_required",
            "mfa_token": "mfa-token"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/mfa/challenge"))
        .and(body_partial_json(json!({
            "challenge_type": "oob",
            "mfa_token": "mfa-token"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "oob_code": "oob-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_partial_json(json!({
            "grant_type": "http://simplisafe.com/oauth/grant-type/mfa-oob",
            "oob_code": "oob-1"
        })))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "authorization_pending" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client.login(&password()).await;

    assert!(
        matches!(&result, Err(Error::PendingAuthorization { client_id }) if client_id == CLIENT_ID),
        "expected PendingAuthorization, got: {result:?}"
    );
    assert!(!client.credentials().is_authenticated());
    assert_eq!(client.user_id(), None);
}

#[tokio::test]
async fn test_login_mfa_error_without_token_is_pending() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "mfa_required",
            "error_description": "Multifactor authentication required"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/mfa/challenge"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.login(&password()).await;

    assert!(
        matches!(&result, Err(Error::PendingAuthorization { client_id }) if client_id == CLIENT_ID),
        "expected PendingAuthorization, got: {result:?}"
    );
    assert!(!client.credentials().is_authenticated());
}

#[tokio::test]
async fn test_login_via_refresh_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_partial_json(json!({
            "grant_type": "refresh_token",
            "client_id": CLIENT_ID,
            "refresh_token": "stored-refresh"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_auth_check(&server, "access-2").await;

    client
        .login(&LoginCredentials::RefreshToken(SecretString::from(
            "stored-refresh".to_owned(),
        )))
        .await
        .unwrap();

    assert_eq!(client.user_id(), Some(USER_ID));
    // Server did not rotate the refresh token; the stored one is kept.
    let pair = client.credentials().current().unwrap();
    assert_eq!(pair.refresh_token().expose_secret(), "stored-refresh");
}

#[tokio::test]
async fn test_logout_clears_state() {
    let (_server, client) = logged_in().await;
    client.logout();
    assert!(!client.credentials().is_authenticated());
    assert_eq!(client.user_id(), None);

    let result = client.get_subscriptions(USER_ID).await;
    assert!(matches!(result, Err(Error::CredentialsExpired)));
}

// ── Retry-on-401 tests ──────────────────────────────────────────────

#[tokio::test]
async fn test_401_refreshes_and_retries_exactly_once() {
    let (server, client) = setup().await;
    mount_password_grant(&server, "stale").await;

    Mock::given(method("GET"))
        .and(path("/api/authCheck"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_partial_json(json!({
            "grant_type": "refresh_token",
            "refresh_token": "refresh-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens("fresh", "refresh-2")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/authCheck"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "userId": USER_ID })))
        .expect(1)
        .mount(&server)
        .await;

    client.login(&password()).await.unwrap();

    assert_eq!(client.user_id(), Some(USER_ID));
    let pair = client.credentials().current().unwrap();
    assert_eq!(pair.refresh_token().expose_secret(), "refresh-2");
}

#[tokio::test]
async fn test_second_401_is_credentials_expired() {
    let (server, client) = setup().await;
    mount_password_grant(&server, "access-1").await;

    Mock::given(method("GET"))
        .and(path("/api/authCheck"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_partial_json(json!({ "grant_type": "refresh_token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens("access-2", "refresh-2")))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.login(&password()).await;

    assert!(
        matches!(result, Err(Error::CredentialsExpired)),
        "expected CredentialsExpired, got: {result:?}"
    );
}

#[tokio::test]
async fn test_rejected_refresh_clears_tokens() {
    let (server, client) = setup().await;
    mount_password_grant(&server, "access-1").await;

    Mock::given(method("GET"))
        .and(path("/api/authCheck"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_partial_json(json!({ "grant_type": "refresh_token" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.login(&password()).await;

    assert!(matches!(result, Err(Error::CredentialsExpired)));
    assert!(!client.credentials().is_authenticated());
}

#[tokio::test]
async fn test_expired_token_is_refreshed_before_request() {
    let (server, client) = setup().await;
    client.credentials().store(TokenPair::new(
        SecretString::from("old".to_owned()),
        SecretString::from("refresh-1".to_owned()),
        Utc::now() - TimeDelta::minutes(1),
    ));

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_partial_json(json!({ "grant_type": "refresh_token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens("fresh", "refresh-2")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/users/{USER_ID}/subscriptions")))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "subscriptions": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let subs = client.get_subscriptions(USER_ID).await.unwrap();
    assert!(subs.is_empty());
}

// ── Error classification tests ──────────────────────────────────────

#[tokio::test]
async fn test_no_remote_management_is_endpoint_unavailable() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/ss3/subscriptions/1/settings/normal"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "type": "NoRemoteManagement",
            "code": "000",
            "message": "Remote management is disabled"
        })))
        .mount(&server)
        .await;

    let result = client.get_v3_settings(1, true).await;
    assert!(
        matches!(&result, Err(Error::EndpointUnavailable { endpoint }) if endpoint.contains("settings/normal")),
        "expected EndpointUnavailable, got: {result:?}"
    );
}

#[tokio::test]
async fn test_server_error_is_request_error_with_status() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path(format!("/users/{USER_ID}/subscriptions")))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let err = client.get_subscriptions(USER_ID).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("upstream exploded"), "{err}");
}

// ── Endpoint tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_get_subscriptions() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path(format!("/users/{USER_ID}/subscriptions")))
        .and(query_param("activeOnly", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subscriptions": [
                { "sid": 1, "location": { "system": { "version": 3, "alarmState": "OFF" } } },
                { "sid": 2, "location": { "system": { "version": 2 } } }
            ]
        })))
        .mount(&server)
        .await;

    let subs = client.get_subscriptions(USER_ID).await.unwrap();
    assert_eq!(subs.len(), 2);
    assert_eq!(subs[0].system_version(), Some(3));
    assert_eq!(subs[1].sid, 2);
}

#[tokio::test]
async fn test_get_events_keeps_server_order() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/1/events"))
        .and(query_param("numEvents", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "numEvents": 3,
            "events": [
                { "eventId": 30, "eventCid": 1400 },
                { "eventId": 10, "eventCid": 3401 },
                { "eventId": 20, "eventCid": 1429 }
            ]
        })))
        .mount(&server)
        .await;

    let events = client.get_events(1, None, Some(3)).await.unwrap();
    let ids: Vec<_> = events.iter().filter_map(|e| e.event_id).collect();
    assert_eq!(ids, vec![30, 10, 20]);
}

#[tokio::test]
async fn test_v3_sensors_force_update_flag() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/ss3/subscriptions/1/sensors"))
        .and(query_param("forceUpdate", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sensors": [{ "serial": "ABC123", "type": 16 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sensors = client.get_v3_sensors(1, false).await.unwrap();
    assert_eq!(sensors[0]["serial"], "ABC123");
}

#[tokio::test]
async fn test_v2_state_uses_query_parameter() {
    let (server, client) = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/subscriptions/2/state"))
        .and(query_param("state", "home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "requestedState": "home"
        })))
        .mount(&server)
        .await;

    let resp = client.set_v2_state(2, "home").await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.requested_state.as_deref(), Some("home"));
}

#[tokio::test]
async fn test_set_lock_state_body() {
    let (server, client) = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/doorlock/1/ABC123/state"))
        .and(header("content-type", "application/json; charset=utf-8"))
        .and(body_partial_json(json!({ "state": "unlock" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_lock_state(1, "ABC123", LockCommand::Unlock)
        .await
        .unwrap();
}
