//! Remnawave client tests: response envelope, camelCase byte fields,
//! epoch-ms and ISO expiry parsing, and the microsecond write format.

use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleet_core::expiry::{SECS_PER_DAY, now_unix};
use fleet_core::{PanelConfig, PanelKind};
use fleet_panels::{PanelClient, PanelError, RemnawaveClient, UserChange, UserId};

fn config(base: &str) -> PanelConfig {
    PanelConfig {
        name: "nl-1".to_string(),
        kind: PanelKind::Remnawave,
        base_url: base.to_string(),
        secret1: "bearer-token".to_string(),
        secret2: None,
        proxy_path: None,
        category: None,
        active: true,
    }
}

fn user_body(uuid: Uuid, expire_at: Value) -> Value {
    json!({
        "uuid": uuid.to_string(),
        "username": "alice",
        "status": "ACTIVE",
        "trafficLimitBytes": 2 * (1_i64 << 30),
        "userTraffic": {"usedTrafficBytes": 1_i64 << 29},
        "expireAt": expire_at,
    })
}

#[tokio::test]
async fn list_unwraps_envelope_and_normalizes() {
    let server = MockServer::start().await;
    let u = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(header("authorization", "Bearer bearer-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"users": [user_body(u, json!(1_800_000_000_000_i64))]}
        })))
        .mount(&server)
        .await;

    let client = RemnawaveClient::new(&config(&server.uri())).unwrap();
    let users = client.get_all_users().await.unwrap();
    assert_eq!(users.len(), 1);

    let user = &users[0];
    assert_eq!(user.uuid, Some(u));
    assert_eq!(user.username.as_deref(), Some("alice"));
    assert!((user.limit_gb - 2.0).abs() < 1e-9);
    assert!((user.usage_gb - 0.5).abs() < 1e-9);
    // Epoch milliseconds divided down to seconds.
    assert_eq!(user.expire, Some(1_800_000_000));
    assert!(user.active);
}

#[tokio::test]
async fn iso_expiry_and_fallback_usage_field() {
    let server = MockServer::start().await;
    let u = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(format!("/api/users/{u}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "uuid": u.to_string(),
                "username": "bob",
                "status": "DISABLED",
                "trafficLimitBytes": 0,
                "trafficUsed": 3 * (1_i64 << 30),
                "expireAt": "1970-01-02T00:00:00.000Z",
            }
        })))
        .mount(&server)
        .await;

    let client = RemnawaveClient::new(&config(&server.uri())).unwrap();
    let user = client.get_user(&UserId::Uuid(u)).await.unwrap().unwrap();
    assert_eq!(user.expire, Some(SECS_PER_DAY));
    assert!((user.usage_gb - 3.0).abs() < 1e-9);
    assert!(!user.active);
}

#[tokio::test]
async fn modify_formats_expire_with_microseconds() {
    let server = MockServer::start().await;
    let u = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = RemnawaveClient::new(&config(&server.uri())).unwrap();
    client
        .modify_user(
            &UserId::Uuid(u),
            &UserChange {
                set_expire: Some(1_700_000_000),
                ..UserChange::default()
            },
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["uuid"], u.to_string());
    assert_eq!(body["expireAt"], "2023-11-14T22:13:20.000000Z");
}

#[tokio::test]
async fn add_gb_reads_current_bytes_first() {
    let server = MockServer::start().await;
    let u = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(format!("/api/users/{u}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"response": user_body(u, Value::Null)})),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = RemnawaveClient::new(&config(&server.uri())).unwrap();
    client
        .modify_user(
            &UserId::Uuid(u),
            &UserChange {
                add_gb: 3.0,
                ..UserChange::default()
            },
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .find(|r| r.method.to_string() == "PATCH")
        .unwrap();
    let body: Value = serde_json::from_slice(&patch.body).unwrap();
    assert_eq!(body["trafficLimitBytes"].as_i64().unwrap(), 5 * (1_i64 << 30));
    assert!(body.get("expireAt").is_none());
}

#[tokio::test]
async fn create_sends_no_reset_strategy_and_iso_expiry() {
    let server = MockServer::start().await;
    let u = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/api/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"response": user_body(u, Value::Null)})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = RemnawaveClient::new(&config(&server.uri())).unwrap();
    client
        .add_user(&fleet_panels::NewUser {
            name: "alice".to_string(),
            limit_gb: 2.0,
            days: 30,
            uuid: Some(u),
            squad: Some("eu".to_string()),
            ..fleet_panels::NewUser::default()
        })
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["trafficLimitStrategy"], "NO_RESET");
    assert_eq!(body["activeInternalSquads"], json!(["eu"]));

    // Microseconds plus trailing Z, ~30 days out.
    let expire_at = body["expireAt"].as_str().unwrap();
    assert!(expire_at.ends_with('Z'));
    assert_eq!(expire_at.len(), "2025-01-01T00:00:00.000000Z".len());
    let parsed = fleet_core::expiry::parse_iso(expire_at).unwrap();
    assert!((parsed - (now_unix() + 30 * SECS_PER_DAY)).abs() <= 5);
}

#[tokio::test]
async fn reset_usage_zeroes_traffic_used() {
    let server = MockServer::start().await;
    let u = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = RemnawaveClient::new(&config(&server.uri())).unwrap();
    client.reset_usage(&UserId::Uuid(u)).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["trafficUsed"].as_i64().unwrap(), 0);
}

#[tokio::test]
async fn remote_errors_carry_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let client = RemnawaveClient::new(&config(&server.uri())).unwrap();
    match client.get_all_users().await.unwrap_err() {
        PanelError::Remote { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn static_401_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = RemnawaveClient::new(&config(&server.uri())).unwrap();
    assert!(matches!(
        client.get_all_users().await.unwrap_err(),
        PanelError::Auth
    ));
}
