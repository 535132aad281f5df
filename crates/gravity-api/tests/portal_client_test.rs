// Integration tests for `PortalClient` using wiremock.
#![allow(clippy::unwrap_used)]

use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gravity_api::{Credentials, Error, PortalClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, PortalClient) {
    let server = MockServer::start().await;
    let client =
        PortalClient::from_reqwest(&server.uri(), reqwest::Client::new(), Credentials::None)
            .unwrap();
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_get_decodes_json() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/portal/v1/accounts/a1/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "domain": "example.com", "account_id": "a1" }
        ])))
        .mount(&server)
        .await;

    let sites: Vec<Value> = client.get("accounts/a1/sites").await.unwrap();
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0]["domain"], "example.com");
}

#[tokio::test]
async fn test_basic_auth_header_sent() {
    let server = MockServer::start().await;
    let client = PortalClient::from_reqwest(
        &server.uri(),
        reqwest::Client::new(),
        Credentials::Basic {
            username: "admin".into(),
            password: SecretString::from("secret".to_string()),
        },
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/portal/v1/accounts"))
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let accounts: Vec<Value> = client.get("accounts").await.unwrap();
    assert!(accounts.is_empty());
}

#[tokio::test]
async fn test_bearer_auth_header_sent() {
    let server = MockServer::start().await;
    let client = PortalClient::from_reqwest(
        &server.uri(),
        reqwest::Client::new(),
        Credentials::Bearer {
            token: SecretString::from("install-token".to_string()),
        },
    )
    .unwrap();

    Mock::given(method("DELETE"))
        .and(path("/portal/v1/accounts/a1/sites/example.com"))
        .and(header("authorization", "Bearer install-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .delete("accounts/a1/sites/example.com")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_with_query_keeps_presence_flags() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/portal/v1/accounts/a1/sites/example.com/operations"))
        .and(query_param("type", "operation_install"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let ops: Vec<Value> = client
        .get_with_query(
            "accounts/a1/sites/example.com/operations",
            "last&type=operation_install",
        )
        .await
        .unwrap();
    assert!(ops.is_empty());
}

#[tokio::test]
async fn test_post_sends_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/portal/v1/accounts"))
        .and(body_json(json!({ "org": "example.com" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "a1", "org": "example.com" })),
        )
        .mount(&server)
        .await;

    let account: Value = client
        .post("accounts", &json!({ "org": "example.com" }))
        .await
        .unwrap();
    assert_eq!(account["id"], "a1");
}

#[tokio::test]
async fn test_get_file_returns_bytes() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/portal/v1/accounts/a1/sites/example.com/report"))
        .and(query_param("since", "1h"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tarball".to_vec()))
        .mount(&server)
        .await;

    let bytes = client
        .get_file(
            "accounts/a1/sites/example.com/report",
            &[("since", "1h".to_owned())],
        )
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"tarball");
}

// ── Error-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_error_envelope_parsed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/portal/v1/accounts/a1/sites/missing.com"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "cluster missing.com not found",
            "kind": "not_found"
        })))
        .mount(&server)
        .await;

    let err = client
        .get::<Value>("accounts/a1/sites/missing.com")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    match err {
        Error::Api {
            status,
            message,
            kind,
        } => {
            assert_eq!(status, 404);
            assert_eq!(message, "cluster missing.com not found");
            assert_eq!(kind.as_deref(), Some("not_found"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/portal/v1/accounts"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.get::<Value>("accounts").await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }));
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_plain_text_error_body() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/portal/v1/accounts/a1/sites/example.com/smtp"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let err = client
        .put_no_response("accounts/a1/sites/example.com/smtp", &json!({}))
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(err.to_string().contains("backend unavailable"));
}

#[tokio::test]
async fn test_bad_json_keeps_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/portal/v1/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client.get::<Vec<Value>>("accounts").await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "not json"),
        other => panic!("expected Deserialization error, got {other:?}"),
    }
}
