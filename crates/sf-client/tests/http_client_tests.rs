//! HTTP Client Tests
//!
//! Tests for:
//! - Query parameters and bearer authentication
//! - Server error message extraction
//! - Network failures
//! - Empty bodies on DELETE

use serde_json::json;
use sf_client::{ApiConfig, ClientError, HttpClient, ListResponse, ReqwestHttpClient};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, token: Option<&str>) -> ReqwestHttpClient {
    ReqwestHttpClient::new(ApiConfig {
        base_url: server.uri(),
        token: token.map(str::to_string),
        connect_timeout_secs: 2,
        request_timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn test_get_sends_query_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "25"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 1}],
            "pagination": {"page": 2, "limit": 25, "total": 26, "totalPages": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("secret-token"));
    let body = client
        .get("/admin/users", &[("page".into(), "2".into()), ("limit".into(), "25".into())])
        .await
        .unwrap();

    let decoded: ListResponse<serde_json::Value> = ListResponse::decode(body).unwrap();
    assert!(matches!(decoded, ListResponse::Enveloped { pagination: Some(_), .. }));
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/listings"))
        .and(body_json(json!({"title": "Rare account"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": 9, "title": "Rare account"}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let body = client.post("/admin/listings", &json!({"title": "Rare account"})).await.unwrap();
    assert_eq!(body["data"]["id"], json!(9));
}

#[tokio::test]
async fn test_server_error_surfaces_message() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/admin/users/3"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": "Email already taken"})))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let err = client.patch("/admin/users/3", &json!({"email": "a@b.co"})).await.unwrap_err();
    assert_eq!(err, ClientError::Server { status: 422, message: "Email already taken".to_string() });
}

#[tokio::test]
async fn test_server_error_without_body_uses_reason() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let err = client.get("/admin/orders", &[]).await.unwrap_err();
    assert_eq!(err, ClientError::Server { status: 503, message: "Service Unavailable".to_string() });
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/admin/listings/abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    client.delete("/admin/listings/abc").await.unwrap();
}

#[tokio::test]
async fn test_invalid_json_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let err = client.get("/admin/users", &[]).await.unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let client = ReqwestHttpClient::new(ApiConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        connect_timeout_secs: 1,
        request_timeout_secs: 2,
        ..Default::default()
    })
    .unwrap();

    let err = client.get("/admin/users", &[]).await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
}
