//! Integration tests for `HyperClient` using wiremock.

use std::sync::Arc;
use std::time::Duration;

use relay::{
    ErrorCategory, ErrorKind, HttpClient, HttpTrace, HyperClient, Method, Request, TracePhase,
};
use serde::{Deserialize, Serialize};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

fn request(method: Method, url: &str) -> Request {
    Request::builder(method, url.parse().expect("uri")).build()
}

#[tokio::test]
async fn test_get_request() {
    let mock_server = MockServer::start().await;

    let user = User {
        id: 1,
        name: "Alice".to_string(),
    };

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&user))
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let request = Request::builder(
        Method::Get,
        format!("{}/users/1", mock_server.uri()).parse().expect("uri"),
    )
    .header("Accept", "application/json")
    .build();

    let response = client.execute(request).await.expect("response");

    assert!(response.is_success());
    assert_eq!(response.status(), 200);

    let body: User = response.json().expect("json");
    assert_eq!(body, user);
}

#[tokio::test]
async fn test_post_request_with_body() {
    let mock_server = MockServer::start().await;

    let input = User {
        id: 0,
        name: "Bob".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(&input))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let request = Request::builder(
        Method::Post,
        format!("{}/users", mock_server.uri()).parse().expect("uri"),
    )
    .header("Content-Type", "application/json")
    .body(serde_json::to_vec(&input).expect("json").into())
    .build();

    let response = client.execute(request).await.expect("response");

    assert_eq!(response.status(), 201);
    assert_eq!(response.text().expect("text"), "created");
}

#[tokio::test]
async fn test_http_error_status_is_a_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let response = client
        .execute(request(Method::Get, &format!("{}/missing", mock_server.uri())))
        .await
        .expect("transport succeeded");

    assert!(response.is_client_error());
    assert_eq!(response.text().expect("text"), "not here");
}

#[tokio::test]
async fn test_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let url = format!("{}/search?q=rust&limit=10", mock_server.uri());
    let response = client.execute(request(Method::Get, &url)).await.expect("response");

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_response_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/resource"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Request-Id", "abc-123"))
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let url = format!("{}/resource", mock_server.uri());
    let response = client.execute(request(Method::Head, &url)).await.expect("response");

    assert_eq!(response.header("x-request-id"), Some("abc-123"));
    assert!(response.data().is_empty());
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = HyperClient::builder()
        .connect_timeout(Duration::from_secs(2))
        .build();
    let err = client
        .execute(request(Method::Get, &format!("http://{addr}/")))
        .await
        .expect_err("nothing listens");

    assert_eq!(err.category(), ErrorCategory::Refused);
    assert_eq!(err.code(), 0);
}

#[tokio::test]
async fn test_unresolvable_host() {
    let client = HyperClient::new();
    let err = client
        .execute(request(Method::Get, "http://relay-test.invalid/"))
        .await
        .expect_err("reserved TLD never resolves");

    assert_eq!(err.category(), ErrorCategory::Dns);
    assert!(matches!(err.kind(), Some(ErrorKind::Resolve(_))));
}

#[tokio::test]
async fn test_trace_marks_exchange() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("traced"))
        .mount(&mock_server)
        .await;

    let trace = Arc::new(HttpTrace::new());
    trace.mark(TracePhase::Start);
    let request = Request::builder(Method::Get, mock_server.uri().parse().expect("uri"))
        .extension(Arc::clone(&trace))
        .build();

    let client = HyperClient::builder().with_debug_logging().build();
    let response = client.execute(request).await.expect("response");
    trace.finish();

    assert_eq!(response.text().expect("text"), "traced");
    assert_eq!(trace.addr(), Some(mock_server.address().to_string()));
    assert!(!trace.reused());

    let timeline = trace.timeline();
    assert_eq!(timeline.request_send, Duration::ZERO);
    assert_eq!(timeline.server_processing, Duration::ZERO);
    assert!(timeline.total >= timeline.content_transfer);
}
