//! Driving services and handlers in memory.

use http::Method;
use stratum_config::ServiceConfig;
use stratum_core::codes;
use stratum_middleware::{write_response, Payload};
use stratum_server::{handler, Service};
use stratum_test::{dispatch, TestClient, TestRequest};

fn client() -> TestClient {
    let mut service = Service::new(ServiceConfig::with_versions(1, 2)).unwrap();
    service.global_router().route(
        Method::GET,
        "/ping",
        handler(|ex| Box::pin(async move { write_response(ex, 200, "pong".into()) })),
    );
    service.global_router().route(
        Method::GET,
        "/whoami",
        handler(|ex| {
            Box::pin(async move {
                let session = ex.session_id().unwrap_or("none").to_string();
                write_response(ex, 200, session.into());
            })
        }),
    );
    service.router(2).unwrap().route(
        Method::POST,
        "/echo",
        handler(|ex| {
            Box::pin(async move {
                let body: serde_json::Value = match stratum_middleware::read_request(ex, serde_json::Value::Null).await {
                    Ok(body) => body,
                    Err(err) => return write_response(ex, 400, err.into()),
                };
                write_response(ex, 200, Payload::value(body));
            })
        }),
    );
    TestClient::new(service).unwrap()
}

#[tokio::test]
async fn test_get_through_chain() {
    let response = client().get("/ping").accept("text/plain").send().await;
    response
        .assert_status(200)
        .assert_header("x-api-version", "2")
        .assert_body_eq("pong");
    assert!(response.header_str("x-request-id").is_some());
}

#[tokio::test]
async fn test_version_too_new() {
    client()
        .get("/ping")
        .api_version(3)
        .send()
        .await
        .assert_status(501)
        .assert_error_code(codes::API_VERSION_TOO_NEW);
}

#[tokio::test]
async fn test_unknown_route() {
    client().get("/nowhere").send().await.assert_status(404);
}

#[tokio::test]
async fn test_method_not_allowed() {
    client()
        .delete("/ping")
        .send()
        .await
        .assert_status(405)
        .assert_header("allow", "GET");
}

#[tokio::test]
async fn test_default_headers() {
    let client = client().with_default_header("x-session-id", "s-42");
    client
        .get("/whoami")
        .accept("text/plain")
        .send()
        .await
        .assert_body_eq("s-42");
}

#[tokio::test]
async fn test_json_echo() {
    let response = client()
        .post("/echo")
        .json(&serde_json::json!({"name": "ann"}))
        .send()
        .await;
    response.assert_status(200).assert_content_type("application/json");
    assert_eq!(response.json_value().unwrap()["name"], "ann");
}

#[tokio::test]
async fn test_echo_only_in_version_two() {
    client()
        .post("/echo")
        .api_version(1)
        .json(&serde_json::json!({}))
        .send()
        .await
        .assert_status(404);
}

#[tokio::test]
async fn test_inhibit_response() {
    client()
        .post("/echo")
        .inhibit_response()
        .json(&serde_json::json!({"name": "ann"}))
        .send()
        .await
        .assert_status(204)
        .assert_body_eq("");
}

#[tokio::test]
async fn test_dispatch_single_handler() {
    let route = handler(|ex| {
        Box::pin(async move {
            let id = ex.param("id").unwrap_or_default().to_string();
            let version = ex.state().api_version();
            write_response(ex, 200, Payload::value(format!("{id}@{version}")));
        })
    });

    let request = TestRequest::get("/users/ann").build().unwrap();
    let response = dispatch(&route, request, &[("id", "ann")]).await.unwrap();
    response
        .assert_status(200)
        .assert_content_type("application/json")
        .assert_body_eq(r#""ann@1""#);
}

#[tokio::test]
async fn test_dispatch_negotiates_xml() {
    let route = handler(|ex| {
        Box::pin(async move {
            let err = ex.error(codes::LOCKED, &[]);
            write_response(ex, 423, err.into());
        })
    });

    let request = TestRequest::get("/").accept("application/xml").build().unwrap();
    let response = dispatch(&route, request, &[]).await.unwrap();
    response
        .assert_status(423)
        .assert_content_type("application/xml")
        .assert_body_contains("<code>LOCKED</code>");
}
