//! Resource dispatch through the full chain.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use stratum_config::ServiceConfig;
use stratum_core::{codes, Error};
use stratum_middleware::{BoxFuture, Exchange, Payload, Response};
use stratum_server::resource::{
    CollectionActioner, CollectionCounter, CollectionCreator, CollectionGetter, CollectionLister,
    CollectionUpdater, CreateRoute, Items, UpdateRoute,
};
use stratum_server::{App, NotImplementedResource, Reply, Resource, Service};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "user")]
struct User {
    name: String,
    #[serde(default)]
    email: String,
}

#[derive(Default)]
struct Users {
    store: Mutex<BTreeMap<String, User>>,
}

impl Users {
    fn seeded() -> Self {
        let users = Self::default();
        users.store.lock().unwrap().insert(
            "ann".to_string(),
            User {
                name: "ann".to_string(),
                email: "ann@example.com".to_string(),
            },
        );
        users
    }
}

impl Items for Users {
    type Item = User;

    fn new_item(&self) -> User {
        User::default()
    }

    fn id(&self, item: &User) -> String {
        item.name.clone()
    }
}

impl CollectionLister for Users {
    fn list<'a>(&'a self, _ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            let users: Vec<User> = self.store.lock().unwrap().values().cloned().collect();
            Reply::ok(users)
        })
    }
}

impl CollectionCounter for Users {
    fn count<'a>(&'a self, _ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
        Box::pin(async move { Reply::ok(self.store.lock().unwrap().len()) })
    }
}

impl CollectionGetter for Users {
    fn get<'a>(&'a self, _ex: &'a mut Exchange, id: String) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            match self.store.lock().unwrap().get(&id) {
                Some(user) => Reply::ok(user.clone()),
                None => Reply::new(404, Payload::Empty),
            }
        })
    }
}

impl CollectionCreator for Users {
    fn create<'a>(&'a self, _ex: &'a mut Exchange, item: &'a mut User) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            self.store
                .lock()
                .unwrap()
                .insert(item.name.clone(), item.clone());
            Reply::created(item.clone())
        })
    }
}

impl CollectionUpdater for Users {
    fn update<'a>(&'a self, _ex: &'a mut Exchange, id: String, item: User) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            self.store.lock().unwrap().insert(id, item.clone());
            Reply::ok(item)
        })
    }
}

impl CollectionActioner for Users {
    fn action<'a>(&'a self, ex: &'a mut Exchange, _id: String, action: String)
        -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            match action.as_str() {
                "explode" => panic!("exploded"),
                "half" => {
                    ex.response_mut().write_head(202);
                    let _ = ex.response_mut().write_body(b"partial");
                    panic!("after write");
                }
                _ => Reply::no_content(),
            }
        })
    }
}

impl Resource for Users {
    fn lister(&self) -> Option<&dyn CollectionLister> {
        Some(self)
    }

    fn counter(&self) -> Option<&dyn CollectionCounter> {
        Some(self)
    }

    fn getter(&self) -> Option<&dyn CollectionGetter> {
        Some(self)
    }

    fn creator(&self) -> Option<&dyn CreateRoute> {
        Some(self)
    }

    fn updater(&self) -> Option<&dyn UpdateRoute> {
        Some(self)
    }

    fn actioner(&self) -> Option<&dyn CollectionActioner> {
        Some(self)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ticket {
    #[serde(default)]
    id: String,
    title: String,
}

#[derive(Default)]
struct Tickets {
    next: AtomicU64,
}

impl Items for Tickets {
    type Item = Ticket;

    fn new_item(&self) -> Ticket {
        Ticket::default()
    }

    fn id(&self, item: &Ticket) -> String {
        item.id.clone()
    }
}

impl CollectionCreator for Tickets {
    fn create<'a>(&'a self, _ex: &'a mut Exchange, item: &'a mut Ticket) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            let id = (self.next.fetch_add(1, Ordering::Relaxed) + 1).to_string();
            let stored = Ticket {
                id: id.clone(),
                title: item.title.clone(),
            };
            Reply::created_with_id(id, stored)
        })
    }
}

impl Resource for Tickets {
    fn creator(&self) -> Option<&dyn CreateRoute> {
        Some(self)
    }
}

fn app(min: u32, max: u32) -> App {
    let mut service = Service::new(ServiceConfig::with_versions(min, max)).unwrap();
    let users = Arc::new(Users::seeded());
    for version in min..=max {
        service
            .add_resource(version, "/users", Arc::clone(&users))
            .unwrap();
    }
    service
        .add_resource(max, "/reports", Arc::new(NotImplementedResource))
        .unwrap();
    service.freeze().unwrap()
}

fn request(method: Method, uri: &str, headers: &[(&str, &str)], body: &str) -> http::Request<Bytes> {
    let mut builder = http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Bytes::from(body.to_string())).unwrap()
}

async fn send(app: &App, request: http::Request<Bytes>) -> Response {
    app.handle(request, None).await
}

async fn text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn error(response: Response) -> Error {
    serde_json::from_str(&text(response).await).unwrap()
}

#[tokio::test]
async fn test_list_defaults_to_json_and_max_version() {
    let app = app(1, 3);
    let response = send(&app, request(Method::GET, "/users", &[], "")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.headers()["x-api-version"], "3");
    let users: Vec<User> = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "ann");
}

#[tokio::test]
async fn test_create_sets_location() {
    let app = app(1, 3);
    let response = send(
        &app,
        request(
            Method::POST,
            "/users",
            &[("content-type", "application/json")],
            r#"{"name":"dave"}"#,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()["location"].to_str().unwrap().to_string();
    assert!(location.ends_with("/users/dave"), "{location}");
    assert!(text(response).await.contains(r#""name":"dave""#));

    let response = send(&app, request(Method::GET, "/users/dave", &[], "")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_rejects_mismatched_id() {
    let app = app(1, 3);
    let response = send(
        &app,
        request(
            Method::PUT,
            "/users/dave",
            &[("content-type", "application/json")],
            r#"{"name":"pat"}"#,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error(response).await.code, codes::RESOURCE_ID_MISMATCH);
}

#[tokio::test]
async fn test_update_with_escaped_id() {
    let app = app(1, 1);
    let response = send(
        &app,
        request(
            Method::PUT,
            "/users/john%20doe",
            &[("content-type", "application/json")],
            r#"{"name":"john doe"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, request(Method::GET, "/users/john%20doe", &[], "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains(r#""name":"john doe""#));
}

#[tokio::test]
async fn test_update_with_matching_id() {
    let app = app(1, 1);
    let response = send(
        &app,
        request(
            Method::PUT,
            "/users/ann",
            &[("content-type", "application/json")],
            r#"{"name":"ann","email":"new@example.com"}"#,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("new@example.com"));
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let app = app(1, 1);
    let response = send(
        &app,
        request(
            Method::POST,
            "/users",
            &[("content-type", "application/json")],
            "{not json",
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error(response).await.code, codes::DESERIALIZATION_FAILED);
}

#[tokio::test]
async fn test_unsupported_body_type_is_400() {
    let app = app(1, 1);
    let response = send(
        &app,
        request(Method::POST, "/users", &[("content-type", "text/csv")], "name\ndave"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error(response).await.code, codes::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_form_body_creates() {
    let app = app(1, 1);
    let response = send(
        &app,
        request(
            Method::POST,
            "/users",
            &[("content-type", "application/x-www-form-urlencoded")],
            "name=erin&email=erin%40example.com",
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(text(response).await.contains("erin@example.com"));
}

#[tokio::test]
async fn test_count_route() {
    let app = app(1, 1);
    let response = send(&app, request(Method::GET, "/users/all/count", &[], "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "1");
}

#[tokio::test]
async fn test_get_as_xml() {
    let app = app(1, 1);
    let response = send(
        &app,
        request(Method::GET, "/users/ann", &[("accept", "application/xml")], ""),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/xml");
    let body = text(response).await;
    assert!(body.contains("<name>ann</name>"), "{body}");
}

#[tokio::test]
async fn test_version_zero_is_invalid() {
    let app = app(1, 3);
    let response = send(&app, request(Method::GET, "/users", &[("x-api-version", "0")], "")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error(response).await.code, codes::API_VERSION_INVALID);
}

#[tokio::test]
async fn test_version_range() {
    let app = app(2, 42);

    let response = send(&app, request(Method::GET, "/users", &[("x-api-version", "1")], "")).await;
    assert_eq!(response.status(), StatusCode::GONE);
    let err = error(response).await;
    assert_eq!(err.code, codes::API_VERSION_TOO_OLD);
    assert!(err.message.ends_with(" 2"), "{}", err.message);

    let response = send(&app, request(Method::GET, "/users", &[("x-api-version", "43")], "")).await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    let err = error(response).await;
    assert_eq!(err.code, codes::API_VERSION_TOO_NEW);
    assert!(err.message.ends_with(" 42"), "{}", err.message);

    let response = send(&app, request(Method::GET, "/users", &[], "")).await;
    assert_eq!(response.headers()["x-api-version"], "42");
}

#[tokio::test]
async fn test_routes_only_in_their_version() {
    let app = app(1, 2);
    // /reports is only registered for version 2
    let response = send(&app, request(Method::GET, "/reports", &[("x-api-version", "1")], "")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, request(Method::GET, "/reports", &[("x-api-version", "2")], "")).await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_not_found_and_method_not_allowed() {
    let app = app(1, 1);

    let response = send(&app, request(Method::GET, "/nobody", &[], "")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, request(Method::DELETE, "/users", &[], "")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"], "GET, POST");
}

#[tokio::test]
async fn test_panic_is_single_500() {
    let app = app(1, 1);
    let response = send(&app, request(Method::POST, "/users/ann/explode", &[], "")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let err = error(response).await;
    assert_eq!(err.code, codes::INTERNAL);
    assert!(err.stack.is_empty());
}

#[tokio::test]
async fn test_panic_after_write_keeps_response() {
    let app = app(1, 1);
    let response = send(&app, request(Method::POST, "/users/ann/half", &[], "")).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(text(response).await, "partial");
}

#[tokio::test]
async fn test_inhibited_create_is_204() {
    let app = app(1, 1);
    let response = send(
        &app,
        request(
            Method::POST,
            "/users",
            &[
                ("content-type", "application/json"),
                ("x-inhibit-response", "1"),
            ],
            r#"{"name":"fay"}"#,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(text(response).await.is_empty());
}

#[tokio::test]
async fn test_location_uses_id_of_created_value() {
    let mut service = Service::new(ServiceConfig::default()).unwrap();
    service
        .add_resource(1, "/tickets", Arc::new(Tickets::default()))
        .unwrap();
    let app = service.freeze().unwrap();

    let response = send(
        &app,
        request(
            Method::POST,
            "/tickets/",
            &[("content-type", "application/json")],
            r#"{"title":"printer on fire"}"#,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["location"], "/tickets/1");
    assert!(text(response).await.contains(r#""id":"1""#));
}
