//! Versioned resource dispatch.
//!
//! The [`Dispatcher`] is the last handler of the chain. It holds the global
//! route table and one table per supported API version, looks the request
//! up in the global table first and then in the table of the version the
//! resolver stored in the request state.

use std::sync::Arc;

use http::header::ALLOW;
use http::{HeaderValue, Method};
use stratum_core::headers;
use stratum_middleware::{write_response, BoxFuture, Exchange, Middleware, Next, Payload};
use stratum_router::{MethodRouter, Resolution, RouteMatch, Router};

use crate::resource::{Reply, Resource};

/// A resolved route handler.
pub type RouteHandler = Arc<dyn for<'a> Fn(&'a mut Exchange) -> BoxFuture<'a, ()> + Send + Sync>;

/// A route table.
pub type Routes = Router<RouteHandler>;

/// Wraps a closure as a [`RouteHandler`].
///
/// ```
/// use stratum_middleware::write_response;
/// use stratum_server::dispatcher::handler;
///
/// let health = handler(|ex| Box::pin(async move { write_response(ex, 200, "ok".into()) }));
/// # let _ = health;
/// ```
pub fn handler<F>(f: F) -> RouteHandler
where
    F: for<'a> Fn(&'a mut Exchange) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Final chain handler dispatching to the route tables.
pub struct Dispatcher {
    global: Routes,
    versions: Vec<Routes>,
    min: u32,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("global", &self.global)
            .field("versions", &self.versions.len())
            .field("min", &self.min)
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher; `versions[i]` serves API version `min + i`.
    #[must_use]
    pub fn new(global: Routes, versions: Vec<Routes>, min: u32) -> Self {
        Self {
            global,
            versions,
            min,
        }
    }

    /// Route table of an API version, if supported.
    #[must_use]
    pub fn versioned(&self, version: u32) -> Option<&Routes> {
        let index = version.checked_sub(self.min)?;
        self.versions.get(usize::try_from(index).ok()?)
    }

    /// Dispatches the request in `ex`.
    pub async fn dispatch(&self, ex: &mut Exchange) {
        ex.state_mut().set_progress("dispatch.begin");
        let method = ex.request().method().clone();
        let path = ex.request().uri().path().to_string();

        let mut allowed: Vec<Method> = Vec::new();
        let tables = std::iter::once(&self.global).chain(self.versioned(ex.state().api_version()));
        for table in tables {
            match table.resolve(&method, &path) {
                Resolution::Found(RouteMatch { handler, params }) => {
                    ex.set_params(params);
                    handler(ex).await;
                    return;
                }
                Resolution::MethodNotAllowed(methods) => {
                    for m in methods {
                        if !allowed.contains(&m) {
                            allowed.push(m);
                        }
                    }
                }
                Resolution::NotFound => {}
            }
        }

        if allowed.is_empty() {
            ex.state_mut().set_progress("dispatch.not_found");
            ex.response_mut().write_head(404);
            return;
        }
        let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        if let Ok(value) = HeaderValue::from_str(&allow) {
            ex.response_mut().headers_mut().insert(ALLOW, value);
        }
        ex.state_mut().set_progress("dispatch.not_allowed");
        ex.response_mut().write_head(405);
    }
}

impl Middleware for Dispatcher {
    fn name(&self) -> &'static str {
        "dispatcher"
    }

    fn handle<'a>(&'a self, ex: &'a mut Exchange, _next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(self.dispatch(ex))
    }
}

type Operation<R> = for<'a> fn(&'a R, &'a mut Exchange) -> BoxFuture<'a, Reply>;

/// Wires the routes of every capability `resource` exposes under `base`.
///
/// # Panics
///
/// Panics if a route is already registered, e.g. when the same base is
/// mounted twice or a resource exposes both collection and singleton
/// capabilities.
pub fn mount<R: Resource>(routes: &mut Routes, base: &str, resource: Arc<R>) {
    let base = base.trim_end_matches('/');
    let at_base = if base.is_empty() { "/" } else { base };
    let r = resource.as_ref();

    let mut root = MethodRouter::new();
    if r.lister().is_some() {
        root = root.get(bind(&resource, list::<R>));
    }
    if r.singleton_getter().is_some() {
        root = root.get(bind(&resource, singleton_get::<R>));
    }
    if r.creator().is_some() {
        root = root.post(bind(&resource, create::<R>));
    }
    if r.singleton_updater().is_some() {
        root = root.put(bind(&resource, singleton_update::<R>));
    }
    if r.deleter().is_some() {
        root = root.delete(bind(&resource, delete::<R>));
    }
    if root.has_any_method() {
        routes.insert(at_base, root);
    }

    if r.counter().is_some() {
        routes.route(Method::GET, &format!("{base}/all/count"), bind(&resource, count::<R>));
    }

    let mut item = MethodRouter::new();
    if r.getter().is_some() {
        item = item.get(bind(&resource, get::<R>));
    }
    if r.updater().is_some() {
        item = item.put(bind(&resource, update::<R>));
    }
    if r.deleter().is_some() {
        item = item.delete(bind(&resource, delete::<R>));
    }
    if item.has_any_method() {
        routes.insert(&format!("{base}/{{id}}"), item);
    }

    if r.actioner().is_some() {
        routes.route(
            Method::POST,
            &format!("{base}/{{id}}/{{action}}"),
            bind(&resource, action::<R>),
        );
    }
    if r.singleton_actioner().is_some() {
        routes.route(
            Method::POST,
            &format!("{base}/{{action}}"),
            bind(&resource, singleton_action::<R>),
        );
    }
}

fn bind<R: Resource>(resource: &Arc<R>, op: Operation<R>) -> RouteHandler {
    let resource = Arc::clone(resource);
    handler(move |ex| {
        let resource = Arc::clone(&resource);
        Box::pin(async move {
            let reply = op(resource.as_ref(), ex).await;
            finish(ex, reply);
        })
    })
}

/// Writes a reply unless the operation already did.
fn finish(ex: &mut Exchange, reply: Reply) {
    if reply.status == 0 {
        return;
    }
    write_response(ex, reply.status, reply.body);
}

/// The capability disappeared after registration.
fn vanished() -> Reply {
    Reply::new(501, Payload::Empty)
}

fn param(ex: &Exchange, name: &str) -> String {
    ex.param(name).unwrap_or_default().to_string()
}

fn list<'a, R: Resource>(r: &'a R, ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
    Box::pin(async move {
        match r.lister() {
            Some(lister) => lister.list(ex).await,
            None => vanished(),
        }
    })
}

fn count<'a, R: Resource>(r: &'a R, ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
    Box::pin(async move {
        match r.counter() {
            Some(counter) => counter.count(ex).await,
            None => vanished(),
        }
    })
}

fn get<'a, R: Resource>(r: &'a R, ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
    Box::pin(async move {
        let id = param(ex, "id");
        match r.getter() {
            Some(getter) => getter.get(ex, id).await,
            None => vanished(),
        }
    })
}

fn create<'a, R: Resource>(r: &'a R, ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
    Box::pin(async move {
        let Some(creator) = r.creator() else {
            return vanished();
        };
        ex.state_mut().set_progress("create.begin");
        let (reply, id) = creator.create_from_body(ex).await;
        if reply.status == 201 {
            ex.state_mut().set_progress("create.write");
            set_location(ex, &id);
        }
        reply
    })
}

fn set_location(ex: &mut Exchange, id: &str) {
    let location = join_path(ex.request().uri().path(), id);
    match HeaderValue::from_str(&location) {
        Ok(value) => {
            ex.response_mut().headers_mut().insert(headers::LOCATION, value);
        }
        Err(_) => tracing::warn!(location = %location, "item id is not a valid header value"),
    }
}

/// Joins `id` to `path` with exactly one separating slash.
fn join_path(path: &str, id: &str) -> String {
    let path = path.trim_end_matches('/');
    let id = id.trim_matches('/');
    if id.is_empty() {
        return if path.is_empty() { "/".to_string() } else { path.to_string() };
    }
    format!("{path}/{id}")
}

fn update<'a, R: Resource>(r: &'a R, ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
    Box::pin(async move {
        let id = param(ex, "id");
        match r.updater() {
            Some(updater) => updater.update_from_body(ex, id).await,
            None => vanished(),
        }
    })
}

fn delete<'a, R: Resource>(r: &'a R, ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
    Box::pin(async move {
        let id = param(ex, "id");
        match r.deleter() {
            Some(deleter) => deleter.delete(ex, id).await,
            None => vanished(),
        }
    })
}

fn action<'a, R: Resource>(r: &'a R, ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
    Box::pin(async move {
        let id = param(ex, "id");
        let name = param(ex, "action");
        match r.actioner() {
            Some(actioner) => actioner.action(ex, id, name).await,
            None => vanished(),
        }
    })
}

fn singleton_get<'a, R: Resource>(r: &'a R, ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
    Box::pin(async move {
        match r.singleton_getter() {
            Some(getter) => getter.get(ex).await,
            None => vanished(),
        }
    })
}

fn singleton_update<'a, R: Resource>(r: &'a R, ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
    Box::pin(async move {
        match r.singleton_updater() {
            Some(updater) => updater.update_from_body(ex).await,
            None => vanished(),
        }
    })
}

fn singleton_action<'a, R: Resource>(r: &'a R, ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
    Box::pin(async move {
        let name = param(ex, "action");
        match r.singleton_actioner() {
            Some(actioner) => actioner.action(ex, name).await,
            None => vanished(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{CollectionDeleter, CollectionGetter, SingletonActioner};
    use bytes::Bytes;
    use stratum_config::ServiceConfig;
    use stratum_middleware::{BufferedSink, Response, ServiceHandle};

    struct Gadgets;

    impl CollectionGetter for Gadgets {
        fn get<'a>(&'a self, _ex: &'a mut Exchange, id: String) -> BoxFuture<'a, Reply> {
            Box::pin(async move { Reply::ok(format!("gadget {id}")) })
        }
    }

    impl CollectionDeleter for Gadgets {
        fn delete<'a>(&'a self, _ex: &'a mut Exchange, id: String) -> BoxFuture<'a, Reply> {
            Box::pin(async move {
                if id.is_empty() {
                    Reply::new(200, "all")
                } else {
                    Reply::no_content()
                }
            })
        }
    }

    impl Resource for Gadgets {
        fn getter(&self) -> Option<&dyn CollectionGetter> {
            Some(self)
        }

        fn deleter(&self) -> Option<&dyn CollectionDeleter> {
            Some(self)
        }
    }

    struct Switch;

    impl SingletonActioner for Switch {
        fn action<'a>(&'a self, ex: &'a mut Exchange, action: String) -> BoxFuture<'a, Reply> {
            Box::pin(async move {
                ex.response_mut().write_head(202);
                let _ = ex.response_mut().write_body(action.as_bytes());
                Reply::written()
            })
        }
    }

    impl Resource for Switch {
        fn singleton_actioner(&self) -> Option<&dyn SingletonActioner> {
            Some(self)
        }
    }

    fn dispatcher() -> Dispatcher {
        let mut global = Routes::new();
        global.route(
            Method::GET,
            "/health",
            handler(|ex| Box::pin(async move { write_response(ex, 200, "up".into()) })),
        );

        let mut v1 = Routes::new();
        mount(&mut v1, "/gadgets", Arc::new(Gadgets));
        let mut v2 = Routes::new();
        mount(&mut v2, "/switch/", Arc::new(Switch));

        Dispatcher::new(global, vec![v1, v2], 1)
    }

    async fn run(dispatcher: &Dispatcher, method: Method, path: &str, version: u32) -> Response {
        let request = http::Request::builder()
            .method(method)
            .uri(path)
            .body(Bytes::new())
            .unwrap();
        let mut ex = Exchange::standalone(
            ServiceHandle::from_config(ServiceConfig::default()),
            request,
            Box::new(BufferedSink::new()),
        );
        ex.state_mut().set_api_version(version);
        dispatcher.dispatch(&mut ex).await;
        ex.into_sink().into_response()
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/users", "dave"), "/users/dave");
        assert_eq!(join_path("/users/", "/dave"), "/users/dave");
        assert_eq!(join_path("/users", ""), "/users");
        assert_eq!(join_path("/", ""), "/");
    }

    #[test]
    fn test_versioned_lookup() {
        let d = dispatcher();
        assert!(d.versioned(0).is_none());
        assert!(d.versioned(1).is_some());
        assert!(d.versioned(2).is_some());
        assert!(d.versioned(3).is_none());
    }

    #[tokio::test]
    async fn test_global_routes_ignore_version() {
        let d = dispatcher();
        let response = run(&d, Method::GET, "/health", 0).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_routes_are_per_version() {
        let d = dispatcher();
        assert_eq!(run(&d, Method::GET, "/gadgets/7", 1).await.status(), 200);
        assert_eq!(run(&d, Method::GET, "/gadgets/7", 2).await.status(), 404);
    }

    #[tokio::test]
    async fn test_delete_base_and_item() {
        let d = dispatcher();
        assert_eq!(run(&d, Method::DELETE, "/gadgets", 1).await.status(), 200);
        assert_eq!(run(&d, Method::DELETE, "/gadgets/7", 1).await.status(), 204);
    }

    #[tokio::test]
    async fn test_method_not_allowed_sets_allow() {
        let d = dispatcher();
        let response = run(&d, Method::PUT, "/gadgets/7", 1).await;
        assert_eq!(response.status(), 405);
        assert_eq!(response.headers()[ALLOW], "GET, DELETE");
    }

    #[tokio::test]
    async fn test_not_found() {
        let d = dispatcher();
        assert_eq!(run(&d, Method::GET, "/nothing", 1).await.status(), 404);
    }

    #[tokio::test]
    async fn test_unmatched_request_leaves_progress() {
        let d = dispatcher();
        let request = http::Request::builder()
            .method(Method::GET)
            .uri("/nothing")
            .body(Bytes::new())
            .unwrap();
        let mut ex = Exchange::standalone(
            ServiceHandle::from_config(ServiceConfig::default()),
            request,
            Box::new(BufferedSink::new()),
        );
        ex.state_mut().set_api_version(1);
        d.dispatch(&mut ex).await;
        assert_eq!(ex.state().progress(), "dispatch.not_found");
    }

    #[tokio::test]
    async fn test_written_reply_is_left_alone() {
        let d = dispatcher();
        let response = run(&d, Method::POST, "/switch/toggle", 2).await;
        assert_eq!(response.status(), 202);
    }

    #[test]
    #[should_panic]
    fn test_mount_twice_panics() {
        let mut routes = Routes::new();
        mount(&mut routes, "/gadgets", Arc::new(Gadgets));
        mount(&mut routes, "/gadgets", Arc::new(Gadgets));
    }
}
