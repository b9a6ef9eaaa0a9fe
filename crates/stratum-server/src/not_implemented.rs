//! A placeholder resource answering 501 to every collection operation.

use stratum_middleware::{BoxFuture, Exchange, Payload};

use crate::resource::{
    CollectionActioner, CollectionCounter, CollectionDeleter, CollectionGetter, CollectionLister,
    CreateRoute, Reply, Resource, UpdateRoute,
};

/// Reserves a base path whose operations are not built yet.
///
/// Request bodies are never read, so malformed bodies still get 501.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotImplementedResource;

fn not_implemented<'a>() -> BoxFuture<'a, Reply> {
    Box::pin(async { Reply::new(501, Payload::Empty) })
}

impl CollectionLister for NotImplementedResource {
    fn list<'a>(&'a self, _ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
        not_implemented()
    }
}

impl CollectionCounter for NotImplementedResource {
    fn count<'a>(&'a self, _ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
        not_implemented()
    }
}

impl CollectionGetter for NotImplementedResource {
    fn get<'a>(&'a self, _ex: &'a mut Exchange, _id: String) -> BoxFuture<'a, Reply> {
        not_implemented()
    }
}

impl CreateRoute for NotImplementedResource {
    fn create_from_body<'a>(&'a self, _ex: &'a mut Exchange) -> BoxFuture<'a, (Reply, String)> {
        Box::pin(async { (Reply::new(501, Payload::Empty), String::new()) })
    }
}

impl UpdateRoute for NotImplementedResource {
    fn update_from_body<'a>(&'a self, _ex: &'a mut Exchange, _id: String) -> BoxFuture<'a, Reply> {
        not_implemented()
    }
}

impl CollectionDeleter for NotImplementedResource {
    fn delete<'a>(&'a self, _ex: &'a mut Exchange, _id: String) -> BoxFuture<'a, Reply> {
        not_implemented()
    }
}

impl CollectionActioner for NotImplementedResource {
    fn action<'a>(
        &'a self,
        _ex: &'a mut Exchange,
        _id: String,
        _action: String,
    ) -> BoxFuture<'a, Reply> {
        not_implemented()
    }
}

impl Resource for NotImplementedResource {
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

    fn deleter(&self) -> Option<&dyn CollectionDeleter> {
        Some(self)
    }

    fn actioner(&self) -> Option<&dyn CollectionActioner> {
        Some(self)
    }
}
