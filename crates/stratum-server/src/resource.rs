//! Resource capability traits.
//!
//! A resource is a handler object for a REST collection or singleton. Each
//! operation it supports is a small trait; registration probes the
//! [`Resource`] for each capability and wires only the matching routes.
//!
//! | capability             | collection route                       | singleton route     |
//! |------------------------|----------------------------------------|---------------------|
//! | [`CollectionLister`]   | `GET base`                             |                     |
//! | [`CollectionCounter`]  | `GET base/all/count`                   |                     |
//! | [`CollectionGetter`]   | `GET base/{id}`                        |                     |
//! | [`CollectionCreator`]  | `POST base`                            |                     |
//! | [`CollectionUpdater`]  | `PUT base/{id}`                        |                     |
//! | [`CollectionDeleter`]  | `DELETE base/{id}`, `DELETE base`      |                     |
//! | [`CollectionActioner`] | `POST base/{id}/{action}`              |                     |
//! | [`SingletonGetter`]    |                                        | `GET base`          |
//! | [`SingletonUpdater`]   |                                        | `PUT base`          |
//! | [`SingletonActioner`]  |                                        | `POST base/{action}`|
//!
//! # Example
//!
//! ```
//! use stratum_middleware::{BoxFuture, Exchange, Payload};
//! use stratum_server::resource::{CollectionLister, Reply, Resource};
//!
//! struct Users;
//!
//! impl CollectionLister for Users {
//!     fn list<'a>(&'a self, _ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
//!         Box::pin(async { Reply::ok(vec!["dave", "pat"]) })
//!     }
//! }
//!
//! impl Resource for Users {
//!     fn lister(&self) -> Option<&dyn CollectionLister> {
//!         Some(self)
//!     }
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use stratum_core::Error;
use stratum_middleware::{read_request, BoxFuture, Exchange, Payload};

/// Outcome of a resource operation.
///
/// A status of 0 means the operation wrote the response itself.
#[derive(Debug)]
pub struct Reply {
    /// HTTP status.
    pub status: u16,
    /// Body.
    pub body: Payload,
    /// Id of a created item, used for the `Location` header of a 201.
    pub id: Option<String>,
}

impl Reply {
    /// Creates a reply.
    pub fn new(status: u16, body: impl Into<Payload>) -> Self {
        Self {
            status,
            body: body.into(),
            id: None,
        }
    }

    /// 200 with a serializable value.
    pub fn ok<T: Serialize + Send + 'static>(value: T) -> Self {
        Self::new(200, Payload::value(value))
    }

    /// 201 with a serializable value.
    pub fn created<T: Serialize + Send + 'static>(value: T) -> Self {
        Self::new(201, Payload::value(value))
    }

    /// 201 with the created value and its id.
    ///
    /// ```
    /// use stratum_server::Reply;
    ///
    /// let reply = Reply::created_with_id("42", vec!["widget"]);
    /// assert_eq!(reply.status, 201);
    /// assert_eq!(reply.id.as_deref(), Some("42"));
    /// ```
    pub fn created_with_id<T: Serialize + Send + 'static>(id: impl Into<String>, value: T) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::created(value)
        }
    }

    /// 204 without a body.
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(204, Payload::Empty)
    }

    /// An error reply.
    #[must_use]
    pub fn error(status: u16, err: Error) -> Self {
        Self::new(status, Payload::Error(err))
    }

    /// The operation already wrote the response.
    #[must_use]
    pub fn written() -> Self {
        Self::new(0, Payload::Empty)
    }
}

/// Type of the items a collection creates or updates.
pub trait Items: Send + Sync {
    /// Item decoded from request bodies.
    type Item: DeserializeOwned + Send + 'static;

    /// A blank item that request bodies are decoded into.
    fn new_item(&self) -> Self::Item;

    /// The identifier of an item.
    fn id(&self, item: &Self::Item) -> String;
}

/// `GET base`.
pub trait CollectionLister: Send + Sync {
    /// Lists the collection.
    fn list<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Reply>;
}

/// `GET base/all/count`.
pub trait CollectionCounter: Send + Sync {
    /// Counts the collection.
    fn count<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Reply>;
}

/// `GET base/{id}`.
pub trait CollectionGetter: Send + Sync {
    /// Gets one item.
    fn get<'a>(&'a self, ex: &'a mut Exchange, id: String) -> BoxFuture<'a, Reply>;
}

/// `POST base`.
///
/// The body is decoded into [`Items::new_item`]. A 201 reply gets a
/// `Location` header joining the request path and the id of the created
/// item. That id is [`Reply::id`] when set, which is how an operation
/// reports an id it assigned to the returned value
/// ([`Reply::created_with_id`]); otherwise it is [`Items::id`] of `item`
/// after `create` returns.
pub trait CollectionCreator: Items {
    /// Creates an item.
    fn create<'a>(&'a self, ex: &'a mut Exchange, item: &'a mut Self::Item)
        -> BoxFuture<'a, Reply>;
}

/// `PUT base/{id}`.
///
/// The id of the decoded body must equal the id in the path.
pub trait CollectionUpdater: Items {
    /// Replaces an item.
    fn update<'a>(&'a self, ex: &'a mut Exchange, id: String, item: Self::Item)
        -> BoxFuture<'a, Reply>;
}

/// `DELETE base/{id}` and `DELETE base` (with an empty id).
pub trait CollectionDeleter: Send + Sync {
    /// Deletes one item, or the whole collection when `id` is empty.
    fn delete<'a>(&'a self, ex: &'a mut Exchange, id: String) -> BoxFuture<'a, Reply>;
}

/// `POST base/{id}/{action}`.
pub trait CollectionActioner: Send + Sync {
    /// Runs a named action on one item.
    fn action<'a>(&'a self, ex: &'a mut Exchange, id: String, action: String)
        -> BoxFuture<'a, Reply>;
}

/// `GET base` on a singleton.
pub trait SingletonGetter: Send + Sync {
    /// Gets the singleton.
    fn get<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Reply>;
}

/// `PUT base` on a singleton.
pub trait SingletonUpdater: Items {
    /// Replaces the singleton.
    fn update<'a>(&'a self, ex: &'a mut Exchange, item: Self::Item) -> BoxFuture<'a, Reply>;
}

/// `POST base/{action}` on a singleton.
pub trait SingletonActioner: Send + Sync {
    /// Runs a named action.
    fn action<'a>(&'a self, ex: &'a mut Exchange, action: String) -> BoxFuture<'a, Reply>;
}

/// Failure to decode a request body, answered with 400.
pub(crate) fn bad_request(err: Error) -> Reply {
    Reply::error(400, err)
}

/// Object-safe form of [`CollectionCreator`].
pub trait CreateRoute: Send + Sync {
    /// Decodes the body and creates the item, returning the reply and the
    /// item id.
    fn create_from_body<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, (Reply, String)>;
}

impl<T: CollectionCreator> CreateRoute for T {
    fn create_from_body<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, (Reply, String)> {
        Box::pin(async move {
            let mut item = match read_request(ex, self.new_item()).await {
                Ok(item) => item,
                Err(err) => {
                    ex.state_mut().set_progress("create.body_error");
                    return (bad_request(err), String::new());
                }
            };
            let reply = self.create(ex, &mut item).await;
            let id = reply.id.clone().unwrap_or_else(|| self.id(&item));
            (reply, id)
        })
    }
}

/// Object-safe form of [`CollectionUpdater`].
pub trait UpdateRoute: Send + Sync {
    /// Decodes the body, checks its id against `id` and updates.
    fn update_from_body<'a>(&'a self, ex: &'a mut Exchange, id: String) -> BoxFuture<'a, Reply>;
}

impl<T: CollectionUpdater> UpdateRoute for T {
    fn update_from_body<'a>(&'a self, ex: &'a mut Exchange, id: String) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            ex.state_mut().set_progress("update.begin");
            let item = match read_request(ex, self.new_item()).await {
                Ok(item) => item,
                Err(err) => {
                    ex.state_mut().set_progress("update.body_error");
                    return bad_request(err);
                }
            };
            if self.id(&item) != id {
                ex.state_mut().set_progress("update.id_error");
                return bad_request(ex.error(stratum_core::codes::RESOURCE_ID_MISMATCH, &[]));
            }
            ex.state_mut().set_progress("update.write");
            self.update(ex, id, item).await
        })
    }
}

/// Object-safe form of [`SingletonUpdater`].
pub trait SingletonUpdateRoute: Send + Sync {
    /// Decodes the body and updates the singleton.
    fn update_from_body<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Reply>;
}

impl<T: SingletonUpdater> SingletonUpdateRoute for T {
    fn update_from_body<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            ex.state_mut().set_progress("update.begin");
            match read_request(ex, self.new_item()).await {
                Ok(item) => {
                    ex.state_mut().set_progress("update.write");
                    self.update(ex, item).await
                }
                Err(err) => {
                    ex.state_mut().set_progress("update.body_error");
                    bad_request(err)
                }
            }
        })
    }
}

/// Capability probe.
///
/// Each method returns the resource as the capability it implements, or
/// `None`. Implement the ones the resource supports by returning
/// `Some(self)`. A resource is either a collection or a singleton; enabling
/// both kinds of `GET`/`PUT` for one base path panics at registration.
pub trait Resource: Send + Sync + 'static {
    /// `GET base`.
    fn lister(&self) -> Option<&dyn CollectionLister> {
        None
    }

    /// `GET base/all/count`.
    fn counter(&self) -> Option<&dyn CollectionCounter> {
        None
    }

    /// `GET base/{id}`.
    fn getter(&self) -> Option<&dyn CollectionGetter> {
        None
    }

    /// `POST base`.
    fn creator(&self) -> Option<&dyn CreateRoute> {
        None
    }

    /// `PUT base/{id}`.
    fn updater(&self) -> Option<&dyn UpdateRoute> {
        None
    }

    /// `DELETE base/{id}` and `DELETE base`.
    fn deleter(&self) -> Option<&dyn CollectionDeleter> {
        None
    }

    /// `POST base/{id}/{action}`.
    fn actioner(&self) -> Option<&dyn CollectionActioner> {
        None
    }

    /// `GET base` on a singleton.
    fn singleton_getter(&self) -> Option<&dyn SingletonGetter> {
        None
    }

    /// `PUT base` on a singleton.
    fn singleton_updater(&self) -> Option<&dyn SingletonUpdateRoute> {
        None
    }

    /// `POST base/{action}` on a singleton.
    fn singleton_actioner(&self) -> Option<&dyn SingletonActioner> {
        None
    }
}
