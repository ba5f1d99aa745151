//! Middleware pipeline.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, request-id injection,
//! authentication-header inspection.
//!
//! A middleware is any async function taking the request and a [`Next`]:
//!
//! ```rust
//! use apiserve::middleware::Next;
//! use apiserve::{Request, Response};
//! use http::StatusCode;
//!
//! async fn require_token(req: Request, next: Next) -> Response {
//!     if req.header("authorization").is_none() {
//!         // not calling `next` ends the chain here
//!         return Response::status(StatusCode::UNAUTHORIZED);
//!     }
//!     next.run(req).await
//! }
//! ```
//!
//! # Composition
//!
//! Middleware is composed around each route **when the route is registered**,
//! not per request. The recorded entries are walked in reverse registration
//! order and every entry whose path prefix matches the route wraps the
//! handler built so far. At request time the first-registered middleware is
//! therefore outermost and runs first.
//!
//! A route registered before a middleware is added never sees that
//! middleware.

mod trace;

pub use trace::trace;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{self, BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The rest of the chain, as seen from inside a middleware.
#[derive(Clone)]
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    /// Hands the request to the next middleware, or to the route handler
    /// when this is the innermost layer.
    pub async fn run(self, req: Request) -> Response {
        self.inner.call(req).await
    }
}

/// Per-entry registration options.
#[derive(Clone, Debug, Default)]
pub struct Options {
    prefix: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the middleware to routes whose path pattern starts with
    /// `prefix`. An empty prefix matches every route.
    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn applies_to(&self, path: &str) -> bool {
        match self.prefix.as_deref() {
            None | Some("") => true,
            Some(prefix) => path.starts_with(prefix),
        }
    }
}

// ── Middleware trait ──────────────────────────────────────────────────────────

#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

/// Implemented for every function or closure of the shape
/// `async fn(Request, Next) -> impl IntoResponse`. Sealed.
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware(self))
    }
}

struct FnMiddleware<F>(F);

impl<F, Fut, R> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        handler::respond((self.0)(req, next))
    }
}

/// One middleware bound around an inner handler.
struct Layered {
    mw: BoxedMiddleware,
    next: BoxedHandler,
}

impl ErasedHandler for Layered {
    fn call(&self, req: Request) -> BoxFuture {
        self.mw.call(req, Next { inner: Arc::clone(&self.next) })
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

struct Entry {
    mw: BoxedMiddleware,
    opts: Options,
}

/// Ordered middleware entries, in registration order.
#[derive(Default)]
pub(crate) struct Pipeline {
    entries: Vec<Entry>,
}

impl Pipeline {
    pub(crate) fn push(&mut self, mw: impl Middleware, opts: Options) {
        self.entries.push(Entry { mw: mw.into_boxed_middleware(), opts });
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Snapshots the current entries around `handler` for the route `path`.
    pub(crate) fn compose(&self, path: &str, handler: BoxedHandler) -> BoxedHandler {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.opts.applies_to(path))
            .fold(handler, |next, e| {
                Arc::new(Layered { mw: Arc::clone(&e.mw), next }) as BoxedHandler
            })
    }
}
