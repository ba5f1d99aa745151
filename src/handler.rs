//! Route handlers and the erased form the route table stores.
//!
//! Every registered route ends up as one [`BoxedHandler`]: the user's function
//! at the bottom, then one [`Layered`](crate::middleware) wrapper per matching
//! middleware on top. Both levels implement [`ErasedHandler`], so a
//! middleware's [`Next`](crate::middleware::Next) cannot tell whether it is
//! calling another middleware or the route itself.
//!
//! ```text
//!   Layered(A) ─▶ Layered(B) ─▶ Terminal(get_company)
//!   outermost                    built by into_boxed_handler
//! ```
//!
//! The stack is assembled once per route by
//! [`Pipeline::compose`](crate::middleware) and shared by every request that
//! matches it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// Future returned by every layer of a route stack.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// One layer of a route stack.
///
/// Public only because it appears in [`Handler::into_boxed_handler`].
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A complete route stack, or any layer of one.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Something that can answer a request at the bottom of a route stack.
///
/// Satisfied by any `async fn(Request) -> impl IntoResponse`, or a closure of
/// that shape. Sealed: there is nothing to implement by hand.
pub trait Handler: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod sealed {
    pub trait Sealed {}
}

impl<F, Fut, R> sealed::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(Terminal(self))
    }
}

/// Boxes a user future, converting its output into a [`Response`]. Shared by
/// route handlers and middleware.
pub(crate) fn respond<Fut, R>(fut: Fut) -> BoxFuture
where
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    Box::pin(async move { fut.await.into_response() })
}

/// The route's own function, innermost in the stack.
struct Terminal<F>(F);

impl<F, Fut, R> ErasedHandler for Terminal<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        respond((self.0)(req))
    }
}
