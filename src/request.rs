//! Incoming HTTP request type.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

use crate::context::Context;
use crate::params;

/// An incoming HTTP request with its body fully buffered.
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    context: Context,
}

impl Request {
    pub(crate) fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            remote_addr: None,
            context: Context::background(),
        }
    }

    pub(crate) fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The request-scoped context carrying path parameters and the server's
    /// hard-close cancellation.
    pub fn context(&self) -> &Context { &self.context }

    /// Replaces the context, typically with a child derived from the current one.
    pub fn set_context(&mut self, ctx: Context) {
        self.context = ctx;
    }

    /// Shorthand for [`params::string`] on this request's context.
    ///
    /// For a route `/v1/company/{id}`, `req.param("id")` on `/v1/company/42`
    /// returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        params::string(&self.context, key).ok()
    }
}

#[cfg(test)]
impl Request {
    pub(crate) fn get(uri: &'static str) -> Self {
        Self::new(Method::GET, Uri::from_static(uri), HeaderMap::new(), Bytes::new())
    }
}
