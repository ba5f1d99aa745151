//! Radix-tree route table.
//!
//! One [`matchit`] tree per HTTP method; O(path-length) lookup. Patterns use
//! `{name}` for a named segment and `{*name}` for a trailing catch-all.
//!
//! Re-registering an identical (method, pattern) pair replaces the handler:
//! last registration wins.
//!
//! A request that misses only by a trailing slash (`/v1/status/` when
//! `/v1/status` is routed, or the reverse) is redirected to the routed form:
//! `301` for GET, `308` otherwise so the method and body survive. Paths are
//! not otherwise cleaned or case-folded. Anything else that matches nothing,
//! including a known path under the wrong method, goes to the fallback
//! handler, which by default answers `501 Not Implemented`.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::params;
use crate::request::Request;
use crate::response::Response;

#[derive(Clone)]
pub(crate) struct Router {
    trees: HashMap<Method, MatchitRouter<usize>>,
    // Tree values index into `slots` so an identical pattern can be rebound
    // without touching the tree.
    slots: Vec<BoxedHandler>,
    patterns: HashMap<(Method, String), usize>,
    fallback: BoxedHandler,
}

impl Router {
    pub(crate) fn new() -> Self {
        Self {
            trees: HashMap::new(),
            slots: Vec::new(),
            patterns: HashMap::new(),
            fallback: not_implemented.into_boxed_handler(),
        }
    }

    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern, or if it overlaps a different
    /// pattern already registered for `method` in a way the tree cannot
    /// disambiguate (e.g. `/v1/{id}` next to `/v1/{name}`).
    pub(crate) fn insert(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        let key = (method, path.to_owned());
        if let Some(&slot) = self.patterns.get(&key) {
            debug!(method = %key.0, path, "replacing route handler");
            self.slots[slot] = handler;
            return;
        }

        let slot = self.slots.len();
        self.trees
            .entry(key.0.clone())
            .or_default()
            .insert(path, slot)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.slots.push(handler);
        self.patterns.insert(key, slot);
    }

    pub(crate) fn set_fallback(&mut self, handler: BoxedHandler) {
        self.fallback = handler;
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Routes one request: binds the matched path parameters into the
    /// request context, then calls the composed handler.
    pub(crate) fn dispatch(&self, mut req: Request) -> BoxFuture {
        let Some(tree) = self.trees.get(req.method()) else {
            return self.fallback.call(req);
        };

        let routed = tree.at(req.path()).ok().map(|m| {
            let handler = Arc::clone(&self.slots[*m.value]);
            (handler, params::with_path_params(req.context(), m.params))
        });

        match routed {
            Some((handler, ctx)) => {
                req.set_context(ctx);
                handler.call(req)
            }
            None => match redirect_target(tree, &req) {
                Some(location) => {
                    debug!(from = req.path(), to = %location, "trailing slash redirect");
                    Box::pin(std::future::ready(redirect(req.method(), &location)))
                }
                None => self.fallback.call(req),
            },
        }
    }
}

/// The request path with its trailing slash toggled, plus the original query,
/// if that form is routed.
fn redirect_target(tree: &MatchitRouter<usize>, req: &Request) -> Option<String> {
    let path = req.path();
    let alt = match path.strip_suffix('/') {
        Some("") => return None,
        Some(trimmed) => trimmed.to_owned(),
        None => format!("{path}/"),
    };
    tree.at(&alt).ok()?;
    Some(match req.uri().query() {
        Some(query) => format!("{alt}?{query}"),
        None => alt,
    })
}

fn redirect(method: &Method, location: &str) -> Response {
    let status = if method == Method::GET {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::PERMANENT_REDIRECT
    };
    Response::builder().status(status).header("location", location).no_body()
}

async fn not_implemented(_req: Request) -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}
