//! Path parameters carried in the request [`Context`].
//!
//! The dispatcher binds every named segment of the matched route (for
//! `/v1/company/{id}` that is `id`) before the first middleware runs. Handlers
//! read them back with the typed accessors:
//!
//! ```rust
//! use apiserve::{params, Request, Response};
//! use http::StatusCode;
//!
//! async fn get_company(req: Request) -> Response {
//!     match params::int(req.context(), "id") {
//!         Ok(id) => Response::text(format!("company {id}")),
//!         Err(params::ParamError::KeyNotFound(_)) => Response::status(StatusCode::NOT_FOUND),
//!         Err(_) => Response::status(StatusCode::BAD_REQUEST),
//!     }
//! }
//! ```
//!
//! Parameters are stored under a key type private to this module, so no other
//! binding in the context can shadow them.

use std::any::Any;
use std::collections::HashMap;
use std::num::ParseIntError;
use std::sync::Arc;

use thiserror::Error;

use crate::context::Context;

/// Why a parameter lookup failed.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("parameter `{0}` not found")]
    KeyNotFound(String),

    #[error("parameter `{0}` is not a string")]
    NotAString(String),

    #[error("parameter `{key}` is not an integer: {source}")]
    ParseInt {
        key: String,
        #[source]
        source: ParseIntError,
    },
}

type Value = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
struct Params(Arc<HashMap<String, Value>>);

/// Returns a derived context with `key` bound to `val`.
pub fn with_value<V>(ctx: &Context, key: impl Into<String>, val: V) -> Context
where
    V: Any + Send + Sync,
{
    extend(ctx, [(key.into(), Arc::new(val) as Value)])
}

/// Binds the routed segments in one step so a request with several
/// parameters derives a single child context.
pub(crate) fn with_path_params(ctx: &Context, matched: matchit::Params<'_, '_>) -> Context {
    if matched.is_empty() {
        return ctx.clone();
    }
    extend(
        ctx,
        matched.iter().map(|(k, v)| (k.to_owned(), Arc::new(v.to_owned()) as Value)),
    )
}

fn extend(ctx: &Context, entries: impl IntoIterator<Item = (String, Value)>) -> Context {
    let mut map = ctx
        .value::<Params>()
        .map(|p| (*p.0).clone())
        .unwrap_or_default();
    map.extend(entries);
    ctx.with_value(Params(Arc::new(map)))
}

/// Raw lookup.
pub fn value<'a>(ctx: &'a Context, key: &str) -> Result<&'a (dyn Any + Send + Sync), ParamError> {
    ctx.value::<Params>()
        .and_then(|p| p.0.get(key))
        .map(|v| v.as_ref())
        .ok_or_else(|| ParamError::KeyNotFound(key.to_owned()))
}

/// Looks up a parameter bound as a `String`.
///
/// Every routed path segment is a string; [`ParamError::NotAString`] only
/// occurs for values bound by hand with [`with_value`].
pub fn string<'a>(ctx: &'a Context, key: &str) -> Result<&'a str, ParamError> {
    value(ctx, key)?
        .downcast_ref::<String>()
        .map(String::as_str)
        .ok_or_else(|| ParamError::NotAString(key.to_owned()))
}

/// Looks up a string parameter and parses it as a decimal integer.
pub fn int(ctx: &Context, key: &str) -> Result<i64, ParamError> {
    string(ctx, key)?
        .parse()
        .map_err(|source| ParamError::ParseInt { key: key.to_owned(), source })
}
