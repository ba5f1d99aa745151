//! Static file handlers.
//!
//! Files are read whole into memory; this is meant for small assets such as
//! an API console or an OpenAPI document, not for bulk downloads.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::StatusCode;
use tracing::error;

use crate::handler::{BoxedHandler, Handler};
use crate::params;
use crate::request::Request;
use crate::response::{ContentType, Response};

/// Name of the catch-all segment bound by directory routes.
pub(crate) const FILEPATH_PARAM: &str = "filepath";

/// Patterns for a directory mounted at `url_prefix`: the mount root itself,
/// then everything below it. The catch-all never matches an empty tail, so
/// the root needs its own route.
pub(crate) fn dir_patterns(url_prefix: &str) -> [String; 2] {
    let base = url_prefix.trim_end_matches('/');
    [format!("{base}/"), format!("{base}/{{*{FILEPATH_PARAM}}}")]
}

/// Serves files below `root`, addressed by the `filepath` parameter. Without
/// the parameter it serves `root` itself.
pub(crate) fn dir(root: impl Into<PathBuf>) -> BoxedHandler {
    let root = Arc::new(root.into());
    (move |req: Request| {
        let root = Arc::clone(&root);
        async move {
            let rel = params::string(req.context(), FILEPATH_PARAM).unwrap_or_default();
            match resolve(&root, rel) {
                Some(path) => serve_path(&path).await,
                None => Response::status(StatusCode::NOT_FOUND),
            }
        }
    })
    .into_boxed_handler()
}

/// Serves the one file at `path` regardless of the request path.
pub(crate) fn file(path: impl Into<PathBuf>) -> BoxedHandler {
    let path = Arc::new(path.into());
    (move |_req: Request| {
        let path = Arc::clone(&path);
        async move { serve_path(&path).await }
    })
    .into_boxed_handler()
}

/// Joins a URL sub-path onto `root`. Rejects any `..` segment and anything
/// that could be read as an absolute or drive-relative path.
fn resolve(root: &Path, rel: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for seg in rel.split('/') {
        match seg {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || s.contains(':') => return None,
            s => path.push(s),
        }
    }
    Some(path)
}

async fn serve_path(path: &Path) -> Response {
    let path = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => path.join("index.html"),
        Ok(_) => path.to_path_buf(),
        Err(e) => return io_error_response(path, &e),
    };

    match tokio::fs::read(&path).await {
        Ok(body) => {
            let content_type = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(ContentType::OctetStream, ContentType::from_extension);
            Response::builder().bytes(content_type, body)
        }
        Err(e) => io_error_response(&path, &e),
    }
}

fn io_error_response(path: &Path, e: &std::io::Error) -> Response {
    match e.kind() {
        ErrorKind::NotFound => Response::status(StatusCode::NOT_FOUND),
        ErrorKind::PermissionDenied => Response::status(StatusCode::FORBIDDEN),
        _ => {
            error!(path = %path.display(), "static file read failed: {e}");
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
