//! Built-in status endpoint.
//!
//! Answers with the application's identity and a static health marker, for
//! load balancers and humans alike:
//!
//! ```rust
//! use apiserve::{health, Server};
//!
//! let mut server = Server::new();
//! server.handle_get(
//!     "/v1/status",
//!     health::status(health::AppInfo::new("apicompanies", env!("CARGO_PKG_VERSION"))),
//! );
//! ```
//!
//! ```json
//! {"app":"apicompanies","health":"ok","version":"0.1.0","gitCommit":"","buildDate":""}
//! ```

use bytes::Bytes;
use serde::Serialize;
use tracing::error;

use crate::handler::Handler;
use crate::request::Request;
use crate::response::Response;

/// Build identity reported by [`status`].
#[derive(Clone, Debug, Default)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub git_commit: String,
    pub build_date: String,
}

impl AppInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), ..Self::default() }
    }

    pub fn with_build(mut self, git_commit: impl Into<String>, build_date: impl Into<String>) -> Self {
        self.git_commit = git_commit.into();
        self.build_date = build_date.into();
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse<'a> {
    app: &'a str,
    health: &'a str,
    version: &'a str,
    git_commit: &'a str,
    build_date: &'a str,
}

/// Returns a handler that always reports `"health": "ok"` with `info`.
///
/// If the process can respond to HTTP at all, it is healthy; this handler
/// intentionally has no dependencies.
pub fn status(info: AppInfo) -> impl Handler {
    // Serialised once; the body never changes.
    let body = match serde_json::to_vec(&StatusResponse {
        app: &info.name,
        health: "ok",
        version: &info.version,
        git_commit: &info.git_commit,
        build_date: &info.build_date,
    }) {
        Ok(bytes) => Some(Bytes::from(bytes)),
        Err(e) => {
            error!("serialize status response: {e}");
            None
        }
    };

    move |_req: Request| {
        let body = body.clone();
        async move {
            match body {
                Some(bytes) => Response::json(bytes),
                None => Response::status(http::StatusCode::INTERNAL_SERVER_ERROR),
            }
        }
    }
}
