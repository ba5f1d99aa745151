//! Minimal apiserve example: status endpoint, company-style routes with a
//! prefix-scoped auth check, and graceful shutdown on SIGTERM / Ctrl-C.
//!
//! Run with:
//!   RUST_LOG=info APP_PORT=3000 cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/v1/status
//!   curl -H 'authorization: demo' http://localhost:3000/v1/company/42
//!   curl -X POST -H 'authorization: demo' http://localhost:3000/v1/company -d '{"name":"acme"}'
//!   curl -i http://localhost:3000/v1/company/42          # 401
//!   curl -i http://localhost:3000/v1/invoices            # 501

use apiserve::config::ServerConfig;
use apiserve::middleware::{self, Next};
use apiserve::{health, params, ParamError, Request, Response, Server, StatusCode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    let mut server = Server::new();
    server.add_middleware(middleware::trace);
    server.add_middleware_with(require_auth, middleware::Options::new().path_prefix("/v1/company"));

    server.handle_get(
        "/v1/status",
        health::status(health::AppInfo::new("apicompanies", env!("CARGO_PKG_VERSION"))),
    );
    server.handle_get("/v1/company", list_companies);
    server.handle_post("/v1/company", create_company);
    server.handle_get("/v1/company/{id}", get_company);
    server.handle_delete("/v1/company/{id}", delete_company);

    apiserve::run::run(&server, &config, apiserve::run::shutdown_signal()).await?;
    Ok(())
}

async fn require_auth(req: Request, next: Next) -> Response {
    if req.header("authorization").is_none() {
        return Response::status(StatusCode::UNAUTHORIZED);
    }
    next.run(req).await
}

// GET /v1/company
async fn list_companies(_req: Request) -> Response {
    Response::json(r#"[{"id":42,"name":"acme"}]"#)
}

// POST /v1/company
//
// req.body() is the buffered request body; parse it with serde_json::from_slice.
async fn create_company(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }
    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/v1/company/99")
        .json(r#"{"id":99}"#)
}

// GET /v1/company/{id}
async fn get_company(req: Request) -> Response {
    match params::int(req.context(), "id") {
        Ok(id) => Response::json(format!(r#"{{"id":{id},"name":"acme"}}"#)),
        Err(ParamError::KeyNotFound(_)) => Response::status(StatusCode::NOT_FOUND),
        Err(_) => Response::status(StatusCode::BAD_REQUEST),
    }
}

// DELETE /v1/company/{id} → 204 No Content
async fn delete_company(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}
