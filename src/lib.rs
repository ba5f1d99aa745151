//! # apiserve
//!
//! An embeddable HTTP server for REST APIs: a radix-tree route table,
//! prefix-scoped middleware composed at registration time, path parameters
//! threaded through a cancellation-aware request context, and a
//! graceful / forceful shutdown lifecycle.
//!
//! - Radix-tree routing via [`matchit`], one tree per method
//! - HTTP/1.1 and HTTP/2 via hyper, optional TLS via rustls
//! - Middleware that runs in registration order and can short-circuit
//! - Unmatched routes answer `501 Not Implemented` until you say otherwise
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use apiserve::{middleware, params, Request, Response, Server};
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut server = Server::new();
//!     server.add_middleware(middleware::trace);
//!     server.handle_get("/v1/company/{id}", get_company);
//!     server.handle_post("/v1/company", create_company);
//!
//!     let server = Arc::new(server);
//!     let stopper = Arc::clone(&server);
//!     tokio::spawn(async move {
//!         apiserve::run::shutdown_signal().await;
//!         let _ = stopper.shutdown(tokio::time::sleep(Duration::from_secs(10))).await;
//!     });
//!
//!     let err = server.listen("0.0.0.0:3000").await;
//!     if !err.is_server_closed() {
//!         eprintln!("server listen: {err}");
//!     }
//! }
//!
//! async fn get_company(req: Request) -> Response {
//!     match params::int(req.context(), "id") {
//!         Ok(id) => Response::json(format!(r#"{{"id":{id}}}"#)),
//!         Err(_) => Response::status(StatusCode::BAD_REQUEST),
//!     }
//! }
//!
//! async fn create_company(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/v1/company/99")
//!         .json(r#"{"id":99}"#)
//! }
//! ```

mod accept;
mod context;
mod error;
mod handler;
mod lifecycle;
mod request;
mod response;
mod router;
mod server;
mod static_files;
mod tls;

pub mod config;
pub mod health;
pub mod middleware;
pub mod params;
pub mod run;

pub use context::Context;
pub use error::Error;
pub use handler::Handler;
pub use middleware::{Middleware, Next};
pub use params::ParamError;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use server::Server;

pub use http::{Method, StatusCode};
