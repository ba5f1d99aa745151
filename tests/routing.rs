//! Routing, middleware, and parameter behaviour over a real socket.

mod common;

use std::sync::{Arc, Mutex};

use apiserve::middleware::{self, Next};
use apiserve::{params, Middleware, ParamError, Request, Response, Server, StatusCode};
use common::{send, send_with_body, start};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn recorder(log: &Log, name: &'static str) -> impl Middleware {
    let log = Arc::clone(log);
    move |req: Request, next: Next| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(name);
            next.run(req).await
        }
    }
}

fn terminal(log: &Log, name: &'static str) -> impl apiserve::Handler {
    let log = Arc::clone(log);
    move |_req: Request| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(name);
            Response::text(name)
        }
    }
}

#[tokio::test]
async fn prefix_scoped_middleware_scenario() {
    let log = Log::default();
    let mut server = Server::new();
    server.add_middleware(recorder(&log, "A"));
    server.add_middleware_with(
        recorder(&log, "B"),
        middleware::Options::new().path_prefix("/v1/company"),
    );
    server.handle_get("/v1/company", terminal(&log, "company"));
    server.handle_get("/v1/status", terminal(&log, "status"));
    let running = start(server).await;

    let reply = send(running.addr, "GET", "/v1/company").await.unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(*log.lock().unwrap(), ["A", "B", "company"]);

    log.lock().unwrap().clear();
    let reply = send(running.addr, "GET", "/v1/status").await.unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(*log.lock().unwrap(), ["A", "status"]);

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn rejecting_middleware_stops_the_chain() {
    let log = Log::default();
    let mut server = Server::new();
    server.add_middleware(recorder(&log, "outer"));
    server.add_middleware(|req: Request, next: Next| async move {
        if req.header("authorization").is_none() {
            return Response::status(StatusCode::UNAUTHORIZED);
        }
        next.run(req).await
    });
    server.add_middleware(recorder(&log, "inner"));
    server.handle_get("/v1/company", terminal(&log, "company"));
    let running = start(server).await;

    let reply = send(running.addr, "GET", "/v1/company").await.unwrap();
    assert_eq!(reply.status, 401);
    assert_eq!(*log.lock().unwrap(), ["outer"]);

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn middleware_added_late_does_not_apply_to_earlier_routes() {
    let log = Log::default();
    let mut server = Server::new();
    server.handle_get("/early", terminal(&log, "early"));
    server.add_middleware(recorder(&log, "late"));
    server.handle_get("/after", terminal(&log, "after"));
    let running = start(server).await;

    send(running.addr, "GET", "/early").await.unwrap();
    assert_eq!(*log.lock().unwrap(), ["early"]);

    log.lock().unwrap().clear();
    send(running.addr, "GET", "/after").await.unwrap();
    assert_eq!(*log.lock().unwrap(), ["late", "after"]);

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn fallback_handles_unknown_paths() {
    let mut server = Server::new();
    server.handle_get("/v1/status", |_req: Request| async { "status" });
    let running = start(server).await;

    let reply = send(running.addr, "GET", "/v1/unknown").await.unwrap();
    assert_eq!(reply.status, 501);

    running.server.close().await.unwrap();

    let mut server = Server::new();
    server.handle_get("/v1/status", |_req: Request| async { "status" });
    server.set_not_found_handler(|_req: Request| async {
        Response::builder().status(StatusCode::NOT_FOUND).text("no such route")
    });
    let running = start(server).await;

    let reply = send(running.addr, "GET", "/v1/unknown").await.unwrap();
    assert_eq!(reply.status, 404);
    assert_eq!(reply.body, "no such route");

    let reply = send(running.addr, "GET", "/v1/status").await.unwrap();
    assert_eq!(reply.body, "status");

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn trailing_slash_is_redirected_not_routed_to_fallback() {
    let mut server = Server::new();
    server.handle_get("/v1/status", |_req: Request| async { "status" });
    let running = start(server).await;

    let reply = send(running.addr, "GET", "/v1/status/").await.unwrap();
    assert_eq!(reply.status, 301);
    assert!(reply.head.lines().any(|l| l.eq_ignore_ascii_case("location: /v1/status")));

    running.server.close().await.unwrap();
}

async fn company(req: Request) -> Response {
    match params::int(req.context(), "id") {
        Ok(id) => Response::json(format!(r#"{{"id":{id}}}"#)),
        Err(ParamError::KeyNotFound(_)) => Response::status(StatusCode::NOT_FOUND),
        Err(e) => Response::builder().status(StatusCode::BAD_REQUEST).text(e.to_string()),
    }
}

#[tokio::test]
async fn path_parameters_reach_the_handler() {
    let mut server = Server::new();
    server.handle_get("/v1/company/{id}", company);
    server.handle_put("/v1/company/{id}", company);
    let running = start(server).await;

    let reply = send(running.addr, "GET", "/v1/company/42").await.unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, r#"{"id":42}"#);

    let reply = send(running.addr, "GET", "/v1/company/abc").await.unwrap();
    assert_eq!(reply.status, 400);
    assert!(reply.body.contains("not an integer"));

    let reply = send_with_body(running.addr, "PUT", "/v1/company/7", r#"{"name":"acme"}"#)
        .await
        .unwrap();
    assert_eq!(reply.body, r#"{"id":7}"#);

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn middleware_sees_path_parameters() {
    let mut server = Server::new();
    server.add_middleware(|req: Request, next: Next| async move {
        if req.param("id") == Some("0") {
            return Response::status(StatusCode::BAD_REQUEST);
        }
        next.run(req).await
    });
    server.handle_get("/v1/company/{id}", company);
    let running = start(server).await;

    assert_eq!(send(running.addr, "GET", "/v1/company/0").await.unwrap().status, 400);
    assert_eq!(send(running.addr, "GET", "/v1/company/1").await.unwrap().status, 200);

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn handle_registers_the_common_methods() {
    let mut server = Server::new();
    server.handle("/v1/echo", |req: Request| async move { req.method().to_string() });
    server.handle_options("/v1/echo", |_req: Request| async { StatusCode::NO_CONTENT });
    let running = start(server).await;

    for method in ["GET", "POST", "PATCH", "PUT", "DELETE"] {
        let reply = send(running.addr, method, "/v1/echo").await.unwrap();
        assert_eq!(reply.status, 200, "{method}");
        assert_eq!(reply.body, method);
    }

    let reply = send(running.addr, "HEAD", "/v1/echo").await.unwrap();
    assert_eq!(reply.status, 200);
    assert!(reply.body.is_empty());

    let reply = send(running.addr, "OPTIONS", "/v1/echo").await.unwrap();
    assert_eq!(reply.status, 204);

    let reply = send(running.addr, "TRACE", "/v1/echo").await.unwrap();
    assert_eq!(reply.status, 501);

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn duplicate_route_last_registration_wins() {
    let mut server = Server::new();
    server.handle_get("/v1/status", |_req: Request| async { "first" });
    server.handle_get("/v1/status", |_req: Request| async { "second" });
    let running = start(server).await;

    let reply = send(running.addr, "GET", "/v1/status").await.unwrap();
    assert_eq!(reply.body, "second");

    running.server.close().await.unwrap();
}

#[tokio::test]
async fn serves_static_files() {
    let root = std::env::temp_dir().join(format!("apiserve-files-{}", std::process::id()));
    std::fs::create_dir_all(root.join("css")).unwrap();
    std::fs::write(root.join("css/site.css"), "body{}").unwrap();
    std::fs::write(root.join("index.html"), "<h1>console</h1>").unwrap();
    std::fs::write(root.join("openapi.json"), r#"{"openapi":"3.0.0"}"#).unwrap();

    let mut server = Server::new();
    server.serve_files("/static", &root);
    server.serve_file("/docs/openapi.json", root.join("openapi.json"));
    let running = start(server).await;

    let reply = send(running.addr, "GET", "/static/css/site.css").await.unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "body{}");
    assert!(reply.head.to_ascii_lowercase().contains("content-type: text/css"));

    let reply = send(running.addr, "GET", "/docs/openapi.json").await.unwrap();
    assert_eq!(reply.status, 200);
    assert!(reply.head.to_ascii_lowercase().contains("content-type: application/json"));

    let reply = send(running.addr, "GET", "/static/").await.unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "<h1>console</h1>");
    assert!(reply.head.to_ascii_lowercase().contains("content-type: text/html"));

    let reply = send(running.addr, "GET", "/static/missing.txt").await.unwrap();
    assert_eq!(reply.status, 404);

    let reply = send(running.addr, "GET", "/static/../openapi.json").await.unwrap();
    assert_eq!(reply.status, 404);

    running.server.close().await.unwrap();
    std::fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn status_endpoint_reports_identity() {
    let mut server = Server::new();
    server.handle_get(
        "/v1/status",
        apiserve::health::status(apiserve::health::AppInfo::new("apicompanies", "0.1.0")),
    );
    let running = start(server).await;

    let reply = send(running.addr, "GET", "/v1/status").await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(json["app"], "apicompanies");
    assert_eq!(json["health"], "ok");

    running.server.close().await.unwrap();
}
