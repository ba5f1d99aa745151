//! HTTP server: registration, serving, and shutdown.
//!
//! # Lifecycle
//!
//! A [`Server`] is built with `&mut self` registration calls, then shared
//! (usually behind an `Arc`) between the task that runs [`Server::listen`]
//! and the task that eventually calls [`Server::shutdown`] or
//! [`Server::close`]. The borrow checker enforces that registration is
//! finished before serving starts.
//!
//! [`shutdown`](Server::shutdown):
//! 1. Immediately stops accepting; the listening socket is released.
//! 2. Asks every open connection to finish its in-flight request and close.
//! 3. Returns once they have, or aborts the stragglers when the deadline
//!    resolves first.
//!
//! [`close`](Server::close) skips step 2 and drops every connection.
//!
//! Whichever of the two runs first performs the transition; every later call
//! to either is a no-op returning success.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::accept;
use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::lifecycle::{ConnSignals, Lifecycle};
use crate::middleware::{self, Middleware, Pipeline};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::static_files;
use crate::tls;

/// Methods covered by [`Server::handle`].
const ANY_METHOD: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PATCH,
    Method::PUT,
    Method::DELETE,
    Method::HEAD,
];

/// The HTTP server.
pub struct Server {
    router: Router,
    middleware: Pipeline,
    lifecycle: Lifecycle,
    local_addr: OnceLock<SocketAddr>,
}

impl Server {
    /// An empty server whose fallback answers `501 Not Implemented`.
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            middleware: Pipeline::default(),
            lifecycle: Lifecycle::default(),
            local_addr: OnceLock::new(),
        }
    }

    // ── Middleware ────────────────────────────────────────────────────────────

    /// Appends a middleware that applies to every route registered after
    /// this call. Middleware runs in registration order.
    pub fn add_middleware(&mut self, mw: impl Middleware) {
        self.add_middleware_with(mw, middleware::Options::new());
    }

    /// Appends a middleware with options, e.g. a path-prefix filter:
    ///
    /// ```rust
    /// use apiserve::{middleware, Server};
    ///
    /// let mut server = Server::new();
    /// server.add_middleware_with(
    ///     middleware::trace,
    ///     middleware::Options::new().path_prefix("/v1/company"),
    /// );
    /// ```
    pub fn add_middleware_with(&mut self, mw: impl Middleware, opts: middleware::Options) {
        self.middleware.push(mw, opts);
        debug!(count = self.middleware.len(), "middleware added");
    }

    // ── Routes ────────────────────────────────────────────────────────────────

    /// Registers `handler` for `method` + `path`, wrapped in every middleware
    /// registered so far whose prefix matches `path`.
    ///
    /// Path parameters use `{name}` syntax and are read with
    /// [`params`](crate::params) or [`Request::param`].
    ///
    /// # Panics
    ///
    /// Panics if `path` is malformed or conflicts with a different pattern
    /// already registered for `method`.
    pub fn route(&mut self, method: Method, path: &str, handler: impl Handler) {
        self.route_boxed(method, path, handler.into_boxed_handler());
    }

    pub fn handle_get(&mut self, path: &str, handler: impl Handler) {
        self.route(Method::GET, path, handler);
    }

    pub fn handle_post(&mut self, path: &str, handler: impl Handler) {
        self.route(Method::POST, path, handler);
    }

    pub fn handle_put(&mut self, path: &str, handler: impl Handler) {
        self.route(Method::PUT, path, handler);
    }

    pub fn handle_delete(&mut self, path: &str, handler: impl Handler) {
        self.route(Method::DELETE, path, handler);
    }

    pub fn handle_options(&mut self, path: &str, handler: impl Handler) {
        self.route(Method::OPTIONS, path, handler);
    }

    /// Registers one handler under GET, POST, PATCH, PUT, DELETE and HEAD.
    pub fn handle(&mut self, path: &str, handler: impl Handler) {
        let handler = handler.into_boxed_handler();
        for method in ANY_METHOD {
            self.route_boxed(method, path, Arc::clone(&handler));
        }
    }

    fn route_boxed(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        let composed = self.middleware.compose(path, handler);
        debug!(%method, path, "route registered");
        self.router.insert(method, path, composed);
    }

    /// Replaces the handler for requests that match no route.
    /// Middleware is not applied to it.
    pub fn set_not_found_handler(&mut self, handler: impl Handler) {
        self.router.set_fallback(handler.into_boxed_handler());
    }

    /// Serves the directory `root` under `url_prefix` for GET requests.
    ///
    /// `serve_files("/static", "./public")` answers `/static/css/site.css`
    /// from `./public/css/site.css`. A directory answers with its
    /// `index.html`, including the mount root `/static/`. Middleware is not
    /// applied.
    pub fn serve_files(&mut self, url_prefix: &str, root: impl Into<PathBuf>) {
        let handler = static_files::dir(root);
        for pattern in static_files::dir_patterns(url_prefix) {
            self.router.insert(Method::GET, &pattern, Arc::clone(&handler));
        }
    }

    /// Serves a single file at `url_path` for GET requests. Middleware is not
    /// applied.
    pub fn serve_file(&mut self, url_path: &str, file: impl Into<PathBuf>) {
        self.router.insert(Method::GET, url_path, static_files::file(file));
    }

    // ── Serving ───────────────────────────────────────────────────────────────

    /// Binds `addr` and serves until the server is shut down or closed.
    ///
    /// Always returns an error: [`Error::ServerClosed`] after a normal stop,
    /// anything else for a transport failure.
    ///
    /// Running out of file descriptors or buffers while accepting is retried
    /// with a growing pause (5 ms doubling to 1 s). Any other accept failure
    /// stops accepting, lets open connections finish their in-flight request,
    /// and is returned as [`Error::Io`]. The server cannot be served again
    /// after that.
    pub async fn listen(&self, addr: impl ToSocketAddrs) -> Error {
        if self.lifecycle.is_closed() {
            return Error::ServerClosed;
        }
        match TcpListener::bind(addr).await {
            Ok(listener) => self.serve(listener).await,
            Err(e) => e.into(),
        }
    }

    /// Like [`listen`](Server::listen), terminating TLS with the PEM
    /// certificate chain and private key at the given paths.
    pub async fn listen_tls(
        &self,
        addr: impl ToSocketAddrs,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Error {
        if self.lifecycle.is_closed() {
            return Error::ServerClosed;
        }
        let acceptor = match tls::load_acceptor(&cert_path.into(), &key_path.into()).await {
            Ok(a) => a,
            Err(e) => return e,
        };
        match TcpListener::bind(addr).await {
            Ok(listener) => self.accept_loop(listener, Some(acceptor)).await,
            Err(e) => e.into(),
        }
    }

    /// Serves on an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Error {
        self.accept_loop(listener, None).await
    }

    /// Serves TLS on an already-bound listener.
    pub async fn serve_tls(
        &self,
        listener: TcpListener,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Error {
        match tls::load_acceptor(&cert_path.into(), &key_path.into()).await {
            Ok(acceptor) => self.accept_loop(listener, Some(acceptor)).await,
            Err(e) => e,
        }
    }

    async fn accept_loop(&self, listener: TcpListener, tls: Option<TlsAcceptor>) -> Error {
        let _drained = match self.lifecycle.begin_serving() {
            Ok(guard) => guard,
            Err(e) => return e,
        };

        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => return e.into(),
        };
        let _ = self.local_addr.set(addr);

        // Routes are frozen here. Handlers are `Arc`s, so the copy is shallow.
        let router = Arc::new(self.router.clone());
        let signals = self.lifecycle.signals().scoped();

        info!(%addr, tls = tls.is_some(), routes = router.len(), "listening");

        let mut tasks = JoinSet::new();
        let mut backoff = accept::Backoff::default();
        let mut failure = None;

        loop {
            tokio::select! {
                // Check the stop signal first so a shutdown immediately stops
                // accepting, even if more connections are queued.
                biased;

                () = signals.stop.cancelled() => {
                    info!(in_flight = tasks.len(), "stopped accepting, draining connections");
                    break;
                }

                res = listener.accept() => match res {
                    Ok((stream, peer)) => {
                        backoff.reset();
                        tasks.spawn(connection(
                            stream,
                            peer,
                            Arc::clone(&router),
                            tls.clone(),
                            signals.clone(),
                        ));
                    }
                    Err(e) if accept::is_transient(&e) => {
                        let delay = backoff.next_delay();
                        warn!(retry_in = ?delay, "accept error: {e}");
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            () = signals.stop.cancelled() => {}
                        }
                    }
                    Err(e) => {
                        error!(in_flight = tasks.len(), "accept failed, draining connections: {e}");
                        signals.stop.cancel();
                        failure = Some(e);
                        break;
                    }
                },

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);

        let aborted = tokio::select! {
            () = drain(&mut tasks) => false,
            () = signals.abort.cancelled() => true,
        };
        if aborted {
            warn!(open = tasks.len(), "aborting open connections");
            tasks.shutdown().await;
        }

        info!("server stopped");
        match failure {
            Some(e) => Error::Io(e),
            None => Error::ServerClosed,
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────

    /// Gracefully shuts the server down.
    ///
    /// Stops accepting, lets in-flight requests finish, and returns once every
    /// connection is closed. If `deadline` resolves first the remaining
    /// connections are aborted and [`Error::ShutdownTimeout`] is returned.
    ///
    /// ```rust,no_run
    /// # async fn stop(server: &apiserve::Server) -> Result<(), apiserve::Error> {
    /// use std::time::Duration;
    /// server.shutdown(tokio::time::sleep(Duration::from_secs(10))).await
    /// # }
    /// ```
    pub async fn shutdown(&self, deadline: impl Future<Output = ()>) -> Result<(), Error> {
        if !self.lifecycle.close_once() {
            return Ok(());
        }
        info!("graceful shutdown requested");
        self.lifecycle.stop_accepting();

        if !self.lifecycle.is_serving() {
            return Ok(());
        }

        tokio::select! {
            () = self.lifecycle.drained() => Ok(()),
            () = deadline => {
                let open = self.lifecycle.signals().open_connections();
                warn!(open, "shutdown deadline exceeded");
                self.lifecycle.abort_connections();
                Err(Error::ShutdownTimeout(open))
            }
        }
    }

    /// Closes the server immediately, dropping every open connection.
    ///
    /// Returns once the listening socket is released; in-flight requests are
    /// cancelled, not awaited. Releasing a tokio listener cannot fail, so the
    /// result is always `Ok` today.
    pub async fn close(&self) -> Result<(), Error> {
        if !self.lifecycle.close_once() {
            return Ok(());
        }
        info!("closing server");
        self.lifecycle.abort_connections();

        if self.lifecycle.is_serving() {
            self.lifecycle.drained().await;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    /// The bound address, once a serve call has started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }
}

impl Default for Server {
    fn default() -> Self { Self::new() }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while tasks.join_next().await.is_some() {}
}

// ── Connections ───────────────────────────────────────────────────────────────

async fn connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
    tls: Option<TlsAcceptor>,
    signals: ConnSignals,
) {
    let _open = signals.track();

    let Some(acceptor) = tls else {
        return drive(TokioIo::new(stream), peer, router, &signals).await;
    };

    let handshake = tokio::select! {
        res = acceptor.accept(stream) => res,
        () = signals.abort.cancelled() => return,
    };
    match handshake {
        Ok(stream) => drive(TokioIo::new(stream), peer, router, &signals).await,
        Err(e) => debug!(%peer, "tls handshake failed: {e}"),
    }
}

/// Runs one HTTP/1.1 or HTTP/2 connection until the client goes away, the
/// server stops (after the in-flight request), or the server is closed.
async fn drive<I>(io: TokioIo<I>, peer: SocketAddr, router: Arc<Router>, signals: &ConnSignals)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let root = signals.abort.clone();
    // Called once per request on the connection, not once per connection.
    let svc = service_fn(move |req| dispatch(Arc::clone(&router), req, peer, root.clone()));

    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(io, svc);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            biased;

            () = signals.abort.cancelled() => {
                debug!(%peer, "connection aborted");
                return;
            }

            () = signals.stop.cancelled(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }

            res = conn.as_mut() => {
                if let Err(e) = res {
                    debug!(%peer, "connection error: {e}");
                }
                return;
            }
        }
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers the body, roots the request context in the server's hard-close
/// token, and hands the request to the route table.
///
/// The error type is [`Infallible`]: every failure becomes a response.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
    root: CancellationToken,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(%peer, "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let mut req = Request::new(parts.method, parts.uri, parts.headers, body).with_remote_addr(peer);
    req.set_context(Context::child_of(&root));

    Ok(router.dispatch(req).await.into_inner())
}
