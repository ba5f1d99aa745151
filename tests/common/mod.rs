//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use apiserve::{Error, Server};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A running server on an ephemeral loopback port.
pub struct Running {
    pub server: Arc<Server>,
    pub addr: SocketAddr,
    pub serve: JoinHandle<Error>,
}

/// Binds `127.0.0.1:0` and serves `server` on a background task.
pub async fn start(server: Server) -> Running {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(server);
    let serving = Arc::clone(&server);
    let serve = tokio::spawn(async move { serving.serve(listener).await });
    Running { server, addr, serve }
}

/// A parsed HTTP/1.1 response.
pub struct Reply {
    pub status: u16,
    pub head: String,
    pub body: String,
}

/// Sends one request with `Connection: close` and reads the whole response.
pub async fn send(addr: SocketAddr, method: &str, path: &str) -> std::io::Result<Reply> {
    send_with_body(addr, method, path, "").await
}

pub async fn send_with_body(
    addr: SocketAddr,
    method: &str,
    path: &str,
    body: &str,
) -> std::io::Result<Reply> {
    let stream = TcpStream::connect(addr).await?;
    exchange(stream, method, path, body).await
}

/// Writes one `Connection: close` request to `stream` and reads the response
/// until the server hangs up.
pub async fn exchange<S>(mut stream: S, method: &str, path: &str, body: &str) -> std::io::Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut raw))
        .await
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))?;
    match read {
        Ok(_) => {}
        // a TLS peer may hang up without close_notify once the body is out
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && !raw.is_empty() => {}
        Err(e) => return Err(e),
    }

    parse(&raw)
}

fn parse(raw: &[u8]) -> std::io::Result<Reply> {
    let text = String::from_utf8_lossy(raw);
    let (head, body) = text
        .split_once("\r\n\r\n")
        .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::UnexpectedEof))?;
    let status = head
        .split(' ')
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::InvalidData))?;
    Ok(Reply { status, head: head.to_owned(), body: body.to_owned() })
}

/// Waits until a background serve call has bound its socket.
pub async fn bound_addr(server: &Server) -> SocketAddr {
    loop {
        if let Some(addr) = server.local_addr() {
            return addr;
        }
        tokio::task::yield_now().await;
    }
}

/// A deadline that effectively never fires.
pub fn no_deadline() -> tokio::time::Sleep {
    tokio::time::sleep(Duration::from_secs(30))
}
