//! Unified error type.

use std::path::PathBuf;

use thiserror::Error;

/// The error type returned by apiserve's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: binding a port, loading TLS material, or a
/// lifecycle transition that could not complete.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls: {0}")]
    Tls(#[from] rustls::Error),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    /// Returned by every `listen*` / `serve*` call once the server stops
    /// because [`shutdown`](crate::Server::shutdown) or
    /// [`close`](crate::Server::close) was called.
    #[error("server closed")]
    ServerClosed,

    #[error("server is already serving")]
    AlreadyServing,

    /// The shutdown deadline resolved before every in-flight request finished.
    /// The remaining connections have been aborted.
    #[error("shutdown deadline exceeded with {0} connection(s) still open")]
    ShutdownTimeout(usize),
}

impl Error {
    /// `true` for the normal end of a serve call.
    pub fn is_server_closed(&self) -> bool {
        matches!(self, Self::ServerClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_closed_is_distinguishable() {
        assert!(Error::ServerClosed.is_server_closed());
        assert!(!Error::AlreadyServing.is_server_closed());
        let io = Error::from(std::io::Error::from(std::io::ErrorKind::AddrInUse));
        assert!(!io.is_server_closed());
    }

    #[test]
    fn display_includes_detail() {
        let e = Error::NoPrivateKey(PathBuf::from("/etc/tls/key.pem"));
        assert!(e.to_string().contains("/etc/tls/key.pem"));
        assert_eq!(Error::ShutdownTimeout(3).to_string(), "shutdown deadline exceeded with 3 connection(s) still open");
    }
}
