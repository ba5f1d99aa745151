//! Accept-error policy for the listening socket.
//!
//! Some `accept` failures say nothing about the listener itself: the peer
//! hung up before the handshake finished, or the process ran out of file
//! descriptors or buffers. Those are retried after a pause that doubles from
//! 5 ms up to 1 s and resets on the next successful accept. Anything else
//! ends the serve call.

use std::io;
use std::time::Duration;

const MIN_DELAY: Duration = Duration::from_millis(5);
const MAX_DELAY: Duration = Duration::from_secs(1);

/// Whether `accept` should be retried after `err`.
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::OutOfMemory
    ) || err.raw_os_error().is_some_and(is_resource_exhaustion)
}

#[cfg(unix)]
fn is_resource_exhaustion(code: i32) -> bool {
    matches!(code, libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
}

#[cfg(not(unix))]
fn is_resource_exhaustion(_code: i32) -> bool {
    false
}

/// Delay between retries of a failing `accept`.
#[derive(Debug, Default)]
pub(crate) struct Backoff {
    current: Option<Duration>,
}

impl Backoff {
    /// The pause before the next retry.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current.map_or(MIN_DELAY, |d| (d * 2).min(MAX_DELAY));
        self.current = Some(delay);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.current = None;
    }
}
