//! Server lifecycle signals.
//!
//! ```text
//! unbound ──listen──▶ serving ──shutdown / close──▶ closed
//!    └───────────────shutdown / close─────────────────▲
//! ```
//!
//! The closed transition is a compare-and-swap: exactly one caller of
//! `shutdown`/`close` performs it, every other caller observes it as done.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::Error;

#[derive(Default)]
pub(crate) struct Lifecycle {
    closed: AtomicBool,
    serving: AtomicBool,
    signals: ConnSignals,
    /// Cancelled by the accept loop once its listener is released and every
    /// connection task has ended.
    drained: CancellationToken,
}

impl Lifecycle {
    /// Performs the open → closed transition. Returns `false` if another
    /// caller already did.
    pub(crate) fn close_once(&self) -> bool {
        self.closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn is_serving(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }

    /// Claims the single serving slot.
    ///
    /// On success the returned guard marks the server drained when dropped,
    /// so it must live exactly as long as the accept loop.
    pub(crate) fn begin_serving(&self) -> Result<DropGuard, Error> {
        if self.is_closed() {
            return Err(Error::ServerClosed);
        }
        if self
            .serving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyServing);
        }
        Ok(self.drained.clone().drop_guard())
    }

    pub(crate) fn signals(&self) -> &ConnSignals {
        &self.signals
    }

    pub(crate) async fn drained(&self) {
        self.drained.cancelled().await;
    }

    pub(crate) fn stop_accepting(&self) {
        self.signals.stop.cancel();
    }

    pub(crate) fn abort_connections(&self) {
        self.signals.stop.cancel();
        self.signals.abort.cancel();
    }
}

/// What each connection task needs to observe the lifecycle.
#[derive(Clone, Default)]
pub(crate) struct ConnSignals {
    /// Graceful: stop accepting, finish the in-flight request, then close.
    pub(crate) stop: CancellationToken,
    /// Hard: drop the connection now. Also the root of every request
    /// [`Context`](crate::Context).
    pub(crate) abort: CancellationToken,
    open: Arc<AtomicUsize>,
}

impl ConnSignals {
    pub(crate) fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Signals for one serve call: its own stop token, cancelled with the
    /// server's but also on its own when the accept loop fails.
    pub(crate) fn scoped(&self) -> Self {
        Self {
            stop: self.stop.child_token(),
            abort: self.abort.clone(),
            open: Arc::clone(&self.open),
        }
    }

    /// Counts a connection as open until the returned guard drops.
    pub(crate) fn track(&self) -> ConnGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        ConnGuard(Arc::clone(&self.open))
    }
}

pub(crate) struct ConnGuard(Arc<AtomicUsize>);

impl Drop for ConnGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
