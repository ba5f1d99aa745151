//! Request-scoped context.
//!
//! Every request carries a [`Context`]: a cancellation token derived from the
//! server's hard-close signal plus a bag of typed bindings. Bindings are keyed
//! by Rust type, so a module that keeps its key type private owns its slot and
//! nothing else can read or overwrite it. Path parameters live in such a slot
//! (see [`params`](crate::params)).

use std::sync::Arc;

use http::Extensions;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cancellation-aware, immutable request context.
///
/// Deriving a child with [`with_value`](Context::with_value) never changes the
/// parent; bindings are shared behind an `Arc` and copied only on write.
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    values: Arc<Extensions>,
}

impl Context {
    /// A root context that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// A root context cancelled together with `parent`.
    pub(crate) fn child_of(parent: &CancellationToken) -> Self {
        Self { token: parent.child_token(), values: Arc::default() }
    }

    /// Returns a derived context that additionally carries `value`.
    ///
    /// A binding of the same type in the parent is shadowed, not mutated.
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut values = (*self.values).clone();
        values.insert(value);
        Self { token: self.token.clone(), values: Arc::new(values) }
    }

    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the server is force-closed.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct RequestId(u64);

    #[test]
    fn child_does_not_mutate_parent() {
        let root = Context::background();
        let child = root.with_value(RequestId(7));

        assert_eq!(child.value::<RequestId>(), Some(&RequestId(7)));
        assert_eq!(root.value::<RequestId>(), None);

        let shadowed = child.with_value(RequestId(8));
        assert_eq!(shadowed.value::<RequestId>(), Some(&RequestId(8)));
        assert_eq!(child.value::<RequestId>(), Some(&RequestId(7)));
    }

    #[test]
    fn follows_parent_cancellation() {
        let parent = CancellationToken::new();
        let ctx = Context::child_of(&parent).with_value(RequestId(1));
        assert!(!ctx.is_cancelled());
        parent.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn background_is_never_cancelled() {
        assert!(!Context::background().is_cancelled());
    }
}
