use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll, Waker},
};

use parking_lot::Mutex;

/// Cooperative cancellation signal shared between a caller and in-flight
/// requests. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    inner: Arc<CancellationState>,
}

#[derive(Debug, Default)]
struct CancellationState {
    flag: AtomicBool,
    wakers: Mutex<Vec<Waker>>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Marks the token as cancelled and wakes every pending [Cancelled]
    /// future. Returns `true` only for the call that actually flipped the flag.
    pub fn cancel(&self) -> bool {
        let first = self
            .inner
            .flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            let wakers = std::mem::take(&mut *self.inner.wakers.lock());
            for waker in wakers {
                waker.wake();
            }
        }
        first
    }

    /// A future that completes once the token is cancelled.
    pub fn cancelled(&self) -> Cancelled<'_> {
        Cancelled { token: self }
    }
}

pub struct Cancelled<'a> {
    token: &'a Cancellation,
}

impl Future for Cancelled<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.token.is_cancelled() {
            return Poll::Ready(());
        }
        let mut wakers = self.token.inner.wakers.lock();
        // checked again under the lock so a concurrent cancel() cannot slip in between
        if self.token.is_cancelled() {
            return Poll::Ready(());
        }
        if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
            wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use futures::{FutureExt, future};
    use test_log::test;

    use super::*;

    #[test]
    fn cancel_flips_once() {
        let token = Cancellation::new();
        let child = token.clone();
        assert!(!child.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(child.is_cancelled());
    }

    #[test]
    fn cancelled_future_is_pending_until_cancel() {
        let token = Cancellation::new();
        assert!(token.cancelled().now_or_never().is_none());
        token.cancel();
        assert!(token.cancelled().now_or_never().is_some());
    }

    #[test(tokio::test)]
    async fn pending_future_is_woken() {
        let token = Cancellation::new();
        let remote = token.clone();
        let waiter = async { token.cancelled().await };
        let canceller = async move {
            tokio::task::yield_now().await;
            remote.cancel();
        };
        future::join(waiter, canceller).await;
        assert!(token.is_cancelled());
    }
}
