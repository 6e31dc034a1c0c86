use core::fmt;
use core::future::IntoFuture;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::cell::RefCell;
use std::rc::Rc;

use futures_core::future::FusedFuture;
use futures_core::Future;

use super::Deferred;
use crate::Error;

/// A future resolving to the outcome of a [`Deferred`].
///
/// This `struct` is created by the [`IntoFuture`] implementation of
/// [`Deferred`]. Awaiting a deferred counts as handling its rejection.
///
/// The future only makes progress while the [`runtime`](crate::runtime) loop
/// runs, for example inside [`runtime::block_on`](crate::runtime::block_on).
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Settlement<T> {
    deferred: Deferred<T>,
    waker: Rc<RefCell<Option<Waker>>>,
    subscribed: bool,
    done: bool,
}

impl<T> fmt::Debug for Settlement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settlement")
            .field("deferred", &self.deferred)
            .field("done", &self.done)
            .finish()
    }
}

impl<T: Clone + 'static> Future for Settlement<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        assert!(!this.done, "Settlement should not be polled after completion");

        this.deferred.mark_handled();
        if let Some(outcome) = this.deferred.peek() {
            this.done = true;
            return Poll::Ready(outcome);
        }

        *this.waker.borrow_mut() = Some(cx.waker().clone());
        if !this.subscribed {
            this.subscribed = true;
            let waker = this.waker.clone();
            this.deferred.subscribe(move |_| {
                if let Some(waker) = waker.borrow_mut().take() {
                    waker.wake();
                }
            });
        }
        Poll::Pending
    }
}

impl<T: Clone + 'static> FusedFuture for Settlement<T> {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

impl<T: Clone + 'static> IntoFuture for Deferred<T> {
    type Output = Result<T, Error>;
    type IntoFuture = Settlement<T>;

    fn into_future(self) -> Self::IntoFuture {
        Settlement {
            deferred: self,
            waker: Rc::new(RefCell::new(None)),
            subscribed: false,
            done: false,
        }
    }
}
