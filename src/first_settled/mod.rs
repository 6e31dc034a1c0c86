use core::mem;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::AggregateError;
use crate::{Deferred, Error, Resolution, Resolver};

pub(crate) mod vec;

/// Wait for the first item to fulfill.
///
/// All items run concurrently. The returned deferred fulfills with the value of
/// whichever item fulfills first in time, regardless of its position. Items are
/// never cancelled: the losers run to completion and their outcomes are
/// discarded. Only when every item rejected does the result reject, with an
/// [`Error::Aggregate`] holding every reason in the order the items rejected.
///
/// Plain values count as already fulfilled, so they win over any item that
/// needs a turn of the loop to settle. Among items settled before the first
/// turn, the earliest in the input wins.
///
/// An empty input rejects with [`Error::NoCandidates`].
pub trait FirstSettled {
    /// The value each item resolves to.
    type Output;

    /// Wait for the first item to fulfill.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred_concurrency::prelude::*;
    /// use deferred_concurrency::{runtime, Deferred, Resolution};
    ///
    /// let first = vec![
    ///     Deferred::<u32>::rejected("nope").into(),
    ///     Resolution::Value(42),
    /// ]
    /// .first_settled();
    ///
    /// assert_eq!(runtime::block_on(first).unwrap().unwrap(), 42);
    /// ```
    fn first_settled(self) -> Deferred<Self::Output>;
}

struct Failures {
    remaining: usize,
    reasons: Vec<Error>,
}

/// Wait for the first of `items` to fulfill. See [`FirstSettled`].
pub fn first_settled<I, T>(items: I) -> Deferred<T>
where
    I: IntoIterator<Item = Resolution<T>>,
    T: Clone + 'static,
{
    let result = Deferred::pending();
    let resolver = Resolver::new(result.clone());
    let candidates: Vec<Deferred<T>> = items.into_iter().map(Deferred::resolve).collect();
    if candidates.is_empty() {
        resolver.reject(Error::NoCandidates);
        return result;
    }

    let failures = Rc::new(RefCell::new(Failures {
        remaining: candidates.len(),
        reasons: Vec::with_capacity(candidates.len()),
    }));
    for candidate in candidates {
        let resolver = resolver.clone();
        let failures = failures.clone();
        candidate.subscribe(move |settled| match settled {
            Ok(value) => resolver.fulfill(value),
            Err(reason) => {
                let mut failures = failures.borrow_mut();
                failures.remaining -= 1;
                if resolver.is_done() {
                    return;
                }
                failures.reasons.push(reason);
                if failures.remaining == 0 {
                    let reasons = mem::take(&mut failures.reasons);
                    tracing::debug!(count = reasons.len(), "every candidate rejected");
                    resolver.reject(Error::Aggregate(AggregateError::new(reasons)));
                }
            }
        });
    }
    result
}
