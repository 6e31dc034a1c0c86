use crate::{Deferred, Resolution, Resolver};

pub(crate) mod vec;

/// Wait for the first item to settle, either way.
///
/// All items run concurrently and none is cancelled. The returned deferred
/// takes the outcome of whichever item settles first, fulfilled or rejected.
/// An empty input never settles.
pub trait Race {
    /// The value each item resolves to.
    type Output;

    /// Wait for the first item to settle.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred_concurrency::prelude::*;
    /// use deferred_concurrency::{runtime, Deferred, Resolution};
    ///
    /// let first = vec![Deferred::<u32>::rejected("nope").into(), Resolution::Value(42)].race();
    ///
    /// let err = runtime::block_on(first).unwrap().unwrap_err();
    /// assert_eq!(err.to_string(), "nope");
    /// ```
    fn race(self) -> Deferred<Self::Output>;
}

/// Wait for the first of `items` to settle. See [`Race`].
pub fn race<I, T>(items: I) -> Deferred<T>
where
    I: IntoIterator<Item = Resolution<T>>,
    T: Clone + 'static,
{
    let result = Deferred::pending();
    let resolver = Resolver::new(result.clone());
    for item in items {
        let resolver = resolver.clone();
        Deferred::resolve(item).subscribe(move |settled| match settled {
            Ok(value) => resolver.fulfill(value),
            Err(reason) => resolver.reject(reason),
        });
    }
    result
}
