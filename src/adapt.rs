//! Lift error-first callback APIs into deferred values.
//!
//! # Examples
//!
//! ```
//! use deferred_concurrency::{adapt, runtime, Callback, Error};
//! use std::time::Duration;
//!
//! fn do_async(val: u32, callback: Callback<u32>) -> Result<(), Error> {
//!     let error = (val == 0).then(|| Error::msg("Error message!"));
//!     runtime::set_timeout(Duration::from_millis(50), move || callback.call(error, val));
//!     Ok(())
//! }
//!
//! let lifted = adapt(do_async);
//! assert_eq!(runtime::block_on(lifted(1)).unwrap().unwrap(), 1);
//!
//! let err = runtime::block_on(lifted(0)).unwrap().unwrap_err();
//! assert_eq!(err.to_string(), "Error message!");
//! ```

use core::fmt;

use crate::{Deferred, Error, Resolver};

/// The completion callback handed to an adapted function.
///
/// Only the first invocation has an effect. Later invocations, from the same
/// handle or a clone, are ignored.
pub struct Callback<T> {
    resolver: Resolver<T>,
}

impl<T: Clone + 'static> Callback<T> {
    /// Complete error-first: a present `error` rejects, otherwise `result`
    /// fulfills.
    pub fn call(&self, error: Option<Error>, result: T) {
        match error {
            Some(error) => self.resolver.reject(error),
            None => self.resolver.fulfill(result),
        }
    }

    /// Complete with a `Result`.
    pub fn complete(&self, result: Result<T, Error>) {
        match result {
            Ok(value) => self.resolver.fulfill(value),
            Err(error) => self.resolver.reject(error),
        }
    }

    /// Whether this callback was invoked already.
    pub fn is_done(&self) -> bool {
        self.resolver.is_done()
    }
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<T> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("resolver", &self.resolver)
            .finish()
    }
}

/// Wrap a function taking a trailing error-first callback into one returning
/// a [`Deferred`].
///
/// Arguments are passed through as a single value; use a tuple for several.
/// If `f` itself returns `Err` the deferred is rejected with it.
pub fn adapt<A, T, F>(f: F) -> impl Fn(A) -> Deferred<T>
where
    T: Clone + 'static,
    F: Fn(A, Callback<T>) -> Result<(), Error>,
{
    move |args| Deferred::new(|resolver| f(args, Callback { resolver }))
}
