use core::fmt;
use std::cell::Cell;
use std::rc::Rc;

use super::Deferred;
use crate::Error;

/// What a handler or executor produces: a resolution, or a reason to reject.
pub type Outcome<T> = Result<Resolution<T>, Error>;

/// A value that settles a [`Deferred`]: either a plain value, or a
/// [`Continuable`] whose eventual outcome is adopted.
pub enum Resolution<T> {
    /// A plain value. The deferred fulfills with it immediately.
    Value(T),
    /// A value exposing a chain operation. The deferred adopts its outcome.
    Continuable(Box<dyn Continuable<T>>),
}

impl<T> Resolution<T> {
    /// Wrap any continuable.
    pub fn adopt(continuable: impl Continuable<T> + 'static) -> Self {
        Self::Continuable(Box::new(continuable))
    }
}

impl<T: Clone + 'static> From<Deferred<T>> for Resolution<T> {
    fn from(deferred: Deferred<T>) -> Self {
        Self::Continuable(Box::new(deferred))
    }
}

impl<T> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Resolution::Value(..)"),
            Self::Continuable(_) => f.write_str("Resolution::Continuable(..)"),
        }
    }
}

/// The capability of registering continuations, shared by [`Deferred`] and
/// any foreign "thenable" a deferred may be resolved with.
///
/// Whether a resolution is adopted is decided by this capability, never by
/// the concrete type behind it.
///
/// # Examples
///
/// ```
/// use deferred_concurrency::{runtime, Continuable, Deferred, Error, Resolution, Resolver};
///
/// struct Answer;
///
/// impl Continuable<u32> for Answer {
///     fn chain_into(self: Box<Self>, resolver: Resolver<u32>) -> Result<(), Error> {
///         resolver.fulfill(42);
///         Ok(())
///     }
/// }
///
/// let deferred: Deferred<u32> = Deferred::resolve(Resolution::adopt(Answer));
/// assert_eq!(runtime::block_on(deferred).unwrap().unwrap(), 42);
/// ```
pub trait Continuable<T> {
    /// Register `resolver` to be settled with this value's eventual outcome.
    ///
    /// Only the first settlement through `resolver` has an effect. Returning
    /// `Err` rejects the adopting deferred, unless it was settled already.
    fn chain_into(self: Box<Self>, resolver: Resolver<T>) -> Result<(), Error>;

    /// The deferred behind this continuable, if any. Used to detect adoption
    /// cycles.
    fn as_deferred(&self) -> Option<&Deferred<T>> {
        None
    }
}

/// The settle functions of a [`Deferred`].
///
/// A resolver may be cloned and moved into callbacks freely. All clones share
/// one flag: the first call to [`resolve`](Resolver::resolve),
/// [`fulfill`](Resolver::fulfill) or [`reject`](Resolver::reject) wins and
/// every later call is ignored.
pub struct Resolver<T> {
    target: Deferred<T>,
    done: Rc<Cell<bool>>,
}

impl<T: Clone + 'static> Resolver<T> {
    pub(crate) fn new(target: Deferred<T>) -> Self {
        Self {
            target,
            done: Rc::new(Cell::new(false)),
        }
    }

    /// Resolve with a plain value or a continuable to adopt.
    pub fn resolve(&self, resolution: impl Into<Resolution<T>>) {
        if self.done.replace(true) {
            return;
        }
        self.target.resolve_with(resolution.into());
    }

    /// Fulfill with a plain value.
    pub fn fulfill(&self, value: T) {
        self.resolve(Resolution::Value(value));
    }

    /// Reject with `reason`.
    pub fn reject(&self, reason: impl Into<Error>) {
        if self.done.replace(true) {
            return;
        }
        self.target.settle(Err(reason.into()));
    }

    /// Whether any clone of this resolver was used already.
    pub fn is_done(&self) -> bool {
        self.done.get()
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            done: self.done.clone(),
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("target", &self.target)
            .field("done", &self.done.get())
            .finish()
    }
}
