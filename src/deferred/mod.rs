//! Single-assignment deferred values.
//!
//! A [`Deferred`] is a handle to a cell that is eventually fulfilled with a
//! value or rejected with an [`Error`]. Continuations registered with
//! [`then`](Deferred::then), [`catch`](Deferred::catch) and
//! [`chain`](Deferred::chain) each produce a new deferred, and always run from
//! the high-priority queue of the [`runtime`](crate::runtime), never inline.
//!
//! # Examples
//!
//! ```
//! use deferred_concurrency::{runtime, Deferred, Resolution};
//!
//! let doubled = Deferred::resolved(21).then(|v| Ok(Resolution::Value(v * 2)));
//! assert_eq!(runtime::block_on(doubled).unwrap().unwrap(), 42);
//! ```
//!
//! # States
//!
//! A deferred starts out pending. Resolving it with a plain value fulfills it
//! on the spot; resolving it with a [`Continuable`] moves it into a settling
//! state in which it follows the continuable's eventual outcome. Rejecting it
//! is always immediate. Once fulfilled or rejected, a deferred never changes
//! again.

use core::fmt;
use core::mem;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::runtime;
use crate::Error;

pub use resolution::{Continuable, Outcome, Resolution, Resolver};
pub use settlement::Settlement;

mod resolution;
mod settlement;

type Reaction<T> = Box<dyn FnOnce(Result<T, Error>)>;

enum State<T> {
    Pending,
    /// Following the outcome of a continuable.
    Settling,
    Fulfilled(T),
    Rejected(Error),
}

struct Inner<T> {
    state: State<T>,
    // Most values are chained exactly once.
    reactions: SmallVec<[Reaction<T>; 1]>,
    /// The deferred currently being adopted, if any.
    adopting: Option<Weak<RefCell<Inner<T>>>>,
    handled: Rc<Cell<bool>>,
}

impl<T> Inner<T> {
    fn is_settled(&self) -> bool {
        matches!(self.state, State::Fulfilled(_) | State::Rejected(_))
    }
}

impl<T: Clone> Inner<T> {
    fn outcome(&self) -> Option<Result<T, Error>> {
        match &self.state {
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
            State::Pending | State::Settling => None,
        }
    }
}

/// A value that will be available eventually, or a reason why it never will.
///
/// `Deferred` is a cheap handle: clones refer to the same cell. Compare
/// handles with [`ptr_eq`](Deferred::ptr_eq).
pub struct Deferred<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T: Clone + 'static> Deferred<T> {
    /// Create a new deferred, handing its [`Resolver`] to `executor`.
    ///
    /// The executor runs synchronously. If it returns `Err` the deferred is
    /// rejected with that reason, unless the executor settled it first.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred_concurrency::{runtime, Deferred};
    /// use std::time::Duration;
    ///
    /// let later = Deferred::new(|resolver| {
    ///     runtime::set_timeout(Duration::from_millis(10), move || resolver.fulfill("done"));
    ///     Ok(())
    /// });
    /// assert!(later.is_pending());
    ///
    /// runtime::run_until_idle();
    /// assert_eq!(later.peek().unwrap().unwrap(), "done");
    /// ```
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver<T>) -> Result<(), Error>,
    {
        let deferred = Self::pending();
        let resolver = Resolver::new(deferred.clone());
        if let Err(reason) = executor(resolver.clone()) {
            resolver.reject(reason);
        }
        deferred
    }

    /// Create a deferred that is already fulfilled with `value`.
    pub fn resolved(value: T) -> Self {
        let deferred = Self::pending();
        deferred.settle(Ok(value));
        deferred
    }

    /// Create a deferred that is already rejected with `reason`.
    pub fn rejected(reason: impl Into<Error>) -> Self {
        let deferred = Self::pending();
        deferred.settle(Err(reason.into()));
        deferred
    }

    /// Normalize a resolution into a deferred.
    ///
    /// A deferred is returned as is, a plain value becomes a fulfilled
    /// deferred, and any other continuable is adopted by a new deferred.
    pub fn resolve(resolution: impl Into<Resolution<T>>) -> Self {
        match resolution.into() {
            Resolution::Value(value) => Self::resolved(value),
            Resolution::Continuable(continuable) => {
                if let Some(deferred) = continuable.as_deferred() {
                    return deferred.clone();
                }
                let deferred = Self::pending();
                deferred.adopt(continuable);
                deferred
            }
        }
    }

    /// Run `f` and turn its outcome into a deferred.
    ///
    /// Errors returned by `f` become rejections, so callers only ever have to
    /// handle failure asynchronously.
    pub fn attempt<F>(f: F) -> Self
    where
        F: FnOnce() -> Outcome<T>,
    {
        match f() {
            Ok(resolution) => Self::resolve(resolution),
            Err(reason) => Self::rejected(reason),
        }
    }

    /// Register both a success and a failure handler.
    ///
    /// Exactly one of the handlers runs, chosen by this deferred's outcome. The
    /// returned deferred follows whatever the handler produces: a plain value,
    /// a continuable to adopt, or an `Err` to reject with.
    pub fn chain<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Deferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Outcome<U> + 'static,
        R: FnOnce(Error) -> Outcome<U> + 'static,
    {
        self.react(move |settled| match settled {
            Ok(value) => on_fulfilled(value),
            Err(reason) => on_rejected(reason),
        })
    }

    /// Register a success handler. Rejections pass through unchanged.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Deferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Outcome<U> + 'static,
    {
        self.react(move |settled| match settled {
            Ok(value) => on_fulfilled(value),
            Err(reason) => Err(reason),
        })
    }

    /// Register a failure handler. Values pass through unchanged.
    pub fn catch<R>(&self, on_rejected: R) -> Deferred<T>
    where
        R: FnOnce(Error) -> Outcome<T> + 'static,
    {
        self.react(move |settled| match settled {
            Ok(value) => Ok(Resolution::Value(value)),
            Err(reason) => on_rejected(reason),
        })
    }

    /// Transform the value with a plain function.
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.then(move |value| Ok(Resolution::Value(f(value))))
    }

    /// Run `f` once this deferred settles, either way.
    ///
    /// The returned deferred carries the original outcome, unless `f` fails.
    pub fn finally<F>(&self, f: F) -> Deferred<T>
    where
        F: FnOnce() -> Result<(), Error> + 'static,
    {
        self.react(move |settled| {
            f()?;
            settled.map(Resolution::Value)
        })
    }

    /// Whether this deferred has not been fulfilled or rejected yet. A
    /// deferred that is adopting another value counts as pending.
    pub fn is_pending(&self) -> bool {
        !self.is_settled()
    }

    /// Whether this deferred has been fulfilled or rejected.
    pub fn is_settled(&self) -> bool {
        self.inner.borrow().is_settled()
    }

    /// The outcome, if settled. Peeking does not count as handling a
    /// rejection.
    pub fn peek(&self) -> Option<Result<T, Error>> {
        self.inner.borrow().outcome()
    }

    pub(crate) fn pending() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Pending,
                reactions: SmallVec::new(),
                adopting: None,
                handled: Rc::new(Cell::new(false)),
            })),
        }
    }

    /// Register a reaction producing the outcome of a new deferred.
    fn react<U, H>(&self, handler: H) -> Deferred<U>
    where
        U: Clone + 'static,
        H: FnOnce(Result<T, Error>) -> Outcome<U> + 'static,
    {
        let downstream = Deferred::pending();
        let target = downstream.clone();
        self.subscribe(move |settled| match handler(settled) {
            Ok(resolution) => target.resolve_with(resolution),
            Err(reason) => target.settle(Err(reason)),
        });
        downstream
    }

    /// Register a raw reaction. It runs from the high-priority queue, even if
    /// this deferred is settled already.
    pub(crate) fn subscribe(&self, reaction: impl FnOnce(Result<T, Error>) + 'static) {
        let mut inner = self.inner.borrow_mut();
        inner.handled.set(true);
        match inner.outcome() {
            Some(settled) => {
                drop(inner);
                runtime::queue_microtask(move || reaction(settled));
            }
            None => inner.reactions.push(Box::new(reaction)),
        }
    }

    pub(crate) fn mark_handled(&self) {
        self.inner.borrow().handled.set(true);
    }

    pub(crate) fn resolve_with(&self, resolution: Resolution<T>) {
        match resolution {
            Resolution::Value(value) => self.settle(Ok(value)),
            Resolution::Continuable(continuable) => self.adopt(continuable),
        }
    }

    /// Settle with `outcome`. Has no effect on a settled deferred.
    pub(crate) fn settle(&self, outcome: Result<T, Error>) {
        let reactions = {
            let mut inner = self.inner.borrow_mut();
            if inner.is_settled() {
                return;
            }
            inner.adopting = None;
            inner.state = match &outcome {
                Ok(value) => State::Fulfilled(value.clone()),
                Err(reason) => {
                    if !inner.handled.get() {
                        runtime::track_rejection(reason.clone(), inner.handled.clone());
                    }
                    State::Rejected(reason.clone())
                }
            };
            mem::take(&mut inner.reactions)
        };

        tracing::trace!(
            fulfilled = outcome.is_ok(),
            reactions = reactions.len(),
            "deferred settled"
        );
        for reaction in reactions {
            let outcome = outcome.clone();
            runtime::queue_microtask(move || reaction(outcome));
        }
    }

    /// Follow the eventual outcome of `continuable`.
    fn adopt(&self, continuable: Box<dyn Continuable<T>>) {
        if self.is_settled() {
            return;
        }
        if let Some(other) = continuable.as_deferred() {
            if other.adopts(self) {
                tracing::trace!("adoption cycle detected");
                self.settle(Err(Error::Cycle));
                return;
            }
            self.inner.borrow_mut().adopting = Some(Rc::downgrade(&other.inner));
        }
        self.inner.borrow_mut().state = State::Settling;

        let resolver = Resolver::new(self.clone());
        runtime::queue_microtask(move || {
            let fallback = resolver.clone();
            if let Err(reason) = continuable.chain_into(resolver) {
                fallback.reject(reason);
            }
        });
    }

    /// Whether `target` lies on the adoption path starting at this deferred.
    fn adopts(&self, target: &Deferred<T>) -> bool {
        let mut current = Some(self.inner.clone());
        while let Some(inner) = current {
            if Rc::ptr_eq(&inner, &target.inner) {
                return true;
            }
            current = inner.borrow().adopting.as_ref().and_then(Weak::upgrade);
        }
        false
    }
}

impl<T> Deferred<T> {
    /// Whether both handles refer to the same deferred.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> Continuable<T> for Deferred<T> {
    fn chain_into(self: Box<Self>, resolver: Resolver<T>) -> Result<(), Error> {
        self.subscribe(move |settled| match settled {
            Ok(value) => resolver.fulfill(value),
            Err(reason) => resolver.reject(reason),
        });
        Ok(())
    }

    fn as_deferred(&self) -> Option<&Deferred<T>> {
        Some(self)
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.try_borrow() {
            Ok(inner) => match inner.state {
                State::Pending => "pending",
                State::Settling => "settling",
                State::Fulfilled(_) => "fulfilled",
                State::Rejected(_) => "rejected",
            },
            Err(_) => "<borrowed>",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}
