use std::error::Error as StdError;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// The reason a [`Deferred`](crate::Deferred) was rejected.
///
/// Reasons are shared between every reaction registered on a rejected value,
/// so the type is cheap to clone.
#[derive(Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A reason supplied by user code: an executor or handler returning
    /// `Err`, an adapted callback reporting an error, or an explicit reject.
    #[error("{0}")]
    Message(String),

    /// A foreign error carried as a rejection reason.
    #[error("{0}")]
    Other(Rc<dyn StdError + 'static>),

    /// A deferred value was resolved with itself, directly or through a chain
    /// of values it was already adopting.
    #[error("chaining cycle detected while adopting a deferred value")]
    Cycle,

    /// `first_settled` was called without any candidates.
    #[error("no candidates were provided")]
    NoCandidates,

    /// Every candidate passed to `first_settled` was rejected.
    #[error(transparent)]
    Aggregate(AggregateError<Error>),
}

impl Error {
    /// Create a rejection reason from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap a foreign error.
    pub fn other<E: StdError + 'static>(err: E) -> Self {
        Self::Other(Rc::new(err))
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(msg) => f.debug_tuple("Message").field(msg).finish(),
            Self::Other(err) => f.debug_tuple("Other").field(err).finish(),
            Self::Cycle => f.write_str("Cycle"),
            Self::NoCandidates => f.write_str("NoCandidates"),
            Self::Aggregate(errs) => f.debug_tuple("Aggregate").field(&errs.inner).finish(),
        }
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::other(err)
    }
}

/// A collection of errors, in the order they occurred.
#[repr(transparent)]
#[derive(Clone)]
pub struct AggregateError<E> {
    pub(crate) inner: Vec<E>,
}

impl<E> AggregateError<E> {
    pub(crate) fn new(inner: Vec<E>) -> Self {
        Self { inner }
    }

    /// Consume the aggregate, returning the individual errors.
    pub fn into_inner(self) -> Vec<E> {
        self.inner
    }
}

impl<E: fmt::Display> fmt::Debug for AggregateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{self}:")?;

        for (i, err) in self.inner.iter().enumerate() {
            writeln!(f, "- Error {}: {err}", i + 1)?;
        }

        Ok(())
    }
}

impl<E: fmt::Display> fmt::Display for AggregateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred", self.inner.len())
    }
}

impl<E> Deref for AggregateError<E> {
    type Target = Vec<E>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<E> DerefMut for AggregateError<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<E: fmt::Display> StdError for AggregateError<E> {}
