//! Single-assignment deferred values and the combinators built on them.
//!
//! A [`Deferred`] is a value that becomes available eventually, or fails with
//! an [`Error`]. Deferred values are driven by a single-threaded, thread-local
//! event loop in [`runtime`], which keeps two queues: continuations always run
//! before any externally scheduled work such as timers.
//!
//! # Operations
//!
//! This library provides the following operations:
//!
//! - [`Deferred`]: create, chain, and adopt deferred values.
//! - [`adapt`]: lift a function taking an error-first callback into one
//!   returning a [`Deferred`].
//! - [`Serially`]: process values and deferred values strictly in order,
//!   aborting on the first failure.
//! - [`FirstSettled`]: wait for the first value to succeed, failing only once
//!   every value failed.
//! - [`Race`]: wait for the first value to settle, either way.
//!
//! # Examples
//!
//! ```rust
//! use deferred_concurrency::prelude::*;
//! use deferred_concurrency::{runtime, Deferred, Resolution};
//! use std::time::Duration;
//!
//! let slow = Deferred::new(|resolver| {
//!     runtime::set_timeout(Duration::from_millis(100), move || resolver.fulfill(1));
//!     Ok(())
//! });
//!
//! let first = vec![slow.into(), Resolution::Value(2)].first_settled();
//! assert_eq!(runtime::block_on(first).unwrap().unwrap(), 2);
//! ```
//!
//! # Limitations
//!
//! Deferred values are `!Send`: they belong to the thread whose event loop
//! drives them. There is no cancellation; work that was started always runs
//! to completion.

#![deny(missing_debug_implementations, nonstandard_style, unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

mod adapt;
mod deferred;
mod error;
mod first_settled;
mod race;
mod serial;

pub mod runtime;

/// The deferred concurrency prelude.
pub mod prelude {
    pub use super::first_settled::FirstSettled as _;
    pub use super::race::Race as _;
    pub use super::serial::Serially as _;
}

pub use adapt::{adapt, Callback};
pub use deferred::{Continuable, Deferred, Outcome, Resolution, Resolver, Settlement};
pub use error::{AggregateError, Error};
pub use first_settled::{first_settled, FirstSettled};
pub use race::{race, Race};
pub use serial::{run_serially, Serially};
