use core::mem;
use std::cell::RefCell;
use std::rc::Rc;

use crate::{Deferred, Resolution, Resolver};

pub(crate) mod vec;

/// Process items strictly one after another.
///
/// Every item is awaited before the next one is even looked at. Each value is
/// handed to an observer as soon as its item fulfills, in item order. The first
/// rejection aborts the run: the remaining items are never started and the
/// returned deferred rejects with that reason, unchanged.
pub trait Serially {
    /// The value each item resolves to.
    type Output;

    /// Process the items in order, delivering each value to `observer`.
    ///
    /// The returned deferred fulfills with every delivered value, in order.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred_concurrency::prelude::*;
    /// use deferred_concurrency::{runtime, Deferred, Resolution};
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use std::time::Duration;
    ///
    /// let slow = Deferred::new(|resolver| {
    ///     runtime::set_timeout(Duration::from_millis(50), move || resolver.fulfill(1));
    ///     Ok(())
    /// });
    ///
    /// let seen = Rc::new(RefCell::new(vec![]));
    /// let s = seen.clone();
    /// let run = vec![slow.into(), Resolution::Value(2), Resolution::Value(3)]
    ///     .run_serially(move |value| s.borrow_mut().push(value));
    ///
    /// assert_eq!(runtime::block_on(run).unwrap().unwrap(), vec![1, 2, 3]);
    /// assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    /// ```
    fn run_serially<F>(self, observer: F) -> Deferred<Vec<Self::Output>>
    where
        F: FnMut(Self::Output) + 'static;
}

struct Serial<I, T, F> {
    items: I,
    observer: F,
    values: Vec<T>,
    resolver: Resolver<Vec<T>>,
}

/// Process `items` strictly one after another. See [`Serially`].
pub fn run_serially<I, T, F>(items: I, observer: F) -> Deferred<Vec<T>>
where
    I: IntoIterator<Item = Resolution<T>>,
    I::IntoIter: 'static,
    T: Clone + 'static,
    F: FnMut(T) + 'static,
{
    let result = Deferred::pending();
    let state = Rc::new(RefCell::new(Serial {
        items: items.into_iter(),
        observer,
        values: Vec::new(),
        resolver: Resolver::new(result.clone()),
    }));
    advance(state);
    result
}

fn advance<I, T, F>(state: Rc<RefCell<Serial<I, T, F>>>)
where
    I: Iterator<Item = Resolution<T>> + 'static,
    T: Clone + 'static,
    F: FnMut(T) + 'static,
{
    let next = state.borrow_mut().items.next();
    let Some(item) = next else {
        let mut serial = state.borrow_mut();
        let values = mem::take(&mut serial.values);
        serial.resolver.fulfill(values);
        return;
    };

    let index = state.borrow().values.len();
    Deferred::resolve(item).subscribe(move |settled| match settled {
        Ok(value) => {
            {
                let mut serial = state.borrow_mut();
                (serial.observer)(value.clone());
                serial.values.push(value);
            }
            advance(state);
        }
        Err(reason) => {
            tracing::debug!(index, %reason, "serial run aborted");
            state.borrow().resolver.reject(reason);
        }
    });
}
