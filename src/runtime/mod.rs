//! The thread-local event loop driving deferred values.
//!
//! Work is split over two first-in-first-out queues:
//!
//! - The high-priority queue carries settlement and continuation dispatch. It
//!   is internal to the crate and fed by every reaction of a
//!   [`Deferred`](crate::Deferred).
//! - The low-priority queue carries externally scheduled completions. It is
//!   fed by [`queue_task`] and by timers created with [`set_timeout`].
//!
//! Every turn of the loop drains the high-priority queue completely, reports
//! unhandled rejections, and only then runs a single low-priority item. Chains
//! of continuations therefore resolve deterministically before any new
//! external event is observed.
//!
//! Timers run on a virtual clock: when nothing else is ready the loop jumps
//! straight to the earliest deadline, which keeps scheduling deterministic.
//!
//! # Examples
//!
//! ```
//! use deferred_concurrency::{runtime, Deferred};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let log = Rc::new(RefCell::new(vec![]));
//!
//! let l = log.clone();
//! runtime::set_timeout(Duration::ZERO, move || l.borrow_mut().push("task"));
//! let l = log.clone();
//! let _continuation = Deferred::resolved(()).map(move |()| l.borrow_mut().push("microtask"));
//!
//! runtime::run_until_idle();
//! assert_eq!(*log.borrow(), vec!["microtask", "task"]);
//! ```

use core::future::IntoFuture;
use core::pin::pin;
use core::time::Duration;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures_lite::future;

use crate::Error;

pub use timer::TimerId;
use timer::Timers;

mod timer;

/// A unit of deferred work.
pub(crate) type Task = Box<dyn FnOnce()>;

type Hook = Rc<dyn Fn(&Error)>;

thread_local! {
    static EVENT_LOOP: EventLoop = EventLoop::new();
}

struct PendingRejection {
    reason: Error,
    handled: Rc<Cell<bool>>,
}

struct EventLoop {
    microtasks: RefCell<VecDeque<Task>>,
    tasks: RefCell<VecDeque<Task>>,
    timers: RefCell<Timers>,
    rejections: RefCell<Vec<PendingRejection>>,
    hook: RefCell<Option<Hook>>,
}

impl EventLoop {
    fn new() -> Self {
        Self {
            microtasks: RefCell::new(VecDeque::new()),
            tasks: RefCell::new(VecDeque::new()),
            timers: RefCell::new(Timers::new()),
            rejections: RefCell::new(Vec::new()),
            hook: RefCell::new(None),
        }
    }

    fn next_task(&self) -> Option<Task> {
        if let Some(task) = self.tasks.borrow_mut().pop_front() {
            return Some(task);
        }
        let task = self.timers.borrow_mut().pop_earliest();
        if task.is_some() {
            tracing::debug!(now = ?self.timers.borrow().now(), "timer fired");
        }
        task
    }
}

/// Queue a callback on the high-priority queue.
pub(crate) fn queue_microtask(callback: impl FnOnce() + 'static) {
    EVENT_LOOP.with(|el| el.microtasks.borrow_mut().push_back(Box::new(callback)));
}

/// Queue a callback on the low-priority queue.
///
/// This is the entry point for the external scheduler: completions of I/O or
/// any other outside event should arrive through here or through
/// [`set_timeout`].
pub fn queue_task(callback: impl FnOnce() + 'static) {
    EVENT_LOOP.with(|el| el.tasks.borrow_mut().push_back(Box::new(callback)));
}

/// Run `callback` on the low-priority queue once `delay` has elapsed on the
/// loop's virtual clock.
///
/// Timers with equal deadlines fire in the order they were created.
pub fn set_timeout(delay: Duration, callback: impl FnOnce() + 'static) -> TimerId {
    EVENT_LOOP.with(|el| {
        let mut timers = el.timers.borrow_mut();
        let id = timers.insert(delay, Box::new(callback));
        tracing::debug!(?delay, pending = timers.len(), "timer scheduled");
        id
    })
}

/// Cancel a timer. Returns `false` if it already fired or was cancelled.
pub fn clear_timeout(id: TimerId) -> bool {
    EVENT_LOOP.with(|el| el.timers.borrow_mut().remove(id))
}

/// The current time on the loop's virtual clock.
pub fn now() -> Duration {
    EVENT_LOOP.with(|el| el.timers.borrow().now())
}

/// Register the hook invoked for rejections nobody handled.
///
/// The hook is called once the high-priority queue is observed empty, for
/// every value that was rejected without any reaction registered on it. It is
/// advisory only. Registering a new hook replaces the previous one; without a
/// hook the rejection is logged as a warning.
pub fn set_unhandled_rejection_hook(hook: impl Fn(&Error) + 'static) {
    EVENT_LOOP.with(|el| *el.hook.borrow_mut() = Some(Rc::new(hook)));
}

pub(crate) fn track_rejection(reason: Error, handled: Rc<Cell<bool>>) {
    EVENT_LOOP.with(|el| {
        el.rejections
            .borrow_mut()
            .push(PendingRejection { reason, handled })
    });
}

fn report_unhandled() {
    let (pending, hook) = EVENT_LOOP.with(|el| {
        let pending = std::mem::take(&mut *el.rejections.borrow_mut());
        (pending, el.hook.borrow().clone())
    });
    for rejection in pending.into_iter().filter(|r| !r.handled.get()) {
        match &hook {
            Some(hook) => hook(&rejection.reason),
            None => tracing::warn!(reason = %rejection.reason, "unhandled rejection"),
        }
    }
}

fn drain_microtasks() -> usize {
    let mut ran = 0;
    while let Some(task) = EVENT_LOOP.with(|el| el.microtasks.borrow_mut().pop_front()) {
        task();
        ran += 1;
    }
    ran
}

/// Run a single turn of the loop. Returns `false` if there was nothing to do.
fn turn() -> bool {
    let mut drained = 0;
    loop {
        drained += drain_microtasks();
        report_unhandled();
        if EVENT_LOOP.with(|el| el.microtasks.borrow().is_empty()) {
            break;
        }
    }
    match EVENT_LOOP.with(EventLoop::next_task) {
        Some(task) => {
            tracing::trace!(drained, "running task");
            task();
            true
        }
        None => drained > 0,
    }
}

/// Run the loop until both queues are empty and no timer is left.
pub fn run_until_idle() {
    while turn() {}
}

/// Run the loop until `future` completes.
///
/// The future is polled between turns. Returns `None` if the loop ran out of
/// work while the future was still pending: nothing can complete it anymore.
///
/// # Examples
///
/// ```
/// use deferred_concurrency::{runtime, Deferred};
/// use std::time::Duration;
///
/// let value = Deferred::new(|resolver| {
///     runtime::set_timeout(Duration::from_millis(50), move || resolver.fulfill(12));
///     Ok(())
/// });
///
/// let out = runtime::block_on(async { value.await.map(|v| v * 2) });
/// assert_eq!(out.unwrap().unwrap(), 24);
/// ```
pub fn block_on<F: IntoFuture>(fut: F) -> Option<F::Output> {
    let mut fut = pin!(fut.into_future());
    loop {
        if let Some(output) = future::block_on(future::poll_once(fut.as_mut())) {
            return Some(output);
        }
        if !turn() {
            return None;
        }
    }
}
