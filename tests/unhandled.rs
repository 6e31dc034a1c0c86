//! Reporting of rejections nobody handled.

use deferred_concurrency::runtime::{self, run_until_idle, set_timeout};
use deferred_concurrency::{Deferred, Error, Resolution};

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

fn install_hook() -> Rc<RefCell<Vec<String>>> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let reported = Rc::new(RefCell::new(vec![]));
    let r = reported.clone();
    runtime::set_unhandled_rejection_hook(move |reason: &Error| {
        r.borrow_mut().push(reason.to_string());
    });
    reported
}

#[test]
fn rejection_without_handler_is_reported_once() {
    let reported = install_hook();

    let _rejected: Deferred<()> = Deferred::rejected("nobody listens");
    run_until_idle();
    run_until_idle();
    assert_eq!(*reported.borrow(), vec!["nobody listens"]);
}

#[test]
fn handler_registered_in_the_same_turn_counts() {
    let reported = install_hook();

    let rejected: Deferred<()> = Deferred::rejected("handled later");
    let _later = Deferred::resolved(()).map(move |()| {
        rejected.catch(|_| Ok(Resolution::Value(())));
    });
    run_until_idle();
    assert!(reported.borrow().is_empty());
}

#[test]
fn handler_registered_after_the_turn_is_too_late() {
    let reported = install_hook();

    let rejected: Deferred<()> = Deferred::rejected("too late");
    let late = rejected.clone();
    set_timeout(Duration::from_millis(1), move || {
        late.catch(|_| Ok(Resolution::Value(())));
    });
    run_until_idle();
    assert_eq!(*reported.borrow(), vec!["too late"]);
}

#[test]
fn pass_through_rejections_are_reported_downstream() {
    let reported = install_hook();

    // The handler on the source never runs, the derived value is unhandled.
    let source: Deferred<u8> = Deferred::rejected("passed along");
    let _derived = source.map(|v| v + 1);
    run_until_idle();
    assert_eq!(*reported.borrow(), vec!["passed along"]);
}

#[test]
fn cycle_rejections_do_not_stop_the_loop() {
    let reported = install_hook();

    let slot = Rc::new(RefCell::new(None));
    let s = slot.clone();
    let deferred: Deferred<u8> = Deferred::new(move |resolver| {
        *s.borrow_mut() = Some(resolver);
        Ok(())
    });
    if let Some(resolver) = slot.borrow_mut().take() {
        resolver.resolve(deferred.clone());
    }

    let ticked = Rc::new(RefCell::new(false));
    let t = ticked.clone();
    set_timeout(Duration::from_millis(5), move || *t.borrow_mut() = true);

    run_until_idle();
    assert!(*ticked.borrow());
    assert!(matches!(deferred.peek(), Some(Err(Error::Cycle))));
    assert_eq!(reported.borrow().len(), 1);
}
