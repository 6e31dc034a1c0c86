//! Scheduling order of deferred values relative to each other and to timers.

use deferred_concurrency::prelude::*;
use deferred_concurrency::runtime::{self, run_until_idle, set_timeout};
use deferred_concurrency::{Continuable, Deferred, Error, Resolution, Resolver};

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Clone, Default)]
struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    fn push(&self, entry: impl ToString) {
        self.0.borrow_mut().push(entry.to_string());
    }

    fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

#[test]
fn executor_runs_synchronously_and_handlers_later() {
    let log = Log::default();

    let l = log.clone();
    let deferred = Deferred::new(move |resolver| {
        l.push("New Promise");
        resolver.fulfill(());
        Ok(())
    });

    let (l1, l2) = (log.clone(), log.clone());
    deferred
        .map(move |_| l1.push("Resolved"))
        .map(move |_| l2.push("Resolved-1"));
    let l = log.clone();
    deferred.map(move |_| l.push("Resolved-2"));
    log.push("Hello");

    run_until_idle();
    assert_eq!(
        log.entries(),
        vec!["New Promise", "Hello", "Resolved", "Resolved-2", "Resolved-1"]
    );
}

#[test]
fn continuations_run_before_timers() {
    let log = Log::default();

    let l = log.clone();
    set_timeout(Duration::ZERO, move || l.push(1));
    let l = log.clone();
    let deferred = Deferred::new(move |resolver| {
        l.push(2);
        resolver.fulfill(());
        Ok(())
    });

    let (l3, l4) = (log.clone(), log.clone());
    deferred.map(move |_| l3.push(3)).map(move |_| l4.push(4));
    let (l5, l6) = (log.clone(), log.clone());
    deferred
        .map(move |_| {
            set_timeout(Duration::ZERO, move || l5.push(5));
        })
        .map(move |_| l6.push(6));
    log.push(7);

    run_until_idle();
    assert_eq!(log.entries(), vec!["2", "7", "3", "4", "6", "1", "5"]);
}

#[test]
fn reject_then_resolve_keeps_the_rejection() {
    let log = Log::default();

    let l = log.clone();
    let deferred: Deferred<()> = Deferred::new(move |resolver| {
        l.push(1);
        resolver.reject("rejected");
        resolver.fulfill(());
        Ok(())
    });

    let (l2, l3, l4, l5) = (log.clone(), log.clone(), log.clone(), log.clone());
    deferred
        .chain(
            move |_| {
                l2.push(2);
                Ok(Resolution::Value(()))
            },
            move |_| {
                l3.push(3);
                Ok(Resolution::Value(()))
            },
        )
        .catch(move |_| {
            l4.push(4);
            Ok(Resolution::Value(()))
        })
        .map(move |_| l5.push(5));

    run_until_idle();
    assert_eq!(log.entries(), vec!["1", "3", "5"]);
}

#[test]
fn failing_executor_is_caught() {
    let log = Log::default();
    let deferred: Deferred<i32> = Deferred::new(|_| Err(Error::msg("x is not defined")));

    let (l2, l3) = (log.clone(), log.clone());
    deferred
        .catch(move |_| {
            l2.push(2);
            Ok(Resolution::Value(0))
        })
        .map(move |_| l3.push(3));

    run_until_idle();
    assert_eq!(log.entries(), vec!["2", "3"]);
}

/// A continuable whose chain operation never calls back.
struct Silent;

impl Continuable<String> for Silent {
    fn chain_into(self: Box<Self>, _resolver: Resolver<String>) -> Result<(), Error> {
        Ok(())
    }
}

#[test]
fn silent_continuable_never_settles() {
    let log = Log::default();
    let deferred = Deferred::resolve(Resolution::adopt(Silent));

    let l = log.clone();
    deferred.map(move |value| l.push(format!("hello{value}")));

    run_until_idle();
    assert!(deferred.is_pending());
    assert!(log.entries().is_empty());
}

#[test]
fn failing_continuable_rejects() {
    struct Broken;

    impl Continuable<u8> for Broken {
        fn chain_into(self: Box<Self>, _resolver: Resolver<u8>) -> Result<(), Error> {
            Err(Error::msg("chain failed"))
        }
    }

    let deferred = Deferred::resolve(Resolution::adopt(Broken));
    let err = runtime::block_on(deferred).unwrap().unwrap_err();
    assert_eq!(err.to_string(), "chain failed");
}

#[test]
fn adopting_resolves_after_plain_values() {
    let log = Log::default();

    let b = Deferred::resolved("B");
    let adopter = Deferred::new(move |resolver| {
        resolver.resolve(b);
        Ok(())
    });
    let a = Deferred::resolved("A");

    let l = log.clone();
    adopter.map(move |v| l.push(v));
    let l = log.clone();
    a.map(move |v| l.push(v));

    run_until_idle();
    assert_eq!(log.entries(), vec!["A", "B"]);
}

#[test]
fn resolving_a_deferred_returns_it() {
    let first = Deferred::resolved(42);
    let second = Deferred::resolve(first.clone());
    assert!(first.ptr_eq(&second));
}

#[test]
fn handler_returning_a_timer_backed_deferred() {
    let log = Log::default();

    let l = log.clone();
    Deferred::resolved(10)
        .then::<i32, _>(|val| {
            let doubled = Deferred::new(move |resolver| {
                set_timeout(Duration::from_millis(10), move || resolver.fulfill(val * 2));
                Ok(())
            });
            Ok(doubled.into())
        })
        .map(move |val| l.push(val));

    run_until_idle();
    assert_eq!(log.entries(), vec!["20"]);
    assert_eq!(runtime::now(), Duration::from_millis(10));
}

#[test]
fn racing_nothing_stays_pending() {
    let race = Vec::<Resolution<()>>::new().race();
    run_until_idle();
    assert!(race.is_pending());
}

#[test]
fn attempt_never_fails_synchronously() {
    fn better(val: i32) -> Deferred<i32> {
        Deferred::attempt(|| {
            if val <= 0 {
                return Err(Error::msg("Error happened"));
            }
            Ok(Resolution::Value(val))
        })
    }

    assert_eq!(runtime::block_on(better(3)).unwrap().unwrap(), 3);
    let err = runtime::block_on(better(0)).unwrap().unwrap_err();
    assert_eq!(err.to_string(), "Error happened");
}
