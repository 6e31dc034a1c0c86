use core::cmp::Reverse;
use core::time::Duration;
use std::collections::BinaryHeap;

use slab::Slab;

use super::Task;

/// A handle to a scheduled timer, returned by [`set_timeout`](super::set_timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    key: usize,
    seq: u64,
}

struct Entry {
    seq: u64,
    callback: Task,
}

/// Timers on a virtual clock.
///
/// Entries live in a slab so they can be cancelled by key; the heap orders
/// them by deadline and then by scheduling order. Cancelled entries leave a
/// stale heap record behind, which is skipped when it surfaces.
pub(crate) struct Timers {
    entries: Slab<Entry>,
    deadlines: BinaryHeap<Reverse<(Duration, u64, usize)>>,
    next_seq: u64,
    now: Duration,
}

impl Timers {
    pub(crate) fn new() -> Self {
        Self {
            entries: Slab::new(),
            deadlines: BinaryHeap::new(),
            next_seq: 0,
            now: Duration::ZERO,
        }
    }

    pub(crate) fn now(&self) -> Duration {
        self.now
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn insert(&mut self, delay: Duration, callback: Task) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let key = self.entries.insert(Entry { seq, callback });
        let deadline = self.now.saturating_add(delay);
        self.deadlines.push(Reverse((deadline, seq, key)));
        TimerId { key, seq }
    }

    pub(crate) fn remove(&mut self, id: TimerId) -> bool {
        match self.entries.get(id.key) {
            Some(entry) if entry.seq == id.seq => {
                self.entries.remove(id.key);
                true
            }
            _ => false,
        }
    }

    /// Remove the earliest timer, advancing the clock to its deadline.
    pub(crate) fn pop_earliest(&mut self) -> Option<Task> {
        while let Some(Reverse((deadline, seq, key))) = self.deadlines.pop() {
            let live = matches!(self.entries.get(key), Some(entry) if entry.seq == seq);
            if !live {
                continue;
            }
            let entry = self.entries.remove(key);
            self.now = self.now.max(deadline);
            return Some(entry.callback);
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(log: &Rc<RefCell<Vec<u32>>>, n: u32) -> Task {
        let log = log.clone();
        Box::new(move || log.borrow_mut().push(n))
    }

    #[test]
    fn fires_by_deadline_then_by_insertion() {
        let log = Rc::new(RefCell::new(vec![]));
        let mut timers = Timers::new();
        timers.insert(Duration::from_millis(20), recorder(&log, 1));
        timers.insert(Duration::from_millis(10), recorder(&log, 2));
        timers.insert(Duration::from_millis(10), recorder(&log, 3));

        while let Some(task) = timers.pop_earliest() {
            task();
        }
        assert_eq!(*log.borrow(), vec![2, 3, 1]);
        assert_eq!(timers.now(), Duration::from_millis(20));
    }

    #[test]
    fn distant_deadlines_saturate() {
        let log = Rc::new(RefCell::new(vec![]));
        let mut timers = Timers::new();
        timers.insert(Duration::from_millis(1), recorder(&log, 1));
        while let Some(task) = timers.pop_earliest() {
            task();
        }

        timers.insert(Duration::MAX, recorder(&log, 2));
        timers.insert(Duration::MAX, recorder(&log, 3));
        while let Some(task) = timers.pop_earliest() {
            task();
        }
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        assert_eq!(timers.now(), Duration::MAX);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let log = Rc::new(RefCell::new(vec![]));
        let mut timers = Timers::new();
        let a = timers.insert(Duration::ZERO, recorder(&log, 1));
        timers.insert(Duration::ZERO, recorder(&log, 2));
        assert!(timers.remove(a));
        assert!(!timers.remove(a));

        // The freed slot is reused, the stale id must not match it.
        let c = timers.insert(Duration::ZERO, recorder(&log, 3));
        assert_ne!(a, c);
        assert!(!timers.remove(a));
        assert_eq!(timers.len(), 2);

        while let Some(task) = timers.pop_earliest() {
            task();
        }
        assert_eq!(*log.borrow(), vec![2, 3]);
    }
}
