// Shared helpers for the integration tests: a discrete clock that wakes
// coroutines when the test advances it, and a counter for ordering checks.

#![allow(dead_code)]

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use cosync::Co;
use cosync::Handle;
use cosync::launch;
use cosync::once;
use cosync::resolve;

type Wakeup = Box<dyn FnOnce()>;

#[derive(Default)]
struct ClockState {
    tick: u64,
    scheduled: BTreeMap<u64, Vec<Wakeup>>,
}

/// A clock that only moves when the test calls `next_tick()`.
#[derive(Clone, Default)]
pub struct MockClock {
    state: Rc<RefCell<ClockState>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, tick: u64, f: impl FnOnce() + 'static) {
        let mut state = self.state.borrow_mut();
        assert!(state.tick < tick, "tick {tick} is in the past");
        state.scheduled.entry(tick).or_default().push(Box::new(f));
    }

    /// Suspends until the clock reaches `tick`.
    pub fn sleep_until(&self, tick: u64) -> Co<()> {
        let clock = self.clone();
        resolve::<()>().and_then(move |resolver| {
            clock.schedule(tick, move || {
                resolver.resolve(()).expect("woken coroutine failed");
            });
            once()
        })
    }

    /// Moves to the next tick, which must be `expect`, and runs everything
    /// scheduled for it.
    pub fn next_tick(&self, expect: u64) {
        let due = {
            let mut state = self.state.borrow_mut();
            state.tick += 1;
            assert_eq!(state.tick, expect, "test has wrong clock counting");
            state.scheduled.remove(&expect).unwrap_or_default()
        };
        for wakeup in due {
            wakeup();
        }
    }

    pub fn advance_to(&self, tick: u64) {
        while self.current_tick() < tick {
            self.next_tick(self.current_tick() + 1);
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.state.borrow().tick
    }
}

/// A shared counter, cloned into coroutines to record progress.
#[derive(Clone, Default)]
pub struct Counter(Rc<Cell<usize>>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }

    /// Increments and returns the value before the increment.
    pub fn bump(&self) -> usize {
        let before = self.0.get();
        self.0.set(before + 1);
        before
    }
}

/// Starts `coroutine`, panicking on an unhandled rejection.
pub fn spawn<T: 'static>(coroutine: Co<T>) -> Handle {
    launch(coroutine).start().expect("coroutine was rejected")
}
