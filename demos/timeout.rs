// Timeouts by racing an operation against a timer.
//
// A worker holds a mutex for a while; two clients try to get it, one with a
// patient deadline and one with a short one. The impatient client gives up,
// and because the race cancels the loser, its place in the mutex queue goes
// away with it.
//
// Run with `RUST_LOG=cosync=debug cargo run --example timeout`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use cosync::Co;
use cosync::Mutex;
use cosync::launch;
use cosync::once;
use cosync::resolve;
use cosync::select_either;
use either::Either;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

type Wakeup = Box<dyn FnOnce()>;

#[derive(Default)]
struct TimerState {
    now: u64,
    due: BTreeMap<u64, Vec<Wakeup>>,
}

/// Timers on a virtual clock that jumps straight to the next deadline.
#[derive(Clone, Default)]
struct Timers {
    state: Rc<RefCell<TimerState>>,
}

impl Timers {
    fn now(&self) -> u64 {
        self.state.borrow().now
    }

    fn sleep(&self, ticks: u64) -> Co<()> {
        let state = Rc::clone(&self.state);
        resolve::<()>().and_then(move |resolver| {
            let mut state = state.borrow_mut();
            let at = state.now + ticks;
            state.due.entry(at).or_default().push(Box::new(move || {
                if let Err(e) = resolver.resolve(()) {
                    error!(error = %e, "timer callback failed");
                }
            }));
            once()
        })
    }

    fn run(&self) {
        loop {
            let wakeups = {
                let mut state = self.state.borrow_mut();
                let Some((at, wakeups)) = state.due.pop_first() else {
                    break;
                };
                state.now = at;
                wakeups
            };
            for wakeup in wakeups {
                wakeup();
            }
        }
    }
}

/// Tries to take the lock within `patience` ticks and report how it went.
fn client(name: &'static str, timers: &Timers, mutex: &Mutex, patience: u64) {
    let clock = timers.clone();
    let attempt = select_either(
        mutex.run_with(move || {
            info!(name, at = clock.now(), "got the lock");
            clock.sleep(1)
        }),
        timers.sleep(patience),
    );
    let clock = timers.clone();
    let started = launch(attempt)
        .on_complete(move |outcome| {
            let at = clock.now();
            match outcome {
                Either::Left(()) => println!("{name}: done at {at}"),
                Either::Right(()) => println!("{name}: timed out at {at}"),
            }
        })
        .start();
    if let Err(e) = started {
        error!(name, error = %e, "client failed");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let timers = Timers::default();
    let mutex = Mutex::new();

    let clock = timers.clone();
    let worker = launch(mutex.run_with(move || {
        info!(at = clock.now(), "worker holds the lock");
        clock.sleep(5)
    }))
    .start();
    if let Err(e) = worker {
        error!(error = %e, "worker failed");
        return;
    }

    client("impatient", &timers, &mutex, 2);
    client("patient", &timers, &mutex, 10);
    timers.run();
    println!("mutex idle at the end: {}", mutex.is_idle());
}
