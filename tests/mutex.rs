mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::Counter;
use common::MockClock;
use common::spawn;
use cosync::*;

#[test]
fn starts_idle() {
    assert!(Mutex::new().is_idle());
}

#[test]
fn run_returns_body_value() {
    let mutex = Mutex::new();
    let done = Counter::new();
    let seen = done.clone();
    launch(mutex.run_with(|| ready("value")))
        .on_complete(move |value| {
            assert_eq!(value, "value");
            seen.bump();
        })
        .start()
        .unwrap();
    assert!(mutex.is_idle());
    assert_eq!(done.get(), 1);
}

#[test]
fn not_idle_while_body_runs() {
    let mutex = Mutex::new();
    let done = Counter::new();
    let (inner, events) = (mutex.clone(), done.clone());
    let first = mutex.run_with(move || {
        assert!(!inner.is_idle());
        events.bump();
        ready(())
    });
    let (outer, events) = (mutex.clone(), done.clone());
    let (inner, again) = (mutex.clone(), done.clone());
    let second = mutex.run_with(move || {
        assert!(!inner.is_idle());
        again.bump();
        ready(())
    });
    spawn(first.and_then(move |()| {
        assert!(outer.is_idle());
        events.bump();
        second
    }));
    assert!(mutex.is_idle());
    assert_eq!(done.get(), 3);
}

#[test]
fn mutual_exclusion() {
    let clock = MockClock::new();
    let mutex = Mutex::new();
    let events = Counter::new();

    let (m, c, e) = (mutex.clone(), clock.clone(), events.clone());
    assert_eq!(events.bump(), 0);
    spawn(mutex.run_with(move || {
        assert_eq!(e.bump(), 1);
        assert!(!m.is_idle());
        c.sleep_until(2).map(move |()| {
            assert_eq!(e.bump(), 4);
            assert_eq!(c.current_tick(), 2);
            assert!(!m.is_idle());
        })
    }));
    assert_eq!(events.bump(), 2);

    let (m, c, e) = (mutex.clone(), clock.clone(), events.clone());
    spawn(mutex.run_with(move || {
        assert_eq!(e.bump(), 5);
        assert_eq!(c.current_tick(), 2);
        assert!(!m.is_idle());
        c.sleep_until(4).map(move |()| {
            assert_eq!(e.bump(), 8);
            assert_eq!(c.current_tick(), 4);
            assert!(!m.is_idle());
        })
    }));

    clock.next_tick(1);
    assert_eq!(events.bump(), 3);
    assert!(!mutex.is_idle());

    clock.next_tick(2);
    assert_eq!(events.bump(), 6);
    assert!(!mutex.is_idle());

    clock.next_tick(3);
    assert_eq!(events.bump(), 7);
    assert!(!mutex.is_idle());

    clock.next_tick(4);
    assert_eq!(events.bump(), 9);
    assert!(mutex.is_idle());
}

#[test]
fn failing_body_releases_lock() {
    let mutex = Mutex::new();
    let caught = Counter::new();
    let sink = caught.clone();
    launch(mutex.run(fail::<()>(Error::msg("dummy"))))
        .on_error(move |error| {
            assert_eq!(error.to_string(), "dummy");
            sink.bump();
        })
        .start()
        .unwrap();
    assert_eq!(caught.get(), 1);
    assert!(mutex.is_idle());

    let ran = Counter::new();
    let flag = ran.clone();
    spawn(mutex.run_with(move || {
        flag.bump();
        ready(())
    }));
    assert_eq!(ran.get(), 1);
}

#[test]
fn double_release_fails() {
    let mutex = Mutex::new();
    let caught = Counter::new();
    let sink = caught.clone();
    let m = mutex.clone();
    launch(mutex.acquire().try_map(move |()| {
        m.release()?;
        m.release()
    }))
    .on_error(move |error| {
        assert!(matches!(error, Error::MutexReleased));
        assert_eq!(error.to_string(), "attempt to release a released mutex");
        sink.bump();
    })
    .start()
    .unwrap();
    assert_eq!(caught.get(), 1);
}

#[test]
fn waiters_acquire_in_request_order() {
    let clock = MockClock::new();
    let mutex = Mutex::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    for id in 0..5 {
        let (c, log) = (clock.clone(), Rc::clone(&order));
        spawn(mutex.run_with(move || {
            log.borrow_mut().push(id);
            c.sleep_until(c.current_tick() + 1)
        }));
    }
    assert_eq!(*order.borrow(), vec![0]);
    clock.advance_to(5);
    assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    assert!(mutex.is_idle());
}

#[test]
fn cancelled_waiter_gives_up_its_place() {
    let clock = MockClock::new();
    let mutex = Mutex::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let worker = |id: u32| {
        let (c, log) = (clock.clone(), Rc::clone(&order));
        spawn(mutex.run_with(move || {
            log.borrow_mut().push(id);
            c.sleep_until(c.current_tick() + 1)
        }))
    };
    let _first = worker(1);
    let second = worker(2);
    let _third = worker(3);
    second.cancel();
    assert_eq!(second.status(), Status::Cancelled);

    clock.advance_to(2);
    assert_eq!(*order.borrow(), vec![1, 3]);
    assert!(mutex.is_idle());
}

#[test]
fn cancelled_holder_releases_lock() {
    let clock = MockClock::new();
    let mutex = Mutex::new();
    let c = clock.clone();
    let holder = spawn(mutex.run_with(move || c.sleep_until(10)));
    assert!(!mutex.is_idle());

    let acquired = Counter::new();
    let flag = acquired.clone();
    spawn(mutex.run_with(move || {
        flag.bump();
        ready(())
    }));
    assert_eq!(acquired.get(), 0);

    holder.cancel();
    assert_eq!(acquired.get(), 1);
    assert!(mutex.is_idle());
}

#[test]
fn long_waiter_queue_is_handed_down_without_nesting() {
    const WAITERS: usize = 10_000;
    let clock = MockClock::new();
    let mutex = Mutex::new();
    let ran = Counter::new();

    spawn(mutex.run(clock.sleep_until(1)));
    let handles = (0..WAITERS)
        .map(|i| {
            let ran = ran.clone();
            spawn(mutex.run(lazy(move || {
                assert_eq!(ran.bump(), i);
                ready(())
            })))
        })
        .collect::<Vec<_>>();
    assert_eq!(ran.get(), 0);

    clock.next_tick(1);
    assert_eq!(ran.get(), WAITERS);
    assert!(mutex.is_idle());
    assert!(handles.iter().all(Handle::is_done));
}
