mod common;

use core::ops::ControlFlow;
use std::cell::RefCell;
use std::rc::Rc;

use common::Counter;
use cosync::*;

#[derive(Debug, thiserror::Error)]
#[error("dummy {0}")]
struct Dummy(u32);

type Slot<T> = Rc<RefCell<Option<Result<T, Error>>>>;

/// Starts `coroutine` with handlers that record how it ended.
fn outcome_of<T: 'static>(coroutine: Co<T>) -> Slot<T> {
    let slot: Slot<T> = Rc::new(RefCell::new(None));
    let (ok, err) = (Rc::clone(&slot), Rc::clone(&slot));
    launch(coroutine)
        .on_complete(move |value| *ok.borrow_mut() = Some(Ok(value)))
        .on_error(move |error| *err.borrow_mut() = Some(Err(error)))
        .start()
        .unwrap();
    slot
}

fn value_of<T: 'static>(slot: &Slot<T>) -> T {
    match slot.borrow_mut().take() {
        Some(Ok(value)) => value,
        Some(Err(error)) => panic!("unexpected rejection: {error}"),
        None => panic!("coroutine has not finished"),
    }
}

fn error_of<T: 'static>(slot: &Slot<T>) -> Error {
    match slot.borrow_mut().take() {
        Some(Ok(_)) => panic!("unexpected completion"),
        Some(Err(error)) => error,
        None => panic!("coroutine has not finished"),
    }
}

/// Callbacks parked for later, like an event loop would.
#[derive(Clone, Default)]
struct Later(Rc<RefCell<Vec<Box<dyn FnOnce()>>>>);

impl Later {
    fn resolve<T: 'static>(&self, resolver: Resolver<T>, value: T) {
        self.0.borrow_mut().push(Box::new(move || {
            resolver.resolve(value).unwrap();
        }));
    }

    fn reject(&self, rejecter: Rejecter, error: Error) {
        self.0.borrow_mut().push(Box::new(move || {
            rejecter.reject(error).unwrap();
        }));
    }

    fn run(&self) {
        loop {
            let next = {
                let mut queue = self.0.borrow_mut();
                if queue.is_empty() {
                    break;
                }
                queue.remove(0)
            };
            next();
        }
    }
}

fn immediate<T: 'static>(value: T) -> Co<T> {
    resolve::<T>().and_then(move |resolver| {
        resolver.resolve(value).unwrap();
        once()
    })
}

fn later<T: 'static>(queue: &Later, value: T) -> Co<T> {
    let queue = queue.clone();
    resolve::<T>().and_then(move |resolver| {
        queue.resolve(resolver, value);
        once()
    })
}

fn later_error<T: 'static>(queue: &Later, error: Error) -> Co<T> {
    let queue = queue.clone();
    resolve::<T>().and_then(move |_| {
        reject().and_then(move |rejecter| {
            queue.reject(rejecter, error);
            once()
        })
    })
}

#[test]
fn ready_completes_during_start() {
    let slot = outcome_of(ready(0xABAD_BABE_u32));
    assert_eq!(value_of(&slot), 0xABAD_BABE);
}

#[test]
fn immediate_failure_is_rejected_during_start() {
    let slot = outcome_of(fail::<()>(Error::custom(Dummy(1))));
    let error = error_of(&slot);
    assert_eq!(error.downcast_ref::<Dummy>().map(|d| d.0), Some(1));
}

#[test]
fn unknown_command_is_rejected() {
    let slot = outcome_of(suspend(Command::Emit(Box::new("stray"))));
    let error = error_of(&slot);
    assert!(matches!(
        error,
        Error::Protocol(ProtocolError::UnknownCommand)
    ));
    assert_eq!(error.to_string(), "unknown yield value");
}

#[test]
fn returning_with_unawaited_resolver_is_rejected() {
    let slot = outcome_of(resolve::<()>().map(drop));
    let error = error_of(&slot);
    assert!(matches!(
        error,
        Error::UnawaitedCallback(UnawaitedCallback::Resolution)
    ));
    assert!(error.to_string().starts_with("resolution of a coroutine"));
}

#[test]
fn reject_without_resolve_is_rejected() {
    let slot = outcome_of(reject());
    assert!(matches!(
        error_of(&slot),
        Error::Protocol(ProtocolError::UnpairedReject)
    ));
}

#[test]
fn second_reject_is_unpaired() {
    let first_ok = Counter::new();
    let flag = first_ok.clone();
    let slot = outcome_of(resolve::<()>().and_then(move |_| {
        reject().and_then(move |_| {
            flag.bump();
            reject()
        })
    }));
    assert_eq!(first_ok.get(), 1);
    assert!(matches!(
        error_of(&slot),
        Error::Protocol(ProtocolError::UnpairedReject)
    ));
}

#[test]
fn once_with_empty_queue_is_rejected() {
    let slot = outcome_of(once::<()>());
    let error = error_of(&slot);
    assert!(matches!(
        error,
        Error::Protocol(ProtocolError::OnceQueueSize(0))
    ));
    assert_eq!(
        error.to_string(),
        "yielded Once when the pending queue size is 0 != 1"
    );
}

#[test]
fn once_with_two_pending_is_rejected() {
    let slot = outcome_of(
        resolve::<()>()
            .and_then(|_| resolve::<()>())
            .and_then(|_| once::<()>()),
    );
    assert!(matches!(
        error_of(&slot),
        Error::Protocol(ProtocolError::OnceQueueSize(2))
    ));
}

#[test]
fn race_with_empty_queue_is_rejected() {
    let slot = outcome_of(race::<()>());
    assert!(matches!(
        error_of(&slot),
        Error::Protocol(ProtocolError::EmptyRace)
    ));
}

#[test]
fn once_immediate_resolve() {
    let slot = outcome_of(immediate(0xDEAD_BEEF_u32));
    assert_eq!(value_of(&slot), 0xDEAD_BEEF);
}

#[test]
fn once_later_resolve() {
    let queue = Later::default();
    let slot = outcome_of(later(&queue, 0xFEED_FACE_u32));
    assert!(slot.borrow().is_none());
    queue.run();
    assert_eq!(value_of(&slot), 0xFEED_FACE);
}

#[test]
fn once_immediate_reject() {
    let slot = outcome_of(resolve::<()>().and_then(|_| {
        reject().and_then(|rejecter| {
            rejecter.reject(Error::custom(Dummy(2))).unwrap();
            once::<()>()
        })
    }));
    let error = error_of(&slot);
    assert_eq!(error.downcast_ref::<Dummy>().map(|d| d.0), Some(2));
}

#[test]
fn once_later_reject() {
    let queue = Later::default();
    let slot = outcome_of(later_error::<()>(&queue, Error::custom(Dummy(3))));
    assert!(slot.borrow().is_none());
    queue.run();
    let error = error_of(&slot);
    assert_eq!(error.downcast_ref::<Dummy>().map(|d| d.0), Some(3));
}

#[test]
fn sequential_onces_in_every_timing() {
    let queue = Later::default();
    let cases: [(bool, bool); 4] =
        [(false, false), (false, true), (true, false), (true, true)];
    for (first_later, second_later) in cases {
        let step = |is_later: bool, value: u32| {
            if is_later {
                later(&queue, value)
            } else {
                immediate(value)
            }
        };
        let second = step(second_later, 0x4BCD_3F96);
        let slot = outcome_of(
            step(first_later, 0x1234_5678)
                .and_then(move |a| second.map(move |b| [a, b])),
        );
        if first_later || second_later {
            assert!(slot.borrow().is_none());
            queue.run();
        }
        assert_eq!(value_of(&slot), [0x1234_5678, 0x4BCD_3F96]);
    }
}

#[test]
fn all_in_every_timing() {
    let cases: [(bool, bool); 4] =
        [(false, false), (false, true), (true, false), (true, true)];
    for (first_later, second_later) in cases {
        let queue = Later::default();
        let q = queue.clone();
        let coroutine = resolve::<u32>().and_then(move |first| {
            resolve::<u32>().and_then(move |second| {
                for (is_later, resolver, value) in [
                    (first_later, first, 0x1234_5678),
                    (second_later, second, 0x4BCD_3F96),
                ] {
                    if is_later {
                        q.resolve(resolver, value);
                    } else {
                        resolver.resolve(value).unwrap();
                    }
                }
                all::<u32>()
            })
        });
        let slot = outcome_of(coroutine);
        queue.run();
        assert_eq!(value_of(&slot), vec![0x1234_5678, 0x4BCD_3F96]);
    }
}

#[test]
fn all_keeps_queue_order_when_settled_backwards() {
    let queue = Later::default();
    let q = queue.clone();
    let slot = outcome_of(resolve::<&str>().and_then(move |first| {
        resolve::<&str>().and_then(move |second| {
            q.resolve(second, "second");
            q.resolve(first, "first");
            all::<&str>()
        })
    }));
    queue.run();
    assert_eq!(value_of(&slot), vec!["first", "second"]);
}

#[test]
fn all_first_rejection_in_queue_order_wins() {
    let slot = outcome_of(resolve::<()>().and_then(|_| {
        reject().and_then(|first| {
            resolve::<()>().and_then(move |_| {
                reject().and_then(move |second| {
                    second.reject(Error::custom(Dummy(2))).unwrap();
                    first.reject(Error::custom(Dummy(1))).unwrap();
                    all::<()>()
                })
            })
        })
    }));
    let error = error_of(&slot);
    assert_eq!(error.downcast_ref::<Dummy>().map(|d| d.0), Some(1));
}

#[test]
fn all_rejects_as_soon_as_one_child_rejects() {
    let queue = Later::default();
    let q = queue.clone();
    let pending = Rc::new(RefCell::new(None));
    let keep = Rc::clone(&pending);
    let slot = outcome_of(resolve::<u8>().and_then(move |first| {
        *keep.borrow_mut() = Some(first);
        resolve::<u8>().and_then(move |_| {
            reject().and_then(move |second| {
                q.reject(second, Error::custom(Dummy(9)));
                all::<u8>()
            })
        })
    }));
    queue.run();
    let error = error_of(&slot);
    assert_eq!(error.downcast_ref::<Dummy>().map(|d| d.0), Some(9));

    // The other child was cancelled along with the wait.
    let first: Resolver<u8> = pending.borrow_mut().take().unwrap();
    first.resolve(1).unwrap();
    assert!(slot.borrow().is_none());
}

#[test]
fn resolve_multi_collects_arguments() {
    let slot = outcome_of(resolve_multi::<u8>().and_then(|resolver| {
        resolver.resolve([1, 2, 3]).unwrap();
        once::<Vec<u8>>()
    }));
    assert_eq!(value_of(&slot), vec![1, 2, 3]);
}

#[test]
fn repeated_resolution_is_ignored() {
    let slot = outcome_of(resolve::<u8>().and_then(|resolver| {
        resolver.resolve(1).unwrap();
        resolver.resolve(2).unwrap();
        once::<u8>()
    }));
    assert_eq!(value_of(&slot), 1);
}

#[test]
fn race_prefers_earliest_already_settled() {
    let slot = outcome_of(resolve::<&str>().and_then(|first| {
        resolve::<&str>().and_then(move |second| {
            second.resolve("second").unwrap();
            first.resolve("first").unwrap();
            race::<&str>()
        })
    }));
    assert_eq!(value_of(&slot), "first");
}

#[test]
fn race_later_takes_first_to_settle() {
    let queue = Later::default();
    let q = queue.clone();
    let slot = outcome_of(resolve::<&str>().and_then(move |first| {
        resolve::<&str>().and_then(move |second| {
            q.resolve(second, "second");
            q.resolve(first, "first");
            race::<&str>()
        })
    }));
    queue.run();
    assert_eq!(value_of(&slot), "second");
}

#[test]
fn race_loser_settling_late_leaves_next_wait_alone() {
    type Parked = Rc<RefCell<Option<Resolver<&'static str>>>>;
    let queue = Later::default();
    let loser: Parked = Default::default();
    let next: Parked = Default::default();
    let (q, l, n) = (queue.clone(), Rc::clone(&loser), Rc::clone(&next));
    let slot = outcome_of(resolve::<&str>().and_then(move |first| {
        resolve::<&str>().and_then(move |second| {
            q.resolve(second, "second");
            *l.borrow_mut() = Some(first);
            race::<&str>().and_then(move |winner| {
                resolve::<&str>().and_then(move |resolver| {
                    *n.borrow_mut() = Some(resolver);
                    once::<&str>().map(move |value| (winner, value))
                })
            })
        })
    }));
    queue.run();
    assert!(slot.borrow().is_none());

    let late = loser.borrow_mut().take().unwrap();
    late.resolve("first").unwrap();
    assert!(slot.borrow().is_none());

    let resolver = next.borrow_mut().take().unwrap();
    resolver.resolve("third").unwrap();
    assert_eq!(value_of(&slot), ("second", "third"));
}

#[test]
fn delegate_with_unawaited_resolver_is_rejected() {
    let slot = outcome_of(
        resolve::<()>().and_then(|_| delegate(ready(()))),
    );
    let error = error_of(&slot);
    assert!(matches!(
        error,
        Error::UnawaitedCallback(UnawaitedCallback::YieldingCoroutine)
    ));
    assert!(error.to_string().starts_with("yielding a coroutine"));
}

#[test]
fn delegate_immediate_resolve() {
    let slot = outcome_of(delegate(ready(0xD3AD_8EEF_u32)));
    assert_eq!(value_of(&slot), 0xD3AD_8EEF);
}

#[test]
fn delegate_later_resolve() {
    let queue = Later::default();
    let slot = outcome_of(delegate(later(&queue, 0xD3AD_8EEF_u32)));
    assert!(slot.borrow().is_none());
    queue.run();
    assert_eq!(value_of(&slot), 0xD3AD_8EEF);
}

#[test]
fn delegate_immediate_reject() {
    let slot = outcome_of(delegate(fail::<()>(Error::custom(Dummy(4)))));
    let error = error_of(&slot);
    assert_eq!(error.downcast_ref::<Dummy>().map(|d| d.0), Some(4));
}

#[test]
fn delegate_later_reject() {
    let queue = Later::default();
    let slot = outcome_of(delegate(
        later(&queue, ()).and_then(|()| fail::<()>(Error::custom(Dummy(5)))),
    ));
    assert!(slot.borrow().is_none());
    queue.run();
    let error = error_of(&slot);
    assert_eq!(error.downcast_ref::<Dummy>().map(|d| d.0), Some(5));
}

#[test]
fn nested_delegation() {
    let queue = Later::default();
    let inner = later(&queue, 2).map(|x| x * 3);
    let slot = outcome_of(delegate(delegate(inner)).map(|x| x + 1));
    queue.run();
    assert_eq!(value_of(&slot), 7);
}

#[test]
fn unhandled_rejection_surfaces_from_start() {
    let result = launch(fail::<()>(Error::custom(Dummy(6)))).start();
    match result {
        Err(Error::Unhandled(inner)) => {
            assert_eq!(inner.downcast_ref::<Dummy>().map(|d| d.0), Some(6));
        }
        Err(other) => panic!("expected unhandled error, got {other}"),
        Ok(_) => panic!("expected unhandled error"),
    }
}

#[test]
fn unhandled_rejection_surfaces_from_callback() {
    let parked = Rc::new(RefCell::new(None));
    let park = Rc::clone(&parked);
    let handle = launch(resolve::<u8>().and_then(move |resolver| {
        *park.borrow_mut() = Some(resolver);
        once::<u8>().and_then(|_| fail::<()>(Error::custom(Dummy(7))))
    }))
    .start()
    .unwrap();
    assert_eq!(handle.status(), Status::Sleeping);

    let resolver: Resolver<u8> = parked.borrow_mut().take().unwrap();
    let error = resolver.resolve(1).unwrap_err();
    assert!(matches!(error, Error::Unhandled(_)));
    assert_eq!(error.downcast_ref::<Dummy>().map(|d| d.0), Some(7));
    assert_eq!(handle.status(), Status::Rejected);
}

#[test]
fn catch_arms_are_tried_in_order() {
    let hits = Rc::new(RefCell::new(Vec::new()));
    let (a, b) = (Rc::clone(&hits), Rc::clone(&hits));
    launch(fail::<()>(Error::custom(Dummy(8))))
        .catch(
            Catch::new()
                .when(Error::is_protocol, move |_| {
                    a.borrow_mut().push("protocol")
                })
                .on::<Dummy>(move |_| b.borrow_mut().push("dummy"))
                .otherwise(|_| panic!("wildcard should not be reached")),
        )
        .start()
        .unwrap();
    assert_eq!(*hits.borrow(), vec!["dummy"]);
}

#[test]
fn unmatched_catch_is_unhandled() {
    let result = launch(fail::<()>(Error::Interrupted))
        .catch(Catch::new().on::<Dummy>(|_| {}))
        .start();
    assert!(matches!(result, Err(Error::Unhandled(_))));
}

#[test]
fn failing_completion_callback_surfaces() {
    let result = launch(ready(1))
        .try_on_complete(|_| Err(Error::custom(Dummy(10))))
        .start();
    let error = result.err().unwrap();
    assert_eq!(error.downcast_ref::<Dummy>().map(|d| d.0), Some(10));
}

#[test]
fn cancel_stops_coroutine_and_runs_cleanup() {
    let queue = Later::default();
    let cleaned = Counter::new();
    let flag = cleaned.clone();
    let completed = Counter::new();
    let done = completed.clone();
    let handle = launch(later(&queue, ()).finally(move || {
        flag.bump();
    }))
    .on_complete(move |()| {
        done.bump();
    })
    .start()
    .unwrap();
    assert_eq!(handle.status(), Status::Sleeping);
    assert!(!handle.is_done());

    handle.cancel();
    assert_eq!(handle.status(), Status::Cancelled);
    assert!(handle.is_done());
    assert_eq!(cleaned.get(), 1);

    queue.run();
    assert_eq!(completed.get(), 0);
    handle.cancel();
    assert_eq!(cleaned.get(), 1);
}

#[test]
fn finished_engine_reports_status() {
    let handle = launch(ready(())).start().unwrap();
    assert_eq!(handle.status(), Status::Resolved);
    handle.cancel();
    assert_eq!(handle.status(), Status::Resolved);
}

#[test]
fn long_synchronous_chain_does_not_grow_stack() {
    let slot = outcome_of(loop_with(0u32, |n| {
        immediate(n + 1).map(|n| {
            if n == 50_000 {
                ControlFlow::Break(n)
            } else {
                ControlFlow::Continue(n)
            }
        })
    }));
    assert_eq!(value_of(&slot), 50_000);
}

#[test]
fn long_chain_of_later_wakeups() {
    let queue = Later::default();
    let q = queue.clone();
    let slot = outcome_of(loop_with(0u32, move |n| {
        later(&q, n + 1).map(|n| {
            if n == 1_000 {
                ControlFlow::Break(n)
            } else {
                ControlFlow::Continue(n)
            }
        })
    }));
    queue.run();
    assert_eq!(value_of(&slot), 1_000);
}

#[test]
fn promise_adapts_callback_api() {
    let queue = Later::default();
    let q = queue.clone();
    let slot = outcome_of(promise(move |resolver, _| q.resolve(resolver, 5)));
    queue.run();
    assert_eq!(value_of(&slot), 5);
}

#[test]
fn pending_never_settles() {
    let handle = launch(pending::<()>()).start().unwrap();
    assert_eq!(handle.status(), Status::Sleeping);
}

#[test]
fn wakeup_from_inside_a_step_runs_after_it() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let parked: Rc<RefCell<Option<Resolver<()>>>> = Default::default();

    let (park, sink) = (Rc::clone(&parked), Rc::clone(&log));
    outcome_of(resolve::<()>().and_then(move |resolver| {
        *park.borrow_mut() = Some(resolver);
        once::<()>().map(move |()| sink.borrow_mut().push("woken"))
    }));

    let (park, sink) = (Rc::clone(&parked), Rc::clone(&log));
    let slot = outcome_of(lazy(move || {
        let resolver = park.borrow_mut().take().unwrap();
        resolver.resolve(()).unwrap();
        sink.borrow_mut().push("waker");
        ready(())
    }));
    value_of(&slot);
    assert_eq!(*log.borrow(), vec!["waker", "woken"]);
}

#[test]
fn resolvers_are_debug() {
    let slot = outcome_of(resolve::<u8>().and_then(|resolver| {
        assert!(format!("{resolver:?}").starts_with("Resolver("));
        resolver.resolve(1).unwrap();
        once::<u8>().and_then(|first| {
            resolve_multi::<u8>().and_then(move |multi| {
                assert!(format!("{multi:?}").starts_with("MultiResolver("));
                multi.resolve([first, 2]).unwrap();
                once::<Vec<u8>>()
            })
        })
    }));
    assert_eq!(value_of(&slot), vec![1, 2]);
}
