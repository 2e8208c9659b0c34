use core::ops::ControlFlow;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use ControlFlow::*;
use Suspend::*;
use tracing::trace;

use crate::co::Co;
use crate::co::Coroutine;
use crate::co::Step;
use crate::command::Command;
use crate::command::Resume;
use crate::command::downcast;
use crate::coro::Coro;
use crate::error::Error;
use crate::from_control_flow::loop_with;
use crate::from_fn::lazy;
use crate::just_return::fail;
use crate::just_return::ready;
use crate::suspend::Suspend;

/// How many times [`Traverser::interrupt()`] throws before giving up.
pub const MAX_INTERRUPTS: usize = 16;

struct Slot {
    /// Empty once the coroutine finished, or while a `next()` drives it.
    inner: Option<Co<()>>,
    started: bool,
    /// Set while a `next()` holds the coroutine.
    busy: bool,
}

/// Marks the slot busy for as long as a pull owns the coroutine.
struct InFlight(Rc<RefCell<Slot>>);

impl InFlight {
    fn enter(slot: &Rc<RefCell<Slot>>) -> Self {
        slot.borrow_mut().busy = true;
        InFlight(Rc::clone(slot))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.borrow_mut().busy = false;
    }
}

/// A pull-style iterator over the values a coroutine passes to
/// [`emit()`](crate::emit).
///
/// Each [`next()`](Traverser::next) runs the coroutine up to its next
/// `emit()`. Any other command it yields on the way is forwarded to the engine
/// driving `next()`, so the traversed coroutine can wait on channels, timers
/// and the like. Dropping the traverser drops the coroutine; use
/// [`interrupt()`](Traverser::interrupt) instead to let it clean up
/// asynchronously.
///
/// Cloning a `Traverser` yields another handle to the same coroutine.
pub struct Traverser<T> {
    slot: Rc<RefCell<Slot>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Traverser<T> {
    fn clone(&self) -> Self {
        Traverser {
            slot: Rc::clone(&self.slot),
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> Traverser<T> {
    pub fn new(coroutine: Co<()>) -> Self {
        Traverser {
            slot: Rc::new(RefCell::new(Slot {
                inner: Some(coroutine),
                started: false,
                busy: false,
            })),
            _marker: PhantomData,
        }
    }

    /// Traverses the coroutine built by `f` when first pulled.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() -> Co<()> + 'static,
    {
        Self::new(lazy(f))
    }

    /// Runs the coroutine to its next emitted value. Returns `None` once it
    /// has finished.
    ///
    /// # Errors
    ///
    /// Fails with the coroutine's own error, after which the traversal is
    /// over, or with [`Error::TypeMismatch`] if it emits something other
    /// than a `T`. Fails with [`Error::TraverserBusy`] while another
    /// `next()` on the same coroutine is still waiting for its value.
    pub fn next(&self) -> Co<Option<T>> {
        self.resume_with(Resume::Continue)
    }

    /// Waits for every remaining value.
    pub fn collect(&self) -> Co<Vec<T>> {
        let traverser = self.clone();
        loop_with(Vec::new(), move |mut values| {
            traverser.next().map(move |next| match next {
                Some(value) => {
                    values.push(value);
                    Continue(values)
                }
                None => Break(values),
            })
        })
    }

    /// [`interrupt_with_attempts()`](Traverser::interrupt_with_attempts) with
    /// [`MAX_INTERRUPTS`] attempts.
    pub fn interrupt(&self) -> Co<Option<Error>> {
        self.interrupt_with_attempts(MAX_INTERRUPTS)
    }

    /// Throws [`Error::Interrupted`] into the coroutine at its current
    /// `emit()`, again and again while it keeps emitting, so that its cleanup
    /// can run to completion. Values emitted meanwhile are discarded.
    ///
    /// Returns `None` if the coroutine finished or failed with
    /// `Error::Interrupted`, and the error if it failed with anything else. A
    /// coroutine that never started is dropped without being run.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InterruptLimit`] if the coroutine is still running
    /// after `attempts` throws, or with [`Error::TraverserBusy`] if a
    /// `next()` is still waiting on it.
    pub fn interrupt_with_attempts(
        &self,
        attempts: usize,
    ) -> Co<Option<Error>> {
        let traverser = self.clone();
        loop_with(0, move |attempt| {
            if attempt == attempts {
                return fail(Error::InterruptLimit(attempts));
            }
            trace!(attempt, "interrupting traversed coroutine");
            traverser
                .resume_with(Resume::Throw(Error::Interrupted))
                .then(move |outcome| match outcome {
                    Ok(Some(_)) => ready(Continue(attempt + 1)),
                    Ok(None) | Err(Error::Interrupted) => ready(Break(None)),
                    Err(Error::TraverserBusy) => fail(Error::TraverserBusy),
                    Err(error) => ready(Break(Some(error))),
                })
        })
    }

    fn resume_with(&self, input: Resume) -> Co<Option<T>> {
        Co::new(Next {
            slot: Rc::clone(&self.slot),
            running: None,
            first: Some(input),
            _marker: PhantomData,
        })
    }
}

/// One pull: owns the traversed coroutine while forwarding its commands.
struct Next<T> {
    slot: Rc<RefCell<Slot>>,
    running: Option<(Co<()>, InFlight)>,
    first: Option<Resume>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Coroutine<Option<T>> for Next<T> {
    fn resume_boxed(self: Box<Self>, input: Resume) -> Step<Option<T>> {
        let Next {
            slot,
            running,
            first,
            _marker,
        } = *self;
        let (inner, flight, input) = match running {
            Some((inner, flight)) => (inner, flight, input),
            None => {
                if let Resume::Throw(error) = input {
                    return Return(Err(error));
                }
                let mut state = slot.borrow_mut();
                let Some(inner) = state.inner.take() else {
                    return Return(match state.busy {
                        true => Err(Error::TraverserBusy),
                        false => Ok(None),
                    });
                };
                let input = first.unwrap_or(Resume::Continue);
                if !state.started && matches!(input, Resume::Throw(_)) {
                    drop(state);
                    drop(inner);
                    return Return(Ok(None));
                }
                state.started = true;
                drop(state);
                (inner, InFlight::enter(&slot), input)
            }
        };
        match inner.resume(input) {
            Yield(Command::Emit(value), rest) => {
                slot.borrow_mut().inner = Some(rest);
                drop(flight);
                Return(downcast::<T>(value).map(Some))
            }
            Yield(command, rest) => Yield(
                command,
                Co::new(Next {
                    slot,
                    running: Some((rest, flight)),
                    first: None,
                    _marker,
                }),
            ),
            Return(result) => {
                drop(flight);
                Return(result.map(|()| None))
            }
        }
    }
}
