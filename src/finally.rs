use Suspend::*;

use crate::co::Co;
use crate::co::Coroutine;
use crate::co::Step;
use crate::command::Resume;
use crate::coro::Coro;
use crate::suspend::Suspend;

/// Runs a closure when dropped, unless it was already run or disarmed.
pub(crate) struct Guard<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Guard<F> {
    pub(crate) fn new(f: F) -> Self {
        Guard(Some(f))
    }

    pub(crate) fn run(mut self) {
        if let Some(f) = self.0.take() {
            f()
        }
    }

    pub(crate) fn disarm(mut self) {
        self.0 = None;
    }
}

impl<F: FnOnce()> Drop for Guard<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f()
        }
    }
}

pub(crate) struct Finally<T, F: FnOnce()> {
    inner: Co<T>,
    guard: Guard<F>,
}

impl<T, F: FnOnce()> Finally<T, F> {
    pub(crate) fn new(inner: Co<T>, guard: Guard<F>) -> Self {
        Finally { inner, guard }
    }
}

impl<T, F> Coroutine<T> for Finally<T, F>
where
    T: 'static,
    F: FnOnce() + 'static,
{
    fn resume_boxed(self: Box<Self>, input: Resume) -> Step<T> {
        let Finally { inner, guard } = *self;
        match inner.resume(input) {
            Yield(command, next) => {
                Yield(command, Co::new(Finally::new(next, guard)))
            }
            Return(result) => {
                guard.run();
                Return(result)
            }
        }
    }
}
