use Suspend::*;

use crate::co::Co;
use crate::co::Coroutine;
use crate::co::Step;
use crate::command::Resume;
use crate::coro::Coro;
use crate::error::Error;
use crate::suspend::Suspend;

pub(crate) struct Then<T, F> {
    first: Co<T>,
    f: F,
}

impl<T, F> Then<T, F> {
    pub(crate) fn new(first: Co<T>, f: F) -> Self {
        Then { first, f }
    }
}

impl<T, U, F> Coroutine<U> for Then<T, F>
where
    T: 'static,
    U: 'static,
    F: FnOnce(Result<T, Error>) -> Co<U> + 'static,
{
    fn resume_boxed(self: Box<Self>, input: Resume) -> Step<U> {
        let Then { first, f } = *self;
        match first.resume(input) {
            Yield(command, next) => Yield(command, Co::new(Then::new(next, f))),
            // Once the first coroutine returns, the second one replaces this
            // state entirely, so chains do not nest deeper per step.
            Return(result) => f(result).resume(Resume::Continue),
        }
    }
}
