use core::ops::ControlFlow;

use ControlFlow::*;
use Suspend::*;
use either::Either;
use either::Either::Left;
use either::Either::Right;

use crate::co::Co;
use crate::co::Coroutine;
use crate::co::Step;
use crate::command::Resume;
use crate::coro::Coro;
use crate::suspend::Suspend;

struct LoopWith<S, R, F> {
    current: Either<S, Co<ControlFlow<R, S>>>,
    body: F,
}

impl<S, R, F> Coroutine<R> for LoopWith<S, R, F>
where
    S: 'static,
    R: 'static,
    F: FnMut(S) -> Co<ControlFlow<R, S>> + 'static,
{
    fn resume_boxed(self: Box<Self>, input: Resume) -> Step<R> {
        let LoopWith { current, mut body } = *self;
        let mut current = match current {
            Left(state) => body(state),
            Right(iteration) => iteration,
        };
        let mut input = input;
        loop {
            match current.resume(input) {
                Yield(command, next) => {
                    let current = Right(next);
                    return Yield(command, Co::new(LoopWith { current, body }));
                }
                Return(Err(error)) => return Return(Err(error)),
                Return(Ok(Break(r))) => return Return(Ok(r)),
                Return(Ok(Continue(state))) => {
                    current = body(state);
                    input = Resume::Continue;
                }
            }
        }
    }
}

/// Creates a looping coroutine from a function that returns a coroutine of
/// [`ControlFlow`].
///
/// The provided function `body` is called with the loop state to build each
/// iteration.
/// - If an iteration returns `ControlFlow::Continue(s)`, the next iteration
///   starts with state `s`.
/// - If an iteration returns `ControlFlow::Break(r)`, the loop returns `r`.
/// - If an iteration fails, the loop fails.
///
/// Iterations that finish without suspending run in a plain loop, so a long
/// run of them does not grow the stack the way recursive `and_then()` chains
/// would.
///
/// # Examples
///
/// ```rust
/// use core::ops::ControlFlow;
///
/// use cosync::CoroAssertions;
/// use cosync::Resume;
/// use cosync::loop_with;
/// use cosync::ready;
///
/// loop_with(0, |n| {
///     ready(if n < 10_000 {
///         ControlFlow::Continue(n + 1)
///     } else {
///         ControlFlow::Break(n)
///     })
/// })
/// .assert_returns(Resume::Continue, 10_000);
/// ```
pub fn loop_with<S, R, F>(init: S, body: F) -> Co<R>
where
    S: 'static,
    R: 'static,
    F: FnMut(S) -> Co<ControlFlow<R, S>> + 'static,
{
    Co::new(LoopWith {
        current: Left(init),
        body,
    })
}
