use Suspend::Return;

use crate::co::Co;
use crate::co::Coroutine;
use crate::co::Step;
use crate::command::Resume;
use crate::coro::Coro;
use crate::suspend::Suspend;

pub(crate) struct FromFn<F>(F);

impl<T, F> Coroutine<T> for FromFn<F>
where
    F: FnOnce(Resume) -> Step<T> + 'static,
{
    fn resume_boxed(self: Box<Self>, input: Resume) -> Step<T> {
        let Self(f) = *self;
        f(input)
    }
}

/// Creates a coroutine from a function that returns a [`Step`].
///
/// This is the most direct way to write a coroutine step by step: the
/// function receives the input of the first resume and either yields a
/// command together with the rest of the coroutine, or returns.
///
/// This function is an implementation detail in many primitives. However,
/// it's often preferable to compose the primitives with
/// [`and_then()`](Co::and_then) instead.
///
/// # Examples
///
/// ```rust
/// use cosync::CommandKind;
/// use cosync::CoroAssertions;
/// use cosync::Command;
/// use cosync::Resume;
/// use cosync::{Return, Yield};
/// use cosync::from_fn;
///
/// // Waits for a single pending child, then doubles its value.
/// let double = from_fn(|_| {
///     Yield(
///         Command::Once,
///         from_fn(|input: Resume| {
///             Return(input.into_value::<i32>().map(|x| x * 2))
///         }),
///     )
/// });
/// double
///     .assert_yields(Resume::Continue, CommandKind::Once)
///     .assert_returns(Resume::value(21), 42);
/// ```
pub fn from_fn<T, F>(f: F) -> Co<T>
where
    T: 'static,
    F: FnOnce(Resume) -> Step<T> + 'static,
{
    Co::new(FromFn(f))
}

/// Defers building a coroutine until it is first resumed.
///
/// Primitives whose first action inspects shared state (a channel's queues, a
/// mutex's owner) are built with `lazy` so that the inspection happens when
/// the engine runs them, not when the coroutine value is created. Throwing
/// into a coroutine that has not started yet fails it without calling `f`.
pub fn lazy<T, F>(f: F) -> Co<T>
where
    T: 'static,
    F: FnOnce() -> Co<T> + 'static,
{
    from_fn(move |input| match input {
        Resume::Throw(error) => Return(Err(error)),
        input => f().resume(input),
    })
}
