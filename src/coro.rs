use crate::map_return::MapReturn;
use crate::suspend::Suspend;

/// A coroutine that can be resumed with an input value of type `I`, returning
/// a suspended state that either "yields" a value of type `Y` or "returns" a
/// value of type `R`.
///
/// The `resume()` method consumes the coroutine. It gives the caller a new
/// coroutine instance to continue `resume()`-ing *only* if the coroutine
/// yielded a value. If the coroutine returned instead, no new coroutine is
/// provided back to the caller, so it is impossible to continue the coroutine
/// after it has returned. The engine relies on this: a coroutine is resumed
/// at most once per command it yielded, because the state that could be
/// resumed again is handed out exactly once.
///
/// Most coroutines in this crate are [`Co`](crate::Co) values built with
/// combinators, whose `Next` is again a `Co`. Hand-written state machines can
/// implement this trait with `Next = Self` and be handed to the engine with
/// [`Co::from_coro()`](crate::Co::from_coro).
pub trait Coro<I, Y, R>: Sized {
    /// The next state of the coroutine after a call to `resume()`, if the
    /// coroutine yields a value.
    ///
    /// When `Next` is `Self`, the coroutine is a "fixed-point coroutine".
    type Next: Coro<I, Y, R>;

    /// Advances the coroutine to the next state, returning a suspended state
    /// that either "yields" a value of type `Y` or "returns" a value of type
    /// `R`.
    fn resume(self, input: I) -> Suspend<Y, R, Self::Next>;

    /// Calls the provided closure on the *return value* of this coroutine. The
    /// resulting coroutine will return the result of the closure.
    ///
    /// Because coroutines can only return once, the closure type is `FnOnce`.
    /// This allows you to do things in the closure that can only be done once,
    /// like freeing a resource or resuming another coroutine.
    ///
    /// Note that this is *lazy*, meaning that the closure does not execute
    /// until the coroutine is resumed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cosync::Coro;
    /// use cosync::CoroAssertions;
    /// use cosync::Resume;
    /// use cosync::ready;
    ///
    /// ready(10)
    ///     .map_return(|r| r.map(|x| x * 2))
    ///     .assert_returns(Resume::Continue, 20);
    /// ```
    fn map_return<R2, F>(self, f: F) -> MapReturn<R, Self, F>
    where
        F: FnOnce(R) -> R2,
    {
        MapReturn::new(self, f)
    }
}
