use crate::and_then::Then;
use crate::command::Command;
use crate::command::Resume;
use crate::command::Value;
use crate::coro::Coro;
use crate::error::Error;
use crate::finally::Finally;
use crate::finally::Guard;
use crate::just_return::fail;
use crate::just_return::ready;
use crate::suspend::Suspend;

/// The result of resuming a [`Co<T>`] once.
pub type Step<T> = Suspend<Command, Result<T, Error>, Co<T>>;

/// The object-safe face of a coroutine that the engine can drive.
///
/// Implementors receive themselves boxed so that each step can move its state
/// into the next one.
pub trait Coroutine<T>: 'static {
    fn resume_boxed(self: Box<Self>, input: Resume) -> Step<T>;
}

/// A type-erased coroutine yielding [`Command`]s and returning
/// `Result<T, Error>`.
///
/// `Co` is what the engine drives and what every primitive in this crate
/// returns. It implements [`Coro`] with `Next = Co<T>`, so a suspended `Co`
/// can be resumed exactly once per yielded command.
///
/// Coroutines are lazy: nothing runs until the first resume, which is always
/// made with [`Resume::Continue`]. Dropping a suspended `Co` cancels it,
/// running any cleanup registered with [`finally()`](Co::finally) along the
/// way.
///
/// ```rust
/// use cosync::Coro;
/// use cosync::CoroAssertions;
/// use cosync::Resume;
/// use cosync::ready;
///
/// ready(2)
///     .map(|x| x + 1)
///     .and_then(|x| ready(x * 10))
///     .assert_returns(Resume::Continue, 30);
/// ```
pub struct Co<T>(Box<dyn Coroutine<T>>);

impl<T: 'static> Coro<Resume, Command, Result<T, Error>> for Co<T> {
    type Next = Co<T>;
    fn resume(self, input: Resume) -> Step<T> {
        self.0.resume_boxed(input)
    }
}

struct FixedPoint<C>(C);

impl<T, C> Coroutine<T> for FixedPoint<C>
where
    T: 'static,
    C: Coro<Resume, Command, Result<T, Error>, Next = C> + 'static,
{
    fn resume_boxed(self: Box<Self>, input: Resume) -> Step<T> {
        self.0.resume(input).map_next(Co::from_coro)
    }
}

impl<T: 'static> Co<T> {
    pub fn new(coroutine: impl Coroutine<T>) -> Self {
        Co(Box::new(coroutine))
    }

    /// Erases a fixed-point [`Coro`] implementation.
    pub fn from_coro<C>(coro: C) -> Self
    where
        C: Coro<Resume, Command, Result<T, Error>, Next = C> + 'static,
    {
        Co::new(FixedPoint(coro))
    }

    /// Runs `f` on the outcome of this coroutine, then continues as the
    /// coroutine `f` returns.
    ///
    /// This is the general form of sequencing; [`and_then()`](Co::and_then)
    /// and [`or_else()`](Co::or_else) are built on it. The continuation starts
    /// within the same step in which this coroutine returned.
    pub fn then<U, F>(self, f: F) -> Co<U>
    where
        U: 'static,
        F: FnOnce(Result<T, Error>) -> Co<U> + 'static,
    {
        Co::new(Then::new(self, f))
    }

    /// Continues with the coroutine built from this one's value. An error
    /// skips `f` and is returned as is.
    pub fn and_then<U, F>(self, f: F) -> Co<U>
    where
        U: 'static,
        F: FnOnce(T) -> Co<U> + 'static,
    {
        self.then(|result| match result {
            Ok(value) => f(value),
            Err(error) => fail(error),
        })
    }

    /// Recovers from an error, whether returned by this coroutine or thrown
    /// into it at a suspension point.
    ///
    /// ```rust
    /// use cosync::Coro;
    /// use cosync::CoroAssertions;
    /// use cosync::Error;
    /// use cosync::Resume;
    /// use cosync::fail;
    /// use cosync::ready;
    ///
    /// fail::<i32>(Error::msg("boom"))
    ///     .or_else(|error| ready(error.to_string().len() as i32))
    ///     .assert_returns(Resume::Continue, 4);
    /// ```
    pub fn or_else<F>(self, f: F) -> Co<T>
    where
        F: FnOnce(Error) -> Co<T> + 'static,
    {
        self.then(|result| match result {
            Ok(value) => ready(value),
            Err(error) => f(error),
        })
    }

    pub fn map<U, F>(self, f: F) -> Co<U>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        Co::from_coro(self.map_return(|result: Result<T, Error>| result.map(f)))
    }

    pub fn try_map<U, F>(self, f: F) -> Co<U>
    where
        U: 'static,
        F: FnOnce(T) -> Result<U, Error> + 'static,
    {
        Co::from_coro(
            self.map_return(|result: Result<T, Error>| result.and_then(f)),
        )
    }

    /// Runs `cleanup` once this coroutine finishes, successfully or not, or
    /// when it is dropped while suspended.
    pub fn finally<F>(self, cleanup: F) -> Co<T>
    where
        F: FnOnce() + 'static,
    {
        Co::new(Finally::new(self, Guard::new(cleanup)))
    }

    /// Boxes the return value, for handing the coroutine to an engine.
    pub fn erase(self) -> Co<Value> {
        self.map(|value| Box::new(value) as Value)
    }
}
