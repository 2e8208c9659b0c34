/// What a single `resume()` call left behind.
///
/// A coroutine driven by an engine either stops at a command it needs
/// answered, handing back the rest of itself to resume once the answer is
/// known, or finishes:
///
///   * `Yield(command, rest)`: the engine interprets `command` and later
///     resumes `rest` with the answer.
///   * `Return(outcome)`: the coroutine is done. Nothing is handed back, so
///     a finished coroutine cannot be resumed by accident.
///
/// For coroutines driven by the engine, `Y` is a
/// [`Command`](crate::Command) and `R` is a `Result` whose error side is the
/// rejection of the coroutine.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Suspend<Y, R, N> {
    Yield(Y, N),
    Return(R),
}

use Suspend::*;

impl<Y, R, N> Suspend<Y, R, N> {
    /// The yielded command together with the rest of the coroutine, or `None`
    /// if it finished.
    pub fn into_yield(self) -> Option<(Y, N)> {
        match self {
            Yield(command, rest) => Some((command, rest)),
            Return(_) => None,
        }
    }

    /// The outcome of a finished coroutine, or `None` if it only suspended.
    /// Dropping the suspended rest cancels it.
    pub fn into_return(self) -> Option<R> {
        match self {
            Yield(..) => None,
            Return(outcome) => Some(outcome),
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Return(_))
    }

    /// Rewraps the rest of a suspended coroutine, leaving an outcome alone.
    pub fn map_next<N2>(self, f: impl FnOnce(N) -> N2) -> Suspend<Y, R, N2> {
        match self {
            Yield(command, rest) => Yield(command, f(rest)),
            Return(outcome) => Return(outcome),
        }
    }
}
