use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Misuse of the command vocabulary by a coroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error(
        "cannot yield Reject without yielding Resolve first; they must be \
         yielded in pairs"
    )]
    UnpairedReject,
    #[error("yielded Once when the pending queue size is {0} != 1")]
    OnceQueueSize(usize),
    #[error("yielded Race when there is nothing racing")]
    EmptyRace,
    #[error("unknown yield value")]
    UnknownCommand,
}

/// What the coroutine attempted while callbacks it was handed were still
/// waiting to be consumed through `Once`, `All` or `Race`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnawaitedCallback {
    Resolution,
    YieldingCoroutine,
}

impl fmt::Display for UnawaitedCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            Self::Resolution => "resolution of a coroutine",
            Self::YieldingCoroutine => "yielding a coroutine",
        };
        write!(
            f,
            "{action} is disallowed when Resolve or Reject was yielded but is \
             not awaited through Once, All or Race"
        )
    }
}

/// Every failure a coroutine can be rejected with or that can leave the
/// library.
///
/// User errors are carried behind an `Rc` so that an error can be handed to
/// several waiters (see [`Loading`](crate::Loading)) without requiring user
/// error types to be `Clone`.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("{0}")]
    UnawaitedCallback(UnawaitedCallback),
    #[error("unhandled async error: {0}")]
    Unhandled(Box<Error>),
    #[error("attempt to release a released mutex")]
    MutexReleased,
    #[error(
        "a subscriber has been lagging for {0} items; was its traverser \
         dropped or interrupted?"
    )]
    SubscriberLag(usize),
    #[error("coroutine was interrupted")]
    Interrupted,
    #[error("coroutine did not terminate after {0} interrupts")]
    InterruptLimit(usize),
    #[error("traverser is already being advanced by another caller")]
    TraverserBusy,
    #[error("cannot {0} an empty set of coroutines")]
    EmptyCombinator(&'static str),
    #[error("expected a value of type {expected}")]
    TypeMismatch { expected: &'static str },
    #[error("expected to be resumed with {expected}")]
    UnexpectedResume { expected: &'static str },
    #[error("{0}")]
    Custom(Rc<dyn StdError>),
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

impl Error {
    /// Wraps a user error.
    pub fn custom(error: impl StdError + 'static) -> Self {
        Self::Custom(Rc::new(error))
    }

    /// A user error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::custom(Message(message.into()))
    }

    /// Returns the wrapped user error if it is an `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::Custom(inner) => inner.downcast_ref::<E>(),
            Self::Unhandled(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Marks an error as having escaped every handler. Already unhandled
    /// errors are passed through so that nesting does not stack wrappers.
    pub(crate) fn unhandled(self) -> Self {
        match self {
            Self::Unhandled(_) => self,
            other => Self::Unhandled(Box::new(other)),
        }
    }
}

impl From<UnawaitedCallback> for Error {
    fn from(action: UnawaitedCallback) -> Self {
        Self::UnawaitedCallback(action)
    }
}
