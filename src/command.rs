use std::any::Any;
use std::any::type_name;
use std::fmt;

use crate::child::Callback;
use crate::co::Co;
use crate::error::Error;

/// A dynamically typed value crossing the engine boundary. The typed
/// primitives downcast it back on the coroutine side.
pub type Value = Box<dyn Any>;

pub(crate) fn downcast<T: 'static>(value: Value) -> Result<T, Error> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| Error::TypeMismatch {
            expected: type_name::<T>(),
        })
}

/// What a coroutine yields to the engine driving it.
pub enum Command {
    /// Create a pending child and hand back a callback resolving it.
    Resolve,
    /// Like `Resolve`, but the callback takes a list of arguments.
    ResolveMulti,
    /// Hand back a callback rejecting the child made by the preceding
    /// `Resolve`.
    Reject,
    /// Wait for the only pending child.
    Once,
    /// Wait for every pending child, in queue order.
    All,
    /// Wait for whichever pending child settles first.
    Race,
    /// Run a nested coroutine in its own engine and wait for it.
    Await(Co<Value>),
    /// A value produced for a [`Traverser`](crate::Traverser). An engine
    /// receiving this directly rejects with an unknown-command error.
    Emit(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Resolve,
    ResolveMulti,
    Reject,
    Once,
    All,
    Race,
    Await,
    Emit,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Resolve => CommandKind::Resolve,
            Command::ResolveMulti => CommandKind::ResolveMulti,
            Command::Reject => CommandKind::Reject,
            Command::Once => CommandKind::Once,
            Command::All => CommandKind::All,
            Command::Race => CommandKind::Race,
            Command::Await(_) => CommandKind::Await,
            Command::Emit(_) => CommandKind::Emit,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.kind(), f)
    }
}

/// What the engine resumes a coroutine with.
pub enum Resume {
    /// Nothing to report: the first resume, or the resume after an `Emit`.
    Continue,
    Value(Value),
    Values(Vec<Value>),
    Resolver(Callback),
    MultiResolver(Callback),
    Rejecter(Callback),
    /// Resume by raising an error at the suspension point.
    Throw(Error),
}

impl Resume {
    pub fn value<T: 'static>(value: T) -> Self {
        Resume::Value(Box::new(value))
    }

    /// Splits off `Throw`, which every suspension point treats as a failure.
    pub fn into_result(self) -> Result<Self, Error> {
        match self {
            Resume::Throw(error) => Err(error),
            other => Ok(other),
        }
    }

    pub fn into_value<T: 'static>(self) -> Result<T, Error> {
        match self.into_result()? {
            Resume::Value(value) => downcast(value),
            _ => Err(Error::UnexpectedResume { expected: "a value" }),
        }
    }

    pub fn into_values<T: 'static>(self) -> Result<Vec<T>, Error> {
        match self.into_result()? {
            Resume::Values(values) => {
                values.into_iter().map(downcast::<T>).collect()
            }
            _ => Err(Error::UnexpectedResume {
                expected: "a list of values",
            }),
        }
    }

    pub fn into_callback(self) -> Result<Callback, Error> {
        match self.into_result()? {
            Resume::Resolver(callback)
            | Resume::MultiResolver(callback)
            | Resume::Rejecter(callback) => Ok(callback),
            _ => Err(Error::UnexpectedResume {
                expected: "a callback",
            }),
        }
    }
}

impl From<Result<Value, Error>> for Resume {
    fn from(outcome: Result<Value, Error>) -> Self {
        match outcome {
            Ok(value) => Resume::Value(value),
            Err(error) => Resume::Throw(error),
        }
    }
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resume::Continue => f.write_str("Continue"),
            Resume::Value(_) => f.write_str("Value(..)"),
            Resume::Values(values) => {
                write!(f, "Values(len = {})", values.len())
            }
            Resume::Resolver(_) => f.write_str("Resolver"),
            Resume::MultiResolver(_) => f.write_str("MultiResolver"),
            Resume::Rejecter(_) => f.write_str("Rejecter"),
            Resume::Throw(error) => {
                f.debug_tuple("Throw").field(error).finish()
            }
        }
    }
}
