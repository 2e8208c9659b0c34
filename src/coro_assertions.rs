use core::fmt::Debug;

use crate::command::Command;
use crate::command::CommandKind;
use crate::command::Resume;
use crate::coro::Coro;
use crate::error::Error;
use crate::suspend::Suspend::Return;
use crate::suspend::Suspend::Yield;

/// Extension trait providing assertion methods for stepping coroutines by
/// hand in tests.
///
/// Each assertion resumes the coroutine once with `input`. Commands are
/// compared by [`CommandKind`], since a yielded command may carry a value or
/// a nested coroutine that cannot be compared:
///
/// ```rust
/// use cosync::CommandKind;
/// use cosync::CoroAssertions;
/// use cosync::Resume;
/// use cosync::once;
///
/// once::<i32>()
///     .assert_yields(Resume::Continue, CommandKind::Once)
///     .assert_returns(Resume::value(5), 5);
/// ```
pub trait CoroAssertions<T>: Coro<Resume, Command, Result<T, Error>> {
    /// Asserts that the coroutine yields a command of the expected kind and
    /// returns the suspended rest of it. Panics if it returns instead.
    fn assert_yields(self, input: Resume, expected: CommandKind) -> Self::Next
    where
        T: Debug,
    {
        match self.resume(input) {
            Yield(actual, next) => {
                assert_eq!(
                    actual.kind(),
                    expected,
                    "expected Yield({expected:?}), got Yield({actual:?})"
                );
                next
            }
            Return(actual) => {
                panic!("expected Yield({expected:?}), got Return({actual:?})")
            }
        }
    }

    /// Asserts that the coroutine returns the expected value.
    fn assert_returns(self, input: Resume, expected: T)
    where
        T: PartialEq + Debug,
    {
        match self.resume(input) {
            Yield(actual, _) => {
                panic!("expected Return({expected:?}), got Yield({actual:?})")
            }
            Return(Ok(actual)) => assert_eq!(
                actual, expected,
                "expected Return({expected:?}), got Return({actual:?})"
            ),
            Return(Err(error)) => {
                panic!("expected Return({expected:?}), got error: {error}")
            }
        }
    }

    /// Asserts that the coroutine fails and returns the error for further
    /// inspection.
    fn assert_fails(self, input: Resume) -> Error
    where
        T: Debug,
    {
        match self.resume(input) {
            Yield(actual, _) => {
                panic!("expected an error, got Yield({actual:?})")
            }
            Return(Ok(actual)) => {
                panic!("expected an error, got Return({actual:?})")
            }
            Return(Err(error)) => error,
        }
    }
}

/// Blanket implementation of [`CoroAssertions`] for every coroutine of the
/// command protocol.
impl<T, C> CoroAssertions<T> for C where
    C: Coro<Resume, Command, Result<T, Error>>
{
}
