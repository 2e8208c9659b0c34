use Suspend::Return;

use crate::co::Co;
use crate::error::Error;
use crate::from_fn::from_fn;
use crate::suspend::Suspend;

/// Create a coroutine that just returns a value without ever suspending.
///
/// ```rust
/// use cosync::CoroAssertions;
/// use cosync::Resume;
/// use cosync::ready;
///
/// ready("done").assert_returns(Resume::Continue, "done");
/// ```
pub fn ready<T: 'static>(value: T) -> Co<T> {
    from_fn(move |_| Return(Ok(value)))
}

/// Create a coroutine that fails with `error` without ever suspending.
pub fn fail<T: 'static>(error: Error) -> Co<T> {
    from_fn(move |_| Return(Err(error)))
}

pub fn from_result<T: 'static>(result: Result<T, Error>) -> Co<T> {
    from_fn(move |_| Return(result))
}
