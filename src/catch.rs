use std::error::Error as StdError;

use tracing::warn;

use crate::error::Error;

type Predicate = Box<dyn Fn(&Error) -> bool>;
type Handler = Box<dyn FnOnce(Error) -> Result<(), Error>>;

struct Arm {
    matches: Predicate,
    handler: Handler,
}

/// The ordered handlers an engine tries when its coroutine is rejected.
///
/// Arms are tried in the order they were added; the first whose predicate
/// matches receives the error. If none matches, the rejection is unhandled
/// and surfaces as [`Error::Unhandled`] from the call that caused it.
///
/// ```rust
/// use cosync::Catch;
/// use cosync::Error;
///
/// let catch = Catch::new()
///     .when(Error::is_protocol, |error| panic!("misused: {error}"))
///     .otherwise(|error| eprintln!("failed: {error}"));
/// # drop(catch);
/// ```
#[derive(Default)]
pub struct Catch {
    arms: Vec<Arm>,
}

impl Catch {
    pub fn new() -> Self {
        Catch { arms: Vec::new() }
    }

    /// A catch with a single wildcard arm.
    pub fn any(handler: impl FnOnce(Error) + 'static) -> Self {
        Catch::new().otherwise(handler)
    }

    pub fn when(
        self,
        predicate: impl Fn(&Error) -> bool + 'static,
        handler: impl FnOnce(Error) + 'static,
    ) -> Self {
        self.arm(predicate, move |error| {
            handler(error);
            Ok(())
        })
    }

    /// Matches user errors whose wrapped value is an `E`.
    pub fn on<E: StdError + 'static>(
        self,
        handler: impl FnOnce(Error) + 'static,
    ) -> Self {
        self.when(|error| error.downcast_ref::<E>().is_some(), handler)
    }

    /// The wildcard arm.
    pub fn otherwise(self, handler: impl FnOnce(Error) + 'static) -> Self {
        self.when(|_| true, handler)
    }

    /// A wildcard arm whose handler can itself fail, used to forward a
    /// rejection into another engine.
    pub(crate) fn forward(
        handler: impl FnOnce(Error) -> Result<(), Error> + 'static,
    ) -> Self {
        Catch::new().arm(|_| true, handler)
    }

    fn arm(
        mut self,
        predicate: impl Fn(&Error) -> bool + 'static,
        handler: impl FnOnce(Error) -> Result<(), Error> + 'static,
    ) -> Self {
        self.arms.push(Arm {
            matches: Box::new(predicate),
            handler: Box::new(handler),
        });
        self
    }

    pub(crate) fn handle(self, error: Error) -> Result<(), Error> {
        match self.arms.into_iter().find(|arm| (arm.matches)(&error)) {
            Some(arm) => (arm.handler)(error),
            None => {
                warn!(%error, "unhandled rejection");
                Err(error.unhandled())
            }
        }
    }
}
