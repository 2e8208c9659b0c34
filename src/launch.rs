use std::rc::Rc;

use crate::catch::Catch;
use crate::co::Co;
use crate::command::Value;
use crate::command::downcast;
use crate::engine::Completion;
use crate::engine::Engine;
use crate::engine::Status;
use crate::error::Error;

/// Builder for starting a coroutine in a new engine.
///
/// Nothing runs until [`start()`](Launch::start), which drives the coroutine
/// until it first suspends, completes or fails. A coroutine that completes
/// without suspending has its completion callback called before `start()`
/// returns.
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use cosync::launch;
/// use cosync::ready;
///
/// let seen = Rc::new(Cell::new(0));
/// let sink = Rc::clone(&seen);
/// launch(ready(7))
///     .on_complete(move |value| sink.set(value))
///     .start()
///     .unwrap();
/// assert_eq!(seen.get(), 7);
/// ```
#[must_use = "a coroutine does not run until `start()` is called"]
pub struct Launch<T> {
    coroutine: Co<T>,
    on_complete: Option<Box<dyn FnOnce(T) -> Result<(), Error>>>,
    catch: Catch,
}

/// Prepares `coroutine` to run in its own engine.
pub fn launch<T: 'static>(coroutine: Co<T>) -> Launch<T> {
    Launch {
        coroutine,
        on_complete: None,
        catch: Catch::new(),
    }
}

/// Like [`launch()`], taking a function that produces the coroutine.
pub fn launch_with<T, F>(f: F) -> Launch<T>
where
    T: 'static,
    F: FnOnce() -> Co<T>,
{
    launch(f())
}

impl<T: 'static> Launch<T> {
    pub fn on_complete(self, f: impl FnOnce(T) + 'static) -> Self {
        self.try_on_complete(move |value| {
            f(value);
            Ok(())
        })
    }

    /// A completion callback whose own failure surfaces from whichever call
    /// completed the coroutine.
    pub fn try_on_complete(
        mut self,
        f: impl FnOnce(T) -> Result<(), Error> + 'static,
    ) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn catch(mut self, catch: Catch) -> Self {
        self.catch = catch;
        self
    }

    /// Handles every rejection with `f`.
    pub fn on_error(self, f: impl FnOnce(Error) + 'static) -> Self {
        self.catch(Catch::any(f))
    }

    /// Starts the engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unhandled`] when the coroutine is rejected during this
    /// call and no arm of its [`Catch`] matches, or when something this call
    /// woke up failed that way.
    pub fn start(self) -> Result<Handle, Error> {
        let Launch {
            coroutine,
            on_complete,
            catch,
        } = self;
        let on_complete = on_complete.map(|f| -> Completion {
            Box::new(move |value: Value| f(downcast::<T>(value)?))
        });
        let engine = Engine::start(coroutine.erase(), on_complete, catch)?;
        Ok(Handle { engine })
    }
}

/// A view of a started engine.
///
/// Holding a handle keeps the engine alive but does not drive it; dropping
/// the handle does not cancel it.
pub struct Handle {
    engine: Rc<Engine>,
}

impl Handle {
    pub fn status(&self) -> Status {
        self.engine.status()
    }

    pub fn is_done(&self) -> bool {
        !matches!(self.status(), Status::Running | Status::Sleeping)
    }

    /// Stops the coroutine where it is suspended. Its cleanup runs, its
    /// pending callbacks become no-ops, and no completion callback or handler
    /// is called. Does nothing once the coroutine finished.
    pub fn cancel(&self) {
        self.engine.cancel();
    }
}
