use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use tracing::debug;
use tracing::warn;

use crate::catch::Catch;
use crate::child::Rejecter;
use crate::child::Resolver;
use crate::co::Co;
use crate::error::Error;
use crate::from_fn::lazy;
use crate::just_return::fail;
use crate::just_return::ready;
use crate::launch::launch;
use crate::primitives::once;
use crate::primitives::reject;
use crate::primitives::resolve;

enum State<T> {
    Loading(Vec<(Resolver<T>, Rejecter)>),
    Loaded(T),
    Failed(Error),
}

/// A value produced once by a loader coroutine and handed to everyone who
/// asks for it.
///
/// The loader starts running as soon as the `Loading` is created. Callers of
/// [`get()`](Loading::get) before it finishes wait for it; later callers get
/// a clone of the value right away. If the loader fails, every `get()` fails
/// with that error.
///
/// ```rust
/// use cosync::Loading;
/// use cosync::ready;
///
/// let config = Loading::new(ready("loaded"));
/// assert_eq!(config.get_sync(), Some("loaded"));
/// ```
pub struct Loading<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T> Clone for Loading<T> {
    fn clone(&self) -> Self {
        Loading {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: Clone + 'static> Loading<T> {
    pub fn new(loader: Co<T>) -> Self {
        let state = Rc::new(RefCell::new(State::Loading(Vec::new())));
        let on_value = Rc::clone(&state);
        let on_error = Rc::clone(&state);
        let started = launch(loader)
            .try_on_complete(move |value: T| {
                settle(&on_value, State::Loaded(value.clone()), |waiter| {
                    waiter.0.resolve(value.clone())
                })
            })
            .catch(Catch::forward(move |error: Error| {
                settle(&on_error, State::Failed(error.clone()), |waiter| {
                    waiter.1.reject(error.clone())
                })
            }))
            .start();
        // Nobody can be waiting yet, so waking cannot have failed.
        if let Err(error) = started {
            warn!(%error, "starting loader failed");
        }
        Loading { state }
    }

    /// Waits for the loader and returns a clone of its value.
    pub fn get(&self) -> Co<T> {
        let state = Rc::clone(&self.state);
        lazy(move || {
            match &*state.borrow() {
                State::Loaded(value) => return ready(value.clone()),
                State::Failed(error) => return fail(error.clone()),
                State::Loading(_) => {}
            }
            resolve::<T>().and_then(move |resolver| {
                reject().and_then(move |rejecter| {
                    if let State::Loading(waiters) = &mut *state.borrow_mut() {
                        waiters.push((resolver, rejecter));
                    }
                    once()
                })
            })
        })
    }

    /// The value, if the loader has finished successfully.
    pub fn get_sync(&self) -> Option<T> {
        match &*self.state.borrow() {
            State::Loaded(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn get_sync_or(&self, default: T) -> T {
        self.get_sync().unwrap_or(default)
    }
}

/// Stores the final state and wakes every waiter, reporting the first
/// unhandled error any of them raised.
fn settle<T>(
    state: &RefCell<State<T>>,
    settled: State<T>,
    mut wake: impl FnMut(&(Resolver<T>, Rejecter)) -> Result<(), Error>,
) -> Result<(), Error> {
    let waiters = match mem::replace(&mut *state.borrow_mut(), settled) {
        State::Loading(waiters) => waiters,
        _ => Vec::new(),
    };
    debug!(waiters = waiters.len(), "loader settled");
    let mut first_error = None;
    for waiter in &waiters {
        if let Err(error) = wake(waiter) {
            first_error.get_or_insert(error);
        }
    }
    first_error.map_or(Ok(()), Err)
}
