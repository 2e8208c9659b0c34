//! One function per command of the protocol, typed on the coroutine side.

use Suspend::*;

use crate::child::MultiResolver;
use crate::child::Rejecter;
use crate::child::Resolver;
use crate::co::Co;
use crate::command::Command;
use crate::command::Resume;
use crate::from_fn::from_fn;
use crate::suspend::Suspend;

/// Yields `command` and returns whatever the engine resumes with. A thrown
/// error fails the coroutine.
pub fn suspend(command: Command) -> Co<Resume> {
    from_fn(move |_| {
        Yield(command, from_fn(|input: Resume| Return(input.into_result())))
    })
}

/// Creates a pending child in the driving engine and returns its resolver.
///
/// Must be followed by [`once()`], [`all()`] or [`race()`] before the
/// coroutine returns, or the coroutine is rejected with an unawaited-callback
/// error.
pub fn resolve<T: 'static>() -> Co<Resolver<T>> {
    suspend(Command::Resolve)
        .try_map(|input| input.into_callback().map(Resolver::new))
}

pub fn resolve_multi<T: 'static>() -> Co<MultiResolver<T>> {
    suspend(Command::ResolveMulti)
        .try_map(|input| input.into_callback().map(MultiResolver::new))
}

/// Returns a rejecter for the child made by the immediately preceding
/// [`resolve()`]. Without one, the coroutine is rejected with
/// [`ProtocolError::UnpairedReject`](crate::ProtocolError::UnpairedReject).
pub fn reject() -> Co<Rejecter> {
    suspend(Command::Reject)
        .try_map(|input| input.into_callback().map(Rejecter::new))
}

/// Waits for the only pending child.
pub fn once<T: 'static>() -> Co<T> {
    suspend(Command::Once).try_map(Resume::into_value)
}

/// Waits for every pending child and returns their values in the order the
/// children were created. The first rejection in that order wins.
pub fn all<T: 'static>() -> Co<Vec<T>> {
    suspend(Command::All).try_map(Resume::into_values)
}

/// Waits for the first pending child to settle.
///
/// Among children that had already settled when `race()` was reached, the
/// earliest created wins. Otherwise whichever settles first wins. The other
/// children are cancelled either way.
pub fn race<T: 'static>() -> Co<T> {
    suspend(Command::Race).try_map(Resume::into_value)
}

/// Runs `coroutine` in a child engine and waits for it.
pub fn delegate<T: 'static>(coroutine: Co<T>) -> Co<T> {
    suspend(Command::Await(coroutine.erase())).try_map(Resume::into_value)
}

/// Produces a value for the [`Traverser`](crate::Traverser) driving this
/// coroutine.
pub fn emit<T: 'static>(value: T) -> Co<()> {
    suspend(Command::Emit(Box::new(value))).map(|_| ())
}

/// Adapts a callback-based API: `f` receives the resolver and rejecter of a
/// fresh child, and the coroutine waits for that child.
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use cosync::launch;
/// use cosync::promise;
///
/// let stash = Rc::new(RefCell::new(None));
/// let slot = Rc::clone(&stash);
/// let got = Rc::new(RefCell::new(None));
/// let sink = Rc::clone(&got);
/// launch(promise(move |resolve, _| *slot.borrow_mut() = Some(resolve)))
///     .on_complete(move |value: &str| *sink.borrow_mut() = Some(value))
///     .start()
///     .unwrap();
/// assert_eq!(*got.borrow(), None);
///
/// let resolver = stash.borrow_mut().take().unwrap();
/// resolver.resolve("later").unwrap();
/// assert_eq!(*got.borrow(), Some("later"));
/// ```
pub fn promise<T, F>(f: F) -> Co<T>
where
    T: 'static,
    F: FnOnce(Resolver<T>, Rejecter) + 'static,
{
    resolve::<T>().and_then(move |resolver| {
        reject().and_then(move |rejecter| {
            f(resolver, rejecter);
            once()
        })
    })
}

/// A coroutine that never settles.
pub fn pending<T: 'static>() -> Co<T> {
    promise(|_, _| {})
}
