use core::ops::ControlFlow;

use either::Either;

use crate::catch::Catch;
use crate::co::Co;
use crate::error::Error;
use crate::from_control_flow::loop_with;
use crate::just_return::fail;
use crate::just_return::from_result;
use crate::just_return::ready;
use crate::launch::Handle;
use crate::launch::launch;
use crate::primitives::all;
use crate::primitives::race;
use crate::primitives::reject;
use crate::primitives::resolve;

/// Starts `coroutine` in its own engine, wired to a fresh resolve/reject pair
/// of the calling coroutine so that its outcome arrives as `(key, value)`.
fn spawn_keyed<K, T>(key: K, coroutine: Co<T>) -> Co<Handle>
where
    K: 'static,
    T: 'static,
{
    resolve::<(K, T)>().and_then(move |resolver| {
        reject().and_then(move |rejecter| {
            from_result(
                launch(coroutine)
                    .try_on_complete(move |value| {
                        resolver.resolve((key, value))
                    })
                    .catch(Catch::forward(move |error| rejecter.reject(error)))
                    .start(),
            )
        })
    })
}

fn spawn_all<K, T>(coroutines: Vec<(K, Co<T>)>) -> Co<Vec<Handle>>
where
    K: 'static,
    T: 'static,
{
    let init = (coroutines.into_iter(), Vec::new());
    loop_with(init, |(mut rest, mut handles)| match rest.next() {
        Some((key, coroutine)) => {
            spawn_keyed(key, coroutine).map(move |handle| {
                handles.push(handle);
                ControlFlow::Continue((rest, handles))
            })
        }
        None => ready(ControlFlow::Break(handles)),
    })
}

/// Runs every coroutine in its own engine and waits for all of them.
///
/// The result lists `(key, value)` pairs in input order, whatever order they
/// completed in. The first failure in input order rejects the whole wait;
/// the remaining coroutines keep running, but their outcomes are ignored.
///
/// # Errors
///
/// Fails with [`Error::EmptyCombinator`] on empty input.
///
/// ```rust
/// use cosync::join_all;
/// use cosync::launch;
/// use cosync::ready;
///
/// let joined = join_all([("a", ready(1)), ("b", ready(2))]);
/// launch(joined)
///     .on_complete(|pairs| assert_eq!(pairs, vec![("a", 1), ("b", 2)]))
///     .start()
///     .unwrap();
/// ```
pub fn join_all<K, T>(
    coroutines: impl IntoIterator<Item = (K, Co<T>)>,
) -> Co<Vec<(K, T)>>
where
    K: 'static,
    T: 'static,
{
    let coroutines: Vec<_> = coroutines.into_iter().collect();
    if coroutines.is_empty() {
        return fail(Error::EmptyCombinator("join"));
    }
    spawn_all(coroutines).and_then(|_| all())
}

/// Runs every coroutine in its own engine and returns the key and value of
/// the first one to settle. The others keep running with their results
/// discarded; see [`select_cancelling()`] to stop them instead.
///
/// # Errors
///
/// Fails with [`Error::EmptyCombinator`] on empty input, or with the error of
/// the first coroutine to fail if that one settles first.
pub fn select<K, T>(
    coroutines: impl IntoIterator<Item = (K, Co<T>)>,
) -> Co<(K, T)>
where
    K: 'static,
    T: 'static,
{
    let coroutines: Vec<_> = coroutines.into_iter().collect();
    if coroutines.is_empty() {
        return fail(Error::EmptyCombinator("race"));
    }
    spawn_all(coroutines).and_then(|_| race())
}

/// Like [`select()`], but cancels the engines of the losers once a winner is
/// known, so that their cleanup runs (a loser waiting on a
/// [`Channel`](crate::Channel) leaves its queue, one waiting on a
/// [`Mutex`](crate::Mutex) gives up its place).
pub fn select_cancelling<K, T>(
    coroutines: impl IntoIterator<Item = (K, Co<T>)>,
) -> Co<(K, T)>
where
    K: 'static,
    T: 'static,
{
    let coroutines: Vec<_> = coroutines.into_iter().collect();
    if coroutines.is_empty() {
        return fail(Error::EmptyCombinator("race"));
    }
    spawn_all(coroutines).and_then(|handles| {
        race().then(move |outcome| {
            for handle in &handles {
                handle.cancel();
            }
            from_result(outcome)
        })
    })
}

/// Races two coroutines of different types, cancelling the loser.
///
/// This is the usual shape of a timeout: race the operation against a timer.
pub fn select_either<A, B>(left: Co<A>, right: Co<B>) -> Co<Either<A, B>>
where
    A: 'static,
    B: 'static,
{
    select_cancelling([
        (false, left.map(Either::Left)),
        (true, right.map(Either::Right)),
    ])
    .map(|(_, winner)| winner)
}
