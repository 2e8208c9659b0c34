use core::marker::PhantomData;

use Suspend::*;

use crate::coro::Coro;
use crate::suspend::Suspend;

/// A coroutine whose outcome is passed through a function once it finishes.
/// Built by [`Coro::map_return()`].
pub struct MapReturn<R, K, F> {
    inner: K,
    on_return: F,
    _outcome: PhantomData<fn(R)>,
}

impl<R, K, F> MapReturn<R, K, F> {
    pub(crate) fn new(inner: K, on_return: F) -> Self {
        MapReturn {
            inner,
            on_return,
            _outcome: PhantomData,
        }
    }
}

/// Over a [`Co`](crate::Co), `Next` is again `MapReturn` over a `Co`, so the
/// mapped coroutine is a fixed point and can itself be erased with
/// [`Co::from_coro()`](crate::Co::from_coro).
impl<I, Y, K, F, R, R2> Coro<I, Y, R2> for MapReturn<R, K, F>
where
    K: Coro<I, Y, R>,
    F: FnOnce(R) -> R2,
{
    type Next = MapReturn<R, K::Next, F>;

    fn resume(self, input: I) -> Suspend<Y, R2, Self::Next> {
        let on_return = self.on_return;
        match self.inner.resume(input) {
            Yield(command, rest) => {
                Yield(command, MapReturn::new(rest, on_return))
            }
            Return(outcome) => Return(on_return(outcome)),
        }
    }
}
