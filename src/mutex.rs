use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::trace;
use tracing::warn;

use crate::child::Resolver;
use crate::co::Co;
use crate::error::Error;
use crate::finally::Guard;
use crate::from_fn::lazy;
use crate::just_return::fail;
use crate::just_return::from_result;
use crate::just_return::ready;
use crate::primitives::once;
use crate::primitives::resolve;

#[derive(Default)]
struct Inner {
    /// Stays set while ownership passes from one holder to the next waiter.
    acquired: bool,
    next_token: u64,
    waiters: VecDeque<(u64, Resolver<()>)>,
}

/// A lock held by at most one coroutine at a time, granted in the order it
/// was requested.
///
/// There is no notion of an owner, so acquiring a mutex again from the
/// coroutine that holds it deadlocks. Prefer [`run()`](Mutex::run), which
/// releases the lock however the body ends.
///
/// Cloning a `Mutex` yields another handle to the same lock.
#[derive(Clone, Default)]
pub struct Mutex {
    inner: Rc<RefCell<Inner>>,
}

impl Mutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nobody holds the lock or waits for it.
    pub fn is_idle(&self) -> bool {
        !self.inner.borrow().acquired
    }

    /// Takes the lock, suspending behind earlier requests if it is held.
    /// Dropping a suspended `acquire()` gives up its place in the queue.
    pub fn acquire(&self) -> Co<()> {
        let mutex = self.clone();
        lazy(move || {
            {
                let mut inner = mutex.inner.borrow_mut();
                if !inner.acquired {
                    inner.acquired = true;
                    return ready(());
                }
            }
            resolve::<()>().and_then(move |resolver| {
                let token = {
                    let mut inner = mutex.inner.borrow_mut();
                    inner.next_token += 1;
                    let token = inner.next_token;
                    inner.waiters.push_back((token, resolver));
                    token
                };
                trace!(token, "waiting for mutex");
                once::<()>().finally(move || mutex.forget(token))
            })
        })
    }

    /// Hands the lock to the earliest waiter, or frees it if there is none.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MutexReleased`] if the lock is not held, or with an
    /// unhandled error raised while the next holder ran.
    pub fn release(&self) -> Result<(), Error> {
        let next = {
            let mut inner = self.inner.borrow_mut();
            if !inner.acquired {
                return Err(Error::MutexReleased);
            }
            let next = inner.waiters.pop_front();
            if next.is_none() {
                inner.acquired = false;
            }
            next
        };
        // The woken holder may release again before this returns, so nothing
        // may touch the state after handing over.
        match next {
            Some((token, resolver)) => {
                trace!(token, "handing mutex over");
                resolver.resolve(())
            }
            None => Ok(()),
        }
    }

    /// Runs `body` while holding the lock. The lock is released when the body
    /// returns, fails or is dropped while suspended.
    ///
    /// A failed release takes precedence over the body's own outcome.
    pub fn run<T: 'static>(&self, body: Co<T>) -> Co<T> {
        let mutex = self.clone();
        self.acquire().and_then(move |()| {
            let abandoned = mutex.clone();
            let guard = Guard::new(move || abandoned.release_abandoned());
            body.then(move |outcome| {
                guard.disarm();
                match mutex.release() {
                    Ok(()) => from_result(outcome),
                    Err(error) => fail(error),
                }
            })
        })
    }

    /// Like [`run()`](Mutex::run), building the body only once the lock is
    /// held.
    pub fn run_with<T, F>(&self, f: F) -> Co<T>
    where
        T: 'static,
        F: FnOnce() -> Co<T> + 'static,
    {
        self.run(lazy(f))
    }

    fn forget(&self, token: u64) {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let index = inner.waiters.iter().position(|(t, _)| *t == token);
            index.and_then(|index| inner.waiters.remove(index))
        };
        if removed.is_some() {
            trace!(token, "abandoned mutex request removed");
        }
    }

    fn release_abandoned(&self) {
        if let Err(error) = self.release() {
            warn!(%error, "releasing mutex of a cancelled body failed");
        }
    }
}
