use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::rc::Weak;

use tracing::trace;

use crate::command::Value;
use crate::engine::Engine;
use crate::error::Error;
use crate::settle::SettleState;
use crate::settle::Settleable;

/// A settleable owned by the engine that created it.
///
/// It only points back at the engine weakly; what keeps a suspended engine
/// alive is the [`Callback`] handed to whoever will settle the child.
pub(crate) struct Child {
    cell: RefCell<Settleable<Value>>,
    engine: Weak<Engine>,
}

impl Child {
    pub(crate) fn new(engine: Weak<Engine>) -> Rc<Self> {
        Rc::new(Child {
            cell: RefCell::new(Settleable::new()),
            engine,
        })
    }

    pub(crate) fn state(&self) -> SettleState {
        self.cell.borrow().state()
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state() == SettleState::Pending
    }

    pub(crate) fn take(&self) -> Option<Result<Value, Error>> {
        self.cell.borrow_mut().take()
    }

    pub(crate) fn cancel(&self) {
        self.cell.borrow_mut().cancel();
    }

    /// Settles the child and, if its engine is asleep and still interested,
    /// lets the engine re-evaluate what it is waiting for. Settling twice is
    /// ignored.
    pub(crate) fn settle(
        &self,
        outcome: Result<Value, Error>,
    ) -> Result<(), Error> {
        {
            let mut cell = self.cell.borrow_mut();
            if !cell.is_pending() {
                trace!("ignoring repeated settlement");
                return Ok(());
            }
            match outcome {
                Ok(value) => cell.resolve(value),
                Err(error) => cell.reject(error),
            }
            if cell.is_cancelled() {
                return Ok(());
            }
        }
        match self.engine.upgrade() {
            Some(engine) if engine.is_sleeping() => engine.recheck(self),
            _ => Ok(()),
        }
    }
}

/// The untyped callback an engine hands to a coroutine for a `Resolve`,
/// `ResolveMulti` or `Reject` command.
///
/// Calling it settles the child it was created for; the first settlement
/// wins and later ones are ignored. The returned error is an unhandled
/// rejection raised by an engine this call woke and ran.
#[derive(Clone)]
pub struct Callback {
    child: Rc<Child>,
    _engine: Rc<Engine>,
}

impl Callback {
    pub(crate) fn new(child: Rc<Child>, engine: Rc<Engine>) -> Self {
        Callback {
            child,
            _engine: engine,
        }
    }

    pub fn resolve_value(&self, value: Value) -> Result<(), Error> {
        self.child.settle(Ok(value))
    }

    pub fn reject(&self, error: Error) -> Result<(), Error> {
        self.child.settle(Err(error))
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("state", &self.child.state())
            .finish()
    }
}

/// Resolves the child created by [`resolve()`](crate::resolve).
pub struct Resolver<T> {
    callback: Callback,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Resolver {
            callback: self.callback.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Resolver").field(&self.callback).finish()
    }
}

impl<T: 'static> Resolver<T> {
    pub fn new(callback: Callback) -> Self {
        Resolver {
            callback,
            _marker: PhantomData,
        }
    }

    pub fn resolve(&self, value: T) -> Result<(), Error> {
        self.callback.resolve_value(Box::new(value))
    }
}

/// Resolves the child created by [`resolve_multi()`](crate::resolve_multi)
/// with every argument collected into a `Vec`.
pub struct MultiResolver<T> {
    callback: Callback,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for MultiResolver<T> {
    fn clone(&self) -> Self {
        MultiResolver {
            callback: self.callback.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for MultiResolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MultiResolver").field(&self.callback).finish()
    }
}

impl<T: 'static> MultiResolver<T> {
    pub fn new(callback: Callback) -> Self {
        MultiResolver {
            callback,
            _marker: PhantomData,
        }
    }

    pub fn resolve(
        &self,
        args: impl IntoIterator<Item = T>,
    ) -> Result<(), Error> {
        let args: Vec<T> = args.into_iter().collect();
        self.callback.resolve_value(Box::new(args))
    }
}

/// Rejects the child created by the `Resolve` preceding
/// [`reject()`](crate::reject).
#[derive(Clone, Debug)]
pub struct Rejecter {
    callback: Callback,
}

impl Rejecter {
    pub fn new(callback: Callback) -> Self {
        Rejecter { callback }
    }

    pub fn reject(&self, error: Error) -> Result<(), Error> {
        self.callback.reject(error)
    }
}
