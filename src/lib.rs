//! The `cosync` crate drives callback-based asynchronous code as if it were
//! sequential, on a single thread and without an executor.
//!
//! A *coroutine* here is a state machine that is resumed with a [`Resume`]
//! value and each time either yields a [`Command`] or returns a
//! `Result<T, Error>`. The core trait is the same consuming shape as
//! everywhere else in the crate:
//!
//! ```rust
//! pub enum Suspend<Y, R, N> {
//!     Yield(Y, N),
//!     Return(R),
//! }
//!
//! pub trait Coro<I, Y, R>: Sized {
//!     type Next: Coro<I, Y, R>;
//!     fn resume(self, input: I) -> Suspend<Y, R, Self::Next>;
//! }
//! ```
//!
//! Because `resume` consumes the coroutine, a suspended coroutine can only be
//! resumed once per yield, and dropping it is the way to cancel it. Almost
//! everything in the crate works with the type-erased [`Co<T>`], which
//! implements `Coro<Resume, Command, Result<T, Error>>`.
//!
//! # The command protocol
//!
//! A coroutine is driven by an engine, started with [`launch()`]. The
//! commands it can yield are small:
//!
//!   * [`resolve()`] and [`reject()`] create a pending child and hand out the
//!     callbacks that settle it. They are what a coroutine passes to a
//!     callback-based API.
//!   * [`once()`], [`all()`] and [`race()`] wait for the pending children.
//!   * [`delegate()`] runs another coroutine in a child engine and waits for
//!     it.
//!
//! When a callback is called while its engine sleeps, the engine checks
//! whether what it waits for is now available and, if so, resumes the
//! coroutine. Called from outside any coroutine, the callback resumes it
//! before returning. Called from inside one, the wakeup is queued and runs
//! once the outermost engine being driven finishes its step. Commands that
//! can be answered immediately never suspend.
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use cosync::Resolver;
//! use cosync::launch;
//! use cosync::once;
//! use cosync::resolve;
//!
//! // Somewhere to park the callback, like a real callback API would.
//! let parked: Rc<RefCell<Option<Resolver<u32>>>> = Default::default();
//! let park = Rc::clone(&parked);
//! let result = Rc::new(RefCell::new(None));
//! let sink = Rc::clone(&result);
//!
//! let coroutine = resolve::<u32>().and_then(move |resolver| {
//!     *park.borrow_mut() = Some(resolver);
//!     once::<u32>().map(|n| n + 1)
//! });
//! launch(coroutine)
//!     .on_complete(move |n| *sink.borrow_mut() = Some(n))
//!     .start()
//!     .unwrap();
//! assert_eq!(*result.borrow(), None);
//!
//! let resolver = parked.borrow_mut().take().unwrap();
//! resolver.resolve(41).unwrap();
//! assert_eq!(*result.borrow(), Some(42));
//! ```
//!
//! # Building blocks
//!
//! On top of the engine, the crate provides:
//!
//!   * [`Channel`], an unbuffered rendezvous channel;
//!   * [`Mutex`], a lock granted in request order;
//!   * [`PubSub`], a fan-out of published messages to subscribers;
//!   * [`Traverser`], a pull-style iterator over values a coroutine
//!     [`emit()`]s;
//!   * [`Loading`], a value loaded once and shared with everyone waiting;
//!   * [`join_all()`] and [`select()`], for running coroutines side by side.
//!
//! # Errors
//!
//! A coroutine that fails is rejected, and the rejection goes to the
//! [`Catch`] of its engine. A rejection no handler accepts surfaces as
//! [`Error::Unhandled`] from whichever call caused it: the
//! [`start()`](Launch::start) that ran the coroutine, or the callback whose
//! call resumed it.

mod and_then;
mod catch;
mod channel;
mod child;
mod co;
mod combinators;
mod command;
mod coro;
mod coro_assertions;
mod engine;
mod error;
mod finally;
mod from_control_flow;
mod from_fn;
mod just_return;
mod launch;
mod loading;
mod map_return;
mod mutex;
mod primitives;
mod pubsub;
mod settle;
mod suspend;
mod traverser;

pub use catch::Catch;
pub use channel::Channel;
pub use channel::TrySendError;
pub use child::Callback;
pub use child::MultiResolver;
pub use child::Rejecter;
pub use child::Resolver;
pub use co::Co;
pub use co::Coroutine;
pub use co::Step;
pub use combinators::join_all;
pub use combinators::select;
pub use combinators::select_cancelling;
pub use combinators::select_either;
pub use command::Command;
pub use command::CommandKind;
pub use command::Resume;
pub use command::Value;
pub use coro::Coro;
pub use coro_assertions::CoroAssertions;
pub use engine::Status;
pub use error::Error;
pub use error::ProtocolError;
pub use error::UnawaitedCallback;
pub use from_control_flow::loop_with;
pub use from_fn::from_fn;
pub use from_fn::lazy;
pub use just_return::fail;
pub use just_return::from_result;
pub use just_return::ready;
pub use launch::Handle;
pub use launch::Launch;
pub use launch::launch;
pub use launch::launch_with;
pub use loading::Loading;
pub use mutex::Mutex;
pub use primitives::all;
pub use primitives::delegate;
pub use primitives::emit;
pub use primitives::once;
pub use primitives::pending;
pub use primitives::promise;
pub use primitives::race;
pub use primitives::reject;
pub use primitives::resolve;
pub use primitives::resolve_multi;
pub use primitives::suspend;
pub use pubsub::PubSub;
pub use settle::SettleState;
pub use settle::Settleable;
pub use suspend::Suspend;
pub use suspend::Suspend::Return;
pub use suspend::Suspend::Yield;
pub use traverser::MAX_INTERRUPTS;
pub use traverser::Traverser;
