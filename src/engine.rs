use std::cell::RefCell;
use std::collections::VecDeque;
use std::mem;
use std::rc::Rc;

use Suspend::*;
use tracing::debug;
use tracing::trace;

use crate::catch::Catch;
use crate::child::Callback;
use crate::child::Child;
use crate::co::Co;
use crate::command::Command;
use crate::command::Resume;
use crate::command::Value;
use crate::coro::Coro;
use crate::error::Error;
use crate::error::ProtocolError;
use crate::error::UnawaitedCallback;
use crate::settle::SettleState;
use crate::suspend::Suspend;

pub(crate) type Completion = Box<dyn FnOnce(Value) -> Result<(), Error>>;

/// How a sleeping engine is waiting on its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    Nothing,
    Once,
    All,
    Race,
}

/// Where an engine is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Inside a step.
    Running,
    /// Suspended until one of its pending callbacks is called.
    Sleeping,
    Resolved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Pending,
    Resolved,
    Rejected,
    Cancelled,
}

struct State {
    coroutine: Option<Co<Value>>,
    on_complete: Option<Completion>,
    catch: Option<Catch>,
    sleeping: bool,
    queue: Vec<Rc<Child>>,
    last_unpaired: Option<Rc<Child>>,
    awaiting: Awaiting,
    outcome: Outcome,
}

/// Whatever a finished engine still owned. It is dropped only after the
/// state borrow is released, since dropping a coroutine runs its cleanup.
type Leftovers = (
    Option<Co<Value>>,
    Option<Completion>,
    Option<Catch>,
    Vec<Rc<Child>>,
);

enum Action {
    Resume(Resume),
    Sleep,
    Fail(Error),
    Spawn(Co<Value>),
}

impl State {
    fn push_child(&mut self, engine: &Rc<Engine>) -> Callback {
        let child = Child::new(Rc::downgrade(engine));
        self.queue.push(Rc::clone(&child));
        self.last_unpaired = Some(Rc::clone(&child));
        Callback::new(child, Rc::clone(engine))
    }

    fn cancel_queue(&mut self) -> Vec<Rc<Child>> {
        self.awaiting = Awaiting::Nothing;
        let queue = mem::take(&mut self.queue);
        for child in &queue {
            child.cancel();
        }
        queue
    }

    /// Evaluates `Once` or `All` against the queue. `None` means the engine
    /// went to sleep.
    fn evaluate(&mut self, awaiting: Awaiting) -> Option<Resume> {
        if let Some(rejected) = self
            .queue
            .iter()
            .find(|child| child.state() == SettleState::Rejected)
        {
            let rejected = Rc::clone(rejected);
            self.cancel_queue();
            return rejected.take().map(Resume::from);
        }
        if self.queue.iter().any(|child| child.is_pending()) {
            self.sleeping = true;
            self.awaiting = awaiting;
            return None;
        }
        self.awaiting = Awaiting::Nothing;
        let values = mem::take(&mut self.queue)
            .iter()
            .filter_map(|child| child.take())
            .collect::<Result<Vec<_>, _>>();
        Some(match (awaiting, values) {
            (_, Err(error)) => Resume::Throw(error),
            (Awaiting::All, Ok(values)) => Resume::Values(values),
            (_, Ok(mut values)) => match values.pop() {
                Some(value) => Resume::Value(value),
                None => {
                    Resume::Throw(ProtocolError::OnceQueueSize(0).into())
                }
            },
        })
    }

    /// Evaluates `Race`: the first already settled child in queue order wins.
    fn evaluate_race(&mut self) -> Option<Resume> {
        match self.queue.iter().position(|child| !child.is_pending()) {
            Some(index) => {
                let winner = Rc::clone(&self.queue[index]);
                self.cancel_queue();
                winner.take().map(Resume::from)
            }
            None => {
                self.sleeping = true;
                self.awaiting = Awaiting::Race;
                None
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) -> Leftovers {
        self.sleeping = true;
        self.outcome = outcome;
        self.last_unpaired = None;
        (
            self.coroutine.take(),
            self.on_complete.take(),
            self.catch.take(),
            self.cancel_queue(),
        )
    }
}

/// Engines woken by a settling child while some engine on this thread was
/// being driven. Only the outermost `drive` runs them, so a chain of wakeups
/// (a mutex handed down a long queue of waiters) runs in a loop instead of
/// nesting one stack frame per engine.
struct RunQueue {
    draining: bool,
    woken: VecDeque<(Rc<Engine>, Resume)>,
}

thread_local! {
    static RUN_QUEUE: RefCell<RunQueue> = const {
        RefCell::new(RunQueue {
            draining: false,
            woken: VecDeque::new(),
        })
    };
}

/// Held by the outermost `drive` while it drains the run queue.
struct Draining;

impl Draining {
    fn enter() -> Option<Draining> {
        RUN_QUEUE.with_borrow_mut(|queue| {
            let outer = !mem::replace(&mut queue.draining, true);
            outer.then(|| Draining)
        })
    }

    /// Runs every queued wakeup, including those queued meanwhile, and
    /// reports the first unhandled error among them.
    fn run_woken(&self) -> Result<(), Error> {
        let mut first_error = None;
        while let Some((engine, input)) =
            RUN_QUEUE.with_borrow_mut(|queue| queue.woken.pop_front())
        {
            if let Err(error) = engine.run(input) {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Draining {
    fn drop(&mut self) {
        // Only non-empty when a coroutine panicked mid-drain.
        let abandoned = RUN_QUEUE.with_borrow_mut(|queue| {
            queue.draining = false;
            mem::take(&mut queue.woken)
        });
        drop(abandoned);
    }
}

/// Drives one coroutine through the command protocol.
///
/// The engine never keeps itself alive: while it sleeps, the only strong
/// references to it live in the callbacks it handed out (and in any
/// [`Handle`](crate::Handle)).
pub(crate) struct Engine {
    state: RefCell<State>,
}

impl Engine {
    /// Creates an engine and runs its coroutine until it first suspends,
    /// completes or fails.
    pub(crate) fn start(
        coroutine: Co<Value>,
        on_complete: Option<Completion>,
        catch: Catch,
    ) -> Result<Rc<Engine>, Error> {
        let engine = Rc::new(Engine {
            state: RefCell::new(State {
                coroutine: Some(coroutine),
                on_complete,
                catch: Some(catch),
                sleeping: false,
                queue: Vec::new(),
                last_unpaired: None,
                awaiting: Awaiting::Nothing,
                outcome: Outcome::Pending,
            }),
        });
        engine.drive(Resume::Continue)?;
        Ok(engine)
    }

    pub(crate) fn is_sleeping(&self) -> bool {
        self.state.borrow().sleeping
    }

    pub(crate) fn status(&self) -> Status {
        let state = self.state.borrow();
        match state.outcome {
            Outcome::Pending if state.sleeping => Status::Sleeping,
            Outcome::Pending => Status::Running,
            Outcome::Resolved => Status::Resolved,
            Outcome::Rejected => Status::Rejected,
            Outcome::Cancelled => Status::Cancelled,
        }
    }

    /// Runs the engine and, unless an outer `drive` is already doing so,
    /// every engine woken up meanwhile.
    fn drive(self: &Rc<Self>, input: Resume) -> Result<(), Error> {
        let draining = Draining::enter();
        let result = self.run(input);
        match draining {
            Some(draining) => {
                let woken = draining.run_woken();
                result.and(woken)
            }
            None => result,
        }
    }

    /// Queues a wakeup, running it right away if no engine is being driven.
    fn wake(self: &Rc<Self>, input: Resume) -> Result<(), Error> {
        RUN_QUEUE.with_borrow_mut(|queue| {
            queue.woken.push_back((Rc::clone(self), input));
        });
        match Draining::enter() {
            Some(draining) => draining.run_woken(),
            None => {
                trace!("wakeup queued");
                Ok(())
            }
        }
    }

    /// Runs steps until the engine finishes or goes to sleep. Each step
    /// returns the input for the next one, so any number of commands that
    /// can be answered immediately are processed without recursion.
    fn run(self: &Rc<Self>, input: Resume) -> Result<(), Error> {
        let mut next = Some(input);
        while let Some(input) = next {
            next = self.wakeup(input)?;
        }
        Ok(())
    }

    fn wakeup(
        self: &Rc<Self>,
        input: Resume,
    ) -> Result<Option<Resume>, Error> {
        let coroutine = {
            let mut state = self.state.borrow_mut();
            let coroutine = state.coroutine.take();
            state.sleeping &= coroutine.is_none();
            coroutine
        };
        let Some(coroutine) = coroutine else {
            return Ok(None);
        };
        match coroutine.resume(input) {
            Return(Ok(value)) => self.resolve(value).map(|()| None),
            Return(Err(error)) => self.reject(error).map(|()| None),
            Yield(command, next) => {
                let abandoned = {
                    let mut state = self.state.borrow_mut();
                    if state.outcome == Outcome::Pending {
                        state.coroutine = Some(next);
                        None
                    } else {
                        // Cancelled from inside its own step.
                        state.sleeping = true;
                        Some(next)
                    }
                };
                if abandoned.is_some() {
                    return Ok(None);
                }
                self.interpret(command)
            }
        }
    }

    fn interpret(
        self: &Rc<Self>,
        command: Command,
    ) -> Result<Option<Resume>, Error> {
        trace!(command = ?command.kind(), "interpreting command");
        let action = {
            let mut state = self.state.borrow_mut();
            match command {
                Command::Resolve => {
                    Action::Resume(Resume::Resolver(state.push_child(self)))
                }
                Command::ResolveMulti => Action::Resume(Resume::MultiResolver(
                    state.push_child(self),
                )),
                Command::Reject => match state.last_unpaired.take() {
                    Some(child) => Action::Resume(Resume::Rejecter(
                        Callback::new(child, Rc::clone(self)),
                    )),
                    None => Action::Fail(ProtocolError::UnpairedReject.into()),
                },
                Command::Once => {
                    state.last_unpaired = None;
                    let size = state.queue.len();
                    if size == 1 {
                        state
                            .evaluate(Awaiting::Once)
                            .map_or(Action::Sleep, Action::Resume)
                    } else {
                        Action::Fail(ProtocolError::OnceQueueSize(size).into())
                    }
                }
                Command::All => {
                    state.last_unpaired = None;
                    state
                        .evaluate(Awaiting::All)
                        .map_or(Action::Sleep, Action::Resume)
                }
                Command::Race => {
                    state.last_unpaired = None;
                    if state.queue.is_empty() {
                        Action::Fail(ProtocolError::EmptyRace.into())
                    } else {
                        state
                            .evaluate_race()
                            .map_or(Action::Sleep, Action::Resume)
                    }
                }
                Command::Await(coroutine) => {
                    state.last_unpaired = None;
                    if state.queue.is_empty() {
                        Action::Spawn(coroutine)
                    } else {
                        let error = UnawaitedCallback::YieldingCoroutine;
                        Action::Fail(error.into())
                    }
                }
                Command::Emit(_) => {
                    state.last_unpaired = None;
                    Action::Fail(ProtocolError::UnknownCommand.into())
                }
            }
        };
        match action {
            Action::Resume(input) => Ok(Some(input)),
            Action::Sleep => {
                trace!("sleeping");
                Ok(None)
            }
            Action::Fail(error) => self.reject(error).map(|()| None),
            Action::Spawn(coroutine) => self.spawn(coroutine),
        }
    }

    /// Runs a nested coroutine in a child engine whose outcome settles a
    /// fresh child of this one.
    fn spawn(
        self: &Rc<Self>,
        coroutine: Co<Value>,
    ) -> Result<Option<Resume>, Error> {
        let child = Child::new(Rc::downgrade(self));
        let on_resolve = Callback::new(Rc::clone(&child), Rc::clone(self));
        let on_reject = on_resolve.clone();
        Engine::start(
            coroutine,
            Some(Box::new(move |value| on_resolve.resolve_value(value))),
            Catch::forward(move |error| on_reject.reject(error)),
        )?;
        if let Some(outcome) = child.take() {
            return Ok(Some(Resume::from(outcome)));
        }
        let mut state = self.state.borrow_mut();
        state.queue.push(child);
        state.awaiting = Awaiting::Once;
        state.sleeping = true;
        Ok(None)
    }

    /// Called by a child that settled while this engine was sleeping.
    pub(crate) fn recheck(
        self: &Rc<Self>,
        changed: &Child,
    ) -> Result<(), Error> {
        let next = {
            let mut state = self.state.borrow_mut();
            if !state.sleeping {
                return Ok(());
            }
            match state.awaiting {
                Awaiting::Nothing => return Ok(()),
                // Whoever notifies first wins, wherever it sits in the queue.
                Awaiting::Race => {
                    let outcome = changed.take();
                    let losers = state.cancel_queue();
                    drop(state);
                    drop(losers);
                    outcome.map(Resume::from)
                }
                awaiting => state.evaluate(awaiting),
            }
        };
        match next {
            Some(input) => {
                trace!("resuming after recheck");
                self.wake(input)
            }
            None => Ok(()),
        }
    }

    fn resolve(self: &Rc<Self>, value: Value) -> Result<(), Error> {
        let leftovers = {
            let mut state = self.state.borrow_mut();
            if state.outcome != Outcome::Pending {
                return Ok(());
            }
            if !state.queue.is_empty() {
                drop(state);
                return self.reject(UnawaitedCallback::Resolution.into());
            }
            state.finish(Outcome::Resolved)
        };
        debug!("coroutine resolved");
        let (_, on_complete, _, _) = leftovers;
        match on_complete {
            Some(on_complete) => on_complete(value),
            None => Ok(()),
        }
    }

    fn reject(self: &Rc<Self>, error: Error) -> Result<(), Error> {
        let leftovers = {
            let mut state = self.state.borrow_mut();
            if state.outcome != Outcome::Pending {
                return Ok(());
            }
            state.finish(Outcome::Rejected)
        };
        debug!(%error, "coroutine rejected");
        let (_, _, catch, _) = leftovers;
        match catch {
            Some(catch) => catch.handle(error),
            None => Err(error.unhandled()),
        }
    }

    /// Abandons the coroutine: its cleanup runs, its children are cancelled
    /// and neither the completion callback nor any handler is called.
    pub(crate) fn cancel(&self) {
        let leftovers = {
            let mut state = self.state.borrow_mut();
            if state.outcome != Outcome::Pending {
                return;
            }
            state.finish(Outcome::Cancelled)
        };
        debug!("coroutine cancelled");
        drop(leftovers);
    }
}
