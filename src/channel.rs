use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::trace;

use crate::child::Resolver;
use crate::co::Co;
use crate::error::Error;
use crate::from_fn::lazy;
use crate::just_return::from_result;
use crate::launch::launch;
use crate::primitives::once;
use crate::primitives::resolve;

struct Sender<T> {
    token: u64,
    value: T,
    resolver: Resolver<()>,
}

struct Receiver<T> {
    token: u64,
    resolver: Resolver<T>,
}

/// At most one side can be waiting at a time.
enum Queue<T> {
    Empty,
    Sending(VecDeque<Sender<T>>),
    Receiving(VecDeque<Receiver<T>>),
}

struct Inner<T> {
    queue: Queue<T>,
    next_token: u64,
}

impl<T> Inner<T> {
    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}

#[derive(Debug, Error)]
pub enum TrySendError<T> {
    /// Nobody was waiting; the value is handed back.
    #[error("no receiver is waiting")]
    NoReceiver(T),
    /// The woken receiver surfaced an unhandled error.
    #[error(transparent)]
    Failed(#[from] Error),
}

/// An unbuffered channel where senders and receivers meet one to one.
///
/// A send completes when a receiver takes the value and a receive completes
/// when a sender hands one over. Waiting senders and waiting receivers are
/// each served first come, first served. Dropping a suspended
/// [`send_and_wait()`](Channel::send_and_wait) or
/// [`receive()`](Channel::receive) takes it out of the queue.
///
/// Cloning a `Channel` yields another handle to the same queues.
pub struct Channel<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let (senders, receivers) = match &inner.queue {
            Queue::Empty => (0, 0),
            Queue::Sending(queue) => (queue.len(), 0),
            Queue::Receiving(queue) => (0, queue.len()),
        };
        f.debug_struct("Channel")
            .field("senders", &senders)
            .field("receivers", &receivers)
            .finish()
    }
}

impl<T: 'static> Channel<T> {
    pub fn new() -> Self {
        Channel {
            inner: Rc::new(RefCell::new(Inner {
                queue: Queue::Empty,
                next_token: 0,
            })),
        }
    }

    /// Sends `value` and waits until a receiver has taken it. Completes
    /// without suspending if a receiver is already waiting.
    pub fn send_and_wait(&self, value: T) -> Co<()> {
        let channel = self.clone();
        lazy(move || {
            if let Some(receiver) = channel.pop_receiver() {
                return from_result(receiver.resolver.resolve(value));
            }
            resolve::<()>().and_then(move |resolver| {
                let token = channel.push_sender(value, resolver);
                once::<()>().finally(move || channel.remove(token))
            })
        })
    }

    /// Waits for a value. Completes without suspending if a sender is already
    /// waiting, after letting that sender continue.
    pub fn receive(&self) -> Co<T> {
        let channel = self.clone();
        lazy(move || {
            if let Some(sender) = channel.pop_sender() {
                let Sender {
                    value, resolver, ..
                } = sender;
                return from_result(resolver.resolve(()).map(|()| value));
            }
            resolve::<T>().and_then(move |resolver| {
                let token = channel.push_receiver(resolver);
                once::<T>().finally(move || channel.remove(token))
            })
        })
    }

    /// Hands `value` to a receiver that is already waiting, without ever
    /// queueing.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        match self.pop_receiver() {
            Some(receiver) => Ok(receiver.resolver.resolve(value)?),
            None => Err(TrySendError::NoReceiver(value)),
        }
    }

    /// Takes the value of a sender that is already waiting, or returns
    /// `default` without ever queueing.
    pub fn try_receive_or(&self, default: T) -> Result<T, Error> {
        match self.pop_sender() {
            Some(Sender {
                value, resolver, ..
            }) => {
                resolver.resolve(())?;
                Ok(value)
            }
            None => Ok(default),
        }
    }

    /// Sends `value` from a detached coroutine, so the caller does not wait
    /// for a receiver.
    pub fn send_without_wait(&self, value: T) -> Result<(), Error> {
        launch(self.send_and_wait(value)).start().map(drop)
    }

    pub fn send_queue_size(&self) -> usize {
        match &self.inner.borrow().queue {
            Queue::Sending(queue) => queue.len(),
            _ => 0,
        }
    }

    pub fn receive_queue_size(&self) -> usize {
        match &self.inner.borrow().queue {
            Queue::Receiving(queue) => queue.len(),
            _ => 0,
        }
    }

    fn pop_receiver(&self) -> Option<Receiver<T>> {
        let mut inner = self.inner.borrow_mut();
        let Queue::Receiving(queue) = &mut inner.queue else {
            return None;
        };
        let receiver = queue.pop_front();
        if queue.is_empty() {
            inner.queue = Queue::Empty;
        }
        receiver
    }

    fn pop_sender(&self) -> Option<Sender<T>> {
        let mut inner = self.inner.borrow_mut();
        let Queue::Sending(queue) = &mut inner.queue else {
            return None;
        };
        let sender = queue.pop_front();
        if queue.is_empty() {
            inner.queue = Queue::Empty;
        }
        sender
    }

    // Both pushes run in the step right after the queues were checked, so the
    // opposite side cannot have started waiting in between.
    fn push_sender(&self, value: T, resolver: Resolver<()>) -> u64 {
        let mut inner = self.inner.borrow_mut();
        let token = inner.token();
        let sender = Sender {
            token,
            value,
            resolver,
        };
        match &mut inner.queue {
            Queue::Sending(queue) => queue.push_back(sender),
            queue => {
                debug_assert!(matches!(queue, Queue::Empty));
                *queue = Queue::Sending(VecDeque::from([sender]));
            }
        }
        trace!(token, "sender queued");
        token
    }

    fn push_receiver(&self, resolver: Resolver<T>) -> u64 {
        let mut inner = self.inner.borrow_mut();
        let token = inner.token();
        let receiver = Receiver { token, resolver };
        match &mut inner.queue {
            Queue::Receiving(queue) => queue.push_back(receiver),
            queue => {
                debug_assert!(matches!(queue, Queue::Empty));
                *queue = Queue::Receiving(VecDeque::from([receiver]));
            }
        }
        trace!(token, "receiver queued");
        token
    }

    /// Drops every waiting entry. Their coroutines are left suspended and,
    /// unless referenced elsewhere, dropped along with their callbacks.
    pub(crate) fn clear(&self) {
        let queue = {
            let mut inner = self.inner.borrow_mut();
            std::mem::replace(&mut inner.queue, Queue::Empty)
        };
        drop(queue);
    }

    /// Drops the entry of an abandoned wait, if it was not paired already.
    fn remove(&self, token: u64) {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let (removed, now_empty) = match &mut inner.queue {
                Queue::Empty => return,
                Queue::Sending(queue) => {
                    let removed = queue
                        .iter()
                        .position(|sender| sender.token == token)
                        .and_then(|index| queue.remove(index))
                        .map(|sender| (Some(sender), None));
                    (removed, queue.is_empty())
                }
                Queue::Receiving(queue) => {
                    let removed = queue
                        .iter()
                        .position(|receiver| receiver.token == token)
                        .and_then(|index| queue.remove(index))
                        .map(|receiver| (None, Some(receiver)));
                    (removed, queue.is_empty())
                }
            };
            if now_empty {
                inner.queue = Queue::Empty;
            }
            removed
        };
        if removed.is_some() {
            trace!(token, "abandoned wait removed from channel");
        }
    }
}
