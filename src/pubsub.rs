use core::ops::ControlFlow;
use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::channel::Channel;
use crate::error::Error;
use crate::from_control_flow::loop_with;
use crate::primitives::emit;
use crate::traverser::Traverser;

const DEFAULT_MAX_LAG: usize = 10_000;

struct Subscribers<T> {
    next_id: u64,
    channels: Vec<(u64, Channel<T>)>,
}

/// Broadcasts every published message to the subscribers registered at the
/// time of publishing.
///
/// Each subscriber reads from its own [`Channel`], so a slow subscriber
/// accumulates a backlog of detached sends. Once a backlog grows past the
/// configured maximum lag, [`publish()`](PubSub::publish) reports it; this
/// usually means a subscription was neither drained nor dropped.
///
/// ```rust
/// use cosync::PubSub;
/// use cosync::launch;
///
/// let topic = PubSub::new();
/// let subscription = topic.subscribe();
/// let first_two = subscription
///     .next()
///     .and_then(move |a| subscription.next().map(move |b| (a, b)));
/// launch(first_two)
///     .on_complete(|pair| assert_eq!(pair, (Some(1), Some(2))))
///     .start()
///     .unwrap();
/// topic.publish(1).unwrap();
/// topic.publish(2).unwrap();
/// ```
pub struct PubSub<T> {
    subscribers: Rc<RefCell<Subscribers<T>>>,
    max_lag: Option<usize>,
}

impl<T: Clone + 'static> Default for PubSub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> PubSub<T> {
    pub fn new() -> Self {
        Self::with_max_lag(Some(DEFAULT_MAX_LAG))
    }

    /// `None` disables the lag check.
    pub fn with_max_lag(max_lag: Option<usize>) -> Self {
        PubSub {
            subscribers: Rc::new(RefCell::new(Subscribers {
                next_id: 0,
                channels: Vec::new(),
            })),
            max_lag,
        }
    }

    /// Hands `item` to every subscriber without waiting for any of them.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::SubscriberLag`] as soon as one subscriber's backlog
    /// exceeds the maximum lag; later subscribers do not get the item. Also
    /// surfaces unhandled errors raised by woken subscribers.
    pub fn publish(&self, item: T) -> Result<(), Error> {
        let channels: Vec<Channel<T>> = self
            .subscribers
            .borrow()
            .channels
            .iter()
            .map(|(_, channel)| channel.clone())
            .collect();
        for channel in channels {
            channel.send_without_wait(item.clone())?;
            if let Some(max_lag) = self.max_lag {
                if channel.send_queue_size() > max_lag {
                    return Err(Error::SubscriberLag(max_lag));
                }
            }
        }
        Ok(())
    }

    /// Registers a subscriber and returns the traverser it reads from.
    ///
    /// Only messages published after this call are seen. Dropping the
    /// traverser, or interrupting it, unregisters the subscriber and discards
    /// its backlog.
    pub fn subscribe(&self) -> Traverser<T> {
        let channel = Channel::new();
        let id = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.next_id += 1;
            let id = subscribers.next_id;
            subscribers.channels.push((id, channel.clone()));
            id
        };
        debug!(id, "subscriber registered");
        let subscribers = Rc::downgrade(&self.subscribers);
        let source = channel.clone();
        let forward = loop_with((), move |()| {
            source
                .receive()
                .and_then(emit)
                .map(|()| ControlFlow::<(), ()>::Continue(()))
        });
        Traverser::new(forward.finally(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers
                    .borrow_mut()
                    .channels
                    .retain(|(other, _)| *other != id);
            }
            channel.clear();
            debug!(id, "subscriber unregistered");
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().channels.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().channels.len()
    }
}
