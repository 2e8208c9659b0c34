// A producer/consumer pipeline over a channel, driven by a toy event loop.
//
// The producer hands numbers to the consumer one at a time; the consumer
// publishes their squares to a watcher. Nothing here is threaded: every
// coroutine advances inside a callback the event loop runs.
//
// Run with `RUST_LOG=cosync=trace cargo run --example pipeline` to watch the
// engines hand values around.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::rc::Rc;

use cosync::Channel;
use cosync::Co;
use cosync::PubSub;
use cosync::join_all;
use cosync::launch;
use cosync::loop_with;
use cosync::once;
use cosync::ready;
use cosync::resolve;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

type Task = Box<dyn FnOnce()>;

/// A queue of callbacks standing in for an I/O reactor.
#[derive(Clone, Default)]
struct EventLoop {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl EventLoop {
    /// Suspends until the loop gets around to the caller again.
    fn yield_now(&self) -> Co<()> {
        let queue = Rc::clone(&self.queue);
        resolve::<()>().and_then(move |resolver| {
            queue.borrow_mut().push_back(Box::new(move || {
                if let Err(e) = resolver.resolve(()) {
                    error!(error = %e, "task failed");
                }
            }));
            once()
        })
    }

    fn run(&self) {
        loop {
            let task = self.queue.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }
}

/// Sends `0..count`, then `None` to say it is done.
fn produce(
    reactor: EventLoop,
    channel: Channel<Option<u32>>,
    count: u32,
) -> Co<u32> {
    loop_with(0, move |n| {
        if n == count {
            return channel
                .send_and_wait(None)
                .map(move |()| ControlFlow::Break(count));
        }
        let channel = channel.clone();
        reactor
            .yield_now()
            .and_then(move |()| {
                info!(n, "producing");
                channel.send_and_wait(Some(n))
            })
            .map(move |()| ControlFlow::Continue(n + 1))
    })
}

/// Publishes the square of everything received and returns their sum.
fn consume(channel: Channel<Option<u32>>, squares: Rc<PubSub<u32>>) -> Co<u32> {
    loop_with(0, move |total| {
        let squares = Rc::clone(&squares);
        channel.receive().try_map(move |item| match item {
            Some(n) => {
                squares.publish(n * n)?;
                Ok(ControlFlow::Continue(total + n * n))
            }
            None => Ok(ControlFlow::Break(total)),
        })
    })
}

/// Reads `count` squares from a subscription and returns the largest.
fn watch(squares: &PubSub<u32>, count: usize) -> Co<u32> {
    let subscription = squares.subscribe();
    loop_with((0, 0), move |(seen, largest)| {
        if seen == count {
            return ready(ControlFlow::Break(largest));
        }
        subscription.next().map(move |square| {
            let square = square.unwrap_or_default();
            info!(square, "watched");
            ControlFlow::Continue((seen + 1, largest.max(square)))
        })
    })
    .finally(|| info!("subscription closed"))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let reactor = EventLoop::default();
    let channel = Channel::new();
    let squares = Rc::new(PubSub::new());
    let count = 5;

    let pipeline = join_all([
        ("produced", produce(reactor.clone(), channel.clone(), count)),
        ("sum of squares", consume(channel, Rc::clone(&squares))),
        ("largest square", watch(&squares, count as usize)),
    ]);
    let started = launch(pipeline)
        .on_complete(|results| {
            for (name, value) in results {
                println!("{name}: {value}");
            }
        })
        .on_error(|e| error!(error = %e, "pipeline failed"))
        .start();
    if let Err(e) = started {
        error!(error = %e, "pipeline failed to start");
        return;
    }
    reactor.run();
    println!("subscribers left: {}", squares.subscriber_count());
}
