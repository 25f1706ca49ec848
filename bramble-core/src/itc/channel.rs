//! Publish side of a state broadcast.
//!
//! A [`Channel`] owns the canonical value of one state type. Each commit
//! overwrites a single pending buffer (depth 1, not a queue) and submits one
//! delivery task per subscriber to that subscriber's executor. A task reads
//! the buffer when it *runs*, so a consumer that lags behind gets one
//! notification per commit, all carrying the newest value.
//!
//! Subscribers sit in a slot arena addressed by `(index, generation)`.
//! Removing one vacates its slot; a reused slot gets a new generation, so a
//! delivery task holding an old key finds nothing and does nothing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::consumer::ConsumerCell;
use super::executor::{Executor, ExecutorExt};

/// Anything that can be broadcast through a channel.
pub trait State: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> State for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SubscriberKey {
    index: u32,
    generation: u32,
}

struct Subscriber<S: State> {
    executor: Arc<dyn Executor>,
    cell: Weak<ConsumerCell<S>>,
}

struct Slot<S: State> {
    generation: u32,
    subscriber: Option<Subscriber<S>>,
}

struct Inner<S: State> {
    pending: S,
    slots: Vec<Slot<S>>,
    free: Vec<u32>,
    live: usize,
}

impl<S: State> Inner<S> {
    fn insert(&mut self, subscriber: Subscriber<S>) -> SubscriberKey {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.subscriber = Some(subscriber);
            return SubscriberKey {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            subscriber: Some(subscriber),
        });
        SubscriberKey {
            index,
            generation: 0,
        }
    }

    fn remove(&mut self, key: SubscriberKey) -> bool {
        if !self.is_live(key) {
            return false;
        }
        let slot = &mut self.slots[key.index as usize];
        slot.subscriber = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.live -= 1;
        true
    }

    fn is_live(&self, key: SubscriberKey) -> bool {
        self.slots
            .get(key.index as usize)
            .is_some_and(|slot| slot.generation == key.generation && slot.subscriber.is_some())
    }
}

pub(crate) struct Shared<S: State> {
    inner: Mutex<Inner<S>>,
}

impl<S: State> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscriber. The cell is built from the current pending
    /// value while the lock is held, so no commit can slip in between.
    pub(crate) fn subscribe<F>(
        &self,
        executor: Arc<dyn Executor>,
        make_cell: F,
    ) -> (SubscriberKey, Arc<ConsumerCell<S>>)
    where
        F: FnOnce(S) -> ConsumerCell<S>,
    {
        let mut inner = self.lock();
        let cell = Arc::new(make_cell(inner.pending.clone()));
        let key = inner.insert(Subscriber {
            executor,
            cell: Arc::downgrade(&cell),
        });
        (key, cell)
    }

    pub(crate) fn unsubscribe(&self, key: SubscriberKey) -> bool {
        self.lock().remove(key)
    }

    /// Delivery task body, run on the subscriber's executor thread.
    fn deliver(&self, key: SubscriberKey, cell: &Weak<ConsumerCell<S>>) {
        let Some(cell) = cell.upgrade() else {
            return;
        };
        let snapshot = {
            let inner = self.lock();
            if !inner.is_live(key) {
                return;
            }
            inner.pending.clone()
        };
        cell.apply(snapshot);
    }
}

/// Cloneable, thread-safe handle for subscribing to a [`Channel`] from
/// anywhere. Holding one does not keep any consumer alive.
pub struct ChannelHandle<S: State> {
    pub(crate) shared: Arc<Shared<S>>,
}

impl<S: State> ChannelHandle<S> {
    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().live
    }
}

impl<S: State> Clone for ChannelHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Something a [`Consumer`](super::Consumer) can subscribe to: a channel or
/// a handle to one.
pub trait Subscribable {
    type State: State;

    fn channel_handle(&self) -> &ChannelHandle<Self::State>;
}

impl<S: State> Subscribable for ChannelHandle<S> {
    type State = S;

    fn channel_handle(&self) -> &ChannelHandle<S> {
        self
    }
}

/// Owner of the canonical value of `S`.
pub struct Channel<S: State> {
    state: S,
    handle: ChannelHandle<S>,
}

impl<S: State> Channel<S> {
    pub fn new(initial: S) -> Self {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                pending: initial.clone(),
                slots: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
        });
        Self {
            state: initial,
            handle: ChannelHandle { shared },
        }
    }

    /// Canonical value, as of the last commit.
    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn handle(&self) -> ChannelHandle<S> {
        self.handle.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.handle.subscriber_count()
    }

    /// Replace the canonical value and broadcast it.
    pub fn commit(&mut self, value: S) {
        self.state = value;
        self.stage().send();
    }

    /// Mutate the canonical value in place, then broadcast it.
    pub fn update<F: FnOnce(&mut S)>(&mut self, f: F) {
        f(&mut self.state);
        self.stage().send();
    }

    /// Mutate the canonical value and publish it to the pending buffer, but
    /// leave the delivery tasks unsubmitted. Lets an owner that guards the
    /// channel with its own lock release that lock before delivery starts.
    pub(crate) fn update_staged<F: FnOnce(&mut S)>(&mut self, f: F) -> Broadcast<S> {
        f(&mut self.state);
        self.stage()
    }

    fn stage(&self) -> Broadcast<S> {
        let shared = &self.handle.shared;
        let mut inner = shared.lock();
        inner.pending = self.state.clone();
        let targets = inner
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.subscriber.as_ref().map(|sub| {
                    let key = SubscriberKey {
                        index: index as u32,
                        generation: slot.generation,
                    };
                    (key, Arc::clone(&sub.executor), Weak::clone(&sub.cell))
                })
            })
            .collect();
        Broadcast {
            shared: Arc::clone(shared),
            targets,
        }
    }
}

/// Delivery tasks for one commit, collected under the channel lock and
/// submitted after it is released.
#[must_use = "a staged broadcast delivers nothing until it is sent"]
pub(crate) struct Broadcast<S: State> {
    shared: Arc<Shared<S>>,
    targets: Vec<(SubscriberKey, Arc<dyn Executor>, Weak<ConsumerCell<S>>)>,
}

impl<S: State> Broadcast<S> {
    /// Submit one delivery per subscriber. An inline executor delivers here.
    pub(crate) fn send(self) {
        for (key, executor, cell) in self.targets {
            let shared = Arc::clone(&self.shared);
            executor.submit(move || shared.deliver(key, &cell));
        }
    }
}

impl<S: State + Default> Default for Channel<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: State> Subscribable for Channel<S> {
    type State = S;

    fn channel_handle(&self) -> &ChannelHandle<S> {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itc::{Consumer, ImmediateExecutor, QueueExecutor};

    #[test]
    fn slot_reuse_bumps_generation() {
        let channel = Channel::new(0u32);
        let executor: Arc<dyn Executor> = Arc::new(ImmediateExecutor);
        let first = Consumer::new(&channel, Arc::clone(&executor));
        let old_key = first.key();
        drop(first);
        let second = Consumer::new(&channel, executor);
        let new_key = second.key();
        assert_eq!(old_key.index, new_key.index);
        assert_ne!(old_key.generation, new_key.generation);
        assert!(!channel.handle.shared.lock().is_live(old_key));
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn stale_task_after_slot_reuse_does_nothing() {
        let mut channel = Channel::new(0u32);
        let queue = Arc::new(QueueExecutor::new("test"));
        let stale = Consumer::new(&channel, queue.clone());
        channel.commit(1);
        drop(stale);
        let fresh = Consumer::new(&channel, Arc::new(ImmediateExecutor));
        assert_eq!(queue.run_queued_functions(), 1);
        assert_eq!(fresh.changes(), 0);
        assert_eq!(fresh.state(), 1);
    }

    #[test]
    fn commit_without_subscribers_updates_canonical_state() {
        let mut channel = Channel::new(String::from("a"));
        channel.commit("b".to_string());
        channel.update(|s| s.push('c'));
        assert_eq!(channel.state(), "bc");
        let late = Consumer::new(&channel, Arc::new(ImmediateExecutor));
        assert_eq!(late.state(), "bc");
    }

    #[test]
    fn inline_executor_delivers_without_deadlock() {
        let mut channel = Channel::new(0i32);
        let consumer = Consumer::new(&channel, Arc::new(ImmediateExecutor));
        channel.commit(5);
        assert_eq!(consumer.state(), 5);
        assert_eq!(consumer.changes(), 1);
    }
}
