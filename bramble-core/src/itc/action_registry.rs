//! Many-to-many action fan-out, partitioned by [`ActionChannel`].
//!
//! Dispatch is a direct call on the caller's thread: no executor, no queue.
//! A registry is thread-confined (`Rc`/`Weak` make it `!Send`), so mutation
//! and dispatch are serialized by the borrow checker. To reach receivers on
//! another thread, publish through a state channel instead.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use bramble_types::ActionChannel;

use super::action::{Action, ActionReceiver};

type ReceiverRef<A> = Weak<RefCell<dyn ActionReceiver<A>>>;

fn address<T: ?Sized>(ptr: *const T) -> *const () {
    ptr as *const ()
}

/// Receivers of `A`, grouped by channel.
///
/// Holds weak references only; callers own their receivers and should
/// remove them before dropping them. A receiver dropped while still
/// registered is skipped (and logged) rather than dispatched to, as is a
/// receiver reached again from inside its own `action`.
pub struct ActionReceiverRegistry<A: Action> {
    channels: BTreeMap<ActionChannel, Vec<ReceiverRef<A>>>,
}

impl<A: Action> ActionReceiverRegistry<A> {
    pub fn new() -> Self {
        Self {
            channels: BTreeMap::new(),
        }
    }

    /// Number of channels with at least one registration.
    pub fn size(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn receiver_count(&self, channel: ActionChannel) -> usize {
        self.channels.get(&channel).map_or(0, Vec::len)
    }

    /// Register `receiver` under `channel`. Registering it twice is a no-op.
    pub fn add_to<R>(&mut self, channel: ActionChannel, receiver: &Rc<RefCell<R>>)
    where
        R: ActionReceiver<A> + 'static,
    {
        let target = address(Rc::as_ptr(receiver));
        let receivers = self.channels.entry(channel).or_default();
        if receivers.iter().any(|r| address(r.as_ptr()) == target) {
            return;
        }
        let erased: Rc<RefCell<dyn ActionReceiver<A>>> = receiver.clone();
        receivers.push(Rc::downgrade(&erased));
    }

    /// Remove `receiver` from one channel. No-op if it was never added.
    pub fn remove_from<R>(&mut self, channel: ActionChannel, receiver: &Rc<RefCell<R>>)
    where
        R: ActionReceiver<A> + 'static,
    {
        let target = address(Rc::as_ptr(receiver));
        if let Some(receivers) = self.channels.get_mut(&channel) {
            receivers.retain(|r| address(r.as_ptr()) != target);
            if receivers.is_empty() {
                self.channels.remove(&channel);
            }
        }
    }

    /// Remove `receiver` from every channel. No-op if it was never added.
    pub fn remove_from_all<R>(&mut self, receiver: &Rc<RefCell<R>>)
    where
        R: ActionReceiver<A> + 'static,
    {
        let target = address(Rc::as_ptr(receiver));
        for receivers in self.channels.values_mut() {
            receivers.retain(|r| address(r.as_ptr()) != target);
        }
        self.channels.retain(|_, receivers| !receivers.is_empty());
    }

    /// Drop registrations whose receiver no longer exists.
    pub fn prune(&mut self) -> usize {
        let mut pruned = 0;
        for receivers in self.channels.values_mut() {
            let before = receivers.len();
            receivers.retain(|r| r.strong_count() > 0);
            pruned += before - receivers.len();
        }
        self.channels.retain(|_, receivers| !receivers.is_empty());
        pruned
    }

    /// Invoke every receiver on every channel, in channel order, then
    /// registration order within a channel.
    pub fn call_all(&self, args: A::Args) {
        for (channel, receivers) in &self.channels {
            Self::dispatch(*channel, receivers, &args);
        }
    }

    /// Invoke every receiver registered under `channel`, in registration order.
    pub fn call_for_channel(&self, channel: ActionChannel, args: A::Args) {
        if let Some(receivers) = self.channels.get(&channel) {
            Self::dispatch(channel, receivers, &args);
        }
    }

    fn dispatch(channel: ActionChannel, receivers: &[ReceiverRef<A>], args: &A::Args) {
        for receiver in receivers {
            let Some(receiver) = receiver.upgrade() else {
                log::warn!(
                    target: "itc::action",
                    "{} receiver on {} was dropped without being removed",
                    A::NAME,
                    channel
                );
                continue;
            };
            // Already borrowed means this dispatch started inside one of the
            // receiver's own handlers.
            match receiver.try_borrow_mut() {
                Ok(mut receiver) => receiver.action(A::default(), args.clone()),
                Err(_) => log::warn!(
                    target: "itc::action",
                    "{} receiver on {} is busy handling another action; skipped",
                    A::NAME,
                    channel
                ),
            };
        }
    }
}

impl<A: Action> Default for ActionReceiverRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}
