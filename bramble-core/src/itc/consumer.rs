//! Subscribe side of a state broadcast.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use super::channel::{ChannelHandle, State, Subscribable, SubscriberKey};
use super::executor::Executor;

/// Change hook, invoked on the consumer's executor thread right after its
/// cached state is replaced. The argument is the new state.
///
/// No consumer lock is held while it runs, so the hook may read its own
/// consumer, commit to channels, or dispatch actions.
pub trait StateObserver<S>: Send {
    fn on_state_change(&mut self, state: &S);
}

impl<S, F: FnMut(&S) + Send> StateObserver<S> for F {
    fn on_state_change(&mut self, state: &S) {
        self(state)
    }
}

struct Snapshot<S> {
    state: S,
    changes: u64,
}

struct Hook<S> {
    observer: Option<Box<dyn StateObserver<S>>>,
    /// Thread currently inside the observer.
    running: Option<ThreadId>,
    /// Deliveries that arrived on that thread from inside the observer.
    nested: u32,
    detached: bool,
}

/// The consumer's own copy of the state, plus its change hook.
///
/// The copy is only locked long enough to swap or clone it. The hook has its
/// own lock and is called with neither lock held.
pub(crate) struct ConsumerCell<S> {
    snapshot: Mutex<Snapshot<S>>,
    hook: Mutex<Hook<S>>,
    hook_idle: Condvar,
}

impl<S: State> ConsumerCell<S> {
    fn new(initial: S, observer: Option<Box<dyn StateObserver<S>>>) -> Self {
        Self {
            snapshot: Mutex::new(Snapshot {
                state: initial,
                changes: 0,
            }),
            hook: Mutex::new(Hook {
                observer,
                running: None,
                nested: 0,
                detached: false,
            }),
            hook_idle: Condvar::new(),
        }
    }

    fn snapshot(&self) -> MutexGuard<'_, Snapshot<S>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hook(&self) -> MutexGuard<'_, Hook<S>> {
        self.hook.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, value: S) {
        let mut snapshot = self.snapshot();
        snapshot.state = value;
        snapshot.changes += 1;
    }

    pub(crate) fn apply(&self, value: S) {
        let me = thread::current().id();
        let mut hook = self.hook();
        if hook.detached {
            return;
        }
        if hook.running == Some(me) {
            // Committed from inside our own observer; the outer call replays it.
            self.store(value);
            hook.nested += 1;
            return;
        }
        while hook.running.is_some() {
            hook = self
                .hook_idle
                .wait(hook)
                .unwrap_or_else(PoisonError::into_inner);
            if hook.detached {
                return;
            }
        }
        self.store(value.clone());
        let Some(observer) = hook.observer.take() else {
            return;
        };
        hook.running = Some(me);
        drop(hook);

        let mut running = RunningHook {
            cell: self,
            observer: Some(observer),
        };
        running.call(&value);
        loop {
            let replay = {
                let mut hook = self.hook();
                if hook.nested == 0 || hook.detached {
                    break;
                }
                hook.nested -= 1;
                self.snapshot().state.clone()
            };
            running.call(&replay);
        }
    }

    /// Stop delivering to the hook. Waits out a hook running on another
    /// thread, so once this returns the hook never runs again.
    fn detach(&self) {
        let me = thread::current().id();
        let mut hook = self.hook();
        hook.detached = true;
        while hook.running.is_some_and(|id| id != me) {
            hook = self
                .hook_idle
                .wait(hook)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let observer = hook.observer.take();
        drop(hook);
        drop(observer);
    }
}

/// An observer checked out of its cell for the length of one delivery.
/// Hands it back (or drops it, if the consumer went away) even on unwind.
struct RunningHook<'a, S: State> {
    cell: &'a ConsumerCell<S>,
    observer: Option<Box<dyn StateObserver<S>>>,
}

impl<S: State> RunningHook<'_, S> {
    fn call(&mut self, state: &S) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_state_change(state);
        }
    }
}

impl<S: State> Drop for RunningHook<'_, S> {
    fn drop(&mut self) {
        let mut hook = self.cell.hook();
        hook.running = None;
        hook.nested = 0;
        let observer = self.observer.take();
        let stale = if hook.detached {
            observer
        } else {
            hook.observer = observer;
            None
        };
        drop(hook);
        self.cell.hook_idle.notify_all();
        drop(stale);
    }
}

/// Per-thread observer holding an independent cached copy of a channel's
/// state.
///
/// Dropping a consumer removes it from its channel; deliveries already queued
/// for it become no-ops. If its hook is running on another thread, the drop
/// waits for it to return.
pub struct Consumer<S: State> {
    cell: Arc<ConsumerCell<S>>,
    channel: ChannelHandle<S>,
    executor: Arc<dyn Executor>,
    key: SubscriberKey,
}

impl<S: State> Consumer<S> {
    pub fn new<C>(channel: &C, executor: Arc<dyn Executor>) -> Self
    where
        C: Subscribable<State = S> + ?Sized,
    {
        Self::subscribe(channel.channel_handle(), executor, None)
    }

    /// Subscribe with a change hook.
    pub fn with_observer<C, O>(channel: &C, executor: Arc<dyn Executor>, observer: O) -> Self
    where
        C: Subscribable<State = S> + ?Sized,
        O: StateObserver<S> + 'static,
    {
        Self::subscribe(channel.channel_handle(), executor, Some(Box::new(observer)))
    }

    fn subscribe(
        channel: &ChannelHandle<S>,
        executor: Arc<dyn Executor>,
        observer: Option<Box<dyn StateObserver<S>>>,
    ) -> Self {
        let (key, cell) = channel
            .shared
            .subscribe(Arc::clone(&executor), |initial| ConsumerCell::new(initial, observer));

        Self {
            cell,
            channel: channel.clone(),
            executor,
            key,
        }
    }

    /// The most recently applied snapshot.
    pub fn state(&self) -> S {
        self.cell.snapshot().state.clone()
    }

    /// Borrow the most recently applied snapshot without cloning it.
    pub fn with_state<R, F: FnOnce(&S) -> R>(&self, f: F) -> R {
        f(&self.cell.snapshot().state)
    }

    /// Number of deliveries applied so far.
    pub fn changes(&self) -> u64 {
        self.cell.snapshot().changes
    }

    /// The channel this consumer is registered on.
    pub fn channel(&self) -> &ChannelHandle<S> {
        &self.channel
    }

    /// The executor this consumer's deliveries run on.
    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    #[cfg(test)]
    pub(crate) fn key(&self) -> SubscriberKey {
        self.key
    }
}

impl<S: State> Drop for Consumer<S> {
    fn drop(&mut self) {
        if !self.channel.shared.unsubscribe(self.key) {
            log::error!(target: "itc::consumer", "consumer was not registered on its channel");
        }
        self.cell.detach();
    }
}

/// One single-state facet of a consumer that observes several states.
///
/// Implement it for a struct of named `Consumer` fields with
/// [`consumer_facets!`](crate::consumer_facets), then read any of them by
/// type through [`FacetExt::state_of`].
pub trait Facet<S: State> {
    fn facet(&self) -> &Consumer<S>;
}

pub trait FacetExt {
    /// Latest state of type `S`.
    fn state_of<S: State>(&self) -> S
    where
        Self: Facet<S>,
    {
        self.facet().state()
    }

    fn changes_of<S: State>(&self) -> u64
    where
        Self: Facet<S>,
    {
        self.facet().changes()
    }
}

impl<T: ?Sized> FacetExt for T {}

/// Implement [`Facet`] for each named consumer field of a struct.
///
/// ```ignore
/// struct Screen {
///     transport: Consumer<TransportState>,
///     playhead: Consumer<PlayheadState>,
/// }
/// consumer_facets!(Screen { transport: TransportState, playhead: PlayheadState });
/// ```
#[macro_export]
macro_rules! consumer_facets {
    ($ty:ty { $($field:ident : $state:ty),+ $(,)? }) => {
        $(
            impl $crate::itc::Facet<$state> for $ty {
                fn facet(&self) -> &$crate::itc::Consumer<$state> {
                    &self.$field
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itc::{Channel, ExecutorExt, ImmediateExecutor, QueueExecutor};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::OnceLock;

    #[test]
    fn starts_with_current_channel_value() {
        let channel = Channel::new(7u8);
        let consumer = Consumer::new(&channel, Arc::new(ImmediateExecutor));
        assert_eq!(consumer.state(), 7);
        assert_eq!(consumer.changes(), 0);
    }

    #[test]
    fn delivers_through_its_own_executor() {
        let mut channel = Channel::new(0u8);
        let queue = Arc::new(QueueExecutor::new("own"));
        let consumer = Consumer::new(&channel, queue.clone());
        channel.commit(3);
        assert_eq!(consumer.state(), 0);
        consumer.executor().submit(|| {});
        assert_eq!(queue.run_queued_functions(), 2);
        assert_eq!(consumer.state(), 3);
        assert_eq!(consumer.channel().subscriber_count(), 1);
    }

    #[test]
    fn observer_sees_new_state() {
        let mut channel = Channel::new(0u32);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook_seen = Arc::clone(&seen);
        let _consumer = Consumer::with_observer(&channel, Arc::new(ImmediateExecutor), move |s: &u32| {
            hook_seen.lock().unwrap().push(*s)
        });
        channel.commit(1);
        channel.commit(2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn hook_can_read_its_own_consumer() {
        let mut channel = Channel::new(0u32);
        let queue = Arc::new(QueueExecutor::new("self-read"));
        let slot: Arc<OnceLock<Consumer<u32>>> = Arc::new(OnceLock::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook_slot = Arc::clone(&slot);
        let hook_seen = Arc::clone(&seen);
        let consumer = Consumer::with_observer(&channel, queue.clone(), move |s: &u32| {
            if let Some(me) = hook_slot.get() {
                let read = me.with_state(|v| *v);
                hook_seen.lock().unwrap().push((*s, read, me.changes()));
            }
        });
        assert!(slot.set(consumer).is_ok());

        channel.commit(1);
        channel.commit(2);
        assert_eq!(queue.run_queued_functions(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![(2, 2, 1), (2, 2, 2)]);
    }

    #[test]
    fn hook_may_drop_its_own_consumer() {
        let mut channel = Channel::new(0u32);
        let slot: Arc<Mutex<Option<Consumer<u32>>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU32::new(0));
        let hook_slot = Arc::clone(&slot);
        let hook_calls = Arc::clone(&calls);
        let consumer = Consumer::with_observer(&channel, Arc::new(ImmediateExecutor), move |_: &u32| {
            hook_calls.fetch_add(1, Ordering::SeqCst);
            let own = hook_slot.lock().unwrap().take();
            drop(own);
        });
        *slot.lock().unwrap() = Some(consumer);

        channel.commit(1);
        assert_eq!(channel.subscriber_count(), 0);
        channel.commit(2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribe_through_handle_from_another_thread() {
        let mut channel = Channel::new(0u32);
        let handle = channel.handle();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let subscriber = std::thread::spawn(move || {
            let executor = Arc::new(QueueExecutor::new("sub"));
            let consumer = Consumer::new(&handle, executor.clone());
            tx.send(()).unwrap();
            while consumer.changes() == 0 {
                executor.run_queued_functions();
                std::thread::yield_now();
            }
            consumer.state()
        });
        rx.recv().unwrap();
        channel.commit(42);
        assert_eq!(subscriber.join().unwrap(), 42);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn with_state_borrows() {
        let channel = Channel::new(vec![1, 2, 3]);
        let consumer = Consumer::new(&channel, Arc::new(ImmediateExecutor));
        assert_eq!(consumer.with_state(|v| v.iter().sum::<i32>()), 6);
    }

    #[derive(Clone, Default, PartialEq, Debug)]
    struct Tempo(f32);

    #[derive(Clone, Default, PartialEq, Debug)]
    struct Position(u64);

    struct Both {
        tempo: Consumer<Tempo>,
        position: Consumer<Position>,
    }

    crate::consumer_facets!(Both { tempo: Tempo, position: Position });

    #[test]
    fn facets_by_type() {
        let mut tempo = Channel::new(Tempo(120.0));
        let mut position = Channel::new(Position(0));
        let queue = Arc::new(QueueExecutor::new("facets"));
        let both = Both {
            tempo: Consumer::new(&tempo, queue.clone()),
            position: Consumer::new(&position, queue.clone()),
        };
        tempo.commit(Tempo(90.0));
        position.commit(Position(960));
        position.commit(Position(1920));
        assert_eq!(both.state_of::<Tempo>(), Tempo(120.0));

        assert_eq!(queue.run_queued_functions(), 3);
        assert_eq!(both.state_of::<Tempo>(), Tempo(90.0));
        assert_eq!(both.state_of::<Position>(), Position(1920));
        assert_eq!(both.changes_of::<Tempo>(), 1);
        assert_eq!(both.changes_of::<Position>(), 2);
    }
}
