//! Inter-thread coordination.
//!
//! - [`Executor`]: where a task runs. [`QueueExecutor`] is drained by its
//!   owning thread; [`ExecutorThread`] owns such a thread outright.
//! - [`Channel`] / [`Consumer`]: one producer publishes a state value, any
//!   number of consumers on other threads receive coalesced snapshots through
//!   their own executors.
//! - [`ActionReceiverRegistry`]: synchronous command fan-out to receivers
//!   grouped by [`ActionChannel`], on the caller's thread.

mod action;
mod action_registry;
mod channel;
mod consumer;
mod executor;
mod executor_thread;

pub use action::{Action, ActionReceiver};
pub use action_registry::ActionReceiverRegistry;
pub use bramble_types::ActionChannel;
pub use channel::{Channel, ChannelHandle, State, Subscribable};
pub use consumer::{Consumer, Facet, FacetExt, StateObserver};
pub use executor::{Executor, ExecutorExt, ImmediateExecutor, QueueExecutor, Task};
pub use executor_thread::{ExecutorThread, LoopTiming};
