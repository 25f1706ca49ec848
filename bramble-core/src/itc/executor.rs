//! "Run this later, on that thread."
//!
//! An [`Executor`] accepts boxed closures and guarantees they eventually run
//! on its designated thread, in submission order per submitting thread.
//! [`ImmediateExecutor`] is the exception: its thread is the submitter's.
//! Nothing above this module knows how a thread drains its queue.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync {
    /// Hand `task` over to run on this executor's thread. Never blocks on
    /// other tasks. An inline executor runs it on the caller's thread.
    fn execute(&self, task: Task);
}

pub trait ExecutorExt: Executor {
    /// Box and enqueue a closure.
    fn submit<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(Box::new(f));
    }
}

impl<E: Executor + ?Sized> ExecutorExt for E {}

/// Task queue drained cooperatively by whichever thread owns it.
pub struct QueueExecutor {
    label: &'static str,
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl QueueExecutor {
    pub fn new(label: &'static str) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { label, tx, rx }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Run every task that was queued when this call started.
    /// Tasks submitted by those tasks wait for the next drain.
    pub fn run_queued_functions(&self) -> usize {
        let queued = self.rx.len();
        let mut ran = 0;
        for _ in 0..queued {
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Drain within a time and count budget; for loops that must not overrun
    /// their tick (the audio thread).
    pub fn run_queued_functions_budgeted(&self, max_duration: Duration, max_count: usize) -> usize {
        let start = Instant::now();
        let mut ran = 0;
        while ran < max_count {
            if start.elapsed() >= max_duration {
                break;
            }
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ran
    }

    pub(crate) fn receiver(&self) -> &Receiver<Task> {
        &self.rx
    }
}

impl Executor for QueueExecutor {
    fn execute(&self, task: Task) {
        // Both halves live in self, so the queue cannot be disconnected here.
        if self.tx.send(task).is_err() {
            log::warn!(target: "itc::executor", "[{}] task dropped", self.label);
        }
    }
}

/// Runs every task inline on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateExecutor;

impl Executor for ImmediateExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}
