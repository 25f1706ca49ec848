//! A dedicated OS thread driven by its own [`QueueExecutor`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use super::executor::QueueExecutor;

/// Timing of an executor thread's run loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopTiming {
    /// How often the loop body runs.
    pub tick_interval: Duration,
    /// Time budget for draining tasks after each wakeup.
    pub drain_budget: Duration,
    /// Task budget for draining tasks after each wakeup.
    pub drain_max_tasks: usize,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_micros(500),
            drain_budget: Duration::from_micros(200),
            drain_max_tasks: 128,
        }
    }
}

/// Owns a named thread that waits on its task queue with a tick deadline,
/// runs queued tasks, then calls the loop body once per tick.
///
/// The body is built on the thread by a setup closure, so it can own values
/// that must never leave that thread.
pub struct ExecutorThread {
    name: String,
    executor: Arc<QueueExecutor>,
    stop_tx: Sender<()>,
    join_handle: Option<JoinHandle<()>>,
}

impl ExecutorThread {
    pub fn spawn<F, B>(
        name: &str,
        label: &'static str,
        timing: LoopTiming,
        setup: F,
    ) -> std::io::Result<Self>
    where
        F: FnOnce(&Arc<QueueExecutor>) -> B + Send + 'static,
        B: FnMut(Duration),
    {
        let executor = Arc::new(QueueExecutor::new(label));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let thread_executor = Arc::clone(&executor);
        let join_handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            let body = setup(&thread_executor);
            run_loop(&thread_executor, &stop_rx, timing, body);
        })?;
        log::debug!(target: "itc::executor", "spawned executor thread {}", name);

        Ok(Self {
            name: name.to_string(),
            executor,
            stop_tx,
            join_handle: Some(join_handle),
        })
    }

    pub fn executor(&self) -> &Arc<QueueExecutor> {
        &self.executor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the loop and join the thread. Tasks queued before the stop still run.
    pub fn stop(&mut self) {
        let Some(handle) = self.join_handle.take() else {
            return;
        };
        let _ = self.stop_tx.try_send(());
        if handle.join().is_err() {
            log::error!(target: "itc::executor", "executor thread {} panicked", self.name);
        }
    }
}

impl Drop for ExecutorThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<B: FnMut(Duration)>(
    executor: &QueueExecutor,
    stop_rx: &Receiver<()>,
    timing: LoopTiming,
    mut body: B,
) {
    let mut last_tick = Instant::now();
    loop {
        let remaining = timing.tick_interval.saturating_sub(last_tick.elapsed());

        crossbeam_channel::select! {
            recv(stop_rx) -> _ => break,
            recv(executor.receiver()) -> task => {
                if let Ok(task) = task {
                    task();
                }
            }
            default(remaining) => {}
        }

        executor.run_queued_functions_budgeted(timing.drain_budget, timing.drain_max_tasks);

        let elapsed = last_tick.elapsed();
        if elapsed >= timing.tick_interval {
            last_tick = Instant::now();
            body(elapsed);
        }
    }

    let ran = executor.run_queued_functions();
    let dropped = executor.pending();
    if dropped > 0 {
        log::debug!(target: "itc::executor", "[{}] exiting with {} queued tasks", executor.label(), dropped);
    }
    log::debug!(target: "itc::executor", "[{}] loop exited, ran {} leftover tasks", executor.label(), ran);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itc::ExecutorExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn fast() -> LoopTiming {
        LoopTiming {
            tick_interval: Duration::from_millis(1),
            ..LoopTiming::default()
        }
    }

    #[test]
    fn tasks_run_on_the_executor_thread() {
        let mut worker = ExecutorThread::spawn("itc-test", "test", fast(), |_| |_: Duration| {}).unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        worker.executor().submit(move || {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        });
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("itc-test"));
        worker.stop();
        assert!(!worker.is_running());
    }

    #[test]
    fn every_submitted_task_runs_in_order_before_stop_returns() {
        let mut worker = ExecutorThread::spawn("itc-order", "test", fast(), |_| |_: Duration| {}).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..103 {
            let seen = Arc::clone(&seen);
            worker.executor().submit(move || seen.lock().unwrap().push(i));
        }
        worker.stop();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 103);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn body_ticks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let body_ticks = Arc::clone(&ticks);
        let mut worker = ExecutorThread::spawn("itc-tick", "test", fast(), move |_| {
            move |_elapsed: Duration| {
                body_ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();
        let start = Instant::now();
        while ticks.load(Ordering::SeqCst) < 3 && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(1));
        }
        worker.stop();
        assert!(ticks.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn stop_twice_is_harmless() {
        let mut worker = ExecutorThread::spawn("itc-stop", "test", fast(), |_| |_: Duration| {}).unwrap();
        worker.stop();
        worker.stop();
    }
}
