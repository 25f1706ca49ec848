use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Process run flag shared by every long-lived loop.
///
/// Loops poll `should_run()`; anything may call `request_stop()`.
#[derive(Default)]
pub struct Runtime {
    stop_requested: Mutex<bool>,
    stopped: Condvar,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        let mut stop = self
            .stop_requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !*stop {
            log::info!(target: "service::runtime", "stop requested");
        }
        *stop = true;
        self.stopped.notify_all();
    }

    pub fn should_run(&self) -> bool {
        !*self
            .stop_requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a stop is requested or `timeout` passes. Returns true on stop.
    pub fn wait_for_stop(&self, timeout: Duration) -> bool {
        let guard = self
            .stop_requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .stopped
            .wait_timeout_while(guard, timeout, |stop| !*stop)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn stop_flag() {
        let runtime = Runtime::new();
        assert!(runtime.should_run());
        runtime.request_stop();
        assert!(!runtime.should_run());
        runtime.request_stop();
        assert!(!runtime.should_run());
    }

    #[test]
    fn wait_times_out_without_stop() {
        let runtime = Runtime::new();
        assert!(!runtime.wait_for_stop(Duration::from_millis(5)));
    }

    #[test]
    fn wait_wakes_on_stop_from_other_thread() {
        let runtime = Arc::new(Runtime::new());
        let remote = Arc::clone(&runtime);
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            remote.request_stop();
        });
        assert!(runtime.wait_for_stop(Duration::from_secs(5)));
        stopper.join().unwrap();
    }
}
