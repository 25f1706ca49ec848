use std::sync::Arc;
use std::time::{Duration, Instant};

use bramble_core::itc::QueueExecutor;
use bramble_core::service::{Runtime, ServiceAccessor, ServiceRegistry};

use crate::input::{InputEvent, InputSource};
use crate::main_ui::MainUi;

/// Owns the UI thread's executor and runs the frame loop on whichever thread
/// calls `main_ui_loop`.
pub struct UiManager {
    executor: Arc<QueueExecutor>,
    frame_interval: Duration,
    services: ServiceAccessor,
}

impl UiManager {
    pub fn new(registry: &Arc<ServiceRegistry>, frame_interval: Duration) -> Self {
        Self {
            executor: Arc::new(QueueExecutor::new("ui")),
            frame_interval,
            services: ServiceAccessor::new(Arc::clone(registry)).require::<Runtime>(),
        }
    }

    pub fn executor(&self) -> Arc<QueueExecutor> {
        Arc::clone(&self.executor)
    }

    /// Run frames until the runtime is asked to stop, `max_frames` is
    /// reached, or a finite input source runs dry with no frame limit set.
    /// Returns the number of frames run.
    pub fn main_ui_loop(
        &self,
        ui: &mut MainUi,
        input: &mut dyn InputSource,
        max_frames: Option<u64>,
    ) -> std::io::Result<u64> {
        let runtime = self.services.service::<Runtime>();
        let mut frames = 0;

        while runtime.should_run() {
            if max_frames.is_some_and(|max| frames >= max) {
                break;
            }
            if max_frames.is_none() && input.exhausted() {
                log::info!(target: "ui", "input finished");
                break;
            }
            let frame_start = Instant::now();

            self.executor.run_queued_functions();

            loop {
                let remaining = self.frame_interval.saturating_sub(frame_start.elapsed());
                let Some(event) = input.poll_event(remaining) else {
                    break;
                };
                match event {
                    InputEvent::Press(key) => {
                        if !ui.keypress(key) {
                            log::trace!(target: "ui", "unhandled key {}", key);
                        }
                    }
                    InputEvent::Release(key) => {
                        ui.keyrelease(key);
                    }
                }
                if !runtime.should_run() {
                    break;
                }
            }

            input.present(&ui.status())?;
            frames += 1;

            let remaining = self.frame_interval.saturating_sub(frame_start.elapsed());
            if !remaining.is_zero() && runtime.wait_for_stop(remaining) {
                log::debug!(target: "ui", "stop requested mid-frame");
            }
        }

        // Let consumers see the final state before the caller tears down.
        self.executor.run_queued_functions();
        Ok(frames)
    }
}
