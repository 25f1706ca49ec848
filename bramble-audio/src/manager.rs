use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bramble_core::itc::{ActionChannel, Channel, ChannelHandle, ExecutorThread, LoopTiming, QueueExecutor};
use bramble_core::service::{ServiceAccessor, ServiceRegistry};
use bramble_core::state::StateManager;
use bramble_types::PlayheadState;

use crate::audio_thread::AudioThread;
use crate::{AudioManager, Levels};

/// Lock-free `f32` cell, stored as bits.
struct AtomicLevel(AtomicU32);

impl AtomicLevel {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// `AudioManager` backed by a dedicated `audio` thread.
pub struct ThreadedAudioManager {
    line_in_l: AtomicLevel,
    line_in_r: AtomicLevel,
    output: AtomicLevel,
    playhead: ChannelHandle<PlayheadState>,
    executor: Arc<QueueExecutor>,
    thread: Mutex<ExecutorThread>,
}

impl ThreadedAudioManager {
    /// Spawn the audio thread. Needs an active `StateManager`.
    pub fn start(
        services: &ServiceAccessor,
        timing: LoopTiming,
        channels: Vec<ActionChannel>,
    ) -> std::io::Result<Self> {
        let transport = services.service::<StateManager>().transport();
        let playhead = Channel::new(PlayheadState::default());
        let playhead_handle = playhead.handle();

        let thread = ExecutorThread::spawn("audio", "audio", timing, move |executor| {
            let mut audio = AudioThread::new(&transport, executor, &channels, playhead);
            move |elapsed: Duration| audio.tick(elapsed)
        })?;

        let levels = Levels::default();
        Ok(Self {
            line_in_l: AtomicLevel::new(levels.line_in_l),
            line_in_r: AtomicLevel::new(levels.line_in_r),
            output: AtomicLevel::new(levels.output),
            playhead: playhead_handle,
            executor: Arc::clone(thread.executor()),
            thread: Mutex::new(thread),
        })
    }

    /// Service constructor. Every start spawns a fresh audio thread, owned
    /// by the instance the handle registers.
    pub fn constructor(
        timing: LoopTiming,
        channels: Vec<ActionChannel>,
    ) -> impl Fn(&Arc<ServiceRegistry>) -> Arc<dyn AudioManager> + Send + 'static {
        move |registry: &Arc<ServiceRegistry>| {
            let services = ServiceAccessor::new(Arc::clone(registry)).require::<StateManager>();
            let audio = Self::start(&services, timing, channels.clone())
                .expect("failed to spawn audio thread");
            Arc::new(audio) as Arc<dyn AudioManager>
        }
    }

    /// Stop and join the audio thread. Also happens on drop.
    pub fn shutdown(&self) {
        self.thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
    }
}

impl AudioManager for ThreadedAudioManager {
    fn line_in_gain_l(&self, gain: f32) {
        self.line_in_l.store(gain);
    }

    fn line_in_gain_r(&self, gain: f32) {
        self.line_in_r.store(gain);
    }

    fn output_vol(&self, volume: f32) {
        self.output.store(volume);
        log::debug!(target: "audio", "output volume {:.2}", self.output.load());
    }

    fn levels(&self) -> Levels {
        Levels {
            line_in_l: self.line_in_l.load(),
            line_in_r: self.line_in_r.load(),
            output: self.output.load(),
        }
    }

    fn playhead(&self) -> ChannelHandle<PlayheadState> {
        self.playhead.clone()
    }

    fn executor(&self) -> Arc<QueueExecutor> {
        Arc::clone(&self.executor)
    }
}
