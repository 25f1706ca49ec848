use std::sync::Arc;
use std::time::Duration;

use bramble_core::itc::{ActionChannel, Channel, ChannelHandle, Consumer, QueueExecutor};
use bramble_types::{PlayheadState, TransportState, TICKS_PER_BEAT};

use crate::engine::EngineSet;

/// State owned by the audio thread. Built on that thread and never moved off it.
pub(crate) struct AudioThread {
    transport: Consumer<TransportState>,
    was_playing: bool,
    engines: EngineSet,
    playhead: Channel<PlayheadState>,
    /// Fractional ticks carried between loop ticks so slow tempos don't stall.
    tick_accumulator: f64,
}

impl AudioThread {
    pub(crate) fn new(
        transport: &ChannelHandle<TransportState>,
        executor: &Arc<QueueExecutor>,
        channels: &[ActionChannel],
        playhead: Channel<PlayheadState>,
    ) -> Self {
        let transport = Consumer::new(transport, executor.clone());
        log::info!(target: "audio", "audio thread up with {} engines", channels.len());
        Self {
            transport,
            was_playing: false,
            engines: EngineSet::new(channels),
            playhead,
            tick_accumulator: 0.0,
        }
    }

    pub(crate) fn tick(&mut self, elapsed: Duration) {
        let transport = self.transport.state();

        if transport.playing != self.was_playing {
            self.was_playing = transport.playing;
            if transport.playing {
                log::debug!(target: "audio", "play at tick {}", self.playhead.state().tick);
                self.engines.play();
            } else {
                log::debug!(target: "audio", "stop at tick {}", self.playhead.state().tick);
                self.engines.stop();
                self.tick_accumulator = 0.0;
            }
            self.playhead.update(|p| p.playing = transport.playing);
        }

        if !transport.playing {
            return;
        }

        self.tick_accumulator +=
            elapsed.as_secs_f64() * (f64::from(transport.bpm) / 60.0) * f64::from(TICKS_PER_BEAT);
        let delta = self.tick_accumulator as u64;
        if delta == 0 {
            return;
        }
        self.tick_accumulator -= delta as f64;

        self.playhead.update(|p| p.tick += delta);
        self.engines.tick(*self.playhead.state());
    }

    #[cfg(test)]
    pub(crate) fn engines(&self) -> &EngineSet {
        &self.engines
    }
}
