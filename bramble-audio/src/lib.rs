//! Audio subsystem: the `AudioManager` service and its real-time thread.
//!
//! The audio thread never shares mutable state. It follows the transport
//! through a consumer, drives its engines through action registries it owns,
//! and publishes the playhead through its own channel.

mod audio_thread;
pub mod engine;
mod manager;

use std::sync::Arc;

use bramble_core::itc::{ChannelHandle, QueueExecutor};
use bramble_types::PlayheadState;

pub use engine::{Engine, EngineSet};
pub use manager::ThreadedAudioManager;

/// Input and output levels, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub line_in_l: f32,
    pub line_in_r: f32,
    pub output: f32,
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            line_in_l: 0.5,
            line_in_r: 0.5,
            output: 0.8,
        }
    }
}

pub trait AudioManager: Send + Sync {
    fn line_in_gain_l(&self, gain: f32);
    fn line_in_gain_r(&self, gain: f32);
    fn output_vol(&self, volume: f32);
    fn levels(&self) -> Levels;

    /// Subscribe here to follow the playhead.
    fn playhead(&self) -> ChannelHandle<PlayheadState>;

    /// Tasks submitted here run on the audio thread.
    fn executor(&self) -> Arc<QueueExecutor>;
}
