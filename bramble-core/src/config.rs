use std::path::{Path, PathBuf};
use std::time::Duration;

use bramble_types::ActionChannel;
use serde::Deserialize;

use crate::itc::LoopTiming;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    runtime: RuntimeConfig,
    #[serde(default)]
    transport: TransportConfig,
    #[serde(default)]
    audio: AudioConfig,
}

#[derive(Deserialize, Default)]
struct RuntimeConfig {
    ui_frame_interval_ms: Option<u64>,
    audio_tick_interval_us: Option<u64>,
    drain_budget_us: Option<u64>,
    drain_max_tasks: Option<usize>,
}

#[derive(Deserialize, Default)]
struct TransportConfig {
    bpm: Option<f32>,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    engine_channels: Option<Vec<String>>,
}

pub struct Config {
    runtime: RuntimeConfig,
    transport: TransportConfig,
    audio: AudioConfig,
}

impl Config {
    /// Embedded defaults, overlaid with the user's config file if it exists.
    pub fn load() -> Self {
        match user_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::embedded(),
        }
    }

    /// Embedded defaults, overlaid with the file at `path` if it exists.
    /// An unreadable or malformed file is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let mut base = Self::embedded();
        if !path.exists() {
            return base;
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(user) => base.merge(user),
                Err(e) => {
                    log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                }
            },
            Err(e) => {
                log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
            }
        }
        base
    }

    fn embedded() -> Self {
        let file: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Config {
            runtime: file.runtime,
            transport: file.transport,
            audio: file.audio,
        }
    }

    fn merge(&mut self, user: ConfigFile) {
        merge_runtime(&mut self.runtime, user.runtime);
        if user.transport.bpm.is_some() {
            self.transport.bpm = user.transport.bpm;
        }
        if user.audio.engine_channels.is_some() {
            self.audio.engine_channels = user.audio.engine_channels;
        }
    }

    /// UI frame interval (clamped to 1..=1000 ms).
    pub fn ui_frame_interval(&self) -> Duration {
        Duration::from_millis(self.runtime.ui_frame_interval_ms.unwrap_or(16).clamp(1, 1000))
    }

    /// Run-loop timing for the audio thread.
    pub fn audio_timing(&self) -> LoopTiming {
        let fallback = LoopTiming::default();
        LoopTiming {
            tick_interval: self
                .runtime
                .audio_tick_interval_us
                .map(|us| Duration::from_micros(us.clamp(50, 100_000)))
                .unwrap_or(fallback.tick_interval),
            ..self.loop_timing()
        }
    }

    /// Drain budgets shared by every executor thread; the tick interval is
    /// left at its default.
    pub fn loop_timing(&self) -> LoopTiming {
        let fallback = LoopTiming::default();
        LoopTiming {
            tick_interval: fallback.tick_interval,
            drain_budget: self
                .runtime
                .drain_budget_us
                .map(|us| Duration::from_micros(us.clamp(10, 100_000)))
                .unwrap_or(fallback.drain_budget),
            drain_max_tasks: self
                .runtime
                .drain_max_tasks
                .map(|n| n.clamp(1, 65_536))
                .unwrap_or(fallback.drain_max_tasks),
        }
    }

    /// Starting tempo (clamped to 20..=300 BPM).
    pub fn default_bpm(&self) -> f32 {
        let bpm = self.transport.bpm.unwrap_or(120.0);
        if bpm.is_finite() {
            bpm.clamp(20.0, 300.0)
        } else {
            120.0
        }
    }

    /// Sub-busses that get an audio engine. Unknown names are logged and
    /// skipped; duplicates collapse.
    pub fn engine_channels(&self) -> Vec<ActionChannel> {
        let Some(names) = &self.audio.engine_channels else {
            return vec![ActionChannel::Instrument];
        };
        let mut channels = Vec::new();
        for name in names {
            match name.parse::<ActionChannel>() {
                Ok(channel) if !channels.contains(&channel) => channels.push(channel),
                Ok(_) => {}
                Err(e) => log::warn!(target: "config", "audio.engine_channels: {}", e),
            }
        }
        channels
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::embedded()
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bramble").join("config.toml"))
}

fn merge_runtime(base: &mut RuntimeConfig, user: RuntimeConfig) {
    if user.ui_frame_interval_ms.is_some() {
        base.ui_frame_interval_ms = user.ui_frame_interval_ms;
    }
    if user.audio_tick_interval_us.is_some() {
        base.audio_tick_interval_us = user.audio_tick_interval_us;
    }
    if user.drain_budget_us.is_some() {
        base.drain_budget_us = user.drain_budget_us;
    }
    if user.drain_max_tasks.is_some() {
        base.drain_max_tasks = user.drain_max_tasks;
    }
}
