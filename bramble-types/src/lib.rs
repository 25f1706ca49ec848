//! # bramble-types
//!
//! Shared plain-data types for the Bramble workstation.
//! Everything in here is `Clone` and serde-friendly so it can travel through
//! state channels and config files without pulling in the coordination layer.

use serde::{Deserialize, Serialize};

/// Logical sub-bus used to scope action dispatch.
///
/// Two identical engines loaded into different slots (e.g. two samplers) are
/// told apart by the channel they registered on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionChannel {
    Arpeggiator,
    Instrument,
    Fx1,
    Fx2,
    Sequencer,
    Sampler1,
    Sampler2,
    Sampler3,
    Sampler4,
    Sampler5,
    Sampler6,
    Sampler7,
    Sampler8,
    Sampler9,
}

impl ActionChannel {
    pub const ALL: [ActionChannel; 14] = [
        ActionChannel::Arpeggiator,
        ActionChannel::Instrument,
        ActionChannel::Fx1,
        ActionChannel::Fx2,
        ActionChannel::Sequencer,
        ActionChannel::Sampler1,
        ActionChannel::Sampler2,
        ActionChannel::Sampler3,
        ActionChannel::Sampler4,
        ActionChannel::Sampler5,
        ActionChannel::Sampler6,
        ActionChannel::Sampler7,
        ActionChannel::Sampler8,
        ActionChannel::Sampler9,
    ];

    /// Sampler slot `n` (1-based). Returns None outside 1..=9.
    pub fn sampler(n: u8) -> Option<Self> {
        match n {
            1..=9 => Some(Self::ALL[4 + n as usize]),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionChannel::Arpeggiator => "arpeggiator",
            ActionChannel::Instrument => "instrument",
            ActionChannel::Fx1 => "fx1",
            ActionChannel::Fx2 => "fx2",
            ActionChannel::Sequencer => "sequencer",
            ActionChannel::Sampler1 => "sampler1",
            ActionChannel::Sampler2 => "sampler2",
            ActionChannel::Sampler3 => "sampler3",
            ActionChannel::Sampler4 => "sampler4",
            ActionChannel::Sampler5 => "sampler5",
            ActionChannel::Sampler6 => "sampler6",
            ActionChannel::Sampler7 => "sampler7",
            ActionChannel::Sampler8 => "sampler8",
            ActionChannel::Sampler9 => "sampler9",
        }
    }
}

impl std::fmt::Display for ActionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| format!("unknown action channel '{}'", s))
    }
}

/// Transport state, produced by the UI thread and observed by the audio thread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportState {
    pub playing: bool,
    pub bpm: f32,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            playing: false,
            bpm: 120.0,
        }
    }
}

impl TransportState {
    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }
}

/// Ticks per quarter note used by the playhead.
pub const TICKS_PER_BEAT: u32 = 480;

/// Playhead position, produced by the audio thread and observed by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayheadState {
    pub playing: bool,
    pub tick: u64,
}

impl PlayheadState {
    pub fn beat(&self) -> u64 {
        self.tick / TICKS_PER_BEAT as u64
    }
}

/// Front-panel LEDs addressable through the controller service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Led {
    Play,
    Tape,
    Mixer,
    Synth,
    Drums,
    Metronome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl LedColor {
    pub const OFF: LedColor = LedColor { r: 0, g: 0, b: 0 };
    pub const GREEN: LedColor = LedColor { r: 0, g: 0xff, b: 0 };
    pub const WHITE: LedColor = LedColor {
        r: 0xff,
        g: 0xff,
        b: 0xff,
    };
}
