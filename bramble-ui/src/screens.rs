//! Screens the main UI switches between.

use std::sync::Arc;

use bramble_audio::AudioManager;
use bramble_core::consumer_facets;
use bramble_core::itc::{ChannelHandle, Consumer, Executor, FacetExt};
use bramble_core::state::StateManager;
use bramble_types::{Led, PlayheadState, TransportState};

use crate::keys::{Encoder, Key, Rotary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenId {
    Tape,
    Mixer,
    Synth,
    Drums,
    Metronome,
}

impl ScreenId {
    pub fn for_key(key: Key) -> Option<ScreenId> {
        match key {
            Key::Tape => Some(ScreenId::Tape),
            Key::Mixer => Some(ScreenId::Mixer),
            Key::Synth => Some(ScreenId::Synth),
            Key::Drums => Some(ScreenId::Drums),
            Key::Metronome => Some(ScreenId::Metronome),
            _ => None,
        }
    }

    pub fn led(self) -> Led {
        match self {
            ScreenId::Tape => Led::Tape,
            ScreenId::Mixer => Led::Mixer,
            ScreenId::Synth => Led::Synth,
            ScreenId::Drums => Led::Drums,
            ScreenId::Metronome => Led::Metronome,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScreenId::Tape => "tape",
            ScreenId::Mixer => "mixer",
            ScreenId::Synth => "synth",
            ScreenId::Drums => "drums",
            ScreenId::Metronome => "metronome",
        }
    }
}

pub trait Screen {
    fn id(&self) -> ScreenId;

    fn init(&mut self) {}

    fn exit(&mut self) {}

    fn rotary(&mut self, _rotary: Rotary) {}

    /// Return true if the key was handled.
    fn keypress(&mut self, _key: Key) -> bool {
        false
    }

    fn keyrelease(&mut self, _key: Key) -> bool {
        false
    }

    /// One line describing what the screen shows.
    fn status(&self) -> String;
}

/// Position and transport readout.
pub struct TapeScreen {
    transport: Consumer<TransportState>,
    playhead: Consumer<PlayheadState>,
}

consumer_facets!(TapeScreen {
    transport: TransportState,
    playhead: PlayheadState,
});

impl TapeScreen {
    pub fn new(
        transport: &ChannelHandle<TransportState>,
        playhead: &ChannelHandle<PlayheadState>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            transport: Consumer::new(transport, Arc::clone(&executor)),
            playhead: Consumer::new(playhead, executor),
        }
    }
}

impl Screen for TapeScreen {
    fn id(&self) -> ScreenId {
        ScreenId::Tape
    }

    fn status(&self) -> String {
        let transport = self.state_of::<TransportState>();
        let playhead = self.state_of::<PlayheadState>();
        format!(
            "{} bar {} beat {} @ {:.0} bpm",
            if transport.playing { "playing" } else { "stopped" },
            playhead.beat() / 4 + 1,
            playhead.beat() % 4 + 1,
            transport.bpm
        )
    }
}

const LEVEL_STEP: f32 = 0.05;

/// Red: output volume. Blue and white: line-in gain left and right.
pub struct MixerScreen {
    audio: Arc<dyn AudioManager>,
}

impl MixerScreen {
    pub fn new(audio: Arc<dyn AudioManager>) -> Self {
        Self { audio }
    }
}

impl Screen for MixerScreen {
    fn id(&self) -> ScreenId {
        ScreenId::Mixer
    }

    fn rotary(&mut self, rotary: Rotary) {
        let levels = self.audio.levels();
        let step = rotary.delta as f32 * LEVEL_STEP;
        match rotary.encoder {
            Encoder::Red => self.audio.output_vol(levels.output + step),
            Encoder::Blue => self.audio.line_in_gain_l(levels.line_in_l + step),
            Encoder::White => self.audio.line_in_gain_r(levels.line_in_r + step),
            Encoder::Green => {}
        }
    }

    fn status(&self) -> String {
        let levels = self.audio.levels();
        format!(
            "out {:.2} in L {:.2} R {:.2}",
            levels.output, levels.line_in_l, levels.line_in_r
        )
    }
}

/// Red: tempo in whole BPM.
pub struct MetronomeScreen {
    state: Arc<StateManager>,
}

impl MetronomeScreen {
    pub fn new(state: Arc<StateManager>) -> Self {
        Self { state }
    }
}

impl Screen for MetronomeScreen {
    fn id(&self) -> ScreenId {
        ScreenId::Metronome
    }

    fn rotary(&mut self, rotary: Rotary) {
        if rotary.encoder == Encoder::Red {
            self.state.commit_transport(|t| {
                t.bpm = (t.bpm + rotary.delta as f32).clamp(20.0, 300.0);
            });
        }
    }

    fn status(&self) -> String {
        format!("{:.0} bpm", self.state.transport_state().bpm)
    }
}

/// Four encoder values and nothing else, for screens whose engines are not
/// wired to the panel yet.
pub struct EncoderScreen {
    id: ScreenId,
    values: [i32; 4],
}

impl EncoderScreen {
    pub fn new(id: ScreenId) -> Self {
        Self { id, values: [0; 4] }
    }
}

impl Screen for EncoderScreen {
    fn id(&self) -> ScreenId {
        self.id
    }

    fn rotary(&mut self, rotary: Rotary) {
        let index = match rotary.encoder {
            Encoder::Red => 0,
            Encoder::Blue => 1,
            Encoder::White => 2,
            Encoder::Green => 3,
        };
        self.values[index] = (self.values[index] + rotary.delta).clamp(0, 127);
    }

    fn status(&self) -> String {
        let [r, b, w, g] = self.values;
        format!("r {} b {} w {} g {}", r, b, w, g)
    }
}
