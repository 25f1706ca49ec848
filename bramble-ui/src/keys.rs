use std::fmt;
use std::str::FromStr;

/// Front-panel keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    RedUp,
    RedDown,
    BlueUp,
    BlueDown,
    WhiteUp,
    WhiteDown,
    GreenUp,
    GreenDown,
    Play,
    Quit,
    Tape,
    Mixer,
    Synth,
    Drums,
    Metronome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoder {
    Red,
    Blue,
    White,
    Green,
}

/// One detent of an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotary {
    pub encoder: Encoder,
    pub delta: i32,
}

impl Key {
    const NAMES: [(Key, &'static str); 15] = [
        (Key::RedUp, "red_up"),
        (Key::RedDown, "red_down"),
        (Key::BlueUp, "blue_up"),
        (Key::BlueDown, "blue_down"),
        (Key::WhiteUp, "white_up"),
        (Key::WhiteDown, "white_down"),
        (Key::GreenUp, "green_up"),
        (Key::GreenDown, "green_down"),
        (Key::Play, "play"),
        (Key::Quit, "quit"),
        (Key::Tape, "tape"),
        (Key::Mixer, "mixer"),
        (Key::Synth, "synth"),
        (Key::Drums, "drums"),
        (Key::Metronome, "metronome"),
    ];

    /// Encoder keys turn into rotary events instead of presses.
    pub fn rotary(self) -> Option<Rotary> {
        let (encoder, delta) = match self {
            Key::RedUp => (Encoder::Red, 1),
            Key::RedDown => (Encoder::Red, -1),
            Key::BlueUp => (Encoder::Blue, 1),
            Key::BlueDown => (Encoder::Blue, -1),
            Key::WhiteUp => (Encoder::White, 1),
            Key::WhiteDown => (Encoder::White, -1),
            Key::GreenUp => (Encoder::Green, 1),
            Key::GreenDown => (Encoder::Green, -1),
            _ => return None,
        };
        Some(Rotary { encoder, delta })
    }

    /// Terminal keyboard layout: one row of up keys above the matching
    /// down keys.
    pub fn from_char(c: char) -> Option<Key> {
        let key = match c {
            'a' => Key::RedUp,
            'z' => Key::RedDown,
            's' => Key::BlueUp,
            'x' => Key::BlueDown,
            'd' => Key::WhiteUp,
            'c' => Key::WhiteDown,
            'f' => Key::GreenUp,
            'v' => Key::GreenDown,
            ' ' => Key::Play,
            'q' => Key::Quit,
            't' => Key::Tape,
            'm' => Key::Mixer,
            'y' => Key::Synth,
            'u' => Key::Drums,
            'k' => Key::Metronome,
            _ => return None,
        };
        Some(key)
    }

    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(key, _)| *key == self)
            .map_or("?", |(_, name)| *name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::NAMES
            .iter()
            .find(|(_, name)| *name == wanted)
            .map(|(key, _)| *key)
            .ok_or_else(|| format!("unknown key '{}'", s.trim()))
    }
}
