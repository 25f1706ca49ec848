use std::collections::VecDeque;
use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::{
    cursor::MoveToColumn,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};

use crate::keys::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Press(Key),
    Release(Key),
}

/// Where key events come from and where the status line goes.
pub trait InputSource {
    /// Poll for an input event with a timeout.
    /// Returns None if no event is available within the timeout.
    fn poll_event(&mut self, timeout: Duration) -> Option<InputEvent>;

    fn present(&mut self, status: &str) -> io::Result<()>;

    /// True once the source will never produce another event.
    fn exhausted(&self) -> bool {
        false
    }
}

/// Pre-recorded key presses, for headless runs and tests. Each key is
/// pressed and released in turn.
pub struct ScriptedInput {
    events: VecDeque<InputEvent>,
    last_status: String,
}

impl ScriptedInput {
    pub fn new(keys: &[Key]) -> Self {
        let events = keys
            .iter()
            .flat_map(|&key| [InputEvent::Press(key), InputEvent::Release(key)])
            .collect();
        Self {
            events,
            last_status: String::new(),
        }
    }

    /// Parse a comma-separated key list such as `"play,red_up,quit"`.
    pub fn parse(script: &str) -> Result<Self, String> {
        let keys = script
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<Key>)
            .collect::<Result<Vec<Key>, String>>()?;
        Ok(Self::new(&keys))
    }

    #[allow(dead_code)]
    pub fn last_status(&self) -> &str {
        &self.last_status
    }
}

impl InputSource for ScriptedInput {
    fn poll_event(&mut self, _timeout: Duration) -> Option<InputEvent> {
        self.events.pop_front()
    }

    fn present(&mut self, status: &str) -> io::Result<()> {
        if status != self.last_status {
            log::info!(target: "ui", "{}", status);
            self.last_status = status.to_string();
        }
        Ok(())
    }

    fn exhausted(&self) -> bool {
        self.events.is_empty()
    }
}

/// Raw-mode terminal. Terminals don't report releases reliably, so every
/// press is followed by a synthesized release.
pub struct TerminalInput {
    stdout: Stdout,
    pending_release: Option<Key>,
    last_status: String,
    raw: bool,
}

impl TerminalInput {
    pub fn start() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            Print("a/z s/x d/c f/v encoders  space play  t m y u k screens  q quit\r\n")
        )?;
        Ok(Self {
            stdout,
            pending_release: None,
            last_status: String::new(),
            raw: true,
        })
    }

    pub fn stop(&mut self) -> io::Result<()> {
        if !self.raw {
            return Ok(());
        }
        self.raw = false;
        disable_raw_mode()?;
        execute!(self.stdout, Print("\r\n"))
    }
}

impl InputSource for TerminalInput {
    fn poll_event(&mut self, timeout: Duration) -> Option<InputEvent> {
        if let Some(key) = self.pending_release.take() {
            return Some(InputEvent::Release(key));
        }
        let mut t = timeout;
        loop {
            if !event::poll(t).ok()? {
                return None;
            }
            if let Event::Key(key_event) = event::read().ok()? {
                if key_event.kind != KeyEventKind::Release {
                    let key = match key_event.code {
                        KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                            Some(Key::Quit)
                        }
                        KeyCode::Esc => Some(Key::Quit),
                        KeyCode::Char(c) => Key::from_char(c.to_ascii_lowercase()),
                        _ => None,
                    };
                    if let Some(key) = key {
                        self.pending_release = Some(key);
                        return Some(InputEvent::Press(key));
                    }
                }
            }
            // Discarded event: drain with zero timeout
            t = Duration::ZERO;
        }
    }

    fn present(&mut self, status: &str) -> io::Result<()> {
        if status == self.last_status {
            return Ok(());
        }
        self.last_status = status.to_string();
        queue!(
            self.stdout,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(status)
        )?;
        self.stdout.flush()
    }
}

impl Drop for TerminalInput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
