//! LED driver service.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bramble_types::{Led, LedColor};

pub trait Controller: Send + Sync {
    /// Stage a colour; it shows on the next `flush_leds`.
    fn set_color(&self, led: Led, color: LedColor);
    fn flush_leds(&self);
    fn clear_leds(&self);
}

#[derive(Default)]
struct Leds {
    staged: HashMap<Led, LedColor>,
    shown: HashMap<Led, LedColor>,
}

/// Controller for boards without LEDs: keeps the panel in memory and logs
/// every flush.
#[derive(Default)]
pub struct LoggingController {
    leds: Mutex<Leds>,
}

impl LoggingController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Leds> {
        self.leds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Colour currently shown on `led`.
    #[allow(dead_code)]
    pub fn shown(&self, led: Led) -> LedColor {
        self.lock().shown.get(&led).copied().unwrap_or(LedColor::OFF)
    }
}

impl Controller for LoggingController {
    fn set_color(&self, led: Led, color: LedColor) {
        self.lock().staged.insert(led, color);
    }

    fn flush_leds(&self) {
        let mut leds = self.lock();
        let staged = std::mem::take(&mut leds.staged);
        for (led, color) in staged {
            log::debug!(target: "ui", "led {:?} -> #{:02x}{:02x}{:02x}", led, color.r, color.g, color.b);
            leds.shown.insert(led, color);
        }
    }

    fn clear_leds(&self) {
        let mut leds = self.lock();
        leds.staged.clear();
        leds.shown.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colours_show_after_flush() {
        let controller = LoggingController::new();
        controller.set_color(Led::Play, LedColor::GREEN);
        assert_eq!(controller.shown(Led::Play), LedColor::OFF);
        controller.flush_leds();
        assert_eq!(controller.shown(Led::Play), LedColor::GREEN);
        controller.clear_leds();
        assert_eq!(controller.shown(Led::Play), LedColor::OFF);
    }
}
