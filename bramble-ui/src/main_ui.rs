//! Key routing for the front panel.
//!
//! Encoder keys go straight to the current screen as rotary events. Every
//! other key is offered to the global pre-handler (quit, screen switches),
//! then to the screen, then to the global post-handler (play).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use bramble_audio::AudioManager;
use bramble_core::itc::{
    ActionChannel, ActionReceiver, ActionReceiverRegistry, Consumer, Executor,
};
use bramble_core::service::{Runtime, ServiceAccessor};
use bramble_core::state::StateManager;
use bramble_types::{Led, LedColor, TransportState};

use crate::controller::Controller;
use crate::keys::Key;
use crate::screens::{EncoderScreen, MetronomeScreen, MixerScreen, Screen, ScreenId, TapeScreen};

bramble_core::actions! {
    pub TogglePlay();
}

/// Flips the transport between playing and stopped.
pub struct TransportControl {
    state: Arc<StateManager>,
}

impl ActionReceiver<TogglePlay> for TransportControl {
    fn action(&mut self, _: TogglePlay, (): ()) {
        self.state.commit_transport(|t| {
            if t.playing {
                t.stop();
            } else {
                t.play();
            }
        });
    }
}

pub struct MainUi {
    services: ServiceAccessor,
    screens: HashMap<ScreenId, Box<dyn Screen>>,
    current: ScreenId,
    keys: HashMap<Key, bool>,
    toggle_play: ActionReceiverRegistry<TogglePlay>,
    transport_control: Rc<RefCell<TransportControl>>,
    /// Lights the play LED on every transport change.
    _transport: Consumer<TransportState>,
}

impl MainUi {
    /// Needs `Runtime`, `StateManager`, `dyn AudioManager` and
    /// `dyn Controller`. Consumers deliver through `executor`, which the
    /// caller drains on this thread.
    pub fn new(services: ServiceAccessor, executor: Arc<dyn Executor>) -> Self {
        let state = services.service::<StateManager>();
        let audio = services.service::<dyn AudioManager>();
        let controller = services.service::<dyn Controller>();

        let mut screens: HashMap<ScreenId, Box<dyn Screen>> = HashMap::new();
        let tape = TapeScreen::new(&state.transport(), &audio.playhead(), Arc::clone(&executor));
        screens.insert(ScreenId::Tape, Box::new(tape));
        screens.insert(ScreenId::Mixer, Box::new(MixerScreen::new(audio)));
        screens.insert(ScreenId::Synth, Box::new(EncoderScreen::new(ScreenId::Synth)));
        screens.insert(ScreenId::Drums, Box::new(EncoderScreen::new(ScreenId::Drums)));
        screens.insert(
            ScreenId::Metronome,
            Box::new(MetronomeScreen::new(Arc::clone(&state))),
        );

        let transport = Consumer::with_observer(&state.transport(), executor, move |t: &TransportState| {
            controller.set_color(Led::Play, if t.playing { LedColor::GREEN } else { LedColor::OFF });
            controller.flush_leds();
        });

        let transport_control = Rc::new(RefCell::new(TransportControl { state }));
        let mut toggle_play = ActionReceiverRegistry::<TogglePlay>::new();
        toggle_play.add_to(ActionChannel::Sequencer, &transport_control);

        let mut ui = Self {
            services,
            screens,
            current: ScreenId::Tape,
            keys: HashMap::new(),
            toggle_play,
            transport_control,
            _transport: transport,
        };
        ui.screen_mut().init();
        ui.light_screen(ScreenId::Tape, LedColor::WHITE);
        ui
    }

    #[allow(dead_code)]
    pub fn current(&self) -> ScreenId {
        self.current
    }

    #[allow(dead_code)]
    pub fn is_pressed(&self, key: Key) -> bool {
        self.keys.get(&key).copied().unwrap_or(false)
    }

    pub fn status(&self) -> String {
        format!("[{}] {}", self.current.name(), self.screen().status())
    }

    /// Switch screens, running the exit and init hooks.
    pub fn display(&mut self, id: ScreenId) {
        if id == self.current {
            return;
        }
        self.screen_mut().exit();
        self.light_screen(self.current, LedColor::OFF);
        self.current = id;
        self.screen_mut().init();
        self.light_screen(id, LedColor::WHITE);
        log::debug!(target: "ui", "screen {}", self.screen().id().name());
    }

    pub fn keypress(&mut self, key: Key) -> bool {
        if let Some(rotary) = key.rotary() {
            self.screen_mut().rotary(rotary);
            return true;
        }
        self.keys.insert(key, true);
        if self.glob_key_pre(key) {
            return true;
        }
        if self.screen_mut().keypress(key) {
            return true;
        }
        self.glob_key_post(key)
    }

    pub fn keyrelease(&mut self, key: Key) -> bool {
        self.keys.insert(key, false);
        self.screen_mut().keyrelease(key)
    }

    fn glob_key_pre(&mut self, key: Key) -> bool {
        if key == Key::Quit {
            log::info!(target: "ui", "quit requested");
            self.services.service::<Runtime>().request_stop();
            return true;
        }
        match ScreenId::for_key(key) {
            Some(id) => {
                self.display(id);
                true
            }
            None => false,
        }
    }

    fn glob_key_post(&mut self, key: Key) -> bool {
        match key {
            Key::Play => {
                self.toggle_play.call_all(());
                true
            }
            _ => false,
        }
    }

    fn light_screen(&self, id: ScreenId, color: LedColor) {
        let controller = self.services.service::<dyn Controller>();
        controller.set_color(id.led(), color);
        controller.flush_leds();
    }

    fn screen(&self) -> &dyn Screen {
        self.screens[&self.current].as_ref()
    }

    fn screen_mut(&mut self) -> &mut dyn Screen {
        match self.screens.get_mut(&self.current) {
            Some(screen) => screen.as_mut(),
            None => unreachable!("every screen id has a screen"),
        }
    }
}

impl Drop for MainUi {
    fn drop(&mut self) {
        self.toggle_play.remove_from_all(&self.transport_control);
    }
}
