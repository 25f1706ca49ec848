//! Per-bus audio engines and the registries that drive them.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use bramble_core::itc::{ActionChannel, ActionReceiver, ActionReceiverRegistry};
use bramble_types::{PlayheadState, TICKS_PER_BEAT};

bramble_core::actions! {
    /// Playhead advanced; carries the new position.
    pub Tick(PlayheadState);
    pub Play();
    pub Stop();
}

/// One engine on one sub-bus. Counts what it has been asked to do; a real
/// DSP engine hangs off the same three actions.
#[derive(Debug)]
pub struct Engine {
    channel: ActionChannel,
    running: bool,
    ticks: u64,
    beats: u64,
    last_tick: u64,
}

impl Engine {
    pub fn new(channel: ActionChannel) -> Self {
        Self {
            channel,
            running: false,
            ticks: 0,
            beats: 0,
            last_tick: 0,
        }
    }

    pub fn channel(&self) -> ActionChannel {
        self.channel
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Tick actions handled while running.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Beat boundaries crossed while running.
    pub fn beats(&self) -> u64 {
        self.beats
    }
}

impl ActionReceiver<Tick> for Engine {
    fn action(&mut self, _: Tick, (playhead,): (PlayheadState,)) {
        if !self.running {
            return;
        }
        self.ticks += 1;
        let tpb = u64::from(TICKS_PER_BEAT);
        if playhead.tick / tpb > self.last_tick / tpb {
            self.beats += playhead.tick / tpb - self.last_tick / tpb;
            log::trace!(target: "audio", "{} beat {}", self.channel, playhead.beat());
        }
        self.last_tick = playhead.tick;
    }
}

impl ActionReceiver<Play> for Engine {
    fn action(&mut self, _: Play, (): ()) {
        self.running = true;
    }
}

impl ActionReceiver<Stop> for Engine {
    fn action(&mut self, _: Stop, (): ()) {
        self.running = false;
    }
}

/// Engines plus one registry per action they handle. Thread-confined: build
/// it on the thread that dispatches to it.
pub struct EngineSet {
    engines: Vec<Rc<RefCell<Engine>>>,
    tick: ActionReceiverRegistry<Tick>,
    play: ActionReceiverRegistry<Play>,
    stop: ActionReceiverRegistry<Stop>,
}

impl EngineSet {
    pub fn new(channels: &[ActionChannel]) -> Self {
        let mut set = Self {
            engines: Vec::new(),
            tick: ActionReceiverRegistry::new(),
            play: ActionReceiverRegistry::new(),
            stop: ActionReceiverRegistry::new(),
        };
        for &channel in channels {
            set.add(channel);
        }
        set
    }

    /// Add an engine on `channel`. A bus holds at most one engine.
    pub fn add(&mut self, channel: ActionChannel) {
        if self.position(channel).is_some() {
            return;
        }
        let engine = Rc::new(RefCell::new(Engine::new(channel)));
        self.tick.add_to(channel, &engine);
        self.play.add_to(channel, &engine);
        self.stop.add_to(channel, &engine);
        self.engines.push(engine);
    }

    pub fn remove(&mut self, channel: ActionChannel) {
        if let Some(index) = self.position(channel) {
            let engine = self.engines.remove(index);
            self.tick.remove_from_all(&engine);
            self.play.remove_from_all(&engine);
            self.stop.remove_from_all(&engine);
        }
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn engine(&self, channel: ActionChannel) -> Option<Ref<'_, Engine>> {
        self.position(channel).map(|i| self.engines[i].borrow())
    }

    pub fn tick(&self, playhead: PlayheadState) {
        self.tick.call_all((playhead,));
    }

    pub fn play(&self) {
        for engine in &self.engines {
            let channel = engine.borrow().channel();
            self.play.call_for_channel(channel, ());
        }
    }

    pub fn stop(&self) {
        for engine in &self.engines {
            let channel = engine.borrow().channel();
            self.stop.call_for_channel(channel, ());
        }
    }

    fn position(&self, channel: ActionChannel) -> Option<usize> {
        self.engines.iter().position(|e| e.borrow().channel() == channel)
    }
}
