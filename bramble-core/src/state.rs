//! Canonical application state, published through channels.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bramble_types::TransportState;

use crate::itc::{Channel, ChannelHandle};

/// Owns the transport channel. Producers on any thread commit through it;
/// the mutex serializes them. Deliveries are submitted after the mutex is
/// released, so observers may read or commit transport themselves.
pub struct StateManager {
    transport: Mutex<Channel<TransportState>>,
}

impl StateManager {
    pub fn new(initial: TransportState) -> Self {
        Self {
            transport: Mutex::new(Channel::new(initial)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Channel<TransportState>> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe here to observe transport changes.
    pub fn transport(&self) -> ChannelHandle<TransportState> {
        self.lock().handle()
    }

    /// Canonical transport state as of the last commit.
    pub fn transport_state(&self) -> TransportState {
        *self.lock().state()
    }

    /// Update transport state in place and broadcast it.
    pub fn commit_transport<F: FnOnce(&mut TransportState)>(&self, f: F) {
        let (broadcast, state) = {
            let mut channel = self.lock();
            let broadcast = channel.update_staged(f);
            (broadcast, *channel.state())
        };
        log::debug!(target: "state", "transport: playing={} bpm={}", state.playing, state.bpm);
        broadcast.send();
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new(TransportState::default())
    }
}
