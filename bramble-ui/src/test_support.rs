//! Service rig shared by the UI tests.

use std::sync::{Arc, Mutex};

use bramble_audio::{AudioManager, Levels};
use bramble_core::itc::{Channel, ChannelHandle, QueueExecutor};
use bramble_core::service::{Application, Runtime, ServiceRegistry};
use bramble_core::state::StateManager;
use bramble_types::PlayheadState;

use crate::controller::{Controller, LoggingController};
use crate::main_ui::MainUi;

/// Audio manager without a thread; the playhead only moves when a test
/// commits to it.
pub struct StillAudio {
    playhead: Channel<PlayheadState>,
    levels: Mutex<Levels>,
    executor: Arc<QueueExecutor>,
}

impl AudioManager for StillAudio {
    fn line_in_gain_l(&self, gain: f32) {
        self.levels.lock().unwrap().line_in_l = gain;
    }

    fn line_in_gain_r(&self, gain: f32) {
        self.levels.lock().unwrap().line_in_r = gain;
    }

    fn output_vol(&self, volume: f32) {
        self.levels.lock().unwrap().output = volume;
    }

    fn levels(&self) -> Levels {
        *self.levels.lock().unwrap()
    }

    fn playhead(&self) -> ChannelHandle<PlayheadState> {
        self.playhead.handle()
    }

    fn executor(&self) -> Arc<QueueExecutor> {
        Arc::clone(&self.executor)
    }
}

pub struct Rig {
    pub app: Application,
    pub controller: Arc<LoggingController>,
    pub executor: Arc<QueueExecutor>,
    pub ui: MainUi,
}

pub fn rig() -> Rig {
    let mut app = Application::new();
    app.start::<StateManager, _>(|_: &Arc<ServiceRegistry>| Arc::new(StateManager::default()));
    app.start::<dyn AudioManager, _>(|_: &Arc<ServiceRegistry>| {
        Arc::new(StillAudio {
            playhead: Channel::default(),
            levels: Mutex::new(Levels::default()),
            executor: Arc::new(QueueExecutor::new("audio")),
        }) as Arc<dyn AudioManager>
    });
    let controller = Arc::new(LoggingController::new());
    let registered = Arc::clone(&controller);
    app.start::<dyn Controller, _>(move |_: &Arc<ServiceRegistry>| {
        Arc::clone(&registered) as Arc<dyn Controller>
    });
    let services = app
        .accessor()
        .require::<Runtime>()
        .require::<StateManager>()
        .require::<dyn AudioManager>()
        .require::<dyn Controller>();
    let executor = Arc::new(QueueExecutor::new("ui"));
    let ui = MainUi::new(services, executor.clone());
    Rig {
        app,
        controller,
        executor,
        ui,
    }
}
