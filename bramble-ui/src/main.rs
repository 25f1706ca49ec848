mod controller;
mod input;
mod keys;
mod main_ui;
mod screens;
#[cfg(test)]
mod test_support;
mod ui_manager;

use std::fs::File;
use std::sync::Arc;

use bramble_audio::{AudioManager, ThreadedAudioManager};
use bramble_core::config::Config;
use bramble_core::service::{Application, Runtime, ServiceRegistry};
use bramble_core::state::StateManager;
use bramble_types::TransportState;

use controller::{Controller, LoggingController};
use input::{InputSource, ScriptedInput, TerminalInput};
use main_ui::MainUi;
use ui_manager::UiManager;

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("bramble")
        .join("bramble.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = File::create(&log_path).unwrap_or_else(|_| {
        File::create("/tmp/bramble.log").expect("Cannot create log file")
    });

    WriteLogger::init(log_level, simplelog::Config::default(), log_file)
        .expect("Failed to initialize logger");

    log::info!("bramble starting (log level: {:?})", log_level);
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let interactive = args.iter().any(|a| a == "--interactive" || a == "-i");
    let script = args
        .iter()
        .position(|a| a == "--keys")
        .and_then(|i| args.get(i + 1).cloned());
    let max_frames: Option<u64> = args
        .iter()
        .position(|a| a == "--frames")
        .and_then(|i| args.get(i + 1))
        .and_then(|n| n.parse().ok());

    let config = Config::load();
    let result = run(&config, interactive, script.as_deref(), max_frames);
    if let Err(e) = &result {
        log::error!("{}", e);
    }
    log::info!("Exiting");
    result
}

fn run(
    config: &Config,
    interactive: bool,
    script: Option<&str>,
    max_frames: Option<u64>,
) -> std::io::Result<()> {
    let mut app = Application::new();

    let bpm = config.default_bpm();
    app.start::<StateManager, _>(move |_: &Arc<ServiceRegistry>| {
        Arc::new(StateManager::new(TransportState { playing: false, bpm }))
    });
    app.start::<dyn Controller, _>(|_: &Arc<ServiceRegistry>| {
        Arc::new(LoggingController::new()) as Arc<dyn Controller>
    });

    app.start::<dyn AudioManager, _>(ThreadedAudioManager::constructor(
        config.audio_timing(),
        config.engine_channels(),
    ));

    let frame_interval = config.ui_frame_interval();
    let ui_manager = app.start::<UiManager, _>(move |registry: &Arc<ServiceRegistry>| {
        Arc::new(UiManager::new(registry, frame_interval))
    });

    let services = app
        .accessor()
        .require::<Runtime>()
        .require::<StateManager>()
        .require::<dyn AudioManager>()
        .require::<dyn Controller>();
    let mut ui = MainUi::new(services, ui_manager.executor());

    let mut input: Box<dyn InputSource> = if interactive {
        Box::new(TerminalInput::start()?)
    } else {
        let script = ScriptedInput::parse(script.unwrap_or(""))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Box::new(script)
    };

    let frames = ui_manager.main_ui_loop(&mut ui, input.as_mut(), max_frames);
    drop(input);
    drop(ui);
    app.service::<dyn Controller>().clear_leds();
    app.stop();

    log::info!("ran {} frames", frames.as_ref().copied().unwrap_or(0));
    frames.map(|_| ())
}
