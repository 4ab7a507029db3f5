//! Backend runtime setup and orchestration.
//!
//! This module wires together configuration, the playback coordinator and the
//! transcription worker, and runs the loop that multiplexes frontend commands,
//! worker reports and the two periodic ticks.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use subplay_audio::engine::PlaybackEngine;
use subplay_audio::extract::FfmpegExtractor;
use subplay_bridge::config::{Config, TranscriptionConfig};
use subplay_bridge::notification::NotificationType;
use subplay_bridge::{MessageFromBackend, MessageToBackend};
use subplay_speech::{Transcriber, UnavailableTranscriber};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::MissedTickBehavior;

use crate::app::AppContext;
use crate::coordinator::PlaybackCoordinator;
use crate::queue::ChunkQueue;
use crate::state::SharedState;
use crate::worker::{TranscriptionWorker, decode_options};

const SCHEDULER_TICK: Duration = Duration::from_millis(500);
const POSITION_TICK: Duration = Duration::from_millis(250);

#[cfg(feature = "rodio")]
fn build_engine(config: &Config) -> Box<dyn PlaybackEngine> {
    use subplay_audio::rodio_engine::RodioEngine;

    let extensions = config.playback.supported_extensions.clone();
    match RodioEngine::open_default(extensions, &config.ffprobe_path) {
        Ok(engine) => Box::new(engine),
        Err(e) => {
            log::warn!("No audio output ({e}), falling back to a silent clock");
            clock_engine(config)
        }
    }
}

#[cfg(not(feature = "rodio"))]
fn build_engine(config: &Config) -> Box<dyn PlaybackEngine> {
    log::info!("Built without audio output, playback follows the wall clock");
    clock_engine(config)
}

fn clock_engine(config: &Config) -> Box<dyn PlaybackEngine> {
    use subplay_audio::engine::{ClockEngine, DurationSource};

    Box::new(ClockEngine::new(
        config.playback.supported_extensions.clone(),
        DurationSource::Ffprobe(config.ffprobe_path.clone()),
    ))
}

#[cfg(feature = "whisper")]
fn build_transcriber(config: &TranscriptionConfig) -> Box<dyn Transcriber> {
    use subplay_bridge::config::DevicePreference;
    use subplay_speech::whisper::{Device, WhisperTranscriber};

    let Some(draft_model) = config.draft_model_path.as_ref() else {
        return Box::new(UnavailableTranscriber::new(
            "no draft model configured (transcription.draft_model_path)",
        ));
    };
    let device = match config.device {
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Auto | DevicePreference::Gpu => Device::PreferAccelerator,
    };

    let draft_model = draft_model.to_string_lossy();
    let upgrade_model = config
        .upgrade_model_path
        .as_ref()
        .map(|path| path.to_string_lossy());
    match WhisperTranscriber::new(&draft_model, upgrade_model.as_deref(), device) {
        Ok(transcriber) => {
            log::info!(
                "Transcribing on the {}",
                if transcriber.is_accelerated() { "accelerator" } else { "CPU" }
            );
            Box::new(transcriber)
        }
        Err(e) => {
            log::error!("Failed to load the speech model: {e}");
            Box::new(UnavailableTranscriber::new(e.to_string()))
        }
    }
}

#[cfg(not(feature = "whisper"))]
fn build_transcriber(_config: &TranscriptionConfig) -> Box<dyn Transcriber> {
    Box::new(UnavailableTranscriber::new(
        "this build has no speech recognizer (enable the `whisper` feature)",
    ))
}

/// Loads the configuration, falling back to defaults when the file is broken.
async fn resolve_config(context_tx: &Sender<MessageFromBackend>) -> Config {
    match crate::config::load_config().await {
        Ok((config, path)) => {
            log::info!("Configuration loaded from {path:?}");
            config
        }
        Err(e) => {
            log::error!("Failed to load configuration, using defaults: {e}");
            let context = AppContext::new(context_tx.clone(), Config::default());
            context
                .send_notification(
                    NotificationType::Warning,
                    format!("Using default settings: {e}"),
                )
                .await;
            Config::default()
        }
    }
}

/// Initialize backend state and process messages until shutdown.
async fn setup_backend(mut rx: Receiver<MessageToBackend>, tx: Sender<MessageFromBackend>) {
    let config = resolve_config(&tx).await;
    let context = AppContext::new(tx, config.clone());

    let state = SharedState::default();
    let queue = ChunkQueue::new();
    let (worker_tx, mut worker_rx) = tokio::sync::mpsc::unbounded_channel();
    let worker = TranscriptionWorker::new(
        state.clone(),
        queue.clone(),
        Box::new(FfmpegExtractor::new(&config.ffmpeg_path)),
        build_transcriber(&config.transcription),
        decode_options(&config.transcription),
        worker_tx,
    );
    let worker_handle = match worker.spawn() {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::error!("Failed to start the transcription worker: {e}");
            context
                .send_notification(NotificationType::Error, "Subtitles cannot be generated")
                .await;
            None
        }
    };

    let engine = build_engine(&config);
    let mut coordinator = PlaybackCoordinator::new(config, engine, state, queue);

    let mut scheduler_tick = tokio::time::interval(SCHEDULER_TICK);
    scheduler_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut position_tick = tokio::time::interval(POSITION_TICK);
    position_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(MessageToBackend::Shutdown) | None => break,
                Some(message) => context.dispatch_message(&mut coordinator, message).await,
            },
            Some(report) = worker_rx.recv() => coordinator.handle_worker_event(report),
            _ = scheduler_tick.tick() => coordinator.tick_scheduler(Instant::now()),
            _ = position_tick.tick() => coordinator.tick_position(),
        }

        if !context.flush(&mut coordinator).await {
            break;
        }
    }

    coordinator.shutdown();
    context.flush(&mut coordinator).await;
    if let Some(handle) = worker_handle {
        // the worker finishes its current chunk before it sees the sentinel
        match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok(())) => log::debug!("Transcription worker joined"),
            _ => log::error!("Transcription worker terminated abnormally"),
        }
    }
    log::info!("Backend stopped");
}

/// Spawn the backend runtime and begin processing bridge messages. The
/// returned handle finishes once the backend has shut down.
pub fn run(rx: Receiver<MessageToBackend>, tx: Sender<MessageFromBackend>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("backend".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::error!("Failed to build tokio runtime: {e}");
                    return;
                }
            };
            runtime.block_on(setup_backend(rx, tx));
        })
        .expect("failed to spawn backend thread")
}
