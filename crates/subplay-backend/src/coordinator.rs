//! Playback state machine and the glue between playback and subtitle work.
//!
//! The coordinator lives on the backend thread. It owns the playback engine,
//! the playlist and the display bookkeeping, and drives the scheduler from the
//! periodic ticks. Everything it wants the display to know is collected in an
//! outbox that the runtime drains after every call.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use subplay_audio::discovery::find_audio_files;
use subplay_audio::engine::PlaybackEngine;
use subplay_bridge::MessageFromBackend;
use subplay_bridge::caption::CaptionDisplay;
use subplay_bridge::config::Config;
use subplay_bridge::notification::{NotificationMessage, NotificationType};
use subplay_bridge::playback::{
    JobOutcome, JobReport, PlaybackStatus, PlaylistEntry, QualityTier, TrackTaskState,
};

use crate::display::{self, CaptionTracker};
use crate::queue::ChunkQueue;
use crate::scheduler::ChunkScheduler;
use crate::sidecar::SidecarStore;
use crate::state::{SharedState, last_second};

/// The watchdog ignores a silent engine this long after a track started...
const STARTUP_GRACE: Duration = Duration::from_secs(2);
/// ...as long as the position has not moved past this.
const STARTUP_POSITION: f64 = 0.2;
/// Positions this close to the duration count as the end of the track.
const END_TOLERANCE: f64 = 0.3;
/// Consecutive idle ticks after which the track is considered over.
const IDLE_TICKS: u32 = 3;

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Detects the end of a track when the engine never reports it.
#[derive(Debug)]
struct Watchdog {
    started_at: Instant,
    idle_ticks: u32,
    fired: bool,
}

impl Watchdog {
    fn new(now: Instant) -> Self {
        Self {
            started_at: now,
            idle_ticks: 0,
            fired: false,
        }
    }

    fn restart(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    /// Whether the engine went quiet at the end of the track (or for long
    /// enough to assume it did).
    fn stalled(&mut self, now: Instant, position: f64, duration: f64, busy: bool) -> bool {
        if busy {
            self.idle_ticks = 0;
            return false;
        }
        if now.duration_since(self.started_at) < STARTUP_GRACE && position <= STARTUP_POSITION {
            return false;
        }
        self.idle_ticks += 1;
        (duration > 0.0 && position >= duration - END_TOLERANCE) || self.idle_ticks >= IDLE_TICKS
    }

    /// Returns true the first time it is called for the current track.
    fn fire(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }
}

/// Owns the active track and coordinates playback with subtitle generation.
pub struct PlaybackCoordinator {
    config: Config,
    engine: Box<dyn PlaybackEngine>,
    state: SharedState,
    queue: ChunkQueue,
    scheduler: ChunkScheduler,
    sidecars: SidecarStore,
    playlist: Vec<PathBuf>,
    current_index: Option<usize>,
    /// Track loaded in the engine.
    active: Option<PathBuf>,
    status: PlaybackStatus,
    duration: f64,
    volume: f32,
    tracker: CaptionTracker,
    watchdog: Watchdog,
    task_states: HashMap<PathBuf, TrackTaskState>,
    /// Tracks last announced as having subtitles.
    available: HashSet<PathBuf>,
    outbox: Vec<MessageFromBackend>,
}

impl PlaybackCoordinator {
    pub fn new(
        config: Config,
        mut engine: Box<dyn PlaybackEngine>,
        state: SharedState,
        queue: ChunkQueue,
    ) -> Self {
        let config = Config {
            transcription: config.transcription.sanitized(),
            ..config
        };
        let volume = config.playback.volume.clamp(0.0, 1.0);
        engine.set_volume(volume);

        Self {
            scheduler: ChunkScheduler::new(&config.transcription),
            sidecars: SidecarStore::new(&config.subtitles.sidecar_extension),
            config,
            engine,
            state,
            queue,
            playlist: Vec::new(),
            current_index: None,
            active: None,
            status: PlaybackStatus::Idle,
            duration: 0.0,
            volume,
            tracker: CaptionTracker::default(),
            watchdog: Watchdog::new(Instant::now()),
            task_states: HashMap::new(),
            available: HashSet::new(),
            outbox: Vec::new(),
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_deref()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Takes every message produced since the last call.
    pub fn drain_outbox(&mut self) -> Vec<MessageFromBackend> {
        std::mem::take(&mut self.outbox)
    }

    fn emit(&mut self, message: MessageFromBackend) {
        self.outbox.push(message);
    }

    fn notify(&mut self, notification_type: NotificationType, message: impl Into<String>) {
        self.emit(MessageFromBackend::NotificationMessage(
            NotificationMessage::new(notification_type, message),
        ));
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        self.status = status;
        self.emit(MessageFromBackend::PlaybackStateChanged {
            status,
            path: self.active.clone(),
            index: self.current_index,
            duration: self.duration,
        });
    }

    fn set_task_state(&mut self, path: &Path, state: TrackTaskState) {
        if self.task_states.get(path) == Some(&state) {
            return;
        }
        self.task_states.insert(path.to_path_buf(), state);
        self.emit(MessageFromBackend::TaskStateChanged {
            path: path.to_path_buf(),
            state,
        });
    }

    fn has_subtitles(&self, path: &Path) -> bool {
        self.state.lock().has_subtitles(path) || self.sidecars.exists(path)
    }

    fn announce_availability(&mut self, path: &Path) {
        let available = self.has_subtitles(path);
        let changed = if available {
            self.available.insert(path.to_path_buf())
        } else {
            self.available.remove(path)
        };
        if changed {
            self.emit(MessageFromBackend::SubtitleAvailability {
                path: path.to_path_buf(),
                available,
            });
        }
    }

    /// Replaces the playlist with the supported audio files of `directory`.
    pub fn open_folder(&mut self, directory: &Path) {
        let files = match find_audio_files(directory, &self.config.playback.supported_extensions) {
            Ok(files) => files,
            Err(e) => {
                log::error!("Failed to open {directory:?}: {e}");
                self.notify(NotificationType::Error, format!("Cannot open folder: {e}"));
                return;
            }
        };

        log::info!("Found {} tracks in {directory:?}", files.len());
        if files.is_empty() {
            self.notify(
                NotificationType::Warning,
                format!("No supported audio files in {}", directory.display()),
            );
        }
        self.set_playlist(files);
    }

    /// Replaces the playlist, stopping whatever plays.
    pub fn set_playlist(&mut self, tracks: Vec<PathBuf>) {
        if self.status.is_active() {
            self.stop();
        }

        let entries: Vec<PlaylistEntry> = tracks
            .iter()
            .map(|path| PlaylistEntry {
                path: path.clone(),
                has_subtitles: self.has_subtitles(path),
            })
            .collect();
        self.available = entries
            .iter()
            .filter(|entry| entry.has_subtitles)
            .map(|entry| entry.path.clone())
            .collect();

        self.playlist = tracks;
        self.current_index = None;
        self.emit(MessageFromBackend::PlaylistLoaded(entries));
    }

    /// Starts the playlist entry at `index`. On failure the previous track, if
    /// any, keeps playing and false is returned.
    pub fn play_index(&mut self, index: usize) -> bool {
        let Some(path) = self.playlist.get(index).cloned() else {
            self.notify(
                NotificationType::Warning,
                format!("No track at playlist position {}", index + 1),
            );
            return false;
        };

        let previous = self.status;
        self.status = PlaybackStatus::Loading;
        log::info!("Loading {path:?}");
        if let Err(e) = self.engine.load(&path) {
            log::error!("Failed to load {path:?}: {e}");
            self.status = previous;
            self.notify(
                NotificationType::Error,
                format!("Cannot play {}: {e}", display_name(&path)),
            );
            return false;
        }

        self.start_track(index, path);
        true
    }

    fn start_track(&mut self, index: usize, path: PathBuf) {
        self.abandon_active_track();
        let generation = self.state.lock().switch_track(Some(path.clone()));
        let dropped = self.queue.drain();
        log::debug!("Switched to generation {generation}, dropped {dropped} queued jobs");

        self.engine.set_volume(self.volume);
        self.engine.play();
        self.duration = self.engine.duration();
        self.active = Some(path.clone());
        self.current_index = Some(index);
        self.tracker.reset();
        self.watchdog.restart(Instant::now());
        self.set_status(PlaybackStatus::Playing);

        self.prepare_subtitles(&path);
        self.refresh_caption(0.0);
    }

    /// Marks the outgoing track's unfinished work as abandoned.
    fn abandon_active_track(&mut self) {
        if let Some(previous) = self.active.take()
            && self.task_states.get(&previous) == Some(&TrackTaskState::Running)
        {
            self.set_task_state(&previous, TrackTaskState::Idle);
        }
    }

    /// Loads the sidecar if one exists, then starts generating whatever the
    /// cache does not cover yet.
    fn prepare_subtitles(&mut self, path: &Path) {
        self.load_sidecar(path);

        let last = last_second(self.duration);
        let (covered, generating, job) = {
            let mut state = self.state.lock();
            let covered = state.covers(path, last, self.scheduler.upgrade_enabled());
            let mut job = None;
            if !covered && self.config.transcription.auto_transcribe_on_play {
                state.begin_generation();
                job = self.scheduler.initial_draft(&mut state, path, self.duration);
            }
            (covered, state.is_generating(path), job)
        };

        if let Some(job) = job {
            log::debug!(
                "Queueing first {} chunk [{}, {})s of {path:?}",
                job.tier,
                job.start_second,
                job.end_second()
            );
            self.queue.push(job);
        }

        if covered {
            self.set_task_state(path, TrackTaskState::Ready);
        } else if generating {
            self.set_task_state(path, TrackTaskState::Running);
        }
        self.announce_availability(path);
    }

    fn load_sidecar(&mut self, path: &Path) {
        let cached = self
            .state
            .lock()
            .entry(path)
            .is_some_and(|entry| entry.complete);
        if cached || !self.sidecars.exists(path) {
            return;
        }

        match self.sidecars.read(path) {
            Ok(captions) => {
                let captions = crate::timeline::merge(&[], captions, (0.0, 0.0), QualityTier::Draft);
                let last = last_second(self.duration)
                    .unwrap_or_else(|| crate::timeline::coverage(&captions).ceil() as u32);
                log::info!("Loaded {} captions for {path:?} from disk", captions.len());
                self.state.lock().install_timeline(path, captions, last);
            }
            Err(e) => {
                log::warn!("Failed to read subtitles of {path:?}: {e}");
                self.notify(
                    NotificationType::Warning,
                    format!("Cannot read subtitles of {}: {e}", display_name(path)),
                );
            }
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.status {
            PlaybackStatus::Playing => {
                self.engine.pause();
                self.set_status(PlaybackStatus::Paused);
            }
            PlaybackStatus::Paused => {
                self.engine.resume();
                self.watchdog.idle_ticks = 0;
                self.set_status(PlaybackStatus::Playing);
            }
            _ => {}
        }
    }

    /// Stops playback and cancels all pending subtitle work.
    pub fn stop(&mut self) {
        self.engine.stop();
        self.abandon_active_track();
        self.state.lock().switch_track(None);
        self.queue.drain();
        self.duration = 0.0;
        self.set_status(PlaybackStatus::Stopped);

        self.emit(MessageFromBackend::PositionChanged {
            position: 0.0,
            duration: 0.0,
        });
        self.tracker.reset();
        self.tracker.update(&CaptionDisplay::Blank);
        self.emit(MessageFromBackend::CaptionChanged(CaptionDisplay::Blank));
    }

    /// Plays the next playlist entry, wrapping to the first one.
    pub fn next(&mut self) -> bool {
        let len = self.playlist.len();
        if len == 0 {
            return false;
        }
        let index = self.current_index.map_or(0, |index| (index + 1) % len);
        self.play_index(index)
    }

    /// Plays the previous playlist entry, wrapping to the last one.
    pub fn previous(&mut self) -> bool {
        let len = self.playlist.len();
        if len == 0 {
            return false;
        }
        let index = self.current_index.map_or(0, |index| (index + len - 1) % len);
        self.play_index(index)
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.engine.set_volume(self.volume);
    }

    /// Scheduler tick: detects the end of the track and queues the chunks
    /// that became due.
    pub fn tick_scheduler(&mut self, now: Instant) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        let Some(path) = self.active.clone() else {
            return;
        };

        let position = self.engine.position();
        let finished = self.engine.take_finished();
        let stalled = self
            .watchdog
            .stalled(now, position, self.duration, self.engine.is_busy());
        if (finished || stalled) && self.watchdog.fire() {
            self.finish_track();
            return;
        }

        let jobs = {
            let mut state = self.state.lock();
            self.scheduler.plan(&mut state, &path, position, self.duration)
        };
        for job in jobs {
            log::debug!(
                "Queueing {} chunk [{}, {})s of {path:?} at {position:.1}s",
                job.tier,
                job.start_second,
                job.end_second()
            );
            self.queue.push(job);
        }
    }

    fn finish_track(&mut self) {
        log::info!("Finished playing {:?}", self.active);
        self.set_status(PlaybackStatus::Ended);

        let len = self.playlist.len();
        let advanced = len > 0 && {
            let index = self.current_index.map_or(0, |index| (index + 1) % len);
            self.play_index(index)
        };
        if !advanced {
            // nothing plays any more, so the ended track stops generating
            self.abandon_active_track();
            self.state.lock().switch_track(None);
            let dropped = self.queue.drain();
            log::debug!("Playback ended, dropped {dropped} queued jobs");
        }
    }

    /// Position tick: publishes the position and the caption under it.
    pub fn tick_position(&mut self) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        let position = self.engine.position();
        self.emit(MessageFromBackend::PositionChanged {
            position,
            duration: self.duration,
        });
        self.refresh_caption(position);
    }

    fn refresh_caption(&mut self, position: f64) {
        let Some(path) = self.active.as_deref() else {
            return;
        };
        let (timeline, generating) = {
            let state = self.state.lock();
            (state.timeline(path), state.is_generating(path))
        };

        let display = display::resolve(&timeline, position, generating);
        if self.tracker.update(&display) {
            self.emit(MessageFromBackend::CaptionChanged(display));
        }
    }

    /// Handles a finished chunk job reported by the worker.
    pub fn handle_worker_event(&mut self, report: JobReport) {
        log::debug!(
            "{} chunk at {}s of {:?} finished: {:?}",
            report.tier,
            report.start_second,
            report.path,
            report.outcome
        );
        let path = report.path.clone();
        if let JobOutcome::Failed(reason) = &report.outcome {
            let message = format!(
                "Subtitles for {} at {}s could not be generated: {reason}",
                display_name(&path),
                report.start_second
            );
            self.notify(NotificationType::Warning, message);
            self.set_task_state(&path, TrackTaskState::Failed);
        }
        self.emit(MessageFromBackend::JobCompleted(report));

        if self.active.as_deref() != Some(path.as_path()) {
            return;
        }
        self.check_completion(&path);
        self.announce_availability(&path);
        if self.status.is_active() {
            self.refresh_caption(self.engine.position());
        }
    }

    /// Ends generation once every pass reached the end of the track, saving
    /// the timeline when configured to.
    fn check_completion(&mut self, path: &Path) {
        let last = last_second(self.duration);
        let captions = {
            let mut state = self.state.lock();
            if !state.is_generating(path) || !state.covers(path, last, self.scheduler.upgrade_enabled()) {
                return;
            }
            state.end_generation();
            let entry = state.entry_mut(path);
            entry.complete = true;
            entry.captions.clone()
        };

        log::info!("Subtitles for {path:?} are complete ({} captions)", captions.len());
        if self.task_states.get(path) != Some(&TrackTaskState::Failed) {
            self.set_task_state(path, TrackTaskState::Ready);
        }

        if self.config.subtitles.save_completed
            && !captions.is_empty()
            && let Err(e) = self.sidecars.write(path, &captions)
        {
            log::warn!("Failed to save subtitles of {path:?}: {e}");
            self.notify(
                NotificationType::Warning,
                format!("Cannot save subtitles of {}: {e}", display_name(path)),
            );
        }
    }

    /// Stops playback and tells the worker to exit.
    pub fn shutdown(&mut self) {
        log::info!("Shutting down playback");
        self.engine.stop();
        self.abandon_active_track();
        self.state.lock().switch_track(None);
        self.queue.drain();
        self.queue.push_shutdown();
        self.set_status(PlaybackStatus::Stopped);
    }
}
