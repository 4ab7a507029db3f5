//! Playback engine contract and a wall-clock engine.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::probe::{ProbeError, probe_duration};

/// Errors that can occur while loading a track into an engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The file does not exist.
    #[error("file not found: {0:?}")]
    NotFound(PathBuf),
    /// The file's extension is not in the supported set.
    #[error("unsupported audio format: {0:?}")]
    UnsupportedFormat(PathBuf),
    /// The file exists but could not be read or decoded.
    #[error("failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },
    /// The output device could not be opened.
    #[error("failed to open audio output: {0}")]
    Output(String),
}

/// Contract over the audio playback component for one active track.
///
/// Engines have no seek operation: a loaded track always plays from its
/// beginning.
pub trait PlaybackEngine {
    /// Loads `path`, replacing the loaded track only on success. A failed load
    /// leaves whatever was playing untouched.
    fn load(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Starts the loaded track from the beginning.
    fn play(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Stops playback. Idempotent, and safe to call with nothing loaded.
    fn stop(&mut self);

    /// Best-effort playback position in seconds; 0 when nothing plays.
    fn position(&self) -> f64;

    /// Duration of the loaded track in seconds, 0 when unknown.
    fn duration(&self) -> f64;

    /// Whether audio is actively being rendered.
    fn is_busy(&self) -> bool;

    /// Volume in range `[0, 1]`.
    fn set_volume(&mut self, volume: f32);

    /// End-of-stream notification. Returns true once after the loaded track
    /// finished on its own.
    fn take_finished(&mut self) -> bool;
}

/// Validates that `path` exists and has a supported extension.
pub fn check_track(path: &Path, supported_extensions: &[String]) -> Result<(), EngineError> {
    if !path.exists() {
        return Err(EngineError::NotFound(path.to_path_buf()));
    }
    if !crate::has_supported_extension(path, supported_extensions) {
        return Err(EngineError::UnsupportedFormat(path.to_path_buf()));
    }
    Ok(())
}

/// Where a [`ClockEngine`] gets track durations from.
#[derive(Debug, Clone)]
pub enum DurationSource {
    /// Ask `ffprobe` at the given path.
    Ffprobe(PathBuf),
    /// Every track lasts this many seconds.
    Fixed(f64),
}

impl DurationSource {
    fn duration_of(&self, path: &Path) -> Result<f64, ProbeError> {
        match self {
            DurationSource::Ffprobe(ffprobe) => probe_duration(ffprobe, path),
            DurationSource::Fixed(seconds) => Ok(*seconds),
        }
    }
}

/// Engine that renders no audio and advances the position with the wall
/// clock. Used for headless runs where no output device is available.
pub struct ClockEngine {
    supported_extensions: Vec<String>,
    durations: DurationSource,
    loaded: Option<PathBuf>,
    duration: f64,
    /// Time played before the current run started.
    elapsed: Duration,
    /// Start of the current uninterrupted run, if rendering.
    running_since: Option<Instant>,
    playing: bool,
    finished_reported: bool,
    volume: f32,
}

impl ClockEngine {
    pub fn new(supported_extensions: Vec<String>, durations: DurationSource) -> Self {
        Self {
            supported_extensions,
            durations,
            loaded: None,
            duration: 0.0,
            elapsed: Duration::ZERO,
            running_since: None,
            playing: false,
            finished_reported: false,
            volume: 1.0,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn raw_position(&self) -> f64 {
        let running = self
            .running_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        (self.elapsed + running).as_secs_f64()
    }
}

impl PlaybackEngine for ClockEngine {
    fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        check_track(path, &self.supported_extensions)?;
        let duration = self
            .durations
            .duration_of(path)
            .map_err(|e| EngineError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        self.stop();
        self.loaded = Some(path.to_path_buf());
        self.duration = duration;
        Ok(())
    }

    fn play(&mut self) {
        if self.loaded.is_none() {
            return;
        }
        self.elapsed = Duration::ZERO;
        self.running_since = Some(Instant::now());
        self.playing = true;
        self.finished_reported = false;
    }

    fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.elapsed += since.elapsed();
        }
    }

    fn resume(&mut self) {
        if self.playing && self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        self.playing = false;
        self.running_since = None;
        self.elapsed = Duration::ZERO;
    }

    fn position(&self) -> f64 {
        if !self.playing {
            return 0.0;
        }
        self.raw_position().min(self.duration)
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_busy(&self) -> bool {
        self.playing && self.running_since.is_some() && self.raw_position() < self.duration
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn take_finished(&mut self) -> bool {
        if self.playing && !self.finished_reported && self.raw_position() >= self.duration {
            self.finished_reported = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extensions() -> Vec<String> {
        vec![".mp3".to_string()]
    }

    #[test]
    fn load_rejects_missing_and_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();
        let unsupported = dir.path().join("track.flac");
        std::fs::write(&unsupported, b"").unwrap();

        let mut engine = ClockEngine::new(extensions(), DurationSource::Fixed(10.0));
        assert!(matches!(
            engine.load(&dir.path().join("missing.mp3")),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            engine.load(&unsupported),
            Err(EngineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn stop_is_idempotent_without_a_track() {
        let mut engine = ClockEngine::new(extensions(), DurationSource::Fixed(10.0));
        engine.stop();
        engine.stop();
        assert_eq!(engine.position(), 0.0);
        assert!(!engine.is_busy());
    }

    #[test]
    fn zero_length_track_finishes_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("empty.mp3");
        std::fs::write(&track, b"").unwrap();

        let mut engine = ClockEngine::new(extensions(), DurationSource::Fixed(0.0));
        engine.load(&track).unwrap();
        engine.play();

        assert!(!engine.is_busy());
        assert!(engine.take_finished());
        assert!(!engine.take_finished());
    }

    #[test]
    fn pause_freezes_the_position() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("song.mp3");
        std::fs::write(&track, b"").unwrap();

        let mut engine = ClockEngine::new(extensions(), DurationSource::Fixed(60.0));
        engine.load(&track).unwrap();
        engine.play();
        engine.pause();
        let frozen = engine.position();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(engine.position(), frozen);
        assert!(!engine.is_busy());
        engine.resume();
        assert!(engine.is_busy());
    }
}
