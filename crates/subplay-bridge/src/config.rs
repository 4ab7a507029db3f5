use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Compute device preference for speech recognition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Use the accelerator when it can be initialized, otherwise fall back to
    /// the CPU. Default value.
    #[default]
    Auto,
    /// Never use the accelerator.
    Cpu,
    /// Prefer the accelerator. Still falls back to the CPU if it cannot be
    /// initialized.
    #[serde(alias = "cuda")]
    Gpu,
}

/// Configuration of the incremental subtitle generation pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Whether to start generating subtitles when a track without any is
    /// played.
    pub auto_transcribe_on_play: bool,
    /// Whether to run the slower upgrade pass behind the draft pass.
    pub enable_upgrade: bool,
    /// Length of each draft chunk, in seconds.
    pub draft_chunk_seconds: u32,
    /// How far ahead of the playhead the draft pass tries to stay, in seconds.
    pub chunk_lead_seconds: u32,
    /// Length of each upgrade chunk, in seconds.
    pub upgrade_chunk_seconds: u32,
    /// Draft coverage (in seconds) required before the upgrade pass starts.
    pub upgrade_start_after_seconds: u32,
    /// Language hint passed to the recognizer, `auto` for detection.
    pub language: String,
    /// Beam width. Values above one switch to beam search.
    pub beam_size: u32,
    /// Number of candidates for greedy sampling.
    pub best_of: u32,
    pub device: DevicePreference,
    /// Model used for the draft pass.
    pub draft_model_path: Option<PathBuf>,
    /// Model used for the upgrade pass. Falls back to the draft model.
    pub upgrade_model_path: Option<PathBuf>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            auto_transcribe_on_play: true,
            enable_upgrade: true,
            draft_chunk_seconds: 20,
            chunk_lead_seconds: 12,
            upgrade_chunk_seconds: 45,
            upgrade_start_after_seconds: 60,
            language: "auto".to_string(),
            beam_size: 1,
            best_of: 1,
            device: DevicePreference::default(),
            draft_model_path: None,
            upgrade_model_path: None,
        }
    }
}

impl TranscriptionConfig {
    /// Returns a copy with every length and search parameter clamped to a
    /// usable value.
    pub fn sanitized(&self) -> Self {
        Self {
            draft_chunk_seconds: self.draft_chunk_seconds.max(1),
            upgrade_chunk_seconds: self.upgrade_chunk_seconds.max(1),
            beam_size: self.beam_size.max(1),
            best_of: self.best_of.max(1),
            ..self.clone()
        }
    }

    /// The language hint, or `None` when detection was requested.
    pub fn language_hint(&self) -> Option<&str> {
        let language = self.language.trim();
        if language.is_empty() || language.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(language)
        }
    }
}

/// Configuration of the playback side of the application.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// File extensions (with leading dot, lowercase) the player accepts.
    pub supported_extensions: Vec<String>,
    /// Initial output volume in range `[0, 1]`.
    pub volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            supported_extensions: [".mp3", ".m4a", ".wav", ".wma"]
                .into_iter()
                .map(String::from)
                .collect(),
            volume: 1.0,
        }
    }
}

/// Configuration of the on-disk caption sidecar files.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubtitlesConfig {
    /// Extension of the sidecar file placed next to each track.
    pub sidecar_extension: String,
    /// Whether to write the generated timeline next to the track once the
    /// whole track has been transcribed.
    pub save_completed: bool,
}

impl Default for SubtitlesConfig {
    fn default() -> Self {
        Self {
            sidecar_extension: "srt".to_string(),
            save_completed: false,
        }
    }
}

/// Global application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub transcription: TranscriptionConfig,
    pub playback: PlaybackConfig,
    pub subtitles: SubtitlesConfig,
    /// Executable used to cut audio windows out of tracks.
    pub ffmpeg_path: PathBuf,
    /// Executable used to read track durations.
    pub ffprobe_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcription: TranscriptionConfig::default(),
            playback: PlaybackConfig::default(),
            subtitles: SubtitlesConfig::default(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}
