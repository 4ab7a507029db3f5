use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// States of the playback state machine for the active track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
    Stopped,
}

impl PlaybackStatus {
    /// Whether the track is loaded and either rendering or paused.
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackStatus::Playing | PlaybackStatus::Paused)
    }
}

/// Recognition pass a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// Fast pass that keeps the playhead covered.
    Draft,
    /// Slower pass that replaces draft captions inside its window.
    Upgraded,
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityTier::Draft => formatter.write_str("draft"),
            QualityTier::Upgraded => formatter.write_str("upgraded"),
        }
    }
}

/// Per-track indicator of background subtitle work, used for playlist rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackTaskState {
    #[default]
    Idle,
    Running,
    Ready,
    Failed,
}

/// One row of the playlist.
#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    pub path: PathBuf,
    /// Whether captions already exist for this track, either cached in memory
    /// or as a sidecar file next to it.
    pub has_subtitles: bool,
}

/// How a chunk job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The engine returned captions which were merged into the timeline.
    Captions(usize),
    /// The engine returned nothing for the window.
    Silence,
    /// Extraction or recognition failed for the window.
    Failed(String),
}

/// Completion report for one chunk job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub path: PathBuf,
    pub start_second: u32,
    pub length_seconds: u32,
    pub tier: QualityTier,
    pub outcome: JobOutcome,
}
