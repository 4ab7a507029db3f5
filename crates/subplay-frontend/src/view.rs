//! Display state rebuilt from backend events.

use std::path::{Path, PathBuf};

use subplay_bridge::MessageFromBackend;
use subplay_bridge::caption::CaptionDisplay;
use subplay_bridge::playback::{PlaybackStatus, TrackTaskState};

use crate::formatting::{format_progress, format_timestamp, track_name};

/// One playlist row.
#[derive(Debug, Clone)]
pub struct Row {
    pub path: PathBuf,
    pub has_subtitles: bool,
    pub task: TrackTaskState,
}

impl Row {
    fn render(&self, number: usize, current: bool) -> String {
        let marker = if current { '>' } else { ' ' };
        let subtitles = if self.has_subtitles { "cc" } else { "  " };
        let task = match self.task {
            TrackTaskState::Idle => "",
            TrackTaskState::Running => " (generating)",
            TrackTaskState::Ready => " (ready)",
            TrackTaskState::Failed => " (failed)",
        };
        format!("{marker}{number:>3}. [{subtitles}] {}{task}", track_name(&self.path))
    }
}

/// Everything the terminal shows. Only ever mutated from the thread draining
/// the backend channel.
#[derive(Debug, Default)]
pub struct DisplayState {
    pub rows: Vec<Row>,
    pub status: PlaybackStatus,
    pub current: Option<usize>,
    pub position: f64,
    pub duration: f64,
    pub caption: Option<CaptionDisplay>,
    /// Last whole second printed, to keep the position line from repeating.
    last_printed_second: Option<u64>,
}

impl DisplayState {
    fn row_mut(&mut self, path: &Path) -> Option<&mut Row> {
        self.rows.iter_mut().find(|row| row.path == path)
    }

    pub fn render_playlist(&self) -> Vec<String> {
        if self.rows.is_empty() {
            return vec!["playlist is empty, use `open <dir>`".to_string()];
        }
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| row.render(index + 1, self.current == Some(index)))
            .collect()
    }

    /// Applies one backend event and returns the lines to print for it.
    pub fn apply(&mut self, message: MessageFromBackend) -> Vec<String> {
        match message {
            MessageFromBackend::NotificationMessage(notification) => {
                vec![format!("[{}] {}", notification.notification_type, notification.message)]
            }
            MessageFromBackend::ConfigurationResponse(config) => {
                let transcription = &config.transcription;
                vec![
                    format!(
                        "draft chunks {}s, lead {}s, upgrade chunks {}s after {}s (upgrade {})",
                        transcription.draft_chunk_seconds,
                        transcription.chunk_lead_seconds,
                        transcription.upgrade_chunk_seconds,
                        transcription.upgrade_start_after_seconds,
                        if transcription.enable_upgrade { "on" } else { "off" },
                    ),
                    format!(
                        "language {}, device {:?}, formats {}",
                        transcription.language,
                        transcription.device,
                        config.playback.supported_extensions.join(" "),
                    ),
                ]
            }
            MessageFromBackend::PlaylistLoaded(entries) => {
                self.rows = entries
                    .into_iter()
                    .map(|entry| Row {
                        path: entry.path,
                        has_subtitles: entry.has_subtitles,
                        task: TrackTaskState::Idle,
                    })
                    .collect();
                self.current = None;
                self.render_playlist()
            }
            MessageFromBackend::SubtitleAvailability { path, available } => {
                if let Some(row) = self.row_mut(&path) {
                    row.has_subtitles = available;
                }
                Vec::new()
            }
            MessageFromBackend::PlaybackStateChanged {
                status,
                path,
                index,
                duration,
            } => {
                self.status = status;
                self.current = index;
                self.duration = duration;
                self.last_printed_second = None;
                let name = path.as_deref().map(track_name).unwrap_or_default();
                match status {
                    PlaybackStatus::Playing => {
                        self.position = 0.0;
                        vec![format!("playing {name} ({})", format_timestamp(duration))]
                    }
                    PlaybackStatus::Paused => vec![format!("paused {name}")],
                    PlaybackStatus::Ended => vec![format!("finished {name}")],
                    PlaybackStatus::Stopped => vec!["stopped".to_string()],
                    PlaybackStatus::Idle | PlaybackStatus::Loading => Vec::new(),
                }
            }
            MessageFromBackend::PositionChanged { position, duration } => {
                self.position = position;
                self.duration = duration;
                let second = position.max(0.0) as u64;
                if self.last_printed_second == Some(second) || second % 10 != 0 {
                    return Vec::new();
                }
                self.last_printed_second = Some(second);
                vec![format!("  {}", format_progress(position, duration))]
            }
            MessageFromBackend::CaptionChanged(display) => {
                let line = match &display {
                    CaptionDisplay::Showing(caption) => format!(
                        "  [{}] {}",
                        format_timestamp(caption.start_time),
                        caption.text.replace('\n', " / ")
                    ),
                    CaptionDisplay::Generating => "  (generating subtitles...)".to_string(),
                    CaptionDisplay::Blank => String::new(),
                };
                self.caption = Some(display);
                if line.is_empty() { Vec::new() } else { vec![line] }
            }
            MessageFromBackend::TaskStateChanged { path, state } => {
                if let Some(row) = self.row_mut(&path) {
                    row.task = state;
                }
                Vec::new()
            }
            MessageFromBackend::JobCompleted(report) => {
                log::debug!(
                    "{} chunk at {}s of {:?}: {:?}",
                    report.tier,
                    report.start_second,
                    report.path,
                    report.outcome
                );
                // failures also arrive as notifications
                Vec::new()
            }
        }
    }
}
