//! Communication bridge between the display frontend and the playback backend.
//!
//! This crate defines the types and protocols used to connect a display layer
//! with the backend that owns playback, chunked subtitle generation and the
//! caption timeline.
//!
//! The design is deliberately lightweight and unidirectional:
//! - The frontend sends commands (e.g., open a folder, play a track, pause).
//! - The backend pushes events (e.g., caption changes, playback position,
//!   per-track task state, notifications).
//!
//! Communication happens over bounded [`tokio::sync::mpsc`] channels wrapped
//! in [`BridgeChannels`]. The frontend drains its receiver on its own thread,
//! so nothing produced by background threads ever touches display state
//! directly.

pub mod caption;
pub mod config;
pub mod notification;
pub mod playback;

use std::path::PathBuf;

use tokio::sync::mpsc::{self, Receiver, Sender};

/// Messages emitted by the backend to inform the frontend of state updates.
#[derive(Debug, Clone)]
pub enum MessageFromBackend {
    /// Generic message for all notifications in the application.
    NotificationMessage(notification::NotificationMessage),
    /// Response to the configuration request from the frontend.
    ConfigurationResponse(config::Config),
    /// The playlist was replaced after a folder was opened.
    PlaylistLoaded(Vec<playback::PlaylistEntry>),
    /// Whether captions exist (cached or on disk) for the given track.
    SubtitleAvailability { path: PathBuf, available: bool },
    /// The playback state machine moved to a new state.
    PlaybackStateChanged {
        status: playback::PlaybackStatus,
        path: Option<PathBuf>,
        index: Option<usize>,
        duration: f64,
    },
    /// Current playback position, in seconds.
    PositionChanged { position: f64, duration: f64 },
    /// The caption under the playhead changed.
    CaptionChanged(caption::CaptionDisplay),
    /// Background subtitle work for a track changed state.
    TaskStateChanged {
        path: PathBuf,
        state: playback::TrackTaskState,
    },
    /// One chunk job finished, successfully or not.
    JobCompleted(playback::JobReport),
}

/// Commands issued by the frontend to control or query the backend.
#[derive(Debug, Clone)]
pub enum MessageToBackend {
    /// Request for the application configuration.
    ConfigurationRequest,
    /// Scan a directory and replace the playlist with its audio files.
    OpenFolder(PathBuf),
    /// Start playing the playlist entry at the given index.
    PlayIndex(usize),
    /// Pause or resume the current track.
    TogglePause,
    Next,
    Previous,
    Stop,
    /// Set output volume, in range `[0, 1]`.
    SetVolume(f32),
    /// Stop playback and the background worker, then exit the backend loop.
    Shutdown,
}

/// Paired `tokio::mpsc` channels for bidirectional communication between
/// frontend and backend.
pub struct BridgeChannels {
    /// Receiver used by the frontend to get messages from the backend.
    pub frontend_rx: Receiver<MessageFromBackend>,
    /// Sender used by the frontend to send commands to the backend.
    pub frontend_tx: Sender<MessageToBackend>,

    /// Receiver used by the backend to get commands from the frontend.
    pub backend_rx: Receiver<MessageToBackend>,
    /// Sender used by the backend to send events/responses to the frontend.
    pub backend_tx: Sender<MessageFromBackend>,
}

impl BridgeChannels {
    /// Creates a new pair of bridged channels with the given buffer capacity.
    pub fn new(buffer: usize) -> Self {
        let (to_backend_tx, to_backend_rx) = mpsc::channel(buffer);
        let (to_frontend_tx, to_frontend_rx) = mpsc::channel(buffer);
        Self {
            frontend_tx: to_backend_tx,
            frontend_rx: to_frontend_rx,
            backend_rx: to_backend_rx,
            backend_tx: to_frontend_tx,
        }
    }
}

impl Default for BridgeChannels {
    fn default() -> Self {
        Self::new(256)
    }
}
