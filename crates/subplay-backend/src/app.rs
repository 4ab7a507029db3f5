//! Application context and message dispatching utilities.
//!
//! The context holds the outbound bridge channel and the loaded configuration,
//! routes frontend commands to the playback coordinator and forwards whatever
//! the coordinator produced back to the frontend.

use subplay_bridge::config::Config;
use subplay_bridge::notification::{NotificationMessage, NotificationType};
use subplay_bridge::{MessageFromBackend, MessageToBackend};
use tokio::sync::mpsc::Sender;

use crate::coordinator::PlaybackCoordinator;

/// Application context shared by the backend loop.
pub(crate) struct AppContext {
    /// Outbound channel to the frontend bridge.
    pub tx: Sender<MessageFromBackend>,
    /// Configuration loaded at startup. Read-only for the whole session.
    pub config: Config,
}

impl AppContext {
    pub fn new(tx: Sender<MessageFromBackend>, config: Config) -> Self {
        Self { tx, config }
    }

    /// Dispatches a message received from the frontend.
    pub async fn dispatch_message(
        &self,
        coordinator: &mut PlaybackCoordinator,
        message: MessageToBackend,
    ) {
        log::debug!("Got a frontend message: {message:?}");
        match message {
            MessageToBackend::ConfigurationRequest => {
                self.send(MessageFromBackend::ConfigurationResponse(self.config.clone()))
                    .await;
            }
            MessageToBackend::OpenFolder(directory) => coordinator.open_folder(&directory),
            MessageToBackend::PlayIndex(index) => {
                coordinator.play_index(index);
            }
            MessageToBackend::TogglePause => coordinator.toggle_pause(),
            MessageToBackend::Next => {
                coordinator.next();
            }
            MessageToBackend::Previous => {
                coordinator.previous();
            }
            MessageToBackend::Stop => coordinator.stop(),
            MessageToBackend::SetVolume(volume) => coordinator.set_volume(volume),
            MessageToBackend::Shutdown => coordinator.shutdown(),
        }
        self.flush(coordinator).await;
    }

    /// Sends everything the coordinator produced since the last flush.
    /// Returns false once the frontend is gone.
    pub async fn flush(&self, coordinator: &mut PlaybackCoordinator) -> bool {
        for message in coordinator.drain_outbox() {
            if !self.send(message).await {
                return false;
            }
        }
        true
    }

    /// Send a message to the frontend bridge. Returns false if the frontend
    /// dropped its receiver.
    pub async fn send(&self, message: MessageFromBackend) -> bool {
        match self.tx.send(message).await {
            Ok(()) => true,
            Err(_) => {
                log::warn!("Frontend closed its channel, dropping message");
                false
            }
        }
    }

    /// Send a notification message to the frontend bridge.
    pub async fn send_notification(
        &self,
        notification_type: NotificationType,
        content: impl Into<String>,
    ) {
        self.send(MessageFromBackend::NotificationMessage(
            NotificationMessage::new(notification_type, content),
        ))
        .await;
    }
}
