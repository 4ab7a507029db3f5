/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Info,
    /// Something went wrong but playback keeps going, e.g. one subtitle chunk
    /// could not be generated.
    Warning,
    /// An operation was aborted, e.g. a track could not be loaded.
    Error,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NotificationType::Info => "info",
            NotificationType::Warning => "warning",
            NotificationType::Error => "error",
        };
        formatter.write_str(label)
    }
}

/// A notification payload intended for the status area of the display.
#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub notification_type: NotificationType,
    pub message: String,
}

impl NotificationMessage {
    pub fn new(notification_type: NotificationType, message: impl Into<String>) -> Self {
        Self {
            notification_type,
            message: message.into(),
        }
    }
}
