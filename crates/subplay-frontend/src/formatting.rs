use std::fmt::Write;
use std::path::Path;

/// Formats a playback position in a human-readable `HH:MM:SS` or `MM:SS`
/// format.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    let mut out = String::with_capacity(8);
    if hours > 0 {
        let _ = write!(&mut out, "{hours:02}:{minutes:02}:{secs:02}");
    } else {
        let _ = write!(&mut out, "{minutes:02}:{secs:02}");
    }

    out
}

/// Formats `position / duration`, leaving out the duration when unknown.
pub fn format_progress(position: f64, duration: f64) -> String {
    if duration > 0.0 {
        format!("{} / {}", format_timestamp(position), format_timestamp(duration))
    } else {
        format_timestamp(position)
    }
}

/// File name of a track, or the whole path if it has none.
pub fn track_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_drop_hours_when_zero() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(61.9), "01:01");
        assert_eq!(format_timestamp(3723.0), "01:02:03");
        assert_eq!(format_timestamp(-5.0), "00:00");
    }

    #[test]
    fn progress_without_duration() {
        assert_eq!(format_progress(5.0, 0.0), "00:05");
        assert_eq!(format_progress(5.0, 125.0), "00:05 / 02:05");
    }
}
