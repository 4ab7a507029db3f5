//! Audio collaborators for the subtitle player.
//!
//! This crate keeps everything that touches audio files or devices behind
//! small interfaces so the scheduling core can be driven by fakes in tests:
//! - [`engine::PlaybackEngine`], the play/pause/stop/position contract for
//!   one active track, with a wall-clock engine and (feature `rodio`) a real
//!   output engine.
//! - [`extract::AudioExtractor`], which cuts a bounded mono 16 kHz window out
//!   of a track for the recognizer.
//! - [`probe`], which reads track durations.
//! - [`discovery`], which lists playable files in a directory.
//!
//! No seek operation exists anywhere in this crate; playback always starts
//! from the beginning of a track.

pub mod discovery;
pub mod engine;
pub mod extract;
pub mod mixer;
pub mod probe;

#[cfg(feature = "rodio")]
pub mod rodio_engine;

use std::path::Path;

/// Returns the lowercase extension of `path` with a leading dot, e.g. `.mp3`.
pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| format!(".{}", extension.to_ascii_lowercase()))
}

/// Whether `path` carries one of `extensions` (compared case-insensitively,
/// with or without the leading dot).
pub fn has_supported_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(extension) = dotted_extension(path) else {
        return false;
    };
    extensions.iter().any(|supported| {
        let supported = supported.trim().to_ascii_lowercase();
        supported == extension || format!(".{supported}") == extension
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_matching_ignores_case_and_dot() {
        let extensions = vec![".mp3".to_string(), "WAV".to_string()];
        assert!(has_supported_extension(Path::new("/music/a.MP3"), &extensions));
        assert!(has_supported_extension(Path::new("/music/b.wav"), &extensions));
        assert!(!has_supported_extension(Path::new("/music/c.flac"), &extensions));
        assert!(!has_supported_extension(Path::new("/music/no_extension"), &extensions));
    }
}
