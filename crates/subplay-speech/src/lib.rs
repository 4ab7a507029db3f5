//! Speech recognition seam for chunked subtitle generation.
//!
//! A [`Transcriber`] takes one bounded window of mono 16 kHz audio and returns
//! the utterances it found, timed relative to the start of that window. The
//! caller is responsible for shifting them onto the track's timeline.
//!
//! Recognition is expensive, so implementations are driven from a single
//! background thread and are never invoked concurrently with themselves.

#[cfg(feature = "whisper")]
pub mod whisper;

/// Sample rate every audio window must be decoded to.
pub const TARGET_RATE: u32 = 16_000;

/// One utterance returned by the recognizer, relative to its audio window.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionSegment {
    pub start_milliseconds: i64,
    pub end_milliseconds: i64,
    pub text: String,
}

impl CaptionSegment {
    pub fn new(start_milliseconds: i64, end_milliseconds: i64, text: impl Into<String>) -> Self {
        Self {
            start_milliseconds,
            end_milliseconds,
            text: text.into(),
        }
    }
}

/// Which model a request should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTier {
    /// Fast model used to keep up with the playhead.
    Fast,
    /// Slower, more accurate model.
    Accurate,
}

/// Decoding parameters shared by every request of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOptions {
    /// Language code, `None` to let the model detect it.
    pub language: Option<String>,
    /// Beam width; values above one select beam search.
    pub beam_size: u32,
    /// Candidates for greedy sampling.
    pub best_of: u32,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            language: None,
            beam_size: 1,
            best_of: 1,
        }
    }
}

/// Errors produced while loading a model or running recognition.
#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    /// The model file could not be loaded on any device.
    #[error("failed to load model {path}: {reason}")]
    Model { path: String, reason: String },
    /// Inference itself failed for the submitted window.
    #[error("recognition failed: {0}")]
    Inference(String),
    /// No recognizer is available in this build or configuration.
    #[error("speech recognition is unavailable: {0}")]
    Unavailable(String),
}

/// Recognizer invoked on bounded windows of mono audio.
pub trait Transcriber: Send {
    /// Runs recognition over `samples` (mono `f32` at [`TARGET_RATE`], range
    /// `[-1.0, 1.0]`) and returns segments timed relative to the first sample.
    fn transcribe(
        &mut self,
        samples: &[f32],
        tier: ModelTier,
        options: &DecodeOptions,
    ) -> Result<Vec<CaptionSegment>, TranscribeError>;
}

/// Returns true for annotations the recognizer emits instead of speech, such
/// as `[BLANK_AUDIO]` or `(music)`.
pub fn is_non_speech(text: &str) -> bool {
    let text = text.trim();
    text.is_empty()
        || (text.starts_with('[') && text.ends_with(']'))
        || (text.starts_with('(') && text.ends_with(')'))
}

/// Stand-in used when no recognizer could be built. Every request fails, which
/// leaves playback untouched and marks the chunk as failed.
#[derive(Debug, Clone)]
pub struct UnavailableTranscriber {
    reason: String,
}

impl UnavailableTranscriber {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Transcriber for UnavailableTranscriber {
    fn transcribe(
        &mut self,
        _samples: &[f32],
        _tier: ModelTier,
        _options: &DecodeOptions,
    ) -> Result<Vec<CaptionSegment>, TranscribeError> {
        Err(TranscribeError::Unavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_speech_annotations_are_detected() {
        assert!(is_non_speech(" [BLANK_AUDIO] "));
        assert!(is_non_speech("(upbeat music)"));
        assert!(is_non_speech("   "));
        assert!(!is_non_speech("[laughs] okay then"));
        assert!(!is_non_speech("hello there"));
    }

    #[test]
    fn unavailable_transcriber_always_fails() {
        let mut transcriber = UnavailableTranscriber::new("no model configured");
        let result = transcriber.transcribe(&[0.0; 160], ModelTier::Fast, &DecodeOptions::default());
        assert!(matches!(result, Err(TranscribeError::Unavailable(reason)) if reason == "no model configured"));
    }
}
