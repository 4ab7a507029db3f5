use serde::{Deserialize, Serialize};

/// One recognized utterance, positioned on the track's absolute timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    /// 1-based position inside its timeline. Display and debugging only, never
    /// used as an identity.
    pub sequence_index: u32,
    /// Start of the utterance, in seconds from the beginning of the track.
    pub start_time: f64,
    /// End of the utterance, in seconds from the beginning of the track.
    pub end_time: f64,
    pub text: String,
}

/// Rounds seconds to whole milliseconds.
fn to_milliseconds(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

impl Caption {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            sequence_index: 0,
            start_time,
            end_time,
            text: text.into(),
        }
    }

    /// Identity used when deduplicating a timeline: millisecond-rounded bounds
    /// plus the text.
    pub fn dedup_key(&self) -> (i64, i64, &str) {
        (
            to_milliseconds(self.start_time),
            to_milliseconds(self.end_time),
            self.text.as_str(),
        )
    }

    /// Identity used by the display layer to decide whether the caption under
    /// the playhead changed.
    pub fn display_key(&self) -> (i64, i64) {
        (to_milliseconds(self.start_time), to_milliseconds(self.end_time))
    }

    /// Whether `position` falls inside the closed interval of this caption.
    pub fn contains(&self, position: f64) -> bool {
        self.start_time <= position && position <= self.end_time
    }
}

/// What the display layer should show for the current playback position.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptionDisplay {
    /// A caption covers the playhead.
    Showing(Caption),
    /// No caption covers the playhead, but subtitles are still being generated
    /// for the track.
    Generating,
    /// No caption covers the playhead and nothing is being generated.
    Blank,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_rounds_to_milliseconds() {
        let a = Caption::new(1.0004, 2.0, "hello");
        let b = Caption::new(1.0001, 2.0002, "hello");
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_ne!(a.dedup_key(), Caption::new(1.0, 2.0, "hello!").dedup_key());
    }

    #[test]
    fn contains_is_inclusive_on_both_ends() {
        let caption = Caption::new(2.5, 4.0, "b");
        assert!(caption.contains(2.5));
        assert!(caption.contains(4.0));
        assert!(!caption.contains(4.01));
    }
}
