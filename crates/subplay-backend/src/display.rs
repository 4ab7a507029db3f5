use subplay_bridge::caption::{Caption, CaptionDisplay};

/// Resolves what should be shown at `position`.
pub fn resolve(timeline: &[Caption], position: f64, generating: bool) -> CaptionDisplay {
    match crate::timeline::find_active(timeline, position) {
        Some(caption) => CaptionDisplay::Showing(caption.clone()),
        None if generating => CaptionDisplay::Generating,
        None => CaptionDisplay::Blank,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisplayKey {
    Caption(i64, i64),
    Generating,
    Blank,
}

impl From<&CaptionDisplay> for DisplayKey {
    fn from(display: &CaptionDisplay) -> Self {
        match display {
            CaptionDisplay::Showing(caption) => {
                let (start, end) = caption.display_key();
                DisplayKey::Caption(start, end)
            }
            CaptionDisplay::Generating => DisplayKey::Generating,
            CaptionDisplay::Blank => DisplayKey::Blank,
        }
    }
}

/// Remembers the last caption state sent to the display so that repeated
/// position polls only produce a notification when something changed.
#[derive(Debug, Default)]
pub struct CaptionTracker {
    last: Option<DisplayKey>,
}

impl CaptionTracker {
    /// Returns true when `display` differs from what was last shown.
    pub fn update(&mut self, display: &CaptionDisplay) -> bool {
        let key = DisplayKey::from(display);
        if self.last == Some(key) {
            return false;
        }
        self.last = Some(key);
        true
    }

    /// Forgets the last state; the next update always notifies.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
