use std::path::PathBuf;

use subplay_bridge::playback::QualityTier;

/// One unit of background work: a time window of a track to recognize.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkJob {
    pub path: PathBuf,
    pub start_second: u32,
    pub length_seconds: u32,
    pub tier: QualityTier,
    /// Coordinator generation the job was created under.
    pub generation: u64,
    /// Length of the whole track when known. The last window of a track whose
    /// length is not a whole second ends here instead of at `end_second`.
    pub track_duration: Option<f64>,
}

/// Identity of an in-flight job. At most one job per key may be queued or
/// running at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub path: PathBuf,
    pub start_second: u32,
    pub tier: QualityTier,
    pub generation: u64,
}

impl ChunkJob {
    pub fn key(&self) -> JobKey {
        JobKey {
            path: self.path.clone(),
            start_second: self.start_second,
            tier: self.tier,
            generation: self.generation,
        }
    }

    /// First second after the window.
    pub fn end_second(&self) -> u32 {
        self.start_second.saturating_add(self.length_seconds)
    }

    /// The window as track-absolute seconds, `[start, end)`, never reaching
    /// past the end of the track.
    pub fn window(&self) -> (f64, f64) {
        let start = self.start_second as f64;
        let end = self.end_second() as f64;
        match self.track_duration {
            Some(duration) if duration > 0.0 => (start.min(duration), end.min(duration)),
            _ => (start, end),
        }
    }

    /// Draft jobs keep the playhead covered and go to the urgent queue.
    pub fn is_urgent(&self) -> bool {
        self.tier == QualityTier::Draft
    }
}
