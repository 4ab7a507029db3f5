use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use subplay_bridge::caption::Caption;
use subplay_bridge::playback::QualityTier;

use crate::job::{ChunkJob, JobKey};

/// Where the next chunk of each pass starts, for the active track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackProgress {
    pub next_draft_start: u32,
    pub next_upgrade_start: u32,
}

/// Cached captions of one track plus how far each pass got on it.
#[derive(Debug, Clone, Default)]
pub struct TimelineEntry {
    /// Snapshot handed out to readers. Replaced on every merge.
    pub captions: Arc<Vec<Caption>>,
    /// End of the last draft window that was processed.
    pub draft_until: u32,
    /// End of the last upgrade window that was processed.
    pub upgraded_until: u32,
    /// The timeline covers the whole track and needs no more work.
    pub complete: bool,
}

/// Scheduling state shared by the coordinator and the transcription worker.
///
/// Every field lives behind the one lock of [`SharedState`]: the generation
/// counter, the in-flight set, the per-track counters and the timeline cache
/// are always read and written together.
#[derive(Debug, Default)]
pub struct SchedulerState {
    generation: u64,
    active_path: Option<PathBuf>,
    /// Generation is enabled for the active track.
    generating: bool,
    in_flight: HashSet<JobKey>,
    progress: HashMap<PathBuf, TrackProgress>,
    timelines: HashMap<PathBuf, TimelineEntry>,
}

impl SchedulerState {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active_path.as_deref()
    }

    /// Makes `path` the active track and invalidates all pending work.
    ///
    /// Bumps the generation, forgets every in-flight key and every per-track
    /// counter. Cached timelines are kept. Returns the new generation.
    pub fn switch_track(&mut self, path: Option<PathBuf>) -> u64 {
        self.generation += 1;
        self.active_path = path;
        self.generating = false;
        self.in_flight.clear();
        self.progress.clear();
        self.generation
    }

    /// Enables generation for the active track, resuming each pass where the
    /// cached timeline left it.
    pub fn begin_generation(&mut self) {
        let Some(path) = self.active_path.clone() else {
            return;
        };
        let progress = self
            .timelines
            .get(&path)
            .map(|entry| TrackProgress {
                next_draft_start: entry.draft_until,
                next_upgrade_start: entry.upgraded_until,
            })
            .unwrap_or_default();
        self.progress.insert(path, progress);
        self.generating = true;
    }

    /// Disables generation for the active track. Jobs already queued still run.
    pub fn end_generation(&mut self) {
        self.generating = false;
    }

    pub fn is_generating(&self, path: &Path) -> bool {
        self.generating && self.active_path.as_deref() == Some(path)
    }

    pub fn progress(&self, path: &Path) -> Option<TrackProgress> {
        self.progress.get(path).copied()
    }

    pub fn progress_mut(&mut self, path: &Path) -> Option<&mut TrackProgress> {
        self.progress.get_mut(path)
    }

    /// Registers `key` as in flight. Returns false when an identical job is
    /// already queued or running.
    pub fn try_claim(&mut self, key: JobKey) -> bool {
        self.in_flight.insert(key)
    }

    pub fn release(&mut self, key: &JobKey) {
        self.in_flight.remove(key);
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// A job is stale once the generation moved on or another track became
    /// active.
    pub fn is_stale(&self, path: &Path, generation: u64) -> bool {
        generation != self.generation || self.active_path.as_deref() != Some(path)
    }

    /// Snapshot of the cached captions of `path`. Cheap to take and safe to
    /// search after the lock is released.
    pub fn timeline(&self, path: &Path) -> Arc<Vec<Caption>> {
        self.timelines
            .get(path)
            .map(|entry| entry.captions.clone())
            .unwrap_or_default()
    }

    pub fn entry(&self, path: &Path) -> Option<&TimelineEntry> {
        self.timelines.get(path)
    }

    pub fn entry_mut(&mut self, path: &Path) -> &mut TimelineEntry {
        self.timelines.entry(path.to_path_buf()).or_default()
    }

    /// Replaces the cached timeline of `path` with captions read from disk.
    /// Such timelines count as complete.
    pub fn install_timeline(&mut self, path: &Path, captions: Vec<Caption>, last_second: u32) {
        self.timelines.insert(
            path.to_path_buf(),
            TimelineEntry {
                captions: Arc::new(captions),
                draft_until: last_second,
                upgraded_until: last_second,
                complete: true,
            },
        );
    }

    /// Records that `job` was processed, whatever its outcome, so neither the
    /// scheduler nor a later resume asks for the same window again.
    pub fn record_processed(&mut self, job: &ChunkJob) {
        let end = job.end_second();
        if let Some(progress) = self.progress.get_mut(&job.path) {
            match job.tier {
                QualityTier::Draft => progress.next_draft_start = progress.next_draft_start.max(end),
                QualityTier::Upgraded => {
                    progress.next_upgrade_start = progress.next_upgrade_start.max(end)
                }
            }
        }

        let entry = self.entry_mut(&job.path);
        match job.tier {
            QualityTier::Draft => entry.draft_until = entry.draft_until.max(end),
            QualityTier::Upgraded => entry.upgraded_until = entry.upgraded_until.max(end),
        }
    }

    /// How far the draft pass covers `path`: the furthest caption end or the
    /// end of the last processed draft window, whichever is later.
    pub fn draft_coverage(&self, path: &Path) -> f64 {
        self.timelines
            .get(path)
            .map(|entry| {
                crate::timeline::coverage(&entry.captions).max(entry.draft_until as f64)
            })
            .unwrap_or(0.0)
    }

    /// Whether both passes reached `last_second` (or the timeline is already
    /// complete). The upgrade pass is ignored when `upgrade_enabled` is false.
    pub fn covers(&self, path: &Path, last_second: Option<u32>, upgrade_enabled: bool) -> bool {
        let Some(entry) = self.timelines.get(path) else {
            return false;
        };
        if entry.complete {
            return true;
        }
        let Some(last_second) = last_second else {
            return false;
        };
        entry.draft_until >= last_second && (!upgrade_enabled || entry.upgraded_until >= last_second)
    }

    /// Whether any captions are cached for `path`.
    pub fn has_subtitles(&self, path: &Path) -> bool {
        self.timelines
            .get(path)
            .is_some_and(|entry| entry.complete || !entry.captions.is_empty())
    }
}

/// Handle to the [`SchedulerState`] shared between the backend thread and the
/// transcription worker.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<Mutex<SchedulerState>>);

impl SharedState {
    /// Locks the state. A panic on another thread while holding the lock does
    /// not invalidate the data, so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whole seconds covered by a track of `duration` seconds, `None` when the
/// duration is unknown.
pub fn last_second(duration: f64) -> Option<u32> {
    (duration > 0.0).then(|| duration.ceil() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str, start_second: u32, generation: u64) -> JobKey {
        JobKey {
            path: PathBuf::from(path),
            start_second,
            tier: QualityTier::Draft,
            generation,
        }
    }

    #[test]
    fn switching_tracks_invalidates_pending_work() {
        let mut state = SchedulerState::default();
        let generation = state.switch_track(Some(PathBuf::from("/a.mp3")));
        state.begin_generation();
        assert!(state.try_claim(key("/a.mp3", 0, generation)));
        assert!(!state.try_claim(key("/a.mp3", 0, generation)));

        let next = state.switch_track(Some(PathBuf::from("/b.mp3")));
        assert_eq!(next, generation + 1);
        assert_eq!(state.in_flight_count(), 0);
        assert!(state.progress(Path::new("/a.mp3")).is_none());
        assert!(state.is_stale(Path::new("/a.mp3"), generation));
        assert!(state.is_stale(Path::new("/b.mp3"), generation));
        assert!(!state.is_stale(Path::new("/b.mp3"), next));
        assert!(!state.is_generating(Path::new("/b.mp3")));
    }

    #[test]
    fn generation_resumes_from_recorded_progress() {
        let mut state = SchedulerState::default();
        let path = PathBuf::from("/a.mp3");
        state.switch_track(Some(path.clone()));
        state.begin_generation();
        state.record_processed(&ChunkJob {
            path: path.clone(),
            start_second: 0,
            length_seconds: 20,
            tier: QualityTier::Draft,
            generation: state.generation(),
            track_duration: None,
        });

        state.switch_track(None);
        state.switch_track(Some(path.clone()));
        state.begin_generation();
        assert_eq!(
            state.progress(&path),
            Some(TrackProgress {
                next_draft_start: 20,
                next_upgrade_start: 0,
            })
        );
        assert_eq!(state.draft_coverage(&path), 20.0);
    }

    #[test]
    fn coverage_requires_both_passes_when_upgrading() {
        let mut state = SchedulerState::default();
        let path = Path::new("/a.mp3");
        let entry = state.entry_mut(path);
        entry.draft_until = 120;
        entry.upgraded_until = 90;

        assert!(state.covers(path, Some(120), false));
        assert!(!state.covers(path, Some(120), true));
        assert!(!state.covers(path, None, false));

        state.install_timeline(path, vec![Caption::new(0.0, 1.0, "a")], 1);
        assert!(state.covers(path, None, true));
        assert!(state.has_subtitles(path));
    }

    #[test]
    fn last_second_rounds_up() {
        assert_eq!(last_second(119.2), Some(120));
        assert_eq!(last_second(120.0), Some(120));
        assert_eq!(last_second(0.0), None);
    }
}
