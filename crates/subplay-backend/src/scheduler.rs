//! Decides which chunks of the active track to queue next.

use std::path::Path;

use subplay_bridge::config::TranscriptionConfig;
use subplay_bridge::playback::QualityTier;

use crate::job::ChunkJob;
use crate::state::{SchedulerState, last_second};

/// Chunk planner, polled on the scheduler tick while a track plays.
///
/// The draft pass follows the playhead at a fixed lead. The upgrade pass
/// follows the draft pass once enough of the track is covered and never
/// overtakes it. Every planned job is claimed in the in-flight set and the
/// pass counter moves past it in the same critical section, so a window is
/// never planned twice for one generation.
#[derive(Debug, Clone)]
pub struct ChunkScheduler {
    draft_chunk_seconds: u32,
    chunk_lead_seconds: u32,
    upgrade_chunk_seconds: u32,
    upgrade_start_after_seconds: u32,
    enable_upgrade: bool,
}

impl ChunkScheduler {
    pub fn new(config: &TranscriptionConfig) -> Self {
        let config = config.sanitized();
        Self {
            draft_chunk_seconds: config.draft_chunk_seconds,
            chunk_lead_seconds: config.chunk_lead_seconds,
            upgrade_chunk_seconds: config.upgrade_chunk_seconds,
            upgrade_start_after_seconds: config.upgrade_start_after_seconds,
            enable_upgrade: config.enable_upgrade,
        }
    }

    pub fn upgrade_enabled(&self) -> bool {
        self.enable_upgrade
    }

    /// Plans the draft chunk at the resume point of `path`, regardless of the
    /// playback position. Used right after a track starts.
    pub fn initial_draft(
        &self,
        state: &mut SchedulerState,
        path: &Path,
        duration: f64,
    ) -> Option<ChunkJob> {
        self.plan_draft(state, path, None, duration)
    }

    /// Plans the jobs due at `position`: at most one draft chunk and one
    /// upgrade chunk per call.
    pub fn plan(
        &self,
        state: &mut SchedulerState,
        path: &Path,
        position: f64,
        duration: f64,
    ) -> Vec<ChunkJob> {
        let mut jobs = Vec::new();
        jobs.extend(self.plan_draft(state, path, Some(position), duration));
        if self.enable_upgrade {
            jobs.extend(self.plan_upgrade(state, path, duration));
        }
        jobs
    }

    fn plan_draft(
        &self,
        state: &mut SchedulerState,
        path: &Path,
        position: Option<f64>,
        duration: f64,
    ) -> Option<ChunkJob> {
        if !state.is_generating(path) {
            return None;
        }
        let next = state.progress(path)?.next_draft_start;
        if let Some(position) = position
            && position + (self.chunk_lead_seconds as f64) < next as f64
        {
            return None;
        }

        let length = clamp_length(next, self.draft_chunk_seconds, duration)?;
        let job = self.claim(state, path, next, length, QualityTier::Draft, duration)?;
        if let Some(progress) = state.progress_mut(path) {
            progress.next_draft_start = job.end_second();
        }
        Some(job)
    }

    fn plan_upgrade(&self, state: &mut SchedulerState, path: &Path, duration: f64) -> Option<ChunkJob> {
        if !state.is_generating(path) {
            return None;
        }
        let next = state.progress(path)?.next_upgrade_start;
        let coverage = state.draft_coverage(path);

        // short tracks start upgrading once the draft pass reached their end
        let threshold = match last_second(duration) {
            Some(last) => self.upgrade_start_after_seconds.min(last),
            None => self.upgrade_start_after_seconds,
        };
        if coverage < threshold as f64 {
            return None;
        }

        let length = clamp_length(next, self.upgrade_chunk_seconds, duration)?;
        if (next + length) as f64 > coverage + 1.0 {
            return None;
        }

        let job = self.claim(state, path, next, length, QualityTier::Upgraded, duration)?;
        if let Some(progress) = state.progress_mut(path) {
            progress.next_upgrade_start = job.end_second();
        }
        Some(job)
    }

    fn claim(
        &self,
        state: &mut SchedulerState,
        path: &Path,
        start_second: u32,
        length_seconds: u32,
        tier: QualityTier,
        duration: f64,
    ) -> Option<ChunkJob> {
        let job = ChunkJob {
            path: path.to_path_buf(),
            start_second,
            length_seconds,
            tier,
            generation: state.generation(),
            track_duration: (duration > 0.0).then_some(duration),
        };
        if !state.try_claim(job.key()) {
            log::trace!("{tier} chunk at {start_second}s of {path:?} is already in flight");
            return None;
        }
        Some(job)
    }
}

/// Length of the chunk starting at `start`, cut at the end of the track.
/// `None` once `start` is past the end.
fn clamp_length(start: u32, length: u32, duration: f64) -> Option<u32> {
    match last_second(duration) {
        Some(last) if start >= last => None,
        Some(last) => Some(length.min(last - start)),
        None => Some(length),
    }
}
