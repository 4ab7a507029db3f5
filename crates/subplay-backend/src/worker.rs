//! The single background thread running extraction and recognition.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use subplay_audio::extract::AudioExtractor;
use subplay_bridge::caption::Caption;
use subplay_bridge::config::TranscriptionConfig;
use subplay_bridge::playback::{JobOutcome, JobReport, QualityTier};
use subplay_speech::{CaptionSegment, DecodeOptions, ModelTier, Transcriber, is_non_speech};
use tokio::sync::mpsc::UnboundedSender;

use crate::job::ChunkJob;
use crate::queue::{ChunkQueue, QueueItem};
use crate::state::SharedState;

/// How long the worker waits on an empty queue before checking again.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Builds the decoding parameters for a session.
pub fn decode_options(config: &TranscriptionConfig) -> DecodeOptions {
    let config = config.sanitized();
    DecodeOptions {
        language: config.language_hint().map(str::to_string),
        beam_size: config.beam_size,
        best_of: config.best_of,
    }
}

fn model_tier(tier: QualityTier) -> ModelTier {
    match tier {
        QualityTier::Draft => ModelTier::Fast,
        QualityTier::Upgraded => ModelTier::Accurate,
    }
}

/// Shifts window-relative segments onto the track timeline, clamps them to
/// the window (which never ends past the track) and drops the ones without
/// speech.
fn to_captions(segments: Vec<CaptionSegment>, job: &ChunkJob) -> Vec<Caption> {
    let (window_start, window_end) = job.window();
    segments
        .into_iter()
        .filter(|segment| !is_non_speech(&segment.text))
        .map(|segment| {
            let start = (window_start + segment.start_milliseconds as f64 / 1000.0)
                .clamp(window_start, window_end);
            let end = (window_start + segment.end_milliseconds as f64 / 1000.0)
                .clamp(start, window_end);
            Caption::new(start, end, segment.text.trim())
        })
        .collect()
}

/// Consumes chunk jobs one at a time and merges their captions into the
/// shared timeline cache.
pub struct TranscriptionWorker {
    state: SharedState,
    queue: ChunkQueue,
    extractor: Box<dyn AudioExtractor>,
    transcriber: Box<dyn Transcriber>,
    options: DecodeOptions,
    events: UnboundedSender<JobReport>,
}

impl TranscriptionWorker {
    pub fn new(
        state: SharedState,
        queue: ChunkQueue,
        extractor: Box<dyn AudioExtractor>,
        transcriber: Box<dyn Transcriber>,
        options: DecodeOptions,
        events: UnboundedSender<JobReport>,
    ) -> Self {
        Self {
            state,
            queue,
            extractor,
            transcriber,
            options,
            events,
        }
    }

    /// Starts the worker on its own named thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("transcription".to_string())
            .spawn(move || self.run())
    }

    /// Runs until the shutdown sentinel arrives or the coordinator is gone.
    pub fn run(mut self) {
        log::debug!("Transcription worker started");
        loop {
            let job = match self.queue.pop_timeout(POLL_INTERVAL) {
                None => continue,
                Some(QueueItem::Shutdown) => break,
                Some(QueueItem::Job(job)) => job,
            };

            let Some(report) = self.process(&job) else {
                continue;
            };
            if self.events.send(report).is_err() {
                log::debug!("Coordinator is gone, stopping the worker");
                break;
            }
        }
        log::debug!("Transcription worker stopped");
    }

    /// Processes one job. Returns `None` when the job turned out to be stale,
    /// in which case nothing was modified.
    pub fn process(&mut self, job: &ChunkJob) -> Option<JobReport> {
        {
            let mut state = self.state.lock();
            if state.is_stale(&job.path, job.generation) {
                state.release(&job.key());
                log::debug!(
                    "Dropping stale {} chunk at {}s of {:?}",
                    job.tier,
                    job.start_second,
                    job.path
                );
                return None;
            }
        }

        log::debug!(
            "Transcribing {} chunk [{}, {})s of {:?}",
            job.tier,
            job.start_second,
            job.end_second(),
            job.path
        );
        // the lock is not held while the engine runs
        let result = self.recognize(job);

        let mut state = self.state.lock();
        state.release(&job.key());
        if state.is_stale(&job.path, job.generation) {
            log::debug!(
                "Discarding result of stale {} chunk at {}s of {:?}",
                job.tier,
                job.start_second,
                job.path
            );
            return None;
        }

        let outcome = match result {
            Ok(captions) if captions.is_empty() => {
                log::trace!("Chunk at {}s of {:?} is silent", job.start_second, job.path);
                JobOutcome::Silence
            }
            Ok(captions) => {
                let count = captions.len();
                let entry = state.entry_mut(&job.path);
                let merged = crate::timeline::merge(&entry.captions, captions, job.window(), job.tier);
                entry.captions = std::sync::Arc::new(merged);
                JobOutcome::Captions(count)
            }
            Err(reason) => {
                log::warn!(
                    "{} chunk at {}s of {:?} failed: {reason}",
                    job.tier,
                    job.start_second,
                    job.path
                );
                JobOutcome::Failed(reason)
            }
        };
        state.record_processed(job);

        Some(JobReport {
            path: job.path.clone(),
            start_second: job.start_second,
            length_seconds: job.length_seconds,
            tier: job.tier,
            outcome,
        })
    }

    /// Extracts the window and runs recognition on it. The extracted audio is
    /// released before this returns, whatever the outcome.
    fn recognize(&mut self, job: &ChunkJob) -> Result<Vec<Caption>, String> {
        let window = self
            .extractor
            .extract(&job.path, job.start_second, job.length_seconds)
            .map_err(|e| format!("audio extraction failed: {e}"))?;

        let segments = self
            .transcriber
            .transcribe(window.samples(), model_tier(job.tier), &self.options)
            .map_err(|e| e.to_string())?;

        Ok(to_captions(segments, job))
    }
}


#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use subplay_speech::CaptionSegment;

    use super::testing::{FakeExtractor, ScriptedTranscriber};
    use super::*;
    use crate::scheduler::ChunkScheduler;

    fn worker(
        state: SharedState,
        extractor: FakeExtractor,
        transcriber: ScriptedTranscriber,
    ) -> (TranscriptionWorker, tokio::sync::mpsc::UnboundedReceiver<JobReport>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let worker = TranscriptionWorker::new(
            state,
            ChunkQueue::new(),
            Box::new(extractor),
            Box::new(transcriber),
            DecodeOptions::default(),
            tx,
        );
        (worker, rx)
    }

    fn active(path: &Path) -> (SharedState, u64) {
        let state = SharedState::default();
        let generation = {
            let mut state = state.lock();
            let generation = state.switch_track(Some(path.to_path_buf()));
            state.begin_generation();
            generation
        };
        (state, generation)
    }

    fn job(path: &Path, start_second: u32, tier: QualityTier, generation: u64) -> ChunkJob {
        ChunkJob {
            path: path.to_path_buf(),
            start_second,
            length_seconds: 20,
            tier,
            generation,
            track_duration: None,
        }
    }

    #[test]
    fn captions_are_shifted_into_track_time() {
        let path = PathBuf::from("/music/a.mp3");
        let (state, generation) = active(&path);
        let mut transcriber = ScriptedTranscriber::default();
        transcriber.script.insert(
            40,
            vec![
                CaptionSegment::new(500, 2_000, " hello "),
                CaptionSegment::new(2_000, 2_500, "[BLANK_AUDIO]"),
                CaptionSegment::new(19_000, 25_000, "tail"),
            ],
        );
        let (mut worker, _rx) = worker(state.clone(), FakeExtractor::default(), transcriber);

        let report = worker.process(&job(&path, 40, QualityTier::Draft, generation)).unwrap();
        assert_eq!(report.outcome, JobOutcome::Captions(2));

        let timeline = state.lock().timeline(&path);
        assert_eq!(timeline.len(), 2);
        assert_eq!((timeline[0].start_time, timeline[0].end_time), (40.5, 42.0));
        assert_eq!(timeline[0].text, "hello");
        // clamped to the window end
        assert_eq!((timeline[1].start_time, timeline[1].end_time), (59.0, 60.0));
    }

    #[test]
    fn captions_never_run_past_the_end_of_the_track() {
        let path = PathBuf::from("/music/a.mp3");
        let (state, _) = active(&path);
        let mut transcriber = ScriptedTranscriber::default();
        transcriber.script.insert(
            40,
            vec![
                CaptionSegment::new(2_000, 3_000, "inside"),
                CaptionSegment::new(9_000, 11_000, "tail"),
            ],
        );
        let (mut worker, _rx) = worker(state.clone(), FakeExtractor::default(), transcriber);

        let tail = {
            let mut state = state.lock();
            state.progress_mut(&path).unwrap().next_draft_start = 40;
            ChunkScheduler::new(&TranscriptionConfig::default())
                .plan(&mut state, &path, 40.0, 50.5)
                .remove(0)
        };
        assert_eq!(tail.window(), (40.0, 50.5));

        let report = worker.process(&tail).unwrap();
        assert_eq!(report.outcome, JobOutcome::Captions(2));

        let timeline = state.lock().timeline(&path);
        assert!(timeline.iter().all(|caption| caption.end_time <= 50.5));
        assert_eq!((timeline[1].start_time, timeline[1].end_time), (49.0, 50.5));
        assert_eq!(crate::timeline::coverage(&timeline), 50.5);
    }

    #[test]
    fn silence_moves_the_draft_counter_past_the_window() {
        let path = PathBuf::from("/music/a.mp3");
        let (state, generation) = active(&path);
        let (mut worker, _rx) = worker(state.clone(), FakeExtractor::default(), ScriptedTranscriber::default());

        let report = worker.process(&job(&path, 30, QualityTier::Draft, generation)).unwrap();
        assert_eq!(report.outcome, JobOutcome::Silence);

        let state = state.lock();
        assert_eq!(state.progress(&path).unwrap().next_draft_start, 50);
        assert!(state.timeline(&path).is_empty());
        assert_eq!(state.entry(&path).unwrap().draft_until, 50);
    }

    #[test]
    fn failures_are_reported_and_still_advance() {
        let path = PathBuf::from("/music/a.mp3");
        let (state, generation) = active(&path);
        let extractor = FakeExtractor {
            failing_starts: vec![0],
            ..FakeExtractor::default()
        };
        let transcriber = ScriptedTranscriber {
            failing_starts: vec![45],
            ..ScriptedTranscriber::default()
        };
        let (mut worker, _rx) = worker(state.clone(), extractor, transcriber);

        let extraction = worker.process(&job(&path, 0, QualityTier::Draft, generation)).unwrap();
        assert!(matches!(extraction.outcome, JobOutcome::Failed(ref reason) if reason.contains("extraction")));

        let mut upgrade = job(&path, 45, QualityTier::Upgraded, generation);
        upgrade.length_seconds = 45;
        let recognition = worker.process(&upgrade).unwrap();
        assert!(matches!(recognition.outcome, JobOutcome::Failed(_)));

        let progress = state.lock().progress(&path).unwrap();
        assert_eq!(progress.next_draft_start, 20);
        assert_eq!(progress.next_upgrade_start, 90);
    }

    #[test]
    fn stale_results_leave_every_timeline_untouched() {
        let track_a = PathBuf::from("/music/a.mp3");
        let track_b = PathBuf::from("/music/b.mp3");
        let (state, generation) = active(&track_a);
        let mut transcriber = ScriptedTranscriber::default();
        transcriber.script.insert(40, vec![CaptionSegment::new(0, 1_000, "from a")]);
        let extractor = FakeExtractor::default();
        let calls = extractor.calls.clone();
        let (mut worker, _rx) = worker(state.clone(), extractor, transcriber);

        let in_flight = job(&track_a, 40, QualityTier::Draft, generation);
        state.lock().try_claim(in_flight.key());
        // the track changes while the job waits in the queue
        state.lock().switch_track(Some(track_b.clone()));

        assert!(worker.process(&in_flight).is_none());
        assert!(calls.lock().unwrap().is_empty());

        let state = state.lock();
        assert!(state.timeline(&track_a).is_empty());
        assert!(state.timeline(&track_b).is_empty());
        assert!(state.entry(&track_a).is_none());
        assert_eq!(state.in_flight_count(), 0);
    }

    #[test]
    fn old_generation_of_the_same_track_is_stale() {
        let path = PathBuf::from("/music/a.mp3");
        let (state, generation) = active(&path);
        let mut transcriber = ScriptedTranscriber::default();
        transcriber.script.insert(0, vec![CaptionSegment::new(0, 1_000, "old")]);
        let (mut worker, _rx) = worker(state.clone(), FakeExtractor::default(), transcriber);

        // replaying the same track starts a new generation
        state.lock().switch_track(Some(path.clone()));

        assert!(worker.process(&job(&path, 0, QualityTier::Draft, generation)).is_none());
        assert!(state.lock().timeline(&path).is_empty());
    }

    #[test]
    fn draft_and_upgrade_use_different_model_tiers() {
        let path = PathBuf::from("/music/a.mp3");
        let (state, generation) = active(&path);
        let transcriber = ScriptedTranscriber::default();
        let tiers = transcriber.tiers.clone();
        let (mut worker, _rx) = worker(state, FakeExtractor::default(), transcriber);

        worker.process(&job(&path, 0, QualityTier::Draft, generation));
        worker.process(&job(&path, 0, QualityTier::Upgraded, generation));
        assert_eq!(*tiers.lock().unwrap(), vec![ModelTier::Fast, ModelTier::Accurate]);
    }

    #[test]
    fn worker_thread_reports_jobs_and_stops_on_shutdown() {
        let path = PathBuf::from("/music/a.mp3");
        let (state, generation) = active(&path);
        let mut transcriber = ScriptedTranscriber::default();
        transcriber.script.insert(0, vec![CaptionSegment::new(0, 1_000, "hi")]);
        let (worker, mut rx) = worker(state, FakeExtractor::default(), transcriber);
        let queue = worker.queue.clone();

        let handle = worker.spawn().unwrap();
        queue.push(job(&path, 0, QualityTier::Draft, generation));
        queue.push_shutdown();
        handle.join().unwrap();

        let report = rx.try_recv().unwrap();
        assert_eq!(report.outcome, JobOutcome::Captions(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn worker_thread_keeps_going_after_a_failed_job() {
        let path = PathBuf::from("/music/a.mp3");
        let (state, generation) = active(&path);
        let extractor = FakeExtractor {
            failing_starts: vec![0],
            ..FakeExtractor::default()
        };
        let mut transcriber = ScriptedTranscriber::default();
        transcriber.script.insert(20, vec![CaptionSegment::new(0, 1_000, "after")]);
        let (worker, mut rx) = worker(state.clone(), extractor, transcriber);
        let queue = worker.queue.clone();

        let handle = worker.spawn().unwrap();
        queue.push(job(&path, 0, QualityTier::Draft, generation));
        queue.push(job(&path, 20, QualityTier::Draft, generation));
        queue.push_shutdown();
        handle.join().unwrap();

        assert!(matches!(rx.try_recv().unwrap().outcome, JobOutcome::Failed(_)));
        assert_eq!(rx.try_recv().unwrap().outcome, JobOutcome::Captions(1));
        assert!(rx.try_recv().is_err());

        let state = state.lock();
        assert_eq!(state.timeline(&path).len(), 1);
        assert_eq!(state.progress(&path).unwrap().next_draft_start, 40);
    }
}
