//! Two-priority work queue feeding the transcription worker.

use std::time::Duration;

use crossbeam_channel::{Receiver, Select, Sender, unbounded};

use crate::job::ChunkJob;

/// Item travelling through the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    Job(ChunkJob),
    /// Tells the worker to exit.
    Shutdown,
}

/// Urgent and background FIFO queues.
///
/// The consumer always drains the urgent queue before looking at the
/// background one. Deduplication of in-flight work happens before a job gets
/// here, under the scheduling lock (see [`crate::state::SchedulerState::try_claim`]).
#[derive(Debug, Clone)]
pub struct ChunkQueue {
    urgent_tx: Sender<QueueItem>,
    urgent_rx: Receiver<QueueItem>,
    background_tx: Sender<QueueItem>,
    background_rx: Receiver<QueueItem>,
}

impl Default for ChunkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkQueue {
    pub fn new() -> Self {
        let (urgent_tx, urgent_rx) = unbounded();
        let (background_tx, background_rx) = unbounded();
        Self {
            urgent_tx,
            urgent_rx,
            background_tx,
            background_rx,
        }
    }

    /// Queues a job on the urgent queue for draft chunks and on the background
    /// queue otherwise.
    pub fn push(&self, job: ChunkJob) {
        let sender = if job.is_urgent() {
            &self.urgent_tx
        } else {
            &self.background_tx
        };
        // both ends live in `self`, so the channel cannot be disconnected
        let _ = sender.send(QueueItem::Job(job));
    }

    /// Puts the shutdown sentinel on both queues.
    pub fn push_shutdown(&self) {
        let _ = self.urgent_tx.send(QueueItem::Shutdown);
        let _ = self.background_tx.send(QueueItem::Shutdown);
    }

    /// Returns the next item, urgent first, waiting at most `timeout` for one
    /// to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<QueueItem> {
        loop {
            if let Ok(item) = self.urgent_rx.try_recv() {
                return Some(item);
            }
            if let Ok(item) = self.background_rx.try_recv() {
                return Some(item);
            }

            // wait for either queue, then go back and honor the priority order
            let mut select = Select::new();
            select.recv(&self.urgent_rx);
            select.recv(&self.background_rx);
            if select.ready_timeout(timeout).is_err() {
                return None;
            }
        }
    }

    /// Discards every pending item and returns how many were dropped.
    pub fn drain(&self) -> usize {
        self.urgent_rx.try_iter().count() + self.background_rx.try_iter().count()
    }

    /// Number of pending `(urgent, background)` items.
    pub fn len(&self) -> (usize, usize) {
        (self.urgent_rx.len(), self.background_rx.len())
    }

    pub fn is_empty(&self) -> bool {
        self.urgent_rx.is_empty() && self.background_rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use subplay_bridge::playback::QualityTier;

    use super::*;

    fn job(start_second: u32, tier: QualityTier) -> ChunkJob {
        ChunkJob {
            path: PathBuf::from("/music/a.mp3"),
            start_second,
            length_seconds: 20,
            tier,
            generation: 1,
            track_duration: None,
        }
    }

    fn pop_job(queue: &ChunkQueue) -> ChunkJob {
        match queue.pop_timeout(Duration::from_millis(10)) {
            Some(QueueItem::Job(job)) => job,
            other => panic!("expected a job, got {other:?}"),
        }
    }

    #[test]
    fn urgent_jobs_are_served_before_background_jobs() {
        let queue = ChunkQueue::new();
        queue.push(job(0, QualityTier::Upgraded));
        queue.push(job(45, QualityTier::Upgraded));
        queue.push(job(20, QualityTier::Draft));
        queue.push(job(40, QualityTier::Draft));

        let order: Vec<_> = (0..4).map(|_| pop_job(&queue)).map(|j| (j.start_second, j.tier)).collect();
        assert_eq!(
            order,
            vec![
                (20, QualityTier::Draft),
                (40, QualityTier::Draft),
                (0, QualityTier::Upgraded),
                (45, QualityTier::Upgraded),
            ]
        );
    }

    #[test]
    fn empty_queue_times_out() {
        let queue = ChunkQueue::new();
        assert_eq!(queue.pop_timeout(Duration::from_millis(5)), None);
    }

    #[test]
    fn blocked_consumer_wakes_up_for_a_new_job() {
        let queue = ChunkQueue::new();
        let consumer = queue.clone();
        let handle = std::thread::spawn(move || consumer.pop_timeout(Duration::from_secs(5)));

        std::thread::sleep(Duration::from_millis(20));
        queue.push(job(0, QualityTier::Draft));

        let item = handle.join().unwrap();
        assert!(matches!(item, Some(QueueItem::Job(j)) if j.start_second == 0));
    }

    #[test]
    fn drain_discards_everything_pending() {
        let queue = ChunkQueue::new();
        queue.push(job(0, QualityTier::Draft));
        queue.push(job(0, QualityTier::Upgraded));

        assert_eq!(queue.len(), (1, 1));
        assert_eq!(queue.drain(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn shutdown_sentinel_is_delivered() {
        let queue = ChunkQueue::new();
        queue.push_shutdown();
        assert_eq!(queue.pop_timeout(Duration::from_millis(5)), Some(QueueItem::Shutdown));
    }
}
