//! Ordered, deduplicated caption timelines.

use subplay_bridge::caption::Caption;
use subplay_bridge::playback::QualityTier;

/// Whether `caption` touches the half-open `[start, end)` window.
fn intersects(caption: &Caption, (start, end): (f64, f64)) -> bool {
    caption.start_time < end && (caption.end_time > start || caption.start_time >= start)
}

/// Merges the captions of one chunk into a timeline.
///
/// Upgraded chunks first drop every existing caption touching their window.
/// Draft chunks are simply added. The result is sorted by `(start, end)`,
/// deduplicated on [`Caption::dedup_key`] and renumbered from 1.
pub fn merge(
    existing: &[Caption],
    incoming: Vec<Caption>,
    window: (f64, f64),
    tier: QualityTier,
) -> Vec<Caption> {
    let mut merged: Vec<Caption> = match tier {
        QualityTier::Upgraded => existing
            .iter()
            .filter(|caption| !intersects(caption, window))
            .cloned()
            .collect(),
        QualityTier::Draft => existing.to_vec(),
    };
    merged.extend(incoming);

    // sorting on the full key keeps equal keys adjacent for the dedup scan
    merged.sort_by(|a, b| a.dedup_key().cmp(&b.dedup_key()));
    merged.dedup_by(|next, previous| next.dedup_key() == previous.dedup_key());

    for (index, caption) in merged.iter_mut().enumerate() {
        caption.sequence_index = index as u32 + 1;
    }
    merged
}

/// First caption whose closed interval contains `position`.
pub fn find_active(timeline: &[Caption], position: f64) -> Option<&Caption> {
    timeline.iter().find(|caption| caption.contains(position))
}

/// End of the last caption, 0 for an empty timeline.
pub fn coverage(timeline: &[Caption]) -> f64 {
    timeline
        .iter()
        .map(|caption| caption.end_time)
        .fold(0.0, f64::max)
}
