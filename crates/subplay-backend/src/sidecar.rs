//! SRT caption files stored next to audio tracks.

use std::path::{Path, PathBuf};

use subplay_bridge::caption::Caption;

/// Errors that can occur while reading or writing a sidecar file.
#[derive(Debug, thiserror::Error)]
pub enum SidecarError {
    #[error("failed to access sidecar file: {0}")]
    Io(#[from] std::io::Error),
    /// One block of the file is malformed. Readers skip such blocks.
    #[error("malformed caption block {block}: {reason}")]
    Parse { block: usize, reason: String },
}

/// Derives sidecar paths and reads or writes them.
#[derive(Debug, Clone)]
pub struct SidecarStore {
    extension: String,
}

impl SidecarStore {
    pub fn new(extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Same directory and base name as the track, with the sidecar extension.
    pub fn sidecar_path(&self, audio: &Path) -> PathBuf {
        audio.with_extension(&self.extension)
    }

    pub fn exists(&self, audio: &Path) -> bool {
        self.sidecar_path(audio).is_file()
    }

    /// Reads the captions stored for `audio`, skipping malformed blocks.
    pub fn read(&self, audio: &Path) -> Result<Vec<Caption>, SidecarError> {
        let bytes = std::fs::read(self.sidecar_path(audio))?;
        let contents = String::from_utf8_lossy(&bytes);

        let mut captions = Vec::new();
        for result in parse_srt(&contents) {
            match result {
                Ok(caption) => captions.push(caption),
                Err(e) => log::warn!("Skipping caption in {audio:?}: {e}"),
            }
        }
        Ok(captions)
    }

    pub fn write(&self, audio: &Path, captions: &[Caption]) -> Result<(), SidecarError> {
        let path = self.sidecar_path(audio);
        std::fs::write(&path, format_srt(captions))?;
        log::info!("Saved {} captions to {path:?}", captions.len());
        Ok(())
    }
}

/// Parses SRT blocks, yielding one result per block.
pub fn parse_srt(contents: &str) -> Vec<Result<Caption, SidecarError>> {
    let contents = contents.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    contents
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .enumerate()
        .map(|(index, block)| parse_block(index + 1, block))
        .collect()
}

fn parse_block(block_number: usize, block: &str) -> Result<Caption, SidecarError> {
    let error = |reason: &str| SidecarError::Parse {
        block: block_number,
        reason: reason.to_string(),
    };

    let mut lines = block.lines();
    let mut timing = lines.next().ok_or_else(|| error("empty block"))?;
    // the counter line is optional
    if !timing.contains("-->") {
        timing = lines.next().ok_or_else(|| error("missing timing line"))?;
    }

    let (start, end) = timing
        .split_once("-->")
        .ok_or_else(|| error("missing `-->` in timing line"))?;
    let start = parse_timestamp(start).ok_or_else(|| error("invalid start timestamp"))?;
    let end = parse_timestamp(end).ok_or_else(|| error("invalid end timestamp"))?;
    if end < start {
        return Err(error("caption ends before it starts"));
    }

    let text = lines.collect::<Vec<_>>().join("\n");
    let text = text.trim();
    if text.is_empty() {
        return Err(error("empty caption text"));
    }

    Ok(Caption {
        sequence_index: block_number as u32,
        start_time: start,
        end_time: end,
        text: text.to_string(),
    })
}

/// Parses `HH:MM:SS,mmm` (a `.` separator is accepted too) into seconds.
pub fn parse_timestamp(timestamp: &str) -> Option<f64> {
    let timestamp = timestamp.trim();
    let (clock, millis) = timestamp
        .split_once(',')
        .or_else(|| timestamp.split_once('.'))
        .unwrap_or((timestamp, "0"));

    let mut parts = clock.split(':');
    let hours: u64 = parts.next()?.trim().parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    let millis: u64 = millis.parse().ok()?;
    if millis >= 1000 {
        return None;
    }

    Some((hours * 3600 + minutes * 60 + seconds) as f64 + millis as f64 / 1000.0)
}

/// Formats seconds as `HH:MM:SS,mmm`.
pub fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let (hours, rest) = (total_millis / 3_600_000, total_millis % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (secs, millis) = (rest / 1000, rest % 1000);
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

pub fn format_srt(captions: &[Caption]) -> String {
    let mut output = String::new();
    for (index, caption) in captions.iter().enumerate() {
        output.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_timestamp(caption.start_time),
            format_timestamp(caption.end_time),
            caption.text
        ));
    }
    output
}
