//! Cutting bounded mono 16 kHz windows out of audio tracks.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::NamedTempFile;

/// Sample rate the extracted windows are decoded to.
pub const EXTRACT_RATE: u32 = 16_000;

/// Errors that can occur while extracting an audio window.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to create temporary file: {0}")]
    TempFile(#[source] std::io::Error),
    /// The transcoding tool could not be started.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    /// The transcoding tool exited with a failure status.
    #[error("{tool} exited with {status}: {stderr}")]
    Tool {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    /// The produced file could not be read back.
    #[error("failed to read extracted audio: {0}")]
    Wav(#[from] hound::Error),
}

/// A decoded audio window. The temporary file backing it, if any, is removed
/// when the window is dropped.
#[derive(Debug)]
pub struct ExtractedWindow {
    samples: Vec<f32>,
    file: Option<NamedTempFile>,
}

impl ExtractedWindow {
    /// Builds a window from samples that already live in memory.
    pub fn from_samples(samples: Vec<f32>) -> Self {
        Self {
            samples,
            file: None,
        }
    }

    /// Mono samples at [`EXTRACT_RATE`].
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Path of the backing temporary file, if the window has one.
    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_ref().map(|file| file.path())
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / EXTRACT_RATE as f64
    }
}

/// Produces decoded audio windows for the recognizer.
pub trait AudioExtractor: Send {
    /// Decodes `[start_second, start_second + length_seconds)` of `source`.
    fn extract(
        &self,
        source: &Path,
        start_second: u32,
        length_seconds: u32,
    ) -> Result<ExtractedWindow, ExtractError>;
}

/// Extractor that shells out to `ffmpeg` and reads the produced WAV file.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg: PathBuf,
}

impl FfmpegExtractor {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl AudioExtractor for FfmpegExtractor {
    fn extract(
        &self,
        source: &Path,
        start_second: u32,
        length_seconds: u32,
    ) -> Result<ExtractedWindow, ExtractError> {
        // dropping the handle on any early return deletes the file
        let file = tempfile::Builder::new()
            .prefix("subplay-chunk-")
            .suffix(".wav")
            .tempfile()
            .map_err(ExtractError::TempFile)?;

        let tool = self.ffmpeg.display().to_string();
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-ss", &start_second.to_string()])
            .args(["-t", &length_seconds.to_string()])
            .arg("-i")
            .arg(source)
            .args(["-vn", "-ac", "1", "-ar", &EXTRACT_RATE.to_string(), "-f", "wav"])
            .arg(file.path())
            .output()
            .map_err(|source| ExtractError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExtractError::Tool {
                tool,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let samples = read_wav_mono(file.path())?;
        log::trace!(
            "Extracted {} samples from {source:?} at {start_second}s into {:?}",
            samples.len(),
            file.path()
        );

        Ok(ExtractedWindow {
            samples,
            file: Some(file),
        })
    }
}

/// Reads a WAV file into mono `f32` samples, mixing down extra channels.
pub fn read_wav_mono(path: &Path) -> Result<Vec<f32>, ExtractError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(crate::mixer::mix_to_mono(&interleaved, spec.channels as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: EXTRACT_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn reads_stereo_wav_as_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[16384, 16384, -16384, 0]);

        let samples = read_wav_mono(&path).unwrap();
        assert_eq!(samples, vec![0.5, -0.25]);
    }

    #[test]
    fn missing_tool_fails_without_leaving_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("song.mp3");
        std::fs::write(&source, b"").unwrap();

        let extractor = FfmpegExtractor::new(dir.path().join("no-such-ffmpeg"));
        let result = extractor.extract(&source, 0, 20);
        assert!(matches!(result, Err(ExtractError::Spawn { .. })));

        let leftovers = std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.starts_with("subplay-chunk-") && entry.path().exists()
            })
            .count();
        // other tests may run in parallel, but none of them creates chunk files
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn in_memory_window_has_no_backing_file() {
        let window = ExtractedWindow::from_samples(vec![0.0; EXTRACT_RATE as usize * 2]);
        assert!(window.file_path().is_none());
        assert_eq!(window.duration_seconds(), 2.0);
    }
}
