use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::engine::{EngineError, PlaybackEngine, check_track};

/// Engine rendering to the system's default output device.
///
/// The output stream must stay on the thread that created it, so the engine is
/// built and driven from the backend thread only.
pub struct RodioEngine {
    stream: OutputStream,
    sink: Option<Sink>,
    /// Decoded track waiting for `play`.
    pending: Option<Decoder<BufReader<File>>>,
    supported_extensions: Vec<String>,
    ffprobe: PathBuf,
    duration: f64,
    volume: f32,
    finished_reported: bool,
}

impl RodioEngine {
    pub fn open_default(
        supported_extensions: Vec<String>,
        ffprobe: impl Into<PathBuf>,
    ) -> Result<Self, EngineError> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| EngineError::Output(e.to_string()))?;
        Ok(Self {
            stream,
            sink: None,
            pending: None,
            supported_extensions,
            ffprobe: ffprobe.into(),
            duration: 0.0,
            volume: 1.0,
            finished_reported: false,
        })
    }
}

impl PlaybackEngine for RodioEngine {
    fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        check_track(path, &self.supported_extensions)?;

        let decode_error = |reason: String| EngineError::Decode {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| decode_error(e.to_string()))?;
        let decoder = Decoder::try_from(file).map_err(|e| decode_error(e.to_string()))?;

        // some containers do not report a length up front
        let duration = match decoder.total_duration() {
            Some(duration) => duration.as_secs_f64(),
            None => crate::probe::probe_duration(&self.ffprobe, path).unwrap_or_else(|e| {
                log::warn!("Could not read the duration of {path:?}: {e}");
                0.0
            }),
        };

        self.stop();
        self.pending = Some(decoder);
        self.duration = duration;
        Ok(())
    }

    fn play(&mut self) {
        let Some(decoder) = self.pending.take() else {
            return;
        };
        let sink = Sink::connect_new(self.stream.mixer());
        sink.set_volume(self.volume);
        sink.append(decoder);
        sink.play();
        self.sink = Some(sink);
        self.finished_reported = false;
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn position(&self) -> f64 {
        self.sink
            .as_ref()
            .map(|sink| sink.get_pos().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_busy(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| !sink.empty() && !sink.is_paused())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn take_finished(&mut self) -> bool {
        let finished = self.sink.as_ref().is_some_and(|sink| sink.empty());
        if finished && !self.finished_reported {
            self.finished_reported = true;
            return true;
        }
        false
    }
}
