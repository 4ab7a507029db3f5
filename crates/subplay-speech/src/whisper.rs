use std::time::Instant;

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::{CaptionSegment, DecodeOptions, ModelTier, TARGET_RATE, TranscribeError, Transcriber};

/// Windows quieter than this (in dBFS) are reported as silence without running
/// the model.
const SILENCE_THRESHOLD_DB: f32 = -60.0;

/// Where the model should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// Try the accelerator first and fall back to the CPU when it cannot be
    /// initialized.
    PreferAccelerator,
    Cpu,
}

fn calculate_samples_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn load_context(path: &str, use_gpu: bool) -> Result<WhisperContext, TranscribeError> {
    let mut context_params = WhisperContextParameters::default();
    context_params.use_gpu(use_gpu);
    WhisperContext::new_with_params(path, context_params).map_err(|e| TranscribeError::Model {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Loads a model on the requested device, retrying on the CPU when the
/// accelerator cannot be used. Returns the context and whether it runs on the
/// accelerator.
fn load_with_fallback(path: &str, device: Device) -> Result<(WhisperContext, bool), TranscribeError> {
    if device == Device::Cpu {
        return Ok((load_context(path, false)?, false));
    }

    match load_context(path, true) {
        Ok(context) => Ok((context, true)),
        Err(e) => {
            log::warn!("Accelerator unavailable for {path} ({e}); falling back to CPU");
            Ok((load_context(path, false)?, false))
        }
    }
}

/// Whisper-backed recognizer for bounded audio windows.
///
/// Holds one context for the fast tier and, optionally, a second one for the
/// accurate tier. Requests for the accurate tier run on the fast model when no
/// dedicated model was configured.
pub struct WhisperTranscriber {
    fast: WhisperContext,
    accurate: Option<WhisperContext>,
    /// Temporary buffer used when a window has to be padded.
    scratch_buffer: Vec<f32>,
    n_threads: i32,
    accelerated: bool,
}

impl WhisperTranscriber {
    pub fn new(
        fast_model_path: &str,
        accurate_model_path: Option<&str>,
        device: Device,
    ) -> Result<Self, TranscribeError> {
        whisper_rs::install_logging_hooks();

        let (fast, accelerated) = load_with_fallback(fast_model_path, device)?;
        // keep both models on the same device as the fast one
        let accurate_device = if accelerated { device } else { Device::Cpu };
        let accurate = match accurate_model_path {
            Some(path) if path != fast_model_path => Some(load_with_fallback(path, accurate_device)?.0),
            _ => None,
        };

        log::info!(
            "Loaded Whisper model {fast_model_path} (accurate: {accurate_model_path:?}) on {}",
            if accelerated { "accelerator" } else { "CPU" }
        );

        Ok(Self {
            fast,
            accurate,
            scratch_buffer: Vec::with_capacity(TARGET_RATE as usize),
            n_threads: num_threads(),
            accelerated,
        })
    }

    /// Whether inference runs on the accelerator.
    pub fn is_accelerated(&self) -> bool {
        self.accelerated
    }

    fn build_request_params<'a>(&self, options: &'a DecodeOptions) -> FullParams<'a, 'a> {
        let strategy = if options.beam_size > 1 {
            SamplingStrategy::BeamSearch {
                beam_size: options.beam_size as i32,
                patience: -1.0,
            }
        } else {
            SamplingStrategy::Greedy {
                best_of: options.best_of.max(1) as i32,
            }
        };

        let mut params = FullParams::new(strategy);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_special(false);
        params.set_print_timestamps(false);
        params.set_debug_mode(false);

        params.set_n_threads(self.n_threads);
        params.set_no_timestamps(false);
        params.set_token_timestamps(false);
        params.set_single_segment(false);
        params.set_suppress_nst(true);
        params.set_offset_ms(0);
        params.set_language(options.language.as_deref());

        params
    }
}

fn num_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|count| count.get().min(8) as i32)
        .unwrap_or(4)
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(
        &mut self,
        samples: &[f32],
        tier: ModelTier,
        options: &DecodeOptions,
    ) -> Result<Vec<CaptionSegment>, TranscribeError> {
        let rms = calculate_samples_rms(samples);
        if rms == 0.0 || (20.0 * rms.log10()) <= SILENCE_THRESHOLD_DB {
            return Ok(Vec::new());
        }

        // whisper rejects inputs shorter than a second, pad them with silence
        let min_samples = TARGET_RATE as usize;
        let mut padded = std::mem::take(&mut self.scratch_buffer);
        let audio: &[f32] = if samples.len() >= min_samples {
            samples
        } else {
            padded.clear();
            padded.extend_from_slice(samples);
            padded.resize(min_samples, 0.0);
            &padded
        };

        let start = Instant::now();
        let params = self.build_request_params(options);
        let context = match tier {
            ModelTier::Accurate => self.accurate.as_ref().unwrap_or(&self.fast),
            ModelTier::Fast => &self.fast,
        };

        let result = (|| {
            let mut state = context
                .create_state()
                .map_err(|e| TranscribeError::Inference(e.to_string()))?;
            state
                .full(params, audio)
                .map_err(|e| TranscribeError::Inference(e.to_string()))?;

            let mut segments = Vec::new();
            for segment in state.as_iter() {
                let text = segment.to_str_lossy().unwrap_or_default();
                if crate::is_non_speech(&text) {
                    continue;
                }

                // timestamps are reported in centiseconds
                segments.push(CaptionSegment {
                    start_milliseconds: segment.start_timestamp() * 10,
                    end_milliseconds: segment.end_timestamp() * 10,
                    text: text.trim().to_string(),
                });
            }
            Ok(segments)
        })();

        self.scratch_buffer = padded;
        log::debug!(
            "Whisper {tier:?} pass over {} samples took {}ms",
            samples.len(),
            start.elapsed().as_millis()
        );
        result
    }
}
