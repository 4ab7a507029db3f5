/// Mixes interleaved multi-channel audio down to mono.
///
/// Each output sample is the average of the channels of one frame. The input
/// slice must contain interleaved samples in the form `[L0, R0, L1, R1, ...]`
/// for stereo; trailing samples that do not make up a whole frame are ignored.
///
/// # Returns
/// The mono samples, one per frame.
pub fn mix_to_mono<T>(interleaved: &[T], channels: usize) -> Vec<T>
where
    T: Copy
        + num_traits::identities::Zero
        + num_traits::FromPrimitive
        + std::ops::Add<Output = T>
        + std::ops::Mul<Output = T>,
{
    if channels <= 1 {
        return interleaved.to_vec();
    }

    let scale = T::from_f32(1.0 / channels as f32).unwrap_or_else(T::zero);
    interleaved
        .chunks_exact(channels)
        .map(|frame| {
            let sum = frame.iter().fold(T::zero(), |acc, &sample| acc + sample);
            sum * scale
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_frames_are_averaged() {
        let mono = mix_to_mono(&[1.0f32, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn mono_input_is_returned_unchanged() {
        let mono = mix_to_mono(&[0.25f32, -0.25], 1);
        assert_eq!(mono, vec![0.25, -0.25]);
    }

    #[test]
    fn partial_trailing_frame_is_dropped() {
        let mono = mix_to_mono(&[1.0f32, 1.0, 0.3], 2);
        assert_eq!(mono, vec![1.0]);
    }
}
