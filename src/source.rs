//! Decoded audio file buffers, which particles read their grains from.

use std::path::Path;

use symphonia::core::audio::SampleBuffer;

use crate::Error;

mod decoder;
pub use decoder::AudioDecoder;

// -------------------------------------------------------------------------------------------------

/// An immutable, fully decoded audio file: interleaved f32 samples plus signal specs.
///
/// Buffers get constructed in the control thread and then are handed over to the audio thread
/// as a whole, so the audio thread never sees partially loaded buffers.
#[derive(Clone, PartialEq)]
pub struct SourceBuffer {
    samples: Box<[f32]>,
    channel_count: usize,
    sample_rate: u32,
}

impl std::fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("frames", &self.frame_count())
            .field("channel_count", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl SourceBuffer {
    /// Create a new buffer from the given interleaved samples.
    pub fn new(samples: Vec<f32>, channel_count: usize, sample_rate: u32) -> Result<Self, Error> {
        if channel_count == 0 {
            return Err(Error::ParameterError(
                "Source buffer channel count must be > 0".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(Error::ParameterError(
                "Source buffer sample rate must be > 0".to_string(),
            ));
        }
        if samples.len() % channel_count != 0 {
            return Err(Error::ParameterError(format!(
                "Source buffer sample count {} is not a multiple of the channel count {}",
                samples.len(),
                channel_count
            )));
        }
        Ok(Self {
            samples: samples.into_boxed_slice(),
            channel_count,
            sample_rate,
        })
    }

    /// Create a new buffer with the given number of silent frames.
    pub fn silence(frame_count: usize, channel_count: usize, sample_rate: u32) -> Result<Self, Error> {
        Self::new(
            vec![0.0; frame_count * channel_count.max(1)],
            channel_count,
            sample_rate,
        )
    }

    /// Decode the entire audio file at the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::decode(AudioDecoder::from_file(path)?)
    }

    /// Decode the entire, encoded audio file buffer.
    pub fn from_encoded(buffer: Vec<u8>) -> Result<Self, Error> {
        Self::decode(AudioDecoder::from_buffer(buffer)?)
    }

    fn decode(mut audio_decoder: AudioDecoder) -> Result<Self, Error> {
        let signal_spec = audio_decoder.signal_spec()?;
        let channel_count = signal_spec.channels.count();

        // prealloc entire buffer, when the decoder gives us a frame hint
        let buffer_capacity =
            audio_decoder.codec_params().n_frames.unwrap_or(0) as usize * channel_count;
        let mut samples = Vec::with_capacity(buffer_capacity);

        // decode the entire file into our buffer in chunks of max_frames_per_packet sizes
        let decode_buffer_capacity = audio_decoder
            .codec_params()
            .max_frames_per_packet
            .unwrap_or(16 * 1024);
        let mut decode_buffer = SampleBuffer::<f32>::new(decode_buffer_capacity, signal_spec);

        while audio_decoder.read_packet(&mut decode_buffer).is_some() {
            samples.extend_from_slice(decode_buffer.samples());
        }
        if samples.is_empty() {
            return Err(Error::AudioDecodingError(
                "Audio file does not contain any samples".into(),
            ));
        }
        Self::new(samples, channel_count, signal_spec.rate)
    }

    /// Interleaved sample data.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of sample frames.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channel_count
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mono downmix of the frame at the given index. The index is clamped to the buffer.
    #[inline]
    pub fn mono_frame(&self, index: usize) -> f32 {
        let frame_count = self.frame_count();
        if frame_count == 0 {
            return 0.0;
        }
        let start = index.min(frame_count - 1) * self.channel_count;
        let frame = &self.samples[start..start + self.channel_count];
        match self.channel_count {
            1 => frame[0],
            2 => (frame[0] + frame[1]) * 0.5,
            _ => frame.iter().sum::<f32>() / self.channel_count as f32,
        }
    }

    /// Linear interpolated mono downmix at the given fractional frame position. Positions
    /// outside of the buffer are clamped.
    #[inline]
    pub fn interpolated_frame(&self, position: f64) -> f32 {
        let frame_count = self.frame_count();
        if frame_count == 0 {
            return 0.0;
        }
        let position = if position.is_finite() {
            position.clamp(0.0, (frame_count - 1) as f64)
        } else {
            0.0
        };
        let index = position as usize;
        let fraction = (position - index as f64) as f32;
        let current = self.mono_frame(index);
        if fraction > 0.0 {
            let next = self.mono_frame(index + 1);
            current + (next - current) * fraction
        } else {
            current
        }
    }
}

// -------------------------------------------------------------------------------------------------
