use std::{fs::File, io::BufWriter, path::Path, time::Duration};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::{
    engine::{Engine, MidiEvent},
    error::Error,
    output::OutputDevice,
};

// -------------------------------------------------------------------------------------------------

const DEFAULT_BLOCK_SIZE: usize = 512;

// -------------------------------------------------------------------------------------------------

/// Offline output, which renders an [`Engine`] into a wav file as fast as possible.
///
/// Wav file contents are always saved as 32bit floats.
pub struct WavOutput {
    writer: Option<WavWriter<BufWriter<File>>>,
    channel_count: usize,
    sample_rate: u32,
    block_size: usize,
    buffer: Vec<f32>,
    frame_position: u64,
}

impl WavOutput {
    /// Create a new wav file at the given path with the given specs.
    ///
    /// * `file_path`: Target file path. Should end with ".wav" extension.
    /// * `sample_rate`: The engine's and wav file's sample rate.
    /// * `channel_count`: The wav file's channel layout.
    pub fn create<P: AsRef<Path>>(
        file_path: P,
        sample_rate: u32,
        channel_count: usize,
    ) -> Result<Self, Error> {
        if channel_count == 0 || channel_count > u16::MAX as usize {
            return Err(Error::ParameterError(format!(
                "invalid wav output channel count: {channel_count}"
            )));
        }
        let spec = WavSpec {
            channels: channel_count as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(file_path, spec)
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
        Ok(Self {
            writer: Some(writer),
            channel_count,
            sample_rate,
            block_size: DEFAULT_BLOCK_SIZE,
            buffer: vec![0.0; DEFAULT_BLOCK_SIZE * channel_count],
            frame_position: 0,
        })
    }

    /// Use the given block size, in frames, for further renders.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self.buffer = vec![0.0; self.block_size * self.channel_count];
        self
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Render a single block with the given MIDI events and write it to the file.
    pub fn render_block(
        &mut self,
        engine: &mut Engine,
        midi_events: &[MidiEvent],
    ) -> Result<(), Error> {
        let frame_count = self.block_size;
        self.render_frames(engine, frame_count, midi_events)
    }

    /// Render the given duration of audio and write it to the file.
    pub fn render(&mut self, engine: &mut Engine, duration: Duration) -> Result<(), Error> {
        let mut remaining = (duration.as_secs_f64() * self.sample_rate as f64).round() as usize;
        while remaining > 0 {
            let frame_count = remaining.min(self.block_size);
            self.render_frames(engine, frame_count, &[])?;
            remaining -= frame_count;
        }
        Ok(())
    }

    fn render_frames(
        &mut self,
        engine: &mut Engine,
        frame_count: usize,
        midi_events: &[MidiEvent],
    ) -> Result<(), Error> {
        if engine.sample_rate() != self.sample_rate {
            return Err(Error::ParameterError(format!(
                "engine sample rate {} does not match the wav file's sample rate {}",
                engine.sample_rate(),
                self.sample_rate
            )));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::SendError("wav output is closed".to_string()))?;
        let output = &mut self.buffer[..frame_count * self.channel_count];
        engine.process(output, self.channel_count, midi_events);
        for sample in output.iter() {
            writer
                .write_sample(*sample)
                .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
        }
        self.frame_position += frame_count as u64;
        Ok(())
    }
}

impl OutputDevice for WavOutput {
    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_position(&self) -> u64 {
        self.frame_position
    }

    /// Finalize the wav file. Further renders will fail.
    fn close(&mut self) -> Result<(), Error> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
        }
        Ok(())
    }
}

impl Drop for WavOutput {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("Failed to finalize WAV file: {err}");
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{EngineOptions, MidiMessage},
        source::SourceBuffer,
    };

    #[test]
    fn render_into_file() -> Result<(), Box<dyn std::error::Error>> {
        let sample_rate = 22050;
        let (mut engine, handle) = Engine::new(EngineOptions::new().sample_rate(sample_rate))?;
        let samples = (0..sample_rate as usize)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect::<Vec<_>>();
        handle.load_audio_buffer(SourceBuffer::new(samples, 1, sample_rate)?);

        let path = std::env::temp_dir().join("grainfield-wav-output-test.wav");
        let mut output = WavOutput::create(&path, sample_rate, 2)?.with_block_size(256);
        output.render_block(
            &mut engine,
            &[MidiEvent::new(
                0,
                MidiMessage::NoteOn {
                    note: 60,
                    velocity: 1.0,
                    pitch_ratio: None,
                },
            )],
        )?;
        output.render(&mut engine, Duration::from_millis(500))?;
        let frames = output.frame_position();
        output.close()?;
        assert!(output.render_block(&mut engine, &[]).is_err());

        let reader = hound::WavReader::open(&path)?;
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, sample_rate);
        assert_eq!(reader.duration() as u64, frames);
        let samples = reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?;
        let _ = std::fs::remove_file(&path);
        assert!(samples.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
        assert!(samples.iter().any(|s| *s != 0.0));
        Ok(())
    }
}
