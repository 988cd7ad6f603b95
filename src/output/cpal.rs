use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::{
    engine::Engine,
    error::Error,
    output::{AudioHostId, OutputDevice},
};

// -------------------------------------------------------------------------------------------------

const PREFERRED_SAMPLE_FORMAT: cpal::SampleFormat = cpal::SampleFormat::F32;
const PREFERRED_SAMPLE_RATE: cpal::SampleRate = cpal::SampleRate(44100);
const PREFERRED_CHANNELS: cpal::ChannelCount = 2;
const PREFERRED_BUFFER_SIZE: cpal::BufferSize = if cfg!(debug_assertions) {
    cpal::BufferSize::Default
} else {
    cpal::BufferSize::Fixed(512)
};

// -------------------------------------------------------------------------------------------------

/// Real-time audio output via cpal, which runs an [`Engine`] in the device's audio callback.
///
/// Open the device first, create an engine with the device's sample rate and then move the
/// engine into the output with [`CpalOutput::start`].
pub struct CpalOutput {
    device: cpal::Device,
    config: cpal::StreamConfig,
    stream: Option<cpal::Stream>,
    frame_position: Arc<AtomicU64>,
}

impl CpalOutput {
    pub fn open() -> Result<Self, Error> {
        Self::open_with_host(AudioHostId::Default)
    }

    pub fn open_with_host(host_id: AudioHostId) -> Result<Self, Error> {
        let host = match host_id {
            AudioHostId::Default => cpal::default_host(),
            #[cfg(target_os = "windows")]
            AudioHostId::Asio => cpal::host_from_id(cpal::HostId::Asio)
                .map_err(|err| Error::OutputDeviceError(Box::new(err)))?,
            #[cfg(target_os = "windows")]
            AudioHostId::Wasapi => cpal::host_from_id(cpal::HostId::Wasapi)
                .map_err(|err| Error::OutputDeviceError(Box::new(err)))?,
            #[cfg(target_os = "linux")]
            AudioHostId::Alsa => cpal::host_from_id(cpal::HostId::Alsa)
                .map_err(|err| Error::OutputDeviceError(Box::new(err)))?,
            #[cfg(target_os = "linux")]
            AudioHostId::Jack => cpal::host_from_id(cpal::HostId::Jack)
                .map_err(|err| Error::OutputDeviceError(Box::new(err)))?,
        };

        // Open the default output device.
        let device = host
            .default_output_device()
            .ok_or(cpal::DefaultStreamConfigError::DeviceNotAvailable)?;

        if let Ok(name) = device.name() {
            log::info!("using audio device: {}", name);
        }

        let supported = Self::preferred_output_config(&device)?;
        if supported.sample_format() != PREFERRED_SAMPLE_FORMAT {
            return Err(Error::OutputDeviceError(
                format!(
                    "unsupported output sample format: {:?}",
                    supported.sample_format()
                )
                .into(),
            ));
        }
        let config = cpal::StreamConfig {
            buffer_size: PREFERRED_BUFFER_SIZE,
            ..supported.config()
        };

        Ok(Self {
            device,
            config,
            stream: None,
            frame_position: Arc::new(AtomicU64::new(0)),
        })
    }

    fn preferred_output_config(
        device: &cpal::Device,
    ) -> Result<cpal::SupportedStreamConfig, Error> {
        for s in device.supported_output_configs()? {
            let rates = s.min_sample_rate()..=s.max_sample_rate();
            if s.channels() == PREFERRED_CHANNELS
                && s.sample_format() == PREFERRED_SAMPLE_FORMAT
                && rates.contains(&PREFERRED_SAMPLE_RATE)
            {
                return Ok(s.with_sample_rate(PREFERRED_SAMPLE_RATE));
            }
        }

        Ok(device.default_output_config()?)
    }

    /// Start running the given engine in the audio callback. Replaces a previously started
    /// engine. The engine must use the output's sample rate.
    pub fn start(&mut self, mut engine: Engine) -> Result<(), Error> {
        if engine.sample_rate() != self.sample_rate() {
            return Err(Error::ParameterError(format!(
                "engine sample rate {} does not match the output sample rate {}",
                engine.sample_rate(),
                self.sample_rate()
            )));
        }
        self.stop();

        let channel_count = self.channel_count();
        let frame_position = Arc::clone(&self.frame_position);
        log::info!("opening output stream: {:?}", self.config);
        let stream = self.device.build_output_stream(
            &self.config,
            move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                engine.process(output, channel_count, &[]);
                frame_position.fetch_add((output.len() / channel_count) as u64, Ordering::Relaxed);
            },
            |err| {
                log::error!("audio output error: {}", err);
            },
            None,
        )?;
        stream.play()?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Stop and drop the running engine, if any.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            log::debug!("closing audio output stream");
            if let Err(err) = stream.pause() {
                log::error!("failed to stop stream: {}", err);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }
}

impl OutputDevice for CpalOutput {
    fn channel_count(&self) -> usize {
        self.config.channels as usize
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn frame_position(&self) -> u64 {
        self.frame_position.load(Ordering::Relaxed)
    }

    fn close(&mut self) -> Result<(), Error> {
        self.stop();
        Ok(())
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

// -------------------------------------------------------------------------------------------------

impl From<cpal::DefaultStreamConfigError> for Error {
    fn from(err: cpal::DefaultStreamConfigError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::SupportedStreamConfigsError> for Error {
    fn from(err: cpal::SupportedStreamConfigsError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::BuildStreamError> for Error {
    fn from(err: cpal::BuildStreamError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::PlayStreamError> for Error {
    fn from(err: cpal::PlayStreamError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}
