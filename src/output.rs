//! Audio outputs which drive an [`Engine`](crate::Engine).

#[cfg(all(target_arch = "wasm32", feature = "cpal-output"))]
compile_error!("wasm builds are not compatible with cpal. disable the cpal-output feature");

#[cfg(feature = "cpal-output")]
pub mod cpal;
#[cfg(feature = "wav-output")]
pub mod wav;

// -------------------------------------------------------------------------------------------------

/// Available audio hosts for cpal output (platform specific)
#[cfg(feature = "cpal-output")]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AudioHostId {
    #[default]
    Default, // system default
    #[cfg(target_os = "windows")]
    Asio,
    #[cfg(target_os = "windows")]
    Wasapi,
    #[cfg(target_os = "linux")]
    Alsa,
    #[cfg(target_os = "linux")]
    Jack,
}

// -------------------------------------------------------------------------------------------------

/// An audio output which pulls audio blocks from an engine.
pub trait OutputDevice {
    /// Actual output channel count.
    fn channel_count(&self) -> usize;
    /// Actual output sample rate.
    fn sample_rate(&self) -> u32;
    /// Output playhead position in **frames**.
    fn frame_position(&self) -> u64;

    /// Stop processing and release the device or file.
    fn close(&mut self) -> Result<(), crate::Error>;
}
