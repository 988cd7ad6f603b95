use std::path::PathBuf;

use arg::{parse_args, Args};

use grainfield::{EngineHandle, Error, SourceBuffer};

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

// -------------------------------------------------------------------------------------------------

/// Default program arguments for grainfield demo applications.
#[derive(Args, Debug, Default)]
#[allow(unused)]
pub struct Arguments {
    #[arg(short = "i", long = "input")]
    /// Audio file which gets used as grain source. By default a synthesized chord is used.
    pub input_path: Option<PathBuf>,
    #[arg(short = "o", long = "output")]
    /// Write audio output into the given wav file, instead of using the default audio device.
    pub output_path: Option<PathBuf>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    /// By default \"debug\" in dev builds and \"warn\" in release builds.
    pub log_level: Option<log::Level>,
}


/// Parse common demo arguments and apply the log-level arg to the logger
#[allow(unused)]
pub fn parse() -> Arguments {
    let args = parse_args::<Arguments>();

    create_logger(args.log_level);
    args
}

// -------------------------------------------------------------------------------------------------

/// Create default logger from arguments. Invoked from `parse`.
#[allow(unused)]
pub fn create_logger(log_level: Option<log::Level>) {
    simple_logger::SimpleLogger::new()
        // use default or arg level by default
        .with_level(log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        // disable logging in chatty modules
        .with_module_level("symphonia_core", log::LevelFilter::Warn)
        .with_module_level("symphonia_format", log::LevelFilter::Warn)
        .init()
        .expect("Failed to set logger");
}

// -------------------------------------------------------------------------------------------------

/// Load the input file argument as grain source, or a synthesized chord when no file is given.
#[allow(unused)]
pub fn load_source(args: &Arguments, handle: &EngineHandle) -> Result<(), Error> {
    if let Some(input_path) = &args.input_path {
        return handle.load_audio_file(input_path);
    }
    let sample_rate = handle.sample_rate();
    let frame_count = sample_rate as usize * 4;
    let samples = (0..frame_count)
        .map(|frame| {
            let time = frame as f32 / sample_rate as f32;
            let env = 1.0 - frame as f32 / frame_count as f32;
            [220.0, 277.18, 329.63, 440.0]
                .iter()
                .map(|freq| (std::f32::consts::TAU * freq * time).sin() * 0.2)
                .sum::<f32>()
                * env
        })
        .collect::<Vec<_>>();
    handle.load_audio_buffer(SourceBuffer::new(samples, 1, sample_rate)?);
    Ok(())
}
