#![doc = include_str!("../README.md")]
#![cfg_attr(all(doc, docsrs), feature(doc_auto_cfg))]

// private mods (will be partly re-exported)
mod engine;
mod error;
mod geometry;
mod guard;
mod particle;
mod renderer;
mod router;
mod scene;
mod simulation;
mod source;

// public, flat re-exports
pub use error::Error;

pub use engine::{
    Engine, EngineEvent, EngineHandle, EngineObserver, EngineOptions, EngineParameter,
    EngineParameters, EngineState, MidiEvent, MidiMessage, MIN_MASTER_GAIN_DB,
};

pub use geometry::{Rect, Vector};
pub use guard::{ConcurrencyGuard, ReadGuard};
pub use particle::{Particle, ParticleId, ParticleState};
pub use renderer::{
    GranularRenderer, RenderSettings, EDGE_FADE_WIDTH, LOOP_CROSSFADE_FRAMES,
    VOICE_FADE_OUT_FRAMES,
};
pub use router::{VoiceRouter, SPAWN_MOMENTUM};
pub use scene::{MassPoint, Scene, SpawnPoint};
pub use simulation::{
    ActiveNotes, ParticleSimulation, SpawnResult, DEFAULT_GRAVITY_STRENGTH,
    DEFAULT_MAX_PARTICLES, MAX_PARTICLES_LIMIT,
};
pub use source::{AudioDecoder, SourceBuffer};

#[cfg(any(feature = "cpal-output", feature = "wav-output"))]
pub use output::OutputDevice;

#[cfg(feature = "cpal-output")]
pub use output::{cpal::CpalOutput, AudioHostId};

#[cfg(feature = "wav-output")]
pub use output::wav::WavOutput;

// public mods
pub mod parameter;
pub mod utils;

#[cfg(any(feature = "cpal-output", feature = "wav-output"))]
mod output;
