//! Global engine parameters.

use std::sync::LazyLock;

use four_cc::FourCC;
use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

use crate::{
    parameter::{BooleanParameter, FloatParameter, IntegerParameter, Parameter},
    simulation::{DEFAULT_MAX_PARTICLES, MAX_PARTICLES_LIMIT},
    utils::{db_to_linear, envelope::EnvelopeParameters},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Master gain in dB at or below which the engine is silent.
pub const MIN_MASTER_GAIN_DB: f32 = -60.0;

static GRAIN_SIZE: FloatParameter =
    FloatParameter::new(FourCC(*b"GSIZ"), "Grain Size", 10.0..=500.0, 50.0).with_unit("ms");

static GRAIN_FREQUENCY: FloatParameter =
    FloatParameter::new(FourCC(*b"GFRQ"), "Grain Frequency", 5.0..=50.0, 20.0).with_unit("Hz");

static ATTACK: FloatParameter =
    FloatParameter::new(FourCC(*b"ATCK"), "Attack", 0.0..=2.0, 0.01).with_unit("s");

static DECAY: FloatParameter =
    FloatParameter::new(FourCC(*b"DECY"), "Decay", 0.0..=5.0, 0.3).with_unit("s");

static SUSTAIN: FloatParameter = FloatParameter::new(FourCC(*b"SUST"), "Sustain", 0.0..=1.0, 0.7);

static RELEASE: FloatParameter =
    FloatParameter::new(FourCC(*b"RELS"), "Release", 0.0..=5.0, 0.5).with_unit("s");

static MASTER_GAIN: LazyLock<FloatParameter> = LazyLock::new(|| {
    FloatParameter::new(
        FourCC(*b"GAIN"),
        "Master Gain",
        MIN_MASTER_GAIN_DB..=6.0,
        -6.0,
    )
    .with_unit("dB")
    .with_display(|db| {
        if db <= MIN_MASTER_GAIN_DB {
            "-INF".to_string()
        } else {
            format!("{db:.2}")
        }
    })
});

static GRAVITY: FloatParameter =
    FloatParameter::new(FourCC(*b"GRAV"), "Gravity", 0.0..=1_000_000.0, 100_000.0);

static BOUNCE_MODE: BooleanParameter =
    BooleanParameter::new(FourCC(*b"BNCE"), "Bounce Mode", false);

static MAX_PARTICLES: IntegerParameter = IntegerParameter::new(
    FourCC(*b"MAXP"),
    "Max Particles",
    1..=MAX_PARTICLES_LIMIT as i32,
    DEFAULT_MAX_PARTICLES as i32,
);

// -------------------------------------------------------------------------------------------------

/// All global engine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum EngineParameter {
    #[strum(to_string = "Grain Size")]
    GrainSize,
    #[strum(to_string = "Grain Frequency")]
    GrainFrequency,
    Attack,
    Decay,
    Sustain,
    Release,
    #[strum(to_string = "Master Gain")]
    MasterGain,
    Gravity,
    #[strum(to_string = "Bounce Mode")]
    BounceMode,
    #[strum(to_string = "Max Particles")]
    MaxParticles,
}

impl EngineParameter {
    /// The parameter's descriptor.
    pub fn descriptor(self) -> &'static dyn Parameter {
        match self {
            Self::GrainSize => &GRAIN_SIZE,
            Self::GrainFrequency => &GRAIN_FREQUENCY,
            Self::Attack => &ATTACK,
            Self::Decay => &DECAY,
            Self::Sustain => &SUSTAIN,
            Self::Release => &RELEASE,
            Self::MasterGain => &*MASTER_GAIN,
            Self::Gravity => &GRAVITY,
            Self::BounceMode => &BOUNCE_MODE,
            Self::MaxParticles => &MAX_PARTICLES,
        }
    }

    /// The parameter's unique id.
    pub fn id(self) -> FourCC {
        self.descriptor().id()
    }

    /// Find a parameter by its id.
    pub fn from_id(id: FourCC) -> Result<Self, Error> {
        Self::iter()
            .find(|parameter| parameter.id() == id)
            .ok_or_else(|| Error::ParameterError(format!("Unknown parameter id: {id:?}")))
    }

    /// Descriptors of all engine parameters.
    pub fn descriptors() -> Vec<&'static dyn Parameter> {
        Self::iter().map(Self::descriptor).collect()
    }
}

// -------------------------------------------------------------------------------------------------

/// Plain values of all global engine parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParameters {
    /// Grain window length in milliseconds.
    pub grain_size_ms: f32,
    /// Grain retrigger rate in Hz.
    pub grain_frequency: f32,
    /// Envelope attack time in seconds.
    pub attack_time: f32,
    /// Envelope decay time in seconds.
    pub decay_time: f32,
    /// Linear sustain level in range \[0, 1\].
    pub sustain_level: f32,
    /// Envelope release time in seconds.
    pub release_time: f32,
    pub master_gain_db: f32,
    pub gravity_strength: f32,
    pub bounce_mode: bool,
    pub max_particles: usize,
}

impl Default for EngineParameters {
    fn default() -> Self {
        Self {
            grain_size_ms: GRAIN_SIZE.default_value(),
            grain_frequency: GRAIN_FREQUENCY.default_value(),
            attack_time: ATTACK.default_value(),
            decay_time: DECAY.default_value(),
            sustain_level: SUSTAIN.default_value(),
            release_time: RELEASE.default_value(),
            master_gain_db: MASTER_GAIN.default_value(),
            gravity_strength: GRAVITY.default_value(),
            bounce_mode: BOUNCE_MODE.default_value(),
            max_particles: MAX_PARTICLES.default_value() as usize,
        }
    }
}

impl EngineParameters {
    /// Plain value of the given parameter. Booleans are 0 or 1.
    pub fn value(&self, parameter: EngineParameter) -> f32 {
        match parameter {
            EngineParameter::GrainSize => self.grain_size_ms,
            EngineParameter::GrainFrequency => self.grain_frequency,
            EngineParameter::Attack => self.attack_time,
            EngineParameter::Decay => self.decay_time,
            EngineParameter::Sustain => self.sustain_level,
            EngineParameter::Release => self.release_time,
            EngineParameter::MasterGain => self.master_gain_db,
            EngineParameter::Gravity => self.gravity_strength,
            EngineParameter::BounceMode => self.bounce_mode as u8 as f32,
            EngineParameter::MaxParticles => self.max_particles as f32,
        }
    }

    /// Set a plain parameter value, clamped to the parameter's range. Returns the value
    /// that actually got applied.
    pub fn set_value(&mut self, parameter: EngineParameter, value: f32) -> f32 {
        match parameter {
            EngineParameter::GrainSize => self.grain_size_ms = GRAIN_SIZE.clamp_value(value),
            EngineParameter::GrainFrequency => {
                self.grain_frequency = GRAIN_FREQUENCY.clamp_value(value)
            }
            EngineParameter::Attack => self.attack_time = ATTACK.clamp_value(value),
            EngineParameter::Decay => self.decay_time = DECAY.clamp_value(value),
            EngineParameter::Sustain => self.sustain_level = SUSTAIN.clamp_value(value),
            EngineParameter::Release => self.release_time = RELEASE.clamp_value(value),
            EngineParameter::MasterGain => self.master_gain_db = MASTER_GAIN.clamp_value(value),
            EngineParameter::Gravity => self.gravity_strength = GRAVITY.clamp_value(value),
            EngineParameter::BounceMode => self.bounce_mode = value >= 0.5,
            EngineParameter::MaxParticles => {
                let value = if value.is_finite() {
                    value.round() as i32
                } else {
                    MAX_PARTICLES.default_value()
                };
                self.max_particles = MAX_PARTICLES.clamp_value(value) as usize
            }
        }
        self.value(parameter)
    }

    /// Copy of the parameters with all values clamped to their ranges.
    pub fn sanitized(&self) -> Self {
        let mut sanitized = *self;
        for parameter in EngineParameter::iter() {
            sanitized.set_value(parameter, self.value(parameter));
        }
        sanitized
    }

    /// Envelope parameters for newly spawned particles.
    pub fn envelope_parameters(&self) -> EnvelopeParameters {
        EnvelopeParameters::from_seconds(
            self.attack_time,
            self.decay_time,
            self.sustain_level,
            self.release_time,
        )
    }

    /// Linear master gain. Gains at or below [`MIN_MASTER_GAIN_DB`] are silent.
    pub fn master_gain(&self) -> f32 {
        if self.master_gain_db <= MIN_MASTER_GAIN_DB {
            0.0
        } else {
            db_to_linear(self.master_gain_db)
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_ids() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(EngineParameter::COUNT, 10);
        for parameter in EngineParameter::iter() {
            assert_eq!(EngineParameter::from_id(parameter.id())?, parameter);
            assert_eq!(parameter.descriptor().name(), parameter.to_string());
        }
        assert!(EngineParameter::from_id(FourCC(*b"NONE")).is_err());
        assert_eq!(EngineParameter::GrainSize.id(), FourCC(*b"GSIZ"));
        Ok(())
    }

    #[test]
    fn defaults_match_descriptors() {
        let parameters = EngineParameters::default();
        for parameter in EngineParameter::iter() {
            let descriptor = parameter.descriptor();
            let default = descriptor.denormalize(descriptor.default_normalized_value());
            assert!(
                (parameters.value(parameter) - default).abs() <= 1e-3 * default.abs().max(1.0),
                "{parameter}"
            );
        }
        assert_eq!(parameters.max_particles, 32);
        assert!(!parameters.bounce_mode);
    }

    #[test]
    fn values_are_clamped() {
        let mut parameters = EngineParameters::default();
        assert_eq!(parameters.set_value(EngineParameter::GrainSize, 1.0), 10.0);
        assert_eq!(parameters.set_value(EngineParameter::MaxParticles, 1000.0), 256.0);
        assert_eq!(parameters.set_value(EngineParameter::MaxParticles, 3.4), 3.0);
        assert_eq!(parameters.set_value(EngineParameter::BounceMode, 1.0), 1.0);
        assert!(parameters.bounce_mode);
        // non finite values fall back to the default
        assert_eq!(parameters.set_value(EngineParameter::Attack, f32::NAN), 0.01);

        parameters.master_gain_db = -100.0;
        assert_eq!(parameters.sanitized().master_gain_db, MIN_MASTER_GAIN_DB);
        assert_eq!(parameters.master_gain(), 0.0);
        parameters.master_gain_db = 0.0;
        assert!((parameters.master_gain() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn master_gain_display() {
        let descriptor = EngineParameter::MasterGain.descriptor();
        assert_eq!(descriptor.normalized_value_to_string(0.0, false), "-INF");
        let normalized = descriptor.normalize(-6.0);
        assert_eq!(descriptor.normalized_value_to_string(normalized, true), "-6.00 dB");
    }
}
