//! Time based ADSR envelope with curved attack, decay and release stages.

use std::time::Duration;

use crate::{utils::db_to_linear, Error};

// -------------------------------------------------------------------------------------------------

/// Current processing stage of an [`Envelope`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePhase {
    #[default]
    Attack,
    Decay,
    Sustain,
    Release,
    /// After release (zero volume). Finished envelopes never restart.
    Finished,
}

// -------------------------------------------------------------------------------------------------

/// ADSR envelope parameters, captured by each particle when it gets spawned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeParameters {
    attack_time: f32,
    decay_time: f32,
    sustain_level: f32,
    sustain_level_linear: f32,
    release_time: f32,
}

impl Default for EnvelopeParameters {
    fn default() -> Self {
        Self::from_seconds(0.01, 0.3, 0.7, 0.5)
    }
}

impl EnvelopeParameters {
    /// Create new envelope parameters from the given durations and a linear sustain level in
    /// range \[0, 1\].
    pub fn new(
        attack_time: Duration,
        decay_time: Duration,
        sustain_level: f32,
        release_time: Duration,
    ) -> Result<Self, Error> {
        let mut parameters = Self::default();
        parameters.set_attack_time(attack_time)?;
        parameters.set_decay_time(decay_time)?;
        parameters.set_sustain_level(sustain_level)?;
        parameters.set_release_time(release_time)?;
        Ok(parameters)
    }

    /// Create new parameters from plain seconds values, clamping all values into valid ranges.
    /// Used when applying automated, already range checked parameter values.
    pub fn from_seconds(attack: f32, decay: f32, sustain_linear: f32, release: f32) -> Self {
        let sanitize = |value: f32| if value.is_finite() { value.max(0.0) } else { 0.0 };
        let sustain_level_linear = if sustain_linear.is_finite() {
            sustain_linear.clamp(0.0, 1.0)
        } else {
            1.0
        };
        Self {
            attack_time: sanitize(attack),
            decay_time: sanitize(decay),
            sustain_level: Self::sustain_gain(sustain_level_linear),
            sustain_level_linear,
            release_time: sanitize(release),
        }
    }

    /// Perceptual gain of a linear sustain slider value: the slider's range covers 60 dB.
    pub fn sustain_gain(sustain_level_linear: f32) -> f32 {
        if sustain_level_linear < 0.001 {
            0.0
        } else {
            db_to_linear((sustain_level_linear - 1.0) * 60.0)
        }
    }

    /// Attack time in seconds.
    pub fn attack_time(&self) -> f32 {
        self.attack_time
    }
    /// Set the attack time. Attack can be zero to skip the attack phase.
    pub fn set_attack_time(&mut self, time: Duration) -> Result<(), Error> {
        self.attack_time = time.as_secs_f32();
        Ok(())
    }

    /// Decay time in seconds.
    pub fn decay_time(&self) -> f32 {
        self.decay_time
    }
    /// Set the decay time. Decay can be zero to jump straight into the sustain phase.
    pub fn set_decay_time(&mut self, time: Duration) -> Result<(), Error> {
        self.decay_time = time.as_secs_f32();
        Ok(())
    }

    /// The sustain level as perceptual (dB mapped) gain.
    pub fn sustain_level(&self) -> f32 {
        self.sustain_level
    }
    /// The linear sustain level, which the envelope's decay phase falls to.
    pub fn sustain_level_linear(&self) -> f32 {
        self.sustain_level_linear
    }
    /// Set the linear sustain level.
    pub fn set_sustain_level(&mut self, level: f32) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&level) {
            return Err(Error::ParameterError(format!(
                "Invalid sustain level: {}. Must be in range [0.0, 1.0]",
                level
            )));
        }
        self.sustain_level_linear = level;
        self.sustain_level = Self::sustain_gain(level);
        Ok(())
    }

    /// Release time in seconds.
    pub fn release_time(&self) -> f32 {
        self.release_time
    }
    /// Set the release time. Release can be zero to finish right after note-off.
    pub fn set_release_time(&mut self, time: Duration) -> Result<(), Error> {
        self.release_time = time.as_secs_f32();
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// Per particle ADSR envelope state, advanced in audio blocks.
///
/// - Attack rises quadratically: `level = t²`.
/// - Decay falls to the sustain level with an ease-out cubic curve.
/// - Release falls from the level at note-off time to zero with an inverse quartic curve.
///
/// Time which overflows a phase carries over into the following phase, so zero length phases
/// resolve within a single call to [`Envelope::advance`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Envelope {
    phase: EnvelopePhase,
    phase_time: f32,
    level: f32,
    release_start_level: f32,
}

impl Envelope {
    /// Upper bound of phase transitions within a single advance call.
    const MAX_TRANSITIONS: usize = 5;

    /// Create a new envelope, starting in the attack phase at zero level.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_finished(&self) -> bool {
        self.phase == EnvelopePhase::Finished
    }

    /// Start the release phase from the current level. Does nothing when the envelope already
    /// is releasing or finished.
    pub fn note_off(&mut self) {
        if matches!(self.phase, EnvelopePhase::Release | EnvelopePhase::Finished) {
            return;
        }
        self.release_start_level = self.level;
        self.enter(EnvelopePhase::Release);
    }

    /// Move the envelope forward by the given time in seconds and return the new level.
    pub fn advance(&mut self, parameters: &EnvelopeParameters, delta_time: f32) -> f32 {
        let mut time = self.phase_time + delta_time.max(0.0);
        for _ in 0..Self::MAX_TRANSITIONS {
            match self.phase {
                EnvelopePhase::Attack => {
                    let duration = parameters.attack_time;
                    if time >= duration {
                        time -= duration;
                        self.level = 1.0;
                        self.enter(EnvelopePhase::Decay);
                    } else {
                        let t = time / duration;
                        self.level = t * t;
                        break;
                    }
                }
                EnvelopePhase::Decay => {
                    let duration = parameters.decay_time;
                    let sustain = parameters.sustain_level_linear;
                    if time >= duration {
                        time -= duration;
                        self.level = sustain;
                        self.enter(EnvelopePhase::Sustain);
                    } else {
                        let t = time / duration;
                        let eased = 1.0 - (1.0 - t).powi(3);
                        self.level = 1.0 - eased * (1.0 - sustain);
                        break;
                    }
                }
                EnvelopePhase::Sustain => {
                    self.level = parameters.sustain_level_linear;
                    time = 0.0;
                    break;
                }
                EnvelopePhase::Release => {
                    let duration = parameters.release_time;
                    if time >= duration {
                        time = 0.0;
                        self.level = 0.0;
                        self.enter(EnvelopePhase::Finished);
                    } else {
                        let t = time / duration;
                        self.level = self.release_start_level * (1.0 - t).powi(4);
                    }
                    break;
                }
                EnvelopePhase::Finished => {
                    self.level = 0.0;
                    time = 0.0;
                    break;
                }
            }
        }
        self.phase_time = time;
        self.level = self.level.clamp(0.0, 1.0);
        self.level
    }

    fn enter(&mut self, phase: EnvelopePhase) {
        self.phase = phase;
        self.phase_time = 0.0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(value: f32, expected: f32) {
        assert!(
            (value - expected).abs() < 1e-4,
            "expected {expected}, got {value}"
        );
    }

    #[test]
    fn parameters() -> Result<(), Box<Error>> {
        let parameters = EnvelopeParameters::new(
            Duration::from_millis(100),
            Duration::ZERO,
            0.5,
            Duration::from_millis(200),
        )?;
        assert_near(parameters.attack_time(), 0.1);
        assert_eq!(parameters.decay_time(), 0.0);
        assert_near(parameters.release_time(), 0.2);
        assert_eq!(parameters.sustain_level_linear(), 0.5);
        assert_near(parameters.sustain_level(), db_to_linear(-30.0));

        assert!(EnvelopeParameters::new(
            Duration::ZERO,
            Duration::ZERO,
            1.5,
            Duration::ZERO
        )
        .is_err());

        assert_eq!(EnvelopeParameters::sustain_gain(0.0), 0.0);
        assert_eq!(EnvelopeParameters::sustain_gain(1.0), 1.0);
        Ok(())
    }

    #[test]
    fn envelope_curves() -> Result<(), Box<Error>> {
        let parameters = EnvelopeParameters::new(
            Duration::from_millis(100),
            Duration::ZERO,
            0.5,
            Duration::from_millis(200),
        )?;
        let mut envelope = Envelope::new();
        assert_eq!(envelope.phase(), EnvelopePhase::Attack);

        // t = 50ms: (0.05 / 0.1)² = 0.25
        assert_near(envelope.advance(&parameters, 0.05), 0.25);
        assert_eq!(envelope.phase(), EnvelopePhase::Attack);

        // t = 100ms: attack completes, zero decay falls straight to sustain
        assert_near(envelope.advance(&parameters, 0.05), 0.5);
        assert_eq!(envelope.phase(), EnvelopePhase::Sustain);

        envelope.note_off();
        assert_eq!(envelope.phase(), EnvelopePhase::Release);

        // 100ms post note-off: 0.5 * (1 - 0.5)^4
        assert_near(envelope.advance(&parameters, 0.1), 0.5 * 0.0625);

        // 300ms post note-off: finished
        assert_near(envelope.advance(&parameters, 0.2), 0.0);
        assert_eq!(envelope.phase(), EnvelopePhase::Finished);
        Ok(())
    }

    #[test]
    fn decay_curve() {
        let parameters = EnvelopeParameters::from_seconds(0.0, 1.0, 0.2, 1.0);
        let mut envelope = Envelope::new();
        // zero attack: starts decaying from full level
        assert_near(envelope.advance(&parameters, 0.0), 1.0);
        assert_eq!(envelope.phase(), EnvelopePhase::Decay);
        // half way: 1 - (1 - 0.5^3) * 0.8
        assert_near(envelope.advance(&parameters, 0.5), 1.0 - 0.875 * 0.8);
        assert_near(envelope.advance(&parameters, 0.5), 0.2);
        assert_eq!(envelope.phase(), EnvelopePhase::Sustain);
        // sustain holds
        assert_near(envelope.advance(&parameters, 10.0), 0.2);
        assert_eq!(envelope.phase(), EnvelopePhase::Sustain);
    }

    #[test]
    fn overflow_carries_into_next_phase() {
        let parameters = EnvelopeParameters::from_seconds(0.1, 0.2, 0.0, 1.0);
        let mut envelope = Envelope::new();
        // 0.1s attack + 0.1s into decay
        let level = envelope.advance(&parameters, 0.2);
        assert_eq!(envelope.phase(), EnvelopePhase::Decay);
        assert_near(level, 1.0 - (1.0 - 0.5f32.powi(3)));
    }

    #[test]
    fn zero_length_envelope() {
        let parameters = EnvelopeParameters::from_seconds(0.0, 0.0, 1.0, 0.0);
        let mut envelope = Envelope::new();
        assert_eq!(envelope.advance(&parameters, 0.01), 1.0);
        assert_eq!(envelope.phase(), EnvelopePhase::Sustain);
        envelope.note_off();
        assert_eq!(envelope.advance(&parameters, 0.01), 0.0);
        assert!(envelope.is_finished());

        // note-off before the first advance
        let mut envelope = Envelope::new();
        envelope.note_off();
        envelope.advance(&parameters, 0.0);
        assert!(envelope.is_finished());
    }

    #[test]
    fn release_starts_from_current_level() {
        let parameters = EnvelopeParameters::from_seconds(1.0, 0.5, 0.5, 1.0);
        let mut envelope = Envelope::new();
        let level = envelope.advance(&parameters, 0.5);
        assert_near(level, 0.25);
        envelope.note_off();
        // no jump on the first release step
        assert_near(envelope.advance(&parameters, 0.0), 0.25);
        assert!(envelope.advance(&parameters, 0.1) < 0.25);
    }

    #[test]
    fn note_off_is_idempotent() {
        let parameters = EnvelopeParameters::from_seconds(0.0, 0.0, 0.8, 1.0);
        let mut envelope = Envelope::new();
        envelope.advance(&parameters, 0.1);
        envelope.note_off();
        envelope.advance(&parameters, 0.25);
        let once = envelope;
        envelope.note_off();
        assert_eq!(envelope, once);
    }

    #[test]
    fn level_stays_in_range() {
        let parameters = EnvelopeParameters::from_seconds(0.013, 0.027, 0.4, 0.031);
        let mut envelope = Envelope::new();
        for step in 0..200 {
            if step == 50 {
                envelope.note_off();
            }
            let level = envelope.advance(&parameters, 0.0029);
            assert!((0.0..=1.0).contains(&level));
        }
        assert!(envelope.is_finished());
    }
}
