//! A single emitted sound particle: physics state plus its ADSR envelope.

use crate::{
    geometry::{Rect, Vector},
    utils::envelope::{Envelope, EnvelopeParameters, EnvelopePhase},
};

// -------------------------------------------------------------------------------------------------

/// Stable particle identifier. Ids grow monotonically, so a smaller id means an older particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticleId(pub(crate) u64);

impl ParticleId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ParticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// -------------------------------------------------------------------------------------------------

/// A live particle, exclusively owned by the [`ParticleSimulation`](crate::ParticleSimulation).
#[derive(Debug, Clone)]
pub struct Particle {
    id: ParticleId,
    position: Vector,
    velocity: Vector,
    pitch_ratio: f32,
    velocity_gain: f32,
    midi_note: u8,
    envelope: Envelope,
    envelope_parameters: EnvelopeParameters,
    previous_envelope_level: f32,
    age: f32,
}

impl Particle {
    pub(crate) fn new(
        id: ParticleId,
        position: Vector,
        velocity: Vector,
        velocity_gain: f32,
        pitch_ratio: f32,
        midi_note: u8,
        envelope_parameters: EnvelopeParameters,
    ) -> Self {
        let finite_or = |value: f32, default: f32| {
            if value.is_finite() {
                value
            } else {
                default
            }
        };
        Self {
            id,
            position,
            velocity,
            pitch_ratio: finite_or(pitch_ratio, 1.0).max(0.0),
            velocity_gain: finite_or(velocity_gain, 0.0).clamp(0.0, 1.0),
            midi_note,
            envelope: Envelope::new(),
            envelope_parameters,
            previous_envelope_level: 0.0,
            age: 0.0,
        }
    }

    pub fn id(&self) -> ParticleId {
        self.id
    }

    pub fn position(&self) -> Vector {
        self.position
    }

    pub fn velocity(&self) -> Vector {
        self.velocity
    }

    /// Playback speed multiplier of the particle's grains.
    pub fn pitch_ratio(&self) -> f32 {
        self.pitch_ratio
    }

    /// MIDI velocity as amplitude factor in range \[0, 1\].
    pub fn velocity_gain(&self) -> f32 {
        self.velocity_gain
    }

    pub fn midi_note(&self) -> u8 {
        self.midi_note
    }

    pub fn envelope_phase(&self) -> EnvelopePhase {
        self.envelope.phase()
    }

    pub fn envelope_level(&self) -> f32 {
        self.envelope.level()
    }

    pub fn envelope_parameters(&self) -> &EnvelopeParameters {
        &self.envelope_parameters
    }

    /// Seconds since the particle got spawned.
    pub fn age(&self) -> f32 {
        self.age
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }

    /// Start releasing the particle's envelope from its current level.
    pub fn note_off(&mut self) {
        self.envelope.note_off();
    }

    /// Semi-implicit Euler integration with the given acceleration, then advance the envelope.
    pub(crate) fn integrate(&mut self, acceleration: Vector, delta_time: f32) {
        self.velocity += acceleration * delta_time;
        self.position += self.velocity * delta_time;
        self.previous_envelope_level = self.envelope.level();
        self.envelope
            .advance(&self.envelope_parameters, delta_time);
        self.age += delta_time;
    }

    /// Snap a particle with a non finite position or velocity back into a safe state.
    /// Returns true when the particle needed a reset.
    pub(crate) fn sanitize(&mut self, bounds: &Rect) -> bool {
        if self.position.is_finite() && self.velocity.is_finite() {
            return false;
        }
        self.position = bounds.clamp(self.position);
        self.velocity = Vector::ZERO;
        true
    }

    /// Reflect the velocity at the canvas edges and keep the particle inside the bounds.
    pub(crate) fn bounce_off(&mut self, bounds: &Rect) {
        if self.position.x <= bounds.left() {
            self.position.x = bounds.left();
            self.velocity.x = self.velocity.x.abs();
        } else if self.position.x >= bounds.right() {
            self.position.x = bounds.right();
            self.velocity.x = -self.velocity.x.abs();
        }
        if self.position.y <= bounds.top() {
            self.position.y = bounds.top();
            self.velocity.y = self.velocity.y.abs();
        } else if self.position.y >= bounds.bottom() {
            self.position.y = bounds.bottom();
            self.velocity.y = -self.velocity.y.abs();
        }
    }

    /// Wrap the particle's position around the canvas edges (toroidal canvas).
    pub(crate) fn wrap_around(&mut self, bounds: &Rect) {
        let wrap_axis = |value: f32, start: f32, extent: f32| {
            if extent > 0.0 {
                start + (value - start).rem_euclid(extent)
            } else {
                start
            }
        };
        self.position.x = wrap_axis(self.position.x, bounds.x, bounds.width);
        self.position.y = wrap_axis(self.position.y, bounds.y, bounds.height);
    }

    /// Copy the particle's state which is needed for rendering and displaying.
    pub fn state(&self) -> ParticleState {
        ParticleState {
            id: self.id,
            position: self.position,
            velocity: self.velocity,
            midi_note: self.midi_note,
            pitch_ratio: self.pitch_ratio,
            velocity_gain: self.velocity_gain,
            envelope_phase: self.envelope.phase(),
            envelope_level: self.envelope.level(),
            previous_envelope_level: self.previous_envelope_level,
            sustain_level: self.envelope_parameters.sustain_level(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Plain copy of a particle's state at the end of a simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleState {
    pub id: ParticleId,
    pub position: Vector,
    pub velocity: Vector,
    pub midi_note: u8,
    pub pitch_ratio: f32,
    pub velocity_gain: f32,
    pub envelope_phase: EnvelopePhase,
    pub envelope_level: f32,
    /// Envelope level at the start of the last step. Renderers ramp from this level to
    /// `envelope_level` within a block.
    pub previous_envelope_level: f32,
    /// The particle's sustain level as perceptual gain.
    pub sustain_level: f32,
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(position: Vector, velocity: Vector) -> Particle {
        Particle::new(
            ParticleId(1),
            position,
            velocity,
            1.0,
            1.0,
            60,
            EnvelopeParameters::default(),
        )
    }

    #[test]
    fn bounce_reflects_velocity() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        let mut p = particle(Vector::new(100.0, 50.0), Vector::new(10.0, 0.0));
        p.bounce_off(&bounds);
        assert_eq!(p.position().x, 100.0);
        assert_eq!(p.velocity(), Vector::new(-10.0, 0.0));

        let mut p = particle(Vector::new(50.0, -3.0), Vector::new(0.0, -5.0));
        p.bounce_off(&bounds);
        assert_eq!(p.position(), Vector::new(50.0, 0.0));
        assert_eq!(p.velocity(), Vector::new(0.0, 5.0));

        // moving inwards at an edge keeps its direction
        let mut p = particle(Vector::new(0.0, 50.0), Vector::new(4.0, 0.0));
        p.bounce_off(&bounds);
        assert_eq!(p.velocity(), Vector::new(4.0, 0.0));
    }

    #[test]
    fn wrap_moves_to_opposite_edge() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        let mut p = particle(Vector::new(101.0, 50.0), Vector::new(10.0, 0.0));
        p.wrap_around(&bounds);
        assert!((p.position().x - 1.0).abs() < 1e-4);
        assert_eq!(p.velocity(), Vector::new(10.0, 0.0));

        let mut p = particle(Vector::new(50.0, -2.0), Vector::ZERO);
        p.wrap_around(&bounds);
        assert!((p.position().y - 98.0).abs() < 1e-4);
    }

    #[test]
    fn sanitize_non_finite_state() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        let mut p = particle(Vector::new(f32::NAN, 500.0), Vector::new(f32::INFINITY, 0.0));
        assert!(p.sanitize(&bounds));
        assert_eq!(p.position(), Vector::new(50.0, 100.0));
        assert_eq!(p.velocity(), Vector::ZERO);
        assert!(!p.sanitize(&bounds));
    }

    #[test]
    fn integrate_semi_implicit_euler() {
        let mut p = particle(Vector::ZERO, Vector::new(1.0, 0.0));
        p.integrate(Vector::new(0.0, 10.0), 0.5);
        // velocity first, then position with the new velocity
        assert_eq!(p.velocity(), Vector::new(1.0, 5.0));
        assert_eq!(p.position(), Vector::new(0.5, 2.5));
        assert_eq!(p.age(), 0.5);
        assert_eq!(p.state().previous_envelope_level, 0.0);
    }
}
