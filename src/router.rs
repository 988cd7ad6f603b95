//! Routes MIDI notes to particle spawns and releases.

use crate::{
    geometry::{Rect, Vector},
    scene::SpawnPoint,
    simulation::{ParticleSimulation, SpawnResult},
    utils::{envelope::EnvelopeParameters, pitch_ratio_from_note},
};

// -------------------------------------------------------------------------------------------------

/// Initial speed of spawned particles, in canvas units per second.
pub const SPAWN_MOMENTUM: f32 = 100.0;

// -------------------------------------------------------------------------------------------------

/// Spawns particles for note-ons and releases them on note-offs.
///
/// Spawn points are selected round-robin: each note-on uses the spawn point after the one
/// that was used by the previous note-on. Without any spawn points, particles start at the
/// canvas center, moving to the right.
#[derive(Debug, Default, Clone)]
pub struct VoiceRouter {
    next_spawn_point: usize,
}

impl VoiceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a new particle for the given note.
    ///
    /// * `velocity` - MIDI velocity in range \[0, 1\], applied as amplitude factor.
    /// * `pitch_ratio` - Explicit playback speed. When `None`, the note's pitch relative to
    ///   middle C is used.
    #[allow(clippy::too_many_arguments)]
    pub fn note_on(
        &mut self,
        simulation: &mut ParticleSimulation,
        spawn_points: &[SpawnPoint],
        canvas_bounds: &Rect,
        note: u8,
        velocity: f32,
        pitch_ratio: Option<f32>,
        envelope_parameters: EnvelopeParameters,
    ) -> SpawnResult {
        let spawn_point = if spawn_points.is_empty() {
            SpawnPoint::new(canvas_bounds.center(), 0.0)
        } else {
            let index = self.next_spawn_point % spawn_points.len();
            self.next_spawn_point = (index + 1) % spawn_points.len();
            spawn_points[index]
        };
        let velocity_vector: Vector =
            Vector::from_angle(spawn_point.momentum_angle) * SPAWN_MOMENTUM;
        let pitch_ratio = pitch_ratio.unwrap_or_else(|| pitch_ratio_from_note(note));
        simulation.spawn_particle(
            spawn_point.position,
            velocity_vector,
            velocity,
            pitch_ratio,
            note,
            envelope_parameters,
        )
    }

    /// Release all particles of the given note. Returns the number of released particles.
    /// Releasing notes which are not held does nothing.
    pub fn note_off(&mut self, simulation: &mut ParticleSimulation, note: u8) -> usize {
        simulation.release_note(note)
    }

    /// Reset the round-robin spawn point selection.
    pub fn reset(&mut self) {
        self.next_spawn_point = 0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::envelope::EnvelopePhase;

    #[test]
    fn round_robin_spawn_points() {
        let mut router = VoiceRouter::new();
        let mut simulation = ParticleSimulation::new(8);
        let spawn_points = [
            SpawnPoint::new(Vector::new(10.0, 10.0), 0.0),
            SpawnPoint::new(Vector::new(20.0, 20.0), std::f32::consts::FRAC_PI_2),
        ];
        let bounds = Rect::default();
        for note in [60, 61, 62] {
            router.note_on(
                &mut simulation,
                &spawn_points,
                &bounds,
                note,
                1.0,
                None,
                EnvelopeParameters::default(),
            );
        }
        let positions = simulation
            .particles()
            .iter()
            .map(|p| p.position())
            .collect::<Vec<_>>();
        assert_eq!(
            positions,
            vec![
                Vector::new(10.0, 10.0),
                Vector::new(20.0, 20.0),
                Vector::new(10.0, 10.0)
            ]
        );
        let first = &simulation.particles()[0];
        assert_eq!(first.velocity(), Vector::new(SPAWN_MOMENTUM, 0.0));
        let second = &simulation.particles()[1];
        assert!(second.velocity().x.abs() < 1e-3);
        assert!((second.velocity().y - SPAWN_MOMENTUM).abs() < 1e-3);
    }

    #[test]
    fn note_pitch() {
        let mut router = VoiceRouter::new();
        let mut simulation = ParticleSimulation::new(8);
        let bounds = Rect::default();
        router.note_on(&mut simulation, &[], &bounds, 72, 0.5, None, EnvelopeParameters::default());
        router.note_on(
            &mut simulation,
            &[],
            &bounds,
            72,
            0.5,
            Some(0.75),
            EnvelopeParameters::default(),
        );
        let particles = simulation.particles();
        assert!((particles[0].pitch_ratio() - 2.0).abs() < 1e-5);
        assert_eq!(particles[1].pitch_ratio(), 0.75);
        assert_eq!(particles[0].velocity_gain(), 0.5);
        // no spawn points: canvas center
        assert_eq!(particles[0].position(), bounds.center());
    }

    #[test]
    fn note_off_releases_note_particles() {
        let mut router = VoiceRouter::new();
        let mut simulation = ParticleSimulation::new(8);
        let bounds = Rect::default();
        let spawn_points = [SpawnPoint::default()];
        for note in [60, 60, 67] {
            router.note_on(
                &mut simulation,
                &spawn_points,
                &bounds,
                note,
                1.0,
                None,
                EnvelopeParameters::default(),
            );
        }
        assert_eq!(router.note_off(&mut simulation, 60), 2);
        assert_eq!(router.note_off(&mut simulation, 60), 0);
        assert_eq!(router.note_off(&mut simulation, 12), 0);
        let phases = simulation
            .particles()
            .iter()
            .map(|p| p.envelope_phase())
            .collect::<Vec<_>>();
        assert_eq!(
            phases,
            vec![
                EnvelopePhase::Release,
                EnvelopePhase::Release,
                EnvelopePhase::Attack
            ]
        );
    }
}
