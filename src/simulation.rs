//! Particle physics and lifecycle management.

use crate::{
    geometry::{Rect, Vector},
    particle::{Particle, ParticleId, ParticleState},
    scene::MassPoint,
    utils::envelope::EnvelopeParameters,
};

mod notes;
pub use notes::ActiveNotes;

// -------------------------------------------------------------------------------------------------

/// Hard upper limit for the particle ceiling. All particle related buffers are preallocated
/// with this size.
pub const MAX_PARTICLES_LIMIT: usize = 256;

/// Default particle ceiling.
pub const DEFAULT_MAX_PARTICLES: usize = 32;

/// Default gravity strength, in canvas units³/s².
pub const DEFAULT_GRAVITY_STRENGTH: f32 = 100_000.0;

/// Distance floor for the inverse square force, in canvas units.
const MIN_FORCE_DISTANCE: f32 = 5.0;

// -------------------------------------------------------------------------------------------------

/// Result of [`ParticleSimulation::spawn_particle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnResult {
    /// Id of the newly spawned particle.
    pub id: ParticleId,
    /// Id and note of the oldest particle, when it had to make room for the new one.
    pub evicted: Option<(ParticleId, u8)>,
}

// -------------------------------------------------------------------------------------------------

/// Owns all live particles and the note to particle map.
///
/// Particles are kept in spawn order, which also is the order of their ids. Removing particles
/// never reorders the remaining ones, so ids held by the note map stay valid.
#[derive(Debug, Clone)]
pub struct ParticleSimulation {
    particles: Vec<Particle>,
    active_notes: ActiveNotes,
    max_particles: usize,
    gravity_strength: f32,
    next_id: u64,
}

impl Default for ParticleSimulation {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARTICLES)
    }
}

impl ParticleSimulation {
    /// Create a new, empty simulation with the given particle ceiling.
    pub fn new(max_particles: usize) -> Self {
        Self {
            particles: Vec::with_capacity(MAX_PARTICLES_LIMIT),
            active_notes: ActiveNotes::with_capacity(MAX_PARTICLES_LIMIT),
            max_particles: max_particles.clamp(1, MAX_PARTICLES_LIMIT),
            gravity_strength: DEFAULT_GRAVITY_STRENGTH,
            next_id: 1,
        }
    }

    /// All live particles, oldest first.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Find a live particle by its id.
    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles
            .binary_search_by_key(&id, |p| p.id())
            .ok()
            .map(|index| &self.particles[index])
    }

    /// The held notes to particles map.
    pub fn active_notes(&self) -> &ActiveNotes {
        &self.active_notes
    }

    pub fn max_particles(&self) -> usize {
        self.max_particles
    }

    /// Set a new particle ceiling. When there are more live particles than allowed, the oldest
    /// ones get evicted and passed to the given callback.
    pub fn set_max_particles(&mut self, max_particles: usize, mut on_evicted: impl FnMut(&Particle)) {
        self.max_particles = max_particles.clamp(1, MAX_PARTICLES_LIMIT);
        while self.particles.len() > self.max_particles {
            let evicted = self.particles.remove(0);
            self.active_notes.unregister(evicted.id());
            on_evicted(&evicted);
        }
    }

    pub fn gravity_strength(&self) -> f32 {
        self.gravity_strength
    }

    /// Set the gravity strength. Non finite values are ignored.
    pub fn set_gravity_strength(&mut self, strength: f32) {
        if strength.is_finite() {
            self.gravity_strength = strength;
        }
    }

    /// Create a new particle and register it under the given note. When the particle ceiling
    /// is reached, the oldest live particle gets evicted first.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn_particle(
        &mut self,
        position: Vector,
        velocity: Vector,
        velocity_gain: f32,
        pitch_ratio: f32,
        midi_note: u8,
        envelope_parameters: EnvelopeParameters,
    ) -> SpawnResult {
        let evicted = if self.particles.len() >= self.max_particles {
            let oldest = self.particles.remove(0);
            self.active_notes.unregister(oldest.id());
            Some((oldest.id(), oldest.midi_note()))
        } else {
            None
        };

        let id = ParticleId(self.next_id);
        self.next_id += 1;
        self.particles.push(Particle::new(
            id,
            position,
            velocity,
            velocity_gain,
            pitch_ratio,
            midi_note,
            envelope_parameters,
        ));
        self.active_notes.register(midi_note, id);

        SpawnResult { id, evicted }
    }

    /// Move all particles of the given note into their release phase and remove the note from
    /// the note map. Returns the number of released particles. Notes which are not held are
    /// ignored.
    pub fn release_note(&mut self, note: u8) -> usize {
        let mut released = 0;
        for id in self.active_notes.particles(note) {
            if let Ok(index) = self.particles.binary_search_by_key(&id, |p| p.id()) {
                self.particles[index].note_off();
                released += 1;
            }
        }
        self.active_notes.remove_note(note);
        released
    }

    /// Release all particles, e.g. on MIDI all-notes-off.
    pub fn release_all(&mut self) {
        for particle in &mut self.particles {
            particle.note_off();
        }
        self.active_notes.clear();
    }

    /// Remove all particles immediately.
    pub fn clear(&mut self) {
        self.particles.clear();
        self.active_notes.clear();
    }

    /// Advance all particles by one audio block:
    ///
    /// 1. Sum the inverse square forces of all mass points.
    /// 2. Integrate velocity and position (semi-implicit Euler) with `block_size / sample_rate`.
    /// 3. Bounce off or wrap around the canvas edges.
    /// 4. Advance envelopes.
    /// 5. Remove particles with finished envelopes, passing them to `on_retired`.
    pub fn step(
        &mut self,
        block_size: usize,
        sample_rate: u32,
        mass_points: &[MassPoint],
        bounce_mode: bool,
        canvas_bounds: Rect,
        mut on_retired: impl FnMut(&Particle),
    ) {
        if sample_rate == 0 {
            return;
        }
        let delta_time = block_size as f32 / sample_rate as f32;
        let bounds = canvas_bounds.sanitized();
        let gravity_strength = self.gravity_strength;

        for particle in &mut self.particles {
            let acceleration = Self::acceleration(particle.position(), mass_points, gravity_strength);
            particle.integrate(acceleration, delta_time);
            particle.sanitize(&bounds);
            if bounce_mode {
                particle.bounce_off(&bounds);
            } else {
                particle.wrap_around(&bounds);
            }
        }

        let active_notes = &mut self.active_notes;
        self.particles.retain(|particle| {
            if particle.is_finished() {
                active_notes.unregister(particle.id());
                on_retired(particle);
                false
            } else {
                true
            }
        });
    }

    /// Copy the state of all live particles into the given vector. Does not allocate when the
    /// vector has a capacity of at least [`MAX_PARTICLES_LIMIT`].
    pub fn copy_states(&self, states: &mut Vec<ParticleState>) {
        states.clear();
        states.extend(self.particles.iter().map(Particle::state));
    }

    /// Summed acceleration of all mass points at the given position, for unit mass particles.
    fn acceleration(position: Vector, mass_points: &[MassPoint], gravity_strength: f32) -> Vector {
        const MIN_DISTANCE_SQUARED: f32 = MIN_FORCE_DISTANCE * MIN_FORCE_DISTANCE;
        let mut total = Vector::ZERO;
        for mass_point in mass_points {
            let direction = mass_point.position - position;
            let distance_squared = direction.length_squared();
            if !distance_squared.is_finite() || distance_squared <= f32::EPSILON {
                // direction is undefined when sitting on top of the mass point
                continue;
            }
            let distance = distance_squared.sqrt();
            let magnitude = gravity_strength * mass_point.mass_multiplier
                / distance_squared.max(MIN_DISTANCE_SQUARED);
            total += direction * (magnitude / distance);
        }
        total
    }
}

// -------------------------------------------------------------------------------------------------
