use crate::particle::ParticleId;

// -------------------------------------------------------------------------------------------------

/// Maps held MIDI notes to the particles they spawned, so note-offs can release them.
///
/// Entries are stored flat in a preallocated vector: the number of mapped particles is bounded
/// by the particle ceiling, so lookups are cheap and registering never allocates in the
/// audio thread.
#[derive(Debug, Clone)]
pub struct ActiveNotes {
    entries: Vec<(u8, ParticleId)>,
}

impl ActiveNotes {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Number of mapped particles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a particle under the given note.
    pub fn register(&mut self, note: u8, id: ParticleId) {
        debug_assert!(
            self.entries.len() < self.entries.capacity(),
            "Note map capacity exceeded"
        );
        self.entries.push((note, id));
    }

    /// Test if the given note currently is mapped to at least one particle.
    pub fn contains_note(&self, note: u8) -> bool {
        self.entries.iter().any(|(n, _)| *n == note)
    }

    /// All particle ids which are mapped to the given note.
    pub fn particles(&self, note: u8) -> impl Iterator<Item = ParticleId> + '_ {
        self.entries
            .iter()
            .filter(move |(n, _)| *n == note)
            .map(|(_, id)| *id)
    }

    /// Remove the note key and all its particle ids.
    pub fn remove_note(&mut self, note: u8) {
        self.entries.retain(|(n, _)| *n != note);
    }

    /// Remove a single particle id from the map, e.g. when the particle got retired.
    pub fn unregister(&mut self, id: ParticleId) {
        self.entries.retain(|(_, i)| *i != id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_remove() {
        let mut notes = ActiveNotes::with_capacity(8);
        notes.register(60, ParticleId(1));
        notes.register(62, ParticleId(2));
        notes.register(60, ParticleId(3));
        assert_eq!(notes.len(), 3);
        assert_eq!(
            notes.particles(60).collect::<Vec<_>>(),
            vec![ParticleId(1), ParticleId(3)]
        );

        notes.unregister(ParticleId(1));
        assert_eq!(notes.particles(60).collect::<Vec<_>>(), vec![ParticleId(3)]);

        notes.remove_note(60);
        assert!(!notes.contains_note(60));
        assert!(notes.contains_note(62));
        // removing missing notes is a no-op
        notes.remove_note(60);
        assert_eq!(notes.len(), 1);
    }
}
