use std::path::PathBuf;

use crate::particle::ParticleId;

// -------------------------------------------------------------------------------------------------

/// Notifications from the engine, delivered to an [`EngineObserver`] on the control thread
/// via [`EngineHandle::dispatch_events`](super::EngineHandle::dispatch_events).
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A note-on spawned a new particle.
    ParticleSpawned { id: ParticleId, note: u8 },
    /// A particle finished its release phase and got removed.
    ParticleRetired { id: ParticleId, note: u8 },
    /// A particle got removed to make room for newer ones.
    ParticleEvicted { id: ParticleId, note: u8 },
    /// A new audio file got loaded and is now used as grain source.
    AudioFileLoaded { path: Option<PathBuf> },
}

// -------------------------------------------------------------------------------------------------

/// Observes engine events, e.g. to update a user interface.
///
/// Observers are registered at the [`EngineHandle`](super::EngineHandle) and are called on the
/// thread which dispatches the events, never from the audio thread.
pub trait EngineObserver: Send {
    fn on_event(&mut self, event: &EngineEvent);
}

impl<F> EngineObserver for F
where
    F: FnMut(&EngineEvent) + Send,
{
    fn on_event(&mut self, event: &EngineEvent) {
        self(event)
    }
}
