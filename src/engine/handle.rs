use std::{
    path::{Path, PathBuf},
    sync::{atomic::Ordering, Arc, MutexGuard, PoisonError},
};

use basedrop::Shared;
use four_cc::FourCC;

use super::{
    ControlState, EngineEvent, EngineMessage, EngineObserver, EngineParameter, EngineParameters,
    EngineShared, EngineState, MidiMessage,
};
use crate::{
    geometry::{Rect, Vector},
    guard::ReadGuard,
    parameter::Parameter,
    particle::ParticleState,
    scene::{MassPoint, Scene, SpawnPoint},
    simulation::ParticleSimulation,
    source::SourceBuffer,
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Control thread side of an [`Engine`](super::Engine).
///
/// Handles can be cloned and shared across threads. All setters take effect at the start of
/// the next processed audio block. Getters return plain copies or scoped read guards.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<EngineShared>,
}

impl EngineHandle {
    pub(super) fn new(shared: Arc<EngineShared>) -> Self {
        Self { shared }
    }

    /// The engine's output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }

    // MIDI

    /// Spawn (note-on) or release (note-off) particles for the given note.
    ///
    /// * `velocity` - Normalized velocity in range \[0, 1\].
    /// * `pitch_ratio` - Optional playback speed of spawned particles. When `None`, the note's
    ///   pitch relative to middle C is used.
    pub fn inject_midi_message(
        &self,
        note: u8,
        velocity: f32,
        is_note_on: bool,
        pitch_ratio: Option<f32>,
    ) -> Result<(), Error> {
        let message = if is_note_on {
            MidiMessage::NoteOn {
                note,
                velocity,
                pitch_ratio,
            }
        } else {
            MidiMessage::NoteOff { note }
        };
        self.send_midi(message)
    }

    /// Send a MIDI message to the engine.
    pub fn send_midi(&self, message: MidiMessage) -> Result<(), Error> {
        self.send_message(EngineMessage::Midi(message))
    }

    /// Parse and send a raw MIDI message. Unsupported messages are ignored.
    pub fn send_midi_bytes(&self, bytes: &[u8]) -> Result<(), Error> {
        match MidiMessage::from_bytes(bytes) {
            Some(message) => self.send_midi(message),
            None => {
                log::debug!("Ignoring unsupported MIDI message: {bytes:02X?}");
                Ok(())
            }
        }
    }

    /// Release all particles.
    pub fn all_notes_off(&self) -> Result<(), Error> {
        self.send_midi(MidiMessage::AllNotesOff)
    }

    /// Remove all particles immediately.
    pub fn clear_particles(&self) {
        if let Err(err) = self.send_message(EngineMessage::ClearParticles) {
            log::warn!("Failed to clear particles: {err}");
        }
    }

    // Parameters

    /// Descriptors of all engine parameters.
    pub fn parameters(&self) -> Vec<&'static dyn Parameter> {
        EngineParameter::descriptors()
    }

    /// Current plain values of all engine parameters.
    pub fn parameter_values(&self) -> EngineParameters {
        self.control().parameters
    }

    /// Current plain value of the parameter with the given id.
    pub fn parameter_value(&self, id: FourCC) -> Result<f32, Error> {
        let parameter = EngineParameter::from_id(id)?;
        Ok(self.control().parameters.value(parameter))
    }

    /// Set a plain parameter value. Values out of range get clamped. Returns the applied value.
    pub fn set_parameter(&self, id: FourCC, value: f32) -> Result<f32, Error> {
        let parameter = EngineParameter::from_id(id)?;
        self.set_engine_parameter(parameter, value)
    }

    /// Set a parameter value, normalized to range \[0, 1\]. Returns the applied plain value.
    pub fn set_parameter_normalized(&self, id: FourCC, normalized: f32) -> Result<f32, Error> {
        let parameter = EngineParameter::from_id(id)?;
        let value = parameter.descriptor().denormalize(normalized);
        self.set_engine_parameter(parameter, value)
    }

    /// Set all parameters at once, e.g. when restoring a preset.
    pub fn set_parameter_values(&self, parameters: EngineParameters) -> Result<(), Error> {
        let parameters = parameters.sanitized();
        self.control().parameters = parameters;
        self.send_message(EngineMessage::SetParameters(parameters))
    }

    pub fn set_gravity_strength(&self, strength: f32) -> Result<(), Error> {
        self.set_engine_parameter(EngineParameter::Gravity, strength)
            .map(|_| ())
    }

    pub fn set_max_particles(&self, max_particles: usize) -> Result<(), Error> {
        self.set_engine_parameter(EngineParameter::MaxParticles, max_particles as f32)
            .map(|_| ())
    }

    /// Enable bouncing off the canvas edges. When disabled, particles wrap around the canvas.
    pub fn set_bounce_mode(&self, enabled: bool) -> Result<(), Error> {
        self.set_engine_parameter(EngineParameter::BounceMode, enabled as u8 as f32)
            .map(|_| ())
    }

    fn set_engine_parameter(&self, parameter: EngineParameter, value: f32) -> Result<f32, Error> {
        let applied = self.control().parameters.set_value(parameter, value);
        if value.is_finite() && (applied - value).abs() > f32::EPSILON * value.abs().max(1.0) {
            log::warn!("Clamped parameter '{parameter}' value {value} to {applied}");
        }
        self.send_message(EngineMessage::SetParameter(parameter, applied))?;
        Ok(applied)
    }

    // Canvas

    pub fn canvas_bounds(&self) -> Rect {
        self.control().canvas_bounds
    }

    /// Set new canvas bounds. Invalid bounds get rejected.
    pub fn set_canvas_bounds(&self, bounds: Rect) -> Result<(), Error> {
        let valid = [bounds.x, bounds.y, bounds.width, bounds.height]
            .iter()
            .all(|v| v.is_finite())
            && bounds.width > 0.0
            && bounds.height > 0.0;
        if !valid {
            log::warn!("Rejecting invalid canvas bounds: {bounds:?}");
            return Err(Error::ParameterError(format!(
                "Invalid canvas bounds: {bounds:?}"
            )));
        }
        self.control().canvas_bounds = bounds;
        self.send_message(EngineMessage::SetCanvasBounds(bounds))
    }

    // Scene

    /// Copy of all mass points.
    pub fn mass_points(&self) -> Vec<MassPoint> {
        self.shared.scene.read().mass_points().to_vec()
    }

    /// Copy of all spawn points.
    pub fn spawn_points(&self) -> Vec<SpawnPoint> {
        self.shared.scene.read().spawn_points().to_vec()
    }

    /// Add a new mass point. Returns the new point's index.
    pub fn add_mass_point(&self, position: Vector, mass_multiplier: f32) -> Result<usize, Error> {
        let index = self.edit_scene(|scene| scene.add_mass_point(position, mass_multiplier))?;
        log::info!("Added mass point #{index} at {position:?}");
        Ok(index)
    }

    pub fn update_mass_point(
        &self,
        index: usize,
        position: Vector,
        mass_multiplier: f32,
    ) -> Result<(), Error> {
        self.edit_scene(|scene| scene.update_mass_point(index, position, mass_multiplier))
    }

    pub fn remove_mass_point(&self, index: usize) -> Result<(), Error> {
        self.edit_scene(|scene| scene.remove_mass_point(index))?;
        log::info!("Removed mass point #{index}");
        Ok(())
    }

    /// Add a new spawn point. Returns the new point's index.
    pub fn add_spawn_point(&self, position: Vector, momentum_angle: f32) -> Result<usize, Error> {
        let index = self.edit_scene(|scene| scene.add_spawn_point(position, momentum_angle))?;
        log::info!("Added spawn point #{index} at {position:?}");
        Ok(index)
    }

    pub fn update_spawn_point(
        &self,
        index: usize,
        position: Vector,
        momentum_angle: f32,
    ) -> Result<(), Error> {
        self.edit_scene(|scene| scene.update_spawn_point(index, position, momentum_angle))
    }

    pub fn remove_spawn_point(&self, index: usize) -> Result<(), Error> {
        self.edit_scene(|scene| scene.remove_spawn_point(index))?;
        log::info!("Removed spawn point #{index}");
        Ok(())
    }

    /// Replace all points at once.
    pub fn set_scene(&self, mass_points: &[MassPoint], spawn_points: &[SpawnPoint]) {
        let scene = Scene::with_points(mass_points, spawn_points);
        let _ = self.edit_scene(|current| {
            *current = scene;
            Ok(())
        });
    }

    fn edit_scene<R>(&self, edit: impl FnOnce(&mut Scene) -> Result<R, Error>) -> Result<R, Error> {
        let result = edit(&mut *self.shared.scene.lock());
        match &result {
            Ok(_) => {
                self.shared.scene_revision.fetch_add(1, Ordering::Release);
            }
            Err(err) => log::warn!("Rejected scene edit: {err}"),
        }
        result
    }

    // Particles

    /// Copy of all live particle states.
    pub fn particles(&self) -> Vec<ParticleState> {
        let simulation = self.shared.simulation.read();
        let mut states = Vec::with_capacity(simulation.len());
        simulation.copy_states(&mut states);
        states
    }

    /// Scoped read access to the live particles. The audio thread waits while the returned
    /// guard is held: release it as soon as possible.
    pub fn lock_particles(&self) -> ReadGuard<'_, ParticleSimulation> {
        self.shared.simulation.read()
    }

    // Audio files

    /// Decode the given audio file and use it as grain source. Decoding happens on the calling
    /// thread. On errors, the previously loaded file is kept.
    pub fn load_audio_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let buffer = SourceBuffer::from_file(path).inspect_err(|err| {
            log::error!("Failed to load audio file '{}': {err}", path.display());
        })?;
        log::info!(
            "Loaded audio file '{}': {} frames, {} channels, {} Hz",
            path.display(),
            buffer.frame_count(),
            buffer.channel_count(),
            buffer.sample_rate()
        );
        self.replace_source(Some(buffer), Some(path.to_path_buf()));
        Ok(())
    }

    /// Use the given, already decoded buffer as grain source.
    pub fn load_audio_buffer(&self, buffer: SourceBuffer) {
        self.replace_source(Some(buffer), None);
    }

    /// Unload the current grain source. The engine then renders silence.
    pub fn clear_audio_file(&self) {
        self.replace_source(None, None);
    }

    /// Path of the currently loaded audio file, if any.
    pub fn audio_file_path(&self) -> Option<PathBuf> {
        self.control().audio_file_path.clone()
    }

    fn replace_source(&self, buffer: Option<SourceBuffer>, path: Option<PathBuf>) {
        let loaded = buffer.is_some();
        self.shared
            .source
            .set(Shared::new(&self.shared.collector_handle, buffer));
        let mut control = self.control();
        control.audio_file_path = path.clone();
        // drop no longer used buffers
        control.collector.collect();
        drop(control);
        if loaded {
            self.shared
                .send_event(EngineEvent::AudioFileLoaded { path });
        }
    }

    // Events

    /// Set an observer which receives engine events via [`Self::dispatch_events`].
    pub fn set_observer(&self, observer: impl EngineObserver + 'static) {
        self.control().observer = Some(Box::new(observer));
    }

    pub fn remove_observer(&self) {
        self.control().observer = None;
    }

    /// Deliver all pending engine events to the observer and release no longer used audio
    /// buffers. Call this regularly from a control thread, e.g. in a UI's idle loop.
    /// Returns the number of dispatched events.
    pub fn dispatch_events(&self) -> usize {
        let mut control = self.control();
        let ControlState {
            observer,
            event_receiver,
            reported_dropped_events,
            collector,
            ..
        } = &mut *control;
        let dropped_events = self.dropped_event_count();
        if dropped_events > *reported_dropped_events {
            log::warn!(
                "Engine event queue overflowed, dropped {} events",
                dropped_events - *reported_dropped_events
            );
            *reported_dropped_events = dropped_events;
        }
        let mut count = 0;
        while let Ok(event) = event_receiver.try_recv() {
            if let Some(observer) = observer {
                observer.on_event(&event);
            }
            count += 1;
        }
        collector.collect();
        count
    }

    /// Total number of events which got dropped because the event queue was full.
    pub fn dropped_event_count(&self) -> u64 {
        self.shared.dropped_events.load(Ordering::Relaxed)
    }

    /// Last output sample frame (left, right) of the most recently processed block, e.g. for
    /// level meters.
    pub fn last_output_frame(&self) -> [f32; 2] {
        self.shared
            .last_output_frame
            .each_ref()
            .map(|sample| f32::from_bits(sample.load(Ordering::Relaxed)))
    }

    // State

    /// Capture the current parameters, points and loaded file path.
    pub fn state(&self) -> EngineState {
        let (mass_points, spawn_points) = {
            let scene = self.shared.scene.read();
            (scene.mass_points().to_vec(), scene.spawn_points().to_vec())
        };
        let control = self.control();
        EngineState {
            parameters: control.parameters,
            mass_points,
            spawn_points,
            canvas_bounds: control.canvas_bounds,
            audio_file_path: control.audio_file_path.clone(),
        }
    }

    /// Restore a previously captured state. Everything but the audio file gets restored,
    /// even when loading the audio file fails. Missing audio files are logged and returned
    /// as error.
    pub fn restore_state(&self, state: &EngineState) -> Result<(), Error> {
        self.set_parameter_values(state.parameters)?;
        self.set_scene(&state.mass_points, &state.spawn_points);
        if let Err(err) = self.set_canvas_bounds(state.canvas_bounds) {
            log::warn!("Ignoring stored canvas bounds: {err}");
        }
        match &state.audio_file_path {
            Some(path) => self.load_audio_file(path),
            None => {
                self.clear_audio_file();
                Ok(())
            }
        }
    }

    fn control(&self) -> MutexGuard<'_, ControlState> {
        self.shared
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn send_message(&self, message: EngineMessage) -> Result<(), Error> {
        self.shared.messages.push(message).map_err(|message| {
            log::warn!("Engine message queue is full, dropping {message:?}");
            Error::SendError("engine message queue is full".to_string())
        })
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineOptions};

    #[test]
    fn parameters() -> Result<(), Box<dyn std::error::Error>> {
        let (engine, handle) = Engine::new(EngineOptions::default())?;
        assert_eq!(handle.parameters().len(), 10);
        let grain_size = EngineParameter::GrainSize.id();
        assert_eq!(handle.parameter_value(grain_size)?, 50.0);
        assert_eq!(handle.set_parameter(grain_size, 1000.0)?, 500.0);
        assert_eq!(handle.set_parameter_normalized(grain_size, 0.0)?, 10.0);
        assert!(handle.set_parameter(FourCC(*b"????"), 1.0).is_err());
        handle.set_bounce_mode(true)?;
        assert!(handle.parameter_values().bounce_mode);
        // not yet processed by the engine
        assert!(!engine.parameters().bounce_mode);
        Ok(())
    }

    #[test]
    fn full_message_queue() -> Result<(), Box<dyn std::error::Error>> {
        let (_engine, handle) = Engine::new(EngineOptions::new().message_queue_size(2))?;
        handle.inject_midi_message(60, 1.0, true, None)?;
        handle.inject_midi_message(60, 1.0, false, None)?;
        assert!(matches!(
            handle.inject_midi_message(61, 1.0, true, None),
            Err(Error::SendError(_))
        ));
        Ok(())
    }

    #[test]
    fn full_event_queue_counts_dropped_events() -> Result<(), Box<dyn std::error::Error>> {
        let (mut engine, handle) = Engine::new(EngineOptions::new().event_queue_size(2))?;
        for note in 60..65 {
            handle.inject_midi_message(note, 1.0, true, None)?;
        }
        let mut output = vec![0.0; 256 * 2];
        engine.process(&mut output, 2, &[]);
        assert_eq!(handle.particles().len(), 5);
        assert_eq!(handle.dropped_event_count(), 3);
        assert_eq!(handle.dispatch_events(), 2);

        // the queue drained: new events get delivered again
        handle.inject_midi_message(70, 1.0, true, None)?;
        engine.process(&mut output, 2, &[]);
        assert_eq!(handle.dispatch_events(), 1);
        assert_eq!(handle.dropped_event_count(), 3);
        Ok(())
    }

    #[test]
    fn scene_limits() -> Result<(), Box<dyn std::error::Error>> {
        let (_engine, handle) = Engine::new(EngineOptions::default())?;
        assert_eq!(handle.mass_points().len(), 1);
        assert_eq!(handle.spawn_points().len(), 1);
        for _ in 1..Scene::MAX_SPAWN_POINTS {
            handle.add_spawn_point(Vector::new(10.0, 10.0), 0.0)?;
        }
        assert!(handle.add_spawn_point(Vector::ZERO, 0.0).is_err());
        handle.update_spawn_point(0, Vector::new(1.0, 2.0), 1.0)?;
        assert_eq!(handle.spawn_points()[0].position, Vector::new(1.0, 2.0));
        handle.remove_spawn_point(0)?;
        assert_eq!(handle.spawn_points().len(), Scene::MAX_SPAWN_POINTS - 1);
        Ok(())
    }

    #[test]
    fn canvas_bounds() -> Result<(), Box<dyn std::error::Error>> {
        let (_engine, handle) = Engine::new(EngineOptions::default())?;
        assert_eq!(handle.canvas_bounds(), Rect::default());
        handle.set_canvas_bounds(Rect::new(10.0, 10.0, 200.0, 100.0))?;
        assert_eq!(handle.canvas_bounds(), Rect::new(10.0, 10.0, 200.0, 100.0));
        assert!(handle
            .set_canvas_bounds(Rect::new(0.0, 0.0, -1.0, 100.0))
            .is_err());
        assert!(handle
            .set_canvas_bounds(Rect::new(0.0, f32::INFINITY, 1.0, 100.0))
            .is_err());
        Ok(())
    }

    #[test]
    fn audio_files() -> Result<(), Box<dyn std::error::Error>> {
        let (_engine, handle) = Engine::new(EngineOptions::default())?;
        assert!(matches!(
            handle.load_audio_file("does/not/exist.wav"),
            Err(Error::MediaFileNotFound)
        ));
        assert_eq!(handle.audio_file_path(), None);

        let path = std::env::temp_dir().join("grainfield-handle-test.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec)?;
        for i in 0..2048 {
            writer.write_sample((i as f32 * 0.01).sin())?;
        }
        writer.finalize()?;

        handle.load_audio_file(&path)?;
        assert_eq!(handle.audio_file_path(), Some(path.clone()));
        let mut events = vec![];
        handle.set_observer({
            let path = path.clone();
            move |event: &EngineEvent| {
                assert_eq!(
                    *event,
                    EngineEvent::AudioFileLoaded {
                        path: Some(path.clone())
                    }
                );
                events.push(event.clone());
            }
        });
        assert_eq!(handle.dispatch_events(), 1);

        handle.clear_audio_file();
        assert_eq!(handle.audio_file_path(), None);
        let _ = std::fs::remove_file(&path);
        Ok(())
    }

    #[test]
    fn capture_and_restore_state() -> Result<(), Box<dyn std::error::Error>> {
        let (_engine, handle) = Engine::new(EngineOptions::default())?;
        handle.set_parameter(EngineParameter::Release.id(), 2.0)?;
        handle.add_mass_point(Vector::new(400.0, 300.0), 2.0)?;
        handle.set_bounce_mode(true)?;
        let state = handle.state();
        assert_eq!(state.mass_points.len(), 2);
        assert_eq!(state.parameters.release_time, 2.0);

        let (_other_engine, other) = Engine::new(EngineOptions::default())?;
        other.restore_state(&state)?;
        assert_eq!(other.state(), state);

        // missing files: everything else still gets restored
        let broken = EngineState {
            audio_file_path: Some(PathBuf::from("does/not/exist.wav")),
            ..EngineState::default()
        };
        assert!(other.restore_state(&broken).is_err());
        assert_eq!(other.parameter_values(), EngineParameters::default());
        assert_eq!(other.mass_points(), broken.mass_points);
        Ok(())
    }
}
