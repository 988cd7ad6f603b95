//! The real-time engine: block processing on the audio thread and its control handle.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use basedrop::{Collector, Shared, SharedCell};
use crossbeam_channel::{Receiver, Sender};
use crossbeam_queue::ArrayQueue;

use crate::{
    geometry::Rect,
    guard::ConcurrencyGuard,
    particle::{Particle, ParticleState},
    renderer::{GranularRenderer, RenderSettings},
    router::VoiceRouter,
    scene::Scene,
    simulation::{ParticleSimulation, MAX_PARTICLES_LIMIT},
    source::SourceBuffer,
    utils::{envelope::EnvelopeParameters, soft_clip},
    Error,
};

// -------------------------------------------------------------------------------------------------

mod events;
pub use events::{EngineEvent, EngineObserver};

mod handle;
pub use handle::EngineHandle;

mod midi;
pub use midi::{MidiEvent, MidiMessage};

mod options;
pub use options::EngineOptions;

mod parameters;
pub use parameters::{EngineParameter, EngineParameters, MIN_MASTER_GAIN_DB};

mod state;
pub use state::EngineState;

// -------------------------------------------------------------------------------------------------

/// Messages from control threads to the audio thread.
#[derive(Debug, Clone, Copy)]
enum EngineMessage {
    SetParameter(EngineParameter, f32),
    SetParameters(EngineParameters),
    SetCanvasBounds(Rect),
    Midi(MidiMessage),
    ClearParticles,
}

// -------------------------------------------------------------------------------------------------

/// Control thread only state.
struct ControlState {
    parameters: EngineParameters,
    canvas_bounds: Rect,
    audio_file_path: Option<PathBuf>,
    observer: Option<Box<dyn EngineObserver>>,
    event_receiver: Receiver<EngineEvent>,
    reported_dropped_events: u64,
    collector: Collector,
}

/// State shared between the [`Engine`] and all its [`EngineHandle`]s.
struct EngineShared {
    sample_rate: u32,
    simulation: ConcurrencyGuard<ParticleSimulation>,
    scene: ConcurrencyGuard<Scene>,
    scene_revision: AtomicU64,
    source: SharedCell<Option<SourceBuffer>>,
    collector_handle: basedrop::Handle,
    messages: ArrayQueue<EngineMessage>,
    event_sender: Sender<EngineEvent>,
    dropped_events: AtomicU64,
    last_output_frame: [AtomicU32; 2],
    control: Mutex<ControlState>,
}

impl EngineShared {
    /// Events are informative only: when the control thread doesn't keep up, they get dropped
    /// and counted.
    fn send_event(&self, event: EngineEvent) {
        if self.event_sender.try_send(event).is_err() {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Audio thread side of the particle engine.
///
/// Owned by the audio callback, which calls [`Engine::process`] once per audio block. All
/// control happens through the [`EngineHandle`] which gets created along with the engine.
///
/// Processing a block:
/// 1. Apply pending control messages and the block's MIDI events, in order.
/// 2. Take a snapshot of the mass and spawn points, when they changed.
/// 3. Step the particle simulation and copy the particle states.
/// 4. Render grains of the copied particle states, without holding any locks.
/// 5. Soft clip the output.
pub struct Engine {
    shared: Arc<EngineShared>,
    sample_rate: u32,
    max_block_size: usize,
    parameters: EngineParameters,
    envelope_parameters: EnvelopeParameters,
    canvas_bounds: Rect,
    scene: Scene,
    scene_revision: u64,
    router: VoiceRouter,
    renderer: GranularRenderer,
    states: Vec<ParticleState>,
    source: Shared<Option<SourceBuffer>>,
    last_output_frame: [f32; 2],
}

impl Engine {
    /// Create a new engine and its control handle with the given options.
    pub fn new(options: EngineOptions) -> Result<(Self, EngineHandle), Error> {
        options.validate()?;

        let parameters = EngineParameters {
            max_particles: options.max_particles,
            ..EngineParameters::default()
        };
        let mut simulation = ParticleSimulation::new(parameters.max_particles);
        simulation.set_gravity_strength(parameters.gravity_strength);

        let scene = Scene::default();
        let mut scene_snapshot = Scene::empty();
        scene.copy_into(&mut scene_snapshot);

        let collector = Collector::new();
        let collector_handle = collector.handle();
        let source = SharedCell::new(Shared::new(&collector_handle, None));

        let (event_sender, event_receiver) = crossbeam_channel::bounded(options.event_queue_size);

        let shared = Arc::new(EngineShared {
            sample_rate: options.sample_rate,
            simulation: ConcurrencyGuard::new(simulation),
            scene: ConcurrencyGuard::new(scene),
            scene_revision: AtomicU64::new(0),
            source,
            collector_handle,
            messages: ArrayQueue::new(options.message_queue_size),
            event_sender,
            dropped_events: AtomicU64::new(0),
            last_output_frame: [AtomicU32::new(0), AtomicU32::new(0)],
            control: Mutex::new(ControlState {
                parameters,
                canvas_bounds: options.canvas_bounds,
                audio_file_path: None,
                observer: None,
                event_receiver,
                reported_dropped_events: 0,
                collector,
            }),
        });

        let mut renderer = GranularRenderer::new(options.sample_rate, options.max_block_size);
        renderer.init_master_gain(parameters.master_gain());

        let engine = Self {
            source: shared.source.get(),
            shared: Arc::clone(&shared),
            sample_rate: options.sample_rate,
            max_block_size: options.max_block_size,
            parameters,
            envelope_parameters: parameters.envelope_parameters(),
            canvas_bounds: options.canvas_bounds,
            scene: scene_snapshot,
            scene_revision: 0,
            router: VoiceRouter::new(),
            renderer,
            states: Vec::with_capacity(MAX_PARTICLES_LIMIT),
            last_output_frame: [0.0; 2],
        };
        log::info!(
            "Created engine with sample rate {} and max block size {}",
            options.sample_rate,
            options.max_block_size
        );
        Ok((engine, EngineHandle::new(shared)))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current parameter values, as seen by the audio thread.
    pub fn parameters(&self) -> &EngineParameters {
        &self.parameters
    }

    /// Last output sample frame (left, right) of the previously processed block.
    pub fn last_output_frame(&self) -> [f32; 2] {
        self.last_output_frame
    }

    /// Process a block of audio: `output` is an interleaved buffer with `channel_count`
    /// channels, which gets overwritten. `midi_events` must be sorted by frame offset: all
    /// events get applied at the start of the block.
    ///
    /// Never allocates, never blocks on I/O and only briefly locks the particle simulation.
    pub fn process(&mut self, output: &mut [f32], channel_count: usize, midi_events: &[MidiEvent]) {
        #[cfg(feature = "assert-allocs")]
        assert_no_alloc::assert_no_alloc(|| self.process_block(output, channel_count, midi_events));
        #[cfg(not(feature = "assert-allocs"))]
        self.process_block(output, channel_count, midi_events);
    }

    fn process_block(&mut self, output: &mut [f32], channel_count: usize, midi_events: &[MidiEvent]) {
        output.fill(0.0);
        if channel_count == 0 || output.is_empty() {
            return;
        }
        // pick up newly loaded source buffers: replaced buffers get dropped in the collector
        self.source = self.shared.source.get();
        self.update_scene();

        let shared = Arc::clone(&self.shared);
        let mut midi_events = Some(midi_events);
        for chunk in output.chunks_mut(self.max_block_size * channel_count) {
            let frame_count = chunk.len() / channel_count;
            {
                let mut simulation = shared.simulation.lock();
                while let Some(message) = shared.messages.pop() {
                    self.handle_message(&mut simulation, message);
                }
                for event in midi_events.take().unwrap_or_default() {
                    self.handle_midi(&mut simulation, event.message);
                }
                simulation.step(
                    frame_count,
                    self.sample_rate,
                    self.scene.mass_points(),
                    self.parameters.bounce_mode,
                    self.canvas_bounds,
                    |particle| {
                        shared.send_event(EngineEvent::ParticleRetired {
                            id: particle.id(),
                            note: particle.midi_note(),
                        })
                    },
                );
                simulation.copy_states(&mut self.states);
            }
            let settings = RenderSettings {
                sample_rate: self.sample_rate,
                grain_size_ms: self.parameters.grain_size_ms,
                grain_frequency: self.parameters.grain_frequency,
                master_gain: self.parameters.master_gain(),
                canvas_bounds: self.canvas_bounds,
                edge_fade: !self.parameters.bounce_mode,
            };
            self.renderer.render(
                chunk,
                channel_count,
                &self.states,
                (*self.source).as_ref(),
                &settings,
            );
        }

        for sample in output.iter_mut() {
            *sample = soft_clip(*sample);
        }
        if let Some(frame) = output.chunks_exact(channel_count).last() {
            self.last_output_frame = if channel_count == 1 {
                [frame[0], frame[0]]
            } else {
                [frame[0], frame[1]]
            };
            for (target, sample) in self.shared.last_output_frame.iter().zip(self.last_output_frame) {
                target.store(sample.to_bits(), Ordering::Relaxed);
            }
        }
    }

    /// Copy the mass and spawn points, when they changed since the last block. Skipped when
    /// the points currently get edited: changes then get picked up in the next block.
    fn update_scene(&mut self) {
        let revision = self.shared.scene_revision.load(Ordering::Acquire);
        if revision != self.scene_revision {
            if let Some(scene) = self.shared.scene.try_lock() {
                scene.copy_into(&mut self.scene);
                self.scene_revision = revision;
            }
        }
    }

    fn handle_message(&mut self, simulation: &mut ParticleSimulation, message: EngineMessage) {
        match message {
            EngineMessage::SetParameter(parameter, value) => {
                self.parameters.set_value(parameter, value);
                self.apply_parameter(simulation, parameter);
            }
            EngineMessage::SetParameters(parameters) => {
                self.parameters = parameters.sanitized();
                self.envelope_parameters = self.parameters.envelope_parameters();
                self.apply_parameter(simulation, EngineParameter::Gravity);
                self.apply_parameter(simulation, EngineParameter::MaxParticles);
            }
            EngineMessage::SetCanvasBounds(bounds) => {
                self.canvas_bounds = bounds;
            }
            EngineMessage::Midi(message) => {
                self.handle_midi(simulation, message);
            }
            EngineMessage::ClearParticles => {
                simulation.clear();
                self.router.reset();
            }
        }
    }

    fn apply_parameter(&mut self, simulation: &mut ParticleSimulation, parameter: EngineParameter) {
        match parameter {
            EngineParameter::Attack
            | EngineParameter::Decay
            | EngineParameter::Sustain
            | EngineParameter::Release => {
                self.envelope_parameters = self.parameters.envelope_parameters();
            }
            EngineParameter::Gravity => {
                simulation.set_gravity_strength(self.parameters.gravity_strength);
            }
            EngineParameter::MaxParticles => {
                let shared = &self.shared;
                simulation.set_max_particles(self.parameters.max_particles, |particle| {
                    shared.send_event(Self::evicted_event(particle))
                });
            }
            EngineParameter::GrainSize
            | EngineParameter::GrainFrequency
            | EngineParameter::MasterGain
            | EngineParameter::BounceMode => {
                // applied while rendering
            }
        }
    }

    fn handle_midi(&mut self, simulation: &mut ParticleSimulation, message: MidiMessage) {
        match message {
            MidiMessage::NoteOn {
                note,
                velocity,
                pitch_ratio,
            } => {
                let velocity = if velocity.is_finite() {
                    velocity.clamp(0.0, 1.0)
                } else {
                    1.0
                };
                let pitch_ratio = pitch_ratio.filter(|ratio| ratio.is_finite() && *ratio > 0.0);
                let result = self.router.note_on(
                    simulation,
                    self.scene.spawn_points(),
                    &self.canvas_bounds,
                    note,
                    velocity,
                    pitch_ratio,
                    self.envelope_parameters,
                );
                if let Some((id, note)) = result.evicted {
                    self.shared
                        .send_event(EngineEvent::ParticleEvicted { id, note });
                }
                self.shared.send_event(EngineEvent::ParticleSpawned {
                    id: result.id,
                    note,
                });
            }
            MidiMessage::NoteOff { note } => {
                self.router.note_off(simulation, note);
            }
            MidiMessage::AllNotesOff => {
                simulation.release_all();
            }
        }
    }

    fn evicted_event(particle: &Particle) -> EngineEvent {
        EngineEvent::ParticleEvicted {
            id: particle.id(),
            note: particle.midi_note(),
        }
    }
}

// -------------------------------------------------------------------------------------------------
