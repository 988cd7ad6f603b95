//! Granular synthesis: renders one windowed grain stream per particle.

use crate::{
    geometry::Rect,
    particle::{ParticleId, ParticleState},
    simulation::MAX_PARTICLES_LIMIT,
    source::SourceBuffer,
    utils::{
        panning_factors,
        smoothed::{ExponentialSmoothedValue, SmoothedValue},
        window::HANN_WINDOW,
    },
};

// -------------------------------------------------------------------------------------------------

/// Number of frames a grain's read cursor crossfades with its previous position when it wraps
/// around the grain's loop region.
pub const LOOP_CROSSFADE_FRAMES: usize = 32;

/// Number of frames voices fade out when their particle vanished without a release phase,
/// e.g. because it got evicted.
pub const VOICE_FADE_OUT_FRAMES: usize = 64;

/// Width of the zone, in canvas units, in which particles fade out towards the left and right
/// canvas edges when wrapping around the canvas.
pub const EDGE_FADE_WIDTH: f32 = 20.0;

/// Lower bound of the gain compensation factor.
const MIN_GAIN_COMPENSATION: f32 = 0.1;

// -------------------------------------------------------------------------------------------------

/// Per block render parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Output sample rate.
    pub sample_rate: u32,
    /// Grain (window) length in milliseconds.
    pub grain_size_ms: f32,
    /// Grain retrigger rate in Hz.
    pub grain_frequency: f32,
    /// Linear master gain.
    pub master_gain: f32,
    /// Canvas bounds, used to map particle positions to panning and grain start positions.
    pub canvas_bounds: Rect,
    /// Fade out particles close to the left and right canvas edges. Used in wrap mode, where
    /// particles jump from one edge to the other.
    pub edge_fade: bool,
}

impl RenderSettings {
    /// Panning and amplitude of a particle at the given state.
    fn voice_gains(&self, state: &ParticleState) -> (f32, f32, f32) {
        let bounds = &self.canvas_bounds;
        let normalized = bounds.normalize(state.position);
        let (pan_left, pan_right) = panning_factors(normalized.x * 2.0 - 1.0);
        let edge_gain = if self.edge_fade && bounds.width > 2.0 * EDGE_FADE_WIDTH {
            let edge_distance = (state.position.x - bounds.left())
                .min(bounds.right() - state.position.x);
            (edge_distance / EDGE_FADE_WIDTH).clamp(0.0, 1.0)
        } else {
            1.0
        };
        (state.velocity_gain * edge_gain, pan_left, pan_right)
    }
}

// -------------------------------------------------------------------------------------------------

/// Grain timing, derived from the render settings and source buffer once per block.
#[derive(Debug, Clone, Copy)]
struct GrainTiming {
    /// Source frames per output frame at pitch ratio 1.
    speed_scale: f64,
    /// Window phase increment per output frame.
    window_increment: f64,
    /// Output frames between two grain triggers.
    grain_period: usize,
    /// Size of the grain's loop region in source frames.
    region_frames: f64,
    /// Last valid region start in source frames.
    max_region_start: f64,
}

impl GrainTiming {
    fn new(settings: &RenderSettings, source: &SourceBuffer) -> Self {
        let output_rate = settings.sample_rate.max(1) as f64;
        let speed_scale = source.sample_rate() as f64 / output_rate;
        let grain_size_ms = if settings.grain_size_ms.is_finite() {
            settings.grain_size_ms.max(1.0)
        } else {
            50.0
        };
        let grain_length = (grain_size_ms as f64 * output_rate / 1000.0).max(1.0);
        let grain_frequency = if settings.grain_frequency.is_finite() {
            settings.grain_frequency.max(0.1)
        } else {
            20.0
        };
        let grain_period = (output_rate / grain_frequency as f64)
            .max(grain_length)
            .round() as usize;
        let frame_count = source.frame_count() as f64;
        let region_frames = (grain_length * speed_scale).clamp(1.0, frame_count.max(1.0));
        let max_region_start = (frame_count - region_frames).max(0.0);
        Self {
            speed_scale,
            window_increment: 1.0 / grain_length,
            grain_period: grain_period.max(1),
            region_frames,
            max_region_start,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Audio thread state of a single particle's grain stream.
#[derive(Debug, Clone)]
struct GrainVoice {
    particle: ParticleId,
    /// Particle's normalized vertical position, which selects the grain start.
    grain_position: f32,
    pitch_ratio: f32,
    // running grain
    grain_active: bool,
    grain_start: f64,
    read_offset: f64,
    window_phase: f64,
    next_grain_countdown: usize,
    crossfade_offset: f64,
    crossfade_remaining: usize,
    // gains: ramped from the previous to the current block's values
    envelope: (f32, f32),
    gain: (f32, f32),
    pan_left: (f32, f32),
    pan_right: (f32, f32),
    // fade out of vanished particles
    fade_out_remaining: Option<usize>,
    finished: bool,
}

impl GrainVoice {
    fn new(state: &ParticleState, settings: &RenderSettings) -> Self {
        let (gain, pan_left, pan_right) = settings.voice_gains(state);
        Self {
            particle: state.id,
            grain_position: settings.canvas_bounds.normalize(state.position).y,
            pitch_ratio: state.pitch_ratio,
            grain_active: false,
            grain_start: 0.0,
            read_offset: 0.0,
            window_phase: 0.0,
            next_grain_countdown: 0,
            crossfade_offset: 0.0,
            crossfade_remaining: 0,
            envelope: (state.previous_envelope_level, state.envelope_level),
            gain: (gain, gain),
            pan_left: (pan_left, pan_left),
            pan_right: (pan_right, pan_right),
            fade_out_remaining: None,
            finished: false,
        }
    }

    fn update(&mut self, state: &ParticleState, settings: &RenderSettings) {
        let (gain, pan_left, pan_right) = settings.voice_gains(state);
        self.grain_position = settings.canvas_bounds.normalize(state.position).y;
        self.pitch_ratio = state.pitch_ratio;
        self.envelope = (state.previous_envelope_level, state.envelope_level);
        self.gain = (self.gain.1, gain);
        self.pan_left = (self.pan_left.1, pan_left);
        self.pan_right = (self.pan_right.1, pan_right);
    }

    /// Particle vanished: hold the last gains and fade out.
    fn start_fade_out(&mut self) {
        if self.fade_out_remaining.is_none() {
            self.envelope = (self.envelope.1, self.envelope.1);
            self.gain = (self.gain.1, self.gain.1);
            self.pan_left = (self.pan_left.1, self.pan_left.1);
            self.pan_right = (self.pan_right.1, self.pan_right.1);
            self.fade_out_remaining = Some(VOICE_FADE_OUT_FRAMES);
        }
    }

    fn is_fading_out(&self) -> bool {
        self.fade_out_remaining.is_some()
    }

    fn trigger_grain(&mut self, timing: &GrainTiming) {
        self.grain_active = true;
        self.grain_start = self.grain_position as f64 * timing.max_region_start;
        self.read_offset = 0.0;
        self.window_phase = 0.0;
        self.crossfade_remaining = 0;
        self.next_grain_countdown = timing.grain_period;
    }

    /// Render the voice's grains into the given stereo interleaved mix buffer.
    fn render(&mut self, mix_buffer: &mut [f32], source: &SourceBuffer, timing: &GrainTiming) {
        let frame_count = mix_buffer.len() / 2;
        if frame_count == 0 {
            return;
        }
        let increment = self.pitch_ratio as f64 * timing.speed_scale;
        let ramp_step = 1.0 / frame_count as f32;
        for (frame_index, frame) in mix_buffer.chunks_exact_mut(2).enumerate() {
            let fade = match self.fade_out_remaining {
                Some(0) => {
                    self.finished = true;
                    break;
                }
                Some(remaining) => {
                    self.fade_out_remaining = Some(remaining - 1);
                    remaining as f32 / VOICE_FADE_OUT_FRAMES as f32
                }
                None => 1.0,
            };

            if !self.grain_active && self.next_grain_countdown == 0 {
                self.trigger_grain(timing);
            }
            self.next_grain_countdown = self.next_grain_countdown.saturating_sub(1);
            if !self.grain_active {
                continue;
            }

            let mut sample = source.interpolated_frame(self.grain_start + self.read_offset);
            if self.crossfade_remaining > 0 {
                let tail = source.interpolated_frame(self.grain_start + self.crossfade_offset);
                let tail_amount = self.crossfade_remaining as f32 / LOOP_CROSSFADE_FRAMES as f32;
                sample = sample * (1.0 - tail_amount) + tail * tail_amount;
                self.crossfade_offset += increment;
                self.crossfade_remaining -= 1;
            }

            let ramp = (frame_index + 1) as f32 * ramp_step;
            let lerp = |(from, to): (f32, f32)| from + (to - from) * ramp;
            let amplitude = HANN_WINDOW.sample(self.window_phase)
                * lerp(self.envelope)
                * lerp(self.gain)
                * fade;
            let sample = sample * amplitude;
            frame[0] += sample * lerp(self.pan_left);
            frame[1] += sample * lerp(self.pan_right);

            self.read_offset += increment;
            if self.read_offset >= timing.region_frames {
                // loop within the grain region, crossfading with the cursor's old position
                self.crossfade_offset = self.read_offset;
                self.crossfade_remaining = LOOP_CROSSFADE_FRAMES;
                self.read_offset %= timing.region_frames;
            }
            self.window_phase += timing.window_increment;
            if self.window_phase >= 1.0 {
                self.grain_active = false;
            }
        }
        if self.fade_out_remaining == Some(0) {
            self.finished = true;
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Renders the grains of all live particles into an output buffer.
///
/// Voices are matched to particles by id. Voice state (read cursors, grain clocks) lives in the
/// renderer only, so rendering runs on a plain particle state snapshot without holding any
/// lock. All buffers are preallocated: rendering never allocates.
#[derive(Debug)]
pub struct GranularRenderer {
    voices: Vec<GrainVoice>,
    mix_buffer: Vec<f32>,
    max_frames: usize,
    gain_compensation: ExponentialSmoothedValue,
    master_gain: ExponentialSmoothedValue,
}

impl GranularRenderer {
    /// Create a new renderer which renders at most `max_frames` frames per call.
    pub fn new(sample_rate: u32, max_frames: usize) -> Self {
        let max_frames = max_frames.max(1);
        Self {
            voices: Vec::with_capacity(2 * MAX_PARTICLES_LIMIT),
            mix_buffer: vec![0.0; 2 * max_frames],
            max_frames,
            gain_compensation: ExponentialSmoothedValue::new(1.0, sample_rate),
            master_gain: ExponentialSmoothedValue::new(1.0, sample_rate),
        }
    }

    /// Max number of frames a single render call accepts.
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Number of voices of live particles.
    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_fading_out()).count()
    }

    /// Number of voices which still are fading out.
    pub fn fading_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_fading_out()).count()
    }

    /// Current (smoothed) gain compensation factor.
    pub fn gain_compensation(&self) -> f32 {
        self.gain_compensation.current()
    }

    /// Set the master gain without ramping, e.g. when restoring a state.
    pub fn init_master_gain(&mut self, gain: f32) {
        self.master_gain.init(gain);
    }

    /// Drop all voices immediately.
    pub fn reset(&mut self) {
        self.voices.clear();
        self.gain_compensation.init(1.0);
    }

    /// Render the given particle states into the interleaved output buffer. Output gets added
    /// to the existing buffer content. Output buffers with more than `max_frames` frames are
    /// only partially rendered. Mono outputs receive the average of both stereo channels;
    /// outputs with more than two channels receive the stereo signal in their first two
    /// channels.
    ///
    /// `states` must be sorted by particle id, as produced by the simulation.
    pub fn render(
        &mut self,
        output: &mut [f32],
        channel_count: usize,
        states: &[ParticleState],
        source: Option<&SourceBuffer>,
        settings: &RenderSettings,
    ) {
        if channel_count == 0 {
            return;
        }
        let frame_count = (output.len() / channel_count).min(self.max_frames);
        self.sync_voices(states, settings);

        let mix_buffer = &mut self.mix_buffer[..2 * frame_count];
        mix_buffer.fill(0.0);
        match source.filter(|source| !source.is_empty()) {
            Some(source) => {
                let timing = GrainTiming::new(settings, source);
                for voice in &mut self.voices {
                    voice.render(mix_buffer, source, &timing);
                }
            }
            None => {
                // nothing to play: drop fading voices
                for voice in &mut self.voices {
                    if voice.is_fading_out() {
                        voice.finished = true;
                    }
                }
            }
        }
        self.voices.retain(|voice| !voice.finished);

        let active_voices = states.len();
        let compensation = if active_voices > 1 {
            (1.0 / (active_voices as f32).sqrt()).max(MIN_GAIN_COMPENSATION)
        } else {
            1.0
        };
        self.gain_compensation.set_target(compensation);
        let master_gain = if settings.master_gain.is_finite() {
            settings.master_gain.max(0.0)
        } else {
            0.0
        };
        self.master_gain.set_target(master_gain);

        let frames = mix_buffer.chunks_exact(2);
        match channel_count {
            1 => {
                for (out, mix) in output.iter_mut().zip(frames) {
                    let gain = self.gain_compensation.next() * self.master_gain.next();
                    *out += (mix[0] + mix[1]) * 0.5 * gain;
                }
            }
            2 => {
                for (out, mix) in output.chunks_exact_mut(2).zip(frames) {
                    let gain = self.gain_compensation.next() * self.master_gain.next();
                    out[0] += mix[0] * gain;
                    out[1] += mix[1] * gain;
                }
            }
            _ => {
                for (out, mix) in output.chunks_exact_mut(channel_count).zip(frames) {
                    let gain = self.gain_compensation.next() * self.master_gain.next();
                    out[0] += mix[0] * gain;
                    out[1] += mix[1] * gain;
                }
            }
        }
    }

    /// Match voices with particle states. Both lists are sorted by particle id: voices of
    /// vanished particles start fading out, new particles get a new voice.
    fn sync_voices(&mut self, states: &[ParticleState], settings: &RenderSettings) {
        let mut voice_index = 0;
        for state in states {
            while voice_index < self.voices.len() && self.voices[voice_index].particle < state.id
            {
                self.voices[voice_index].start_fade_out();
                voice_index += 1;
            }
            if voice_index < self.voices.len() && self.voices[voice_index].particle == state.id {
                self.voices[voice_index].update(state, settings);
                voice_index += 1;
            } else if self.voices.len() < self.voices.capacity() {
                self.voices
                    .insert(voice_index, GrainVoice::new(state, settings));
                voice_index += 1;
            }
        }
        for voice in &mut self.voices[voice_index..] {
            voice.start_fade_out();
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{geometry::Vector, utils::envelope::EnvelopePhase};

    const SAMPLE_RATE: u32 = 48000;
    const BLOCK_SIZE: usize = 256;

    fn settings() -> RenderSettings {
        RenderSettings {
            sample_rate: SAMPLE_RATE,
            grain_size_ms: 50.0,
            grain_frequency: 20.0,
            master_gain: 1.0,
            canvas_bounds: Rect::new(0.0, 0.0, 400.0, 400.0),
            edge_fade: false,
        }
    }

    fn state(id: u64, x: f32, level: f32) -> ParticleState {
        ParticleState {
            id: ParticleId(id),
            position: Vector::new(x, 200.0),
            velocity: Vector::ZERO,
            midi_note: 60,
            pitch_ratio: 1.0,
            velocity_gain: 1.0,
            envelope_phase: EnvelopePhase::Sustain,
            envelope_level: level,
            previous_envelope_level: level,
            sustain_level: 1.0,
        }
    }

    fn sine_buffer() -> SourceBuffer {
        let samples = (0..SAMPLE_RATE as usize)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / SAMPLE_RATE as f32).sin())
            .collect::<Vec<_>>();
        SourceBuffer::new(samples, 1, SAMPLE_RATE).unwrap()
    }

    #[test]
    fn silent_source_renders_silence() -> Result<(), Box<dyn std::error::Error>> {
        let source = SourceBuffer::silence(SAMPLE_RATE as usize, 2, SAMPLE_RATE)?;
        let mut renderer = GranularRenderer::new(SAMPLE_RATE, BLOCK_SIZE);
        let mut settings = settings();
        let mut output = vec![0.0; BLOCK_SIZE * 2];
        for (pitch, grain_size) in [(0.25, 10.0), (1.0, 50.0), (3.7, 500.0)] {
            settings.grain_size_ms = grain_size;
            let mut states = vec![state(1, 50.0, 1.0), state(2, 350.0, 0.5)];
            for s in &mut states {
                s.pitch_ratio = pitch;
            }
            for _ in 0..20 {
                renderer.render(&mut output, 2, &states, Some(&source), &settings);
            }
        }
        assert!(output.iter().all(|s| *s == 0.0));
        Ok(())
    }

    #[test]
    fn missing_source_renders_nothing() {
        let mut renderer = GranularRenderer::new(SAMPLE_RATE, BLOCK_SIZE);
        let mut output = vec![0.25; BLOCK_SIZE * 2];
        renderer.render(&mut output, 2, &[state(1, 100.0, 1.0)], None, &settings());
        // additive: existing content stays untouched
        assert!(output.iter().all(|s| *s == 0.25));
        assert_eq!(renderer.active_voice_count(), 1);
    }

    #[test]
    fn renders_grains() {
        let source = sine_buffer();
        let mut renderer = GranularRenderer::new(SAMPLE_RATE, BLOCK_SIZE);
        let states = [state(1, 200.0, 1.0)];
        let mut energy = 0.0;
        for _ in 0..20 {
            let mut output = vec![0.0; BLOCK_SIZE * 2];
            renderer.render(&mut output, 2, &states, Some(&source), &settings());
            assert!(output.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
            energy += output.iter().map(|s| s * s).sum::<f32>();
            // centered particle: equal power on both channels
            for frame in output.chunks_exact(2) {
                assert!((frame[0] - frame[1]).abs() < 1e-5);
            }
        }
        assert!(energy > 0.0);
    }

    #[test]
    fn constant_power_pan_by_position() {
        let source = sine_buffer();
        let render_energy = |x: f32| {
            let mut renderer = GranularRenderer::new(SAMPLE_RATE, BLOCK_SIZE);
            let states = [state(1, x, 1.0)];
            let (mut left, mut right) = (0.0, 0.0);
            for _ in 0..20 {
                let mut output = vec![0.0; BLOCK_SIZE * 2];
                renderer.render(&mut output, 2, &states, Some(&source), &settings());
                for frame in output.chunks_exact(2) {
                    left += frame[0] * frame[0];
                    right += frame[1] * frame[1];
                }
            }
            (left, right)
        };
        let (left, right) = render_energy(0.0);
        assert!(left > 0.0 && right < left * 1e-6);
        let (left, right) = render_energy(400.0);
        assert!(right > 0.0 && left < right * 1e-6);
    }

    #[test]
    fn edge_fade_in_wrap_mode() {
        let source = sine_buffer();
        let mut settings = settings();
        settings.edge_fade = true;
        let mut renderer = GranularRenderer::new(SAMPLE_RATE, BLOCK_SIZE);
        let mut output = vec![0.0; BLOCK_SIZE * 2];
        for _ in 0..20 {
            renderer.render(&mut output, 2, &[state(1, 0.0, 1.0)], Some(&source), &settings);
        }
        assert!(output.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn voices_follow_particles() {
        let source = sine_buffer();
        let mut renderer = GranularRenderer::new(SAMPLE_RATE, BLOCK_SIZE);
        let mut output = vec![0.0; BLOCK_SIZE * 2];
        let settings = settings();
        renderer.render(
            &mut output,
            2,
            &[state(1, 10.0, 1.0), state(2, 20.0, 1.0), state(3, 30.0, 1.0)],
            Some(&source),
            &settings,
        );
        assert_eq!(renderer.active_voice_count(), 3);

        // particle 2 vanished, particle 4 is new
        renderer.render(
            &mut output,
            2,
            &[state(1, 10.0, 1.0), state(3, 30.0, 1.0), state(4, 40.0, 1.0)],
            Some(&source),
            &settings,
        );
        assert_eq!(renderer.active_voice_count(), 3);
        // fade out is shorter than a block
        assert_eq!(renderer.fading_voice_count(), 0);

        renderer.render(&mut output, 2, &[], Some(&source), &settings);
        assert_eq!(renderer.active_voice_count(), 0);
        assert_eq!(renderer.fading_voice_count(), 0);
    }

    #[test]
    fn gain_compensation() {
        let source = sine_buffer();
        let mut renderer = GranularRenderer::new(SAMPLE_RATE, BLOCK_SIZE);
        let states = (1..=16).map(|id| state(id, 200.0, 1.0)).collect::<Vec<_>>();
        let mut output = vec![0.0; BLOCK_SIZE * 2];
        for _ in 0..200 {
            renderer.render(&mut output, 2, &states, Some(&source), &settings());
        }
        assert!((renderer.gain_compensation() - 0.25).abs() < 1e-3);
    }

    #[test]
    fn multi_channel_outputs() {
        let source = sine_buffer();
        let states = [state(1, 200.0, 1.0)];
        for channel_count in [1, 4] {
            let mut renderer = GranularRenderer::new(SAMPLE_RATE, BLOCK_SIZE);
            let mut energy = vec![0.0; channel_count];
            for _ in 0..10 {
                let mut output = vec![0.0; BLOCK_SIZE * channel_count];
                renderer.render(&mut output, channel_count, &states, Some(&source), &settings());
                for frame in output.chunks_exact(channel_count) {
                    for (e, s) in energy.iter_mut().zip(frame) {
                        *e += s * s;
                    }
                }
            }
            assert!(energy[0] > 0.0);
            if channel_count == 4 {
                assert!(energy[1] > 0.0);
                assert_eq!(energy[2], 0.0);
                assert_eq!(energy[3], 0.0);
            }
        }
    }
}
