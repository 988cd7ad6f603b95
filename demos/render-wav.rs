//! Renders a short scripted grain performance offline into a wav file.

use std::{path::PathBuf, time::Duration};

use grainfield::{
    Engine, EngineEvent, EngineOptions, Error, MidiEvent, MidiMessage, OutputDevice, Vector,
    WavOutput,
};

// -------------------------------------------------------------------------------------------------

// Common demo code
#[path = "./common/arguments.rs"]
mod arguments;

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const SAMPLE_RATE: u32 = 44100;
const CHANNEL_COUNT: usize = 2;

/// (note, start in ms, length in ms)
const SEQUENCE: [(u8, u64, u64); 6] = [
    (48, 0, 2000),
    (55, 500, 1500),
    (60, 1000, 2500),
    (64, 1500, 1000),
    (67, 2500, 1500),
    (72, 3000, 1000),
];
const TAIL: Duration = Duration::from_secs(3);

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    let args = arguments::parse();

    let (mut engine, handle) = Engine::new(
        EngineOptions::new()
            .sample_rate(SAMPLE_RATE)
            .max_particles(16),
    )?;
    handle.set_observer(|event: &EngineEvent| log::info!("{event:?}"));

    // scene: a heavy center with two satellites. notes alternate between left and right spawn points
    handle.set_scene(&[], &[]);
    let bounds = handle.canvas_bounds();
    let center = bounds.center();
    handle.add_mass_point(center, 3.0)?;
    handle.add_mass_point(Vector::new(center.x - 250.0, center.y + 120.0), 1.5)?;
    handle.add_mass_point(Vector::new(center.x + 250.0, center.y - 120.0), 1.5)?;
    handle.add_spawn_point(Vector::new(bounds.left() + 40.0, center.y), 0.0)?;
    handle.add_spawn_point(
        Vector::new(bounds.right() - 40.0, center.y),
        std::f32::consts::PI,
    )?;
    handle.set_gravity_strength(150_000.0)?;

    arguments::load_source(&args, &handle)?;

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("grainfield-demo.wav"));
    let mut output = WavOutput::create(&output_path, SAMPLE_RATE, CHANNEL_COUNT)?;

    // collect note on/offs as (frame, message) and render them block by block
    let frames_per_ms = SAMPLE_RATE as u64 / 1000;
    let mut events = Vec::new();
    for (note, start, length) in SEQUENCE {
        let message = MidiMessage::NoteOn {
            note,
            velocity: 0.8,
            pitch_ratio: None,
        };
        events.push((start * frames_per_ms, message));
        events.push(((start + length) * frames_per_ms, MidiMessage::NoteOff { note }));
    }
    events.sort_by_key(|(frame, _)| *frame);

    let block_size = output.block_size() as u64;
    let end_frame = events.last().map(|(frame, _)| *frame).unwrap_or(0);
    let mut pending = events.into_iter().peekable();
    let mut block_events = Vec::new();
    while output.frame_position() <= end_frame {
        let block_start = output.frame_position();
        block_events.clear();
        while let Some((frame, message)) =
            pending.next_if(|(frame, _)| *frame < block_start + block_size)
        {
            block_events.push(MidiEvent::new((frame - block_start) as usize, message));
        }
        output.render_block(&mut engine, &block_events)?;
        handle.dispatch_events();
    }
    output.render(&mut engine, TAIL)?;
    handle.dispatch_events();
    output.close()?;

    println!(
        "Rendered {:.2} seconds into '{}'",
        output.frame_position() as f64 / SAMPLE_RATE as f64,
        output_path.display()
    );
    Ok(())
}
