//! Play particles live from the computer keyboard via the default audio device.

use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Condvar, Mutex,
    },
    time::Duration,
};

use device_query::{DeviceEvents, DeviceState, Keycode};

use grainfield::{CpalOutput, Engine, EngineEvent, EngineOptions, Error, OutputDevice};

// -------------------------------------------------------------------------------------------------

// Common demo code
#[path = "./common/arguments.rs"]
mod arguments;

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<(), Error> {
    let args = arguments::parse();

    // open the default audio output and run an engine with the device's rate in it
    let mut output = CpalOutput::open()?;
    let (engine, handle) = Engine::new(EngineOptions::new().sample_rate(output.sample_rate()))?;
    arguments::load_source(&args, &handle)?;
    handle.set_observer(|event: &EngineEvent| match event {
        EngineEvent::ParticleSpawned { id, note } => println!("Spawned {id:?} for note #{note}"),
        EngineEvent::ParticleEvicted { id, note } => println!("Evicted {id:?} of note #{note}"),
        _ => (),
    });
    output.start(engine)?;

    println!("*** grainfield live playback demo:");
    println!("  Use keys 'A, S, D, F, G, H, J, K' to play notes, 'W, E, T, Z, U' for sharps.");
    println!("  Arrow 'up/down' keys change the current octave.");
    println!("  Hit 'B' to toggle bounce mode, 'Space' to release all particles.");
    println!();
    println!("  To quit press 'Esc'.");
    println!();

    let wait_mutex_cond = Arc::new((Mutex::new(false), Condvar::new()));
    let current_octave = Arc::new(AtomicU8::new(5));

    let device_state = DeviceState::new();

    // key down handler
    let _key_down_guard = device_state.on_key_down({
        let wait_mutex_cond = Arc::clone(&wait_mutex_cond);
        let current_octave = Arc::clone(&current_octave);
        let handle = handle.clone();
        move |key: &Keycode| match key {
            Keycode::Escape => {
                println!("Shutting down...");
                *wait_mutex_cond.0.lock().unwrap() = true;
                wait_mutex_cond.1.notify_all();
            }
            Keycode::Up => {
                let octave = (current_octave.load(Ordering::Relaxed) + 1).min(8);
                current_octave.store(octave, Ordering::Relaxed);
                println!("Changed octave to '{octave}'");
            }
            Keycode::Down => {
                let octave = current_octave.load(Ordering::Relaxed).saturating_sub(1).max(1);
                current_octave.store(octave, Ordering::Relaxed);
                println!("Changed octave to '{octave}'");
            }
            Keycode::B => {
                let enabled = !handle.parameter_values().bounce_mode;
                handle.set_bounce_mode(enabled).unwrap_or_default();
                println!("Bounce mode {}", if enabled { "on" } else { "off" });
            }
            Keycode::Space => {
                handle.all_notes_off().unwrap_or_default();
            }
            keycode => {
                if let Some(note) = key_to_note(keycode, current_octave.load(Ordering::Relaxed)) {
                    handle
                        .inject_midi_message(note, 0.9, true, None)
                        .unwrap_or_default();
                }
            }
        }
    });

    // key up handler
    let _key_up_guard = device_state.on_key_up({
        let current_octave = Arc::clone(&current_octave);
        let handle = handle.clone();
        move |key: &Keycode| {
            if let Some(note) = key_to_note(key, current_octave.load(Ordering::Relaxed)) {
                handle
                    .inject_midi_message(note, 0.0, false, None)
                    .unwrap_or_default();
            }
        }
    });

    // forward engine events to the observer until the key handler asks us to quit
    let (lock, cond) = &*wait_mutex_cond;
    let mut quit = lock.lock().unwrap();
    while !*quit {
        quit = cond.wait_timeout(quit, EVENT_POLL_INTERVAL).unwrap().0;
        handle.dispatch_events();
    }
    drop(quit);

    output.close()
}

// -------------------------------------------------------------------------------------------------

fn key_to_note(keycode: &Keycode, octave: u8) -> Option<u8> {
    let relative_note = match keycode {
        Keycode::A => 0,                // C
        Keycode::W => 1,                // C#
        Keycode::S => 2,                // D
        Keycode::E => 3,                // D#
        Keycode::D => 4,                // E
        Keycode::F => 5,                // F
        Keycode::T => 6,                // F#
        Keycode::G => 7,                // G
        Keycode::Z | Keycode::Y => 8,   // G#
        Keycode::H => 9,                // A
        Keycode::U => 10,               // A#
        Keycode::J => 11,               // H
        Keycode::K => 12,               // C'
        _ => return None,
    };
    Some((relative_note + 12 * octave).min(127))
}
