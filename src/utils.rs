//! Small DSP helpers shared by the simulation and renderer.

pub mod envelope;
pub mod smoothed;
pub mod window;

// -------------------------------------------------------------------------------------------------

const MINUS_INF_IN_DB: f32 = -200.0f32;

/// Middle C: the note which plays back a source file at its original speed.
pub const PITCH_REFERENCE_NOTE: u8 = 60;

// -------------------------------------------------------------------------------------------------

/// Convert a linear gain value into decibels. Values at or below zero map to -200 dB.
pub fn linear_to_db(value: f32) -> f32 {
    const LIN_TO_DB_FACTOR: f32 = 20.0f32 / std::f32::consts::LN_10;
    if value == 1.0 {
        return 0.0; // avoid rounding errors at exactly 0 dB
    } else if value > 1e-12f32 {
        return value.ln() * LIN_TO_DB_FACTOR;
    }
    MINUS_INF_IN_DB
}

/// Convert a decibel value into a linear gain value.
pub fn db_to_linear(value: f32) -> f32 {
    const DB_TO_LIN_FACTOR: f32 = std::f32::consts::LN_10 / 20.0f32;
    if value == 0.0f32 {
        return 1.0f32; // avoid rounding errors at exactly 0 dB
    } else if value > MINUS_INF_IN_DB {
        return (value * DB_TO_LIN_FACTOR).exp();
    }
    0.0f32
}

// -------------------------------------------------------------------------------------------------

/// Playback speed for the given MIDI note, relative to [`PITCH_REFERENCE_NOTE`].
pub fn pitch_ratio_from_note(note: u8) -> f32 {
    2.0f32.powf((note as f32 - PITCH_REFERENCE_NOTE as f32) / 12.0)
}

/// Playback speed for the given transposition in semitones.
pub fn pitch_ratio_from_semitones(semitones: f32) -> f32 {
    2.0f32.powf(semitones / 12.0)
}

// -------------------------------------------------------------------------------------------------

/// Constant power panning factors (left, right) for the given panning value in range -1..=1.
#[inline]
pub fn panning_factors(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
    (angle.cos(), angle.sin())
}

// -------------------------------------------------------------------------------------------------

/// Tanh soft clipper which keeps samples in range -1..=1 and replaces non finite values with
/// silence.
#[inline]
pub fn soft_clip(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.tanh()
    } else {
        0.0
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lin_db_conversion() {
        assert_eq!(linear_to_db(1.0), 0.0);
        assert_eq!(linear_to_db(0.0), MINUS_INF_IN_DB);
        assert_eq!(db_to_linear(MINUS_INF_IN_DB), 0.0);
        assert_eq!(db_to_linear(0.0), 1.0);
        assert!((linear_to_db(db_to_linear(20.0)) - 20.0).abs() < 0.0001);
        assert!((linear_to_db(db_to_linear(-20.0)) + 20.0).abs() < 0.0001);
    }

    #[test]
    fn pitch_ratios() {
        assert_eq!(pitch_ratio_from_note(PITCH_REFERENCE_NOTE), 1.0);
        assert!((pitch_ratio_from_note(72) - 2.0).abs() < 1e-5);
        assert!((pitch_ratio_from_note(48) - 0.5).abs() < 1e-5);
        assert!((pitch_ratio_from_semitones(-12.0) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn constant_power_panning() {
        let (l, r) = panning_factors(0.0);
        assert!((l - r).abs() < 1e-6);
        assert!((l * l + r * r - 1.0).abs() < 1e-5);
        let (l, r) = panning_factors(-1.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
        let (l, r) = panning_factors(1.0);
        assert!(l.abs() < 1e-6 && (r - 1.0).abs() < 1e-6);
        // out of range values get clamped
        assert_eq!(panning_factors(4.0), panning_factors(1.0));
    }

    #[test]
    fn soft_clipping() {
        assert_eq!(soft_clip(0.0), 0.0);
        assert!(soft_clip(100.0) <= 1.0);
        assert!(soft_clip(-100.0) >= -1.0);
        assert_eq!(soft_clip(f32::NAN), 0.0);
        assert_eq!(soft_clip(f32::INFINITY), 0.0);
    }
}
