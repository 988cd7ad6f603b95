use std::sync::LazyLock;

// -------------------------------------------------------------------------------------------------

/// Shared, precomputed Hann window, used to shape grains.
pub static HANN_WINDOW: LazyLock<HannWindow<2048>> = LazyLock::new(HannWindow::new);

// -------------------------------------------------------------------------------------------------

/// Precomputed Hann (raised cosine) window lookup table.
/// `N` must be a pow2 value.
pub struct HannWindow<const N: usize> {
    lut: [f32; N],
}

impl<const N: usize> HannWindow<N> {
    const _VERIFY_N: () = assert!(
        N.is_power_of_two(),
        "Hann window size must be a pow2 value"
    );

    /// Precompute the window LUT. The last entry is the window's end point, so both ends of
    /// the table are zero.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::_VERIFY_N;

        let mut lut = [0.0; N];
        for (i, value) in lut.iter_mut().enumerate() {
            let phase = i as f32 / (N - 1) as f32; // [0.0, 1.0]
            *value = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * phase).cos());
        }
        Self { lut }
    }

    /// Evaluate the window at normalized phase [0.0, 1.0] with linear interpolation.
    /// Phases outside of this range are clamped.
    #[inline]
    pub fn sample(&self, phase: f64) -> f32 {
        let index_float = phase.clamp(0.0, 1.0) * (N - 1) as f64;
        let index = index_float as usize;
        if index >= N - 1 {
            return self.lut[N - 1];
        }
        let fraction = index_float.fract() as f32;
        self.lut[index] * (1.0 - fraction) + self.lut[index + 1] * fraction
    }
}

impl<const N: usize> Default for HannWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_shape() {
        let window = &*HANN_WINDOW;
        assert!(window.sample(0.0).abs() < 1e-6);
        assert!(window.sample(1.0).abs() < 1e-6);
        assert!((window.sample(0.5) - 1.0).abs() < 1e-4);
        // symmetric
        for phase in [0.1, 0.25, 0.33, 0.4] {
            assert!((window.sample(phase) - window.sample(1.0 - phase)).abs() < 1e-4);
        }
        // clamped
        assert_eq!(window.sample(-1.0), window.sample(0.0));
        assert_eq!(window.sample(2.0), window.sample(1.0));
    }

    #[test]
    fn window_values_in_range() {
        let window = HannWindow::<64>::new();
        for i in 0..=1000 {
            let value = window.sample(i as f64 / 1000.0);
            assert!((0.0..=1.0).contains(&value));
        }
    }
}
