use std::fmt::Debug;

// -------------------------------------------------------------------------------------------------

/// Provides smooth transitions between a current and target f32 value.
/// Smoothing usually needs to be applied to avoid clicks in e.g. volume changes.
pub trait SmoothedValue: Debug {
    /// Access to the current, possibly ramped value.
    #[must_use]
    fn current(&self) -> f32;
    /// Access to the target value.
    #[must_use]
    fn target(&self) -> f32;

    /// Ramp, if needed, and get the current ramped value, else returns the target value.
    #[must_use]
    fn next(&mut self) -> f32 {
        if self.need_ramp() {
            self.ramp();
            self.current()
        } else {
            self.target()
        }
    }

    /// Test if ramping is necessary.
    #[must_use]
    fn need_ramp(&self) -> bool;
    /// Move current towards the target value, when ramping is necessary, else does nothing.
    fn ramp(&mut self);

    /// Set current and target to the same value.
    fn init(&mut self, value: f32);
    /// Set a new target value and ramp current, when current is different from the target.
    fn set_target(&mut self, target: f32);
}

// -------------------------------------------------------------------------------------------------

/// Exponential smoothed value, approaching its target with a fixed time constant.
#[derive(Debug, Clone)]
pub struct ExponentialSmoothedValue {
    current: f32,
    target: f32,
    coefficient: f32,
}

impl ExponentialSmoothedValue {
    /// Time constant which is used by [`Self::new`].
    pub const DEFAULT_TIME: f32 = 0.02;

    /// Create a new smoothed value with the default 20ms time constant.
    pub fn new(value: f32, sample_rate: u32) -> Self {
        Self::with_time(value, Self::DEFAULT_TIME, sample_rate)
    }

    /// Create a new smoothed value which reaches ~63% of a target change after `time_secs`.
    pub fn with_time(value: f32, time_secs: f32, sample_rate: u32) -> Self {
        debug_assert!(sample_rate > 0, "Invalid sample rate");
        let samples = (time_secs.max(0.0) * sample_rate.max(1) as f32).max(1.0);
        let coefficient = 1.0 - (-1.0 / samples).exp();
        Self {
            current: value,
            target: value,
            coefficient,
        }
    }
}

impl SmoothedValue for ExponentialSmoothedValue {
    #[inline(always)]
    fn current(&self) -> f32 {
        self.current
    }

    #[inline(always)]
    fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    fn need_ramp(&self) -> bool {
        const EPSILON: f32 = 1e-6;
        (self.current - self.target).abs() > EPSILON
    }

    #[inline]
    fn ramp(&mut self) {
        self.current += (self.target - self.current) * self.coefficient;
        if !self.need_ramp() {
            self.current = self.target;
        }
    }

    fn init(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    fn set_target(&mut self, target: f32) {
        self.target = target;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_ramp() {
        let mut value = ExponentialSmoothedValue::with_time(0.0, 0.01, 1000);
        assert!(!value.need_ramp());
        assert_eq!(value.next(), 0.0);

        value.set_target(1.0);
        assert!(value.need_ramp());
        let first = value.next();
        assert!(first > 0.0 && first < 1.0);

        // ~63% after one time constant
        for _ in 1..10 {
            let _ = value.next();
        }
        assert!((value.current() - 0.632).abs() < 0.02);

        // eventually snaps to target
        for _ in 0..1000 {
            let _ = value.next();
        }
        assert_eq!(value.current(), 1.0);
        assert!(!value.need_ramp());

        value.init(0.5);
        assert_eq!(value.current(), 0.5);
        assert_eq!(value.target(), 0.5);
    }
}
