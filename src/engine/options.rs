use crate::{
    geometry::Rect,
    simulation::{DEFAULT_MAX_PARTICLES, MAX_PARTICLES_LIMIT},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Options to create a new [`Engine`](super::Engine).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// Output sample rate.
    pub sample_rate: u32,
    /// Max number of frames the engine processes at once. Larger blocks get processed in
    /// multiple slices of this size.
    pub max_block_size: usize,
    /// Initial particle ceiling.
    pub max_particles: usize,
    /// Capacity of the control to audio thread message queue.
    pub message_queue_size: usize,
    /// Capacity of the audio to control thread event queue.
    pub event_queue_size: usize,
    /// Initial canvas bounds.
    pub canvas_bounds: Rect,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            max_block_size: 1024,
            max_particles: DEFAULT_MAX_PARTICLES,
            message_queue_size: 1024,
            event_queue_size: 1024,
            canvas_bounds: Rect::default(),
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size;
        self
    }

    pub fn max_particles(mut self, max_particles: usize) -> Self {
        self.max_particles = max_particles;
        self
    }

    pub fn message_queue_size(mut self, size: usize) -> Self {
        self.message_queue_size = size;
        self
    }

    pub fn event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size;
        self
    }

    pub fn canvas_bounds(mut self, bounds: Rect) -> Self {
        self.canvas_bounds = bounds;
        self
    }

    /// Validate all options. Returns Error::ParameterError on errors.
    pub fn validate(&self) -> Result<(), Error> {
        if !(8000..=384000).contains(&self.sample_rate) {
            return Err(Error::ParameterError(format!(
                "engine options 'sample_rate' value is '{}'",
                self.sample_rate
            )));
        }
        if self.max_block_size == 0 || self.max_block_size > 16384 {
            return Err(Error::ParameterError(format!(
                "engine options 'max_block_size' value is '{}'",
                self.max_block_size
            )));
        }
        if self.max_particles == 0 || self.max_particles > MAX_PARTICLES_LIMIT {
            return Err(Error::ParameterError(format!(
                "engine options 'max_particles' value is '{}'",
                self.max_particles
            )));
        }
        if self.message_queue_size == 0 || self.event_queue_size == 0 {
            return Err(Error::ParameterError(
                "engine options queue sizes must be > 0".to_string(),
            ));
        }
        let bounds = &self.canvas_bounds;
        if !(bounds.width.is_finite() && bounds.height.is_finite())
            || bounds.width <= 0.0
            || bounds.height <= 0.0
            || !(bounds.x.is_finite() && bounds.y.is_finite())
        {
            return Err(Error::ParameterError(format!(
                "engine options 'canvas_bounds' value is '{bounds:?}'"
            )));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate() {
        assert!(EngineOptions::default().validate().is_ok());
        assert!(EngineOptions::new().sample_rate(0).validate().is_err());
        assert!(EngineOptions::new().max_block_size(0).validate().is_err());
        assert!(EngineOptions::new().max_particles(0).validate().is_err());
        assert!(EngineOptions::new().max_particles(257).validate().is_err());
        assert!(EngineOptions::new().event_queue_size(0).validate().is_err());
        assert!(EngineOptions::new()
            .canvas_bounds(Rect::new(0.0, 0.0, 0.0, 100.0))
            .validate()
            .is_err());
        assert!(EngineOptions::new()
            .canvas_bounds(Rect::new(f32::NAN, 0.0, 10.0, 100.0))
            .validate()
            .is_err());
    }
}
