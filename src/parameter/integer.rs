use std::ops::RangeInclusive;

use four_cc::FourCC;

use super::{Parameter, ParameterType};

// -------------------------------------------------------------------------------------------------

/// A discrete (integer) parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerParameter {
    id: FourCC,
    name: &'static str,
    range: RangeInclusive<i32>,
    default: i32,
    unit: &'static str,
}

impl IntegerParameter {
    pub const fn new(
        id: FourCC,
        name: &'static str,
        range: RangeInclusive<i32>,
        default: i32,
    ) -> Self {
        assert!(
            default >= *range.start() && default <= *range.end(),
            "Invalid parameter default value"
        );
        Self {
            id,
            name,
            range,
            default,
            unit: "",
        }
    }

    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    pub const fn id(&self) -> FourCC {
        self.id
    }

    pub fn range(&self) -> &RangeInclusive<i32> {
        &self.range
    }

    pub fn default_value(&self) -> i32 {
        self.default
    }

    pub fn clamp_value(&self, value: i32) -> i32 {
        value.clamp(*self.range.start(), *self.range.end())
    }

    pub fn normalize_value(&self, value: i32) -> f32 {
        let span = *self.range.end() as f32 - *self.range.start() as f32;
        if span <= 0.0 {
            return 0.0;
        }
        (self.clamp_value(value) as f32 - *self.range.start() as f32) / span
    }

    pub fn denormalize_value(&self, normalized: f32) -> i32 {
        let normalized = if normalized.is_finite() {
            normalized.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let value = *self.range.start() as f32
            + normalized * (*self.range.end() as f32 - *self.range.start() as f32);
        self.clamp_value(value.round() as i32)
    }
}

impl Parameter for IntegerParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Integer {
            range: self.range.clone(),
        }
    }

    fn default_normalized_value(&self) -> f32 {
        self.normalize_value(self.default)
    }

    fn denormalize(&self, normalized: f32) -> f32 {
        self.denormalize_value(normalized) as f32
    }

    fn normalize(&self, value: f32) -> f32 {
        if value.is_finite() {
            self.normalize_value(value.round() as i32)
        } else {
            self.default_normalized_value()
        }
    }

    fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String {
        let value = self.denormalize_value(normalized);
        if include_unit && !self.unit.is_empty() {
            format!("{} {}", value, self.unit)
        } else {
            value.to_string()
        }
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let value = string
            .trim()
            .trim_end_matches(self.unit)
            .trim()
            .parse::<i32>()
            .ok()?;
        Some(self.normalize_value(value))
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        let param = IntegerParameter::new(FourCC(*b"TEST"), "Test", 1..=256, 32);
        assert_eq!(param.clamp_value(0), 1);
        assert_eq!(param.denormalize_value(0.0), 1);
        assert_eq!(param.denormalize_value(1.0), 256);
        assert_eq!(param.normalize_value(256), 1.0);
        assert_eq!(param.denormalize(param.normalize(32.0)), 32.0);
        assert_eq!(param.string_to_normalized_value("256"), Some(1.0));
        assert_eq!(param.string_to_normalized_value("x"), None);
        assert_eq!(param.normalized_value_to_string(1.0, false), "256");
    }
}
