use std::{fmt::Debug, ops::RangeInclusive, sync::Arc};

use four_cc::FourCC;

use super::{Parameter, ParameterType};

// -------------------------------------------------------------------------------------------------

/// A continuous (float) parameter descriptor.
#[derive(Clone)]
pub struct FloatParameter {
    id: FourCC,
    name: &'static str,
    range: RangeInclusive<f32>,
    default: f32,
    unit: &'static str,
    #[allow(clippy::type_complexity)]
    value_to_string: Option<Arc<dyn Fn(f32) -> String + Send + Sync>>,
}

impl Debug for FloatParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FloatParameter")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("range", &self.range)
            .field("default", &self.default)
            .field("unit", &self.unit)
            .field("value_to_string", &self.value_to_string.is_some())
            .finish()
    }
}

impl FloatParameter {
    /// Create a new float parameter descriptor.
    pub const fn new(
        id: FourCC,
        name: &'static str,
        range: RangeInclusive<f32>,
        default: f32,
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
            value_to_string: None,
        }
    }

    /// Optional unit for string displays.
    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    /// Optional custom conversion function to convert a plain value to a string.
    /// Returned strings should not contain a unit, if a unit already was set for this parameter.
    pub fn with_display<ValueToString: Fn(f32) -> String + Send + Sync + 'static>(
        mut self,
        value_to_string: ValueToString,
    ) -> Self {
        self.value_to_string = Some(Arc::new(value_to_string));
        self
    }

    /// The parameter's identifier.
    pub const fn id(&self) -> FourCC {
        self.id
    }

    /// The parameter's value range.
    pub fn range(&self) -> &RangeInclusive<f32> {
        &self.range
    }

    /// The parameter's default value.
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Clamp the given plain value to the parameter's range. Non finite values fall back to
    /// the default value.
    pub fn clamp_value(&self, value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(*self.range.start(), *self.range.end())
        } else {
            self.default
        }
    }

    /// Normalize the given plain value to a 0.0-1.0 range.
    pub fn normalize_value(&self, value: f32) -> f32 {
        let span = *self.range.end() - *self.range.start();
        if span <= 0.0 {
            return 0.0;
        }
        (self.clamp_value(value) - *self.range.start()) / span
    }

    /// Denormalize a 0.0-1.0 ranged value to the corresponding plain value.
    pub fn denormalize_value(&self, normalized: f32) -> f32 {
        let normalized = if normalized.is_finite() {
            normalized.clamp(0.0, 1.0)
        } else {
            0.0
        };
        *self.range.start() + normalized * (*self.range.end() - *self.range.start())
    }

    /// Convert the given plain value to a string, using a custom conversion function if provided.
    pub fn value_to_string(&self, value: f32, include_unit: bool) -> String {
        match (&self.value_to_string, include_unit && !self.unit.is_empty()) {
            (Some(f), true) => format!("{} {}", f(value), self.unit),
            (Some(f), false) => f(value),
            (None, true) => format!("{:.2} {}", value, self.unit),
            (None, false) => format!("{:.2}", value),
        }
    }

    /// Convert the given string to a plain, clamped value.
    pub fn string_to_value(&self, string: &str) -> Option<f32> {
        let value = string
            .trim()
            .trim_end_matches(self.unit)
            .trim()
            .parse::<f32>()
            .ok()?;
        Some(self.clamp_value(value))
    }
}

impl Parameter for FloatParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Float {
            range: self.range.clone(),
        }
    }

    fn default_normalized_value(&self) -> f32 {
        self.normalize_value(self.default)
    }

    fn denormalize(&self, normalized: f32) -> f32 {
        self.denormalize_value(normalized)
    }

    fn normalize(&self, value: f32) -> f32 {
        self.normalize_value(value)
    }

    fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String {
        self.value_to_string(self.denormalize_value(normalized), include_unit)
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let value = self.string_to_value(string)?;
        Some(self.normalize_value(value))
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        let param = FloatParameter::new(FourCC(*b"TEST"), "Test", 10.0..=500.0, 50.0).with_unit("ms");
        assert_eq!(param.clamp_value(1000.0), 500.0);
        assert_eq!(param.clamp_value(f32::NAN), 50.0);
        assert_eq!(param.normalize_value(10.0), 0.0);
        assert_eq!(param.normalize_value(500.0), 1.0);
        assert_eq!(param.denormalize_value(1.0), 500.0);
        assert_eq!(param.denormalize_value(2.0), 500.0);
        assert_eq!(param.value_to_string(50.0, true), "50.00 ms");
        assert_eq!(param.string_to_value("100 ms"), Some(100.0));
        assert_eq!(param.string_to_value("1000"), Some(500.0));
        assert_eq!(param.string_to_value("abc"), None);

        let param = param.with_display(|value| format!("{value:.0}"));
        assert_eq!(param.value_to_string(50.0, false), "50");
        assert_eq!(param.normalized_value_to_string(0.0, true), "10 ms");
    }
}
