//! Engine parameter descriptors, for use in UIs, hosts or for automation.

use std::{fmt::Debug, ops::RangeInclusive};

use four_cc::FourCC;

// -------------------------------------------------------------------------------------------------

/// Describes the type of a [`Parameter`] to e.g. select a proper visual representation in a UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterType {
    /// A continuous floating-point value.
    Float { range: RangeInclusive<f32> },
    /// A discrete integer value.
    Integer { range: RangeInclusive<i32> },
    /// A boolean toggle.
    Boolean,
}

// -------------------------------------------------------------------------------------------------

/// Describes a single engine parameter.
pub trait Parameter: Debug + Send + Sync {
    /// The unique id of the parameter.
    fn id(&self) -> FourCC;

    /// The name of the parameter.
    fn name(&self) -> &'static str;

    /// The parameter type.
    fn parameter_type(&self) -> ParameterType;

    /// Default value of parameter, expressed as normalized floating point value in range \[0,1\].
    fn default_normalized_value(&self) -> f32;

    /// Convert the given normalized value to a plain value (as f32).
    fn denormalize(&self, normalized: f32) -> f32;

    /// Convert the given plain value (as f32) to a normalized value, clamping it to the
    /// parameter's range.
    fn normalize(&self, value: f32) -> f32;

    /// Convert the given normalized floating point value to a string value.
    fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String;

    /// Convert the given string value to a normalized floating point value.
    /// Returns `None` when conversion failed, else a valid normalized value.
    fn string_to_normalized_value(&self, string: &str) -> Option<f32>;
}

// -------------------------------------------------------------------------------------------------

mod float;
pub use float::FloatParameter;

mod integer;
pub use integer::IntegerParameter;

mod boolean;
pub use boolean::BooleanParameter;
