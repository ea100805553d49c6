//! Named, typed pass parameters.
//!
//! Every pass declares its full parameter schema up front. Writes are
//! validated against that schema by name and by kind, so a debug panel can
//! drive any pass without knowing its concrete type.

use std::fmt;

use glam::{Vec2, Vec3, Vec4};

use crate::error::ParameterError;

/// A uniform-like parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Bool(bool),
}

/// The kind of a [`ParamValue`], used for schema checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Bool,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Float => "float",
            ParamKind::Vec2 => "vec2",
            ParamKind::Vec3 => "vec3",
            ParamKind::Vec4 => "vec4",
            ParamKind::Bool => "bool",
        };
        f.write_str(name)
    }
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Vec2(_) => ParamKind::Vec2,
            ParamValue::Vec3(_) => ParamKind::Vec3,
            ParamValue::Vec4(_) => ParamKind::Vec4,
            ParamValue::Bool(_) => ParamKind::Bool,
        }
    }

    /// Expands the value into one vec4 uniform slot.
    ///
    /// Unused lanes are zero; booleans become `0.0` or `1.0`.
    pub fn to_slot(&self) -> [f32; 4] {
        match *self {
            ParamValue::Float(x) => [x, 0.0, 0.0, 0.0],
            ParamValue::Vec2(v) => [v.x, v.y, 0.0, 0.0],
            ParamValue::Vec3(v) => [v.x, v.y, v.z, 0.0],
            ParamValue::Vec4(v) => v.to_array(),
            ParamValue::Bool(b) => [if b { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match *self {
            ParamValue::Float(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ParamValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Float(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value as f32)
    }
}

impl From<Vec2> for ParamValue {
    fn from(value: Vec2) -> Self {
        ParamValue::Vec2(value)
    }
}

impl From<Vec3> for ParamValue {
    fn from(value: Vec3) -> Self {
        ParamValue::Vec3(value)
    }
}

impl From<Vec4> for ParamValue {
    fn from(value: Vec4) -> Self {
        ParamValue::Vec4(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// One declared parameter: name, current value and an optional UI range.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: ParamValue,
    range: Option<(f32, f32)>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            range: None,
        }
    }

    /// Attaches a slider range for debug panels. Writes are not clamped.
    pub fn range(mut self, min: f32, max: f32) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> ParamValue {
        self.value
    }

    pub fn kind(&self) -> ParamKind {
        self.value.kind()
    }

    pub fn ui_range(&self) -> Option<(f32, f32)> {
        self.range
    }
}

/// Ordered parameter store of a single pass.
///
/// Declaration order is significant: it is the order of the vec4 slots in
/// the packed uniform block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<Parameter>,
}

impl Parameters {
    /// Largest schema that fits in [`PassUniforms`](crate::uniforms::PassUniforms).
    pub const MAX: usize = crate::uniforms::MAX_PARAMS;

    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a declaration without validation. Built-in schemas only;
    /// caller-supplied schemas go through [`declare`](Self::declare).
    pub(crate) fn with(mut self, parameter: Parameter) -> Self {
        self.entries.push(parameter);
        self
    }

    /// Builds a validated schema for a caller-supplied pass.
    ///
    /// Rejects duplicate names and schemas that do not fit the uniform block.
    pub fn declare(
        pass: &str,
        schema: impl IntoIterator<Item = Parameter>,
    ) -> Result<Self, ParameterError> {
        let mut entries: Vec<Parameter> = Vec::new();
        for parameter in schema {
            if entries.iter().any(|p| p.name == parameter.name) {
                return Err(ParameterError::Duplicate {
                    pass: pass.to_string(),
                    name: parameter.name,
                });
            }
            entries.push(parameter);
        }

        if entries.len() > Self::MAX {
            return Err(ParameterError::TooMany {
                pass: pass.to_string(),
                count: entries.len(),
                max: Self::MAX,
            });
        }

        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.entries.iter().find(|p| p.name == name).map(|p| p.value)
    }

    /// Slot index of a parameter in the uniform block.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|p| p.name == name)
    }

    /// Writes a declared parameter. `pass` names the owner in errors.
    pub fn set(&mut self, pass: &str, name: &str, value: ParamValue) -> Result<(), ParameterError> {
        let Some(entry) = self.entries.iter_mut().find(|p| p.name == name) else {
            return Err(ParameterError::Unknown {
                pass: pass.to_string(),
                name: name.to_string(),
            });
        };

        if entry.kind() != value.kind() {
            return Err(ParameterError::KindMismatch {
                pass: pass.to_string(),
                name: name.to_string(),
                expected: entry.kind(),
                found: value.kind(),
            });
        }

        entry.value = value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
