// SPDX-License-Identifier: MIT OR Apache-2.0
//! Introspectable operator properties.
//!
//! Every operator declares an ordered list of typed properties. The list drives
//! both evaluation (operators read values with the `eval_*` accessors) and UI
//! generation (one control per property, in declaration order).
//!
//! Declaration is cursor based: [`Properties::add_property`] appends a property
//! and makes it current, and the `set_*` calls that follow refine it.
//!
//! ```
//! use procedra_graph::property::{Properties, PropertyType};
//!
//! let mut props = Properties::new();
//! props.add_property("elasticity", PropertyType::Float);
//! props.set_default_value_float(0.5);
//! props.set_min_max(0.0, 1.0);
//! props.set_tooltip("Fraction of normal velocity kept after a bounce");
//!
//! assert_eq!(props.eval_float("elasticity"), 0.5);
//! ```

use serde::{Deserialize, Serialize};

/// Closed set of property types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// Checkbox
    Bool,
    /// Integer
    Int,
    /// One of a fixed list of strings
    Enum,
    /// Floating point
    Float,
    /// 3D vector
    Vec3,
    /// Free text
    String,
    /// Path to a file that is read
    InputFile,
    /// Path to a file that is written
    OutputFile,
}

impl PropertyType {
    /// Get the display name of this type
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Enum => "enum",
            Self::Float => "float",
            Self::Vec3 => "vec3",
            Self::String => "string",
            Self::InputFile => "input_file",
            Self::OutputFile => "output_file",
        }
    }

    /// Whether min/max bounds apply to this type
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

/// A property value, tagged with its type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Selected enum item
    Enum(String),
    /// Float
    Float(f32),
    /// 3D vector
    Vec3([f32; 3]),
    /// String
    String(String),
    /// Input file path
    InputFile(String),
    /// Output file path
    OutputFile(String),
}

impl PropertyValue {
    /// The zero value of a property type
    pub fn zero(property_type: PropertyType) -> Self {
        match property_type {
            PropertyType::Bool => Self::Bool(false),
            PropertyType::Int => Self::Int(0),
            PropertyType::Enum => Self::Enum(String::new()),
            PropertyType::Float => Self::Float(0.0),
            PropertyType::Vec3 => Self::Vec3([0.0; 3]),
            PropertyType::String => Self::String(String::new()),
            PropertyType::InputFile => Self::InputFile(String::new()),
            PropertyType::OutputFile => Self::OutputFile(String::new()),
        }
    }

    /// Get the type of this value
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Bool(_) => PropertyType::Bool,
            Self::Int(_) => PropertyType::Int,
            Self::Enum(_) => PropertyType::Enum,
            Self::Float(_) => PropertyType::Float,
            Self::Vec3(_) => PropertyType::Vec3,
            Self::String(_) => PropertyType::String,
            Self::InputFile(_) => PropertyType::InputFile,
            Self::OutputFile(_) => PropertyType::OutputFile,
        }
    }

    /// Extract a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract an integer
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a float
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a vector
    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            Self::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract the text of any string-like variant (enum item, string, paths)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Enum(s) | Self::String(s) | Self::InputFile(s) | Self::OutputFile(s) => {
                Some(s)
            }
            _ => None,
        }
    }
}

/// Errors raised when writing a property from outside the operator
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PropertyError {
    /// No property with this name
    #[error("Property not found: {0}")]
    NotFound(String),

    /// The value does not have the declared type
    #[error("Property {name} is {expected:?}, got {found:?}")]
    TypeMismatch {
        /// Property name
        name: String,
        /// Declared type
        expected: PropertyType,
        /// Type of the rejected value
        found: PropertyType,
    },

    /// Enum value that is not one of the declared items
    #[error("{item:?} is not an item of enum property {name}")]
    InvalidEnumItem {
        /// Property name
        name: String,
        /// Rejected item
        item: String,
    },
}

/// A declared property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Name, unique within the owner
    pub name: String,
    /// Tooltip shown by the UI
    pub tooltip: String,
    /// Declared type
    pub property_type: PropertyType,
    /// Current value
    pub value: PropertyValue,
    /// Default value
    pub default: PropertyValue,
    /// Lower bound (numeric types only)
    pub min: Option<f32>,
    /// Upper bound (numeric types only)
    pub max: Option<f32>,
    /// Items of an enum property
    pub enum_items: Vec<String>,
    /// Whether the UI shows this property
    pub visible: bool,
}

impl Property {
    /// Create a property holding the zero value of its type
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            tooltip: String::new(),
            property_type,
            value: PropertyValue::zero(property_type),
            default: PropertyValue::zero(property_type),
            min: None,
            max: None,
            enum_items: Vec::new(),
            visible: true,
        }
    }

    fn clamp(&self, value: PropertyValue) -> PropertyValue {
        match value {
            PropertyValue::Float(v) => {
                let lo = self.min.unwrap_or(f32::NEG_INFINITY);
                let hi = self.max.unwrap_or(f32::INFINITY);
                PropertyValue::Float(v.max(lo).min(hi))
            }
            // i32 above 2^24 is not exact in f32
            PropertyValue::Int(v) => {
                let v = match self.min {
                    Some(min) => v.max(min.ceil() as i32),
                    None => v,
                };
                let v = match self.max {
                    Some(max) => v.min(max.floor() as i32),
                    None => v,
                };
                PropertyValue::Int(v)
            }
            other => other,
        }
    }
}

/// Ordered property list with a declaration cursor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    entries: Vec<Property>,
}

impl Properties {
    /// Create an empty property list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a property with the zero default of its type; it becomes the cursor
    pub fn add_property(&mut self, name: impl Into<String>, property_type: PropertyType) -> &mut Self {
        let name = name.into();
        if self.get(&name).is_some() {
            tracing::warn!("Property {name} declared twice; lookups resolve to the first one");
        }
        self.entries.push(Property::new(name, property_type));
        self
    }

    /// Set the default (and current value) of the cursor property to a boolean
    pub fn set_default_value_bool(&mut self, value: bool) -> &mut Self {
        self.set_default(PropertyValue::Bool(value))
    }

    /// Set the default (and current value) of the cursor property to an integer
    pub fn set_default_value_int(&mut self, value: i32) -> &mut Self {
        self.set_default(PropertyValue::Int(value))
    }

    /// Set the default (and current value) of the cursor property to an enum item
    ///
    /// Once items are declared, an item outside them is ignored with a warning.
    pub fn set_default_value_enum(&mut self, item: impl Into<String>) -> &mut Self {
        let item = item.into();
        if let Some(prop) = self.entries.last() {
            if prop.property_type == PropertyType::Enum
                && !prop.enum_items.is_empty()
                && !prop.enum_items.contains(&item)
            {
                tracing::warn!("{item} is not an item of {}; default unchanged", prop.name);
                return self;
            }
        }
        self.set_default(PropertyValue::Enum(item))
    }

    /// Set the default (and current value) of the cursor property to a float
    pub fn set_default_value_float(&mut self, value: f32) -> &mut Self {
        self.set_default(PropertyValue::Float(value))
    }

    /// Set the default (and current value) of the cursor property to a vector
    pub fn set_default_value_vec3(&mut self, value: [f32; 3]) -> &mut Self {
        self.set_default(PropertyValue::Vec3(value))
    }

    /// Set the default (and current value) of the cursor property to a string
    pub fn set_default_value_string(&mut self, value: impl Into<String>) -> &mut Self {
        self.set_default(PropertyValue::String(value.into()))
    }

    /// Set the default path of the cursor file property (input or output)
    pub fn set_default_value_file(&mut self, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        match self.entries.last().map(|p| p.property_type) {
            Some(PropertyType::OutputFile) => self.set_default(PropertyValue::OutputFile(path)),
            _ => self.set_default(PropertyValue::InputFile(path)),
        }
    }

    /// Set the bounds of the cursor property
    pub fn set_min_max(&mut self, min: f32, max: f32) -> &mut Self {
        if let Some(prop) = self.cursor_mut("set_min_max") {
            if !prop.property_type.is_numeric() {
                tracing::warn!("Bounds ignored on non-numeric property {}", prop.name);
                return self;
            }
            if min.is_nan() || max.is_nan() {
                tracing::warn!("NaN bounds ignored on property {}", prop.name);
                return self;
            }
            let (min, max) = if min > max {
                tracing::warn!("Bounds of {} given as [{min}, {max}], swapping", prop.name);
                (max, min)
            } else {
                (min, max)
            };
            prop.min = Some(min);
            prop.max = Some(max);
            prop.value = prop.clamp(prop.value.clone());
            prop.default = prop.clamp(prop.default.clone());
        }
        self
    }

    /// Set the tooltip of the cursor property
    pub fn set_tooltip(&mut self, tooltip: impl Into<String>) -> &mut Self {
        if let Some(prop) = self.cursor_mut("set_tooltip") {
            prop.tooltip = tooltip.into();
        }
        self
    }

    /// Set the items of the cursor enum property
    pub fn set_enum_values<I, S>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(prop) = self.cursor_mut("set_enum_values") {
            if prop.property_type != PropertyType::Enum {
                tracing::warn!("Enum items ignored on {} property {}", prop.property_type.name(), prop.name);
                return self;
            }
            prop.enum_items = items.into_iter().map(Into::into).collect();
            let current = prop.value.as_str().unwrap_or_default();
            if !prop.enum_items.iter().any(|item| item == current) {
                if let Some(first) = prop.enum_items.first() {
                    prop.value = PropertyValue::Enum(first.clone());
                    prop.default = prop.value.clone();
                }
            }
        }
        self
    }

    fn cursor_mut(&mut self, call: &str) -> Option<&mut Property> {
        let cursor = self.entries.last_mut();
        if cursor.is_none() {
            tracing::warn!("{call} called before any property was added");
        }
        cursor
    }

    fn set_default(&mut self, value: PropertyValue) -> &mut Self {
        if let Some(prop) = self.cursor_mut("set_default_value") {
            if prop.property_type != value.property_type() {
                type_mismatch(&prop.name, prop.property_type, value.property_type());
            }
            let value = prop.clamp(value);
            prop.default = value.clone();
            prop.value = value;
        }
        self
    }

    /// Look up a property by name
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.entries.iter().find(|p| p.name == name)
    }

    /// Iterate in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.iter()
    }

    /// Number of declared properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no property is declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write a value coming from the UI or a command
    ///
    /// Numeric values are clamped to the declared bounds.
    pub fn set_value(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        let prop = self
            .entries
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;

        if prop.property_type != value.property_type() {
            return Err(PropertyError::TypeMismatch {
                name: name.to_string(),
                expected: prop.property_type,
                found: value.property_type(),
            });
        }

        if let PropertyValue::Enum(item) = &value {
            if !prop.enum_items.iter().any(|i| i == item) {
                return Err(PropertyError::InvalidEnumItem {
                    name: name.to_string(),
                    item: item.clone(),
                });
            }
        }

        prop.value = prop.clamp(value);
        Ok(())
    }

    /// Show or hide a property in the UI
    pub fn set_visible(&mut self, name: &str, visible: bool) -> Result<(), PropertyError> {
        let prop = self
            .entries
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;
        prop.visible = visible;
        Ok(())
    }

    /// Restore every property to its default
    pub fn reset_to_defaults(&mut self) {
        for prop in &mut self.entries {
            prop.value = prop.default.clone();
        }
    }

    fn lookup(&self, name: &str, expected: PropertyType) -> Option<&PropertyValue> {
        let Some(prop) = self.get(name) else {
            tracing::warn!("Unknown property {name}, using zero {}", expected.name());
            return None;
        };
        if prop.property_type != expected {
            type_mismatch(name, prop.property_type, expected);
        }
        Some(&prop.value)
    }

    /// Read a boolean property; `false` if absent
    ///
    /// # Panics
    ///
    /// Panics if the property is declared with another type.
    pub fn eval_bool(&self, name: &str) -> bool {
        self.lookup(name, PropertyType::Bool)
            .and_then(PropertyValue::as_bool)
            .unwrap_or_default()
    }

    /// Read an integer property; `0` if absent
    ///
    /// # Panics
    ///
    /// Panics if the property is declared with another type.
    pub fn eval_int(&self, name: &str) -> i32 {
        self.lookup(name, PropertyType::Int)
            .and_then(PropertyValue::as_int)
            .unwrap_or_default()
    }

    /// Read the selected item of an enum property; empty if absent
    ///
    /// # Panics
    ///
    /// Panics if the property is declared with another type.
    pub fn eval_enum(&self, name: &str) -> String {
        self.lookup(name, PropertyType::Enum)
            .and_then(PropertyValue::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Read a float property; `0.0` if absent
    ///
    /// # Panics
    ///
    /// Panics if the property is declared with another type.
    pub fn eval_float(&self, name: &str) -> f32 {
        self.lookup(name, PropertyType::Float)
            .and_then(PropertyValue::as_float)
            .unwrap_or_default()
    }

    /// Read a vector property; zero if absent
    ///
    /// # Panics
    ///
    /// Panics if the property is declared with another type.
    pub fn eval_vec3(&self, name: &str) -> [f32; 3] {
        self.lookup(name, PropertyType::Vec3)
            .and_then(PropertyValue::as_vec3)
            .unwrap_or_default()
    }

    /// Read a string property; empty if absent
    ///
    /// # Panics
    ///
    /// Panics if the property is declared with another type.
    pub fn eval_string(&self, name: &str) -> String {
        self.lookup(name, PropertyType::String)
            .and_then(PropertyValue::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Read a file path property of either direction; empty if absent
    ///
    /// # Panics
    ///
    /// Panics if the property is declared with a non-file type.
    pub fn eval_file(&self, name: &str) -> String {
        let expected = match self.get(name).map(|p| p.property_type) {
            Some(PropertyType::OutputFile) => PropertyType::OutputFile,
            _ => PropertyType::InputFile,
        };
        self.lookup(name, expected)
            .and_then(PropertyValue::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    }
}

#[track_caller]
fn type_mismatch(name: &str, declared: PropertyType, requested: PropertyType) -> ! {
    panic!(
        "property {name} is declared as {} but was used as {}",
        declared.name(),
        requested.name()
    )
}
