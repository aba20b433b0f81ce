//! Dynamic values, call arguments and raised errors.

use super::{ClassObject, FunctionObject, Instance};
use std::collections::BTreeMap;
use thiserror::Error;

/// A dynamic value flowing into or out of a callable
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    None,
    /// Plain data (numbers, strings, lists, maps)
    Data(serde_json::Value),
    /// A class object (passed as `cls` to classmethods)
    Class(ClassObject),
    /// An instance of a class (passed as `self` to methods)
    Instance(Instance),
    /// A function object
    Function(FunctionObject),
}

impl Value {
    /// Check if this is `Value::None`
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Borrow the plain data, if any
    #[must_use]
    pub const fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Get the value as an integer
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(serde_json::Value::as_i64)
    }

    /// Get the value as a string slice
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(serde_json::Value::as_str)
    }

    /// Borrow the class object, if any
    #[must_use]
    pub const fn as_class(&self) -> Option<&ClassObject> {
        match self {
            Self::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Borrow the instance, if any
    #[must_use]
    pub const fn as_instance(&self) -> Option<&Instance> {
        match self {
            Self::Instance(instance) => Some(instance),
            _ => None,
        }
    }
}

/// Data compares by value; classes, instances and functions by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Data(a), Self::Data(b)) => a == b,
            (Self::Class(a), Self::Class(b)) => a.ptr_eq(b),
            (Self::Instance(a), Self::Instance(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Data(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Data(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Data(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Data(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Data(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Data(value.into())
    }
}

impl From<ClassObject> for Value {
    fn from(value: ClassObject) -> Self {
        Self::Class(value)
    }
}

impl From<Instance> for Value {
    fn from(value: Instance) -> Self {
        Self::Instance(value)
    }
}

impl From<FunctionObject> for Value {
    fn from(value: FunctionObject) -> Self {
        Self::Function(value)
    }
}

/// Positional and keyword arguments of a single call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    /// Positional arguments, in order
    pub positional: Vec<Value>,
    /// Keyword arguments
    pub keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    /// Create an empty argument list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from positional arguments
    #[must_use]
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            keyword: BTreeMap::new(),
        }
    }

    /// Append a positional argument
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Add a keyword argument
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.keyword.insert(name.into(), value.into());
        self
    }

    /// Bind an implicit first argument (`self` or `cls`)
    #[must_use]
    pub fn bind_first(mut self, value: Value) -> Self {
        self.positional.insert(0, value);
        self
    }

    /// Get a positional argument
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Get a keyword argument
    #[must_use]
    pub fn get_kwarg(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    /// Number of positional arguments
    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    /// Whether there are no arguments at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

/// An error raised by a callable
///
/// Instrumentation passes these through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct CallError {
    /// Error class, e.g. `ValueError`
    pub kind: String,
    /// Error message
    pub message: String,
}

impl CallError {
    /// Create a new raised error
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// A type error (wrong arguments, object not callable)
    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    /// An attribute lookup error
    #[must_use]
    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new("AttributeError", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_args_builder() {
        let args = CallArgs::new().arg(1_i64).arg("two").kwarg("three", true);
        assert_eq!(args.len(), 2);
        assert_eq!(args.get(0).and_then(Value::as_i64), Some(1));
        assert_eq!(args.get(1).and_then(Value::as_str), Some("two"));
        assert_eq!(args.get_kwarg("three"), Some(&Value::from(true)));
    }

    #[test]
    fn test_bind_first_prepends() {
        let args = CallArgs::positional([2_i64, 3]).bind_first(Value::from(1_i64));
        let ints: Vec<_> = args.positional.iter().filter_map(Value::as_i64).collect();
        assert_eq!(ints, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_args() {
        assert!(CallArgs::new().is_empty());
        assert!(!CallArgs::new().kwarg("k", 1_i64).is_empty());
    }

    #[test]
    fn test_call_error_display() {
        let err = CallError::new("ValueError", "bad input");
        assert_eq!(err.to_string(), "ValueError: bad input");
    }

    #[test]
    fn test_value_equality_for_data() {
        assert_eq!(Value::from(3_i64), Value::from(3_i64));
        assert_ne!(Value::from(3_i64), Value::from("3"));
        assert_eq!(Value::None, Value::default());
    }
}
