//! Values on the evaluation stack of the reference interpreter.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};

use crate::model::Token;

/// Where the definition of an object's runtime type lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeLocation {
    /// Index of the loaded module
    pub module: usize,
    /// `TypeDef` token inside that module
    pub token: Token,
}

/// A heap object created by `newobj` or [`crate::emulation::Interpreter::create`].
///
/// Objects are shared through [`Arc`], which gives each one a stable address for the
/// tracker to identify it by.
pub struct ManagedObject {
    type_name: String,
    location: Option<TypeLocation>,
    fields: Mutex<HashMap<String, Value>>,
}

impl ManagedObject {
    /// Allocates an object of the given runtime type.
    ///
    /// `location` is `None` for types that are not defined by a loaded module.
    #[must_use]
    pub fn new(type_name: impl Into<String>, location: Option<TypeLocation>) -> Arc<Self> {
        Arc::new(Self {
            type_name: type_name.into(),
            location,
            fields: Mutex::new(HashMap::new()),
        })
    }

    /// Full name of the runtime type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Definition of the runtime type, if it belongs to a loaded module.
    #[must_use]
    pub fn location(&self) -> Option<TypeLocation> {
        self.location
    }

    /// Reads a field; unset fields read as [`Value::Null`].
    #[must_use]
    pub fn field(&self, key: &str) -> Value {
        lock!(self.fields).get(key).cloned().unwrap_or_default()
    }

    /// Writes a field.
    pub fn set_field(&self, key: impl Into<String>, value: Value) {
        lock!(self.fields).insert(key.into(), value);
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.type_name, self as *const Self)
    }
}

/// A value the interpreter operates on.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The null reference
    #[default]
    Null,
    /// A 32-bit integer
    Int(i32),
    /// A string
    Str(String),
    /// A reference to a heap object
    Object(Arc<ManagedObject>),
}

impl Value {
    /// Truthiness as used by `brtrue` / `brfalse`.
    #[must_use]
    pub fn is_true(&self) -> bool {
        match self {
            Value::Null | Value::Int(0) => false,
            Value::Int(_) | Value::Str(_) | Value::Object(_) => true,
        }
    }

    /// The referenced object, if this is an object reference.
    #[must_use]
    pub fn as_object(&self) -> Option<&Arc<ManagedObject>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The string, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}
