//! Method definitions, flags and bodies.
//!
//! # Key Types
//! - [`MethodDef`]: a method owned by a [`crate::model::TypeDef`]
//! - [`MethodBody`]: the body of a method with its [`InstructionList`]
//! - [`MethodModifiers`], [`MethodAccess`]: attribute flags
//! - [`Param`]: a declared parameter

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::model::{CustomAttribute, InstructionList, Token};

/// Name of instance constructors.
pub const CONSTRUCTOR_NAME: &str = ".ctor";
/// Name of type initializers.
pub const TYPE_INITIALIZER_NAME: &str = ".cctor";

bitflags! {
    /// Method modifiers and properties, using the ECMA-335 `MethodAttributes` bit values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides 'special' behavior, depending upon the name of the method
        const RTSPECIAL_NAME = 0x1000;
    }
}

/// Method accessibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodAccess {
    /// Accessible only by the parent type
    #[default]
    Private,
    /// Accessible by the type and sub-types
    Family,
    /// Accessible by anyone in the assembly
    Assembly,
    /// Accessible by anyone who has visibility to this scope
    Public,
}

/// A declared method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Full name of the parameter type
    pub param_type: String,
}

/// The body of a method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBody {
    /// Maximum evaluation stack depth
    #[serde(default)]
    pub max_stack: u16,
    /// The instructions of the body
    pub instructions: InstructionList,
}

impl MethodBody {
    /// Creates a body from an instruction list.
    #[must_use]
    pub fn new(instructions: InstructionList) -> Self {
        Self {
            max_stack: 8,
            instructions,
        }
    }
}

/// A method defined on a [`crate::model::TypeDef`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    /// Token in the `MethodDef` table
    pub token: Token,
    /// Method name (`.ctor` for constructors)
    pub name: String,
    /// Accessibility
    #[serde(default)]
    pub access: MethodAccess,
    /// Modifier flags
    #[serde(default)]
    pub modifiers: MethodModifiers,
    /// Declared parameters (not counting `this`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    /// Full name of the return type
    #[serde(default = "void_type")]
    pub return_type: String,
    /// Body, `None` for abstract and runtime-provided methods
    #[serde(default)]
    pub body: Option<MethodBody>,
    /// Attributes attached to the method
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_attributes: Vec<CustomAttribute>,
}

fn void_type() -> String {
    "System.Void".to_string()
}

impl MethodDef {
    /// Creates a private instance method returning `System.Void`.
    ///
    /// The token is assigned when the method is added to a model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            token: Token::new(0),
            name: name.into(),
            access: MethodAccess::Private,
            modifiers: MethodModifiers::HIDE_BY_SIG,
            params: Vec::new(),
            return_type: void_type(),
            body: None,
            custom_attributes: Vec::new(),
        }
    }

    /// Creates a public instance constructor.
    #[must_use]
    pub fn constructor() -> Self {
        Self::new(CONSTRUCTOR_NAME).public().modifiers(
            MethodModifiers::HIDE_BY_SIG
                | MethodModifiers::SPECIAL_NAME
                | MethodModifiers::RTSPECIAL_NAME,
        )
    }

    /// Creates a type initializer.
    #[must_use]
    pub fn type_initializer() -> Self {
        Self::new(TYPE_INITIALIZER_NAME).modifiers(
            MethodModifiers::STATIC
                | MethodModifiers::HIDE_BY_SIG
                | MethodModifiers::SPECIAL_NAME
                | MethodModifiers::RTSPECIAL_NAME,
        )
    }

    /// Makes the method public.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.access = MethodAccess::Public;
        self
    }

    /// Makes the method family (protected) accessible.
    #[must_use]
    pub fn family(mut self) -> Self {
        self.access = MethodAccess::Family;
        self
    }

    /// Replaces the modifier flags.
    #[must_use]
    pub fn modifiers(mut self, modifiers: MethodModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Adds `VIRTUAL` to the modifier flags.
    #[must_use]
    pub fn virtual_(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL;
        self
    }

    /// Adds `STATIC` to the modifier flags.
    #[must_use]
    pub fn static_(mut self) -> Self {
        self.modifiers |= MethodModifiers::STATIC;
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, param_type: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            param_type: param_type.into(),
        });
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = return_type.into();
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches a custom attribute.
    #[must_use]
    pub fn attribute(mut self, attribute_type: impl Into<String>) -> Self {
        self.custom_attributes
            .push(CustomAttribute::new(attribute_type));
        self
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    /// Returns `true` for instance constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME && !self.is_static()
    }

    /// Returns `true` if the method declares any parameter.
    #[must_use]
    pub fn has_parameters(&self) -> bool {
        !self.params.is_empty()
    }

    /// Returns `true` if name and parameter type names match exactly.
    #[must_use]
    pub fn is_match(&self, name: &str, param_types: &[&str]) -> bool {
        self.name == name
            && self.params.len() == param_types.len()
            && self
                .params
                .iter()
                .zip(param_types)
                .all(|(param, expected)| param.param_type == *expected)
    }

    /// Signature-style description, e.g. `Dispose(System.Boolean)`.
    #[must_use]
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.param_type.as_str()).collect();
        format!("{}({})", self.name, params.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_classification() {
        assert!(MethodDef::constructor().is_constructor());
        assert!(!MethodDef::type_initializer().is_constructor());
        assert!(!MethodDef::new(CONSTRUCTOR_NAME).static_().is_constructor());
        assert!(!MethodDef::new("Dispose").is_constructor());
    }

    #[test]
    fn test_is_match() {
        let method = MethodDef::new("Register")
            .static_()
            .param("obj", "System.Object");
        assert!(method.is_match("Register", &["System.Object"]));
        assert!(!method.is_match("Register", &[]));
        assert!(!method.is_match("Register", &["System.String"]));
        assert!(!method.is_match("Unregister", &["System.Object"]));
    }

    #[test]
    fn test_signature() {
        let method = MethodDef::new("Dispose").param("disposing", "System.Boolean");
        assert_eq!(method.signature(), "Dispose(System.Boolean)");
        assert!(method.has_parameters());
        assert_eq!(MethodDef::new("Dispose").signature(), "Dispose()");
    }
}
