//! Type-level entities of the code model.
//!
//! # Key Types
//! - [`TypeDef`]: a type defined in the module being instrumented
//! - [`TypeRef`]: a type defined in another scope and referenced from this module
//! - [`AssemblyRef`]: an external scope (compilation unit) this module references
//! - [`FieldDef`]: a field of a [`TypeDef`]
//! - [`CustomAttribute`]: a declarative marker attached to a type, method or field
//! - [`TypeAttributes`]: visibility and semantics flags of a [`TypeDef`]

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::model::{MethodDef, Token};

bitflags! {
    /// Type definition flags, using the ECMA-335 `TypeAttributes` bit values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TypeAttributes: u32 {
        /// Type is visible outside its assembly
        const PUBLIC = 0x0000_0001;
        /// Nested type with public visibility
        const NESTED_PUBLIC = 0x0000_0002;
        /// Nested type with private visibility
        const NESTED_PRIVATE = 0x0000_0003;
        /// Type is an interface definition
        const INTERFACE = 0x0000_0020;
        /// Class is abstract and cannot be instantiated directly
        const ABSTRACT = 0x0000_0080;
        /// Class is sealed and cannot be inherited from
        const SEALED = 0x0000_0100;
        /// Class name has special meaning to the runtime
        const SPECIAL_NAME = 0x0000_0400;
        /// Type is serializable (legacy attribute)
        const SERIALIZABLE = 0x0000_2000;
        /// Initialize the class before first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

/// Mask for extracting type visibility
pub const VISIBILITY_MASK: u32 = 0x0000_0007;

/// A custom attribute, recorded by the full name of its attribute type.
///
/// Attribute arguments are not modeled; everything the weaver needs (compiler-generated
/// detection and the opt-out marker) is decided by the attribute type alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomAttribute {
    /// Full name of the attribute type, e.g. `System.Runtime.CompilerServices.CompilerGeneratedAttribute`
    pub attribute_type: String,
}

impl CustomAttribute {
    /// Creates an attribute of the given type.
    pub fn new(attribute_type: impl Into<String>) -> Self {
        Self {
            attribute_type: attribute_type.into(),
        }
    }

    /// The attribute type name without its namespace.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.attribute_type
            .rsplit_once('.')
            .map_or(self.attribute_type.as_str(), |(_, name)| name)
    }
}

/// An external scope referenced by the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyRef {
    /// Simple name of the referenced assembly, e.g. `mscorlib`
    pub name: String,
}

/// A reference to a type living in another scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// The `AssemblyRef` this type is resolved through
    pub scope: Token,
    /// Namespace of the type
    pub namespace: String,
    /// Name of the type
    pub name: String,
}

impl TypeRef {
    /// Full name in `Namespace.Name` form.
    #[must_use]
    pub fn full_name(&self) -> String {
        join_name(&self.namespace, &self.name)
    }
}

/// A field defined on a [`TypeDef`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Token in the `Field` table
    pub token: Token,
    /// Field name
    pub name: String,
    /// Full name of the field type
    pub field_type: String,
    /// `true` for static fields
    #[serde(default)]
    pub is_static: bool,
    /// Attributes attached to the field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_attributes: Vec<CustomAttribute>,
}

impl FieldDef {
    /// Creates an instance field; the token is assigned when the field is added to a model.
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            token: Token::new(0),
            name: name.into(),
            field_type: field_type.into(),
            is_static: false,
            custom_attributes: Vec::new(),
        }
    }

    /// Attaches a custom attribute.
    #[must_use]
    pub fn attribute(mut self, attribute_type: impl Into<String>) -> Self {
        self.custom_attributes
            .push(CustomAttribute::new(attribute_type));
        self
    }
}

/// A type defined in the module.
///
/// A `TypeDef` owns its methods and fields. Its base type is either another `TypeDef` of the
/// same module or a [`TypeRef`] into a different scope; `None` only for `System.Object`
/// itself and for interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Namespace of the type (empty for nested types)
    pub namespace: String,
    /// Name of the type
    pub name: String,
    /// Type flags
    #[serde(default)]
    pub flags: TypeAttributes,
    /// Base type token (`TypeDef` or `TypeRef`)
    #[serde(default)]
    pub base: Option<Token>,
    /// Enclosing type for nested types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing: Option<Token>,
    /// Declared interfaces (`TypeDef` or `TypeRef` tokens)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Token>,
    /// Methods in declaration order
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    /// Fields in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDef>,
    /// Attributes attached to the type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_attributes: Vec<CustomAttribute>,
}

impl TypeDef {
    /// Creates a public class deriving from `base`.
    pub fn class(namespace: impl Into<String>, name: impl Into<String>, base: Token) -> Self {
        Self {
            base: Some(base),
            ..Self::new(namespace, name, TypeAttributes::PUBLIC)
        }
    }

    /// Creates a public interface.
    pub fn interface(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            namespace,
            name,
            TypeAttributes::PUBLIC | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT,
        )
    }

    /// Creates a type with explicit flags and no base type.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, flags: TypeAttributes) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            flags,
            base: None,
            enclosing: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            custom_attributes: Vec::new(),
        }
    }

    /// Sets the flags of this type.
    #[must_use]
    pub fn flags(mut self, flags: TypeAttributes) -> Self {
        self.flags = flags;
        self
    }

    /// Marks this type abstract.
    #[must_use]
    pub fn abstract_(mut self) -> Self {
        self.flags |= TypeAttributes::ABSTRACT;
        self
    }

    /// Adds a declared interface.
    #[must_use]
    pub fn implements(mut self, interface: Token) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Nests this type inside `enclosing`.
    #[must_use]
    pub fn nested_in(mut self, enclosing: Token) -> Self {
        self.enclosing = Some(enclosing);
        self
    }

    /// Attaches a custom attribute.
    #[must_use]
    pub fn attribute(mut self, attribute_type: impl Into<String>) -> Self {
        self.custom_attributes
            .push(CustomAttribute::new(attribute_type));
        self
    }

    /// Returns `true` if the type is an interface.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeAttributes::INTERFACE)
    }

    /// Returns `true` if the type is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeAttributes::ABSTRACT)
    }

    /// Returns `true` if the type is visible outside its assembly.
    #[must_use]
    pub fn is_public(&self) -> bool {
        let visibility = self.flags.bits() & VISIBILITY_MASK;
        visibility == TypeAttributes::PUBLIC.bits()
            || visibility == TypeAttributes::NESTED_PUBLIC.bits()
    }

    /// Returns `true` if a compiler generated this type.
    #[must_use]
    pub fn is_generated_code(&self) -> bool {
        is_generated_code(&self.custom_attributes)
    }

    /// Iterates over the instance constructors of this type.
    pub fn constructors(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.iter().filter(|m| m.is_constructor())
    }

    /// Finds a method by name and parameter types.
    #[must_use]
    pub fn find_method(&self, name: &str, param_types: &[&str]) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.is_match(name, param_types))
    }
}

/// Returns `true` if the attributes mark their owner as compiler generated.
#[must_use]
pub fn is_generated_code(attributes: &[CustomAttribute]) -> bool {
    attributes.iter().any(|a| {
        matches!(
            a.short_name(),
            "CompilerGeneratedAttribute" | "GeneratedCodeAttribute"
        )
    })
}

pub(crate) fn join_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_short_name() {
        let attribute =
            CustomAttribute::new("System.Runtime.CompilerServices.CompilerGeneratedAttribute");
        assert_eq!(attribute.short_name(), "CompilerGeneratedAttribute");
        assert_eq!(CustomAttribute::new("Plain").short_name(), "Plain");
    }

    #[test]
    fn test_generated_code_detection() {
        let generated = TypeDef::class("Ns", "<>c", Token::type_ref(0))
            .attribute("System.Runtime.CompilerServices.CompilerGeneratedAttribute");
        assert!(generated.is_generated_code());

        let tool = TypeDef::class("Ns", "Proxy", Token::type_ref(0))
            .attribute("System.CodeDom.Compiler.GeneratedCodeAttribute");
        assert!(tool.is_generated_code());

        let plain = TypeDef::class("Ns", "Plain", Token::type_ref(0))
            .attribute("System.SerializableAttribute");
        assert!(!plain.is_generated_code());
    }

    #[test]
    fn test_type_flags() {
        let interface = TypeDef::interface("System", "IDisposable");
        assert!(interface.is_interface());
        assert!(interface.is_abstract());
        assert!(interface.is_public());

        let internal = TypeDef::class("Ns", "Hidden", Token::type_ref(0))
            .flags(TypeAttributes::empty())
            .abstract_();
        assert!(!internal.is_public());
        assert!(internal.is_abstract());
        assert!(!internal.is_interface());
    }

    #[test]
    fn test_type_ref_full_name() {
        let object = TypeRef {
            scope: Token::assembly_ref(0),
            namespace: "System".to_string(),
            name: "Object".to_string(),
        };
        assert_eq!(object.full_name(), "System.Object");
        assert_eq!(join_name("", "Global"), "Global");
    }
}
