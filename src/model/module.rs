//! The [`CodeModel`]: one compiled module as seen by the weaver.
//!
//! A `CodeModel` is the mutable, in-memory graph of a single compilation unit: its own
//! type definitions (with methods, fields and bodies) plus the external scopes, types and
//! members it references. Every entity is addressed by a [`Token`] whose row is its
//! 1-based position in the respective table, mirroring ECMA-335 metadata.
//!
//! # Ownership
//!
//! Types own their methods and fields; methods own their bodies; bodies own their
//! instructions. References between entities are tokens, never pointers, which keeps the
//! whole graph a plain tree of owned data that can be cloned, serialized and mutated
//! in place without reference counting.
//!
//! # Usage Examples
//!
//! ```rust
//! use disposetrack::model::{CodeModel, MethodDef, TypeDef};
//!
//! let mut model = CodeModel::new("Library");
//! let mscorlib = model.add_assembly_ref("mscorlib");
//! let object = model.import_type(mscorlib, "System", "Object");
//!
//! let widget = model.add_type(TypeDef::class("Library", "Widget", object));
//! let ctor = model.add_method(widget, MethodDef::constructor())?;
//!
//! assert_eq!(model.type_full_name(widget).as_deref(), Some("Library.Widget"));
//! assert_eq!(model.method_owner(ctor), Some(widget));
//! # Ok::<(), disposetrack::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    model::{
        table, types::join_name, AssemblyRef, FieldDef, MethodBody, MethodDef, Token, TypeDef,
        TypeRef, CONSTRUCTOR_NAME,
    },
    Error, Result,
};

/// A reference to a method living in another scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    /// The `TypeRef` declaring the method
    pub parent: Token,
    /// Method name
    pub name: String,
    /// Full names of the parameter types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    /// `true` for instance methods
    #[serde(default)]
    pub has_this: bool,
}

/// One compilation unit: its type definitions plus everything they reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeModel {
    /// Name of the assembly this module belongs to; the module's own scope
    pub assembly: String,
    /// Referenced external scopes
    #[serde(default)]
    pub assembly_refs: Vec<AssemblyRef>,
    /// Referenced external types
    #[serde(default)]
    pub type_refs: Vec<TypeRef>,
    /// Referenced external methods
    #[serde(default)]
    pub member_refs: Vec<MemberRef>,
    /// Types defined in this module
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

impl CodeModel {
    /// Creates an empty module for the given assembly name.
    pub fn new(assembly: impl Into<String>) -> Self {
        Self {
            assembly: assembly.into(),
            assembly_refs: Vec::new(),
            type_refs: Vec::new(),
            member_refs: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Adds an assembly reference, reusing an existing one with the same name.
    pub fn add_assembly_ref(&mut self, name: &str) -> Token {
        if let Some(existing) = self.find_assembly_ref(name) {
            return existing;
        }
        self.assembly_refs.push(AssemblyRef {
            name: name.to_string(),
        });
        Token::assembly_ref(self.assembly_refs.len() - 1)
    }

    /// Finds an assembly reference by name.
    #[must_use]
    pub fn find_assembly_ref(&self, name: &str) -> Option<Token> {
        self.assembly_refs
            .iter()
            .position(|a| a.name == name)
            .map(Token::assembly_ref)
    }

    /// Adds a type reference, reusing an existing equal one.
    pub fn import_type(&mut self, scope: Token, namespace: &str, name: &str) -> Token {
        if let Some(index) = self
            .type_refs
            .iter()
            .position(|t| t.scope == scope && t.namespace == namespace && t.name == name)
        {
            return Token::type_ref(index);
        }
        self.type_refs.push(TypeRef {
            scope,
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        Token::type_ref(self.type_refs.len() - 1)
    }

    /// Adds a member reference, reusing an existing equal one.
    pub fn import_method(
        &mut self,
        parent: Token,
        name: &str,
        params: &[&str],
        has_this: bool,
    ) -> Token {
        let member = MemberRef {
            parent,
            name: name.to_string(),
            params: params.iter().map(ToString::to_string).collect(),
            has_this,
        };
        if let Some(index) = self.member_refs.iter().position(|m| *m == member) {
            return Token::member_ref(index);
        }
        self.member_refs.push(member);
        Token::member_ref(self.member_refs.len() - 1)
    }

    /// Adds a type definition and returns its token.
    ///
    /// Methods and fields already attached to `type_def` are assigned fresh tokens.
    pub fn add_type(&mut self, mut type_def: TypeDef) -> Token {
        let mut next_method = self.next_row(table::METHOD_DEF);
        for method in &mut type_def.methods {
            method.token = Token::from_parts(table::METHOD_DEF, next_method);
            next_method += 1;
        }
        let mut next_field = self.next_row(table::FIELD);
        for field in &mut type_def.fields {
            field.token = Token::from_parts(table::FIELD, next_field);
            next_field += 1;
        }
        self.types.push(type_def);
        Token::type_def(self.types.len() - 1)
    }

    /// Adds a method to a type and returns the method token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] if `owner` is not a type definition of this module.
    pub fn add_method(&mut self, owner: Token, mut method: MethodDef) -> Result<Token> {
        let token = Token::from_parts(table::METHOD_DEF, self.next_row(table::METHOD_DEF));
        method.token = token;
        self.type_def_mut(owner)
            .ok_or(Error::InvalidToken(owner))?
            .methods
            .push(method);
        Ok(token)
    }

    /// Adds a field to a type and returns the field token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] if `owner` is not a type definition of this module.
    pub fn add_field(&mut self, owner: Token, mut field: FieldDef) -> Result<Token> {
        let token = Token::from_parts(table::FIELD, self.next_row(table::FIELD));
        field.token = token;
        self.type_def_mut(owner)
            .ok_or(Error::InvalidToken(owner))?
            .fields
            .push(field);
        Ok(token)
    }

    /// Replaces the body of a method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] if `method` is not a method definition of this module.
    pub fn set_body(&mut self, method: Token, body: MethodBody) -> Result<()> {
        self.method_mut(method)
            .ok_or(Error::InvalidToken(method))?
            .body = Some(body);
        Ok(())
    }

    fn next_row(&self, table_id: u8) -> u32 {
        let max = match table_id {
            table::METHOD_DEF => self
                .types
                .iter()
                .flat_map(|t| t.methods.iter().map(|m| m.token.row()))
                .max(),
            table::FIELD => self
                .types
                .iter()
                .flat_map(|t| t.fields.iter().map(|f| f.token.row()))
                .max(),
            _ => None,
        };
        max.unwrap_or(0) + 1
    }

    /// Iterates over all type definitions together with their tokens.
    pub fn type_defs(&self) -> impl Iterator<Item = (Token, &TypeDef)> {
        self.types
            .iter()
            .enumerate()
            .map(|(index, type_def)| (Token::type_def(index), type_def))
    }

    /// Resolves a `TypeDef` token.
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<&TypeDef> {
        if !token.is_type_def() {
            return None;
        }
        self.types.get(token.index()?)
    }

    /// Resolves a `TypeDef` token for mutation.
    pub fn type_def_mut(&mut self, token: Token) -> Option<&mut TypeDef> {
        if !token.is_type_def() {
            return None;
        }
        self.types.get_mut(token.index()?)
    }

    /// Resolves a `TypeRef` token.
    #[must_use]
    pub fn type_ref(&self, token: Token) -> Option<&TypeRef> {
        if !token.is_type_ref() {
            return None;
        }
        self.type_refs.get(token.index()?)
    }

    /// Resolves a `MemberRef` token.
    #[must_use]
    pub fn member_ref(&self, token: Token) -> Option<&MemberRef> {
        if !token.is_member_ref() {
            return None;
        }
        self.member_refs.get(token.index()?)
    }

    /// Resolves an `AssemblyRef` token.
    #[must_use]
    pub fn assembly_ref(&self, token: Token) -> Option<&AssemblyRef> {
        if token.table() != table::ASSEMBLY_REF {
            return None;
        }
        self.assembly_refs.get(token.index()?)
    }

    /// Full name of a `TypeDef` or `TypeRef`.
    ///
    /// Nested definitions use `Outer/Inner`. Returns `None` if the enclosing chain does not
    /// resolve or loops back on itself.
    #[must_use]
    pub fn type_full_name(&self, token: Token) -> Option<String> {
        if let Some(type_ref) = self.type_ref(token) {
            return Some(type_ref.full_name());
        }

        let mut type_def = self.type_def(token)?;
        let mut current = token;
        let mut nested = Vec::new();
        while let Some(enclosing) = type_def.enclosing.filter(|e| *e != current) {
            if nested.len() >= self.types.len() {
                return None;
            }
            nested.push(type_def.name.as_str());
            type_def = self.type_def(enclosing)?;
            current = enclosing;
        }

        let mut name = join_name(&type_def.namespace, &type_def.name);
        for inner in nested.iter().rev() {
            name.push('/');
            name.push_str(inner);
        }
        Some(name)
    }

    /// Returns `true` if following `enclosing` from `token` leads back to a type already
    /// visited.
    fn has_enclosing_cycle(&self, token: Token) -> bool {
        let mut current = token;
        for _ in 0..=self.types.len() {
            match self.type_def(current).and_then(|t| t.enclosing) {
                Some(enclosing) if enclosing != current => current = enclosing,
                _ => return false,
            }
        }
        true
    }

    /// Name of the scope a type lives in: this module's assembly for definitions, the
    /// referenced assembly for references.
    #[must_use]
    pub fn type_scope(&self, token: Token) -> Option<&str> {
        if self.type_def(token).is_some() {
            return Some(self.assembly.as_str());
        }
        let type_ref = self.type_ref(token)?;
        self.assembly_ref(type_ref.scope).map(|a| a.name.as_str())
    }

    /// Returns `true` if the type is defined in this compilation unit.
    #[must_use]
    pub fn is_local_type(&self, token: Token) -> bool {
        self.type_scope(token) == Some(self.assembly.as_str())
    }

    /// Locates a method definition as `(type index, method index)`.
    #[must_use]
    pub fn method_location(&self, token: Token) -> Option<(usize, usize)> {
        if !token.is_method_def() {
            return None;
        }
        self.types.iter().enumerate().find_map(|(type_index, t)| {
            t.methods
                .iter()
                .position(|m| m.token == token)
                .map(|method_index| (type_index, method_index))
        })
    }

    /// Resolves a `MethodDef` token.
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&MethodDef> {
        let (type_index, method_index) = self.method_location(token)?;
        self.types[type_index].methods.get(method_index)
    }

    /// Resolves a `MethodDef` token for mutation.
    pub fn method_mut(&mut self, token: Token) -> Option<&mut MethodDef> {
        let (type_index, method_index) = self.method_location(token)?;
        self.types[type_index].methods.get_mut(method_index)
    }

    /// Declaring type of a method: the owning `TypeDef` for definitions, the parent
    /// `TypeRef` for member references.
    #[must_use]
    pub fn method_owner(&self, token: Token) -> Option<Token> {
        if let Some(member) = self.member_ref(token) {
            return Some(member.parent);
        }
        self.method_location(token)
            .map(|(type_index, _)| Token::type_def(type_index))
    }

    /// Name of a `MethodDef` or `MemberRef`.
    #[must_use]
    pub fn method_name(&self, token: Token) -> Option<&str> {
        if let Some(member) = self.member_ref(token) {
            return Some(member.name.as_str());
        }
        self.method(token).map(|m| m.name.as_str())
    }

    /// Returns `true` if the method token names an instance constructor.
    #[must_use]
    pub fn is_constructor(&self, token: Token) -> bool {
        if let Some(member) = self.member_ref(token) {
            return member.name == CONSTRUCTOR_NAME && member.has_this;
        }
        self.method(token).is_some_and(MethodDef::is_constructor)
    }

    /// Full name of a method, e.g. `Library.Widget::Dispose(System.Boolean)`.
    #[must_use]
    pub fn method_full_name(&self, token: Token) -> Option<String> {
        let owner = self.type_full_name(self.method_owner(token)?)?;
        if let Some(member) = self.member_ref(token) {
            return Some(format!(
                "{owner}::{}({})",
                member.name,
                member.params.join(",")
            ));
        }
        Some(format!("{owner}::{}", self.method(token)?.signature()))
    }

    /// Checks that every token stored in the model resolves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] describing the first dangling reference.
    pub fn validate(&self) -> Result<()> {
        for (index, type_ref) in self.type_refs.iter().enumerate() {
            if self.assembly_ref(type_ref.scope).is_none() {
                return Err(malformed_error!(
                    "TypeRef {} has unresolved scope {}",
                    Token::type_ref(index),
                    type_ref.scope
                ));
            }
        }

        for (index, member) in self.member_refs.iter().enumerate() {
            if self.type_ref(member.parent).is_none() {
                return Err(malformed_error!(
                    "MemberRef {} has unresolved parent {}",
                    Token::member_ref(index),
                    member.parent
                ));
            }
        }

        for (token, _) in self.type_defs() {
            if self.has_enclosing_cycle(token) {
                return Err(malformed_error!("Type {} is nested in itself", token));
            }
        }

        for (token, type_def) in self.type_defs() {
            let related = type_def
                .base
                .iter()
                .chain(type_def.interfaces.iter())
                .chain(type_def.enclosing.iter());
            for reference in related {
                if self.type_full_name(*reference).is_none() {
                    return Err(malformed_error!(
                        "Type {} references unresolved type {}",
                        token,
                        reference
                    ));
                }
            }

            for method in &type_def.methods {
                if !method.token.is_method_def() {
                    return Err(malformed_error!(
                        "Method {} of type {} has an invalid token {}",
                        method.name,
                        token,
                        method.token
                    ));
                }
                let Some(body) = &method.body else {
                    continue;
                };
                if let Some((at, target)) = body.instructions.dangling_target() {
                    return Err(malformed_error!(
                        "Branch at IL_{:04} in {} targets IL_{:04} past the end of the body",
                        at,
                        method.token,
                        target
                    ));
                }
                for instruction in &body.instructions {
                    if let Some(callee) = instruction.operand.method() {
                        if self.method_owner(callee).is_none() {
                            return Err(malformed_error!(
                                "{} in {} references unresolved method {}",
                                instruction.opcode,
                                method.token,
                                callee
                            ));
                        }
                    }
                }
            }
        }

        let mut method_tokens: Vec<Token> = self
            .types
            .iter()
            .flat_map(|t| t.methods.iter().map(|m| m.token))
            .collect();
        method_tokens.sort_unstable();
        if let Some(pair) = method_tokens.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(malformed_error!("Duplicate method token {}", pair[0]));
        }

        Ok(())
    }
}
