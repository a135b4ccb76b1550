//! In-memory code model consumed and mutated by the weaver.
//!
//! The code model is the abstract stand-in for a compiled module: type definitions with
//! their methods, fields and instruction bodies, plus the external scopes, types and members
//! the module references. The weaver never reads or writes a binary container; it receives
//! a [`CodeModel`], mutates it in place and hands it back.
//!
//! # Architecture
//!
//! ```text
//! CodeModel
//! ├── assembly_refs: [AssemblyRef]          0x23xxxxxx
//! ├── type_refs:     [TypeRef → scope]      0x01xxxxxx
//! ├── member_refs:   [MemberRef → TypeRef]  0x0Axxxxxx
//! └── types:         [TypeDef]              0x02xxxxxx
//!                      ├── methods: [MethodDef]   0x06xxxxxx
//!                      │              └── body: InstructionList
//!                      └── fields:  [FieldDef]    0x04xxxxxx
//! ```
//!
//! # Key Components
//!
//! - [`CodeModel`] - The module and its reference tables
//! - [`TypeDef`], [`MethodDef`], [`FieldDef`] - Owned definitions
//! - [`TypeRef`], [`MemberRef`], [`AssemblyRef`] - External references
//! - [`InstructionList`] - Branch-target aware instruction sequence
//! - [`BodyBuilder`] - Label-resolving body assembler
//! - [`Token`] - Table/row addressing of all entities

mod builder;
mod instruction;
mod io;
mod method;
mod module;
mod token;
mod types;

pub use builder::BodyBuilder;
pub use instruction::{FlowType, Instruction, InstructionList, OpCode, Operand};
pub use method::{
    MethodAccess, MethodBody, MethodDef, MethodModifiers, Param, CONSTRUCTOR_NAME,
    TYPE_INITIALIZER_NAME,
};
pub use module::{CodeModel, MemberRef};
pub use token::{table, Token};
pub use types::{
    is_generated_code, AssemblyRef, CustomAttribute, FieldDef, TypeAttributes, TypeDef, TypeRef,
    VISIBILITY_MASK,
};
