//! Instruction representation and the mutable per-method instruction list.
//!
//! This module defines the instruction vocabulary the weaver and the reference interpreter
//! understand. It is a deliberately small subset of CIL: the instructions that ordinary
//! constructors and dispose methods are made of, plus the control flow needed to express
//! early returns.
//!
//! # Key Components
//!
//! - [`OpCode`] - Instruction opcodes with their CIL byte values and mnemonics
//! - [`Operand`] - Type-safe operand representation
//! - [`FlowType`] - Control flow behavior classification
//! - [`Instruction`] - Opcode and operand pair
//! - [`InstructionList`] - Ordered, index-addressed instruction sequence of one method body
//!
//! # Branch Targets
//!
//! Branch operands ([`Operand::Target`]) hold the index of the target instruction inside the
//! same list. [`InstructionList`] keeps those indices consistent across insertions and
//! removals, so rewriting code never has to patch branches by hand.
//!
//! # Usage Examples
//!
//! ```rust
//! use disposetrack::model::{Instruction, InstructionList, OpCode, Operand};
//!
//! let mut list = InstructionList::new();
//! list.push(Instruction::new(OpCode::Ldarg1));
//! list.push(Instruction::with_operand(OpCode::Brfalse, Operand::Target(3)));
//! list.push(Instruction::new(OpCode::Nop));
//! list.push(Instruction::new(OpCode::Ret));
//!
//! // Inserting in front of the list keeps the branch pointing at `ret`
//! list.insert_all(0, vec![Instruction::new(OpCode::Nop)]);
//! assert_eq!(list[2].operand, Operand::Target(4));
//! ```

use std::{fmt, ops::Index};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::model::Token;

/// How an instruction affects control flow.
///
/// This enum categorizes instructions based on their control flow behavior,
/// which the interpreter uses to drive execution and the weaver uses to locate exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Exception throwing
    Throw,
}

/// Instruction opcodes understood by the code model.
///
/// The `Display` and `FromStr` implementations use the CIL mnemonic (`ldarg.0`, `call`, ...).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
pub enum OpCode {
    /// Do nothing
    #[strum(serialize = "nop")]
    Nop,
    /// Load argument 0 (`this` for instance methods)
    #[strum(serialize = "ldarg.0")]
    Ldarg0,
    /// Load argument 1
    #[strum(serialize = "ldarg.1")]
    Ldarg1,
    /// Load argument 2
    #[strum(serialize = "ldarg.2")]
    Ldarg2,
    /// Load argument 3
    #[strum(serialize = "ldarg.3")]
    Ldarg3,
    /// Load the argument given as operand
    #[strum(serialize = "ldarg.s")]
    LdargS,
    /// Load a null reference
    #[strum(serialize = "ldnull")]
    Ldnull,
    /// Load a 32-bit integer constant
    #[strum(serialize = "ldc.i4")]
    LdcI4,
    /// Load a string literal
    #[strum(serialize = "ldstr")]
    Ldstr,
    /// Load an instance field of the object on the stack
    #[strum(serialize = "ldfld")]
    Ldfld,
    /// Store into an instance field of the object on the stack
    #[strum(serialize = "stfld")]
    Stfld,
    /// Call a method
    #[strum(serialize = "call")]
    Call,
    /// Call a method through virtual dispatch
    #[strum(serialize = "callvirt")]
    Callvirt,
    /// Allocate an object and call its constructor
    #[strum(serialize = "newobj")]
    Newobj,
    /// Pop the top of the stack
    #[strum(serialize = "pop")]
    Pop,
    /// Duplicate the top of the stack
    #[strum(serialize = "dup")]
    Dup,
    /// Unconditional branch
    #[strum(serialize = "br")]
    Br,
    /// Branch if the top of the stack is non-null / non-zero
    #[strum(serialize = "brtrue")]
    Brtrue,
    /// Branch if the top of the stack is null / zero
    #[strum(serialize = "brfalse")]
    Brfalse,
    /// Return from the method
    #[strum(serialize = "ret")]
    Ret,
    /// Throw the exception object on the stack
    #[strum(serialize = "throw")]
    Throw,
}

impl OpCode {
    /// The primary CIL opcode byte of this instruction.
    #[must_use]
    pub const fn byte(&self) -> u8 {
        match self {
            OpCode::Nop => 0x00,
            OpCode::Ldarg0 => 0x02,
            OpCode::Ldarg1 => 0x03,
            OpCode::Ldarg2 => 0x04,
            OpCode::Ldarg3 => 0x05,
            OpCode::LdargS => 0x0E,
            OpCode::Ldnull => 0x14,
            OpCode::LdcI4 => 0x20,
            OpCode::Dup => 0x25,
            OpCode::Pop => 0x26,
            OpCode::Call => 0x28,
            OpCode::Ret => 0x2A,
            OpCode::Br => 0x38,
            OpCode::Brfalse => 0x39,
            OpCode::Brtrue => 0x3A,
            OpCode::Callvirt => 0x6F,
            OpCode::Ldstr => 0x72,
            OpCode::Newobj => 0x73,
            OpCode::Throw => 0x7A,
            OpCode::Ldfld => 0x7B,
            OpCode::Stfld => 0x7D,
        }
    }

    /// How this opcode affects control flow.
    #[must_use]
    pub const fn flow_type(&self) -> FlowType {
        match self {
            OpCode::Call | OpCode::Callvirt | OpCode::Newobj => FlowType::Call,
            OpCode::Br => FlowType::UnconditionalBranch,
            OpCode::Brtrue | OpCode::Brfalse => FlowType::ConditionalBranch,
            OpCode::Ret => FlowType::Return,
            OpCode::Throw => FlowType::Throw,
            _ => FlowType::Sequential,
        }
    }

    /// Returns `true` for `call` and `callvirt`.
    #[must_use]
    pub const fn is_call(&self) -> bool {
        matches!(self, OpCode::Call | OpCode::Callvirt)
    }
}

/// An instruction operand.
///
/// Method, type and field operands are [`Token`]s resolved against the owning
/// [`crate::CodeModel`]; a method operand is either a `MethodDef` or a `MemberRef` token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// No operand present
    None,
    /// 32-bit integer immediate
    Int(i32),
    /// String literal
    String(String),
    /// Method argument index
    Argument(u16),
    /// Method reference (`MethodDef` or `MemberRef`)
    Method(Token),
    /// Type reference (`TypeDef` or `TypeRef`)
    Type(Token),
    /// Field reference
    Field(Token),
    /// Branch target, as an index into the owning instruction list
    Target(usize),
}

impl Operand {
    /// Returns the method token if this is a method operand.
    #[must_use]
    pub fn method(&self) -> Option<Token> {
        match self {
            Operand::Method(token) => Some(*token),
            _ => None,
        }
    }

    /// Returns the branch target if this is a target operand.
    #[must_use]
    pub fn target(&self) -> Option<usize> {
        match self {
            Operand::Target(target) => Some(*target),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Int(value) => write!(f, "{value}"),
            Operand::String(value) => write!(f, "{value:?}"),
            Operand::Argument(index) => write!(f, "A_{index}"),
            Operand::Method(token) | Operand::Type(token) | Operand::Field(token) => {
                write!(f, "{token}")
            }
            Operand::Target(index) => write!(f, "IL_{index:04}"),
        }
    }
}

/// A single instruction: opcode plus operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// The opcode
    pub opcode: OpCode,
    /// The operand data for this instruction
    #[serde(default = "operand_none", skip_serializing_if = "is_operand_none")]
    pub operand: Operand,
}

fn operand_none() -> Operand {
    Operand::None
}

fn is_operand_none(operand: &Operand) -> bool {
    *operand == Operand::None
}

impl Instruction {
    /// Creates an instruction without operand.
    #[must_use]
    pub fn new(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: Operand::None,
        }
    }

    /// Creates an instruction with the given operand.
    #[must_use]
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self { opcode, operand }
    }

    /// Creates a `call` to the given method token.
    #[must_use]
    pub fn call(method: Token) -> Self {
        Self::with_operand(OpCode::Call, Operand::Method(method))
    }

    /// How this instruction affects control flow.
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        self.opcode.flow_type()
    }

    /// Check if this instruction is a branch instruction.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.flow_type(),
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            _ => write!(f, "{} {}", self.opcode, self.operand),
        }
    }
}

/// The ordered instruction sequence of one method body.
///
/// All mutation goes through list operations that keep [`Operand::Target`] indices pointing
/// at the same logical instruction:
///
/// - [`InstructionList::insert_all`] shifts every target at or after the insertion point, so
///   existing branches keep jumping to the instruction they jumped to before.
/// - [`InstructionList::insert_all_redirecting`] shifts only targets after the insertion
///   point; branches that jumped to the instruction at the insertion point now land on the
///   first inserted instruction. This is how code is placed "in front of" a `ret` so every
///   path that reaches the `ret` also runs the new code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionList {
    items: Vec<Instruction>,
}

impl InstructionList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the list contains no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the instructions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.items.iter()
    }

    /// Returns the instruction at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.items.get(index)
    }

    /// Returns the last instruction.
    #[must_use]
    pub fn last(&self) -> Option<&Instruction> {
        self.items.last()
    }

    /// Appends an instruction at the end; branch targets are unaffected.
    pub fn push(&mut self, instruction: Instruction) {
        self.items.push(instruction);
    }

    /// Inserts `instructions` at `index`, shifting targets at or after `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert_all(&mut self, index: usize, instructions: Vec<Instruction>) {
        self.splice_in(index, instructions, |target| target >= index);
    }

    /// Inserts `instructions` at `index`, shifting only targets after `index`.
    ///
    /// Branches to the instruction previously at `index` now reach the first inserted
    /// instruction instead.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert_all_redirecting(&mut self, index: usize, instructions: Vec<Instruction>) {
        self.splice_in(index, instructions, |target| target > index);
    }

    fn splice_in(
        &mut self,
        index: usize,
        instructions: Vec<Instruction>,
        shifts: impl Fn(usize) -> bool,
    ) {
        let count = instructions.len();
        if count == 0 {
            return;
        }

        for instruction in &mut self.items {
            if let Operand::Target(target) = &mut instruction.operand {
                if shifts(*target) {
                    *target += count;
                }
            }
        }

        self.items.splice(index..index, instructions);
    }

    /// Removes the instruction at `index` and returns it.
    ///
    /// Targets after `index` move down by one; targets at `index` now reach the
    /// instruction that followed the removed one.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove(&mut self, index: usize) -> Instruction {
        let removed = self.items.remove(index);
        for instruction in &mut self.items {
            if let Operand::Target(target) = &mut instruction.operand {
                if *target > index {
                    *target -= 1;
                }
            }
        }
        removed
    }

    /// Replaces the instruction at `index`, returning the previous one.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn replace(&mut self, index: usize, instruction: Instruction) -> Instruction {
        std::mem::replace(&mut self.items[index], instruction)
    }

    /// Removes all instructions.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Index of the last instruction with the given opcode.
    #[must_use]
    pub fn rposition(&self, opcode: OpCode) -> Option<usize> {
        self.items.iter().rposition(|i| i.opcode == opcode)
    }

    /// Returns the first branch whose target lies outside the list, if any.
    #[must_use]
    pub fn dangling_target(&self) -> Option<(usize, usize)> {
        self.items
            .iter()
            .enumerate()
            .find_map(|(index, instruction)| match instruction.operand {
                Operand::Target(target) if target >= self.items.len() => Some((index, target)),
                _ => None,
            })
    }
}

impl Index<usize> for InstructionList {
    type Output = Instruction;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl From<Vec<Instruction>> for InstructionList {
    fn from(items: Vec<Instruction>) -> Self {
        Self { items }
    }
}

impl<'a> IntoIterator for &'a InstructionList {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
