//! Fluent construction of method bodies.
//!
//! [`BodyBuilder`] assembles an [`InstructionList`] instruction by instruction and resolves
//! named labels into branch targets when the body is built.
//!
//! # Examples
//!
//! ```rust
//! use disposetrack::model::{BodyBuilder, OpCode};
//!
//! // if (arg1) { nop } return;
//! let body = BodyBuilder::new()
//!     .ldarg(1)
//!     .branch(OpCode::Brfalse, "exit")
//!     .nop()
//!     .label("exit")
//!     .ret()
//!     .build()?;
//!
//! assert_eq!(body.instructions.len(), 4);
//! # Ok::<(), disposetrack::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    model::{Instruction, InstructionList, MethodBody, OpCode, Operand, Token},
    Result,
};

/// Builder for [`MethodBody`] values.
#[derive(Debug, Default)]
pub struct BodyBuilder {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
    fixups: Vec<(usize, String)>,
    max_stack: Option<u16>,
}

impl BodyBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum stack depth explicitly.
    #[must_use]
    pub fn max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = Some(max_stack);
        self
    }

    /// Appends an instruction without operand.
    #[must_use]
    pub fn op(mut self, opcode: OpCode) -> Self {
        self.instructions.push(Instruction::new(opcode));
        self
    }

    /// Appends an instruction with an operand.
    #[must_use]
    pub fn op_with(mut self, opcode: OpCode, operand: Operand) -> Self {
        self.instructions
            .push(Instruction::with_operand(opcode, operand));
        self
    }

    /// Appends `nop`.
    #[must_use]
    pub fn nop(self) -> Self {
        self.op(OpCode::Nop)
    }

    /// Appends the shortest form of `ldarg` for the given index.
    #[must_use]
    pub fn ldarg(self, index: u16) -> Self {
        match index {
            0 => self.op(OpCode::Ldarg0),
            1 => self.op(OpCode::Ldarg1),
            2 => self.op(OpCode::Ldarg2),
            3 => self.op(OpCode::Ldarg3),
            _ => self.op_with(OpCode::LdargS, Operand::Argument(index)),
        }
    }

    /// Appends `ldnull`.
    #[must_use]
    pub fn ldnull(self) -> Self {
        self.op(OpCode::Ldnull)
    }

    /// Appends `ldc.i4`.
    #[must_use]
    pub fn ldc_i4(self, value: i32) -> Self {
        self.op_with(OpCode::LdcI4, Operand::Int(value))
    }

    /// Appends `ldstr`.
    #[must_use]
    pub fn ldstr(self, value: impl Into<String>) -> Self {
        self.op_with(OpCode::Ldstr, Operand::String(value.into()))
    }

    /// Appends `ldfld`.
    #[must_use]
    pub fn ldfld(self, field: Token) -> Self {
        self.op_with(OpCode::Ldfld, Operand::Field(field))
    }

    /// Appends `stfld`.
    #[must_use]
    pub fn stfld(self, field: Token) -> Self {
        self.op_with(OpCode::Stfld, Operand::Field(field))
    }

    /// Appends `call`.
    #[must_use]
    pub fn call(self, method: Token) -> Self {
        self.op_with(OpCode::Call, Operand::Method(method))
    }

    /// Appends `callvirt`.
    #[must_use]
    pub fn callvirt(self, method: Token) -> Self {
        self.op_with(OpCode::Callvirt, Operand::Method(method))
    }

    /// Appends `newobj`.
    #[must_use]
    pub fn newobj(self, constructor: Token) -> Self {
        self.op_with(OpCode::Newobj, Operand::Method(constructor))
    }

    /// Appends `pop`.
    #[must_use]
    pub fn pop(self) -> Self {
        self.op(OpCode::Pop)
    }

    /// Appends `ret`.
    #[must_use]
    pub fn ret(self) -> Self {
        self.op(OpCode::Ret)
    }

    /// Appends `throw`.
    #[must_use]
    pub fn throw(self) -> Self {
        self.op(OpCode::Throw)
    }

    /// Appends a branch to a label defined before or after this point.
    #[must_use]
    pub fn branch(mut self, opcode: OpCode, label: &str) -> Self {
        self.fixups
            .push((self.instructions.len(), label.to_string()));
        self.instructions
            .push(Instruction::with_operand(opcode, Operand::Target(0)));
        self
    }

    /// Binds a label to the next appended instruction.
    #[must_use]
    pub fn label(mut self, name: &str) -> Self {
        self.labels
            .insert(name.to_string(), self.instructions.len());
        self
    }

    /// Resolves labels and produces the body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a branch names an undefined label or a label
    /// points past the last instruction.
    pub fn build(mut self) -> Result<MethodBody> {
        for (at, label) in &self.fixups {
            let target = *self
                .labels
                .get(label)
                .ok_or_else(|| malformed_error!("Undefined label '{}'", label))?;
            if target >= self.instructions.len() {
                return Err(malformed_error!(
                    "Label '{}' does not precede an instruction",
                    label
                ));
            }
            self.instructions[*at].operand = Operand::Target(target);
        }

        let mut body = MethodBody::new(InstructionList::from(self.instructions));
        if let Some(max_stack) = self.max_stack {
            body.max_stack = max_stack;
        }
        Ok(body)
    }
}
