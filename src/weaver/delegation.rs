//! Constructor delegation analysis.
//!
//! A constructor that chains to another constructor of its own type (`this(...)` in C#
//! terms) must not register: the constructor it delegates to already does, and registering
//! twice would hand out two numbers for one object. Chaining to a base type constructor
//! is ordinary initialization and does not count.

use crate::model::{CodeModel, MethodDef, OpCode, Token};

/// Returns `true` if `constructor` calls a constructor declared on `owner`.
///
/// Only `call` instructions are considered; `newobj` of the same type creates a different
/// object and does not delegate.
#[must_use]
pub fn delegates_to_sibling(model: &CodeModel, owner: Token, constructor: &MethodDef) -> bool {
    let Some(body) = &constructor.body else {
        return false;
    };

    body.instructions.iter().any(|instruction| {
        instruction.opcode == OpCode::Call
            && instruction.operand.method().is_some_and(|callee| {
                model.is_constructor(callee) && model.method_owner(callee) == Some(owner)
            })
    })
}
