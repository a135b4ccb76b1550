use std::fmt;

use serde::{Deserialize, Serialize};

/// A metadata-style token addressing one entity of a [`crate::CodeModel`].
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table the entity lives in
/// - The low 24 bits (bits 0-23) indicate the 1-based row within that table
///
/// Row numbers follow declaration order, so a token stays valid as long as no entity
/// is removed from its table. The weaver only ever appends references, which keeps
/// every token handed out before a pass stable across it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub u32);

/// Table identifiers used in the high byte of a [`Token`].
#[allow(missing_docs)]
pub mod table {
    pub const TYPE_REF: u8 = 0x01;
    pub const TYPE_DEF: u8 = 0x02;
    pub const FIELD: u8 = 0x04;
    pub const METHOD_DEF: u8 = 0x06;
    pub const MEMBER_REF: u8 = 0x0A;
    pub const ASSEMBLY_REF: u8 = 0x23;
}

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a 1-based row
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// Creates a token for the type definition at the 0-based `index`
    #[must_use]
    pub fn type_def(index: usize) -> Self {
        Self::from_index(table::TYPE_DEF, index)
    }

    /// Creates a token for the type reference at the 0-based `index`
    #[must_use]
    pub fn type_ref(index: usize) -> Self {
        Self::from_index(table::TYPE_REF, index)
    }

    /// Creates a token for the member reference at the 0-based `index`
    #[must_use]
    pub fn member_ref(index: usize) -> Self {
        Self::from_index(table::MEMBER_REF, index)
    }

    /// Creates a token for the assembly reference at the 0-based `index`
    #[must_use]
    pub fn assembly_ref(index: usize) -> Self {
        Self::from_index(table::ASSEMBLY_REF, index)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_index(table: u8, index: usize) -> Self {
        Self::from_parts(table, index as u32 + 1)
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns the 0-based table index of this token, `None` for a null row
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.row().checked_sub(1).map(|row| row as usize)
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if this token points into the `TypeDef` table
    #[must_use]
    pub fn is_type_def(&self) -> bool {
        self.table() == table::TYPE_DEF
    }

    /// Returns true if this token points into the `TypeRef` table
    #[must_use]
    pub fn is_type_ref(&self) -> bool {
        self.table() == table::TYPE_REF
    }

    /// Returns true if this token points into the `MethodDef` table
    #[must_use]
    pub fn is_method_def(&self) -> bool {
        self.table() == table::METHOD_DEF
    }

    /// Returns true if this token points into the `MemberRef` table
    #[must_use]
    pub fn is_member_ref(&self) -> bool {
        self.table() == table::MEMBER_REF
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
