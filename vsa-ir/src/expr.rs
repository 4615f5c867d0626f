//! IR expressions, as supplied by the disassembler / IR lifter.
//!
//! The lifter is out of scope for this repository; this module only fixes
//! the shape of the expression tree the abstract interpreter evaluates.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vsa_types::{ByteWidth, RegionId, Word};

/// A temporary name, i.e. an analysis-only SSA-ish identifier produced by the
/// lifter that is not a machine register. Condition-code pseudo-temporaries
/// (produced by Vine-style lifters) are allowed to be read before they are
/// defined; the interpreter evaluates such reads to TOP rather than erroring.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempName(pub String);

/// Binary operators evaluated by the interpreter onto the value-set domain.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Plus,
    Minus,
    Times,
    BitAnd,
    BitOr,
    Xor,
    LShift,
    RShift,
    ArShift,
    LRotate,
    RRotate,
    SDivide,
    UDivide,
    SMod,
    UMod,
    Eq,
    Neq,
    Lt,
    Le,
}

/// Unary operators. The lifter only ever emits bitwise NOT.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Not,
}

/// Widening/narrowing cast kinds.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    /// Keep the high `to` bits of a wider value.
    High,
    /// Keep the low `to` bits of a wider value (mask).
    Low,
    /// Narrow, discarding the sign.
    Unsigned,
    /// Narrow, preserving the sign.
    Signed,
    /// Widen without changing the represented value.
    Unchanged,
}

/// An IR expression tree, as produced by the lifter.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A literal constant. The lifter attaches the byte width the constant
    /// was materialized at, which becomes the stride of its singleton VS.
    Constant { value: Word, width: ByteWidth },
    /// Reference to an analysis temporary or a named machine register.
    Temp(TempName),
    /// `lhs op rhs`
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    /// `op operand`
    UnOp(UnOp, Box<Expr>),
    /// A memory read at the evaluated address, `width` bytes wide.
    Mem { address: Box<Expr>, width: ByteWidth },
    /// Cast `operand` (currently `from` bits wide) to `to` bits.
    Cast { kind: CastKind, from_bits: u32, to_bits: u32, operand: Box<Expr> },
}

impl Expr {
    /// Convenience constructor for a constant whose region is always the
    /// unique global region of the enclosing state.
    pub fn constant(value: Word, width: ByteWidth) -> Self {
        Expr::Constant { value, width }
    }

    /// `true`/`1` singleton constant, used for condition synthesis in tests.
    pub fn boolean(value: bool) -> Self {
        Expr::constant(value as Word, ByteWidth::Byte)
    }

    /// Region this expression, if a bare temp naming a register, would be
    /// read from. Exposed so `vsa-core` doesn't need to special-case
    /// `Temp` vs. other expression shapes when deciding lvalue kind.
    pub fn as_temp(&self) -> Option<&TempName> {
        match self {
            Expr::Temp(name) => Some(name),
            _ => None,
        }
    }
}

/// An lvalue an IR `move` statement can write through.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lvalue {
    /// A machine register, named as the lifter names it (e.g. `"EAX"`).
    Register(String),
    /// An analysis-only temporary.
    Temp(TempName),
    /// A memory location at the evaluated address.
    Mem { address: Expr, width: ByteWidth },
}

/// Marker for which region a raw region id refers to, used only by tests
/// and by the CLI's CFG dump — the interpreter always resolves this from
/// the live `State`, never from this crate.
pub type RegionTag = RegionId;
