//! IR statements, as supplied by the disassembler / IR lifter.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use crate::expr::{Expr, Lvalue};
use vsa_types::ProgramCounter;

/// A single IR statement within a basic block.
///
/// The kinds are `move`, `vardecl`, `call`, `return`, `jmp`/`cjmp`, and the
/// no-ops `comment`/`label`/`assert`/`special`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `lhs := rhs`
    Move { lhs: Lvalue, rhs: Expr },
    /// Declares a temporary with an undefined value; reading it before a
    /// `Move` defines it is a flagged condition.
    VarDecl(crate::expr::TempName),
    /// A call to one or more possible targets (unresolved indirect calls
    /// carry an empty target list and are warned about by the interpreter).
    Call { targets: Vec<ProgramCounter>, return_site: Option<ProgramCounter> },
    /// Function return; no lattice action of its own.
    Return(Option<Expr>),
    /// Unconditional jump. CFG edges carry the actual control flow; this
    /// variant exists so the statement list is complete.
    Jmp(ProgramCounter),
    /// Conditional jump on `cond`.
    CJmp { cond: Expr, if_true: ProgramCounter, if_false: ProgramCounter },
    /// Source-level label, purely informational.
    Label(String),
    /// Assembler/lifter comment, purely informational.
    Comment(String),
    /// An assertion the lifter believes holds; not used to refine widening,
    /// since this analysis does not do path-sensitive symbolic execution.
    Assert(Expr),
    /// Lifter-specific extension statement with no defined abstract effect.
    Special(String),
}

impl Stmt {
    /// `true` for the no-op statement kinds.
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            Stmt::Comment(_) | Stmt::Label(_) | Stmt::Assert(_) | Stmt::Special(_)
        )
    }
}

/// One instruction as a PC-tagged, ordered list of statements — the unit the
/// lifter hands the interpreter.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub address: ProgramCounter,
    pub statements: Vec<Stmt>,
}
