use std::path::PathBuf;

use crate::abi::Fault;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("can't open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: unknown opcode `{opcode}`")]
    UnknownOpcode { line: usize, opcode: String },

    #[error("line {line}: bad operand `{operand}`: {reason}")]
    BadOperand {
        line: usize,
        operand: String,
        reason: &'static str,
    },

    #[error("line {line}: `{opcode}` expects {expected} operand(s), found {found}")]
    OperandCount {
        line: usize,
        opcode: String,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: label `{label}` is already defined")]
    DuplicateLabel { line: usize, label: String },

    #[error("line {line}: undefined label `{label}`")]
    UndefinedLabel { line: usize, label: String },

    #[error("stack size {0} is out of range (1..=2147483647 words)")]
    BadStackSize(u32),

    #[error("module verification failed: {0}")]
    Verification(String),

    #[error("unresolved external symbol `{0}`")]
    UnresolvedSymbol(String),

    #[error("JIT error: {0}")]
    Jit(String),

    #[error("program aborted: {0}")]
    Fault(Fault),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
