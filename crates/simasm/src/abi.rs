//! Machine model constants (register file, stack, display, fault codes).
//!
//! Shared by the loader, the LLVM lowering, the interpreter and the host
//! bridge so every execution strategy agrees on the same layout.

use std::fmt;

// ── Register File ──

/// Number of general purpose registers (`R0`..`R15`).
pub const GENERAL_REGISTERS: usize = 16;

/// Register file index of the frame pointer (`FP`).
pub const FP_INDEX: usize = GENERAL_REGISTERS;

/// Register file index of the stack pointer (`SP`).
/// Holds the index of the current top of stack; the stack grows downwards
/// from `stack_size` (empty) towards 0.
pub const SP_INDEX: usize = GENERAL_REGISTERS + 1;

/// Total register file slots, general registers plus FP and SP.
pub const REGISTER_FILE_SIZE: usize = GENERAL_REGISTERS + 2;

// ── Stack ──

/// Default stack capacity in 32-bit words.
pub const DEFAULT_STACK_SIZE: u32 = 1024;

// ── Display ──

/// Width of the simulated display in pixels.
pub const DISPLAY_WIDTH: i32 = 800;

/// Height of the simulated display in pixels.
pub const DISPLAY_HEIGHT: i32 = 600;

// ── Faults ──

/// Reason passed to the host abort entry point.
///
/// The numeric value is what generated code hands to `sim_abort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Fault {
    /// PUSH or CALL with no free stack slot left.
    StackOverflow = 1,
    /// POP or RET with an empty stack.
    StackUnderflow = 2,
    /// RET popped a value that is not the address of any instruction.
    BadReturnAddress = 3,
}

impl Fault {
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::StackOverflow),
            2 => Some(Self::StackUnderflow),
            3 => Some(Self::BadReturnAddress),
            _ => None,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackOverflow => write!(f, "stack overflow"),
            Self::StackUnderflow => write!(f, "stack underflow"),
            Self::BadReturnAddress => write!(f, "return to unknown address"),
        }
    }
}
