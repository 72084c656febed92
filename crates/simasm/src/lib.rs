#![allow(
    clippy::cast_possible_truncation, // registers are u32 words, program counters are usize
    clippy::cast_possible_wrap, // register words are reinterpreted as i32 for signed ops
    clippy::cast_sign_loss, // host values come back as i32 and are stored as u32 words
    clippy::too_many_lines, // per-opcode lowering lives in one match
    clippy::missing_errors_doc // every fallible function returns crate::Error
)]

pub mod abi;
pub mod error;
pub mod host;
pub mod interp;
pub mod isa;
pub mod loader;
mod pipeline;

#[cfg(feature = "jit")]
pub mod jit;
#[cfg(feature = "jit")]
pub mod llvm_frontend;

/// Test harness module for writing unit and integration tests.
///
/// This module is only available when running tests or when the
/// `test-harness` feature is enabled.
#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

pub use abi::Fault;
pub use error::{Error, Result};
pub use host::{HostStats, Simulator};
pub use interp::Interpreter;
pub use isa::{Instruction, Program};
pub use pipeline::{CompileOptions, parse_file, parse_source};
