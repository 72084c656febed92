// LLVM IR frontend: lowers parsed assembly programs to LLVM IR via inkwell.

mod blocks;
mod program_builder;
mod storage;
mod verify;

pub use program_builder::{AsmToLlvm, ENTRY_SYMBOL};
pub use verify::{successors, verify_function};

use inkwell::builder::BuilderError;
use inkwell::context::Context;
use inkwell::module::Module;

use crate::isa::Program;
use crate::{CompileOptions, Error, Result};

fn llvm_err<T>(result: std::result::Result<T, BuilderError>) -> Result<T> {
    result.map_err(|e| Error::Internal(format!("LLVM builder error: {e:?}")))
}

/// Lower a parsed program into a verified LLVM IR module.
///
/// The module holds a single `void ()` entry function, the register file
/// and stack globals, and declarations of the host entry points it calls.
pub fn translate_program<'ctx>(
    context: &'ctx Context,
    program: &Program,
    options: &CompileOptions,
) -> Result<Module<'ctx>> {
    options.validate()?;
    let translator = AsmToLlvm::new(context, "top", options);
    translator.translate_program(program)
}
