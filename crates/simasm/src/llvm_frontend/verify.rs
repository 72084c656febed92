// Structural well-formedness of the lowered entry function, checked before
// handing the module to LLVM's own verifier.

use inkwell::basic_block::BasicBlock;
use inkwell::module::Module;
use inkwell::values::{FunctionValue, InstructionOpcode, InstructionValue, Operand};

use crate::{Error, Result};

fn is_terminator(opcode: InstructionOpcode) -> bool {
    matches!(
        opcode,
        InstructionOpcode::Br
            | InstructionOpcode::Switch
            | InstructionOpcode::Return
            | InstructionOpcode::Unreachable
            | InstructionOpcode::IndirectBr
    )
}

/// Blocks a terminator may transfer control to.
///
/// Branch and switch operands that are blocks are exactly the successors,
/// whatever their position in the operand list.
pub fn successors(term: InstructionValue<'_>) -> Vec<BasicBlock<'_>> {
    (0..term.get_num_operands())
        .filter_map(|i| term.get_operand(i))
        .filter_map(Operand::block)
        .collect()
}

fn block_name(bb: BasicBlock<'_>) -> String {
    bb.get_name().to_string_lossy().into_owned()
}

/// Check that every block of `function` ends in exactly one terminator and
/// only branches to blocks of `function`, then run the LLVM verifier.
pub fn verify_function<'ctx>(module: &Module<'ctx>, function: FunctionValue<'ctx>) -> Result<()> {
    for bb in function.get_basic_blocks() {
        let name = block_name(bb);

        let mut terminators = 0usize;
        let mut instr = bb.get_first_instruction();
        while let Some(i) = instr {
            if is_terminator(i.get_opcode()) {
                terminators += 1;
            }
            instr = i.get_next_instruction();
        }
        let Some(term) = bb.get_terminator() else {
            return Err(Error::Verification(format!(
                "block `{name}` has no terminator"
            )));
        };
        if terminators != 1 {
            return Err(Error::Verification(format!(
                "block `{name}` has {terminators} terminators"
            )));
        }

        for succ in successors(term) {
            if succ.get_parent() != Some(function) {
                return Err(Error::Verification(format!(
                    "block `{name}` branches to `{}` outside the entry function",
                    block_name(succ)
                )));
            }
        }
    }

    module
        .verify()
        .map_err(|e| Error::Verification(e.to_string()))
}
