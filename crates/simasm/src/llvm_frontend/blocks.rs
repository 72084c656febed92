// Control-flow skeleton: one basic block per instruction plus the synthetic
// exit and abort blocks. Created up front so forward branches, calls and the
// RET dispatch table can reference any block before it is lowered.

use inkwell::basic_block::BasicBlock;
use inkwell::context::Context;
use inkwell::values::FunctionValue;

use crate::Result;
use crate::abi::Fault;
use crate::isa::Program;

pub struct BlockMap<'ctx> {
    pub entry: BasicBlock<'ctx>,
    instructions: Vec<BasicBlock<'ctx>>,
    /// Returns from the entry function. Target of labels past the end.
    pub exit: BasicBlock<'ctx>,
    pub stack_overflow: BasicBlock<'ctx>,
    pub stack_underflow: BasicBlock<'ctx>,
    pub bad_return: BasicBlock<'ctx>,
}

impl<'ctx> BlockMap<'ctx> {
    pub fn build(context: &'ctx Context, function: FunctionValue<'ctx>, len: usize) -> Self {
        let entry = context.append_basic_block(function, "entry");
        let instructions = (0..len)
            .map(|pc| context.append_basic_block(function, &format!("inst_{pc}")))
            .collect();
        Self {
            entry,
            instructions,
            exit: context.append_basic_block(function, "exit"),
            stack_overflow: context.append_basic_block(function, "stack_overflow"),
            stack_underflow: context.append_basic_block(function, "stack_underflow"),
            bad_return: context.append_basic_block(function, "bad_return"),
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn instruction(&self, pc: usize) -> BasicBlock<'ctx> {
        self.instructions[pc]
    }

    /// Block for an instruction address, where `len()` means "past the end".
    pub fn address(&self, addr: usize) -> Option<BasicBlock<'ctx>> {
        if addr == self.len() {
            Some(self.exit)
        } else {
            self.instructions.get(addr).copied()
        }
    }

    /// Where control goes when instruction `pc` does not redirect it.
    pub fn fallthrough(&self, pc: usize) -> BasicBlock<'ctx> {
        self.instructions.get(pc + 1).copied().unwrap_or(self.exit)
    }

    /// Resolve a label operand of the instruction at `pc`.
    pub fn resolve(&self, program: &Program, pc: usize, label: &str) -> Result<BasicBlock<'ctx>> {
        let addr = program.resolve(pc, label)?;
        Ok(self.address(addr).unwrap_or(self.exit))
    }

    pub fn abort(&self, fault: Fault) -> BasicBlock<'ctx> {
        match fault {
            Fault::StackOverflow => self.stack_overflow,
            Fault::StackUnderflow => self.stack_underflow,
            Fault::BadReturnAddress => self.bad_return,
        }
    }

    /// Every instruction block paired with its address, followed by the
    /// past-the-end address mapped to `exit`.
    pub fn return_targets(&self) -> impl Iterator<Item = (usize, BasicBlock<'ctx>)> + '_ {
        self.instructions
            .iter()
            .copied()
            .enumerate()
            .chain(std::iter::once((self.len(), self.exit)))
    }
}
