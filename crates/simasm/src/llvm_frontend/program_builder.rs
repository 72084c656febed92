use inkwell::IntPredicate;
use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicMetadataTypeEnum, IntType};
use inkwell::values::{FunctionValue, IntValue};

use super::blocks::BlockMap;
use super::llvm_err;
use super::storage::MachineState;
use super::verify::verify_function;
use crate::abi::Fault;
use crate::host::HostFn;
use crate::isa::{Instruction, Operand, Program, Reg};
use crate::{CompileOptions, Error, Result};

/// Name of the generated `void ()` entry function.
pub const ENTRY_SYMBOL: &str = "asm_main";

/// Declarations of the host bridge entry points, one per [`HostFn`].
struct HostImports<'ctx> {
    put_pixel: FunctionValue<'ctx>,
    rand: FunctionValue<'ctx>,
    flush: FunctionValue<'ctx>,
    abort: FunctionValue<'ctx>,
}

/// Value written by a guarded stack push.
#[derive(Clone, Copy)]
enum Pushed {
    /// Register contents, read after SP has been decremented.
    Reg(Reg),
    /// Return address of a CALL.
    Addr(usize),
}

pub struct AsmToLlvm<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    i32_type: IntType<'ctx>,
    state: MachineState<'ctx>,
    host: HostImports<'ctx>,
    entry_fn: FunctionValue<'ctx>,
    /// True once the instruction being lowered has emitted its own terminator.
    terminated: bool,
}

impl<'ctx> AsmToLlvm<'ctx> {
    #[must_use]
    pub fn new(context: &'ctx Context, module_name: &str, options: &CompileOptions) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        let state = MachineState::declare(context, &module, options.stack_size);
        let host = Self::declare_host_imports(context, &module);
        let entry_fn =
            module.add_function(ENTRY_SYMBOL, context.void_type().fn_type(&[], false), None);

        Self {
            context,
            module,
            builder,
            i32_type: context.i32_type(),
            state,
            host,
            entry_fn,
            terminated: false,
        }
    }

    fn declare_host_imports(context: &'ctx Context, module: &Module<'ctx>) -> HostImports<'ctx> {
        let i32_type = context.i32_type();
        let void_type = context.void_type();
        let arg: BasicMetadataTypeEnum = i32_type.into();

        let decl = |f: HostFn, sig| module.add_function(f.symbol(), sig, Some(Linkage::External));

        HostImports {
            put_pixel: decl(HostFn::PutPixel, void_type.fn_type(&[arg, arg, arg], false)),
            rand: decl(HostFn::Rand, i32_type.fn_type(&[], false)),
            flush: decl(HostFn::Flush, void_type.fn_type(&[], false)),
            abort: decl(HostFn::Abort, void_type.fn_type(&[arg], false)),
        }
    }

    pub fn translate_program(mut self, program: &Program) -> Result<Module<'ctx>> {
        let blocks = BlockMap::build(self.context, self.entry_fn, program.len());

        self.builder.position_at_end(blocks.entry);
        self.state.emit_reset(self.context, &self.builder)?;
        let first = blocks.address(0).unwrap_or(blocks.exit);
        llvm_err(self.builder.build_unconditional_branch(first))?;

        self.builder.position_at_end(blocks.exit);
        llvm_err(self.builder.build_return(None))?;

        for fault in [
            Fault::StackOverflow,
            Fault::StackUnderflow,
            Fault::BadReturnAddress,
        ] {
            self.emit_abort(blocks.abort(fault), fault)?;
        }

        for (pc, instr) in program.instructions.iter().enumerate() {
            self.builder.position_at_end(blocks.instruction(pc));
            self.terminated = false;
            tracing::trace!(pc, instr = %instr, "lowering");

            self.translate_instruction(program, &blocks, pc, instr)?;

            if !self.terminated {
                if pc + 1 == program.len() {
                    llvm_err(self.builder.build_return(None))?;
                } else {
                    llvm_err(
                        self.builder
                            .build_unconditional_branch(blocks.fallthrough(pc)),
                    )?;
                }
            }
        }

        verify_function(&self.module, self.entry_fn)?;
        tracing::debug!(
            instructions = program.len(),
            blocks = self.entry_fn.count_basic_blocks(),
            "lowered program"
        );
        Ok(self.module)
    }

    fn translate_instruction(
        &mut self,
        program: &Program,
        blocks: &BlockMap<'ctx>,
        pc: usize,
        instr: &Instruction,
    ) -> Result<()> {
        match instr {
            Instruction::Mov { dst, src } => {
                let val = self.operand(*src)?;
                self.store(*dst, val)
            }
            Instruction::Add { dst, lhs, rhs } => {
                let lhs = self.load(*lhs)?;
                let rhs = self.operand(*rhs)?;
                let sum = llvm_err(self.builder.build_int_add(lhs, rhs, "add"))?;
                self.store(*dst, sum)
            }
            Instruction::Sub { dst, lhs, rhs } => {
                let lhs = self.load(*lhs)?;
                let rhs = self.operand(*rhs)?;
                let diff = llvm_err(self.builder.build_int_sub(lhs, rhs, "sub"))?;
                self.store(*dst, diff)
            }
            Instruction::Mod { dst, src, divisor } => {
                // x srem -1 is always 0, and undefined in LLVM for x = i32::MIN.
                let rem = if *divisor == -1 {
                    self.i32_type.const_zero()
                } else {
                    let val = self.load(*src)?;
                    let divisor = self.const_i32(*divisor as u32);
                    llvm_err(self.builder.build_int_signed_rem(val, divisor, "mod"))?
                };
                self.store(*dst, rem)
            }
            Instruction::Cmp { dst, lhs, rhs } => {
                let lhs = self.load(*lhs)?;
                let rhs = self.load(*rhs)?;
                let lt = llvm_err(
                    self.builder
                        .build_int_compare(IntPredicate::SLT, lhs, rhs, "lt"),
                )?;
                let flag = llvm_err(self.builder.build_int_z_extend(lt, self.i32_type, "cmp"))?;
                self.store(*dst, flag)
            }

            // === Stack ===
            Instruction::Push { src } => self.emit_push(blocks, pc, Pushed::Reg(*src)),
            Instruction::Pop { dst } => {
                let (val, next_sp) = self.emit_pop(blocks, pc)?;
                self.store(*dst, val)?;
                self.store(Reg::SP, next_sp)
            }

            // === Control flow ===
            Instruction::Br { target } => {
                let dest = blocks.resolve(program, pc, target)?;
                llvm_err(self.builder.build_unconditional_branch(dest))?;
                self.terminated = true;
                Ok(())
            }
            Instruction::BrIf { cond, target } => {
                let dest = blocks.resolve(program, pc, target)?;
                let val = self.load(*cond)?;
                let taken = llvm_err(self.builder.build_int_compare(
                    IntPredicate::NE,
                    val,
                    self.i32_type.const_zero(),
                    "taken",
                ))?;
                llvm_err(self.builder.build_conditional_branch(
                    taken,
                    dest,
                    blocks.fallthrough(pc),
                ))?;
                self.terminated = true;
                Ok(())
            }
            Instruction::Call { target } => {
                let dest = blocks.resolve(program, pc, target)?;
                if pc + 1 == program.len() {
                    tracing::warn!(
                        line = program.lines[pc],
                        "CALL is the last instruction; RET will end the program"
                    );
                }
                self.emit_push(blocks, pc, Pushed::Addr(pc + 1))?;
                llvm_err(self.builder.build_unconditional_branch(dest))?;
                self.terminated = true;
                Ok(())
            }
            Instruction::Ret => {
                let (addr, next_sp) = self.emit_pop(blocks, pc)?;
                self.store(Reg::SP, next_sp)?;
                let cases: Vec<(IntValue<'ctx>, BasicBlock<'ctx>)> = blocks
                    .return_targets()
                    .map(|(addr, bb)| (self.const_i32(addr as u32), bb))
                    .collect();
                llvm_err(self.builder.build_switch(addr, blocks.bad_return, &cases))?;
                self.terminated = true;
                Ok(())
            }
            Instruction::Exit => {
                llvm_err(self.builder.build_return(None))?;
                self.terminated = true;
                Ok(())
            }

            // === Host calls ===
            Instruction::PutPixel { x, y, color } => {
                let x = self.load(*x)?;
                let y = self.load(*y)?;
                let color = self.load(*color)?;
                llvm_err(self.builder.build_call(
                    self.host.put_pixel,
                    &[x.into(), y.into(), color.into()],
                    "",
                ))?;
                Ok(())
            }
            Instruction::Rand { dst } => {
                let call = llvm_err(self.builder.build_call(self.host.rand, &[], "rand"))?;
                let val = call
                    .try_as_basic_value()
                    .basic()
                    .ok_or_else(|| Error::Internal("sim_rand returned void".into()))?
                    .into_int_value();
                self.store(*dst, val)
            }
            Instruction::Flush => {
                llvm_err(self.builder.build_call(self.host.flush, &[], ""))?;
                Ok(())
            }
        }
    }

    // ── Register helpers ──

    fn const_i32(&self, value: u32) -> IntValue<'ctx> {
        self.i32_type.const_int(u64::from(value), false)
    }

    fn load(&self, reg: Reg) -> Result<IntValue<'ctx>> {
        self.state.load_reg(&self.builder, reg)
    }

    fn store(&self, reg: Reg, value: IntValue<'ctx>) -> Result<()> {
        self.state.store_reg(&self.builder, reg, value)
    }

    fn operand(&self, op: Operand) -> Result<IntValue<'ctx>> {
        match op {
            Operand::Reg(reg) => self.load(reg),
            Operand::Imm(value) => Ok(self.const_i32(value)),
        }
    }

    // ── Guarded stack access ──

    /// Branch to `fault_bb` unless `index <u capacity`, leaving the builder in
    /// a fresh continuation block.
    fn guard_slot(
        &self,
        index: IntValue<'ctx>,
        fault_bb: BasicBlock<'ctx>,
        cont_name: &str,
    ) -> Result<()> {
        let current = self
            .builder
            .get_insert_block()
            .ok_or_else(|| Error::Internal("builder has no insertion block".into()))?;
        let in_bounds = llvm_err(self.builder.build_int_compare(
            IntPredicate::ULT,
            index,
            self.state.capacity(),
            "in_bounds",
        ))?;
        let cont = self.context.insert_basic_block_after(current, cont_name);
        llvm_err(
            self.builder
                .build_conditional_branch(in_bounds, cont, fault_bb),
        )?;
        self.builder.position_at_end(cont);
        Ok(())
    }

    /// `SP <- SP - 1; stack[SP] <- value`, aborting with a stack overflow when
    /// `SP - 1` is not a valid slot.
    fn emit_push(&self, blocks: &BlockMap<'ctx>, pc: usize, value: Pushed) -> Result<()> {
        let sp = self.load(Reg::SP)?;
        let new_sp = llvm_err(
            self.builder
                .build_int_sub(sp, self.i32_type.const_int(1, false), "new_sp"),
        )?;
        self.guard_slot(
            new_sp,
            blocks.abort(Fault::StackOverflow),
            &format!("inst_{pc}_push"),
        )?;
        self.store(Reg::SP, new_sp)?;
        let val = match value {
            Pushed::Reg(reg) => self.load(reg)?,
            Pushed::Addr(addr) => self.const_i32(addr as u32),
        };
        let slot = self.state.stack_slot(&self.builder, new_sp)?;
        llvm_err(self.builder.build_store(slot, val))?;
        Ok(())
    }

    /// Read `stack[SP]` and compute `SP + 1`, aborting with a stack underflow
    /// when SP is not a valid slot. SP itself is left for the caller to store.
    fn emit_pop(
        &self,
        blocks: &BlockMap<'ctx>,
        pc: usize,
    ) -> Result<(IntValue<'ctx>, IntValue<'ctx>)> {
        let sp = self.load(Reg::SP)?;
        self.guard_slot(
            sp,
            blocks.abort(Fault::StackUnderflow),
            &format!("inst_{pc}_pop"),
        )?;
        let slot = self.state.stack_slot(&self.builder, sp)?;
        let val = llvm_err(self.builder.build_load(self.i32_type, slot, "popped"))?.into_int_value();
        let next_sp = llvm_err(
            self.builder
                .build_int_add(sp, self.i32_type.const_int(1, false), "next_sp"),
        )?;
        Ok((val, next_sp))
    }

    fn emit_abort(&self, bb: BasicBlock<'ctx>, fault: Fault) -> Result<()> {
        self.builder.position_at_end(bb);
        let code = self.const_i32(fault.code());
        llvm_err(self.builder.build_call(self.host.abort, &[code.into()], ""))?;
        llvm_err(self.builder.build_return(None))?;
        Ok(())
    }
}
