// Register file and stack as state owned by the generated module.
//
// Both live in internal globals; the host never holds a copy. Register
// accesses use constant indices (a `Reg` is always in range), stack accesses
// use a dynamic index that the caller has already bounds-checked.

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{ArrayType, IntType};
use inkwell::values::{GlobalValue, IntValue, PointerValue};

use super::llvm_err;
use crate::Result;
use crate::abi::REGISTER_FILE_SIZE;
use crate::isa::Reg;

pub struct MachineState<'ctx> {
    i32_type: IntType<'ctx>,
    registers_type: ArrayType<'ctx>,
    registers: GlobalValue<'ctx>,
    stack_type: ArrayType<'ctx>,
    stack: GlobalValue<'ctx>,
    stack_size: u32,
}

impl<'ctx> MachineState<'ctx> {
    pub fn declare(context: &'ctx Context, module: &Module<'ctx>, stack_size: u32) -> Self {
        let i32_type = context.i32_type();

        let registers_type = i32_type.array_type(REGISTER_FILE_SIZE as u32);
        let registers = module.add_global(registers_type, None, "reg_file");
        registers.set_initializer(&registers_type.const_zero());
        registers.set_linkage(Linkage::Internal);

        let stack_type = i32_type.array_type(stack_size);
        let stack = module.add_global(stack_type, None, "stack");
        stack.set_initializer(&stack_type.const_zero());
        stack.set_linkage(Linkage::Internal);

        Self {
            i32_type,
            registers_type,
            registers,
            stack_type,
            stack,
            stack_size,
        }
    }

    /// Stack capacity as an `i32` constant, the initial SP value.
    pub fn capacity(&self) -> IntValue<'ctx> {
        self.i32_type.const_int(u64::from(self.stack_size), false)
    }

    /// Zero both arrays and set SP to the stack capacity.
    ///
    /// Emitted in the entry block so a compiled program can be run more than
    /// once and always starts from the same state.
    pub fn emit_reset(&self, context: &'ctx Context, builder: &Builder<'ctx>) -> Result<()> {
        let zero_byte = context.i8_type().const_zero();
        let i64_type = context.i64_type();
        for (global, words) in [
            (self.registers, REGISTER_FILE_SIZE as u64),
            (self.stack, u64::from(self.stack_size)),
        ] {
            llvm_err(builder.build_memset(
                global.as_pointer_value(),
                4,
                zero_byte,
                i64_type.const_int(words * 4, false),
            ))?;
        }
        self.store_reg(builder, Reg::SP, self.capacity())?;
        self.store_reg(builder, Reg::FP, self.i32_type.const_zero())
    }

    #[allow(unsafe_code)]
    fn reg_ptr(&self, builder: &Builder<'ctx>, reg: Reg) -> Result<PointerValue<'ctx>> {
        let indices = [
            self.i32_type.const_zero(),
            self.i32_type.const_int(reg.index() as u64, false),
        ];
        // SAFETY: `Reg` indices are < REGISTER_FILE_SIZE by construction.
        llvm_err(unsafe {
            builder.build_in_bounds_gep(
                self.registers_type,
                self.registers.as_pointer_value(),
                &indices,
                &format!("{reg}_ptr"),
            )
        })
    }

    pub fn load_reg(&self, builder: &Builder<'ctx>, reg: Reg) -> Result<IntValue<'ctx>> {
        let ptr = self.reg_ptr(builder, reg)?;
        let val = llvm_err(builder.build_load(self.i32_type, ptr, &reg.to_string()))?;
        Ok(val.into_int_value())
    }

    pub fn store_reg(
        &self,
        builder: &Builder<'ctx>,
        reg: Reg,
        value: IntValue<'ctx>,
    ) -> Result<()> {
        let ptr = self.reg_ptr(builder, reg)?;
        llvm_err(builder.build_store(ptr, value))?;
        Ok(())
    }

    /// Pointer to `stack[index]`. Only call after `index < capacity` has been
    /// established on the current path.
    #[allow(unsafe_code)]
    pub fn stack_slot(
        &self,
        builder: &Builder<'ctx>,
        index: IntValue<'ctx>,
    ) -> Result<PointerValue<'ctx>> {
        let indices = [self.i32_type.const_zero(), index];
        // SAFETY: every caller branches to an abort block unless
        // `index <u stack_size`, so the access is in bounds.
        llvm_err(unsafe {
            builder.build_in_bounds_gep(
                self.stack_type,
                self.stack.as_pointer_value(),
                &indices,
                "stack_slot",
            )
        })
    }
}
