//! Reference interpreter.
//!
//! Executes a [`Program`] one instruction at a time over a host-side register
//! file and stack, calling the simulator directly. Register, stack, branch
//! and fault semantics match the compiled code exactly; the JIT tests use it
//! as an oracle and the CLI offers it as an alternative to the JIT.

use crate::abi::{Fault, REGISTER_FILE_SIZE};
use crate::host::{HostStats, Simulator};
use crate::isa::{Instruction, Operand, Program, Reg};
use crate::{CompileOptions, Error, Result};

pub struct Interpreter<'p> {
    program: &'p Program,
    /// Resolved label operand per instruction, `None` for instructions without one.
    targets: Vec<Option<usize>>,
    registers: [u32; REGISTER_FILE_SIZE],
    stack: Vec<u32>,
}

impl<'p> Interpreter<'p> {
    /// Prepare `program` for execution. Undefined labels are reported here,
    /// before anything runs.
    pub fn new(program: &'p Program, options: &CompileOptions) -> Result<Self> {
        options.validate()?;
        let targets = program
            .instructions
            .iter()
            .enumerate()
            .map(|(pc, instr)| {
                instr
                    .target()
                    .map(|label| program.resolve(pc, label))
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            program,
            targets,
            registers: [0; REGISTER_FILE_SIZE],
            stack: vec![0; options.stack_size as usize],
        })
    }

    /// Current value of a register. Useful after [`Interpreter::run`].
    #[must_use]
    pub fn register(&self, reg: Reg) -> u32 {
        self.registers[reg.index()]
    }

    /// Run from the first instruction until EXIT, the end of the program or a
    /// fault. The simulator is initialised before and exited after, fault or not.
    pub fn run(&mut self, simulator: &mut dyn Simulator) -> Result<HostStats> {
        self.registers = [0; REGISTER_FILE_SIZE];
        self.stack.fill(0);
        self.registers[Reg::SP.index()] = self.capacity();

        let mut stats = HostStats::default();
        simulator.init();
        let outcome = self.execute(simulator, &mut stats);
        simulator.exit();

        match outcome {
            Ok(()) => Ok(stats),
            Err(fault) => {
                tracing::debug!(%fault, "program faulted");
                Err(Error::Fault(fault))
            }
        }
    }

    fn execute(
        &mut self,
        simulator: &mut dyn Simulator,
        stats: &mut HostStats,
    ) -> std::result::Result<(), Fault> {
        let program = self.program;
        let mut pc = 0;

        while let Some(instr) = program.instructions.get(pc) {
            let mut next = pc + 1;
            match instr {
                Instruction::Mov { dst, src } => {
                    let val = self.value(*src);
                    self.set(*dst, val);
                }
                Instruction::Add { dst, lhs, rhs } => {
                    let val = self.get(*lhs).wrapping_add(self.value(*rhs));
                    self.set(*dst, val);
                }
                Instruction::Sub { dst, lhs, rhs } => {
                    let val = self.get(*lhs).wrapping_sub(self.value(*rhs));
                    self.set(*dst, val);
                }
                Instruction::Mod { dst, src, divisor } => {
                    let val = if *divisor == -1 {
                        0
                    } else {
                        (self.get(*src) as i32 % divisor) as u32
                    };
                    self.set(*dst, val);
                }
                Instruction::Cmp { dst, lhs, rhs } => {
                    let lt = (self.get(*lhs) as i32) < (self.get(*rhs) as i32);
                    self.set(*dst, u32::from(lt));
                }
                Instruction::Push { src } => {
                    let slot = self.claim_slot()?;
                    let val = self.get(*src);
                    self.stack[slot] = val;
                }
                Instruction::Pop { dst } => {
                    let (val, next_sp) = self.take_slot()?;
                    self.set(*dst, val);
                    self.set(Reg::SP, next_sp);
                }
                Instruction::Br { .. } => next = self.target(pc),
                Instruction::BrIf { cond, .. } => {
                    if self.get(*cond) != 0 {
                        next = self.target(pc);
                    }
                }
                Instruction::Call { .. } => {
                    let slot = self.claim_slot()?;
                    self.stack[slot] = (pc + 1) as u32;
                    next = self.target(pc);
                }
                Instruction::Ret => {
                    let (addr, next_sp) = self.take_slot()?;
                    self.set(Reg::SP, next_sp);
                    let addr = addr as usize;
                    if addr > program.len() {
                        return Err(Fault::BadReturnAddress);
                    }
                    next = addr;
                }
                Instruction::Exit => return Ok(()),
                Instruction::PutPixel { x, y, color } => {
                    stats.pixels += 1;
                    simulator.put_pixel(
                        self.get(*x) as i32,
                        self.get(*y) as i32,
                        self.get(*color) as i32,
                    );
                }
                Instruction::Rand { dst } => {
                    stats.rand_calls += 1;
                    let val = simulator.rand() as u32;
                    self.set(*dst, val);
                }
                Instruction::Flush => {
                    stats.flushes += 1;
                    simulator.flush();
                }
            }
            pc = next;
        }
        Ok(())
    }

    fn capacity(&self) -> u32 {
        self.stack.len() as u32
    }

    fn get(&self, reg: Reg) -> u32 {
        self.registers[reg.index()]
    }

    fn set(&mut self, reg: Reg, value: u32) {
        self.registers[reg.index()] = value;
    }

    fn value(&self, op: Operand) -> u32 {
        match op {
            Operand::Reg(reg) => self.get(reg),
            Operand::Imm(value) => value,
        }
    }

    fn target(&self, pc: usize) -> usize {
        self.targets[pc].unwrap_or(self.program.len())
    }

    /// Decrement SP and return the slot it now addresses.
    fn claim_slot(&mut self) -> std::result::Result<usize, Fault> {
        let new_sp = self.get(Reg::SP).wrapping_sub(1);
        if new_sp >= self.capacity() {
            return Err(Fault::StackOverflow);
        }
        self.set(Reg::SP, new_sp);
        Ok(new_sp as usize)
    }

    /// Read the top of stack and compute the incremented SP, without storing it.
    fn take_slot(&self) -> std::result::Result<(u32, u32), Fault> {
        let sp = self.get(Reg::SP);
        if sp >= self.capacity() {
            return Err(Fault::StackUnderflow);
        }
        Ok((self.stack[sp as usize], sp + 1))
    }
}
