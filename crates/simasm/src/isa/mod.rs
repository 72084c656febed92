mod instruction;
mod opcode;

pub use instruction::{Instruction, Operand, Program, Reg, parse_listing};
pub use opcode::{HostCall, Opcode};
