use std::collections::HashMap;
use std::fmt;

use super::{HostCall, Opcode};
use crate::abi::{FP_INDEX, GENERAL_REGISTERS, SP_INDEX};
use crate::loader::Listing;
use crate::{Error, Result};

/// Register file slot. Always a valid index: construction goes through
/// [`Reg::general`] or the parser, both of which range-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(u8);

impl Reg {
    pub const FP: Self = Self(FP_INDEX as u8);
    pub const SP: Self = Self(SP_INDEX as u8);

    #[must_use]
    pub fn general(index: usize) -> Option<Self> {
        (index < GENERAL_REGISTERS).then_some(Self(index as u8))
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    fn parse(token: &str) -> Option<Self> {
        match token {
            "FP" => Some(Self::FP),
            "SP" => Some(Self::SP),
            _ => {
                let digits = token.strip_prefix('R')?;
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                Self::general(digits.parse().ok()?)
            }
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::FP => f.write_str("FP"),
            Self::SP => f.write_str("SP"),
            Self(idx) => write!(f, "R{idx}"),
        }
    }
}

/// Source operand: a register or a 32-bit immediate (stored as its bit pattern).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(u32),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reg(reg) => reg.fmt(f),
            Self::Imm(value) => write!(f, "{}", *value as i32),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Mov {
        dst: Reg,
        src: Operand,
    },
    Add {
        dst: Reg,
        lhs: Reg,
        rhs: Operand,
    },
    Sub {
        dst: Reg,
        lhs: Reg,
        rhs: Operand,
    },
    /// Signed remainder by a non-zero immediate.
    Mod {
        dst: Reg,
        src: Reg,
        divisor: i32,
    },
    /// `dst = 0` when `lhs >= rhs` (signed), `1` otherwise.
    Cmp {
        dst: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    Push {
        src: Reg,
    },
    Pop {
        dst: Reg,
    },
    Br {
        target: String,
    },
    BrIf {
        cond: Reg,
        target: String,
    },
    /// Call to a label in the program; pushes the return address.
    Call {
        target: String,
    },
    PutPixel {
        x: Reg,
        y: Reg,
        color: Reg,
    },
    Rand {
        dst: Reg,
    },
    Flush,
    Ret,
    Exit,
}

impl Instruction {
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Mov { .. } => Opcode::Mov,
            Self::Add { .. } => Opcode::Add,
            Self::Sub { .. } => Opcode::Sub,
            Self::Mod { .. } => Opcode::Mod,
            Self::Cmp { .. } => Opcode::Cmp,
            Self::Push { .. } => Opcode::Push,
            Self::Pop { .. } => Opcode::Pop,
            Self::Br { .. } => Opcode::Br,
            Self::BrIf { .. } => Opcode::BrIf,
            Self::Call { .. }
            | Self::PutPixel { .. }
            | Self::Rand { .. }
            | Self::Flush => Opcode::Call,
            Self::Ret => Opcode::Ret,
            Self::Exit => Opcode::Exit,
        }
    }

    /// Label this instruction transfers control to, if any.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Br { target } | Self::BrIf { target, .. } | Self::Call { target } => {
                Some(target)
            }
            _ => None,
        }
    }

    /// Parse one cleaned instruction line (tokens separated by single spaces).
    pub fn parse(text: &str, line: usize) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let Some(mnemonic) = tokens.next() else {
            return Err(Error::Internal(format!("line {line}: empty instruction")));
        };
        let operands: Vec<&str> = tokens.collect();
        let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| Error::UnknownOpcode {
            line,
            opcode: mnemonic.to_string(),
        })?;
        let p = OperandParser {
            line,
            mnemonic,
            operands: &operands,
        };

        let instr = match opcode {
            Opcode::Mov => {
                p.expect(2)?;
                Self::Mov {
                    dst: p.reg(0)?,
                    src: p.operand(1)?,
                }
            }
            Opcode::Add => {
                p.expect(3)?;
                Self::Add {
                    dst: p.reg(0)?,
                    lhs: p.reg(1)?,
                    rhs: p.operand(2)?,
                }
            }
            Opcode::Sub => {
                p.expect(3)?;
                Self::Sub {
                    dst: p.reg(0)?,
                    lhs: p.reg(1)?,
                    rhs: p.operand(2)?,
                }
            }
            Opcode::Mod => {
                p.expect(3)?;
                let divisor = p.imm(2)? as i32;
                if divisor == 0 {
                    return Err(p.bad(2, "division by zero"));
                }
                Self::Mod {
                    dst: p.reg(0)?,
                    src: p.reg(1)?,
                    divisor,
                }
            }
            Opcode::Cmp => {
                p.expect(3)?;
                Self::Cmp {
                    dst: p.reg(0)?,
                    lhs: p.reg(1)?,
                    rhs: p.reg(2)?,
                }
            }
            Opcode::Push => {
                p.expect(1)?;
                Self::Push { src: p.reg(0)? }
            }
            Opcode::Pop => {
                p.expect(1)?;
                Self::Pop { dst: p.reg(0)? }
            }
            Opcode::Br => {
                p.expect(1)?;
                Self::Br {
                    target: operands[0].to_string(),
                }
            }
            Opcode::BrIf => {
                p.expect(2)?;
                Self::BrIf {
                    cond: p.reg(0)?,
                    target: operands[1].to_string(),
                }
            }
            Opcode::Call => {
                let Some(&name) = operands.first() else {
                    return Err(p.count_error(1));
                };
                match HostCall::from_name(name) {
                    Some(call) => {
                        p.expect(call.arity() + 1)?;
                        match call {
                            HostCall::PutPixel => Self::PutPixel {
                                x: p.reg(1)?,
                                y: p.reg(2)?,
                                color: p.reg(3)?,
                            },
                            HostCall::Rand => Self::Rand { dst: p.reg(1)? },
                            HostCall::Flush => Self::Flush,
                        }
                    }
                    None => {
                        p.expect(1)?;
                        Self::Call {
                            target: name.to_string(),
                        }
                    }
                }
            }
            Opcode::Ret => {
                p.expect(0)?;
                Self::Ret
            }
            Opcode::Exit => {
                p.expect(0)?;
                Self::Exit
            }
        };
        Ok(instr)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mov { dst, src } => write!(f, "MOV {dst} {src}"),
            Self::Add { dst, lhs, rhs } => write!(f, "ADD {dst} {lhs} {rhs}"),
            Self::Sub { dst, lhs, rhs } => write!(f, "SUB {dst} {lhs} {rhs}"),
            Self::Mod { dst, src, divisor } => write!(f, "MOD {dst} {src} {divisor}"),
            Self::Cmp { dst, lhs, rhs } => write!(f, "CMP {dst} {lhs} {rhs}"),
            Self::Push { src } => write!(f, "PUSH {src}"),
            Self::Pop { dst } => write!(f, "POP {dst}"),
            Self::Br { target } => write!(f, "BR {target}"),
            Self::BrIf { cond, target } => write!(f, "BR_IF {cond} {target}"),
            Self::Call { target } => write!(f, "CALL {target}"),
            Self::PutPixel { x, y, color } => write!(f, "CALL SIM_PUT_PIXEL {x} {y} {color}"),
            Self::Rand { dst } => write!(f, "CALL SIM_RAND {dst}"),
            Self::Flush => write!(f, "CALL SIM_FLUSH"),
            Self::Ret => write!(f, "RET"),
            Self::Exit => write!(f, "EXIT"),
        }
    }
}

struct OperandParser<'a> {
    line: usize,
    mnemonic: &'a str,
    operands: &'a [&'a str],
}

impl OperandParser<'_> {
    fn expect(&self, expected: usize) -> Result<()> {
        if self.operands.len() == expected {
            Ok(())
        } else {
            Err(self.count_error(expected))
        }
    }

    fn count_error(&self, expected: usize) -> Error {
        Error::OperandCount {
            line: self.line,
            opcode: self.mnemonic.to_string(),
            expected,
            found: self.operands.len(),
        }
    }

    fn bad(&self, idx: usize, reason: &'static str) -> Error {
        Error::BadOperand {
            line: self.line,
            operand: self.operands[idx].to_string(),
            reason,
        }
    }

    fn reg(&self, idx: usize) -> Result<Reg> {
        Reg::parse(self.operands[idx]).ok_or_else(|| self.bad(idx, "expected a register"))
    }

    fn imm(&self, idx: usize) -> Result<u32> {
        let token = self.operands[idx];
        if token.starts_with('R') || token == "FP" || token == "SP" {
            return Err(self.bad(idx, "expected an immediate"));
        }
        parse_immediate(token).ok_or_else(|| self.bad(idx, "not a 32-bit decimal integer"))
    }

    fn operand(&self, idx: usize) -> Result<Operand> {
        let token = self.operands[idx];
        if token.starts_with('R') || token == "FP" || token == "SP" {
            self.reg(idx).map(Operand::Reg)
        } else {
            self.imm(idx).map(Operand::Imm)
        }
    }
}

fn parse_immediate(token: &str) -> Option<u32> {
    let value: i64 = token.parse().ok()?;
    if (i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&value) {
        Some(value as u32)
    } else {
        None
    }
}

/// A parsed program: instructions in program order plus the label table.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    /// Source line of each instruction, for diagnostics.
    pub lines: Vec<usize>,
    pub labels: HashMap<String, usize>,
}

impl Program {
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Resolve the label used by the instruction at `pc`.
    ///
    /// Returns an instruction index, or `self.len()` for a label that falls
    /// off the end of the program.
    pub fn resolve(&self, pc: usize, label: &str) -> Result<usize> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| Error::UndefinedLabel {
                line: self.lines.get(pc).copied().unwrap_or(0),
                label: label.to_string(),
            })
    }
}

pub fn parse_listing(listing: &Listing) -> Result<Program> {
    let mut program = Program {
        instructions: Vec::with_capacity(listing.len()),
        lines: Vec::with_capacity(listing.len()),
        labels: listing.labels.clone(),
    };
    for line in &listing.lines {
        program
            .instructions
            .push(Instruction::parse(&line.text, line.number)?);
        program.lines.push(line.number);
    }
    for (label, &idx) in &program.labels {
        if idx == program.len() {
            tracing::debug!(label = %label, "label resolves past the last instruction");
        }
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_source;

    fn parse(text: &str) -> Result<Instruction> {
        Instruction::parse(text, 1)
    }

    fn r(idx: usize) -> Reg {
        Reg::general(idx).unwrap()
    }

    #[test]
    fn test_register_names() {
        assert_eq!(Reg::parse("R0"), Some(r(0)));
        assert_eq!(Reg::parse("R15"), Some(r(15)));
        assert_eq!(Reg::parse("FP"), Some(Reg::FP));
        assert_eq!(Reg::parse("SP"), Some(Reg::SP));
        assert_eq!(Reg::parse("R16"), None);
        assert_eq!(Reg::parse("R"), None);
        assert_eq!(Reg::parse("R-1"), None);
        assert_eq!(Reg::parse("r1"), None);
    }

    #[test]
    fn test_mov_register_and_immediate() {
        assert_eq!(
            parse("MOV R1 FP").unwrap(),
            Instruction::Mov {
                dst: r(1),
                src: Operand::Reg(Reg::FP)
            }
        );
        assert_eq!(
            parse("MOV SP -7").unwrap(),
            Instruction::Mov {
                dst: Reg::SP,
                src: Operand::Imm((-7i32) as u32)
            }
        );
    }

    #[test]
    fn test_immediate_range() {
        assert!(parse("MOV R0 4294967295").is_ok());
        assert!(parse("MOV R0 -2147483648").is_ok());
        assert!(matches!(
            parse("MOV R0 4294967296"),
            Err(Error::BadOperand { .. })
        ));
        assert!(matches!(parse("MOV R0 0x10"), Err(Error::BadOperand { .. })));
    }

    #[test]
    fn test_out_of_range_register_is_parse_error() {
        let err = parse("ADD R16 R0 R1").unwrap_err();
        assert!(matches!(err, Error::BadOperand { ref operand, .. } if operand == "R16"));
    }

    #[test]
    fn test_mod_requires_nonzero_immediate() {
        assert!(matches!(parse("MOD R0 R1 0"), Err(Error::BadOperand { .. })));
        assert!(matches!(parse("MOD R0 R1 R2"), Err(Error::BadOperand { .. })));
        assert_eq!(
            parse("MOD R0 R1 -3").unwrap(),
            Instruction::Mod {
                dst: r(0),
                src: r(1),
                divisor: -3
            }
        );
    }

    #[test]
    fn test_host_calls() {
        assert_eq!(
            parse("CALL SIM_PUT_PIXEL R1 R2 R3").unwrap(),
            Instruction::PutPixel {
                x: r(1),
                y: r(2),
                color: r(3)
            }
        );
        assert_eq!(
            parse("CALL SIM_RAND R4").unwrap(),
            Instruction::Rand { dst: r(4) }
        );
        assert_eq!(parse("CALL SIM_FLUSH").unwrap(), Instruction::Flush);
        assert!(matches!(
            parse("CALL SIM_PUT_PIXEL R1 R2"),
            Err(Error::OperandCount {
                expected: 4,
                found: 3,
                ..
            })
        ));
        assert_eq!(
            parse("CALL draw").unwrap(),
            Instruction::Call {
                target: "draw".into()
            }
        );
    }

    #[test]
    fn test_unknown_opcode() {
        let err = Instruction::parse("JMP loop", 7).unwrap_err();
        assert!(matches!(err, Error::UnknownOpcode { line: 7, ref opcode } if opcode == "JMP"));
    }

    #[test]
    fn test_operand_count() {
        assert!(matches!(parse("RET R0"), Err(Error::OperandCount { .. })));
        assert!(matches!(parse("CALL"), Err(Error::OperandCount { .. })));
        assert!(matches!(parse("PUSH"), Err(Error::OperandCount { .. })));
    }

    #[test]
    fn test_display_matches_source_form() {
        for text in [
            "MOV R0 -5",
            "ADD R1 R0 R2",
            "SUB R2 R0 1",
            "MOD R3 R3 7",
            "CMP R4 R1 R2",
            "PUSH FP",
            "POP SP",
            "BR_IF R1 loop",
            "CALL SIM_PUT_PIXEL R0 R1 R2",
            "CALL SIM_RAND R5",
            "CALL SIM_FLUSH",
            "RET",
        ] {
            assert_eq!(parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_resolve_reports_source_line() {
        let listing = load_source("MOV R0 1\n\nBR nowhere\n").unwrap();
        let program = parse_listing(&listing).unwrap();
        let err = program.resolve(1, "nowhere").unwrap_err();
        assert!(matches!(err, Error::UndefinedLabel { line: 3, .. }), "{err}");
    }
}
