use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Mov,
    Add,
    Sub,
    Mod,
    Cmp,
    Push,
    Pop,
    Br,
    BrIf,
    Call,
    Ret,
    Exit,
}

impl Opcode {
    pub const ALL: [Self; 12] = [
        Self::Mov,
        Self::Add,
        Self::Sub,
        Self::Mod,
        Self::Cmp,
        Self::Push,
        Self::Pop,
        Self::Br,
        Self::BrIf,
        Self::Call,
        Self::Ret,
        Self::Exit,
    ];

    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Mov => "MOV",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mod => "MOD",
            Self::Cmp => "CMP",
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::Br => "BR",
            Self::BrIf => "BR_IF",
            Self::Call => "CALL",
            Self::Ret => "RET",
            Self::Exit => "EXIT",
        }
    }

    /// Look up an opcode by its mnemonic. Mnemonics are case sensitive.
    #[must_use]
    pub fn from_mnemonic(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == text)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Simulator primitive reachable through `CALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCall {
    PutPixel,
    Rand,
    Flush,
}

impl HostCall {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PutPixel => "SIM_PUT_PIXEL",
            Self::Rand => "SIM_RAND",
            Self::Flush => "SIM_FLUSH",
        }
    }

    #[must_use]
    pub fn from_name(text: &str) -> Option<Self> {
        [Self::PutPixel, Self::Rand, Self::Flush]
            .into_iter()
            .find(|call| call.name() == text)
    }

    /// Number of register operands following the primitive's name.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::PutPixel => 3,
            Self::Rand => 1,
            Self::Flush => 0,
        }
    }
}
