use std::path::Path;

use crate::abi::DEFAULT_STACK_SIZE;
use crate::isa::{Program, parse_listing};
use crate::loader::{load_file, load_source};
use crate::{Error, Result};

/// Options shared by every execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Stack capacity in 32-bit words. SP starts here and grows downwards.
    pub stack_size: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl CompileOptions {
    pub fn validate(&self) -> Result<()> {
        if self.stack_size == 0 || self.stack_size > i32::MAX as u32 {
            return Err(Error::BadStackSize(self.stack_size));
        }
        Ok(())
    }
}

/// Load and parse program text.
pub fn parse_source(text: &str) -> Result<Program> {
    parse_listing(&load_source(text)?)
}

/// Load and parse a program file.
pub fn parse_file(path: &Path) -> Result<Program> {
    parse_listing(&load_file(path)?)
}
