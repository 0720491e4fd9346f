//! Instruction memory
//!
//! Holds the already-tokenized program: each source line of `Code.asm` is
//! split on whitespace once, at load time, into a mnemonic and its operand
//! tokens. Fetching by program counter is then a plain bounds-checked index,
//! so the interpreter's hot loop never re-tokenizes a line it has already
//! visited.
//!
//! Labels are not supported at this level: the ISA expresses all control
//! flow as PC-relative numeric immediates on the branch opcodes (see
//! `interp`).

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FetchError {
    #[error("instruction fetch at index {index} is out of bounds for size {size}")]
    InvalidAddress { index: u32, size: usize },
}

#[derive(Debug, Clone, Default)]
pub struct InstructionMemory {
    instructions: Vec<Vec<String>>,
}

impl InstructionMemory {
    pub fn new(instructions: Vec<Vec<String>>) -> Self {
        Self { instructions }
    }

    pub fn size(&self) -> usize {
        self.instructions.len()
    }

    /// Tokenize one line of assembly source: split on runs of whitespace,
    /// discarding empty tokens.
    pub fn tokenize(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_owned).collect()
    }

    /// Fetch the tokenized instruction at `pc`.
    pub fn fetch(&self, pc: u32) -> Result<&[String], FetchError> {
        self.instructions
            .get(pc as usize)
            .map(Vec::as_slice)
            .ok_or(FetchError::InvalidAddress {
                index: pc,
                size: self.instructions.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_whitespace_and_drops_empties() {
        let tokens = InstructionMemory::tokenize("ADDVV  VR3   VR1 VR2");
        assert_eq!(tokens, vec!["ADDVV", "VR3", "VR1", "VR2"]);
    }

    #[test]
    fn fetch_in_bounds() {
        let imem = InstructionMemory::new(vec![
            vec!["HALT".to_string()],
            vec!["CVM".to_string()],
        ]);
        assert_eq!(imem.fetch(1).unwrap(), &["CVM".to_string()]);
    }

    #[test]
    fn fetch_out_of_bounds_is_rejected() {
        let imem = InstructionMemory::new(vec![vec!["HALT".to_string()]]);
        assert_eq!(
            imem.fetch(1),
            Err(FetchError::InvalidAddress { index: 1, size: 1 })
        );
    }
}
