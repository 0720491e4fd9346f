//! Image loading
//!
//! Reads `Code.asm`, `SDMEM.txt`, and `VDMEM.txt` from an I/O directory into
//! the components that build a fresh [`crate::interp::Machine`]. Per the
//! best-effort error policy, a missing or unreadable file is reported but
//! does not abort the run: the affected piece of state simply starts
//! zero-filled (memories) or empty (the program), exactly as if the file
//! had existed but been blank.

use std::path::Path;

use thiserror::Error;

use crate::imem::InstructionMemory;
use crate::word_memory::WordMemory;
use crate::{SDMEM_SIZE, VDMEM_SIZE};

#[derive(Error, Debug)]
pub enum IoError {
    #[error("could not read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {token:?} is not a valid 32-bit signed integer")]
    MalformedWord {
        path: String,
        line: usize,
        token: String,
    },
}

/// Load and tokenize `<iodir>/Code.asm`. A missing file yields an empty
/// program (which will immediately report `RunError::ProgramCounterOutOfRange`
/// at PC 0 when run, rather than silently doing nothing).
pub fn load_program(iodir: &Path) -> (InstructionMemory, Option<IoError>) {
    let path = iodir.join("Code.asm");
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let instructions = contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(InstructionMemory::tokenize)
                .collect();
            (InstructionMemory::new(instructions), None)
        }
        Err(source) => (
            InstructionMemory::new(Vec::new()),
            Some(IoError::Unreadable {
                path: path.display().to_string(),
                source,
            }),
        ),
    }
}

/// Load one signed-decimal-word-per-line memory image, zero-padding a short
/// file up to `size` (§3) and reporting, but not failing on, a missing file
/// or a malformed line.
fn load_memory_image(path: &Path, size: usize) -> (WordMemory, Option<IoError>) {
    let mut memory = WordMemory::new(size);
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let mut words = Vec::new();
            for (line_no, line) in contents.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match line.parse::<i32>() {
                    Ok(word) => words.push(word),
                    Err(_) => {
                        return (
                            memory,
                            Some(IoError::MalformedWord {
                                path: path.display().to_string(),
                                line: line_no + 1,
                                token: line.to_string(),
                            }),
                        )
                    }
                }
            }
            memory.load_image(&words);
            (memory, None)
        }
        Err(source) => (
            memory,
            Some(IoError::Unreadable {
                path: path.display().to_string(),
                source,
            }),
        ),
    }
}

pub fn load_sdmem(iodir: &Path) -> (WordMemory, Option<IoError>) {
    load_memory_image(&iodir.join("SDMEM.txt"), SDMEM_SIZE)
}

pub fn load_vdmem(iodir: &Path) -> (WordMemory, Option<IoError>) {
    load_memory_image(&iodir.join("VDMEM.txt"), VDMEM_SIZE)
}
