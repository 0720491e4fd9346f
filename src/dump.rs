//! State dump formatting
//!
//! Serializes the final machine state to the output files the harness
//! expects: register files as lane-indexed tables (a header row of column
//! indices, a dashed separator, then one row per register), and the two
//! data memories as one signed decimal word per line.
//!
//! A register file's table width is its *vector length* (1 lane for a
//! scalar register, [`MVL`] lanes for a vector register), not its register
//! count: `SRF.txt` is 8 rows of a single column, `VRF.txt` is 8 rows of
//! `MVL` columns, and `VM.txt`/`VL.txt` are each a single row of a single
//! column holding the special register's raw value.

use std::fmt::Write as _;
use std::io;
use std::path::Path;

use crate::interp::Machine;
use crate::word_memory::WordMemory;
use crate::MVL;

/// Width, in characters, of each column in a register-file table, wide
/// enough for a `-` sign and the 10 digits of an `i32`.
const COLUMN_WIDTH: usize = 13;

fn push_row<I: IntoIterator<Item = String>>(out: &mut String, cells: I) {
    for cell in cells {
        let _ = write!(out, "{cell:<width$}", width = COLUMN_WIDTH);
    }
    out.push('\n');
}

/// Render a fixed-width table: a header of column indices `0..lanes`, a
/// dashed rule, then one row per entry of `rows`, each row being exactly
/// `lanes` values. Generic over the cell type (`i32` for ordinary
/// registers, `u64` for the 64-bit `VM` value) so nothing gets truncated
/// on its way to text.
fn render_table<T: std::fmt::Display, R: IntoIterator<Item = T>>(
    lanes: usize,
    rows: impl IntoIterator<Item = R>,
) -> String {
    let mut out = String::new();
    push_row(&mut out, (0..lanes).map(|i| i.to_string()));
    out.push_str(&"-".repeat(COLUMN_WIDTH * lanes));
    out.push('\n');
    for row in rows {
        push_row(&mut out, row.into_iter().map(|v| v.to_string()));
    }
    out
}

fn render_memory(memory: &WordMemory) -> String {
    let mut out = String::new();
    for value in memory.iter() {
        let _ = writeln!(out, "{value}");
    }
    out
}

/// Write every dump file for a finished run into `dir`: `SRF.txt`,
/// `VRF.txt`, `VM.txt`, `VL.txt`, `SDMEMOP.txt`, and `VDMEMOP.txt`.
pub fn dump_all(machine: &Machine, dir: &Path) -> io::Result<()> {
    std::fs::write(
        dir.join("SRF.txt"),
        render_table(
            1,
            (0..crate::NUM_REGISTERS)
                .map(|i| [machine.srf().read(i).expect("register index is in range")]),
        ),
    )?;

    std::fs::write(
        dir.join("VRF.txt"),
        render_table(
            MVL,
            (0..crate::NUM_REGISTERS)
                .map(|i| *machine.vrf().read(i).expect("register index is in range")),
        ),
    )?;

    std::fs::write(
        dir.join("VM.txt"),
        render_table(1, std::iter::once([machine.vm().value()])),
    )?;

    std::fs::write(
        dir.join("VL.txt"),
        render_table(1, std::iter::once([machine.vl().get() as i32])),
    )?;

    std::fs::write(dir.join("SDMEMOP.txt"), render_memory(machine.sdmem()))?;
    std::fs::write(dir.join("VDMEMOP.txt"), render_memory(machine.vdmem()))?;

    Ok(())
}
