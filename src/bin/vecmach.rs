use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use vecmach::interp::Machine;
use vecmach::{loader, SDMEM_SIZE, VDMEM_SIZE};

/// Run a vector machine program to completion and dump its final state
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Directory containing Code.asm, SDMEM.txt, and VDMEM.txt, and to
    /// which the dumped state files are written. Defaults to the current
    /// directory.
    #[arg(long, default_value = "")]
    iodir: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let iodir = if args.iodir.is_empty() {
        std::env::current_dir().expect("current directory is accessible")
    } else {
        PathBuf::from(args.iodir)
    };

    let (imem, program_error) = loader::load_program(&iodir);
    let (sdmem, sdmem_error) = loader::load_sdmem(&iodir);
    let (vdmem, vdmem_error) = loader::load_vdmem(&iodir);
    for error in [program_error, sdmem_error, vdmem_error].into_iter().flatten() {
        eprintln!("warning: {error}");
    }

    debug_assert_eq!(sdmem.size(), SDMEM_SIZE);
    debug_assert_eq!(vdmem.size(), VDMEM_SIZE);

    let mut machine = Machine::new(imem, sdmem, vdmem);
    let diagnostics = match machine.run() {
        Ok(diagnostics) => diagnostics,
        Err(fatal) => {
            eprintln!("fatal: {fatal}");
            return ExitCode::FAILURE;
        }
    };
    for diagnostic in &diagnostics {
        eprintln!(
            "warning: pc={} {:?}: {}",
            diagnostic.pc, diagnostic.mnemonic, diagnostic.error
        );
    }

    match vecmach::dump::dump_all(&machine, &iodir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fatal: could not write output files: {e}");
            ExitCode::FAILURE
        }
    }
}
