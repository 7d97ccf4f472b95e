// This binary runs the register allocator on a test IR file and prints the result: the
// program with every register value annotated by its physical register, the register
// high-water mark and clobber list of each function, and the session statistics. With
// --intervals the live intervals of each function are printed as well. Logging goes
// through env_logger, so RUST_LOG=debug shows the individual passes.

//! Register allocation dump tool.

use bumpalo::Bump;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use nvra::core::{CompilationSession, RaOptions, TargetDesc};
use nvra::ir::RegFile;
use nvra::ra::RegAlloc;
use nvra::test_ir::parse_program;

/// ra_dump - allocate registers for a test IR program
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Test IR file to allocate.
    file: PathBuf,

    /// Target chipset, e.g. 0x50 or 0xc0.
    #[arg(long, default_value = "0xc0", value_parser = parse_chipset)]
    chipset: u32,

    /// Print the live intervals of every function.
    #[arg(long)]
    intervals: bool,

    /// Skip the post-allocation interference check.
    #[arg(long)]
    no_verify: bool,
}

fn parse_chipset(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid chipset '{s}': {e}"))
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(&args.file)?;
    let target = TargetDesc::from_chipset(args.chipset)?;
    let mut prog = parse_program(&text, target)?;

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let options = RaOptions {
        verify: !args.no_verify,
        dump: false,
    };
    let mut intervals = Vec::new();
    RegAlloc::new(&session, options).run_with(&mut prog, |func, state| {
        if args.intervals {
            intervals.push(format!("{}:\n{}", func.name, state.dump(func)));
        }
    })?;

    println!("{prog}");
    for func in &prog.functions {
        print!("{}: max", func.name);
        for file in RegFile::REGISTER_FILES {
            print!(" {}={}", file, func.max_reg[file]);
        }
        println!();
        let clobbers: Vec<String> = func
            .clobbers
            .iter()
            .map(|c| format!("{}{}:{}", c.file.reg_prefix(), c.id, c.size))
            .collect();
        println!("{}: clobbers [{}]", func.name, clobbers.join(", "));
    }
    for dump in &intervals {
        println!("{dump}");
    }
    print!("{}", session.stats());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
