mod headless;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use simasm::{CompileOptions, HostStats, Interpreter, jit};

use crate::headless::Headless;

#[derive(Parser)]
#[command(name = "simasm")]
#[command(about = "Compile and run pixel-simulation assembly programs")]
#[command(version)]
struct Cli {
    #[arg(help = "Program text file")]
    program: PathBuf,

    #[arg(long, default_value_t = simasm::abi::DEFAULT_STACK_SIZE, help = "Stack capacity in 32-bit words")]
    stack_size: u32,

    #[arg(long, help = "Print the verified LLVM IR instead of running")]
    emit_llvm: bool,

    #[arg(long, help = "Run with the reference interpreter instead of the JIT")]
    interpret: bool,

    #[arg(long, default_value_t = 0, help = "Seed for SIM_RAND")]
    seed: u64,

    #[arg(long, help = "Write a JSON run summary to this file")]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    run(&Cli::parse())
}

fn run(cli: &Cli) -> Result<()> {
    let options = CompileOptions {
        stack_size: cli.stack_size,
    };

    let program = simasm::parse_file(&cli.program)
        .with_context(|| format!("Failed to load {}", cli.program.display()))?;

    if cli.emit_llvm {
        let ir = jit::program_ir(&program, &options).context("Lowering failed")?;
        print!("{ir}");
        return Ok(());
    }

    let mut simulator = Headless::new(cli.seed);
    let display = simulator.display();
    let backend = if cli.interpret { "interpreter" } else { "jit" };
    tracing::debug!(backend, instructions = program.len(), "running");

    let outcome = if cli.interpret {
        Interpreter::new(&program, &options).and_then(|mut interp| interp.run(&mut simulator))
    } else {
        jit::run_program(&program, &options, Box::new(simulator))
    };

    if let Some(path) = &cli.report {
        let display = display.borrow();
        let report = serde_json::json!({
            "program": cli.program.display().to_string(),
            "backend": backend,
            "stack_size": options.stack_size,
            "ok": outcome.is_ok(),
            "error": outcome.as_ref().err().map(ToString::to_string),
            "stats": outcome.as_ref().ok().map(stats_json),
            "frames": display.frames,
            "lit_pixels": display.lit(),
            "offscreen_pixels": display.offscreen,
        });
        let text = serde_json::to_string_pretty(&report)?;
        fs::write(path, text)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    let stats = outcome.context("Execution failed")?;
    tracing::info!(
        pixels = stats.pixels,
        rand_calls = stats.rand_calls,
        flushes = stats.flushes,
        "program finished"
    );
    Ok(())
}

fn stats_json(stats: &HostStats) -> serde_json::Value {
    serde_json::json!({
        "pixels": stats.pixels,
        "rand_calls": stats.rand_calls,
        "flushes": stats.flushes,
    })
}
