//! Zenith compiler command-line interface
//!
//! Compiles a single Zenith source file down to virtual-register machine
//! code with physical assignments. Stage gates expose every intermediate
//! result for inspection.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::error;
use std::path::PathBuf;
use zenith_cli::{compile, dump_function, dump_ir_json, dump_unit, CompileOptions, Stage};
use zenith_codegen::create_target;

/// The Zenith compiler
#[derive(Parser)]
#[command(name = "zenithc")]
#[command(about = "Ahead-of-time compiler for the Zenith language")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Target architecture
    #[arg(long, default_value = "z80")]
    target: String,

    /// Halt the pipeline after the given stage
    #[arg(long, value_enum)]
    stop_after: Option<Stage>,

    /// What to print on success
    #[arg(long, value_enum, default_value = "code")]
    emit: Emit,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Nothing beyond diagnostics.
    None,
    /// Symbols, call graph and per-function CFGs.
    Ir,
    /// Typed IR as JSON.
    Json,
    /// Machine code with register assignments.
    Code,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();

    match run(&cli) {
        Ok(success) => {
            if !success {
                std::process::exit(1);
            }
        }
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(2);
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let source = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let mut options = CompileOptions::new(source).with_target(cli.target.clone());
    options.file_name = cli.input.display().to_string();
    options.stop_after = cli.stop_after;
    options.verbose = cli.verbose;

    let output = compile(&options);

    for diagnostic in &output.diagnostics.messages {
        eprintln!(
            "{}:{}:{}: {}: {}",
            output.file_name,
            diagnostic.span.start.line,
            diagnostic.span.start.column,
            diagnostic.severity,
            diagnostic.message
        );
    }

    if !output.success {
        return Ok(false);
    }

    match cli.emit {
        Emit::None => {}
        Emit::Ir => {
            if let Some(unit) = &output.unit {
                print!("{}", dump_unit(unit));
            }
        }
        Emit::Json => {
            if let Some(unit) = &output.unit {
                println!("{}", dump_ir_json(unit).context("serializing IR")?);
            }
        }
        Emit::Code => {
            let target = create_target(&options.target)?;
            let set = target.calling_convention().register_set();
            for code in &output.functions {
                print!("{}", dump_function(code, &output, set));
            }
        }
    }

    Ok(true)
}
