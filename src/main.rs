//! `qntc`: compile a single Quanta source file to LLVM-IR text.
//!
//! CLI shape and tracing setup grounded on
//! `examples/navicore-cem3/crates/lsp/src/main.rs` (env-filtered
//! `tracing_subscriber` installed once in `main`, nowhere else).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use qntc::config::CompilerConfig;

#[derive(Parser, Debug)]
#[command(name = "qntc", about = "Ahead-of-time compiler for the Quanta scripting language")]
struct Args {
    /// Source file to compile.
    source: Option<PathBuf>,

    /// Where to write the serialized IR text. Defaults to the source
    /// file's name with a `.ll` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Optional `quanta.toml` configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("QNTC_LOG").unwrap_or_else(|_| EnvFilter::new("quantac=info")))
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    let Some(source) = args.source else {
        eprintln!("usage: qntc <source-file> [-o <output>] [-c <config>]");
        return ExitCode::from(1);
    };

    let config = match &args.config {
        Some(path) => match std::fs::read_to_string(path).and_then(|text| {
            CompilerConfig::from_toml_str(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("cannot load config '{}': {e}", path.display());
                return ExitCode::from(1);
            }
        },
        None => CompilerConfig::new(),
    };

    let output = qntc::compile_file(&source, &config);
    if output.diagnostics.had_error() {
        eprintln!("{}", output.diagnostics.render());
        return ExitCode::from(1);
    }

    let out_path = args.output.unwrap_or_else(|| source.with_extension("ll"));
    match std::fs::write(&out_path, output.ir_text.unwrap_or_default()) {
        Ok(()) => {
            tracing::info!(path = %out_path.display(), "wrote IR");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("cannot write '{}': {e}", out_path.display());
            ExitCode::from(1)
        }
    }
}
