use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use quill_cli::{check_source, run_source, Diagnostic, Interpreter};
use quill_parse::parse_str;
use quill_resolve::ResolveError;
use serde::Serialize;

/// Maximum source file size in bytes (1MB)
const MAX_SOURCE_SIZE: usize = 1_000_000;

#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(about = "Quill: a small dynamically-typed scripting language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a Quill program
    Run {
        /// Path to .quill source file
        file: String,

        /// Print the value of every top-level statement
        #[arg(long)]
        echo: bool,
    },

    /// Parse a source file and dump the syntax tree
    Parse {
        /// Path to .quill source file
        file: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },

    /// Parse and resolve a source file, reporting static errors
    Check {
        /// Path to .quill source file
        file: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Pretty,
    Json,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Run { file, echo } => cmd_run(&file, echo)?,
        Commands::Parse { file, format } => cmd_parse(&file, format)?,
        Commands::Check { file, format } => cmd_check(&file, format)?,
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Install a stderr subscriber, but only when `RUST_LOG` asks for one.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn load_source(path: &str) -> Result<String> {
    let src = std::fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path))?;

    if src.len() > MAX_SOURCE_SIZE {
        anyhow::bail!(
            "source file exceeds {}MB limit ({} bytes)",
            MAX_SOURCE_SIZE / 1_000_000,
            src.len()
        );
    }
    Ok(src)
}

fn cmd_run(file: &str, echo: bool) -> Result<i32> {
    let src = load_source(file)?;

    let mut interp = Interpreter::new();
    let report = run_source(&mut interp, file, &src);
    if echo {
        for value in &report.results {
            println!("=> {}", value);
        }
    }
    for diag in &report.diagnostics {
        eprintln!("{}", diag);
    }
    Ok(report.status.exit_code())
}

fn cmd_parse(file: &str, format: Format) -> Result<i32> {
    let src = load_source(file)?;

    let program = match parse_str(file, &src) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("{}", Diagnostic::parse(&err, &src));
            return Ok(65);
        }
    };

    match format {
        Format::Pretty => println!("{:#?}", program),
        Format::Json => println!("{}", serde_json::to_string_pretty(&program)?),
    }
    Ok(0)
}

#[derive(Serialize)]
struct CheckReport<'a> {
    file: &'a str,
    ok: bool,
    errors: Vec<CheckEntry<'a>>,
}

#[derive(Serialize)]
struct CheckEntry<'a> {
    #[serde(flatten)]
    error: &'a ResolveError,
    message: String,
    line: usize,
    column: usize,
}

fn cmd_check(file: &str, format: Format) -> Result<i32> {
    let src = load_source(file)?;
    let resolution = match check_source(file, &src) {
        Ok(resolution) => resolution,
        Err(diag) => {
            eprintln!("{}", diag);
            return Ok(65);
        }
    };
    let ok = resolution.is_ok();

    match format {
        Format::Pretty => {
            for err in &resolution.errors {
                println!("{}", Diagnostic::resolve(err, &src));
            }
            if ok {
                println!("{}: no errors", file);
            }
        }
        Format::Json => {
            let errors = resolution
                .errors
                .iter()
                .map(|error| {
                    let (line, column) = error.span().line_col(&src);
                    CheckEntry {
                        error,
                        message: error.to_string(),
                        line,
                        column,
                    }
                })
                .collect();
            let report = CheckReport { file, ok, errors };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(if ok { 0 } else { 65 })
}
