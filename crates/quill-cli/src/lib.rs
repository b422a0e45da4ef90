//! Quill runtime: evaluator, object model, host builtins and diagnostics.

#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

pub mod capture;
pub mod diag;
pub mod env;
pub mod eval;
pub mod host;
mod stack;
pub mod value;

use quill_parse::parse_str;
use quill_resolve::{resolve, Resolution};

pub use capture::CaptureBuffer;
pub use diag::{Diagnostic, Phase};
pub use eval::{ControlFlow, Evaluation, Interpreter, RuntimeError, MAX_CALL_DEPTH};
pub use value::Value;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    /// Parse or static errors; nothing was evaluated
    StaticError,
    RuntimeError,
}

impl RunStatus {
    /// Process exit code for this outcome (sysexits `EX_DATAERR` / `EX_SOFTWARE`).
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::StaticError => 65,
            RunStatus::RuntimeError => 70,
        }
    }
}

/// Outcome of running one source text end to end.
#[derive(Debug)]
pub struct RunReport {
    pub status: RunStatus,
    /// One value per top-level statement that completed
    pub results: Vec<Value>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse and resolve `src` without running it. A syntax error comes back as
/// its diagnostic; static errors are left in the resolution.
pub fn check_source(file: &str, src: &str) -> Result<Resolution, Diagnostic> {
    let program = parse_str(file, src).map_err(|err| Diagnostic::parse(&err, src))?;
    Ok(resolve(&program))
}

/// Parse, resolve and evaluate `src` on `interp`.
///
/// Evaluation only starts when the program is free of parse and static errors.
pub fn run_source(interp: &mut Interpreter, file: &str, src: &str) -> RunReport {
    let program = match parse_str(file, src) {
        Ok(program) => program,
        Err(err) => {
            return RunReport {
                status: RunStatus::StaticError,
                results: Vec::new(),
                diagnostics: vec![Diagnostic::parse(&err, src)],
            }
        }
    };

    let resolution = resolve(&program);
    if !resolution.is_ok() {
        return RunReport {
            status: RunStatus::StaticError,
            results: Vec::new(),
            diagnostics: resolution
                .errors
                .iter()
                .map(|err| Diagnostic::resolve(err, src))
                .collect(),
        };
    }

    let evaluation = interp.interpret(&program, &resolution.locals);
    match evaluation.error {
        Some(err) => RunReport {
            status: RunStatus::RuntimeError,
            results: evaluation.results,
            diagnostics: vec![Diagnostic::runtime(&err, src)],
        },
        None => RunReport {
            status: RunStatus::Ok,
            results: evaluation.results,
            diagnostics: Vec::new(),
        },
    }
}
