//! Rendering of parse, static and runtime errors against their source text.

use quill_parse::ParseError;
use quill_resolve::ResolveError;
use serde::Serialize;

use crate::eval::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Parse,
    Static,
    Runtime,
}

/// A located, user-facing error message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub phase: Phase,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl Diagnostic {
    pub fn parse(err: &ParseError, src: &str) -> Self {
        let (line, column) = err.span.line_col(src);
        Self {
            phase: Phase::Parse,
            message: err.to_string(),
            line,
            column,
        }
    }

    pub fn resolve(err: &ResolveError, src: &str) -> Self {
        let (line, column) = err.span().line_col(src);
        Self {
            phase: Phase::Static,
            message: err.to_string(),
            line,
            column,
        }
    }

    pub fn runtime(err: &RuntimeError, src: &str) -> Self {
        let (line, column) = err.span().line_col(src);
        Self {
            phase: Phase::Runtime,
            message: err.to_string(),
            line,
            column,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.phase {
            Phase::Parse | Phase::Static => write!(
                f,
                "[line {}:{}] Error: {}",
                self.line, self.column, self.message
            ),
            Phase::Runtime => write!(f, "{}\n[line {}:{}]", self.message, self.line, self.column),
        }
    }
}
