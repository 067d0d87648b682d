//! Error types for the EQL transpiler

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage that produced a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    /// Grammar match and CST construction
    Parse,
    /// Supported-shape check on the parsed query
    Gate,
    /// CST to IR lowering
    Lower,
    /// Rewrite passes (only surfaced through [`crate::Translation::into_strict`])
    Rewrite,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Parse => write!(f, "parse"),
            Stage::Gate => write!(f, "gate"),
            Stage::Lower => write!(f, "lower"),
            Stage::Rewrite => write!(f, "rewrite"),
        }
    }
}

/// A single syntax error with a 1-based source position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// EQL transpiler error type
#[derive(Error, Debug)]
pub enum EqlError {
    /// The query text does not match the grammar
    #[error("Syntax error: {}", join(.0))]
    Syntax(Vec<SyntaxError>),

    /// The query parsed but its shape cannot be translated
    #[error("unsupported query type: {kind}")]
    UnsupportedQuery { kind: String },

    /// The parse tree contains constructs the IR cannot express
    #[error("Lowering error: {}", .errors.join("; "))]
    Lowering { errors: Vec<String> },

    /// Soft errors collected by the rewrite passes
    #[error("Translation error: {}", .errors.join("; "))]
    Rewrite { errors: Vec<String> },
}

/// Result type for EQL operations
pub type Result<T> = std::result::Result<T, EqlError>;

impl EqlError {
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        EqlError::Syntax(vec![SyntaxError::new(line, column, message)])
    }

    pub fn unsupported(kind: impl Into<String>) -> Self {
        EqlError::UnsupportedQuery { kind: kind.into() }
    }

    /// The stage of the pipeline this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            EqlError::Syntax(_) => Stage::Parse,
            EqlError::UnsupportedQuery { .. } => Stage::Gate,
            EqlError::Lowering { .. } => Stage::Lower,
            EqlError::Rewrite { .. } => Stage::Rewrite,
        }
    }

    /// Every message carried by this error, one entry per underlying problem
    pub fn messages(&self) -> Vec<String> {
        match self {
            EqlError::Syntax(errors) => errors.iter().map(|e| e.to_string()).collect(),
            EqlError::UnsupportedQuery { .. } => vec![self.to_string()],
            EqlError::Lowering { errors } | EqlError::Rewrite { errors } => errors.clone(),
        }
    }
}

fn join(errors: &[SyntaxError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
