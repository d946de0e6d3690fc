//! CLI support for ochre
//!
//! Provides programmatic access to the ochre CLI functionality for
//! embedding in other tools (style linters, build pipelines).

mod check;

pub use check::{execute_check, execute_eval, CheckOptions, EvalOptions};

use std::io;

use crate::evaluator::RuntimeError;
use crate::parser::ParsingError;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Expression failed to parse
    Parse(Vec<ParsingError>),
    /// Expression failed to evaluate
    Eval(RuntimeError),
    /// JSON parsing error
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
    /// Unknown expected-type name
    UnknownType(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Parse(errors) => {
                writeln!(f, "Parse errors:")?;
                for error in errors {
                    writeln!(f, "  {}", error)?;
                }
                Ok(())
            }
            CliError::Eval(e) => write!(f, "Evaluation error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::UnknownType(name) => write!(
                f,
                "Unknown type '{}': expected one of number, string, boolean, color",
                name
            ),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Eval(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<RuntimeError> for CliError {
    fn from(e: RuntimeError) -> Self {
        CliError::Eval(e)
    }
}
