//! Error types for the kinetic solver.
//!
//! This module provides a unified error type [`KineticError`] that covers
//! the solver failure codes (singular pivot, iteration caps) as well as the
//! errors raised while reading and building a kinetic scheme.

use thiserror::Error;

/// Result type alias using [`KineticError`].
pub type Result<T> = std::result::Result<T, KineticError>;

/// Classic status code for a successful solve.
pub const SUCCESS: i32 = 0;

/// Classic status code for a solve that ran out of iterations.
pub const EXCEED_ITERS: i32 = 1;

/// Classic status code for a singular or ill-conditioned matrix.
pub const SINGULAR: i32 = 2;

/// Unified error type for all kinetic_core operations.
#[derive(Error, Debug)]
pub enum KineticError {
    // ============ Solver Errors ============
    /// A pivot magnitude fell below roundoff during factorization
    #[error("Singular matrix: pivot {pivot} is below roundoff")]
    Singular { pivot: usize },

    /// An iterative solve did not converge within its cap
    #[error("Iteration did not converge after {iterations} iterations")]
    ExceedIters { iterations: usize },

    /// The equation callback made a different number of element requests
    /// than it did when the structure was built
    #[error("Equation callback requested {got} matrix elements, structure has {expected}")]
    PatternMismatch { expected: usize, got: usize },

    /// Time step that is zero, negative or not finite
    #[error("Invalid time step {dt}: must be positive and finite")]
    InvalidTimeStep { dt: f64 },

    /// Buffer or index sizes do not agree with the equation count
    #[error("Invalid dimension: {message}")]
    InvalidDimension { message: String },

    // ============ Scheme Language Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Reference to a species that was never declared
    #[error("Unknown species '{name}' at line {line}")]
    UnknownSpecies { name: String, line: usize },

    /// Species declared twice
    #[error("Duplicate species '{name}' at line {line}")]
    DuplicateSpecies { name: String, line: usize },

    /// Reference to a parameter that was never defined
    #[error("Unknown parameter '{name}' at line {line}")]
    UnknownParameter { name: String, line: usize },

    /// Parameter defined twice
    #[error("Duplicate parameter '{name}' at line {line}")]
    DuplicateParameter { name: String, line: usize },

    /// Rate constant is negative or not finite
    #[error("Invalid rate constant {value} at line {line}")]
    InvalidRate { value: f64, line: usize },

    /// Structurally unusable scheme
    #[error("Invalid scheme: {message}")]
    InvalidTopology { message: String },

    // ============ I/O Errors ============
    /// Error reading a scheme file
    #[error("Failed to read scheme file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing results
    #[error("Output error: {message}")]
    OutputError { message: String },
}

impl KineticError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension(message: impl Into<String>) -> Self {
        Self::InvalidDimension {
            message: message.into(),
        }
    }

    /// Create an invalid topology error
    pub fn topology(message: impl Into<String>) -> Self {
        Self::InvalidTopology {
            message: message.into(),
        }
    }

    /// Integer status code for solver failures.
    ///
    /// Returns `None` for errors that have no counterpart in the classic
    /// `SUCCESS`/`EXCEED_ITERS`/`SINGULAR` taxonomy.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Singular { .. } => Some(SINGULAR),
            Self::ExceedIters { .. } => Some(EXCEED_ITERS),
            _ => None,
        }
    }
}

/// Collapse a solver result into its classic integer status code.
///
/// Errors without a classic code map to `-1`.
pub fn status_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => SUCCESS,
        Err(e) => e.code().unwrap_or(-1),
    }
}
