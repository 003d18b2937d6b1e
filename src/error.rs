//! Error and diagnostic types for the PL241 front end

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fatal front-end errors
///
/// Any of these aborts construction of the program. Recoverable problems are
/// reported as [`Diagnostic`]s instead and never surface through this type,
/// except when they are collectively rejected by [`Error::InvalidProgram`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Lexical / syntactic errors
    /// Malformed token that cannot be recovered from
    ///
    /// **Triggered by:** An integer literal that does not fit in 64 bits
    #[error("Syntax error at line {line}, column {col}: {message}")]
    SyntaxError {
        /// Line number where error occurred
        line: usize,
        /// Column number where error occurred
        col: usize,
        /// Error description
        message: String,
    },

    /// A token that no grammar rule can start with at this point
    ///
    /// **Triggered by:** A factor such as `let x <- ;`, a missing relational
    /// operator in `if x then`, or a keyword where an identifier is required
    #[error("Unexpected token at line {line}: expected {expected}, got {got}")]
    UnexpectedToken {
        /// Expected token description
        expected: String,
        /// Actual token received
        got: String,
        /// Line number of the offending token
        line: usize,
    },

    // Semantic errors
    /// Reference to a name that is declared in no visible scope
    #[error("Undefined variable `{name}` at line {line}")]
    UndefinedVariable {
        /// Variable name
        name: String,
        /// Line of the reference
        line: usize,
    },

    /// A designator that cannot denote a value
    ///
    /// **Triggered by:** Reading or assigning an array without indices
    #[error("Invalid use of `{name}` at line {line}: {reason}")]
    InvalidDesignator {
        /// Designator name
        name: String,
        /// Line of the designator
        line: usize,
        /// Why the designator is invalid
        reason: String,
    },

    /// A call used as a value although it produces none
    ///
    /// **Triggered by:** `let x <- call OutputNum(1)` or calling a procedure
    /// inside an expression
    #[error("Call to `{callee}` at line {line} produces no value")]
    VoidValue {
        /// Callee name
        callee: String,
        /// Line of the call
        line: usize,
    },

    /// A function whose exit can be reached without a bound return value
    #[error("Function `{method}` can reach its exit without a return value")]
    MissingReturnValue {
        /// Function name
        method: String,
    },

    /// The predecessors of an exit block share no dominator
    #[error("No common dominator in `{method}`: {reason}")]
    NoCommonDominator {
        /// Method whose CFG is malformed
        method: String,
        /// What went wrong during the search
        reason: String,
    },

    // Optimizer errors
    /// Constant division by the literal zero
    #[error("Division by zero at line {line}")]
    DivisionByZero {
        /// Line of the division
        line: usize,
    },

    // Pipeline errors
    /// The program parsed, but recoverable errors were reported
    #[error("Program rejected with {error_count} error(s)")]
    InvalidProgram {
        /// Number of error-severity diagnostics
        error_count: usize,
        /// All diagnostics, including warnings
        diagnostics: Vec<Diagnostic>,
    },

    /// Fatal error preceded by recoverable diagnostics
    #[error("{error}")]
    Aborted {
        /// The fatal error that stopped construction
        error: Box<Error>,
        /// Diagnostics accumulated before the abort
        diagnostics: Vec<Diagnostic>,
    },

    /// Options could not be loaded
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// General compiler error
    #[error("Compiler error: {0}")]
    CompilerError(String),
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Fatal error that cannot be recovered from
    Fatal,
    /// Error that was recovered from, the program is still rejected
    Recoverable,
    /// Warning that doesn't prevent compilation
    Warning,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Fatal => write!(f, "fatal"),
            ErrorSeverity::Recoverable => write!(f, "error"),
            ErrorSeverity::Warning => write!(f, "warning"),
        }
    }
}

impl Error {
    /// Create a compiler error with a message
    pub fn compiler(msg: impl Into<String>) -> Self {
        Error::CompilerError(msg.into())
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::InvalidProgram { .. } => ErrorSeverity::Recoverable,
            Error::Aborted { error, .. } => error.classify(),
            _ => ErrorSeverity::Fatal,
        }
    }

    /// The underlying error, looking through [`Error::Aborted`]
    pub fn root(&self) -> &Error {
        match self {
            Error::Aborted { error, .. } => error.root(),
            other => other,
        }
    }

    /// Source line the error points at, when known
    pub fn line(&self) -> Option<usize> {
        match self.root() {
            Error::SyntaxError { line, .. }
            | Error::UnexpectedToken { line, .. }
            | Error::UndefinedVariable { line, .. }
            | Error::InvalidDesignator { line, .. }
            | Error::VoidValue { line, .. }
            | Error::DivisionByZero { line } => Some(*line),
            _ => None,
        }
    }

    /// Diagnostics carried by the error
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::InvalidProgram { diagnostics, .. } | Error::Aborted { diagnostics, .. } => {
                diagnostics
            }
            _ => &[],
        }
    }

    /// Attach accumulated diagnostics to a fatal error
    pub(crate) fn with_diagnostics(self, diagnostics: Vec<Diagnostic>) -> Self {
        if diagnostics.is_empty() {
            self
        } else {
            Error::Aborted {
                error: Box::new(self),
                diagnostics,
            }
        }
    }
}

/// A recoverable problem found while scanning or parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// `Recoverable` or `Warning`
    pub severity: ErrorSeverity,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Human-readable description
    pub message: String,
}

impl Diagnostic {
    /// Creates an error-severity diagnostic
    pub fn error(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            severity: ErrorSeverity::Recoverable,
            line,
            column,
            message: message.into(),
        }
    }

    /// Creates a warning diagnostic
    pub fn warning(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            severity: ErrorSeverity::Warning,
            line,
            column,
            message: message.into(),
        }
    }

    /// Returns `true` for error-severity diagnostics
    pub fn is_error(&self) -> bool {
        self.severity != ErrorSeverity::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {}, column {}: {}",
            self.severity, self.line, self.column, self.message
        )
    }
}

/// Result type for front-end operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_looks_through_aborted() {
        let error = Error::DivisionByZero { line: 3 }
            .with_diagnostics(vec![Diagnostic::warning(1, 1, "unused")]);

        assert!(matches!(error, Error::Aborted { .. }));
        assert_eq!(error.root(), &Error::DivisionByZero { line: 3 });
        assert_eq!(error.line(), Some(3));
        assert_eq!(error.diagnostics().len(), 1);
        assert_eq!(error.classify(), ErrorSeverity::Fatal);
    }

    #[test]
    fn test_without_diagnostics_stays_plain() {
        let error = Error::compiler("boom").with_diagnostics(Vec::new());
        assert_eq!(error, Error::CompilerError("boom".to_string()));
        assert_eq!(error.to_string(), "Compiler error: boom");
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::error(4, 7, "expected `;`");
        assert!(diagnostic.is_error());
        assert_eq!(
            diagnostic.to_string(),
            "error at line 4, column 7: expected `;`"
        );
    }
}
