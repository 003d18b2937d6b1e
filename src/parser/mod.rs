//! PL241 Parser Module
//!
//! Parses the token stream and builds the SSA program in the same pass.

mod context;
mod ssa_parser;

pub use context::{BlockEnd, BuildContext};
pub use ssa_parser::SsaParser;

use crate::compiler::ir::Program;
use crate::error::{Diagnostic, Result};
use crate::lexer::Scanner;

/// A constructed program and the recoverable problems found on the way
#[derive(Debug, Clone)]
pub struct ParseOutput {
    /// The SSA program
    pub program: Program,
    /// Scanner and parser diagnostics, ordered by position
    pub diagnostics: Vec<Diagnostic>,
}

/// Scans and parses `source` into an SSA program
pub fn parse(source: &str) -> Result<ParseOutput> {
    let mut scanner = Scanner::new(source);
    let tokens = scanner
        .scan_tokens()
        .map_err(|e| e.with_diagnostics(scanner.take_diagnostics()))?;
    tracing::debug!("Scanned {} token(s)", tokens.len());

    let (program, mut diagnostics) = SsaParser::new(tokens)
        .with_diagnostics(scanner.take_diagnostics())
        .parse()?;
    diagnostics.sort_by_key(|d| (d.line, d.column));

    Ok(ParseOutput {
        program,
        diagnostics,
    })
}
