//! # pl241-ssa - PL241 front end with on-the-fly SSA construction
//!
//! A compiler front end for PL241, a small imperative teaching language with
//! integer scalars, multidimensional arrays, functions, procedures, `if` and
//! `while`. There is no syntax tree: the recursive-descent parser emits a
//! control-flow graph whose instructions are already in static single
//! assignment form.
//!
//! ## Features
//!
//! - **Single pass** - tokens go straight into SSA blocks
//! - **Structural phis** - merge values are placed at `if` joins, `while`
//!   headers and the method exit, driven by the grammar
//! - **Dominator pointers** - each block knows its immediate dominator as
//!   soon as it is created
//! - **Constant folding** - arithmetic and comparisons on constants are
//!   folded in place, constant branches become jumps
//! - **Error recovery** - recoverable problems are collected as diagnostics
//!
//! ## Quick Start
//!
//! ```rust
//! use pl241_ssa::compiler::ir::InstructionKind;
//!
//! # fn main() -> pl241_ssa::Result<()> {
//! let source = r#"
//!     main
//!     var x;
//!     {
//!         let x <- call InputNum();
//!         if x < 10 then let x <- 2 else let x <- 3 fi;
//!         call OutputNum(x)
//!     }.
//! "#;
//!
//! let result = pl241_ssa::compile(source)?;
//! let main = result.program.main().expect("main is always built");
//!
//! // The two arms disagree on `x`, so the join holds a phi for it.
//! let phis: Vec<_> = result
//!     .program
//!     .method_blocks(main.id)
//!     .flat_map(|b| b.phis.iter().copied())
//!     .collect();
//! assert_eq!(phis.len(), 1);
//! assert!(matches!(
//!     result.program.instruction(phis[0]).kind,
//!     InstructionKind::Phi { ref variable, .. } if variable == "x"
//! ));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Source → Scanner → SsaParser (builds Program) → Optimizer → Verifier
//! ```
//!
//! ### Main Components
//!
//! - [`lexer`] - tokens with line and column
//! - [`parser`] - recursive descent parser and SSA builder
//! - [`compiler::ir`] - value and block arenas, instruction kinds, symbols
//! - [`compiler::dominator`] - dominator tree and common-dominator queries
//! - [`compiler::optimizer`] - constant folding and branch simplification
//! - [`compiler::verifier`] - structural checks on the finished graph
//! - [`compiler::debug`] - text dumps and Graphviz output
//!
//! ## Error Handling
//!
//! Fatal problems stop construction and come back as [`Error`]; recoverable
//! ones are collected as [`Diagnostic`]s:
//!
//! ```rust
//! use pl241_ssa::Error;
//!
//! let error = pl241_ssa::compile("main var x; { let x <- 4 / 0 } .").unwrap_err();
//! assert_eq!(error, Error::DivisionByZero { line: 1 });
//! assert!(error.to_string().contains("Division by zero"));
//! ```
//!
//! ## License
//!
//! Licensed under the [MIT License](https://opensource.org/licenses/MIT).

/// Version of the compiler front end
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;

// Re-export main types
pub use compiler::{CompileOptions, CompileResult, Compiler};
pub use error::{Diagnostic, Error, ErrorSeverity, Result};
pub use lexer::{Scanner, Token, TokenKind};
pub use parser::{parse, ParseOutput, SsaParser};

/// Compiles `source` with the default options
pub fn compile(source: &str) -> Result<CompileResult> {
    Compiler::new(CompileOptions::default()).compile(source)
}
