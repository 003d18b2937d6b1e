//! # PL241 Compiler - source to optimized SSA
//!
//! Drives the front end end to end: scanning, single-pass SSA construction,
//! constant folding and structural verification.
//!
//! ## Architecture
//!
//! ```text
//! PL241 Source → Tokens → SSA CFG (parser) → Fold → Verify
//! ```
//!
//! ## Usage
//!
//! ```
//! use pl241_ssa::compiler::{CompileOptions, Compiler};
//!
//! let source = "main var x; { let x <- 2 * 3; call OutputNum(x) } .";
//! let compiler = Compiler::new(CompileOptions::default());
//! let result = compiler.compile(source)?;
//! assert_eq!(result.fold_stats.folded, 1);
//! # Ok::<(), pl241_ssa::Error>(())
//! ```

pub mod debug;
pub mod dominator;
pub mod ir;
pub mod optimizer;
pub mod verifier;

pub use debug::{dominator_tree_to_dot, dump_program, format_instruction, method_to_dot};
pub use dominator::{common_dominator, dominates, DominatorTree};
pub use ir::Program;
pub use optimizer::{FoldStats, Optimizer};
pub use verifier::{verify, Verifier, VerifyError, VerifyResult};

use crate::error::{Diagnostic, Error, Result};
use crate::parser;
use serde::{Deserialize, Serialize};

/// Compilation options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Optimization level: 0 none, 1 one folding sweep, 2+ fold to a fixed
    /// point
    pub opt_level: u8,
    /// Upper bound on folding sweeps at level 2 and above
    pub max_fold_passes: usize,
    /// Run the IR verifier on the final program
    pub verify: bool,
    /// Accept programs whose only errors were recovered from
    pub allow_recovered_errors: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            opt_level: 1,
            max_fold_passes: 16,
            verify: true,
            allow_recovered_errors: false,
        }
    }
}

impl CompileOptions {
    /// Loads options from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

/// Compilation result with metadata
#[derive(Debug, Clone)]
pub struct CompileResult {
    /// The optimized SSA program
    pub program: Program,
    /// Warnings (and recovered errors when those are allowed)
    pub diagnostics: Vec<Diagnostic>,
    /// What constant folding changed
    pub fold_stats: FoldStats,
}

/// PL241 to SSA compiler
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    /// Create a new compiler with options
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Options in effect
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile PL241 source into an optimized SSA program
    pub fn compile(&self, source: &str) -> Result<CompileResult> {
        // Phase 1: scan and build SSA
        let parser::ParseOutput {
            mut program,
            diagnostics,
        } = parser::parse(source)?;

        for diagnostic in &diagnostics {
            tracing::warn!("{}", diagnostic);
        }
        let error_count = diagnostics.iter().filter(|d| d.is_error()).count();
        if error_count > 0 && !self.options.allow_recovered_errors {
            return Err(Error::InvalidProgram {
                error_count,
                diagnostics,
            });
        }

        // Phase 2: fold constants and simplify branches
        let mut optimizer =
            Optimizer::new(self.options.opt_level).with_max_passes(self.options.max_fold_passes);
        let fold_stats = match optimizer.optimize(&mut program) {
            Ok(stats) => stats,
            Err(error) => return Err(error.with_diagnostics(diagnostics)),
        };
        tracing::debug!(
            "Folded {} value(s), simplified {} branch(es) in {} pass(es)",
            fold_stats.folded,
            fold_stats.simplified_branches,
            fold_stats.passes
        );

        // Phase 3: verify
        if self.options.verify {
            let verification = Verifier::new().verify(&program);
            for warning in &verification.warnings {
                tracing::debug!("Verifier: {}", warning);
            }
            if !verification.valid {
                let error_msgs: Vec<String> =
                    verification.errors.iter().map(|e| e.to_string()).collect();
                return Err(Error::compiler(format!(
                    "Verification failed: {}",
                    error_msgs.join("; ")
                ))
                .with_diagnostics(diagnostics));
            }
        }

        Ok(CompileResult {
            program,
            diagnostics,
            fold_stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = CompileOptions::default();
        assert_eq!(options.opt_level, 1);
        assert_eq!(options.max_fold_passes, 16);
        assert!(options.verify);
        assert!(!options.allow_recovered_errors);
    }

    #[test]
    fn test_options_from_json() {
        let options = CompileOptions::from_json(r#"{ "opt_level": 2, "verify": false }"#).unwrap();
        assert_eq!(options.opt_level, 2);
        assert!(!options.verify);
        assert_eq!(options.max_fold_passes, 16);

        assert!(matches!(
            CompileOptions::from_json("{ \"opt_level\": \"high\" }"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_compile_simple() {
        let compiler = Compiler::new(CompileOptions::default());
        let result = compiler
            .compile("main var x; { let x <- 1 + 2; call OutputNum(x) } .")
            .unwrap();
        assert_eq!(result.fold_stats.folded, 1);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_recovered_errors_reject_by_default() {
        let source = "main var x; { let x <- 1; 42; call OutputNum(x) } .";

        let error = Compiler::new(CompileOptions::default())
            .compile(source)
            .unwrap_err();
        assert!(matches!(error, Error::InvalidProgram { error_count: 1, .. }));

        let lenient = CompileOptions {
            allow_recovered_errors: true,
            ..CompileOptions::default()
        };
        let result = Compiler::new(lenient).compile(source).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
    }
}
