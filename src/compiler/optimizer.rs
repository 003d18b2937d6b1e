//! # Constant folding and branch simplification
//!
//! One sweep visits every instruction of every block of every method:
//! - a computation or comparison with two constant operands is replaced by a
//!   fresh constant, which reaches every consumer through the use-lists
//! - a conditional branch on a constant becomes a jump, and the edge to the
//!   target it no longer takes is removed from both endpoint lists
//!
//! Level 1 runs a single sweep. Level 2 and above repeat sweeps until one
//! changes nothing, bounded by the configured pass limit.

use super::ir::{BlockId, InstructionKind, Program, ValueId};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// What the optimizer changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldStats {
    /// Computations and comparisons replaced by constants
    pub folded: usize,
    /// Conditional branches turned into jumps
    pub simplified_branches: usize,
    /// Sweeps performed
    pub passes: usize,
}

impl FoldStats {
    /// Whether anything was rewritten
    pub fn changed(&self) -> bool {
        self.folded > 0 || self.simplified_branches > 0
    }
}

impl AddAssign for FoldStats {
    fn add_assign(&mut self, other: Self) {
        self.folded += other.folded;
        self.simplified_branches += other.simplified_branches;
        self.passes += other.passes;
    }
}

/// Optimizer with configurable optimization level
pub struct Optimizer {
    level: u8,
    max_passes: usize,
}

impl Optimizer {
    /// Create a new optimizer with the specified optimization level
    pub fn new(level: u8) -> Self {
        Self {
            level,
            max_passes: 16,
        }
    }

    /// Bounds the number of sweeps at level 2 and above
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Run the passes enabled by the level
    pub fn optimize(&mut self, program: &mut Program) -> Result<FoldStats> {
        let mut total = FoldStats::default();
        if self.level == 0 {
            return Ok(total);
        }

        loop {
            let stats = self.sweep(program)?;
            total += stats;
            tracing::debug!(
                "Sweep {}: folded {}, simplified {} branch(es)",
                total.passes,
                stats.folded,
                stats.simplified_branches
            );
            if self.level < 2 || !stats.changed() || total.passes >= self.max_passes {
                break;
            }
        }
        Ok(total)
    }

    /// A single folding sweep over the whole program
    pub fn sweep(&mut self, program: &mut Program) -> Result<FoldStats> {
        let mut stats = FoldStats {
            passes: 1,
            ..FoldStats::default()
        };

        let blocks: Vec<BlockId> = program
            .methods
            .iter()
            .flat_map(|m| m.blocks.iter().copied())
            .collect();
        for block in blocks {
            for id in program.block(block).instructions.clone() {
                match program.instruction(id).kind.clone() {
                    InstructionKind::Compute { op, lhs, rhs } => {
                        let (Some(a), Some(b)) = (program.constant(lhs), program.constant(rhs))
                        else {
                            continue;
                        };
                        let value = op.evaluate(a, b).ok_or(Error::DivisionByZero {
                            line: program.instruction(id).line,
                        })?;
                        Self::fold(program, id, value);
                        stats.folded += 1;
                    }
                    InstructionKind::Compare { op, lhs, rhs } => {
                        let (Some(a), Some(b)) = (program.constant(lhs), program.constant(rhs))
                        else {
                            continue;
                        };
                        Self::fold(program, id, i64::from(op.evaluate(a, b)));
                        stats.folded += 1;
                    }
                    InstructionKind::Branch {
                        condition,
                        on_true,
                        on_false,
                    } => {
                        let Some(value) = program.constant(condition) else {
                            continue;
                        };
                        let (taken, dropped) = if value != 0 {
                            (on_true, on_false)
                        } else {
                            (on_false, on_true)
                        };
                        program.rewrite_as_jump(id, taken);
                        program.unlink(block, dropped);
                        stats.simplified_branches += 1;
                    }
                    _ => {}
                }
            }
        }

        Ok(stats)
    }

    /// Replaces `old` with a new constant spliced in at its position
    fn fold(program: &mut Program, old: ValueId, value: i64) {
        let line = program.instruction(old).line;
        let constant = program.create_detached(InstructionKind::Const(value), line);
        program.splice_before(old, constant);
        program.replace(old, constant);
        program.remove_instruction(old);
    }
}
