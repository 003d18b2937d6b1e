//! # SSA Program Verifier
//!
//! Checks the structural invariants of a constructed (and possibly
//! optimized) program: block edges, dominator pointers, terminators, phi
//! arity and use-list soundness.

use super::ir::{BlockId, InstructionKind, Program, ValueId};
use std::collections::BTreeSet;

/// Verification result with warnings
#[derive(Debug)]
pub struct VerifyResult {
    /// Program satisfies every invariant
    pub valid: bool,
    /// Invariant violations
    pub errors: Vec<VerifyError>,
    /// Warnings (non-fatal)
    pub warnings: Vec<String>,
    /// Statistics
    pub stats: ProgramStats,
}

/// Program statistics
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProgramStats {
    /// Number of methods
    pub method_count: usize,
    /// Number of live blocks
    pub block_count: usize,
    /// Number of attached instructions, phis included
    pub instruction_count: usize,
    /// Number of phis
    pub phi_count: usize,
}

/// Verification error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The entry block has incoming edges.
    EntryHasPredecessors {
        /// Method name
        method: String,
    },

    /// The method has no exit block.
    MissingExit {
        /// Method name
        method: String,
    },

    /// The exit block has outgoing edges.
    ExitHasSuccessors {
        /// Method name
        method: String,
    },

    /// An edge is recorded on only one of its endpoints.
    AsymmetricEdge {
        /// Source block
        from: BlockId,
        /// Target block
        to: BlockId,
    },

    /// A non-entry block has no dominator.
    MissingDominator {
        /// Block without a dominator
        block: BlockId,
    },

    /// A block does not end in exactly one terminator.
    BadTerminator {
        /// Offending block
        block: BlockId,
    },

    /// The terminator's targets differ from the successor list.
    TargetMismatch {
        /// Offending block
        block: BlockId,
    },

    /// A phi's operand count differs from its block's predecessor count.
    PhiArity {
        /// The phi
        phi: ValueId,
        /// Operand pairs present
        operands: usize,
        /// Predecessors of the owning block
        predecessors: usize,
    },

    /// An instruction listed in a block names a different owner.
    WrongOwner {
        /// The instruction
        value: ValueId,
        /// Block listing it
        block: BlockId,
    },

    /// An operand is missing the reading instruction from its use-list.
    MissingUse {
        /// The operand
        value: ValueId,
        /// Instruction reading it
        user: ValueId,
    },

    /// A use-list names an instruction that does not read the value.
    StaleUse {
        /// The value
        value: ValueId,
        /// Listed user
        user: ValueId,
    },

    /// An instruction reads a value that is no longer in any block.
    DetachedOperand {
        /// Instruction reading it
        user: ValueId,
        /// The detached operand
        operand: ValueId,
    },
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::EntryHasPredecessors { method } => {
                write!(f, "Entry block of `{}` has predecessors", method)
            }
            VerifyError::MissingExit { method } => write!(f, "`{}` has no exit block", method),
            VerifyError::ExitHasSuccessors { method } => {
                write!(f, "Exit block of `{}` has successors", method)
            }
            VerifyError::AsymmetricEdge { from, to } => {
                write!(f, "Edge {} -> {} is recorded on one side only", from, to)
            }
            VerifyError::MissingDominator { block } => write!(f, "{} has no dominator", block),
            VerifyError::BadTerminator { block } => {
                write!(f, "{} does not end in exactly one terminator", block)
            }
            VerifyError::TargetMismatch { block } => {
                write!(f, "Terminator targets of {} differ from its successors", block)
            }
            VerifyError::PhiArity {
                phi,
                operands,
                predecessors,
            } => write!(
                f,
                "Phi {} has {} operand(s) for {} predecessor(s)",
                phi, operands, predecessors
            ),
            VerifyError::WrongOwner { value, block } => {
                write!(f, "{} is listed in {} but owned elsewhere", value, block)
            }
            VerifyError::MissingUse { value, user } => {
                write!(f, "{} reads {} but is not in its use-list", user, value)
            }
            VerifyError::StaleUse { value, user } => {
                write!(f, "Use-list of {} names {} which does not read it", value, user)
            }
            VerifyError::DetachedOperand { user, operand } => {
                write!(f, "{} reads detached value {}", user, operand)
            }
        }
    }
}

/// SSA program verifier
pub struct Verifier {
    /// Strict mode (treat warnings as errors)
    strict: bool,
}

impl Verifier {
    /// Creates a verifier that reports unreachable blocks as warnings
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// Enable strict mode
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Verify a program
    pub fn verify(&self, program: &Program) -> VerifyResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut stats = ProgramStats {
            method_count: program.methods.len(),
            ..ProgramStats::default()
        };

        for method in &program.methods {
            let entry = program.block(method.entry);
            if !entry.predecessors.is_empty() {
                errors.push(VerifyError::EntryHasPredecessors {
                    method: method.name.clone(),
                });
            }
            match method.exit {
                None => errors.push(VerifyError::MissingExit {
                    method: method.name.clone(),
                }),
                Some(exit) if !program.block(exit).successors.is_empty() => {
                    errors.push(VerifyError::ExitHasSuccessors {
                        method: method.name.clone(),
                    })
                }
                Some(_) => {}
            }

            let reachable: BTreeSet<BlockId> =
                program.reachable_blocks(method.id).into_iter().collect();
            for block in program.method_blocks(method.id) {
                stats.block_count += 1;
                if !reachable.contains(&block.id) {
                    warnings.push(format!("{} in `{}` is unreachable", block.id, method.name));
                }
                self.check_block(program, block.id, &mut errors, &mut stats);
            }
        }

        let valid = errors.is_empty() && (!self.strict || warnings.is_empty());

        VerifyResult {
            valid,
            errors,
            warnings,
            stats,
        }
    }

    fn check_block(
        &self,
        program: &Program,
        id: BlockId,
        errors: &mut Vec<VerifyError>,
        stats: &mut ProgramStats,
    ) {
        let block = program.block(id);

        for succ in &block.successors {
            if !program.block(*succ).predecessors.contains(&id) {
                errors.push(VerifyError::AsymmetricEdge { from: id, to: *succ });
            }
        }
        for pred in &block.predecessors {
            if !program.block(*pred).successors.contains(&id) {
                errors.push(VerifyError::AsymmetricEdge { from: *pred, to: id });
            }
        }
        if !block.is_entry() && block.dominator.is_none() {
            errors.push(VerifyError::MissingDominator { block: id });
        }

        // Exactly one terminator, in last position, agreeing with the edges.
        let terminators = block
            .instructions
            .iter()
            .filter(|v| program.instruction(**v).kind.is_terminator())
            .count();
        let last = block.last_instruction().map(|v| &program.instruction(v).kind);
        match last {
            Some(kind) if terminators == 1 && kind.is_terminator() => {
                let targets: BTreeSet<BlockId> = match kind {
                    InstructionKind::Branch {
                        on_true, on_false, ..
                    } => [*on_true, *on_false].into_iter().collect(),
                    InstructionKind::Jump { target } => [*target].into_iter().collect(),
                    _ => BTreeSet::new(),
                };
                let successors: BTreeSet<BlockId> = block.successors.iter().copied().collect();
                if targets != successors {
                    errors.push(VerifyError::TargetMismatch { block: id });
                }
            }
            _ => errors.push(VerifyError::BadTerminator { block: id }),
        }

        for phi in &block.phis {
            stats.phi_count += 1;
            if let InstructionKind::Phi { operands, .. } = &program.instruction(*phi).kind {
                if operands.len() != block.predecessors.len() {
                    errors.push(VerifyError::PhiArity {
                        phi: *phi,
                        operands: operands.len(),
                        predecessors: block.predecessors.len(),
                    });
                }
            }
        }

        for value in block.all_instructions() {
            stats.instruction_count += 1;
            let instruction = program.instruction(value);
            if instruction.block != Some(id) {
                errors.push(VerifyError::WrongOwner { value, block: id });
            }
            for operand in instruction.kind.operands() {
                let defining = program.instruction(operand);
                if defining.block.is_none() {
                    errors.push(VerifyError::DetachedOperand {
                        user: value,
                        operand,
                    });
                }
                if !defining.users.contains(&value) {
                    errors.push(VerifyError::MissingUse {
                        value: operand,
                        user: value,
                    });
                }
            }
            for user in &instruction.users {
                if !program.instruction(*user).kind.operands().contains(&value) {
                    errors.push(VerifyError::StaleUse {
                        value,
                        user: *user,
                    });
                }
            }
        }
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Verifies a program with the default (non-strict) settings
pub fn verify(program: &Program) -> VerifyResult {
    Verifier::new().verify(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{BlockKind, MethodKind};

    fn minimal() -> (Program, BlockId, BlockId) {
        let mut program = Program::new();
        let main = program.add_method("main", MethodKind::Main);
        let entry = program.method(main).entry;
        let exit = program.new_block(main, BlockKind::Exit);
        program.method_mut(main).exit = Some(exit);
        program.emit(entry, InstructionKind::Jump { target: exit }, 1);
        program.link(entry, exit);
        program.set_dominator(exit, entry);
        program.emit(exit, InstructionKind::Return { value: None }, 1);
        (program, entry, exit)
    }

    #[test]
    fn test_minimal_program_is_valid() {
        let (program, _, _) = minimal();
        let result = verify(&program);

        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
        assert_eq!(result.stats.block_count, 2);
        assert_eq!(result.stats.instruction_count, 2);
    }

    #[test]
    fn test_missing_dominator() {
        let (mut program, _, exit) = minimal();
        program.block_mut(exit).dominator = None;

        let result = verify(&program);
        assert!(!result.valid);
        assert_eq!(result.errors, vec![VerifyError::MissingDominator { block: exit }]);
    }

    #[test]
    fn test_asymmetric_edge() {
        let (mut program, entry, exit) = minimal();
        program.block_mut(exit).predecessors.clear();

        let result = verify(&program);
        assert!(result
            .errors
            .contains(&VerifyError::AsymmetricEdge { from: entry, to: exit }));
    }

    #[test]
    fn test_phi_arity_mismatch() {
        let (mut program, entry, _) = minimal();
        let main = program.methods[0].id;
        let join = program.new_block(main, BlockKind::Join { loop_header: false });
        program.set_dominator(join, entry);
        let zero = program.create_detached(InstructionKind::Const(0), 1);
        program.splice_before(program.block(entry).instructions[0], zero);
        let phi = program.add_phi(join, "x", vec![(entry, zero)], 1);
        program.emit(join, InstructionKind::Return { value: None }, 1);

        let result = verify(&program);
        assert!(result.errors.contains(&VerifyError::PhiArity {
            phi,
            operands: 1,
            predecessors: 0
        }));
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_strict_rejects_unreachable_blocks() {
        let (mut program, entry, _) = minimal();
        let main = program.methods[0].id;
        let stray = program.new_block(main, BlockKind::Plain);
        program.set_dominator(stray, entry);
        program.emit(stray, InstructionKind::Return { value: None }, 1);

        assert!(verify(&program).valid);
        assert!(!Verifier::new().strict().verify(&program).valid);
    }
}
