//! SSA instruction definitions

use super::ids::{BlockId, ValueId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComputeOp {
    /// lhs + rhs
    Add,
    /// lhs - rhs
    Sub,
    /// lhs * rhs
    Mul,
    /// lhs / rhs, truncating toward zero
    Div,
}

impl ComputeOp {
    /// Evaluates the operator on two constants
    ///
    /// Arithmetic wraps on overflow. Returns `None` for division by zero.
    pub fn evaluate(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            ComputeOp::Add => Some(lhs.wrapping_add(rhs)),
            ComputeOp::Sub => Some(lhs.wrapping_sub(rhs)),
            ComputeOp::Mul => Some(lhs.wrapping_mul(rhs)),
            ComputeOp::Div if rhs == 0 => None,
            ComputeOp::Div => Some(lhs.wrapping_div(rhs)),
        }
    }

    /// Mnemonic used by the IR dump
    pub fn mnemonic(self) -> &'static str {
        match self {
            ComputeOp::Add => "add",
            ComputeOp::Sub => "sub",
            ComputeOp::Mul => "mul",
            ComputeOp::Div => "div",
        }
    }
}

/// Relational operator, result is 1 or 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// lhs == rhs
    Eq,
    /// lhs != rhs
    Ne,
    /// lhs < rhs
    Lt,
    /// lhs <= rhs
    Le,
    /// lhs > rhs
    Gt,
    /// lhs >= rhs
    Ge,
}

impl CompareOp {
    /// Evaluates the comparison on two constants
    pub fn evaluate(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }

    /// Mnemonic used by the IR dump
    pub fn mnemonic(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
        }
    }
}

/// The closed set of SSA instruction kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionKind {
    // Values
    /// Integer constant
    Const(i64),
    /// Formal parameter of the enclosing method
    Param {
        /// Parameter name
        name: String,
        /// Position in the parameter list
        index: usize,
    },
    /// Merge value owned by a join or exit block
    Phi {
        /// Variable the phi merges
        variable: String,
        /// One (predecessor, incoming value) pair per incoming edge
        operands: Vec<(BlockId, ValueId)>,
    },

    // Arithmetic
    /// dst = lhs op rhs
    Compute {
        /// Operator
        op: ComputeOp,
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },
    /// dst = (lhs op rhs) as 1/0
    Compare {
        /// Operator
        op: CompareOp,
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },

    // Memory
    /// Load a global scalar from named storage
    LoadGlobal {
        /// Global name
        name: String,
    },
    /// Store a value into named global storage
    StoreGlobal {
        /// Global name
        name: String,
        /// Stored value
        value: ValueId,
    },
    /// Reserve storage for an array
    DeclareArray {
        /// Array name
        name: String,
        /// Declared dimension sizes, outermost first
        dimensions: Vec<i64>,
    },
    /// Base address of a named array
    ArrayBase {
        /// Array name
        name: String,
    },
    /// Element address: base + flattened offset
    Index {
        /// Array base address
        base: ValueId,
        /// Linear element offset
        offset: ValueId,
    },
    /// dst = *address
    Load {
        /// Element address
        address: ValueId,
    },
    /// *address = value
    Store {
        /// Element address
        address: ValueId,
        /// Stored value
        value: ValueId,
    },

    // Calls and I/O
    /// Call a user method
    Call {
        /// Callee name
        callee: String,
        /// Arguments in source order
        arguments: Vec<ValueId>,
    },
    /// Read one integer from input
    Read,
    /// Print one integer
    Write {
        /// Printed value
        value: ValueId,
    },
    /// Print a line break
    WriteLine,

    // Control flow
    /// Conditional branch on a 1/0 value
    Branch {
        /// Condition value
        condition: ValueId,
        /// Target when the condition is non-zero
        on_true: BlockId,
        /// Target when the condition is zero
        on_false: BlockId,
    },
    /// Unconditional branch
    Jump {
        /// Target block
        target: BlockId,
    },
    /// Return from the method, with a value for functions
    Return {
        /// Returned value
        value: Option<ValueId>,
    },
}

impl InstructionKind {
    /// Values read by this instruction, in operand order
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            InstructionKind::Phi { operands, .. } => operands.iter().map(|(_, v)| *v).collect(),
            InstructionKind::Compute { lhs, rhs, .. } | InstructionKind::Compare { lhs, rhs, .. } => {
                vec![*lhs, *rhs]
            }
            InstructionKind::StoreGlobal { value, .. } | InstructionKind::Write { value } => {
                vec![*value]
            }
            InstructionKind::Index { base, offset } => vec![*base, *offset],
            InstructionKind::Load { address } => vec![*address],
            InstructionKind::Store { address, value } => vec![*address, *value],
            InstructionKind::Call { arguments, .. } => arguments.clone(),
            InstructionKind::Branch { condition, .. } => vec![*condition],
            InstructionKind::Return { value } => value.iter().copied().collect(),
            InstructionKind::Const(_)
            | InstructionKind::Param { .. }
            | InstructionKind::LoadGlobal { .. }
            | InstructionKind::DeclareArray { .. }
            | InstructionKind::ArrayBase { .. }
            | InstructionKind::Read
            | InstructionKind::WriteLine
            | InstructionKind::Jump { .. } => Vec::new(),
        }
    }

    /// Substitutes `new` for every operand slot holding `old`
    ///
    /// Returns `true` if at least one slot changed.
    pub fn replace_operand(&mut self, old: ValueId, new: ValueId) -> bool {
        let mut changed = false;
        let mut swap = |slot: &mut ValueId| {
            if *slot == old {
                *slot = new;
                changed = true;
            }
        };

        match self {
            InstructionKind::Phi { operands, .. } => {
                operands.iter_mut().for_each(|(_, v)| swap(v));
            }
            InstructionKind::Compute { lhs, rhs, .. } | InstructionKind::Compare { lhs, rhs, .. } => {
                swap(lhs);
                swap(rhs);
            }
            InstructionKind::StoreGlobal { value, .. } | InstructionKind::Write { value } => {
                swap(value)
            }
            InstructionKind::Index { base, offset } => {
                swap(base);
                swap(offset);
            }
            InstructionKind::Load { address } => swap(address),
            InstructionKind::Store { address, value } => {
                swap(address);
                swap(value);
            }
            InstructionKind::Call { arguments, .. } => arguments.iter_mut().for_each(swap),
            InstructionKind::Branch { condition, .. } => swap(condition),
            InstructionKind::Return { value } => {
                if let Some(value) = value {
                    swap(value)
                }
            }
            InstructionKind::Const(_)
            | InstructionKind::Param { .. }
            | InstructionKind::LoadGlobal { .. }
            | InstructionKind::DeclareArray { .. }
            | InstructionKind::ArrayBase { .. }
            | InstructionKind::Read
            | InstructionKind::WriteLine
            | InstructionKind::Jump { .. } => {}
        }

        changed
    }

    /// Whether the instruction defines a value other instructions may use
    pub fn has_value(&self) -> bool {
        !matches!(
            self,
            InstructionKind::StoreGlobal { .. }
                | InstructionKind::DeclareArray { .. }
                | InstructionKind::Store { .. }
                | InstructionKind::Write { .. }
                | InstructionKind::WriteLine
                | InstructionKind::Branch { .. }
                | InstructionKind::Jump { .. }
                | InstructionKind::Return { .. }
        )
    }

    /// Whether the instruction ends its block
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstructionKind::Branch { .. }
                | InstructionKind::Jump { .. }
                | InstructionKind::Return { .. }
        )
    }

    /// The constant this instruction defines, if any
    pub fn as_constant(&self) -> Option<i64> {
        match self {
            InstructionKind::Const(value) => Some(*value),
            _ => None,
        }
    }
}

/// An SSA value together with its bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Global identity
    pub id: ValueId,
    /// What the instruction computes
    pub kind: InstructionKind,
    /// Owning block, `None` while detached
    pub block: Option<BlockId>,
    /// Source line that produced the instruction
    pub line: usize,
    /// Instructions that read this value, without duplicates
    pub users: Vec<ValueId>,
}

impl Instruction {
    /// Creates an instruction with an empty use-list
    pub fn new(id: ValueId, kind: InstructionKind, block: Option<BlockId>, line: usize) -> Self {
        Self {
            id,
            kind,
            block,
            line,
            users: Vec::new(),
        }
    }

    /// Whether the instruction is a phi
    pub fn is_phi(&self) -> bool {
        matches!(self.kind, InstructionKind::Phi { .. })
    }
}

impl fmt::Display for ComputeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_evaluate() {
        assert_eq!(ComputeOp::Add.evaluate(2, 3), Some(5));
        assert_eq!(ComputeOp::Sub.evaluate(2, 3), Some(-1));
        assert_eq!(ComputeOp::Mul.evaluate(-4, 3), Some(-12));
        assert_eq!(ComputeOp::Div.evaluate(-7, 2), Some(-3));
        assert_eq!(ComputeOp::Div.evaluate(7, 0), None);
        assert_eq!(ComputeOp::Add.evaluate(i64::MAX, 1), Some(i64::MIN));
    }

    #[test]
    fn test_compare_evaluate() {
        assert!(CompareOp::Le.evaluate(3, 3));
        assert!(!CompareOp::Lt.evaluate(3, 3));
        assert!(CompareOp::Gt.evaluate(4, 3));
        assert!(CompareOp::Ne.evaluate(4, 3));
    }

    #[test]
    fn test_replace_operand_hits_every_slot() {
        let (a, b) = (ValueId(1), ValueId(2));
        let mut kind = InstructionKind::Compute {
            op: ComputeOp::Mul,
            lhs: a,
            rhs: a,
        };

        assert!(kind.replace_operand(a, b));
        assert_eq!(kind.operands(), vec![b, b]);
        assert!(!kind.replace_operand(a, b));
    }

    #[test]
    fn test_phi_operands() {
        let kind = InstructionKind::Phi {
            variable: "x".to_string(),
            operands: vec![(BlockId(0), ValueId(3)), (BlockId(4), ValueId(7))],
        };
        assert_eq!(kind.operands(), vec![ValueId(3), ValueId(7)]);
        assert!(kind.has_value());
        assert!(!kind.is_terminator());
    }
}
