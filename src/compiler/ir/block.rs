//! Basic blocks of the SSA control-flow graph

use super::ids::{BlockId, MethodId, ValueId};
use super::state::State;

/// Block variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Method entry, holds the formal-parameter values
    Entry {
        /// Parameter values in declaration order
        parameters: Vec<ValueId>,
    },
    /// Straight-line block
    Plain,
    /// Merge point of an `if` or the header of a `while`
    Join {
        /// Whether this join heads a loop
        loop_header: bool,
    },
    /// Single exit of a method, holds the return instruction
    Exit,
}

/// Basic block in the control flow graph
#[derive(Debug, Clone)]
pub struct Block {
    /// Block identity
    pub id: BlockId,
    /// Owning method
    pub method: MethodId,
    /// Variant
    pub kind: BlockKind,
    /// Phi instructions (join and exit blocks only)
    pub phis: Vec<ValueId>,
    /// Ordinary instructions in execution order
    pub instructions: Vec<ValueId>,
    /// Blocks with an edge into this one, in link order
    pub predecessors: Vec<BlockId>,
    /// Blocks this one branches to, in link order
    pub successors: Vec<BlockId>,
    /// Bindings live on entry
    pub begin_state: Option<State>,
    /// Bindings live when control leaves the block
    pub end_state: Option<State>,
    /// Immediate dominator, `None` only for the entry block
    pub dominator: Option<BlockId>,
}

impl Block {
    /// Create a new empty block
    pub fn new(id: BlockId, method: MethodId, kind: BlockKind) -> Self {
        Self {
            id,
            method,
            kind,
            phis: Vec::new(),
            instructions: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            begin_state: None,
            end_state: None,
            dominator: None,
        }
    }

    /// Whether this is a join block
    pub fn is_join(&self) -> bool {
        matches!(self.kind, BlockKind::Join { .. })
    }

    /// Whether this is a loop header
    pub fn is_loop_header(&self) -> bool {
        matches!(self.kind, BlockKind::Join { loop_header: true })
    }

    /// Whether this is the method exit
    pub fn is_exit(&self) -> bool {
        matches!(self.kind, BlockKind::Exit)
    }

    /// Whether this is the method entry
    pub fn is_entry(&self) -> bool {
        matches!(self.kind, BlockKind::Entry { .. })
    }

    /// Whether the end-state has been recorded
    pub fn is_sealed(&self) -> bool {
        self.end_state.is_some()
    }

    /// Last ordinary instruction
    pub fn last_instruction(&self) -> Option<ValueId> {
        self.instructions.last().copied()
    }

    /// Phis followed by ordinary instructions
    pub fn all_instructions(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.phis.iter().chain(self.instructions.iter()).copied()
    }

    /// Short label used by dumps and graph output
    pub fn label(&self) -> String {
        let tag = match self.kind {
            BlockKind::Entry { .. } => "entry",
            BlockKind::Plain => "block",
            BlockKind::Join { loop_header: true } => "loop",
            BlockKind::Join { loop_header: false } => "join",
            BlockKind::Exit => "exit",
        };
        format!("{}{}", tag, self.id.0)
    }

    pub(crate) fn add_successor(&mut self, to: BlockId) {
        if !self.successors.contains(&to) {
            self.successors.push(to);
        }
    }

    pub(crate) fn add_predecessor(&mut self, from: BlockId) {
        if !self.predecessors.contains(&from) {
            self.predecessors.push(from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_are_deduplicated() {
        let mut block = Block::new(BlockId(1), MethodId(0), BlockKind::Plain);
        block.add_successor(BlockId(2));
        block.add_successor(BlockId(2));
        block.add_predecessor(BlockId(0));
        block.add_predecessor(BlockId(0));

        assert_eq!(block.successors, vec![BlockId(2)]);
        assert_eq!(block.predecessors, vec![BlockId(0)]);
    }

    #[test]
    fn test_labels() {
        let header = Block::new(BlockId(3), MethodId(0), BlockKind::Join { loop_header: true });
        assert!(header.is_join());
        assert!(header.is_loop_header());
        assert_eq!(header.label(), "loop3");

        let exit = Block::new(BlockId(7), MethodId(0), BlockKind::Exit);
        assert!(exit.is_exit());
        assert!(!exit.is_sealed());
        assert_eq!(exit.label(), "exit7");
    }
}
