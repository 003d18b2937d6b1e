//! Build context threaded through the SSA-constructing parser

use crate::compiler::ir::{BlockId, MethodId, State};

/// Where the parser is emitting code and what each name currently holds
///
/// Every parsing routine receives the context it starts in and hands back the
/// context control falls out of. Forking for a branch is a plain clone with a
/// new block; merging happens only when entering a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Method under construction
    pub method: MethodId,
    /// Block receiving new instructions
    pub block: BlockId,
    /// Current bindings
    pub state: State,
    /// Whether the block can be reached from the method entry
    pub reachable: bool,
}

impl BuildContext {
    /// Context at the start of a reachable block
    pub fn new(method: MethodId, block: BlockId, state: State) -> Self {
        Self {
            method,
            block,
            state,
            reachable: true,
        }
    }

    /// Copy of this context continuing in `block`
    pub fn fork(&self, block: BlockId) -> Self {
        Self {
            method: self.method,
            block,
            state: self.state.clone(),
            reachable: self.reachable,
        }
    }
}

/// How control left a block that jumps to a merge point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEnd {
    /// The block that jumps
    pub block: BlockId,
    /// Its end-state
    pub state: State,
    /// Whether the edge was actually linked
    pub reachable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::ValueId;

    #[test]
    fn test_fork_copies_state() {
        let mut state = State::new();
        state.bind("x", ValueId(0));
        let mut ctx = BuildContext::new(MethodId(0), BlockId(0), state);
        ctx.reachable = false;

        let mut branch = ctx.fork(BlockId(4));
        branch.state.bind("x", ValueId(9));

        assert_eq!(branch.block, BlockId(4));
        assert!(!branch.reachable);
        assert_eq!(ctx.state.get("x"), Some(ValueId(0)));
    }
}
