//! Dominator tree derived from per-block dominator pointers
//!
//! The parser assigns each block's immediate dominator structurally while it
//! builds the CFG. This module only indexes those pointers and answers the
//! common-dominator query used when a method has several return paths.

use crate::compiler::ir::{BlockId, MethodId, Program};
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Mapping from a block to the blocks it immediately dominates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DominatorTree {
    root: Option<BlockId>,
    children: BTreeMap<BlockId, Vec<BlockId>>,
}

impl DominatorTree {
    /// Scans every block of `method` and records one edge per dominator
    /// pointer
    pub fn build(program: &Program, method: MethodId) -> Self {
        let mut tree = DominatorTree {
            root: Some(program.method(method).entry),
            children: BTreeMap::new(),
        };
        for block in program.method_blocks(method) {
            if let Some(dominator) = block.dominator {
                tree.children.entry(dominator).or_default().push(block.id);
            }
        }
        tree
    }

    /// The method's entry block
    pub fn root(&self) -> Option<BlockId> {
        self.root
    }

    /// Blocks immediately dominated by `block`, in creation order
    pub fn children(&self, block: BlockId) -> &[BlockId] {
        self.children.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All (dominator, dominated) pairs
    pub fn edges(&self) -> impl Iterator<Item = (BlockId, BlockId)> + '_ {
        self.children
            .iter()
            .flat_map(|(parent, kids)| kids.iter().map(move |kid| (*parent, *kid)))
    }

    /// Blocks in depth-first preorder from the root
    pub fn preorder(&self) -> Vec<BlockId> {
        let mut order = Vec::new();
        let mut stack: Vec<BlockId> = self.root.into_iter().collect();
        while let Some(block) = stack.pop() {
            order.push(block);
            stack.extend(self.children(block).iter().rev());
        }
        order
    }
}

/// Whether `a` appears on the dominator-pointer chain of `b` (including `b`)
pub fn dominates(program: &Program, a: BlockId, b: BlockId) -> bool {
    let limit = program.method(program.block(b).method).blocks.len() + 1;
    let mut current = Some(b);
    for _ in 0..limit {
        match current {
            Some(block) if block == a => return true,
            Some(block) => current = program.block(block).dominator,
            None => return false,
        }
    }
    false
}

/// Nearest block dominating every block in `blocks`
///
/// Starts at the first block's dominator and walks upward until a candidate
/// dominates the whole set.
pub fn common_dominator(program: &Program, method: MethodId, blocks: &[BlockId]) -> Result<BlockId> {
    let name = &program.method(method).name;
    let Some(first) = blocks.first() else {
        return Err(Error::NoCommonDominator {
            method: name.clone(),
            reason: "empty block set".to_string(),
        });
    };

    let limit = program.method(method).blocks.len() + 1;
    let mut candidate = program.block(*first).dominator;
    for _ in 0..limit {
        let Some(block) = candidate else {
            break;
        };
        if blocks.iter().all(|b| dominates(program, block, *b)) {
            return Ok(block);
        }
        candidate = program.block(block).dominator;
    }

    Err(Error::NoCommonDominator {
        method: name.clone(),
        reason: format!("dominator chain of {} exhausted", first),
    })
}
