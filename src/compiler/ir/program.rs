//! Program, method and arena bookkeeping for the SSA graph

use super::block::{Block, BlockKind};
use super::ids::{BlockId, MethodId, ValueId};
use super::instruction::{Instruction, InstructionKind};
use super::state::State;
use super::symbols::SymbolTable;
use crate::compiler::dominator::DominatorTree;
use std::collections::BTreeSet;

/// Method flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// The synthetic method holding the computation's body
    Main,
    /// Returns a value
    Function,
    /// Returns nothing
    Procedure,
}

/// A method: its own CFG of blocks plus local symbols
#[derive(Debug, Clone)]
pub struct Method {
    /// Method identity
    pub id: MethodId,
    /// Declared name (`main` for the computation body)
    pub name: String,
    /// Main, function or procedure
    pub kind: MethodKind,
    /// Owned blocks in creation order
    pub blocks: Vec<BlockId>,
    /// Parameters and locals
    pub symbols: SymbolTable,
    /// Number of formal parameters
    pub arity: usize,
    /// Entry block
    pub entry: BlockId,
    /// Exit block, set once the body has been parsed
    pub exit: Option<BlockId>,
    pub(crate) dominator_tree: Option<DominatorTree>,
}

impl Method {
    /// Whether calls to this method produce a value
    pub fn returns_value(&self) -> bool {
        self.kind == MethodKind::Function
    }
}

/// Complete SSA program
///
/// Instructions and blocks live in program-wide arenas and reference each
/// other by index. Every instruction keeps a deduplicated use-list that is
/// updated by each mutation going through this type.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Methods, `main` first
    pub methods: Vec<Method>,
    /// Global symbols declared by `main`
    pub globals: SymbolTable,
    values: Vec<Instruction>,
    blocks: Vec<Block>,
}

impl Program {
    /// Create a new empty program
    pub fn new() -> Self {
        Self::default()
    }

    // ---- methods ----

    /// Registers a method together with its entry block
    pub fn add_method(&mut self, name: impl Into<String>, kind: MethodKind) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        let entry = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(
            entry,
            id,
            BlockKind::Entry {
                parameters: Vec::new(),
            },
        ));
        self.methods.push(Method {
            id,
            name: name.into(),
            kind,
            blocks: vec![entry],
            symbols: SymbolTable::new(),
            arity: 0,
            entry,
            exit: None,
            dominator_tree: None,
        });
        id
    }

    /// Method by id
    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.index()]
    }

    pub(crate) fn method_mut(&mut self, id: MethodId) -> &mut Method {
        &mut self.methods[id.index()]
    }

    /// Method by declared name
    pub fn method_by_name(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// The synthetic `main` method
    pub fn main(&self) -> Option<&Method> {
        self.methods.iter().find(|m| m.kind == MethodKind::Main)
    }

    // ---- blocks ----

    /// Creates a block and registers it with its method
    pub fn new_block(&mut self, method: MethodId, kind: BlockKind) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(id, method, kind));
        let method = self.method_mut(method);
        method.blocks.push(id);
        method.dominator_tree = None;
        id
    }

    /// Block by id
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// Blocks of a method in creation order
    pub fn method_blocks(&self, method: MethodId) -> impl Iterator<Item = &Block> + '_ {
        self.method(method).blocks.iter().map(|b| self.block(*b))
    }

    /// Adds the edge `from -> to` to both endpoint lists
    pub fn link(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).add_successor(to);
        self.block_mut(to).add_predecessor(from);
        self.invalidate_dominators(from);
    }

    /// Removes the edge `from -> to` from both endpoint lists
    ///
    /// Phi operands flowing in along the edge are dropped so every phi of
    /// `to` keeps one operand per remaining predecessor.
    pub fn unlink(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).successors.retain(|b| *b != to);
        self.block_mut(to).predecessors.retain(|b| *b != from);

        for phi in self.block(to).phis.clone() {
            if let InstructionKind::Phi { operands, .. } = &self.values[phi.index()].kind {
                let kept: Vec<_> = operands.iter().copied().filter(|(b, _)| *b != from).collect();
                self.set_phi_operands(phi, kept);
            }
        }
        self.invalidate_dominators(from);
    }

    /// Records the bindings live on entry to `block`
    pub fn set_begin_state(&mut self, block: BlockId, state: State) {
        self.block_mut(block).begin_state = Some(state);
    }

    /// Records the bindings live when control leaves `block`
    pub fn seal(&mut self, block: BlockId, state: State) {
        let block = self.block_mut(block);
        debug_assert!(block.end_state.is_none(), "{} sealed twice", block.id);
        block.end_state = Some(state);
    }

    /// Sets the immediate dominator of `block`
    pub fn set_dominator(&mut self, block: BlockId, dominator: BlockId) {
        self.block_mut(block).dominator = Some(dominator);
        self.invalidate_dominators(block);
    }

    /// Blocks reachable from the method entry, in depth-first preorder
    pub fn reachable_blocks(&self, method: MethodId) -> Vec<BlockId> {
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        let mut stack = vec![self.method(method).entry];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            for succ in self.block(id).successors.iter().rev() {
                if !seen.contains(succ) {
                    stack.push(*succ);
                }
            }
        }
        order
    }

    /// Drops a block from its method, detaching its instructions and edges
    pub fn remove_block(&mut self, id: BlockId) {
        let block = self.block(id).clone();
        for value in block.all_instructions() {
            self.unregister_uses(value);
            let instruction = &mut self.values[value.index()];
            instruction.block = None;
            instruction.users.clear();
        }
        for succ in &block.successors {
            self.unlink(id, *succ);
        }
        for pred in &block.predecessors {
            self.unlink(*pred, id);
        }

        let removed = self.block_mut(id);
        removed.phis.clear();
        removed.instructions.clear();
        let method = self.method_mut(block.method);
        method.blocks.retain(|b| *b != id);
        method.dominator_tree = None;
    }

    /// Removes every block the entry cannot reach; returns how many went
    pub fn prune_unreachable(&mut self, method: MethodId) -> usize {
        let live: BTreeSet<BlockId> = self.reachable_blocks(method).into_iter().collect();
        let dead: Vec<BlockId> = self
            .method(method)
            .blocks
            .iter()
            .copied()
            .filter(|b| !live.contains(b))
            .collect();

        for block in &dead {
            self.remove_block(*block);
        }
        dead.len()
    }

    fn invalidate_dominators(&mut self, block: BlockId) {
        let method = self.block(block).method;
        self.method_mut(method).dominator_tree = None;
    }

    /// Dominator tree of a method, rebuilt if the CFG changed since the last
    /// request
    pub fn dominator_tree(&mut self, method: MethodId) -> &DominatorTree {
        let tree = match self.method_mut(method).dominator_tree.take() {
            Some(tree) => tree,
            None => DominatorTree::build(self, method),
        };
        self.method_mut(method).dominator_tree.insert(tree)
    }

    // ---- values ----

    /// Instruction by id
    pub fn instruction(&self, id: ValueId) -> &Instruction {
        &self.values[id.index()]
    }

    /// Number of values ever created
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Every instruction ever created, including detached ones
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.values.iter()
    }

    /// Constant defined by `id`, if it is one
    pub fn constant(&self, id: ValueId) -> Option<i64> {
        self.instruction(id).kind.as_constant()
    }

    /// Creates an instruction at the end of `block`
    pub fn emit(&mut self, block: BlockId, kind: InstructionKind, line: usize) -> ValueId {
        debug_assert!(
            !self.block(block).is_sealed(),
            "append to sealed block {}",
            block
        );
        let id = self.allocate(kind, Some(block), line);
        self.block_mut(block).instructions.push(id);
        id
    }

    /// Creates an instruction owned by no block
    pub fn create_detached(&mut self, kind: InstructionKind, line: usize) -> ValueId {
        self.allocate(kind, None, line)
    }

    /// Creates a phi in the phi list of a join or exit block
    pub fn add_phi(
        &mut self,
        block: BlockId,
        variable: impl Into<String>,
        operands: Vec<(BlockId, ValueId)>,
        line: usize,
    ) -> ValueId {
        debug_assert!(
            matches!(self.block(block).kind, BlockKind::Join { .. } | BlockKind::Exit),
            "phi outside a merge block"
        );
        let kind = InstructionKind::Phi {
            variable: variable.into(),
            operands,
        };
        let id = self.allocate(kind, Some(block), line);
        self.block_mut(block).phis.push(id);
        id
    }

    /// Records a formal-parameter value on the entry block
    pub(crate) fn add_parameter(&mut self, block: BlockId, value: ValueId) {
        if let BlockKind::Entry { parameters } = &mut self.block_mut(block).kind {
            parameters.push(value);
        }
    }

    /// Rewrites a phi's operand list, keeping use-lists consistent
    pub fn set_phi_operands(&mut self, phi: ValueId, new_operands: Vec<(BlockId, ValueId)>) {
        self.unregister_uses(phi);
        if let InstructionKind::Phi { operands, .. } = &mut self.values[phi.index()].kind {
            *operands = new_operands;
        }
        self.register_uses(phi);
    }

    /// Inserts a detached instruction right before `anchor`
    pub fn splice_before(&mut self, anchor: ValueId, value: ValueId) {
        debug_assert!(self.instruction(value).block.is_none());
        let Some(block) = self.instruction(anchor).block else {
            debug_assert!(false, "splice anchor {} is detached", anchor);
            return;
        };
        let instructions = &mut self.block_mut(block).instructions;
        let position = instructions
            .iter()
            .position(|v| *v == anchor)
            .unwrap_or(instructions.len());
        instructions.insert(position, value);
        self.values[value.index()].block = Some(block);
    }

    /// Redirects every use of `old` to `new`
    ///
    /// Afterwards `old` has an empty use-list and each former user appears
    /// exactly once in `new`'s use-list. Recorded block states are rewritten
    /// the same way.
    pub fn replace(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        let users = std::mem::take(&mut self.values[old.index()].users);
        for user in users {
            self.values[user.index()].kind.replace_operand(old, new);
            let target = &mut self.values[new.index()].users;
            if !target.contains(&user) {
                target.push(user);
            }
        }
        for block in &mut self.blocks {
            if let Some(state) = &mut block.begin_state {
                state.substitute(old, new);
            }
            if let Some(state) = &mut block.end_state {
                state.substitute(old, new);
            }
        }
    }

    /// Detaches an instruction from its block and from its operands'
    /// use-lists
    pub fn remove_instruction(&mut self, id: ValueId) {
        debug_assert!(
            self.instruction(id).users.is_empty(),
            "removing {} while still in use",
            id
        );
        self.unregister_uses(id);
        if let Some(block) = self.values[id.index()].block.take() {
            let block = self.block_mut(block);
            block.instructions.retain(|v| *v != id);
            block.phis.retain(|v| *v != id);
        }
    }

    /// Turns a conditional branch into a jump, keeping the id
    pub(crate) fn rewrite_as_jump(&mut self, branch: ValueId, target: BlockId) {
        self.unregister_uses(branch);
        self.values[branch.index()].kind = InstructionKind::Jump { target };
    }

    fn allocate(&mut self, kind: InstructionKind, block: Option<BlockId>, line: usize) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Instruction::new(id, kind, block, line));
        self.register_uses(id);
        id
    }

    fn register_uses(&mut self, id: ValueId) {
        for operand in self.values[id.index()].kind.operands() {
            let users = &mut self.values[operand.index()].users;
            if !users.contains(&id) {
                users.push(id);
            }
        }
    }

    fn unregister_uses(&mut self, id: ValueId) {
        for operand in self.values[id.index()].kind.operands() {
            self.values[operand.index()].users.retain(|u| *u != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::ComputeOp;

    fn straight_line() -> (Program, BlockId, ValueId, ValueId, ValueId) {
        let mut program = Program::new();
        let main = program.add_method("main", MethodKind::Main);
        let block = program.method(main).entry;
        let a = program.emit(block, InstructionKind::Const(2), 1);
        let b = program.emit(block, InstructionKind::Const(3), 1);
        let sum = program.emit(
            block,
            InstructionKind::Compute {
                op: ComputeOp::Add,
                lhs: a,
                rhs: b,
            },
            1,
        );
        (program, block, a, b, sum)
    }

    #[test]
    fn test_emit_registers_users() {
        let (program, block, a, b, sum) = straight_line();
        assert_eq!(program.instruction(a).users, vec![sum]);
        assert_eq!(program.instruction(b).users, vec![sum]);
        assert_eq!(program.block(block).instructions, vec![a, b, sum]);
        assert_eq!(program.instruction(sum).block, Some(block));
    }

    #[test]
    fn test_replace_moves_users() {
        let (mut program, block, a, _b, sum) = straight_line();
        let double = program.emit(
            block,
            InstructionKind::Compute {
                op: ComputeOp::Mul,
                lhs: sum,
                rhs: sum,
            },
            2,
        );

        program.replace(sum, a);

        assert!(program.instruction(sum).users.is_empty());
        assert_eq!(program.instruction(double).kind.operands(), vec![a, a]);
        assert_eq!(program.instruction(a).users, vec![sum, double]);
    }

    #[test]
    fn test_splice_and_remove() {
        let (mut program, block, a, b, sum) = straight_line();
        let folded = program.create_detached(InstructionKind::Const(5), 1);
        assert_eq!(program.instruction(folded).block, None);

        program.splice_before(sum, folded);
        program.replace(sum, folded);
        program.remove_instruction(sum);

        assert_eq!(program.block(block).instructions, vec![a, b, folded]);
        assert!(program.instruction(a).users.is_empty());
        assert_eq!(program.instruction(sum).block, None);
    }

    #[test]
    fn test_unlink_drops_phi_operands() {
        let mut program = Program::new();
        let main = program.add_method("main", MethodKind::Main);
        let entry = program.method(main).entry;
        let left = program.new_block(main, BlockKind::Plain);
        let right = program.new_block(main, BlockKind::Plain);
        let join = program.new_block(main, BlockKind::Join { loop_header: false });
        program.link(entry, left);
        program.link(entry, right);
        program.link(left, join);
        program.link(right, join);

        let one = program.emit(left, InstructionKind::Const(1), 1);
        let two = program.emit(right, InstructionKind::Const(2), 1);
        let phi = program.add_phi(join, "x", vec![(left, one), (right, two)], 2);

        program.unlink(right, join);

        assert_eq!(program.block(join).predecessors, vec![left]);
        assert!(program.block(right).successors.is_empty());
        assert_eq!(program.instruction(phi).kind.operands(), vec![one]);
        assert!(program.instruction(two).users.is_empty());
    }

    #[test]
    fn test_prune_unreachable() {
        let mut program = Program::new();
        let main = program.add_method("main", MethodKind::Main);
        let entry = program.method(main).entry;
        let live = program.new_block(main, BlockKind::Plain);
        let dead = program.new_block(main, BlockKind::Plain);
        program.link(entry, live);

        let c = program.emit(live, InstructionKind::Const(1), 1);
        program.emit(dead, InstructionKind::Write { value: c }, 2);

        assert_eq!(program.reachable_blocks(main), vec![entry, live]);
        assert_eq!(program.prune_unreachable(main), 1);
        assert_eq!(program.method(main).blocks, vec![entry, live]);
        assert!(program.instruction(c).users.is_empty());
    }
}
