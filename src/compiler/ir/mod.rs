//! # SSA Intermediate Representation
//!
//! The parser builds this representation directly, without an intermediate
//! syntax tree. Blocks and instructions live in arenas owned by [`Program`]
//! and refer to each other by index, so use-lists and phi operands never form
//! ownership cycles.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── ids.rs          # ValueId, BlockId, MethodId arena indices
//! ├── instruction.rs  # InstructionKind sum type, ComputeOp, CompareOp
//! ├── block.rs        # Block, BlockKind (entry / plain / join / exit)
//! ├── state.rs        # State, the name -> value binding map
//! ├── symbols.rs      # SymbolTable, Symbol, SymbolKind
//! └── program.rs      # Program, Method, use-list maintaining mutations
//! ```
//!
//! ## Key Types
//!
//! - [`Instruction`] - SSA value with its owning block and use-list
//! - [`Block`] - basic block with edges, begin/end states and a dominator
//! - [`Program`] - methods plus the value and block arenas
//! - [`State`] - bindings threaded through the parse

mod block;
mod ids;
mod instruction;
mod program;
mod state;
mod symbols;

pub use block::{Block, BlockKind};
pub use ids::{BlockId, MethodId, ValueId};
pub use instruction::{CompareOp, ComputeOp, Instruction, InstructionKind};
pub use program::{Method, MethodKind, Program};
pub use state::{State, RETURN_BINDING};
pub use symbols::{Symbol, SymbolKind, SymbolTable};
