//! Arena indices for values, blocks and methods

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an SSA value (index into the program's value arena)
///
/// Identities are handed out in creation order, so comparing two ids also
/// compares their creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Identity of a basic block (index into the program's block arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Identity of a method (index into the program's method list)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodId(pub u32);

impl ValueId {
    /// Arena slot of this value
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    /// Arena slot of this block
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl MethodId {
    /// Slot of this method in the program
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}
