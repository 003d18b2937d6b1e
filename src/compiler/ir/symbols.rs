//! Flat per-scope symbol storage

use serde::{Deserialize, Serialize};

/// What a declared name denotes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Integer scalar
    Scalar,
    /// Integer array with fixed dimension sizes, outermost first
    Array {
        /// Declared sizes
        dimensions: Vec<i64>,
    },
}

impl SymbolKind {
    /// Element strides for each dimension
    ///
    /// The index at depth `i` is scaled by the product of every declared size
    /// deeper than `i`, so `[2][3]` yields strides `[3, 1]`.
    pub fn strides(&self) -> Vec<i64> {
        match self {
            SymbolKind::Scalar => Vec::new(),
            SymbolKind::Array { dimensions } => {
                let mut strides = vec![1i64; dimensions.len()];
                for i in (0..dimensions.len().saturating_sub(1)).rev() {
                    strides[i] = strides[i + 1].wrapping_mul(dimensions[i + 1]);
                }
                strides
            }
        }
    }

    /// Total number of elements
    pub fn element_count(&self) -> i64 {
        match self {
            SymbolKind::Scalar => 1,
            SymbolKind::Array { dimensions } => {
                dimensions.iter().fold(1i64, |acc, d| acc.wrapping_mul(*d))
            }
        }
    }
}

/// A declared name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Declared name
    pub name: String,
    /// Scalar or array
    pub kind: SymbolKind,
    /// Whether the name is a formal parameter
    pub parameter: bool,
    /// Declaration line
    pub line: usize,
}

/// Declared names of one scope, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a name; returns `false` and keeps the first declaration if
    /// the name already exists
    pub fn declare(&mut self, symbol: Symbol) -> bool {
        if self.contains(&symbol.name) {
            return false;
        }
        self.symbols.push(symbol);
        true
    }

    /// Looks up a name
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// Whether the name is declared
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All symbols in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// Scalar names in declaration order
    pub fn scalars(&self) -> impl Iterator<Item = &str> {
        self.symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Scalar)
            .map(|s| s.name.as_str())
    }

    /// Number of declared names
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether nothing is declared
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(name: &str) -> Symbol {
        Symbol {
            name: name.to_string(),
            kind: SymbolKind::Scalar,
            parameter: false,
            line: 1,
        }
    }

    #[test]
    fn test_strides() {
        let kind = SymbolKind::Array {
            dimensions: vec![2, 3],
        };
        assert_eq!(kind.strides(), vec![3, 1]);
        assert_eq!(kind.element_count(), 6);

        let kind = SymbolKind::Array {
            dimensions: vec![4, 5, 6],
        };
        assert_eq!(kind.strides(), vec![30, 6, 1]);

        let kind = SymbolKind::Array {
            dimensions: vec![7],
        };
        assert_eq!(kind.strides(), vec![1]);
        assert!(SymbolKind::Scalar.strides().is_empty());
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let mut table = SymbolTable::new();
        assert!(table.declare(scalar("x")));
        assert!(!table.declare(Symbol {
            line: 9,
            ..scalar("x")
        }));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("x").map(|s| s.line), Some(1));
    }

    #[test]
    fn test_scalars_skip_arrays() {
        let mut table = SymbolTable::new();
        table.declare(scalar("a"));
        table.declare(Symbol {
            name: "grid".to_string(),
            kind: SymbolKind::Array {
                dimensions: vec![2],
            },
            parameter: false,
            line: 1,
        });
        table.declare(scalar("b"));

        assert_eq!(table.scalars().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
