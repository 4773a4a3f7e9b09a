//! # Column Equivalences
//!
//! Equivalence classes over column expressions, computed by an earlier
//! planning stage (e.g. from `a.x = b.y` chains and view expansion). The
//! group-join detector uses them to see through renamed or re-sourced
//! columns: a predicate witnesses a key column if either side *is* the key
//! column or is provably equal to it.
//!
//! This structure is read-only during the rewrite pass; the pass never adds
//! equivalences of its own.

use crate::expr::ColumnExpr;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Precomputed equivalence classes over column expressions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnEquivalences {
    classes: Vec<Vec<ColumnExpr>>,
    index: HashMap<ColumnExpr, usize>,
}

impl ColumnEquivalences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `a` and `b` are equal, unioning their classes.
    pub fn add_equivalence(&mut self, a: ColumnExpr, b: ColumnExpr) {
        match (self.index.get(&a).copied(), self.index.get(&b).copied()) {
            (Some(ca), Some(cb)) => {
                if ca != cb {
                    let moved = std::mem::take(&mut self.classes[cb]);
                    for col in &moved {
                        self.index.insert(*col, ca);
                    }
                    self.classes[ca].extend(moved);
                }
            }
            (Some(ca), None) => {
                self.classes[ca].push(b);
                self.index.insert(b, ca);
            }
            (None, Some(cb)) => {
                self.classes[cb].push(a);
                self.index.insert(a, cb);
            }
            (None, None) => {
                let class = self.classes.len();
                self.classes.push(vec![a, b]);
                self.index.insert(a, class);
                self.index.insert(b, class);
            }
        }
    }

    /// All columns known equal to `col`, including `col` itself when any
    /// equivalence was recorded for it. Columns never mentioned have an
    /// empty class.
    pub fn equivalents_of(&self, col: &ColumnExpr) -> &[ColumnExpr] {
        match self.index.get(col) {
            Some(&class) => &self.classes[class],
            None => &[],
        }
    }

    pub fn are_equivalent(&self, a: &ColumnExpr, b: &ColumnExpr) -> bool {
        a == b
            || match (self.index.get(a), self.index.get(b)) {
                (Some(ca), Some(cb)) => ca == cb,
                _ => false,
            }
    }
}
