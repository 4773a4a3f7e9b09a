//! # Expression and Condition Types
//!
//! Scalar expressions appear on both sides of comparison predicates. The
//! rewrite pass only reasons about column-to-column and column-to-expression
//! equalities, so the expression tree is deliberately small: column
//! references, literals, and opaque function calls.
//!
//! Conditions wrap a predicate together with a stable integer ID assigned at
//! creation by the owning [`Plan`](crate::plan::Plan). Predicate lists are
//! spliced between WHERE clauses and join nodes during the rewrite, and the
//! ID is what lets a condition be recognized across those moves without
//! reference identity.

use crate::plan::NodeId;
use crate::schema::ColumnId;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Stable identifier of a condition within one plan.
pub type ConditionId = u32;

/// Scalar constant.
///
/// `f64` is wrapped in `OrderedFloat` so that expressions containing floats
/// can still derive `Eq`/`Hash`, which duplicate elimination relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Utf8(String),
}

/// A column of a specific table source in the plan.
///
/// `source` is the plan node of the table reference (so two aliases of the
/// same schema table are distinct sources); `column` is the schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnExpr {
    pub source: NodeId,
    pub column: ColumnId,
}

/// Scalar expressions used in predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a column of a table source.
    Column(ColumnExpr),
    /// Constant literal value.
    Literal(ScalarValue),
    /// Named function call over argument expressions. Opaque to the pass:
    /// a function result is never a group-join key.
    Function { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn as_column(&self) -> Option<&ColumnExpr> {
        match self {
            Expr::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_column(&self) -> bool {
        matches!(self, Expr::Column(_))
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    /// The operator that holds when the two operands are exchanged.
    pub fn mirror(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::NotEq => CompareOp::NotEq,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::LtEq => CompareOp::GtEq,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::GtEq => CompareOp::LtEq,
        }
    }
}

/// A binary comparison between two scalar expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Comparison {
    pub op: CompareOp,
    pub left: Expr,
    pub right: Expr,
}

impl Comparison {
    pub fn new(op: CompareOp, left: Expr, right: Expr) -> Self {
        Comparison { op, left, right }
    }

    /// Exchange the operands, mirroring the operator so the predicate keeps
    /// its meaning.
    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.left, &mut self.right);
        self.op = self.op.mirror();
    }
}

/// Predicate payload of a condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionKind {
    /// A binary comparison; the only form the group-join detector inspects.
    Comparison(Comparison),
    /// Any other boolean-valued expression; carried through untouched.
    Other(Expr),
}

/// A predicate with a plan-stable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub id: ConditionId,
    pub kind: ConditionKind,
}

impl Condition {
    pub fn as_comparison(&self) -> Option<&Comparison> {
        match &self.kind {
            ConditionKind::Comparison(c) => Some(c),
            ConditionKind::Other(_) => None,
        }
    }
}
