//! # tgopt-core: Plan Representation for the Table-Group Optimizer
//!
//! This crate holds the data structures shared by the table-group join
//! optimizer: the query plan tree, the schema catalog, and the mutable
//! per-query grouping state.
//!
//! ## Module Overview
//!
//! - **`plan`**: The arena-allocated plan tree (joins, table references,
//!   grouped-unit nodes, predicate-bearing consumers) plus the per-plan
//!   group-join records produced by the rewrite pass.
//! - **`expr`**: Scalar expression and condition types. Conditions carry
//!   stable integer IDs so that predicate lists can be spliced between
//!   nodes without relying on reference identity.
//! - **`schema`**: The read-only schema catalog: which tables belong to
//!   which storage hierarchy, their ordinals, and their declared
//!   parent-child key relationships.
//! - **`groups`**: Arena-allocated union-find of table groups. Groups are
//!   merged, never split; ordinal ranges widen with each merge.
//! - **`equiv`**: Precomputed column-equivalence classes, consumed as an
//!   opaque membership query by the group-join detector.
//! - **`error`**: The error taxonomy of the rewrite pass.

pub mod equiv;
pub mod error;
pub mod expr;
pub mod groups;
pub mod plan;
pub mod schema;
