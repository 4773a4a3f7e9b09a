//! Error taxonomy of the rewrite pass.
//!
//! Only two conditions are errors. Everything else that fails to match — a
//! predicate that fits no key column, a candidate rejected by the group
//! uniqueness guard, a parent that does not end up co-resident — silently
//! degrades to an ordinary join, which is always safe.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RewriteError {
    /// Two distinct candidate parent tables both fully satisfied a child's
    /// declared key columns. The conflicting predicates are reported in
    /// their declaration order for a stable message.
    #[error("found two possible parent joins for table '{table}': {first} and {second}")]
    AmbiguousGroupJoin {
        table: String,
        first: String,
        second: String,
    },

    /// The plan handed to the pass violated a structural invariant (e.g. a
    /// table reached isolation without a group). Indicates a bug in an
    /// earlier planning stage, not a user error.
    #[error("malformed join plan: {0}")]
    MalformedPlan(String),
}

impl RewriteError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        RewriteError::MalformedPlan(msg.into())
    }
}
