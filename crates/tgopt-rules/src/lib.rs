//! # tgopt-rules: Join-Grouping Rewrite Pass
//!
//! This crate implements the rewrite pass that recognizes which joins in a
//! query plan correspond to declared storage parent-child relationships
//! ("group joins") and reshapes the join tree so that each maximal span of
//! same-group tables is collapsed into a single grouped-access unit. A later
//! optimizer stage executes a grouped unit as one hierarchical storage scan
//! instead of a generic nested-loop join.
//!
//! ## Phases
//!
//! The pass runs the following phases once each, in order, over every join
//! island of the plan (see [`islands`]):
//!
//! 1. **`islands`**: partition the plan into independent join subtrees, each
//!    paired with its consumer's WHERE list.
//! 2. **`normalize`**: hoist INNER-join conditions into the WHERE list and
//!    canonicalize comparison orientation (child key on the left).
//! 3. **`detect`**: match predicates against declared parent-child keys,
//!    using column equivalences, to establish and merge table groups.
//! 4. **`reorder`**: rebuild condition-free INNER-join subtrees so that
//!    same-group tables are adjacent and deterministically ordered.
//! 5. **`isolate`**: collapse each contiguous same-group span into a
//!    grouped-unit node.
//! 6. **`relocate`**: move confirmed group-join predicates from the WHERE
//!    list down to their join node, and reject group joins whose parent did
//!    not end up co-resident.
//!
//! Detection runs before reordering because the reorderer clusters operands
//! by the table groups detection establishes.
//!
//! Everything is a synchronous in-place tree transform: one invocation
//! rewrites one plan to completion or fails with a structural error.

mod detect;
mod islands;
mod isolate;
mod normalize;
mod relocate;
mod reorder;

use tgopt_core::equiv::ColumnEquivalences;
use tgopt_core::error::RewriteError;
use tgopt_core::plan::Plan;
use tgopt_core::schema::SchemaCatalog;

/// Context passed to rewrite rules: read-only collaborators of the pass.
pub struct RewriteContext<'a> {
    pub catalog: &'a SchemaCatalog,
    /// Column-equivalence classes precomputed by an earlier planning stage.
    pub equivalences: &'a ColumnEquivalences,
}

/// A plan rewrite rule. Rules mutate the plan in place and either succeed or
/// fail the whole compilation; there is no partial application.
pub trait RewriteRule {
    /// Unique name of this rule.
    fn name(&self) -> &str;

    /// Apply the rule to the plan.
    fn apply(&self, plan: &mut Plan, ctx: &RewriteContext) -> Result<(), RewriteError>;
}

/// Uses join conditions to identify which tables are part of the same
/// storage group, and isolates each group into a grouped-unit node.
pub struct GroupJoinFinder;

impl RewriteRule for GroupJoinFinder {
    fn name(&self) -> &str {
        "GroupJoinFinder"
    }

    fn apply(&self, plan: &mut Plan, ctx: &RewriteContext) -> Result<(), RewriteError> {
        let mut islands = islands::find_islands(plan);
        tracing::debug!(islands = islands.len(), "grouping join islands");
        normalize::move_and_normalize(plan, ctx, &islands);
        detect::find_group_joins(plan, ctx, &mut islands)?;
        tracing::debug!(
            group_joins = plan.group_joins.len(),
            "confirmed group join candidates"
        );
        reorder::reorder_joins(plan, ctx, &mut islands);
        isolate::isolate_groups(plan, &mut islands)?;
        relocate::move_join_conditions(plan, &islands)?;
        Ok(())
    }
}
