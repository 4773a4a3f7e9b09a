//! Condition normalization.
//!
//! Two jobs, done island by island:
//!
//! 1. **Hoisting**: INNER joins are associative and commutative for
//!    predicate purposes, so every condition sitting on an INNER join under
//!    a predicate-bearing consumer is moved up into the island's WHERE list.
//!    Later phases then see all constraints in one place. OUTER joins keep
//!    their own lists.
//! 2. **Orientation**: comparisons involving columns are rewritten to the
//!    form `<col> <op> <expr>`, and for column-to-column comparisons the
//!    later-ordered table goes on the left. The group-join detector only
//!    looks for child-key-on-left / parent-key-on-right, and a child always
//!    sorts after its parent within a hierarchy.
//!
//! Duplicate predicates (structurally equal after orientation) are removed,
//! keeping the first occurrence.

use crate::islands::JoinIsland;
use crate::reorder::compare_column_sources;
use crate::RewriteContext;
use std::cmp::Ordering;
use std::collections::HashSet;
use tgopt_core::expr::{Condition, ConditionKind};
use tgopt_core::plan::{NodeId, Plan};

pub(crate) fn move_and_normalize(plan: &mut Plan, ctx: &RewriteContext, islands: &[JoinIsland]) {
    for island in islands {
        if let Some(owner) = island.where_owner(plan) {
            let mut hoisted = Vec::new();
            hoist_inner_join_conditions(plan, island.root, &mut hoisted);
            let mut conditions = match plan.where_conditions_mut(owner) {
                Some(list) => std::mem::take(list),
                None => continue,
            };
            conditions.extend(hoisted);
            normalize_comparisons(plan, ctx, &mut conditions);
            if let Some(list) = plan.where_conditions_mut(owner) {
                *list = conditions;
            }
        }
        normalize_join_tree(plan, ctx, island.root);
    }
}

/// So long as there are INNER joins, move their conditions up into the
/// island's WHERE list.
fn hoist_inner_join_conditions(plan: &mut Plan, node: NodeId, into: &mut Vec<Condition>) {
    let (left, right) = match plan.join(node) {
        Some(j) if j.is_inner() => (j.left, j.right),
        _ => return,
    };
    if let Some(j) = plan.join_mut(node) {
        into.append(&mut j.conditions);
    }
    hoist_inner_join_conditions(plan, left, into);
    hoist_inner_join_conditions(plan, right, into);
}

/// Orient comparisons and drop structural duplicates within one list.
fn normalize_comparisons(plan: &Plan, ctx: &RewriteContext, conditions: &mut Vec<Condition>) {
    for condition in conditions.iter_mut() {
        if let ConditionKind::Comparison(cmp) = &mut condition.kind {
            let reverse = match cmp.right.as_column() {
                Some(rcol) if plan.table_source(rcol.source).is_some() => {
                    match cmp.left.as_column() {
                        Some(lcol) if plan.table_source(lcol.source).is_some() => {
                            compare_column_sources(plan, ctx, lcol.source, rcol.source)
                                == Ordering::Less
                        }
                        // Put the lone column on the left.
                        _ => true,
                    }
                }
                _ => false,
            };
            if reverse {
                cmp.reverse();
            }
        }
    }
    let mut seen: HashSet<ConditionKind> = HashSet::new();
    conditions.retain(|c| seen.insert(c.kind.clone()));
}

/// Normalize a join's own conditions and any join below it. Reaches the
/// local lists of OUTER joins (and of INNER joins in islands without a
/// WHERE list, which hoisting skipped).
fn normalize_join_tree(plan: &mut Plan, ctx: &RewriteContext, node: NodeId) {
    let (left, right) = match plan.join(node) {
        Some(j) => (j.left, j.right),
        None => return,
    };
    let mut conditions = match plan.join_mut(node) {
        Some(j) => std::mem::take(&mut j.conditions),
        None => return,
    };
    normalize_comparisons(plan, ctx, &mut conditions);
    if let Some(j) = plan.join_mut(node) {
        j.conditions = conditions;
    }
    normalize_join_tree(plan, ctx, left);
    normalize_join_tree(plan, ctx, right);
}
