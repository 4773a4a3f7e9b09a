//! Condition relocation.
//!
//! The last phase settles every confirmed group join against the final tree
//! shape. A group join only survives when its parent reference ended up in
//! the same grouped unit as the child; otherwise the confirmation is
//! withdrawn (the predicate stays where it is and the join runs as a
//! generic join). For surviving WHERE-sourced group joins, the witnessing
//! predicates move out of the WHERE list onto the child's nearest enclosing
//! join, in their normalized form, and the join is tagged. Join-sourced
//! group joins were tagged at detection and keep their conditions.

use crate::islands::JoinIsland;
use std::collections::HashSet;
use tgopt_core::error::RewriteError;
use tgopt_core::expr::{Condition, ConditionId};
use tgopt_core::plan::{NodeId, Plan};

pub(crate) fn move_join_conditions(
    plan: &mut Plan,
    islands: &[JoinIsland],
) -> Result<(), RewriteError> {
    for island in islands {
        relocate(plan, island.root, None, None, island)?;
    }
    Ok(())
}

/// `output` is the nearest enclosing join; `unit` the enclosing grouped
/// unit, when inside one.
fn relocate(
    plan: &mut Plan,
    node: NodeId,
    output: Option<NodeId>,
    unit: Option<NodeId>,
    island: &JoinIsland,
) -> Result<(), RewriteError> {
    if let Some(t) = plan.table_source(node) {
        let Some(gj_id) = t.parent_join else {
            return Ok(());
        };
        let gj = plan.group_join(gj_id).clone();
        let co_resident = unit
            .and_then(|u| plan.grouped(u))
            .map_or(false, |g| g.tables.contains(&gj.parent));
        if !co_resident {
            if let Some(t) = plan.table_source_mut(node) {
                t.parent_join = None;
            }
            if let Some(out) = output {
                if let Some(j) = plan.join_mut(out) {
                    if j.group_join == Some(gj_id) {
                        j.group_join = None;
                    }
                }
            }
            return Ok(());
        }
        if island.where_joins.contains(&gj_id) {
            let out = output.ok_or_else(|| {
                RewriteError::malformed("grouped child table has no enclosing join")
            })?;
            let removed: HashSet<ConditionId> = gj.witnesses.iter().map(|w| w.original).collect();
            let moved: Vec<Condition> = gj
                .witnesses
                .iter()
                .map(|w| plan.new_comparison(w.normalized.clone()))
                .collect();
            if let Some(owner) = island.where_owner(plan) {
                if let Some(list) = plan.where_conditions_mut(owner) {
                    list.retain(|c| !removed.contains(&c.id));
                }
            }
            if let Some(j) = plan.join_mut(out) {
                j.group_join = Some(gj_id);
                j.conditions.extend(moved);
            }
        }
        return Ok(());
    }
    if let Some(j) = plan.join(node) {
        let (left, right) = (j.left, j.right);
        relocate(plan, left, Some(node), unit, island)?;
        relocate(plan, right, Some(node), unit, island)?;
        return Ok(());
    }
    if let Some(g) = plan.grouped(node) {
        let joins = g.joins;
        relocate(plan, joins, output, Some(node), island)?;
    }
    Ok(())
}
