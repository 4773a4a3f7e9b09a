//! Group isolation.
//!
//! After reordering, every maximal same-group join span is contiguous.
//! Isolation walks each island bottom-up computing the single group of a
//! subtree (or `None` for mixed subtrees) and wraps each maximal
//! single-group subtree in a grouped-unit node, collecting its member
//! tables. A join over two different groups wraps each side separately and
//! stays a join.
//!
//! Every table must carry a group by now; one without is a bug in an
//! earlier phase and fails the plan.

use crate::islands::JoinIsland;
use tgopt_core::error::RewriteError;
use tgopt_core::groups::GroupId;
use tgopt_core::plan::{JoinType, NodeId, Plan, PlanNode};

pub(crate) fn isolate_groups(
    plan: &mut Plan,
    islands: &mut [JoinIsland],
) -> Result<(), RewriteError> {
    for island in islands.iter_mut() {
        if let Some(group) = isolate(plan, island.root)? {
            let wrapped = wrap_grouped(plan, island.root, group)?;
            plan.replace_input(island.output, island.root, wrapped);
            island.root = wrapped;
        }
    }
    Ok(())
}

/// The single group of this subtree, or `None` when it mixes groups (in
/// which case its single-group children have already been wrapped).
fn isolate(plan: &mut Plan, node: NodeId) -> Result<Option<GroupId>, RewriteError> {
    if let Some(t) = plan.table_source(node) {
        return match t.group {
            Some(g) => Ok(Some(plan.groups.find(g))),
            None => Err(RewriteError::malformed(format!(
                "table '{}' reached isolation without a group",
                t.name
            ))),
        };
    }
    let Some(j) = plan.join(node) else {
        return Ok(None);
    };
    let (left, right) = (j.left, j.right);
    let left_group = isolate(plan, left)?;
    let right_group = isolate(plan, right)?;
    if left_group.is_some() && left_group == right_group {
        return Ok(left_group);
    }
    let new_left = match left_group {
        Some(g) => Some(wrap_grouped(plan, left, g)?),
        None => None,
    };
    let new_right = match right_group {
        Some(g) => Some(wrap_grouped(plan, right, g)?),
        None => None,
    };
    if let Some(j) = plan.join_mut(node) {
        if let Some(wrapped) = new_left {
            j.left = wrapped;
        }
        if let Some(wrapped) = new_right {
            j.right = wrapped;
        }
        if j.kind == JoinType::Right {
            std::mem::swap(&mut j.left, &mut j.right);
            j.kind = JoinType::Left;
        }
    }
    Ok(None)
}

fn wrap_grouped(plan: &mut Plan, subtree: NodeId, group: GroupId) -> Result<NodeId, RewriteError> {
    let mut tables = Vec::new();
    collect_tables(plan, subtree, &mut tables)?;
    Ok(plan.add_grouped(subtree, group, tables))
}

/// Member tables of a same-group span, left to right.
fn collect_tables(plan: &Plan, node: NodeId, out: &mut Vec<NodeId>) -> Result<(), RewriteError> {
    match plan.node(node) {
        PlanNode::Table(_) => {
            out.push(node);
            Ok(())
        }
        PlanNode::Join(j) => {
            let (left, right) = (j.left, j.right);
            collect_tables(plan, left, out)?;
            collect_tables(plan, right, out)
        }
        _ => Err(RewriteError::malformed(
            "unexpected node inside a grouped span",
        )),
    }
}
