//! Join reordering.
//!
//! Spans of condition-free INNER joins commute, so each maximal such span is
//! flattened into its operand list and rebuilt: table references are
//! bucketed by table group (encounter order), buckets are sorted by
//! hierarchy name and lowest member ordinal, tables within a bucket by
//! ordinal, and non-table operands go last. The result places same-group
//! tables adjacent and parent-before-child, which is what isolation needs,
//! and is deterministic for any input permutation.
//!
//! Joins that do not commute (outer joins, inner joins still carrying local
//! conditions) keep their operands; RIGHT joins are canonicalized to LEFT by
//! swapping sides so later phases handle one outer shape.

use crate::islands::JoinIsland;
use crate::RewriteContext;
use std::cmp::Ordering;
use tgopt_core::groups::GroupId;
use tgopt_core::plan::{JoinType, NodeId, Plan};

pub(crate) fn reorder_joins(plan: &mut Plan, ctx: &RewriteContext, islands: &mut [JoinIsland]) {
    for island in islands.iter_mut() {
        let new_root = reorder(plan, ctx, island.root);
        if new_root != island.root {
            plan.replace_input(island.output, island.root, new_root);
            island.root = new_root;
        }
    }
}

fn reorder(plan: &mut Plan, ctx: &RewriteContext, node: NodeId) -> NodeId {
    if count_simple_inner(plan, node) >= 1 {
        let mut operands = Vec::new();
        collect_inner_operands(plan, node, &mut operands);
        for operand in operands.iter_mut() {
            *operand = reorder(plan, ctx, *operand);
        }
        return order_inner_joins(plan, ctx, operands).unwrap_or(node);
    }
    if let Some(j) = plan.join(node) {
        let (left, right) = (j.left, j.right);
        let new_left = reorder(plan, ctx, left);
        let new_right = reorder(plan, ctx, right);
        if let Some(j) = plan.join_mut(node) {
            j.left = new_left;
            j.right = new_right;
            if j.kind == JoinType::Right {
                std::mem::swap(&mut j.left, &mut j.right);
                j.kind = JoinType::Left;
            }
        }
    }
    node
}

/// A join commutes freely only when INNER and stripped of local conditions
/// (normalization empties them under a predicate-bearing consumer).
fn count_simple_inner(plan: &Plan, node: NodeId) -> usize {
    match plan.join(node) {
        Some(j) if j.is_inner() && j.conditions.is_empty() => {
            1 + count_simple_inner(plan, j.left) + count_simple_inner(plan, j.right)
        }
        _ => 0,
    }
}

/// Flatten a simple-INNER span into its operands, left to right. Anything
/// that is not a simple INNER join is an operand boundary.
fn collect_inner_operands(plan: &Plan, node: NodeId, out: &mut Vec<NodeId>) {
    match plan.join(node) {
        Some(j) if j.is_inner() && j.conditions.is_empty() => {
            collect_inner_operands(plan, j.left, out);
            collect_inner_operands(plan, j.right, out);
        }
        _ => out.push(node),
    }
}

struct Bucket {
    /// Resolved group representative; `None` for a table that never joined
    /// a group (its bucket stays a singleton).
    group: Option<GroupId>,
    tables: Vec<NodeId>,
}

/// Rebuild one flattened operand list into the canonical join tree.
fn order_inner_joins(
    plan: &mut Plan,
    ctx: &RewriteContext,
    operands: Vec<NodeId>,
) -> Option<NodeId> {
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut non_tables: Vec<NodeId> = Vec::new();
    for operand in operands {
        if plan.table_source(operand).is_none() {
            non_tables.push(operand);
            continue;
        }
        match plan.group_of(operand) {
            Some(group) => match buckets.iter_mut().find(|b| b.group == Some(group)) {
                Some(bucket) => bucket.tables.push(operand),
                None => buckets.push(Bucket {
                    group: Some(group),
                    tables: vec![operand],
                }),
            },
            None => buckets.push(Bucket {
                group: None,
                tables: vec![operand],
            }),
        }
    }

    buckets.sort_by(|a, b| bucket_key(plan, ctx, a).cmp(&bucket_key(plan, ctx, b)));
    for bucket in buckets.iter_mut() {
        bucket
            .tables
            .sort_by(|&x, &y| compare_table_sources(plan, ctx, x, y));
    }

    let mut items: Vec<NodeId> = Vec::with_capacity(buckets.len() + non_tables.len());
    for bucket in buckets {
        items.push(construct_left_inner(plan, bucket.tables)?);
    }
    items.extend(non_tables);
    construct_right_inner(plan, items)
}

fn bucket_key<'a>(plan: &Plan, ctx: &RewriteContext<'a>, bucket: &Bucket) -> (&'a str, u32) {
    match bucket.group {
        Some(group) => (
            ctx.catalog.hierarchy_name(plan.groups.hierarchy(group)),
            plan.groups.min_ordinal(group),
        ),
        None => bucket
            .tables
            .first()
            .and_then(|&t| plan.table_source(t))
            .map(|t| (ctx.catalog.hierarchy_name(t.hierarchy), t.ordinal))
            .unwrap_or(("", 0)),
    }
}

/// Left-deep chain of condition-free INNER joins.
fn construct_left_inner(plan: &mut Plan, items: Vec<NodeId>) -> Option<NodeId> {
    let mut iter = items.into_iter();
    let mut joined = iter.next()?;
    for item in iter {
        joined = plan.add_join(JoinType::Inner, joined, item, vec![]);
    }
    Some(joined)
}

/// Right-deep chain of condition-free INNER joins.
fn construct_right_inner(plan: &mut Plan, items: Vec<NodeId>) -> Option<NodeId> {
    let mut iter = items.into_iter().rev();
    let mut joined = iter.next()?;
    for item in iter {
        joined = plan.add_join(JoinType::Inner, item, joined, vec![]);
    }
    Some(joined)
}

/// Deterministic total order over table references: hierarchy name first,
/// then position. Two tables of the same group compare by their own
/// ordinals; across groups the group's lowest ordinal stands in, so a whole
/// group sorts as a unit.
pub(crate) fn compare_table_sources(
    plan: &Plan,
    ctx: &RewriteContext,
    a: NodeId,
    b: NodeId,
) -> Ordering {
    let (ta, tb) = match (plan.table_source(a), plan.table_source(b)) {
        (Some(ta), Some(tb)) => (ta, tb),
        _ => return Ordering::Equal,
    };
    let by_hierarchy = ctx
        .catalog
        .hierarchy_name(ta.hierarchy)
        .cmp(ctx.catalog.hierarchy_name(tb.hierarchy));
    if by_hierarchy != Ordering::Equal {
        return by_hierarchy;
    }
    let ga = ta.group.map(|g| plan.groups.find(g));
    let gb = tb.group.map(|g| plan.groups.find(g));
    if ga == gb {
        ta.ordinal.cmp(&tb.ordinal)
    } else {
        let ka = ga.map(|g| plan.groups.min_ordinal(g)).unwrap_or(ta.ordinal);
        let kb = gb.map(|g| plan.groups.min_ordinal(g)).unwrap_or(tb.ordinal);
        ka.cmp(&kb)
    }
}

/// Ordering used to orient comparisons: a table column outranks any other
/// expression, two table columns compare by their sources.
pub(crate) fn compare_column_sources(
    plan: &Plan,
    ctx: &RewriteContext,
    a: NodeId,
    b: NodeId,
) -> Ordering {
    match (
        plan.table_source(a).is_some(),
        plan.table_source(b).is_some(),
    ) {
        (true, true) => compare_table_sources(plan, ctx, a, b),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => Ordering::Equal,
    }
}
