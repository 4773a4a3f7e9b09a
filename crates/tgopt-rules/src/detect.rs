//! Group-join detection.
//!
//! For each table reference that declares a storage parent, look for
//! equality predicates matching every declared key-column pair against some
//! reference of the parent table. Predicates are sourced from the nearest
//! enclosing join outward, then from the island's WHERE list; a match
//! through column equivalences is rewritten to the canonical
//! `child key = parent key` form and kept as a witness.
//!
//! A confirmed match assigns (or merges) the table group of parent and
//! child, records a [`GroupJoin`], and tags the join it was sourced from.
//! WHERE-sourced matches cannot be tagged yet (their join node only exists
//! after reordering) and are parked on the island for relocation.
//!
//! Two distinct parent references completing the full key is ambiguous and
//! fails the compilation. A single complete match can still be rejected when
//! the group already contains another reference of the same schema table;
//! the group merge performed while resolving it is left in place.

use crate::islands::JoinIsland;
use crate::RewriteContext;
use tgopt_core::error::RewriteError;
use tgopt_core::expr::{ColumnExpr, CompareOp, Comparison, Condition, Expr};
use tgopt_core::groups::GroupId;
use tgopt_core::plan::{GroupJoin, GroupJoinId, JoinType, NodeId, Plan, Witness};
use tgopt_core::schema::{HierarchyId, KeyColumnPair};

pub(crate) fn find_group_joins(
    plan: &mut Plan,
    ctx: &RewriteContext,
    islands: &mut [JoinIsland],
) -> Result<(), RewriteError> {
    for island in islands.iter_mut() {
        let where_owner = island.where_owner(plan);
        let mut stack = Vec::new();
        walk(
            plan,
            ctx,
            island.root,
            &mut stack,
            where_owner,
            &mut island.where_joins,
        )?;
        assign_single_groups(plan, island.root);
    }
    Ok(())
}

/// Where a candidate's witnessing predicates are read from.
#[derive(Clone, Copy)]
enum CondSource {
    /// A join node's local condition list.
    Join(NodeId),
    /// The island's WHERE list.
    Where(NodeId),
}

fn walk(
    plan: &mut Plan,
    ctx: &RewriteContext,
    node: NodeId,
    stack: &mut Vec<NodeId>,
    where_owner: Option<NodeId>,
    where_joins: &mut Vec<GroupJoinId>,
) -> Result<(), RewriteError> {
    if plan.table_source(node).is_some() {
        // Nearest enclosing join first.
        for i in (0..stack.len()).rev() {
            let join = stack[i];
            if let Some(gj) = find_parent_join(plan, ctx, node, CondSource::Join(join))? {
                if let Some(j) = plan.join_mut(join) {
                    j.group_join = Some(gj);
                }
                return Ok(());
            }
        }
        if let Some(owner) = where_owner {
            if let Some(gj) = find_parent_join(plan, ctx, node, CondSource::Where(owner))? {
                where_joins.push(gj);
            }
        }
        return Ok(());
    }
    let Some(join) = plan.join(node) else {
        return Ok(());
    };
    let (kind, left, right) = (join.kind, join.left, join.right);
    stack.push(node);
    match kind {
        JoinType::Inner => {
            walk(plan, ctx, left, stack, where_owner, where_joins)?;
            walk(plan, ctx, right, stack, where_owner, where_joins)?;
        }
        // The null-filled side of an outer join may only be witnessed by
        // the outer join's own conditions; anything further out would
        // change its semantics.
        JoinType::Left => {
            walk(plan, ctx, left, stack, where_owner, where_joins)?;
            let mut own = vec![node];
            walk(plan, ctx, right, &mut own, None, where_joins)?;
        }
        JoinType::Right => {
            walk(plan, ctx, right, stack, where_owner, where_joins)?;
            let mut own = vec![node];
            walk(plan, ctx, left, &mut own, None, where_joins)?;
        }
    }
    stack.pop();
    Ok(())
}

/// Try to confirm `child`'s declared parent join against the predicates of
/// one source. `Ok(None)` means no complete candidate (or a candidate
/// rejected by the group uniqueness check); `Err` means two complete
/// candidates.
fn find_parent_join(
    plan: &mut Plan,
    ctx: &RewriteContext,
    child: NodeId,
    src: CondSource,
) -> Result<Option<GroupJoinId>, RewriteError> {
    let (child_table, child_hierarchy) = match plan.table_source(child) {
        Some(t) => (t.table, t.hierarchy),
        None => return Ok(None),
    };
    let Some(parent_join) = ctx.catalog.table(child_table).parent_join.clone() else {
        return Ok(None);
    };
    let conds: &[Condition] = match src {
        CondSource::Join(j) => match plan.join(j) {
            Some(j) => &j.conditions,
            None => return Ok(None),
        },
        CondSource::Where(w) => match plan.where_conditions(w) {
            Some(c) => c,
            None => return Ok(None),
        },
    };
    if conds.is_empty() {
        return Ok(None);
    }

    // One slot per key-column pair, per candidate parent reference, in the
    // order candidates are first seen. The first predicate matching a slot
    // wins; later ones for the same slot are redundant.
    let mut candidates: Vec<(NodeId, Vec<Option<Witness>>)> = Vec::new();
    for (i, pair) in parent_join.key.iter().enumerate() {
        for cond in conds {
            let Some(cmp) = cond.as_comparison() else {
                continue;
            };
            if cmp.op != CompareOp::Eq {
                continue;
            }
            let (Some(lcol), Some(rcol)) = (cmp.left.as_column(), cmp.right.as_column()) else {
                continue;
            };
            let Some(normalized) = normalized_witness(ctx, pair, child, lcol, rcol, cmp) else {
                continue;
            };
            let parent_src = match normalized.right.as_column() {
                Some(c) => c.source,
                None => continue,
            };
            if plan.table_source(parent_src).map(|t| t.table) != Some(parent_join.parent) {
                continue;
            }
            let entry = match candidates.iter().position(|(p, _)| *p == parent_src) {
                Some(at) => at,
                None => {
                    candidates.push((parent_src, vec![None; parent_join.key.len()]));
                    candidates.len() - 1
                }
            };
            if candidates[entry].1[i].is_none() {
                candidates[entry].1[i] = Some(Witness {
                    normalized,
                    original: cond.id,
                });
            }
        }
    }

    let complete: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, (_, slots))| slots.iter().all(Option::is_some))
        .map(|(i, _)| i)
        .collect();
    match complete.len() {
        0 => Ok(None),
        1 => {
            let (parent_src, slots) = candidates.swap_remove(complete[0]);
            let witnesses: Vec<Witness> = slots.into_iter().flatten().collect();
            confirm(plan, child, child_hierarchy, parent_src, witnesses)
        }
        _ => {
            // Report the two conflicting first-key predicates in the order
            // they appear in the source list.
            let table = plan
                .table_source(child)
                .map(|t| t.name.clone())
                .unwrap_or_default();
            let mut shown: Vec<(usize, String)> = complete
                .iter()
                .take(2)
                .filter_map(|&c| {
                    let witness = candidates[c].1.iter().flatten().next()?;
                    let position = conds
                        .iter()
                        .position(|cond| cond.id == witness.original)
                        .unwrap_or(usize::MAX);
                    let rendered = conds
                        .iter()
                        .find(|cond| cond.id == witness.original)
                        .and_then(|cond| cond.as_comparison())
                        .unwrap_or(&witness.normalized);
                    Some((position, plan.render_comparison(ctx.catalog, rendered)))
                })
                .collect();
            shown.sort();
            Err(RewriteError::AmbiguousGroupJoin {
                table,
                first: shown[0].1.clone(),
                second: shown[1].1.clone(),
            })
        }
    }
}

/// Rewrite one equality to the canonical `child key = parent key` form, or
/// reject it. Either side may match its key column directly or through a
/// recorded equivalence; the original comparison is reused when no rewrite
/// was needed.
fn normalized_witness(
    ctx: &RewriteContext,
    pair: &KeyColumnPair,
    child: NodeId,
    lcol: &ColumnExpr,
    rcol: &ColumnExpr,
    cmp: &Comparison,
) -> Option<Comparison> {
    let child_key = ColumnExpr {
        source: child,
        column: pair.child,
    };
    let left_direct = *lcol == child_key;
    if !left_direct && !ctx.equivalences.are_equivalent(lcol, &child_key) {
        return None;
    }
    let right = if rcol.column == pair.parent {
        *rcol
    } else {
        ctx.equivalences
            .equivalents_of(rcol)
            .iter()
            .copied()
            .find(|c| c.column == pair.parent)?
    };
    if left_direct && right == *rcol {
        Some(cmp.clone())
    } else {
        Some(Comparison::new(
            CompareOp::Eq,
            Expr::Column(child_key),
            Expr::Column(right),
        ))
    }
}

/// Resolve the group, check table uniqueness within it, and record the
/// confirmed group join.
fn confirm(
    plan: &mut Plan,
    child: NodeId,
    child_hierarchy: HierarchyId,
    parent_src: NodeId,
    witnesses: Vec<Witness>,
) -> Result<Option<GroupJoinId>, RewriteError> {
    let group = match (plan.group_of(parent_src), plan.group_of(child)) {
        (None, Some(child_group)) => child_group,
        (None, None) => plan.groups.new_group(child_hierarchy),
        (Some(parent_group), Some(child_group)) => plan.groups.merge(parent_group, child_group),
        (Some(parent_group), None) => parent_group,
    };
    if !table_allowed_in_group(plan, group, child) {
        return Ok(None);
    }
    plan.assign_group(parent_src, group);
    plan.assign_group(child, group);
    let group = plan.groups.find(group);
    tracing::trace!(child, parent = parent_src, group, "confirmed group join");
    let gj = plan.add_group_join(GroupJoin {
        group,
        parent: parent_src,
        child,
        witnesses,
    });
    if let Some(t) = plan.table_source_mut(child) {
        t.parent_join = Some(gj);
    }
    Ok(Some(gj))
}

/// A group may contain at most one reference of each schema table; a second
/// reference would make the grouped scan visit the same rows twice.
fn table_allowed_in_group(plan: &Plan, group: GroupId, child: NodeId) -> bool {
    let table = match plan.table_source(child) {
        Some(t) => t.table,
        None => return false,
    };
    plan.groups
        .tables(group)
        .iter()
        .all(|&member| member == child || plan.table_source(member).map(|t| t.table) != Some(table))
}

/// Every table left without a group after detection gets a fresh singleton
/// group, so later phases can treat grouping as total.
fn assign_single_groups(plan: &mut Plan, node: NodeId) {
    if let Some(t) = plan.table_source(node) {
        if t.group.is_none() {
            let hierarchy = t.hierarchy;
            let group = plan.groups.new_group(hierarchy);
            plan.assign_group(node, group);
        }
        return;
    }
    if let Some(j) = plan.join(node) {
        let (left, right) = (j.left, j.right);
        assign_single_groups(plan, left);
        assign_single_groups(plan, right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::islands::find_islands;
    use tgopt_core::equiv::ColumnEquivalences;
    use tgopt_core::schema::SchemaCatalog;

    fn catalog() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        let h = catalog.add_hierarchy("customers");
        let customer = catalog.add_table("customer", h, 1, &["id", "name"]);
        let order = catalog.add_table("order", h, 2, &["id", "customer_id"]);
        catalog.link_parent(order, customer, &[("customer_id", "id")]);
        catalog
    }

    fn key_eq(plan: &mut Plan, child_col: ColumnExpr, parent_col: ColumnExpr) -> Condition {
        plan.new_comparison(Comparison::new(
            CompareOp::Eq,
            Expr::Column(child_col),
            Expr::Column(parent_col),
        ))
    }

    fn column(catalog: &SchemaCatalog, source: NodeId, table: usize, name: &str) -> ColumnExpr {
        ColumnExpr {
            source,
            column: catalog.column(table, name).unwrap(),
        }
    }

    #[test]
    fn test_where_sourced_detection_assigns_one_group() {
        let catalog = catalog();
        let equivs = ColumnEquivalences::new();
        let ctx = RewriteContext {
            catalog: &catalog,
            equivalences: &equivs,
        };
        let mut plan = Plan::new();
        let c = plan.add_table_source(&catalog, 0);
        let o = plan.add_table_source(&catalog, 1);
        let join = plan.add_join(JoinType::Inner, c, o, vec![]);
        let cond = key_eq(
            &mut plan,
            column(&catalog, o, 1, "customer_id"),
            column(&catalog, c, 0, "id"),
        );
        let filter = plan.add_filter(join, vec![cond]);
        plan.add_output(filter);

        let mut islands = find_islands(&plan);
        find_group_joins(&mut plan, &ctx, &mut islands).unwrap();

        assert_eq!(plan.group_of(c), plan.group_of(o));
        assert_eq!(islands[0].where_joins.len(), 1);
        let gj = plan.group_join(islands[0].where_joins[0]);
        assert_eq!(gj.parent, c);
        assert_eq!(gj.child, o);
        assert_eq!(gj.witnesses.len(), 1);
        // The join itself carried no conditions, so nothing was tagged yet.
        assert!(plan.join(join).unwrap().group_join.is_none());
    }

    #[test]
    fn test_join_sourced_detection_tags_the_join() {
        let catalog = catalog();
        let equivs = ColumnEquivalences::new();
        let ctx = RewriteContext {
            catalog: &catalog,
            equivalences: &equivs,
        };
        let mut plan = Plan::new();
        let c = plan.add_table_source(&catalog, 0);
        let o = plan.add_table_source(&catalog, 1);
        let cond = key_eq(
            &mut plan,
            column(&catalog, o, 1, "customer_id"),
            column(&catalog, c, 0, "id"),
        );
        let join = plan.add_join(JoinType::Left, c, o, vec![cond]);
        let filter = plan.add_filter(join, vec![]);
        plan.add_output(filter);

        let mut islands = find_islands(&plan);
        find_group_joins(&mut plan, &ctx, &mut islands).unwrap();

        let gj_id = plan.join(join).unwrap().group_join.unwrap();
        assert_eq!(plan.group_join(gj_id).child, o);
        assert!(islands[0].where_joins.is_empty());
    }

    #[test]
    fn test_equivalence_witness_is_normalized() {
        let catalog = catalog();
        let mut equivs = ColumnEquivalences::new();
        let mut plan = Plan::new();
        let c = plan.add_table_source(&catalog, 0);
        let o = plan.add_table_source(&catalog, 1);
        // order.id is known equal to order.customer_id for this query
        // (contrived, but exercises the rewrite path).
        let oid = column(&catalog, o, 1, "id");
        let key = column(&catalog, o, 1, "customer_id");
        equivs.add_equivalence(oid, key);
        let ctx = RewriteContext {
            catalog: &catalog,
            equivalences: &equivs,
        };
        let cond = plan.new_comparison(Comparison::new(
            CompareOp::Eq,
            Expr::Column(oid),
            Expr::Column(column(&catalog, c, 0, "id")),
        ));
        let join = plan.add_join(JoinType::Inner, c, o, vec![]);
        let filter = plan.add_filter(join, vec![cond]);
        plan.add_output(filter);

        let mut islands = find_islands(&plan);
        find_group_joins(&mut plan, &ctx, &mut islands).unwrap();

        assert_eq!(islands[0].where_joins.len(), 1);
        let gj = plan.group_join(islands[0].where_joins[0]);
        assert_eq!(
            plan.render_comparison(&catalog, &gj.witnesses[0].normalized),
            "order.customer_id = customer.id"
        );
    }

    #[test]
    fn test_two_complete_parents_is_ambiguous() {
        let catalog = catalog();
        let equivs = ColumnEquivalences::new();
        let ctx = RewriteContext {
            catalog: &catalog,
            equivalences: &equivs,
        };
        let mut plan = Plan::new();
        let c1 = plan.add_aliased_table_source(&catalog, 0, "c1");
        let c2 = plan.add_aliased_table_source(&catalog, 0, "c2");
        let o = plan.add_table_source(&catalog, 1);
        let cross = plan.add_join(JoinType::Inner, c1, c2, vec![]);
        let join = plan.add_join(JoinType::Inner, cross, o, vec![]);
        let first = key_eq(
            &mut plan,
            column(&catalog, o, 1, "customer_id"),
            column(&catalog, c1, 0, "id"),
        );
        let second = key_eq(
            &mut plan,
            column(&catalog, o, 1, "customer_id"),
            column(&catalog, c2, 0, "id"),
        );
        let filter = plan.add_filter(join, vec![first, second]);
        plan.add_output(filter);

        let mut islands = find_islands(&plan);
        let err = find_group_joins(&mut plan, &ctx, &mut islands).unwrap_err();
        assert_eq!(
            err.to_string(),
            "found two possible parent joins for table 'order': \
             order.customer_id = c1.id and order.customer_id = c2.id"
        );
    }

    #[test]
    fn test_second_reference_of_a_table_is_denied_membership() {
        let catalog = catalog();
        let equivs = ColumnEquivalences::new();
        let ctx = RewriteContext {
            catalog: &catalog,
            equivalences: &equivs,
        };
        let mut plan = Plan::new();
        let c = plan.add_table_source(&catalog, 0);
        let o1 = plan.add_aliased_table_source(&catalog, 1, "o1");
        let o2 = plan.add_aliased_table_source(&catalog, 1, "o2");
        let j1 = plan.add_join(JoinType::Inner, c, o1, vec![]);
        let j2 = plan.add_join(JoinType::Inner, j1, o2, vec![]);
        let first = key_eq(
            &mut plan,
            column(&catalog, o1, 1, "customer_id"),
            column(&catalog, c, 0, "id"),
        );
        let second = key_eq(
            &mut plan,
            column(&catalog, o2, 1, "customer_id"),
            column(&catalog, c, 0, "id"),
        );
        let filter = plan.add_filter(j2, vec![first, second]);
        plan.add_output(filter);

        let mut islands = find_islands(&plan);
        find_group_joins(&mut plan, &ctx, &mut islands).unwrap();

        // The group already holds one reference of 'order'; the second is
        // denied membership without an error or a group-join record.
        assert_eq!(plan.group_joins.len(), 1);
        assert_eq!(islands[0].where_joins.len(), 1);
        assert_eq!(plan.group_of(o1), plan.group_of(c));
        assert_ne!(plan.group_of(o2), plan.group_of(c));
        assert!(plan.table_source(o2).unwrap().parent_join.is_none());
    }

    #[test]
    fn test_ungrouped_tables_get_singleton_groups() {
        let catalog = catalog();
        let equivs = ColumnEquivalences::new();
        let ctx = RewriteContext {
            catalog: &catalog,
            equivalences: &equivs,
        };
        let mut plan = Plan::new();
        let c = plan.add_table_source(&catalog, 0);
        let o = plan.add_table_source(&catalog, 1);
        // No key predicate at all: a cross join.
        let join = plan.add_join(JoinType::Inner, c, o, vec![]);
        let filter = plan.add_filter(join, vec![]);
        plan.add_output(filter);

        let mut islands = find_islands(&plan);
        find_group_joins(&mut plan, &ctx, &mut islands).unwrap();

        assert!(plan.group_of(c).is_some());
        assert!(plan.group_of(o).is_some());
        assert_ne!(plan.group_of(c), plan.group_of(o));
    }
}
