//! Island discovery.
//!
//! A join island is a maximal join-capable subtree whose immediate consumer
//! is not itself join-capable, paired with that consumer's WHERE list when
//! it has one. Islands never share tables and are rewritten independently.
//! Discovery is a read-only traversal; no tree mutation happens here.

use tgopt_core::plan::{GroupJoinId, NodeId, Plan};

/// One independently-processed join subtree.
#[derive(Debug)]
pub(crate) struct JoinIsland {
    /// Root of the join subtree. Updated as phases replace it.
    pub root: NodeId,
    /// The consumer the rewritten subtree is spliced back into; `None` when
    /// the island root is the plan root itself.
    pub output: Option<NodeId>,
    /// Group joins sourced from the WHERE list, positioned during
    /// relocation (their join node is only known after reordering).
    pub where_joins: Vec<GroupJoinId>,
}

impl JoinIsland {
    /// The WHERE-list owner, when the island's consumer is predicate-bearing.
    pub fn where_owner(&self, plan: &Plan) -> Option<NodeId> {
        self.output.filter(|&o| plan.where_conditions(o).is_some())
    }
}

/// Find every join island in the plan.
pub(crate) fn find_islands(plan: &Plan) -> Vec<JoinIsland> {
    let mut found = Vec::new();
    if let Some(root) = plan.root() {
        visit(plan, root, None, &mut found);
    }
    found
}

fn visit(plan: &Plan, node: NodeId, parent: Option<NodeId>, found: &mut Vec<JoinIsland>) {
    let parent_joinable = parent.map_or(false, |p| plan.node(p).is_joinable());
    if plan.node(node).is_joinable() && !parent_joinable {
        found.push(JoinIsland {
            root: node,
            output: parent,
            where_joins: Vec::new(),
        });
    }
    for child in plan.children(node) {
        visit(plan, child, Some(node), found);
    }
}
