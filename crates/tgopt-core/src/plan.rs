//! # Plan Tree
//!
//! The query plan as seen by the join-grouping pass: an arena of nodes
//! addressed by `NodeId`, so that phases can replace children and splice
//! condition lists in place without back-pointers or reference cycles. A
//! phase that rewrites a subtree returns the replacement node's ID and the
//! caller splices it into the parent slot.
//!
//! Node variants:
//!
//! - **`Table`**: leaf reference to a schema table, carrying the alias, the
//!   hierarchy ordinal (copied from the catalog at creation), and the
//!   mutable group assignment filled in by the pass.
//! - **`Join`**: binary join with kind, optional local predicate list, and
//!   an optional confirmed group-join tag.
//! - **`Grouped`**: the grouped-unit node produced by isolation — a whole
//!   same-group join subtree collapsed into one hierarchical-scan
//!   opportunity, with its member tables collected for downstream planning.
//! - **`Filter`**: predicate-bearing consumer owning a WHERE list.
//! - **`Output`**: generic non-join consumer terminating the plan.
//!
//! The plan also owns the per-query mutable grouping state: the table-group
//! union-find and the group-join records. Everything is discarded with the
//! plan; nothing is shared across queries.

use crate::expr::{Comparison, Condition, ConditionId, ConditionKind, Expr};
use crate::groups::{GroupId, TableGroups};
use crate::schema::{HierarchyId, SchemaCatalog, TableId};
use serde::{Deserialize, Serialize};

/// Index of a node in the plan arena.
pub type NodeId = usize;

/// Index of a group-join record in the plan.
pub type GroupJoinId = usize;

/// SQL join kinds handled by the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

/// Leaf reference to a schema table (one per alias in the query).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSource {
    pub table: TableId,
    /// Alias used in the query; defaults to the table name.
    pub name: String,
    pub hierarchy: HierarchyId,
    pub ordinal: u32,
    /// Table-group assignment, filled in by the group-join detector.
    /// Stores a group the caller should resolve via `TableGroups::find`.
    pub group: Option<GroupId>,
    /// Confirmed group join in which this table is the child.
    pub parent_join: Option<GroupJoinId>,
}

/// Binary join node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinNode {
    pub kind: JoinType,
    pub left: NodeId,
    pub right: NodeId,
    /// Join-local predicates. Emptied for INNER joins under a
    /// predicate-bearing consumer during normalization.
    pub conditions: Vec<Condition>,
    /// Group join confirmed against this node, if any.
    pub group_join: Option<GroupJoinId>,
}

impl JoinNode {
    pub fn is_inner(&self) -> bool {
        self.kind == JoinType::Inner
    }
}

/// A maximal same-group join subtree collapsed into one unit, executable as
/// a single hierarchical storage scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupedJoins {
    pub joins: NodeId,
    pub group: GroupId,
    /// Member table references, collected at isolation time.
    pub tables: Vec<NodeId>,
}

/// Predicate-bearing consumer (WHERE clause owner).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterNode {
    pub input: NodeId,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlanNode {
    Table(TableSource),
    Join(JoinNode),
    Grouped(GroupedJoins),
    Filter(FilterNode),
    Output { input: NodeId },
}

impl PlanNode {
    /// Whether this node can be an operand of a join (and thus belong to a
    /// join island).
    pub fn is_joinable(&self) -> bool {
        matches!(
            self,
            PlanNode::Table(_) | PlanNode::Join(_) | PlanNode::Grouped(_)
        )
    }
}

/// A confirmed (or candidate) group join: the child table's declared parent
/// relationship, witnessed by one predicate per key column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupJoin {
    pub group: GroupId,
    pub parent: NodeId,
    pub child: NodeId,
    /// One witness per declared key-column pair, in declaration order.
    pub witnesses: Vec<Witness>,
}

/// The predicate that witnessed one key-column pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Witness {
    /// The comparison rewritten to exactly `child key = parent key`,
    /// possibly through column equivalences.
    pub normalized: Comparison,
    /// ID of the source condition in the list it was found in.
    pub original: ConditionId,
}

/// Arena-allocated plan for a single query, plus the grouping state the
/// rewrite pass accumulates over it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    nodes: Vec<PlanNode>,
    root: Option<NodeId>,
    pub groups: TableGroups,
    pub group_joins: Vec<GroupJoin>,
    next_condition: ConditionId,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_node(&mut self, node: PlanNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Add a table reference, copying its hierarchy position from the
    /// catalog. The alias defaults to the table name.
    pub fn add_table_source(&mut self, catalog: &SchemaCatalog, table: TableId) -> NodeId {
        let name = catalog.table(table).name.clone();
        self.add_aliased_table_source(catalog, table, name)
    }

    pub fn add_aliased_table_source(
        &mut self,
        catalog: &SchemaCatalog,
        table: TableId,
        alias: impl Into<String>,
    ) -> NodeId {
        let meta = catalog.table(table);
        let node = TableSource {
            table,
            name: alias.into(),
            hierarchy: meta.hierarchy,
            ordinal: meta.ordinal,
            group: None,
            parent_join: None,
        };
        self.add_node(PlanNode::Table(node))
    }

    pub fn add_join(
        &mut self,
        kind: JoinType,
        left: NodeId,
        right: NodeId,
        conditions: Vec<Condition>,
    ) -> NodeId {
        self.add_node(PlanNode::Join(JoinNode {
            kind,
            left,
            right,
            conditions,
            group_join: None,
        }))
    }

    pub fn add_grouped(&mut self, joins: NodeId, group: GroupId, tables: Vec<NodeId>) -> NodeId {
        self.add_node(PlanNode::Grouped(GroupedJoins {
            joins,
            group,
            tables,
        }))
    }

    pub fn add_filter(&mut self, input: NodeId, conditions: Vec<Condition>) -> NodeId {
        self.add_node(PlanNode::Filter(FilterNode { input, conditions }))
    }

    pub fn add_output(&mut self, input: NodeId) -> NodeId {
        let id = self.add_node(PlanNode::Output { input });
        self.root = Some(id);
        id
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Mint a condition with a plan-unique ID.
    pub fn new_condition(&mut self, kind: ConditionKind) -> Condition {
        let id = self.next_condition;
        self.next_condition += 1;
        Condition { id, kind }
    }

    pub fn new_comparison(&mut self, cmp: Comparison) -> Condition {
        self.new_condition(ConditionKind::Comparison(cmp))
    }

    // ---- accessors -------------------------------------------------------

    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut PlanNode {
        &mut self.nodes[id]
    }

    pub fn table_source(&self, id: NodeId) -> Option<&TableSource> {
        match &self.nodes[id] {
            PlanNode::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn table_source_mut(&mut self, id: NodeId) -> Option<&mut TableSource> {
        match &mut self.nodes[id] {
            PlanNode::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn join(&self, id: NodeId) -> Option<&JoinNode> {
        match &self.nodes[id] {
            PlanNode::Join(j) => Some(j),
            _ => None,
        }
    }

    pub fn join_mut(&mut self, id: NodeId) -> Option<&mut JoinNode> {
        match &mut self.nodes[id] {
            PlanNode::Join(j) => Some(j),
            _ => None,
        }
    }

    pub fn grouped(&self, id: NodeId) -> Option<&GroupedJoins> {
        match &self.nodes[id] {
            PlanNode::Grouped(g) => Some(g),
            _ => None,
        }
    }

    pub fn group_join(&self, id: GroupJoinId) -> &GroupJoin {
        &self.group_joins[id]
    }

    pub fn add_group_join(&mut self, join: GroupJoin) -> GroupJoinId {
        self.group_joins.push(join);
        self.group_joins.len() - 1
    }

    /// Children of a node, in left-to-right order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match &self.nodes[id] {
            PlanNode::Table(_) => vec![],
            PlanNode::Join(j) => vec![j.left, j.right],
            PlanNode::Grouped(g) => vec![g.joins],
            PlanNode::Filter(f) => vec![f.input],
            PlanNode::Output { input } => vec![*input],
        }
    }

    /// Splice `new` into the child slot of `output` currently holding `old`.
    /// With `output == None`, `old` was the plan root and `new` replaces it.
    pub fn replace_input(&mut self, output: Option<NodeId>, old: NodeId, new: NodeId) {
        let Some(output) = output else {
            debug_assert_eq!(self.root, Some(old));
            self.root = Some(new);
            return;
        };
        match &mut self.nodes[output] {
            PlanNode::Join(j) => {
                if j.left == old {
                    j.left = new;
                } else if j.right == old {
                    j.right = new;
                }
            }
            PlanNode::Grouped(g) => {
                if g.joins == old {
                    g.joins = new;
                }
            }
            PlanNode::Filter(f) => {
                if f.input == old {
                    f.input = new;
                }
            }
            PlanNode::Output { input } => {
                if *input == old {
                    *input = new;
                }
            }
            PlanNode::Table(_) => {}
        }
    }

    // ---- condition lists -------------------------------------------------

    /// The WHERE list of a consumer, if it is predicate-bearing.
    pub fn where_conditions(&self, consumer: NodeId) -> Option<&Vec<Condition>> {
        match &self.nodes[consumer] {
            PlanNode::Filter(f) => Some(&f.conditions),
            _ => None,
        }
    }

    pub fn where_conditions_mut(&mut self, consumer: NodeId) -> Option<&mut Vec<Condition>> {
        match &mut self.nodes[consumer] {
            PlanNode::Filter(f) => Some(&mut f.conditions),
            _ => None,
        }
    }

    // ---- grouping state --------------------------------------------------

    /// The table's group, resolved to its representative.
    pub fn group_of(&self, table: NodeId) -> Option<GroupId> {
        self.table_source(table)
            .and_then(|t| t.group)
            .map(|g| self.groups.find(g))
    }

    /// Assign (or re-resolve) a table's group membership, recording it as a
    /// member and widening the group's ordinal range.
    pub fn assign_group(&mut self, table: NodeId, group: GroupId) {
        let rep = self.groups.find(group);
        let ordinal = match self.table_source(table) {
            Some(t) => t.ordinal,
            None => return,
        };
        self.groups.add_member(rep, table, ordinal);
        if let Some(t) = self.table_source_mut(table) {
            t.group = Some(rep);
        }
    }

    // ---- rendering -------------------------------------------------------

    /// Render an expression with catalog names, e.g. `order.customer_id`.
    pub fn render_expr(&self, catalog: &SchemaCatalog, expr: &Expr) -> String {
        match expr {
            Expr::Column(c) => {
                let alias = self
                    .table_source(c.source)
                    .map(|t| t.name.as_str())
                    .unwrap_or("?");
                format!("{}.{}", alias, catalog.column_name(c.column))
            }
            Expr::Literal(v) => format!("{v:?}"),
            Expr::Function { name, args } => {
                let rendered: Vec<String> =
                    args.iter().map(|a| self.render_expr(catalog, a)).collect();
                format!("{}({})", name, rendered.join(", "))
            }
        }
    }

    pub fn render_comparison(&self, catalog: &SchemaCatalog, cmp: &Comparison) -> String {
        let op = match cmp.op {
            crate::expr::CompareOp::Eq => "=",
            crate::expr::CompareOp::NotEq => "<>",
            crate::expr::CompareOp::Lt => "<",
            crate::expr::CompareOp::LtEq => "<=",
            crate::expr::CompareOp::Gt => ">",
            crate::expr::CompareOp::GtEq => ">=",
        };
        format!(
            "{} {} {}",
            self.render_expr(catalog, &cmp.left),
            op,
            self.render_expr(catalog, &cmp.right)
        )
    }
}
