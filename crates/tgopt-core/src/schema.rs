//! # Schema Catalog
//!
//! Read-only metadata consumed by the rewrite pass: which tables exist,
//! which storage hierarchy each belongs to, the table's ordinal within its
//! hierarchy, and the declared parent-child key relationship (if any) that
//! makes a join recognizable as a group join.
//!
//! The catalog is populated programmatically for tests and development. In
//! production it would be backed by the server's schema service; the pass
//! only ever reads from it.

use serde::{Deserialize, Serialize};

/// Index of a table in the catalog.
pub type TableId = usize;

/// Index of a storage hierarchy in the catalog.
pub type HierarchyId = usize;

/// A schema column, identified by its table and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnId {
    pub table: TableId,
    pub index: usize,
}

/// One child-key/parent-key column pair of a declared parent join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyColumnPair {
    pub child: ColumnId,
    pub parent: ColumnId,
}

/// A table's declared relationship to its storage parent.
///
/// All key-column pairs must be matched by equality predicates for a join to
/// qualify as a group join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentJoin {
    pub parent: TableId,
    pub key: Vec<KeyColumnPair>,
}

/// Per-table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    pub hierarchy: HierarchyId,
    /// Position in the declared hierarchy; parents precede children.
    /// Used only for deterministic ordering.
    pub ordinal: u32,
    pub columns: Vec<String>,
    pub parent_join: Option<ParentJoin>,
}

/// A storage hierarchy ("table group" in the schema sense): a named tree of
/// physically co-located tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyMeta {
    pub name: String,
}

/// In-memory schema catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    hierarchies: Vec<HierarchyMeta>,
    tables: Vec<TableMeta>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_hierarchy(&mut self, name: impl Into<String>) -> HierarchyId {
        self.hierarchies.push(HierarchyMeta { name: name.into() });
        self.hierarchies.len() - 1
    }

    pub fn add_table(
        &mut self,
        name: impl Into<String>,
        hierarchy: HierarchyId,
        ordinal: u32,
        columns: &[&str],
    ) -> TableId {
        self.tables.push(TableMeta {
            name: name.into(),
            hierarchy,
            ordinal,
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            parent_join: None,
        });
        self.tables.len() - 1
    }

    /// Declare `child`'s storage parent, with key columns given by name as
    /// `(child_column, parent_column)` pairs in declaration order.
    ///
    /// Panics if a column name is unknown; catalogs are built by test and
    /// bootstrap code where that is a programming error.
    pub fn link_parent(&mut self, child: TableId, parent: TableId, pairs: &[(&str, &str)]) {
        let key = pairs
            .iter()
            .map(|(c, p)| KeyColumnPair {
                child: self
                    .column(child, c)
                    .unwrap_or_else(|| panic!("unknown column {c} on {}", self.tables[child].name)),
                parent: self
                    .column(parent, p)
                    .unwrap_or_else(|| panic!("unknown column {p} on {}", self.tables[parent].name)),
            })
            .collect();
        self.tables[child].parent_join = Some(ParentJoin { parent, key });
    }

    pub fn table(&self, id: TableId) -> &TableMeta {
        &self.tables[id]
    }

    pub fn hierarchy_name(&self, id: HierarchyId) -> &str {
        &self.hierarchies[id].name
    }

    /// Resolve a column by name on the given table.
    pub fn column(&self, table: TableId, name: &str) -> Option<ColumnId> {
        self.tables[table]
            .columns
            .iter()
            .position(|c| c == name)
            .map(|index| ColumnId { table, index })
    }

    pub fn column_name(&self, column: ColumnId) -> &str {
        &self.tables[column.table].columns[column.index]
    }
}
