//! # Table Groups
//!
//! A table group is the set of table references known to occupy the same
//! storage hierarchy, discovered incrementally by the group-join detector.
//! Groups are merged, never split, so they are represented as an
//! arena-allocated union-find: each slot points at a parent slot, the
//! representative owns the member list and the ordinal range, and merging
//! redirects one representative to the other.
//!
//! The min/max ordinal range is inherited and widened by merges, never
//! narrowed. It is purely a deterministic tie-break for ordering groups
//! against each other, not a storage fact.

use crate::plan::NodeId;
use crate::schema::HierarchyId;
use serde::{Deserialize, Serialize};

/// Index of a group slot in the arena. Callers should resolve through
/// [`TableGroups::find`] before comparing.
pub type GroupId = usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GroupSlot {
    /// Union-find parent; equal to the slot's own index for representatives.
    parent: GroupId,
    hierarchy: HierarchyId,
    min_ordinal: u32,
    max_ordinal: u32,
    /// Member table references. Only meaningful on representatives; moved
    /// wholesale on merge.
    tables: Vec<NodeId>,
}

/// Arena of table groups for one plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableGroups {
    slots: Vec<GroupSlot>,
}

impl TableGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh, empty group within the given storage hierarchy.
    pub fn new_group(&mut self, hierarchy: HierarchyId) -> GroupId {
        let id = self.slots.len();
        self.slots.push(GroupSlot {
            parent: id,
            hierarchy,
            min_ordinal: u32::MAX,
            max_ordinal: 0,
            tables: Vec::new(),
        });
        id
    }

    /// Resolve a group to its representative.
    pub fn find(&self, mut id: GroupId) -> GroupId {
        while self.slots[id].parent != id {
            id = self.slots[id].parent;
        }
        id
    }

    pub fn same(&self, a: GroupId, b: GroupId) -> bool {
        self.find(a) == self.find(b)
    }

    /// Merge `b` into `a`, returning the surviving representative. Member
    /// lists are unioned and the ordinal range widened. Idempotent when the
    /// two already share a representative.
    pub fn merge(&mut self, a: GroupId, b: GroupId) -> GroupId {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        let moved = std::mem::take(&mut self.slots[rb].tables);
        let (min_b, max_b) = (self.slots[rb].min_ordinal, self.slots[rb].max_ordinal);
        self.slots[rb].parent = ra;
        let slot = &mut self.slots[ra];
        slot.tables.extend(moved);
        slot.min_ordinal = slot.min_ordinal.min(min_b);
        slot.max_ordinal = slot.max_ordinal.max(max_b);
        ra
    }

    /// Record a table reference as a member, widening the ordinal range.
    /// Adding an existing member is a no-op.
    pub fn add_member(&mut self, id: GroupId, table: NodeId, ordinal: u32) {
        let rep = self.find(id);
        let slot = &mut self.slots[rep];
        if !slot.tables.contains(&table) {
            slot.tables.push(table);
        }
        slot.min_ordinal = slot.min_ordinal.min(ordinal);
        slot.max_ordinal = slot.max_ordinal.max(ordinal);
    }

    pub fn hierarchy(&self, id: GroupId) -> HierarchyId {
        self.slots[self.find(id)].hierarchy
    }

    pub fn min_ordinal(&self, id: GroupId) -> u32 {
        self.slots[self.find(id)].min_ordinal
    }

    pub fn max_ordinal(&self, id: GroupId) -> u32 {
        self.slots[self.find(id)].max_ordinal
    }

    /// Member table references of the group.
    pub fn tables(&self, id: GroupId) -> &[NodeId] {
        &self.slots[self.find(id)].tables
    }
}
