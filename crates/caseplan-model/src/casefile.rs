//! The case file: a tree of items plus non-owning source/target reference
//! edges between them.
//!
//! The tree (parent/children) is ownership; the reference edges are a
//! directed graph kept symmetric by construction: an edge A→B means B lists
//! A among its sources and A lists B among its targets. Removing an item
//! prunes every incident edge.

use crate::error::ModelError;
use crate::ids::CaseFileItemId;
use indexmap::{IndexMap, IndexSet};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

/// A node in the case-file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFileItem {
    pub sid: String,
    pub parent: Option<CaseFileItemId>,
    pub children: IndexSet<CaseFileItemId>,
}

impl CaseFileItem {
    pub fn new(sid: String) -> Self {
        Self {
            sid,
            parent: None,
            children: IndexSet::new(),
        }
    }
}

/// The case-file model: item arena plus reference edges.
#[derive(Debug, Clone, Default)]
pub struct CaseFileModel {
    items: IndexMap<CaseFileItemId, CaseFileItem>,
    refs: DiGraphMap<CaseFileItemId, ()>,
}

impl CaseFileModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: CaseFileItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn get(&self, id: CaseFileItemId) -> Option<&CaseFileItem> {
        self.items.get(&id)
    }

    /// Rebind an item's stable id. The caller keeps its registry in step.
    pub fn set_sid(&mut self, id: CaseFileItemId, sid: String) -> Result<(), ModelError> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or(ModelError::CaseFileItemNotFound(id))?;
        item.sid = sid;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (CaseFileItemId, &CaseFileItem)> {
        self.items.iter().map(|(id, item)| (*id, item))
    }

    /// Insert an item. Its `parent` field, if set, must resolve; the item is
    /// appended to (or spliced into, when `child_index` is given) the
    /// parent's children.
    pub fn insert(
        &mut self,
        id: CaseFileItemId,
        item: CaseFileItem,
        child_index: Option<usize>,
    ) -> Result<(), ModelError> {
        if self.items.contains_key(&id) {
            return Err(ModelError::DuplicateCaseFileItem(id));
        }
        if let Some(parent) = item.parent {
            let parent_item = self
                .items
                .get_mut(&parent)
                .ok_or(ModelError::CaseFileItemNotFound(parent))?;
            match child_index {
                Some(at) if at <= parent_item.children.len() => {
                    parent_item.children.shift_insert(at, id);
                }
                _ => {
                    parent_item.children.insert(id);
                }
            }
        }
        self.items.insert(id, item);
        self.refs.add_node(id);
        Ok(())
    }

    /// Remove a leaf item, detaching it from its parent and pruning every
    /// incident reference edge. Returns the removed item, its old position
    /// in the parent's children, and the pruned edges (as from→to pairs) so
    /// the caller can make the removal reversible.
    #[allow(clippy::type_complexity)]
    pub fn remove(
        &mut self,
        id: CaseFileItemId,
    ) -> Result<
        (
            CaseFileItem,
            Option<usize>,
            Vec<(CaseFileItemId, CaseFileItemId)>,
        ),
        ModelError,
    > {
        let item = self
            .items
            .get(&id)
            .ok_or(ModelError::CaseFileItemNotFound(id))?;
        if !item.children.is_empty() {
            return Err(ModelError::CaseFileItemHasChildren(id));
        }

        let mut pruned = Vec::new();
        for src in self.refs.neighbors_directed(id, Direction::Incoming) {
            pruned.push((src, id));
        }
        for dst in self.refs.neighbors_directed(id, Direction::Outgoing) {
            pruned.push((id, dst));
        }
        self.refs.remove_node(id);

        let item = self
            .items
            .shift_remove(&id)
            .ok_or(ModelError::CaseFileItemNotFound(id))?;
        let mut child_index = None;
        if let Some(parent) = item.parent {
            if let Some(parent_item) = self.items.get_mut(&parent) {
                child_index = parent_item.children.shift_remove_full(&id).map(|(i, _)| i);
            }
        }
        Ok((item, child_index, pruned))
    }

    /// Reparent an item. Returns the old parent and the item's old position
    /// in that parent's children.
    pub fn set_parent(
        &mut self,
        id: CaseFileItemId,
        new_parent: Option<CaseFileItemId>,
        child_index: Option<usize>,
    ) -> Result<(Option<CaseFileItemId>, Option<usize>), ModelError> {
        if !self.items.contains_key(&id) {
            return Err(ModelError::CaseFileItemNotFound(id));
        }
        // Walk up from the new parent; reaching `id` would close a cycle.
        let mut cursor = new_parent;
        while let Some(ancestor) = cursor {
            if ancestor == id {
                return Err(ModelError::CaseFileParentCycle(id));
            }
            cursor = self
                .items
                .get(&ancestor)
                .ok_or(ModelError::CaseFileItemNotFound(ancestor))?
                .parent;
        }

        let old_parent = self.items[&id].parent;
        let mut old_index = None;
        if let Some(parent) = old_parent {
            if let Some(parent_item) = self.items.get_mut(&parent) {
                old_index = parent_item.children.shift_remove_full(&id).map(|(i, _)| i);
            }
        }
        if let Some(parent) = new_parent {
            let parent_item = self
                .items
                .get_mut(&parent)
                .ok_or(ModelError::CaseFileItemNotFound(parent))?;
            match child_index {
                Some(at) if at <= parent_item.children.len() => {
                    parent_item.children.shift_insert(at, id);
                }
                _ => {
                    parent_item.children.insert(id);
                }
            }
        }
        self.items[&id].parent = new_parent;
        Ok((old_parent, old_index))
    }

    /// Add a directed reference edge. Idempotent: returns `false` when the
    /// edge was already present.
    pub fn add_reference(
        &mut self,
        from: CaseFileItemId,
        to: CaseFileItemId,
    ) -> Result<bool, ModelError> {
        if !self.items.contains_key(&from) {
            return Err(ModelError::CaseFileItemNotFound(from));
        }
        if !self.items.contains_key(&to) {
            return Err(ModelError::CaseFileItemNotFound(to));
        }
        if self.refs.contains_edge(from, to) {
            return Ok(false);
        }
        self.refs.add_edge(from, to, ());
        Ok(true)
    }

    /// Remove a reference edge. Idempotent: returns `false` when absent.
    pub fn remove_reference(&mut self, from: CaseFileItemId, to: CaseFileItemId) -> bool {
        self.refs.remove_edge(from, to).is_some()
    }

    pub fn has_reference(&self, from: CaseFileItemId, to: CaseFileItemId) -> bool {
        self.refs.contains_edge(from, to)
    }

    /// Items referencing `id` (the symmetric "source" view of A→id edges).
    pub fn sources_of(&self, id: CaseFileItemId) -> Vec<CaseFileItemId> {
        self.refs.neighbors_directed(id, Direction::Incoming).collect()
    }

    /// Items `id` references (the "target" view of id→B edges).
    pub fn targets_of(&self, id: CaseFileItemId) -> Vec<CaseFileItemId> {
        self.refs.neighbors_directed(id, Direction::Outgoing).collect()
    }
}
