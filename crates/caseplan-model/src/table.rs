//! Planning tables — lazy containers for discretionary items.

use crate::ids::{ContainerId, ShapeId};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Eligible owner of a planning table: a stage/case-plan container or a
/// non-blocking human task item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableOwner {
    Container(ContainerId),
    HumanTask(ShapeId),
}

/// The container holding an owner's discretionary items.
///
/// Exists if and only if at least one discretionary item is attached to the
/// owner; the engine creates it lazily and removes it when emptied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningTable {
    pub sid: String,
    pub owner: TableOwner,
    pub items: IndexSet<ShapeId>,
}

impl PlanningTable {
    pub fn new(sid: String, owner: TableOwner) -> Self {
        Self {
            sid,
            owner,
            items: IndexSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
