//! Item definitions — the reusable "kind" objects graphical items point at.

use crate::ids::{ContainerId, DefinitionId};
use crate::kinds::ItemKind;
use serde::{Deserialize, Serialize};

/// Per-definition control rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlRules {
    pub required: bool,
    pub repeatable: bool,
    pub manual_activation: bool,
}

/// The reusable description of a task/stage/milestone/event-listener kind.
///
/// A definition has exactly one owning container at any time. It may be
/// referenced by any number of graphical items simultaneously; that sharing
/// relation is tracked by the engine's reference registry, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    /// Stable id in the notation's namespace.
    pub sid: String,
    pub kind: ItemKind,
    pub rules: ControlRules,
    /// Human tasks only; blocking tasks cannot own a planning table.
    pub blocking: bool,
    /// Stages only.
    pub auto_complete: bool,
    /// Owning container (not the sharing relation).
    pub owner: ContainerId,
}

impl ItemDefinition {
    pub fn new(sid: String, kind: ItemKind, owner: ContainerId) -> Self {
        Self {
            sid,
            kind,
            rules: ControlRules::default(),
            blocking: true,
            auto_complete: false,
            owner,
        }
    }

    /// Copy-on-write clone: same configuration under a fresh stable id.
    ///
    /// Shallow by construction — definitions hold no shared mutable
    /// sub-objects.
    pub fn split_copy(&self, sid: String) -> (DefinitionId, Self) {
        let copy = Self { sid, ..self.clone() };
        (DefinitionId::new(), copy)
    }
}
