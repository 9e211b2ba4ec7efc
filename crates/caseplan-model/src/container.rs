//! Structural containers: the case plan model and stages.

use crate::ids::{DefinitionId, SentryId};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    CasePlanModel,
    Stage,
}

/// A structural container and its authoritative membership collections.
///
/// Membership is keyed by identity; adds and removes are idempotent at the
/// engine's mutation layer so that independent cascade steps converge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub sid: String,
    pub kind: ContainerKind,
    pub definitions: IndexSet<DefinitionId>,
    pub sentries: IndexSet<SentryId>,
}

impl Container {
    pub fn new(sid: String, kind: ContainerKind) -> Self {
        Self {
            sid,
            kind,
            definitions: IndexSet::new(),
            sentries: IndexSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.sentries.is_empty()
    }
}
