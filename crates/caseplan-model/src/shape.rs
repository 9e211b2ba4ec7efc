//! The graphical layer: shapes and connections.
//!
//! In the full application these belong to the diagramming framework; the
//! engine reads them to determine structural context (the container chain)
//! and writes back the single reference each shape carries into the
//! semantic model (its definition, sentry, or case-file item).

use crate::ids::{CaseFileItemId, ContainerId, DefinitionId, OnPartId, SentryId, ShapeId};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Entry/exit polarity of a criterion shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriterionKind {
    Entry,
    Exit,
}

/// What a shape stands for, with its single semantic reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    /// The diagram root; always present, never moved or deleted.
    CasePlan { container: ContainerId },
    /// A required occurrence of a definition; stages carry their container.
    PlanItem {
        definition: DefinitionId,
        container: Option<ContainerId>,
    },
    /// An optional occurrence of a definition, held by a planning table.
    DiscretionaryItem {
        definition: DefinitionId,
        container: Option<ContainerId>,
    },
    /// A criterion attached to a host shape, referencing its gate.
    Criterion {
        polarity: CriterionKind,
        sentry: Option<SentryId>,
        host: ShapeId,
    },
    /// The graphical stand-in for a case-file item.
    CaseFileItem { item: CaseFileItemId },
}

/// A graphical element in the shape tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub parent: Option<ShapeId>,
    pub children: IndexSet<ShapeId>,
    pub kind: ShapeKind,
}

impl Shape {
    pub fn new(parent: Option<ShapeId>, kind: ShapeKind) -> Self {
        Self {
            parent,
            children: IndexSet::new(),
            kind,
        }
    }

    /// The definition this shape references, if it is an item shape.
    pub fn definition(&self) -> Option<DefinitionId> {
        match &self.kind {
            ShapeKind::PlanItem { definition, .. }
            | ShapeKind::DiscretionaryItem { definition, .. } => Some(*definition),
            _ => None,
        }
    }

    /// The container this shape itself provides (case plan or stage item).
    pub fn own_container(&self) -> Option<ContainerId> {
        match &self.kind {
            ShapeKind::CasePlan { container } => Some(*container),
            ShapeKind::PlanItem { container, .. }
            | ShapeKind::DiscretionaryItem { container, .. } => *container,
            _ => None,
        }
    }

    pub fn is_discretionary(&self) -> bool {
        matches!(self.kind, ShapeKind::DiscretionaryItem { .. })
    }

    pub fn criterion_sentry(&self) -> Option<SentryId> {
        match &self.kind {
            ShapeKind::Criterion { sentry, .. } => *sentry,
            _ => None,
        }
    }

    /// Attachment owner, for criterion shapes.
    pub fn host(&self) -> Option<ShapeId> {
        match &self.kind {
            ShapeKind::Criterion { host, .. } => Some(*host),
            _ => None,
        }
    }
}

/// Semantic role of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// Carries an on-part: source element triggers the target criterion.
    OnPartLink(OnPartId),
    /// Human task to discretionary item.
    DiscretionaryAssociation,
    /// Plain association with no sentry participation.
    Association,
}

/// An edge in the diagram between two shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: ShapeId,
    pub target: ShapeId,
    pub kind: ConnectionKind,
}

impl Connection {
    pub fn new(source: ShapeId, target: ShapeId, kind: ConnectionKind) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }

    pub fn on_part(&self) -> Option<OnPartId> {
        match self.kind {
            ConnectionKind::OnPartLink(op) => Some(op),
            _ => None,
        }
    }
}
