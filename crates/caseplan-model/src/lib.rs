//! Caseplan Object Model
//!
//! Typed semantic objects for a hierarchical case-modeling notation:
//! item definitions, sentries and on-parts, planning tables, containers,
//! the case-file tree/graph, and the graphical layer (shapes, connections)
//! that the consistency engine reads and writes back to.
//!
//! # Overview
//!
//! The model is deliberately passive: it holds data and enforces only the
//! invariants that are local to a single aggregate (for example symmetric
//! case-file reference edges). Cross-aggregate invariants — ownership,
//! sharing, lazy lifecycles — are the job of `caseplan-engine`.

pub mod casefile;
pub mod container;
pub mod definition;
pub mod error;
pub mod ids;
pub mod kinds;
pub mod sentry;
pub mod shape;
pub mod table;

// Re-exports
pub use casefile::{CaseFileItem, CaseFileModel};
pub use container::{Container, ContainerKind};
pub use definition::{ControlRules, ItemDefinition};
pub use error::ModelError;
pub use ids::{
    CaseFileItemId, ConnectionId, ContainerId, DefinitionId, OnPartId, SentryId, ShapeId, TableId,
};
pub use kinds::{ItemKind, StandardEvent};
pub use sentry::{OnPart, OnPartFamily, OnPartSource, Sentry};
pub use shape::{Connection, ConnectionKind, CriterionKind, Shape, ShapeKind};
pub use table::{PlanningTable, TableOwner};
