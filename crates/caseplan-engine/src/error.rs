//! Error taxonomy for the consistency engine.
//!
//! `DanglingReference` is recovered locally inside cascade steps (the
//! dependent step is skipped). Everything else aborts the surrounding
//! transaction: already-applied mutations are unwound before the error
//! reaches the caller, so the graph is never left partially synchronized.

use caseplan_model::ModelError;

/// Errors raised by the reference registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The id is already bound to another element.
    #[error("id `{0}` already registered")]
    DuplicateId(String),

    /// The id is not bound at all.
    #[error("id `{0}` not registered")]
    UnknownId(String),
}

/// Top-level engine error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An id resolved to nothing mid-cascade. Callers inside reaction steps
    /// treat this as "reference absent" and skip; at the dispatch boundary
    /// it aborts the edit.
    #[error("dangling reference: {0}")]
    DanglingReference(String),

    /// A store lookup failed for an element the edit explicitly names.
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    /// Referencing items yield no common structural container. This is a
    /// caller invariant violation; the transaction aborts rather than
    /// guessing an owner.
    #[error("inconsistent shared state: {0}")]
    InconsistentSharedState(String),

    /// The requested edit is structurally meaningless (cycle-producing
    /// reparent, criterion on an event listener, and so on).
    #[error("illegal edit: {0}")]
    IllegalEdit(String),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),
}
