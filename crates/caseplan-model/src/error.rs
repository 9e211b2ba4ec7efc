//! Model-local error types.

use crate::ids::CaseFileItemId;

/// Errors raised by aggregate-local invariant checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("case-file item {0:?} not found")]
    CaseFileItemNotFound(CaseFileItemId),

    #[error("case-file item {0:?} still has children")]
    CaseFileItemHasChildren(CaseFileItemId),

    #[error("case-file parent cycle through {0:?}")]
    CaseFileParentCycle(CaseFileItemId),

    #[error("case-file item {0:?} already present")]
    DuplicateCaseFileItem(CaseFileItemId),
}
