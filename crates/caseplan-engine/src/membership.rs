//! Structural container derivation.
//!
//! A shape's structural container is never stored on the shape; it is read
//! off the shape tree on demand. The walk goes up through strict ancestors
//! until one provides a container (a stage item or the case plan root).

use crate::document::Document;
use crate::error::EngineError;
use caseplan_model::{ContainerId, ShapeId};

/// The container enclosing `shape`: the nearest strict ancestor that is
/// itself a container. The root case plan shape encloses itself.
pub(crate) fn enclosing_container(
    doc: &Document,
    shape: ShapeId,
) -> Result<ContainerId, EngineError> {
    let mut cursor = doc.shape_ref(shape)?.parent;
    while let Some(ancestor) = cursor {
        let node = doc.shape_ref(ancestor)?;
        if let Some(container) = node.own_container() {
            return Ok(container);
        }
        cursor = node.parent;
    }
    // Only the root has no parent; it provides the case plan container.
    doc.shape_ref(shape)?
        .own_container()
        .ok_or_else(|| EngineError::InconsistentSharedState(format!("{shape:?} has no enclosing container")))
}

/// The shape providing `container`, found via the reverse direction.
pub(crate) fn container_shape(doc: &Document, container: ContainerId) -> Option<ShapeId> {
    doc.shapes_iter()
        .find(|(_, s)| s.own_container() == Some(container))
        .map(|(id, _)| id)
}

/// The container chain from `container` up to the case plan root, inclusive,
/// innermost first.
pub(crate) fn container_chain(
    doc: &Document,
    container: ContainerId,
) -> Result<Vec<ContainerId>, EngineError> {
    let mut chain = vec![container];
    let mut cursor = container;
    while cursor != doc.case_plan() {
        let shape = container_shape(doc, cursor).ok_or_else(|| {
            EngineError::InconsistentSharedState(format!("{cursor:?} has no providing shape"))
        })?;
        cursor = enclosing_container(doc, shape)?;
        chain.push(cursor);
    }
    Ok(chain)
}

/// The innermost container enclosing both arguments.
pub(crate) fn common_container(
    doc: &Document,
    a: ContainerId,
    b: ContainerId,
) -> Result<ContainerId, EngineError> {
    if a == b {
        return Ok(a);
    }
    let chain_a = container_chain(doc, a)?;
    let chain_b = container_chain(doc, b)?;
    for candidate in &chain_a {
        if chain_b.contains(candidate) {
            return Ok(*candidate);
        }
    }
    // Both chains end at the case plan, so this is unreachable in a
    // well-formed document.
    Err(EngineError::InconsistentSharedState(format!(
        "{a:?} and {b:?} share no enclosing container"
    )))
}

/// The innermost container enclosing every container in `containers`.
pub(crate) fn common_container_of(
    doc: &Document,
    containers: &[ContainerId],
) -> Result<ContainerId, EngineError> {
    let mut iter = containers.iter();
    let Some(first) = iter.next() else {
        return Ok(doc.case_plan());
    };
    let mut common = *first;
    for container in iter {
        common = common_container(doc, common, *container)?;
    }
    Ok(common)
}
