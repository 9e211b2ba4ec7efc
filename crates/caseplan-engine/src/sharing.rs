//! Copy-on-write resolution for shared item definitions.
//!
//! Several item shapes may reference one definition (copy/paste keeps the
//! reference). The sharing is preserved until an edit would make the shared
//! state diverge; only then is the definition split, and only for the edited
//! shape. Detection goes through the reverse index, never a store scan.

use crate::document::Document;
use crate::error::EngineError;
use crate::membership::{common_container_of, enclosing_container};
use crate::mutation::{MemberId, MemberSet, Mutation};
use crate::registry::ElementRef;
use crate::stack::TxBuilder;
use caseplan_model::{ContainerId, DefinitionId, ShapeId};

/// Item shapes currently referencing `definition`.
pub(crate) fn item_shapes_referencing(doc: &Document, definition: DefinitionId) -> Vec<ShapeId> {
    doc.registry()
        .references_of(ElementRef::Definition(definition))
        .into_iter()
        .filter_map(|r| match r {
            ElementRef::Shape(s) => Some(s),
            _ => None,
        })
        .collect()
}

/// Give `shape` a definition no other item shape references, splitting the
/// shared one if needed. Returns the definition the shape references after
/// the call.
pub(crate) fn ensure_exclusive(
    tx: &mut TxBuilder<'_>,
    shape: ShapeId,
) -> Result<DefinitionId, EngineError> {
    let definition = tx
        .doc()
        .shape_ref(shape)?
        .definition()
        .ok_or_else(|| EngineError::IllegalEdit(format!("{shape:?} carries no definition")))?;

    let others: Vec<_> = item_shapes_referencing(tx.doc(), definition)
        .into_iter()
        .filter(|s| *s != shape)
        .collect();
    if others.is_empty() {
        return Ok(definition);
    }

    let original = tx
        .doc()
        .definition(definition)
        .cloned()
        .ok_or_else(|| EngineError::NotFound("definition", format!("{definition:?}")))?;
    let owner = enclosing_container(tx.doc(), shape)?;
    let sid = tx.alloc_sid(original.kind.sid_prefix());
    let (clone_id, mut clone) = original.split_copy(sid);
    clone.owner = owner;

    tracing::debug!(?definition, ?clone_id, "splitting shared definition");
    tx.apply(Mutation::InsertDefinition {
        id: clone_id,
        definition: clone,
    })?;
    tx.apply(Mutation::AddMember {
        set: MemberSet::ContainerDefinitions(owner),
        member: MemberId::Definition(clone_id),
        at: None,
    })?;
    tx.apply(Mutation::SetShapeDefinition {
        id: shape,
        definition: clone_id,
    })?;
    Ok(clone_id)
}

/// Make `definition` a member of `target`, splitting first when other item
/// shapes still need it where it is.
pub(crate) fn ensure_container_membership(
    tx: &mut TxBuilder<'_>,
    shape: ShapeId,
    target: ContainerId,
) -> Result<DefinitionId, EngineError> {
    let definition = tx
        .doc()
        .shape_ref(shape)?
        .definition()
        .ok_or_else(|| EngineError::IllegalEdit(format!("{shape:?} carries no definition")))?;

    let others: Vec<_> = item_shapes_referencing(tx.doc(), definition)
        .into_iter()
        .filter(|s| *s != shape)
        .collect();

    let others_common = if others.is_empty() {
        None
    } else {
        let containers: Vec<_> = others
            .iter()
            .map(|s| enclosing_container(tx.doc(), *s))
            .collect::<Result<_, _>>()?;
        Some(common_container_of(tx.doc(), &containers)?)
    };

    match others_common {
        // Divergence: the definition stays where the other shapes need it
        // and the moved shape gets its own copy in the target container.
        Some(common) if common != target => {
            let original = tx
                .doc()
                .definition(definition)
                .cloned()
                .ok_or_else(|| EngineError::NotFound("definition", format!("{definition:?}")))?;
            let sid = tx.alloc_sid(original.kind.sid_prefix());
            let (clone_id, mut clone) = original.split_copy(sid);
            clone.owner = target;

            tracing::debug!(?definition, ?clone_id, ?target, "definition diverges on move");
            tx.apply(Mutation::InsertDefinition {
                id: clone_id,
                definition: clone,
            })?;
            tx.apply(Mutation::AddMember {
                set: MemberSet::ContainerDefinitions(target),
                member: MemberId::Definition(clone_id),
                at: None,
            })?;
            tx.apply(Mutation::SetShapeDefinition {
                id: shape,
                definition: clone_id,
            })?;
            Ok(clone_id)
        }
        // Still shared in one place, or exclusive: migrate membership.
        _ => {
            migrate_definition(tx, definition, target)?;
            Ok(definition)
        }
    }
}

/// Recompute `definition`'s owner as the nearest common container of every
/// referencing item shape, migrating membership if it changed. Used after a
/// clone adds a reference; sharing widens the scope, it never splits here.
pub(crate) fn rederive_definition_owner(
    tx: &mut TxBuilder<'_>,
    definition: DefinitionId,
) -> Result<(), EngineError> {
    let shapes = item_shapes_referencing(tx.doc(), definition);
    if shapes.is_empty() {
        return Ok(());
    }
    let containers: Vec<_> = shapes
        .iter()
        .map(|s| enclosing_container(tx.doc(), *s))
        .collect::<Result<_, _>>()?;
    let target = common_container_of(tx.doc(), &containers)?;
    migrate_definition(tx, definition, target)
}

fn migrate_definition(
    tx: &mut TxBuilder<'_>,
    definition: DefinitionId,
    target: ContainerId,
) -> Result<(), EngineError> {
    let owner = tx
        .doc()
        .definition(definition)
        .ok_or_else(|| EngineError::NotFound("definition", format!("{definition:?}")))?
        .owner;
    if owner == target {
        // Idempotent: membership converges instead of double-applying.
        tx.apply(Mutation::AddMember {
            set: MemberSet::ContainerDefinitions(target),
            member: MemberId::Definition(definition),
            at: None,
        })?;
        return Ok(());
    }
    tx.apply(Mutation::RemoveMember {
        set: MemberSet::ContainerDefinitions(owner),
        member: MemberId::Definition(definition),
    })?;
    tx.apply(Mutation::AddMember {
        set: MemberSet::ContainerDefinitions(target),
        member: MemberId::Definition(definition),
        at: None,
    })?;
    tx.apply(Mutation::SetDefinitionOwner {
        id: definition,
        owner: target,
    })?;
    Ok(())
}
