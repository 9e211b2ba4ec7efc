//! Sentry lifecycle reactions.
//!
//! Sentries are created lazily when a connection first targets a criterion,
//! owned by the nearest common container of their referencing criteria,
//! split when one criterion moves out of that common scope, and collected
//! when the last referencing criterion lets go.

use crate::document::Document;
use crate::error::EngineError;
use crate::membership::{common_container_of, enclosing_container};
use crate::mutation::{MemberId, MemberSet, Mutation};
use crate::registry::ElementRef;
use crate::stack::TxBuilder;
use caseplan_model::{
    ConnectionId, ConnectionKind, CriterionKind, OnPart, OnPartFamily, OnPartId, OnPartSource,
    Sentry, SentryId, ShapeId, ShapeKind, StandardEvent,
};
use indexmap::IndexMap;

/// Criterion shapes currently referencing `sentry`.
pub(crate) fn criteria_referencing(doc: &Document, sentry: SentryId) -> Vec<ShapeId> {
    doc.registry()
        .references_of(ElementRef::Sentry(sentry))
        .into_iter()
        .filter_map(|r| match r {
            ElementRef::Shape(s) => Some(s),
            _ => None,
        })
        .collect()
}

/// Connections currently carrying `on_part`.
pub(crate) fn connections_referencing(doc: &Document, on_part: OnPartId) -> Vec<ConnectionId> {
    doc.registry()
        .references_of(ElementRef::OnPart(on_part))
        .into_iter()
        .filter_map(|r| match r {
            ElementRef::Connection(c) => Some(c),
            _ => None,
        })
        .collect()
}

/// The on-part source a connection from `shape` would carry, if any.
/// `None` means the connection falls back to a plain association.
pub(crate) fn source_for_shape(doc: &Document, shape: ShapeId) -> Result<Option<OnPartSource>, EngineError> {
    let node = doc.shape_ref(shape)?;
    Ok(match &node.kind {
        ShapeKind::PlanItem { .. } | ShapeKind::DiscretionaryItem { .. } => {
            Some(OnPartSource::PlanItem(shape))
        }
        ShapeKind::Criterion { polarity, .. } => match polarity {
            CriterionKind::Exit => Some(OnPartSource::Criterion(shape)),
            CriterionKind::Entry => None,
        },
        ShapeKind::CaseFileItem { item } => Some(OnPartSource::CaseFileItem(*item)),
        ShapeKind::CasePlan { .. } => None,
    })
}

/// The standard event an on-part from `source` listens for, read off the
/// source's kind. Total over all valid sources.
pub(crate) fn derive_event(doc: &Document, source: OnPartSource) -> Result<StandardEvent, EngineError> {
    match source {
        OnPartSource::Criterion(_) => Ok(StandardEvent::Exit),
        OnPartSource::CaseFileItem(_) => Ok(StandardEvent::Update),
        OnPartSource::PlanItem(shape) => {
            let definition = doc
                .shape_ref(shape)?
                .definition()
                .ok_or_else(|| EngineError::DanglingReference(format!("{shape:?}")))?;
            let kind = doc
                .definition(definition)
                .ok_or_else(|| EngineError::DanglingReference(format!("{definition:?}")))?
                .kind;
            Ok(kind.standard_event())
        }
    }
}

pub(crate) fn sid_prefix_for(source: OnPartSource) -> &'static str {
    match source.family() {
        OnPartFamily::PlanItem => "PlanItemOnPart",
        OnPartFamily::CaseFileItem => "CaseFileItemOnPart",
    }
}

/// Get or lazily create the sentry behind `criterion`, owned by the
/// container enclosing the criterion's host.
pub(crate) fn ensure_criterion_sentry(
    tx: &mut TxBuilder<'_>,
    criterion: ShapeId,
) -> Result<SentryId, EngineError> {
    let node = tx.doc().shape_ref(criterion)?;
    if let Some(existing) = node.criterion_sentry() {
        return Ok(existing);
    }
    let host = node
        .host()
        .ok_or_else(|| EngineError::IllegalEdit(format!("{criterion:?} is not a criterion")))?;
    let owner = enclosing_container(tx.doc(), host)?;

    let sentry_id = SentryId::new();
    let sid = tx.alloc_sid("Sentry");
    tracing::debug!(?criterion, ?sentry_id, "creating sentry");
    tx.apply(Mutation::InsertSentry {
        id: sentry_id,
        sentry: Sentry::new(sid, owner),
    })?;
    tx.apply(Mutation::AddMember {
        set: MemberSet::ContainerSentries(owner),
        member: MemberId::Sentry(sentry_id),
        at: None,
    })?;
    tx.apply(Mutation::SetCriterionSentry {
        id: criterion,
        sentry: Some(sentry_id),
    })?;
    Ok(sentry_id)
}

/// Recompute the sentry's owner as the nearest common container of its
/// referencing criteria's hosts, migrating membership if it changed.
pub(crate) fn rederive_owner(tx: &mut TxBuilder<'_>, sentry: SentryId) -> Result<(), EngineError> {
    let criteria = criteria_referencing(tx.doc(), sentry);
    if criteria.is_empty() {
        return Ok(());
    }
    let mut containers = Vec::with_capacity(criteria.len());
    for criterion in &criteria {
        let host = tx
            .doc()
            .shape_ref(*criterion)?
            .host()
            .ok_or_else(|| EngineError::DanglingReference(format!("{criterion:?}")))?;
        containers.push(enclosing_container(tx.doc(), host)?);
    }
    let target = common_container_of(tx.doc(), &containers)?;

    let owner = tx
        .doc()
        .sentry(sentry)
        .ok_or_else(|| EngineError::NotFound("sentry", format!("{sentry:?}")))?
        .owner;
    if owner == target {
        return Ok(());
    }
    tracing::debug!(?sentry, from = ?owner, to = ?target, "sentry owner migrates");
    tx.apply(Mutation::RemoveMember {
        set: MemberSet::ContainerSentries(owner),
        member: MemberId::Sentry(sentry),
    })?;
    tx.apply(Mutation::AddMember {
        set: MemberSet::ContainerSentries(target),
        member: MemberId::Sentry(sentry),
        at: None,
    })?;
    tx.apply(Mutation::SetSentryOwner {
        id: sentry,
        owner: target,
    })?;
    Ok(())
}

/// React to a criterion changing host. If the sentry stays resolvable to a
/// common container for every referencing criterion it merely migrates;
/// otherwise the moved criterion takes a full copy (sentry plus cloned
/// on-parts) and its connections are retagged to the copies.
pub(crate) fn react_criterion_moved(
    tx: &mut TxBuilder<'_>,
    criterion: ShapeId,
) -> Result<(), EngineError> {
    let Some(sentry) = tx.doc().shape_ref(criterion)?.criterion_sentry() else {
        return Ok(());
    };
    let others: Vec<_> = criteria_referencing(tx.doc(), sentry)
        .into_iter()
        .filter(|c| *c != criterion)
        .collect();
    if others.is_empty() {
        return rederive_owner(tx, sentry);
    }

    let host = tx
        .doc()
        .shape_ref(criterion)?
        .host()
        .ok_or_else(|| EngineError::DanglingReference(format!("{criterion:?}")))?;
    let moved_container = enclosing_container(tx.doc(), host)?;

    let mut other_containers = Vec::with_capacity(others.len());
    for other in &others {
        let other_host = tx
            .doc()
            .shape_ref(*other)?
            .host()
            .ok_or_else(|| EngineError::DanglingReference(format!("{other:?}")))?;
        other_containers.push(enclosing_container(tx.doc(), other_host)?);
    }
    let others_common = common_container_of(tx.doc(), &other_containers)?;
    let all_common = common_container_of(tx.doc(), &[others_common, moved_container])?;

    if all_common == others_common || all_common == moved_container {
        // The whole group still resolves to one scope; keep sharing.
        return rederive_owner(tx, sentry);
    }

    // Divergence: the moved criterion gets its own sentry with cloned
    // on-parts, leaving the shared one untouched for the others.
    tracing::debug!(?sentry, ?criterion, "sentry diverges on criterion move");
    let split_id = SentryId::new();
    let sid = tx.alloc_sid("Sentry");
    tx.apply(Mutation::InsertSentry {
        id: split_id,
        sentry: Sentry::new(sid, moved_container),
    })?;
    tx.apply(Mutation::AddMember {
        set: MemberSet::ContainerSentries(moved_container),
        member: MemberId::Sentry(split_id),
        at: None,
    })?;

    let originals = tx
        .doc()
        .sentry(sentry)
        .ok_or_else(|| EngineError::NotFound("sentry", format!("{sentry:?}")))?
        .on_parts
        .clone();
    let mut clones: IndexMap<OnPartId, OnPartId> = IndexMap::new();
    for original_id in originals {
        let original = tx
            .doc()
            .on_part(original_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound("on-part", format!("{original_id:?}")))?;
        let sid = tx.alloc_sid(sid_prefix_for(original.source));
        let (clone_id, mut clone) = original.split_copy(sid);
        clone.sentry = split_id;
        tx.apply(Mutation::InsertOnPart {
            id: clone_id,
            on_part: clone,
        })?;
        tx.apply(Mutation::AddMember {
            set: MemberSet::SentryOnParts(split_id),
            member: MemberId::OnPart(clone_id),
            at: None,
        })?;
        clones.insert(original_id, clone_id);
    }

    tx.apply(Mutation::SetCriterionSentry {
        id: criterion,
        sentry: Some(split_id),
    })?;

    // Connections into the moved criterion now carry the cloned on-parts.
    let retargets: Vec<_> = tx
        .doc()
        .connections_iter()
        .filter(|(_, c)| c.target == criterion)
        .filter_map(|(id, c)| c.on_part().map(|op| (id, op)))
        .collect();
    for (connection, old_op) in retargets {
        if let Some(new_op) = clones.get(&old_op) {
            tx.apply(Mutation::SetConnectionKind {
                id: connection,
                kind: ConnectionKind::OnPartLink(*new_op),
            })?;
        }
    }

    rederive_owner(tx, sentry)
}

/// Collect a sentry nothing references anymore, together with its on-parts.
pub(crate) fn gc_sentry_if_unreferenced(
    tx: &mut TxBuilder<'_>,
    sentry: SentryId,
) -> Result<(), EngineError> {
    if tx.doc().sentry(sentry).is_none() {
        return Ok(());
    }
    if !criteria_referencing(tx.doc(), sentry).is_empty() {
        return Ok(());
    }
    tracing::debug!(?sentry, "collecting unreferenced sentry");
    let state = tx
        .doc()
        .sentry(sentry)
        .ok_or_else(|| EngineError::NotFound("sentry", format!("{sentry:?}")))?;
    let owner = state.owner;
    let on_parts: Vec<_> = state.on_parts.iter().copied().collect();
    for on_part in on_parts {
        tx.apply(Mutation::RemoveMember {
            set: MemberSet::SentryOnParts(sentry),
            member: MemberId::OnPart(on_part),
        })?;
        tx.apply(Mutation::RemoveOnPart { id: on_part })?;
    }
    tx.apply(Mutation::RemoveMember {
        set: MemberSet::ContainerSentries(owner),
        member: MemberId::Sentry(sentry),
    })?;
    tx.apply(Mutation::RemoveSentry { id: sentry })?;
    Ok(())
}

/// Detach `on_part` from its sentry and delete it, unless other connections
/// still carry it.
pub(crate) fn release_on_part(
    tx: &mut TxBuilder<'_>,
    on_part: OnPartId,
    releasing: ConnectionId,
) -> Result<(), EngineError> {
    let carriers: Vec<_> = connections_referencing(tx.doc(), on_part)
        .into_iter()
        .filter(|c| *c != releasing)
        .collect();
    if !carriers.is_empty() {
        return Ok(());
    }
    let Some(state) = tx.doc().on_part(on_part) else {
        return Ok(());
    };
    let sentry = state.sentry;
    tx.apply(Mutation::RemoveMember {
        set: MemberSet::SentryOnParts(sentry),
        member: MemberId::OnPart(on_part),
    })?;
    tx.apply(Mutation::RemoveOnPart { id: on_part })?;
    Ok(())
}

/// Materialize a fresh on-part for `connection`, attached to `sentry`.
pub(crate) fn create_on_part(
    tx: &mut TxBuilder<'_>,
    connection: ConnectionId,
    sentry: SentryId,
    source: OnPartSource,
) -> Result<OnPartId, EngineError> {
    let event = derive_event(tx.doc(), source)?;
    let on_part_id = OnPartId::new();
    let sid = tx.alloc_sid(sid_prefix_for(source));
    tx.apply(Mutation::InsertOnPart {
        id: on_part_id,
        on_part: OnPart::new(sid, sentry, source, event),
    })?;
    tx.apply(Mutation::AddMember {
        set: MemberSet::SentryOnParts(sentry),
        member: MemberId::OnPart(on_part_id),
        at: None,
    })?;
    tx.apply(Mutation::SetConnectionKind {
        id: connection,
        kind: ConnectionKind::OnPartLink(on_part_id),
    })?;
    Ok(on_part_id)
}

/// Point `on_part` at a new source. Shared on-parts (carried by more than
/// one connection) are cloned for `connection`; a family change replaces the
/// on-part outright under the other family's id space.
pub(crate) fn retarget_on_part_source(
    tx: &mut TxBuilder<'_>,
    connection: ConnectionId,
    on_part: OnPartId,
    new_source: OnPartSource,
) -> Result<OnPartId, EngineError> {
    let state = tx
        .doc()
        .on_part(on_part)
        .ok_or_else(|| EngineError::NotFound("on-part", format!("{on_part:?}")))?;
    if state.source == new_source {
        return Ok(on_part);
    }
    let sentry = state.sentry;
    let family_changed = state.source.family() != new_source.family();
    let shared = connections_referencing(tx.doc(), on_part)
        .into_iter()
        .any(|c| c != connection);

    if family_changed || shared {
        // Never mutate a reference another connection relies on; a family
        // change also demands a fresh element of the other family.
        let replacement = create_on_part(tx, connection, sentry, new_source)?;
        release_on_part(tx, on_part, connection)?;
        return Ok(replacement);
    }

    let event = derive_event(tx.doc(), new_source)?;
    tx.apply(Mutation::SetOnPartSource {
        id: on_part,
        source: new_source,
    })?;
    tx.apply(Mutation::SetOnPartEvent { id: on_part, event })?;
    Ok(on_part)
}

/// Move `on_part` to `target_sentry` for `connection`, cloning when other
/// connections still carry it on the old sentry.
pub(crate) fn move_on_part_to_sentry(
    tx: &mut TxBuilder<'_>,
    connection: ConnectionId,
    on_part: OnPartId,
    target_sentry: SentryId,
) -> Result<OnPartId, EngineError> {
    let state = tx
        .doc()
        .on_part(on_part)
        .ok_or_else(|| EngineError::NotFound("on-part", format!("{on_part:?}")))?;
    let old_sentry = state.sentry;
    if old_sentry == target_sentry {
        return Ok(on_part);
    }
    let source = state.source;
    let shared = connections_referencing(tx.doc(), on_part)
        .into_iter()
        .any(|c| c != connection);

    if shared {
        let replacement = create_on_part(tx, connection, target_sentry, source)?;
        return Ok(replacement);
    }

    tx.apply(Mutation::RemoveMember {
        set: MemberSet::SentryOnParts(old_sentry),
        member: MemberId::OnPart(on_part),
    })?;
    tx.apply(Mutation::AddMember {
        set: MemberSet::SentryOnParts(target_sentry),
        member: MemberId::OnPart(on_part),
        at: None,
    })?;
    tx.apply(Mutation::SetOnPartSentry {
        id: on_part,
        sentry: target_sentry,
    })?;
    Ok(on_part)
}
