//! The closed catalog of reversible graph mutations.
//!
//! Every change the engine makes to a document goes through one `Mutation`.
//! Applying a mutation returns its exact inverse, or `None` when the
//! application was an idempotent no-op (membership adds/removes converge
//! instead of double-applying). The transaction layer records the inverses
//! so undo restores the prior graph byte for byte — same identities, same
//! membership collections, same registry bindings.

use crate::document::Document;
use crate::error::EngineError;
use crate::registry::ElementRef;
use caseplan_model::{
    CaseFileItem, CaseFileItemId, Connection, ConnectionId, ConnectionKind, Container, ContainerId,
    ControlRules, DefinitionId, ItemDefinition, OnPart, OnPartId, OnPartSource, PlanningTable,
    Sentry, SentryId, Shape, ShapeId, ShapeKind, StandardEvent, TableId,
};
use indexmap::IndexSet;

/// Which membership collection a membership mutation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemberSet {
    ContainerDefinitions(ContainerId),
    ContainerSentries(ContainerId),
    TableItems(TableId),
    SentryOnParts(SentryId),
    ShapeChildren(ShapeId),
}

/// The member being added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemberId {
    Definition(DefinitionId),
    Sentry(SentryId),
    OnPart(OnPartId),
    Shape(ShapeId),
}

/// One reversible change to the document.
#[derive(Debug, Clone)]
pub(crate) enum Mutation {
    // Arena inserts/removals. Inserts register the element's stable id and
    // its outgoing references; removals capture everything needed to undo.
    InsertContainer { id: ContainerId, container: Container },
    RemoveContainer { id: ContainerId },
    InsertDefinition { id: DefinitionId, definition: ItemDefinition },
    RemoveDefinition { id: DefinitionId },
    InsertSentry { id: SentryId, sentry: Sentry },
    RemoveSentry { id: SentryId },
    InsertOnPart { id: OnPartId, on_part: OnPart },
    RemoveOnPart { id: OnPartId },
    InsertTable { id: TableId, table: PlanningTable },
    RemoveTable { id: TableId },
    InsertShape { id: ShapeId, shape: Shape },
    RemoveShape { id: ShapeId },
    InsertConnection { id: ConnectionId, connection: Connection },
    RemoveConnection { id: ConnectionId },
    InsertCaseFileItem {
        id: CaseFileItemId,
        item: CaseFileItem,
        child_index: Option<usize>,
        refs: Vec<(CaseFileItemId, CaseFileItemId)>,
    },
    RemoveCaseFileItem { id: CaseFileItemId },

    // Field updates.
    SetDefinitionRules { id: DefinitionId, rules: ControlRules },
    SetDefinitionBlocking { id: DefinitionId, blocking: bool },
    SetDefinitionAutoComplete { id: DefinitionId, auto_complete: bool },
    SetDefinitionOwner { id: DefinitionId, owner: ContainerId },
    SetSentryOwner { id: SentryId, owner: ContainerId },
    SetOnPartSource { id: OnPartId, source: OnPartSource },
    SetOnPartEvent { id: OnPartId, event: StandardEvent },
    SetOnPartSentry { id: OnPartId, sentry: SentryId },
    SetShapeParent { id: ShapeId, parent: Option<ShapeId> },
    SetShapeDefinition { id: ShapeId, definition: DefinitionId },
    SetItemContainer { id: ShapeId, container: Option<ContainerId> },
    SetCriterionSentry { id: ShapeId, sentry: Option<SentryId> },
    SetCriterionHost { id: ShapeId, host: ShapeId },
    SetConnectionSource { id: ConnectionId, shape: ShapeId },
    SetConnectionTarget { id: ConnectionId, shape: ShapeId },
    SetConnectionKind { id: ConnectionId, kind: ConnectionKind },
    SetCaseFileParent {
        id: CaseFileItemId,
        parent: Option<CaseFileItemId>,
        child_index: Option<usize>,
    },

    // Idempotent membership edits.
    AddMember {
        set: MemberSet,
        member: MemberId,
        at: Option<usize>,
    },
    RemoveMember { set: MemberSet, member: MemberId },
    AddCaseFileReference { from: CaseFileItemId, to: CaseFileItemId },
    RemoveCaseFileReference { from: CaseFileItemId, to: CaseFileItemId },

    // Registry rename; the reverse index is keyed by typed handles and
    // needs no migration.
    Rename {
        target: ElementRef,
        from: String,
        to: String,
    },
}

fn source_ref(source: OnPartSource) -> ElementRef {
    match source {
        OnPartSource::PlanItem(s) | OnPartSource::Criterion(s) => ElementRef::Shape(s),
        OnPartSource::CaseFileItem(c) => ElementRef::CaseFileItem(c),
    }
}

/// Semantic elements a shape points at, for reverse-index upkeep.
fn shape_targets(shape: &Shape) -> Vec<ElementRef> {
    match &shape.kind {
        ShapeKind::CasePlan { .. } => Vec::new(),
        ShapeKind::PlanItem { definition, .. } | ShapeKind::DiscretionaryItem { definition, .. } => {
            vec![ElementRef::Definition(*definition)]
        }
        ShapeKind::Criterion { sentry, .. } => {
            sentry.map(ElementRef::Sentry).into_iter().collect()
        }
        ShapeKind::CaseFileItem { item } => vec![ElementRef::CaseFileItem(*item)],
    }
}

fn set_add<T: std::hash::Hash + Eq + Copy>(
    set: &mut IndexSet<T>,
    value: T,
    at: Option<usize>,
) -> bool {
    if set.contains(&value) {
        return false;
    }
    match at {
        Some(index) if index <= set.len() => {
            set.shift_insert(index, value);
        }
        _ => {
            set.insert(value);
        }
    }
    true
}

fn set_remove<T: std::hash::Hash + Eq + Copy>(set: &mut IndexSet<T>, value: &T) -> Option<usize> {
    set.shift_remove_full(value).map(|(index, _)| index)
}

impl Mutation {
    /// Apply this mutation, returning its exact inverse (`None` when the
    /// application was an idempotent no-op that recorded nothing).
    pub(crate) fn apply(&self, doc: &mut Document) -> Result<Option<Mutation>, EngineError> {
        use Mutation::*;
        match self {
            InsertContainer { id, container } => {
                if doc.containers.contains_key(id) {
                    return Err(EngineError::IllegalEdit("container id reused".into()));
                }
                doc.registry
                    .register(&container.sid, ElementRef::Container(*id))?;
                doc.containers.insert(*id, container.clone());
                Ok(Some(RemoveContainer { id: *id }))
            }
            RemoveContainer { id } => {
                let container = doc
                    .containers
                    .shift_remove(id)
                    .ok_or_else(|| EngineError::NotFound("container", format!("{id:?}")))?;
                doc.registry.unregister(&container.sid);
                Ok(Some(InsertContainer { id: *id, container }))
            }
            InsertDefinition { id, definition } => {
                if doc.definitions.contains_key(id) {
                    return Err(EngineError::IllegalEdit("definition id reused".into()));
                }
                doc.registry
                    .register(&definition.sid, ElementRef::Definition(*id))?;
                doc.definitions.insert(*id, definition.clone());
                Ok(Some(RemoveDefinition { id: *id }))
            }
            RemoveDefinition { id } => {
                let definition = doc
                    .definitions
                    .shift_remove(id)
                    .ok_or_else(|| EngineError::NotFound("definition", format!("{id:?}")))?;
                doc.registry.unregister(&definition.sid);
                Ok(Some(InsertDefinition {
                    id: *id,
                    definition,
                }))
            }
            InsertSentry { id, sentry } => {
                if doc.sentries.contains_key(id) {
                    return Err(EngineError::IllegalEdit("sentry id reused".into()));
                }
                doc.registry.register(&sentry.sid, ElementRef::Sentry(*id))?;
                doc.sentries.insert(*id, sentry.clone());
                Ok(Some(RemoveSentry { id: *id }))
            }
            RemoveSentry { id } => {
                let sentry = doc
                    .sentries
                    .shift_remove(id)
                    .ok_or_else(|| EngineError::NotFound("sentry", format!("{id:?}")))?;
                doc.registry.unregister(&sentry.sid);
                Ok(Some(InsertSentry { id: *id, sentry }))
            }
            InsertOnPart { id, on_part } => {
                if doc.on_parts.contains_key(id) {
                    return Err(EngineError::IllegalEdit("on-part id reused".into()));
                }
                doc.registry.register(&on_part.sid, ElementRef::OnPart(*id))?;
                doc.registry
                    .add_reference(source_ref(on_part.source), ElementRef::OnPart(*id));
                doc.on_parts.insert(*id, on_part.clone());
                Ok(Some(RemoveOnPart { id: *id }))
            }
            RemoveOnPart { id } => {
                let on_part = doc
                    .on_parts
                    .shift_remove(id)
                    .ok_or_else(|| EngineError::NotFound("on-part", format!("{id:?}")))?;
                doc.registry.unregister(&on_part.sid);
                doc.registry
                    .remove_reference(source_ref(on_part.source), ElementRef::OnPart(*id));
                Ok(Some(InsertOnPart { id: *id, on_part }))
            }
            InsertTable { id, table } => {
                if doc.tables.contains_key(id) {
                    return Err(EngineError::IllegalEdit("table id reused".into()));
                }
                doc.registry.register(&table.sid, ElementRef::Table(*id))?;
                doc.tables.insert(*id, table.clone());
                Ok(Some(RemoveTable { id: *id }))
            }
            RemoveTable { id } => {
                let table = doc
                    .tables
                    .shift_remove(id)
                    .ok_or_else(|| EngineError::NotFound("planning table", format!("{id:?}")))?;
                doc.registry.unregister(&table.sid);
                Ok(Some(InsertTable { id: *id, table }))
            }
            InsertShape { id, shape } => {
                if doc.shapes.contains_key(id) {
                    return Err(EngineError::IllegalEdit("shape id reused".into()));
                }
                for target in shape_targets(shape) {
                    doc.registry.add_reference(target, ElementRef::Shape(*id));
                }
                doc.shapes.insert(*id, shape.clone());
                Ok(Some(RemoveShape { id: *id }))
            }
            RemoveShape { id } => {
                let shape = doc
                    .shapes
                    .shift_remove(id)
                    .ok_or_else(|| EngineError::NotFound("shape", format!("{id:?}")))?;
                for target in shape_targets(&shape) {
                    doc.registry.remove_reference(target, ElementRef::Shape(*id));
                }
                Ok(Some(InsertShape { id: *id, shape }))
            }
            InsertConnection { id, connection } => {
                if doc.connections.contains_key(id) {
                    return Err(EngineError::IllegalEdit("connection id reused".into()));
                }
                if let Some(op) = connection.on_part() {
                    doc.registry
                        .add_reference(ElementRef::OnPart(op), ElementRef::Connection(*id));
                }
                doc.connections.insert(*id, connection.clone());
                Ok(Some(RemoveConnection { id: *id }))
            }
            RemoveConnection { id } => {
                let connection = doc
                    .connections
                    .shift_remove(id)
                    .ok_or_else(|| EngineError::NotFound("connection", format!("{id:?}")))?;
                if let Some(op) = connection.on_part() {
                    doc.registry
                        .remove_reference(ElementRef::OnPart(op), ElementRef::Connection(*id));
                }
                Ok(Some(InsertConnection {
                    id: *id,
                    connection,
                }))
            }
            InsertCaseFileItem {
                id,
                item,
                child_index,
                refs,
            } => {
                doc.registry
                    .register(&item.sid, ElementRef::CaseFileItem(*id))?;
                if let Err(e) = doc.case_file.insert(*id, item.clone(), *child_index) {
                    doc.registry.unregister(&item.sid);
                    return Err(e.into());
                }
                for (from, to) in refs {
                    // Restored edges are all incident to the item, so
                    // removing it prunes any edges added before the failure.
                    if let Err(e) = doc.case_file.add_reference(*from, *to) {
                        let _ = doc.case_file.remove(*id);
                        doc.registry.unregister(&item.sid);
                        return Err(e.into());
                    }
                }
                Ok(Some(RemoveCaseFileItem { id: *id }))
            }
            RemoveCaseFileItem { id } => {
                let (item, child_index, refs) = doc.case_file.remove(*id)?;
                doc.registry.unregister(&item.sid);
                Ok(Some(InsertCaseFileItem {
                    id: *id,
                    item,
                    child_index,
                    refs,
                }))
            }

            SetDefinitionRules { id, rules } => {
                let def = doc.definition_mut(*id)?;
                let old = std::mem::replace(&mut def.rules, *rules);
                Ok(Some(SetDefinitionRules { id: *id, rules: old }))
            }
            SetDefinitionBlocking { id, blocking } => {
                let def = doc.definition_mut(*id)?;
                let old = std::mem::replace(&mut def.blocking, *blocking);
                Ok(Some(SetDefinitionBlocking {
                    id: *id,
                    blocking: old,
                }))
            }
            SetDefinitionAutoComplete { id, auto_complete } => {
                let def = doc.definition_mut(*id)?;
                let old = std::mem::replace(&mut def.auto_complete, *auto_complete);
                Ok(Some(SetDefinitionAutoComplete {
                    id: *id,
                    auto_complete: old,
                }))
            }
            SetDefinitionOwner { id, owner } => {
                let def = doc.definition_mut(*id)?;
                let old = std::mem::replace(&mut def.owner, *owner);
                Ok(Some(SetDefinitionOwner { id: *id, owner: old }))
            }
            SetSentryOwner { id, owner } => {
                let sentry = doc.sentry_mut(*id)?;
                let old = std::mem::replace(&mut sentry.owner, *owner);
                Ok(Some(SetSentryOwner { id: *id, owner: old }))
            }
            SetOnPartSource { id, source } => {
                let old = {
                    let on_part = doc.on_part_mut(*id)?;
                    std::mem::replace(&mut on_part.source, *source)
                };
                doc.registry
                    .remove_reference(source_ref(old), ElementRef::OnPart(*id));
                doc.registry
                    .add_reference(source_ref(*source), ElementRef::OnPart(*id));
                Ok(Some(SetOnPartSource {
                    id: *id,
                    source: old,
                }))
            }
            SetOnPartEvent { id, event } => {
                let on_part = doc.on_part_mut(*id)?;
                let old = std::mem::replace(&mut on_part.event, *event);
                Ok(Some(SetOnPartEvent { id: *id, event: old }))
            }
            SetOnPartSentry { id, sentry } => {
                let on_part = doc.on_part_mut(*id)?;
                let old = std::mem::replace(&mut on_part.sentry, *sentry);
                Ok(Some(SetOnPartSentry { id: *id, sentry: old }))
            }
            SetShapeParent { id, parent } => {
                let shape = doc.shape_mut(*id)?;
                let old = std::mem::replace(&mut shape.parent, *parent);
                Ok(Some(SetShapeParent { id: *id, parent: old }))
            }
            SetShapeDefinition { id, definition } => {
                let old = {
                    let shape = doc.shape_mut(*id)?;
                    match &mut shape.kind {
                        ShapeKind::PlanItem { definition: d, .. }
                        | ShapeKind::DiscretionaryItem { definition: d, .. } => {
                            std::mem::replace(d, *definition)
                        }
                        _ => {
                            return Err(EngineError::IllegalEdit(
                                "definition reference on a non-item shape".into(),
                            ))
                        }
                    }
                };
                doc.registry
                    .remove_reference(ElementRef::Definition(old), ElementRef::Shape(*id));
                doc.registry
                    .add_reference(ElementRef::Definition(*definition), ElementRef::Shape(*id));
                Ok(Some(SetShapeDefinition {
                    id: *id,
                    definition: old,
                }))
            }
            SetItemContainer { id, container } => {
                let shape = doc.shape_mut(*id)?;
                let old = match &mut shape.kind {
                    ShapeKind::PlanItem { container: c, .. }
                    | ShapeKind::DiscretionaryItem { container: c, .. } => {
                        std::mem::replace(c, *container)
                    }
                    _ => {
                        return Err(EngineError::IllegalEdit(
                            "container slot on a non-item shape".into(),
                        ))
                    }
                };
                Ok(Some(SetItemContainer {
                    id: *id,
                    container: old,
                }))
            }
            SetCriterionSentry { id, sentry } => {
                let old = {
                    let shape = doc.shape_mut(*id)?;
                    match &mut shape.kind {
                        ShapeKind::Criterion { sentry: s, .. } => std::mem::replace(s, *sentry),
                        _ => {
                            return Err(EngineError::IllegalEdit(
                                "sentry reference on a non-criterion shape".into(),
                            ))
                        }
                    }
                };
                if let Some(old_sentry) = old {
                    doc.registry
                        .remove_reference(ElementRef::Sentry(old_sentry), ElementRef::Shape(*id));
                }
                if let Some(new_sentry) = sentry {
                    doc.registry
                        .add_reference(ElementRef::Sentry(*new_sentry), ElementRef::Shape(*id));
                }
                Ok(Some(SetCriterionSentry {
                    id: *id,
                    sentry: old,
                }))
            }
            SetCriterionHost { id, host } => {
                let shape = doc.shape_mut(*id)?;
                let old = match &mut shape.kind {
                    ShapeKind::Criterion { host: h, .. } => std::mem::replace(h, *host),
                    _ => {
                        return Err(EngineError::IllegalEdit(
                            "host on a non-criterion shape".into(),
                        ))
                    }
                };
                Ok(Some(SetCriterionHost { id: *id, host: old }))
            }
            SetConnectionSource { id, shape } => {
                let conn = doc.connection_mut(*id)?;
                let old = std::mem::replace(&mut conn.source, *shape);
                Ok(Some(SetConnectionSource { id: *id, shape: old }))
            }
            SetConnectionTarget { id, shape } => {
                let conn = doc.connection_mut(*id)?;
                let old = std::mem::replace(&mut conn.target, *shape);
                Ok(Some(SetConnectionTarget { id: *id, shape: old }))
            }
            SetConnectionKind { id, kind } => {
                let old = {
                    let conn = doc.connection_mut(*id)?;
                    std::mem::replace(&mut conn.kind, *kind)
                };
                if let ConnectionKind::OnPartLink(op) = old {
                    doc.registry
                        .remove_reference(ElementRef::OnPart(op), ElementRef::Connection(*id));
                }
                if let ConnectionKind::OnPartLink(op) = kind {
                    doc.registry
                        .add_reference(ElementRef::OnPart(*op), ElementRef::Connection(*id));
                }
                Ok(Some(SetConnectionKind { id: *id, kind: old }))
            }
            SetCaseFileParent {
                id,
                parent,
                child_index,
            } => {
                let (old_parent, old_index) = doc.case_file.set_parent(*id, *parent, *child_index)?;
                Ok(Some(SetCaseFileParent {
                    id: *id,
                    parent: old_parent,
                    child_index: old_index,
                }))
            }

            AddMember { set, member, at } => {
                let added = match (set, member) {
                    (MemberSet::ContainerDefinitions(c), MemberId::Definition(d)) => {
                        set_add(&mut doc.container_mut(*c)?.definitions, *d, *at)
                    }
                    (MemberSet::ContainerSentries(c), MemberId::Sentry(s)) => {
                        set_add(&mut doc.container_mut(*c)?.sentries, *s, *at)
                    }
                    (MemberSet::TableItems(t), MemberId::Shape(s)) => {
                        set_add(&mut doc.table_mut(*t)?.items, *s, *at)
                    }
                    (MemberSet::ShapeChildren(p), MemberId::Shape(s)) => {
                        set_add(&mut doc.shape_mut(*p)?.children, *s, *at)
                    }
                    (MemberSet::SentryOnParts(sen), MemberId::OnPart(op)) => {
                        let sentry = doc.sentry_mut(*sen)?;
                        if sentry.on_parts.contains(op) {
                            false
                        } else {
                            let index = at.unwrap_or(sentry.on_parts.len()).min(sentry.on_parts.len());
                            sentry.on_parts.insert(index, *op);
                            true
                        }
                    }
                    _ => {
                        return Err(EngineError::IllegalEdit(
                            "membership member/set mismatch".into(),
                        ))
                    }
                };
                Ok(added.then(|| RemoveMember {
                    set: *set,
                    member: *member,
                }))
            }
            RemoveMember { set, member } => {
                let removed_at = match (set, member) {
                    (MemberSet::ContainerDefinitions(c), MemberId::Definition(d)) => {
                        set_remove(&mut doc.container_mut(*c)?.definitions, d)
                    }
                    (MemberSet::ContainerSentries(c), MemberId::Sentry(s)) => {
                        set_remove(&mut doc.container_mut(*c)?.sentries, s)
                    }
                    (MemberSet::TableItems(t), MemberId::Shape(s)) => {
                        set_remove(&mut doc.table_mut(*t)?.items, s)
                    }
                    (MemberSet::ShapeChildren(p), MemberId::Shape(s)) => {
                        set_remove(&mut doc.shape_mut(*p)?.children, s)
                    }
                    (MemberSet::SentryOnParts(sen), MemberId::OnPart(op)) => {
                        let sentry = doc.sentry_mut(*sen)?;
                        sentry.on_parts.iter().position(|x| x == op).map(|index| {
                            sentry.on_parts.remove(index);
                            index
                        })
                    }
                    _ => {
                        return Err(EngineError::IllegalEdit(
                            "membership member/set mismatch".into(),
                        ))
                    }
                };
                Ok(removed_at.map(|index| AddMember {
                    set: *set,
                    member: *member,
                    at: Some(index),
                }))
            }
            AddCaseFileReference { from, to } => {
                let added = doc.case_file.add_reference(*from, *to)?;
                Ok(added.then(|| RemoveCaseFileReference {
                    from: *from,
                    to: *to,
                }))
            }
            RemoveCaseFileReference { from, to } => {
                let removed = doc.case_file.remove_reference(*from, *to);
                Ok(removed.then(|| AddCaseFileReference {
                    from: *from,
                    to: *to,
                }))
            }

            Rename { target, from, to } => {
                doc.registry.rename(from, to)?;
                let result = set_sid(doc, *target, to);
                if let Err(e) = result {
                    // Keep forward index and element sid in step even on the
                    // failure path.
                    let _ = doc.registry.rename(to, from);
                    return Err(e);
                }
                Ok(Some(Rename {
                    target: *target,
                    from: to.clone(),
                    to: from.clone(),
                }))
            }
        }
    }
}

fn set_sid(doc: &mut Document, target: ElementRef, sid: &str) -> Result<(), EngineError> {
    match target {
        ElementRef::Container(id) => doc.container_mut(id)?.sid = sid.to_string(),
        ElementRef::Definition(id) => doc.definition_mut(id)?.sid = sid.to_string(),
        ElementRef::Sentry(id) => doc.sentry_mut(id)?.sid = sid.to_string(),
        ElementRef::OnPart(id) => doc.on_part_mut(id)?.sid = sid.to_string(),
        ElementRef::Table(id) => doc.table_mut(id)?.sid = sid.to_string(),
        ElementRef::CaseFileItem(id) => doc.case_file.set_sid(id, sid.to_string())?,
        ElementRef::Shape(_) | ElementRef::Connection(_) => {
            return Err(EngineError::IllegalEdit(
                "rename target carries no stable id".into(),
            ))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseplan_model::ItemKind;

    fn doc_with_definition() -> (Document, DefinitionId) {
        let mut doc = Document::new();
        let id = DefinitionId::new();
        let owner = doc.case_plan();
        Mutation::InsertDefinition {
            id,
            definition: ItemDefinition::new("Task_1".into(), ItemKind::Task, owner),
        }
        .apply(&mut doc)
        .unwrap();
        (doc, id)
    }

    #[test]
    fn adding_a_member_twice_records_once() {
        let (mut doc, definition) = doc_with_definition();
        let add = Mutation::AddMember {
            set: MemberSet::ContainerDefinitions(doc.case_plan()),
            member: MemberId::Definition(definition),
            at: None,
        };
        assert!(add.apply(&mut doc).unwrap().is_some());
        assert!(add.apply(&mut doc).unwrap().is_none());
        assert_eq!(
            doc.container(doc.case_plan()).unwrap().definitions.len(),
            1
        );
    }

    #[test]
    fn removing_an_absent_member_records_nothing() {
        let (mut doc, definition) = doc_with_definition();
        let remove = Mutation::RemoveMember {
            set: MemberSet::ContainerDefinitions(doc.case_plan()),
            member: MemberId::Definition(definition),
        };
        assert!(remove.apply(&mut doc).unwrap().is_none());
    }

    #[test]
    fn remove_inverse_restores_the_position() {
        let (mut doc, first) = doc_with_definition();
        let second = DefinitionId::new();
        let owner = doc.case_plan();
        Mutation::InsertDefinition {
            id: second,
            definition: ItemDefinition::new("Task_2".into(), ItemKind::Task, owner),
        }
        .apply(&mut doc)
        .unwrap();
        for member in [first, second] {
            Mutation::AddMember {
                set: MemberSet::ContainerDefinitions(owner),
                member: MemberId::Definition(member),
                at: None,
            }
            .apply(&mut doc)
            .unwrap();
        }

        let inverse = Mutation::RemoveMember {
            set: MemberSet::ContainerDefinitions(owner),
            member: MemberId::Definition(first),
        }
        .apply(&mut doc)
        .unwrap()
        .unwrap();
        inverse.apply(&mut doc).unwrap();

        let members: Vec<_> = doc
            .container(owner)
            .unwrap()
            .definitions
            .iter()
            .copied()
            .collect();
        assert_eq!(members, vec![first, second]);
    }

    #[test]
    fn insert_registers_and_remove_unregisters_the_sid() {
        let (mut doc, definition) = doc_with_definition();
        assert_eq!(
            doc.registry().resolve("Task_1"),
            Some(ElementRef::Definition(definition))
        );
        Mutation::RemoveDefinition { id: definition }
            .apply(&mut doc)
            .unwrap();
        assert_eq!(doc.registry().resolve("Task_1"), None);
    }
}
