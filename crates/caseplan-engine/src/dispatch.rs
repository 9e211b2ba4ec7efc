//! Edit commands and their reaction cascades.
//!
//! Each command runs as one transaction: the primitive change first, then
//! the reactions in a fixed order — container membership, sharing
//! resolution, sentry lifecycle, planning-table lifecycle. A failure at any
//! point unwinds the whole transaction at the engine boundary.

use crate::error::EngineError;
use crate::membership::enclosing_container;
use crate::mutation::{MemberId, MemberSet, Mutation};
use crate::planning;
use crate::registry::ElementRef;
use crate::sentries;
use crate::sharing::{
    ensure_container_membership, ensure_exclusive, item_shapes_referencing,
    rederive_definition_owner,
};
use crate::stack::TxBuilder;
use caseplan_model::{
    CaseFileItem, CaseFileItemId, Connection, ConnectionId, ConnectionKind, Container,
    ContainerId, ContainerKind, ControlRules, CriterionKind, DefinitionId, ItemDefinition,
    ItemKind, ModelError, SentryId, Shape, ShapeId, ShapeKind, TableId, TableOwner,
};

/// What kind of shape to create.
#[derive(Debug, Clone)]
pub enum NewShape {
    PlanItem { kind: ItemKind, parent: ShapeId },
    DiscretionaryItem { kind: ItemKind, parent: ShapeId },
    Criterion { polarity: CriterionKind, host: ShapeId },
    CaseFileItem { parent: Option<CaseFileItemId> },
}

/// A property edit on the semantic element behind a shape.
#[derive(Debug, Clone)]
pub enum PropertyChange {
    Rules(ControlRules),
    Blocking(bool),
    AutoComplete(bool),
    Rename(String),
}

/// The closed set of edits the engine accepts.
#[derive(Debug, Clone)]
pub enum EditCommand {
    CreateShape(NewShape),
    /// Paste semantics: the copy references the same semantic element as
    /// the original (definition for items, sentry and on-parts for
    /// criteria). Splitting happens later, if and when the copies diverge.
    CloneShape { shape: ShapeId, new_parent: ShapeId },
    MoveShape { shape: ShapeId, new_parent: ShapeId },
    MoveElements { shapes: Vec<ShapeId>, new_parent: ShapeId },
    DeleteShape { shape: ShapeId },
    CreateConnection { source: ShapeId, target: ShapeId },
    ReconnectStart { connection: ConnectionId, new_source: ShapeId },
    ReconnectEnd { connection: ConnectionId, new_target: ShapeId },
    DeleteConnection { connection: ConnectionId },
    UpdateProperties { shape: ShapeId, change: PropertyChange },
    ReplaceShape { shape: ShapeId, new_kind: ItemKind },
}

impl EditCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EditCommand::CreateShape(_) => "shape.create",
            EditCommand::CloneShape { .. } => "shape.clone",
            EditCommand::MoveShape { .. } => "shape.move",
            EditCommand::MoveElements { .. } => "elements.move",
            EditCommand::DeleteShape { .. } => "shape.delete",
            EditCommand::CreateConnection { .. } => "connection.create",
            EditCommand::ReconnectStart { .. } => "connection.reconnectStart",
            EditCommand::ReconnectEnd { .. } => "connection.reconnectEnd",
            EditCommand::DeleteConnection { .. } => "connection.delete",
            EditCommand::UpdateProperties { .. } => "element.updateProperties",
            EditCommand::ReplaceShape { .. } => "element.replace",
        }
    }
}

/// Identifiers of the elements a command created or touched, for the host.
#[derive(Debug, Clone, Default)]
pub struct EditReceipt {
    pub shape: Option<ShapeId>,
    pub connection: Option<ConnectionId>,
    pub definition: Option<DefinitionId>,
    pub sentry: Option<SentryId>,
    pub case_file_item: Option<CaseFileItemId>,
    pub container: Option<ContainerId>,
    pub table: Option<TableId>,
}

pub(crate) fn run(tx: &mut TxBuilder<'_>, cmd: &EditCommand) -> Result<EditReceipt, EngineError> {
    match cmd {
        EditCommand::CreateShape(new) => create_shape(tx, new),
        EditCommand::CloneShape { shape, new_parent } => clone_shape(tx, *shape, *new_parent),
        EditCommand::MoveShape { shape, new_parent } => move_shape(tx, *shape, *new_parent),
        EditCommand::MoveElements { shapes, new_parent } => {
            move_elements(tx, shapes, *new_parent)
        }
        EditCommand::DeleteShape { shape } => {
            delete_shape_recursive(tx, *shape)?;
            Ok(EditReceipt::default())
        }
        EditCommand::CreateConnection { source, target } => {
            create_connection(tx, *source, *target)
        }
        EditCommand::ReconnectStart {
            connection,
            new_source,
        } => reconnect_start(tx, *connection, *new_source),
        EditCommand::ReconnectEnd {
            connection,
            new_target,
        } => reconnect_end(tx, *connection, *new_target),
        EditCommand::DeleteConnection { connection } => {
            delete_connection(tx, *connection)?;
            Ok(EditReceipt::default())
        }
        EditCommand::UpdateProperties { shape, change } => update_properties(tx, *shape, change),
        EditCommand::ReplaceShape { shape, new_kind } => replace_shape(tx, *shape, *new_kind),
    }
}

// ---------------------------------------------------------------- creation

/// Criteria attach to the case plan root (exit criteria) or to items whose
/// kind takes criteria.
fn check_criterion_host(tx: &TxBuilder<'_>, host: ShapeId) -> Result<(), EngineError> {
    let node = tx.doc().shape_ref(host)?;
    if matches!(node.kind, ShapeKind::CasePlan { .. }) {
        return Ok(());
    }
    let definition = node
        .definition()
        .ok_or_else(|| EngineError::IllegalEdit("criteria attach to items".into()))?;
    let kind = tx
        .doc()
        .definition(definition)
        .ok_or_else(|| EngineError::DanglingReference(format!("{definition:?}")))?
        .kind;
    if !kind.accepts_criteria() {
        return Err(EngineError::IllegalEdit(
            "event listeners take no criteria".into(),
        ));
    }
    Ok(())
}

fn create_shape(tx: &mut TxBuilder<'_>, new: &NewShape) -> Result<EditReceipt, EngineError> {
    match new {
        NewShape::PlanItem { kind, parent } => {
            let owner = tx
                .doc()
                .shape_ref(*parent)?
                .own_container()
                .ok_or_else(|| {
                    EngineError::IllegalEdit("plan items nest under structural containers".into())
                })?;
            create_item(tx, *kind, *parent, owner, false)
        }
        NewShape::DiscretionaryItem { kind, parent } => {
            let table_owner = planning::owner_for(tx.doc(), *parent)?;
            let owner = match table_owner {
                TableOwner::Container(c) => c,
                TableOwner::HumanTask(ht) => enclosing_container(tx.doc(), ht)?,
            };
            let mut receipt = create_item(tx, *kind, *parent, owner, true)?;
            let shape = receipt
                .shape
                .ok_or_else(|| EngineError::IllegalEdit("item creation yielded no shape".into()))?;
            receipt.table = Some(planning::attach(tx, shape, table_owner)?);
            Ok(receipt)
        }
        NewShape::Criterion { polarity, host } => {
            check_criterion_host(tx, *host)?;
            let shape_id = ShapeId::new();
            tx.apply(Mutation::InsertShape {
                id: shape_id,
                shape: Shape::new(
                    Some(*host),
                    ShapeKind::Criterion {
                        polarity: *polarity,
                        sentry: None,
                        host: *host,
                    },
                ),
            })?;
            tx.apply(Mutation::AddMember {
                set: MemberSet::ShapeChildren(*host),
                member: MemberId::Shape(shape_id),
                at: None,
            })?;
            // The sentry is created lazily, on the first incoming connection.
            Ok(EditReceipt {
                shape: Some(shape_id),
                ..EditReceipt::default()
            })
        }
        NewShape::CaseFileItem { parent } => {
            let item_id = CaseFileItemId::new();
            let sid = tx.alloc_sid("CaseFileItem");
            let mut item = CaseFileItem::new(sid);
            item.parent = *parent;
            tx.apply(Mutation::InsertCaseFileItem {
                id: item_id,
                item,
                child_index: None,
                refs: Vec::new(),
            })?;
            let root = tx.doc().root();
            let shape_id = ShapeId::new();
            tx.apply(Mutation::InsertShape {
                id: shape_id,
                shape: Shape::new(Some(root), ShapeKind::CaseFileItem { item: item_id }),
            })?;
            tx.apply(Mutation::AddMember {
                set: MemberSet::ShapeChildren(root),
                member: MemberId::Shape(shape_id),
                at: None,
            })?;
            Ok(EditReceipt {
                shape: Some(shape_id),
                case_file_item: Some(item_id),
                ..EditReceipt::default()
            })
        }
    }
}

fn create_item(
    tx: &mut TxBuilder<'_>,
    kind: ItemKind,
    parent: ShapeId,
    owner: ContainerId,
    discretionary: bool,
) -> Result<EditReceipt, EngineError> {
    let definition_id = DefinitionId::new();
    let sid = tx.alloc_sid(kind.sid_prefix());
    tx.apply(Mutation::InsertDefinition {
        id: definition_id,
        definition: ItemDefinition::new(sid, kind, owner),
    })?;
    tx.apply(Mutation::AddMember {
        set: MemberSet::ContainerDefinitions(owner),
        member: MemberId::Definition(definition_id),
        at: None,
    })?;

    let mut body = None;
    if kind.is_container() {
        let container_id = ContainerId::new();
        let sid = tx.alloc_sid("PlanFragment");
        tx.apply(Mutation::InsertContainer {
            id: container_id,
            container: Container::new(sid, ContainerKind::Stage),
        })?;
        body = Some(container_id);
    }

    let shape_id = ShapeId::new();
    let shape_kind = if discretionary {
        ShapeKind::DiscretionaryItem {
            definition: definition_id,
            container: body,
        }
    } else {
        ShapeKind::PlanItem {
            definition: definition_id,
            container: body,
        }
    };
    tx.apply(Mutation::InsertShape {
        id: shape_id,
        shape: Shape::new(Some(parent), shape_kind),
    })?;
    tx.apply(Mutation::AddMember {
        set: MemberSet::ShapeChildren(parent),
        member: MemberId::Shape(shape_id),
        at: None,
    })?;
    Ok(EditReceipt {
        shape: Some(shape_id),
        definition: Some(definition_id),
        container: body,
        ..EditReceipt::default()
    })
}

// ----------------------------------------------------------------- cloning

fn clone_shape(
    tx: &mut TxBuilder<'_>,
    shape: ShapeId,
    new_parent: ShapeId,
) -> Result<EditReceipt, EngineError> {
    let node = tx.doc().shape_ref(shape)?.clone();
    match node.kind {
        ShapeKind::PlanItem { definition, container } => {
            if container.is_some() {
                return Err(EngineError::IllegalEdit(
                    "stages are copied deep, not by reference".into(),
                ));
            }
            tx.doc().shape_ref(new_parent)?.own_container().ok_or_else(|| {
                EngineError::IllegalEdit("plan items nest under structural containers".into())
            })?;
            let copy = ShapeId::new();
            tx.apply(Mutation::InsertShape {
                id: copy,
                shape: Shape::new(
                    Some(new_parent),
                    ShapeKind::PlanItem {
                        definition,
                        container: None,
                    },
                ),
            })?;
            tx.apply(Mutation::AddMember {
                set: MemberSet::ShapeChildren(new_parent),
                member: MemberId::Shape(copy),
                at: None,
            })?;
            // Sharing widens the definition's scope to the common container.
            rederive_definition_owner(tx, definition)?;
            Ok(EditReceipt {
                shape: Some(copy),
                definition: Some(definition),
                ..EditReceipt::default()
            })
        }
        ShapeKind::DiscretionaryItem { definition, container } => {
            if container.is_some() {
                return Err(EngineError::IllegalEdit(
                    "stages are copied deep, not by reference".into(),
                ));
            }
            let table_owner = planning::owner_for(tx.doc(), new_parent)?;
            let copy = ShapeId::new();
            tx.apply(Mutation::InsertShape {
                id: copy,
                shape: Shape::new(
                    Some(new_parent),
                    ShapeKind::DiscretionaryItem {
                        definition,
                        container: None,
                    },
                ),
            })?;
            tx.apply(Mutation::AddMember {
                set: MemberSet::ShapeChildren(new_parent),
                member: MemberId::Shape(copy),
                at: None,
            })?;
            rederive_definition_owner(tx, definition)?;
            let table = planning::attach(tx, copy, table_owner)?;
            Ok(EditReceipt {
                shape: Some(copy),
                definition: Some(definition),
                table: Some(table),
                ..EditReceipt::default()
            })
        }
        ShapeKind::Criterion { polarity, sentry, .. } => {
            check_criterion_host(tx, new_parent)?;
            let copy = ShapeId::new();
            tx.apply(Mutation::InsertShape {
                id: copy,
                shape: Shape::new(
                    Some(new_parent),
                    ShapeKind::Criterion {
                        polarity,
                        sentry,
                        host: new_parent,
                    },
                ),
            })?;
            tx.apply(Mutation::AddMember {
                set: MemberSet::ShapeChildren(new_parent),
                member: MemberId::Shape(copy),
                at: None,
            })?;
            // Incoming connections are pasted too, each still carrying the
            // original on-part reference.
            let incoming: Vec<_> = tx
                .doc()
                .connections_iter()
                .filter(|(_, c)| c.target == shape)
                .map(|(_, c)| (c.source, c.kind))
                .collect();
            for (source, kind) in incoming {
                let connection = ConnectionId::new();
                tx.apply(Mutation::InsertConnection {
                    id: connection,
                    connection: Connection::new(source, copy, kind),
                })?;
            }
            if let Some(sentry) = sentry {
                sentries::rederive_owner(tx, sentry)?;
            }
            Ok(EditReceipt {
                shape: Some(copy),
                sentry,
                ..EditReceipt::default()
            })
        }
        ShapeKind::CasePlan { .. } | ShapeKind::CaseFileItem { .. } => Err(
            EngineError::IllegalEdit("only items and criteria are copied by reference".into()),
        ),
    }
}

// ---------------------------------------------------------------- movement

fn is_descendant(tx: &TxBuilder<'_>, node: ShapeId, ancestor: ShapeId) -> Result<bool, EngineError> {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if current == ancestor {
            return Ok(true);
        }
        cursor = tx.doc().shape_ref(current)?.parent;
    }
    Ok(false)
}

fn reparent(tx: &mut TxBuilder<'_>, shape: ShapeId, new_parent: ShapeId) -> Result<(), EngineError> {
    let old_parent = tx.doc().shape_ref(shape)?.parent;
    if let Some(old) = old_parent {
        tx.apply(Mutation::RemoveMember {
            set: MemberSet::ShapeChildren(old),
            member: MemberId::Shape(shape),
        })?;
    }
    tx.apply(Mutation::AddMember {
        set: MemberSet::ShapeChildren(new_parent),
        member: MemberId::Shape(shape),
        at: None,
    })?;
    tx.apply(Mutation::SetShapeParent {
        id: shape,
        parent: Some(new_parent),
    })?;
    Ok(())
}

/// Criterion shapes anywhere inside `root`'s subtree (excluding `root`).
fn subtree_criteria(tx: &TxBuilder<'_>, root: ShapeId) -> Result<Vec<ShapeId>, EngineError> {
    let mut found = Vec::new();
    let mut pending = vec![root];
    while let Some(current) = pending.pop() {
        let node = tx.doc().shape_ref(current)?;
        for child in &node.children {
            if tx.doc().shape_ref(*child)?.host().is_some() {
                found.push(*child);
            }
            pending.push(*child);
        }
    }
    Ok(found)
}

fn move_shape(
    tx: &mut TxBuilder<'_>,
    shape: ShapeId,
    new_parent: ShapeId,
) -> Result<EditReceipt, EngineError> {
    if is_descendant(tx, new_parent, shape)? {
        return Err(EngineError::IllegalEdit(
            "a shape cannot move into its own subtree".into(),
        ));
    }
    let kind = tx.doc().shape_ref(shape)?.kind.clone();
    match kind {
        ShapeKind::CasePlan { .. } => Err(EngineError::IllegalEdit(
            "the case plan root does not move".into(),
        )),
        ShapeKind::Criterion { .. } => {
            check_criterion_host(tx, new_parent)?;
            reparent(tx, shape, new_parent)?;
            tx.apply(Mutation::SetCriterionHost {
                id: shape,
                host: new_parent,
            })?;
            sentries::react_criterion_moved(tx, shape)?;
            Ok(EditReceipt {
                shape: Some(shape),
                sentry: tx.doc().shape_ref(shape)?.criterion_sentry(),
                ..EditReceipt::default()
            })
        }
        ShapeKind::CaseFileItem { item } => {
            let new_cf_parent = match tx.doc().shape_ref(new_parent)?.kind {
                ShapeKind::CaseFileItem { item: parent_item } => Some(parent_item),
                ShapeKind::CasePlan { .. } => None,
                _ => {
                    return Err(EngineError::IllegalEdit(
                        "case-file items nest under case-file items".into(),
                    ))
                }
            };
            reparent(tx, shape, new_parent)?;
            tx.apply(Mutation::SetCaseFileParent {
                id: item,
                parent: new_cf_parent,
                child_index: None,
            })?;
            Ok(EditReceipt {
                shape: Some(shape),
                case_file_item: Some(item),
                ..EditReceipt::default()
            })
        }
        ShapeKind::PlanItem { .. } => {
            let target = tx
                .doc()
                .shape_ref(new_parent)?
                .own_container()
                .ok_or_else(|| {
                    EngineError::IllegalEdit("plan items nest under structural containers".into())
                })?;
            reparent(tx, shape, new_parent)?;
            let definition = ensure_container_membership(tx, shape, target)?;
            for criterion in subtree_criteria(tx, shape)? {
                sentries::react_criterion_moved(tx, criterion)?;
            }
            Ok(EditReceipt {
                shape: Some(shape),
                definition: Some(definition),
                container: Some(target),
                ..EditReceipt::default()
            })
        }
        ShapeKind::DiscretionaryItem { .. } => {
            let table_owner = planning::owner_for(tx.doc(), new_parent)?;
            let target = match table_owner {
                TableOwner::Container(c) => c,
                TableOwner::HumanTask(ht) => enclosing_container(tx.doc(), ht)?,
            };
            planning::detach(tx, shape)?;
            reparent(tx, shape, new_parent)?;
            let definition = ensure_container_membership(tx, shape, target)?;
            for criterion in subtree_criteria(tx, shape)? {
                sentries::react_criterion_moved(tx, criterion)?;
            }
            let table = planning::attach(tx, shape, table_owner)?;
            Ok(EditReceipt {
                shape: Some(shape),
                definition: Some(definition),
                container: Some(target),
                table: Some(table),
                ..EditReceipt::default()
            })
        }
    }
}

fn move_elements(
    tx: &mut TxBuilder<'_>,
    shapes: &[ShapeId],
    new_parent: ShapeId,
) -> Result<EditReceipt, EngineError> {
    // A member whose ancestor is also in the set moves twice relative to
    // the target; the caller holds an inconsistent selection.
    for shape in shapes {
        let mut cursor = tx.doc().shape_ref(*shape)?.parent;
        while let Some(ancestor) = cursor {
            if shapes.contains(&ancestor) {
                return Err(EngineError::InconsistentSharedState(format!(
                    "{shape:?} and its ancestor {ancestor:?} selected together"
                )));
            }
            cursor = tx.doc().shape_ref(ancestor)?.parent;
        }
    }
    for shape in shapes {
        move_shape(tx, *shape, new_parent)?;
    }
    Ok(EditReceipt::default())
}

// ---------------------------------------------------------------- deletion

fn detach_from_parent(tx: &mut TxBuilder<'_>, shape: ShapeId) -> Result<(), EngineError> {
    if let Some(parent) = tx.doc().shape_ref(shape)?.parent {
        tx.apply(Mutation::RemoveMember {
            set: MemberSet::ShapeChildren(parent),
            member: MemberId::Shape(shape),
        })?;
    }
    Ok(())
}

/// Delete every on-part sourced from `source`, downgrading any connection
/// that still carries one. Normally the connection pass has already released
/// them; this sweeps what copy/paste or partial graphs left behind.
fn cleanup_source_on_parts(
    tx: &mut TxBuilder<'_>,
    source: ElementRef,
) -> Result<(), EngineError> {
    let on_parts: Vec<_> = tx
        .doc()
        .registry()
        .references_of(source)
        .into_iter()
        .filter_map(|r| match r {
            ElementRef::OnPart(op) => Some(op),
            _ => None,
        })
        .collect();
    for on_part in on_parts {
        let Some(state) = tx.doc().on_part(on_part) else {
            continue;
        };
        let sentry = state.sentry;
        for connection in sentries::connections_referencing(tx.doc(), on_part) {
            tx.apply(Mutation::SetConnectionKind {
                id: connection,
                kind: ConnectionKind::Association,
            })?;
        }
        tx.apply(Mutation::RemoveMember {
            set: MemberSet::SentryOnParts(sentry),
            member: MemberId::OnPart(on_part),
        })?;
        tx.apply(Mutation::RemoveOnPart { id: on_part })?;
    }
    Ok(())
}

fn delete_connections_touching(tx: &mut TxBuilder<'_>, shape: ShapeId) -> Result<(), EngineError> {
    let touching: Vec<_> = tx
        .doc()
        .connections_iter()
        .filter(|(_, c)| c.source == shape || c.target == shape)
        .map(|(id, _)| id)
        .collect();
    for connection in touching {
        delete_connection(tx, connection)?;
    }
    Ok(())
}

fn delete_connection(tx: &mut TxBuilder<'_>, connection: ConnectionId) -> Result<(), EngineError> {
    let conn = tx
        .doc()
        .connection(connection)
        .ok_or_else(|| EngineError::NotFound("connection", format!("{connection:?}")))?
        .clone();
    if let Some(on_part) = conn.on_part() {
        sentries::release_on_part(tx, on_part, connection)?;
    }
    if let (Some(from), Some(to)) = (
        case_file_item_of(tx, conn.source)?,
        case_file_item_of(tx, conn.target)?,
    ) {
        tx.apply(Mutation::RemoveCaseFileReference { from, to })?;
    }
    tx.apply(Mutation::RemoveConnection { id: connection })?;
    if conn.kind == ConnectionKind::DiscretionaryAssociation {
        // The item falls back to the structural container's table.
        let still_discretionary = tx
            .doc()
            .shape(conn.target)
            .is_some_and(Shape::is_discretionary);
        if still_discretionary {
            planning::detach(tx, conn.target)?;
            let container = enclosing_container(tx.doc(), conn.target)?;
            planning::attach(tx, conn.target, TableOwner::Container(container))?;
        }
    }
    Ok(())
}

fn delete_shape_recursive(tx: &mut TxBuilder<'_>, shape: ShapeId) -> Result<(), EngineError> {
    match tx.doc().shape_ref(shape)?.kind {
        ShapeKind::CasePlan { .. } => {
            return Err(EngineError::IllegalEdit(
                "the case plan root cannot be deleted".into(),
            ))
        }
        // Case-file deletion is leaf-only; the host removes children first.
        ShapeKind::CaseFileItem { item } => {
            let has_children = tx
                .doc()
                .case_file()
                .get(item)
                .is_some_and(|i| !i.children.is_empty());
            if has_children {
                return Err(ModelError::CaseFileItemHasChildren(item).into());
            }
        }
        _ => {}
    }
    let children: Vec<_> = tx.doc().shape_ref(shape)?.children.iter().copied().collect();
    for child in children {
        delete_shape_recursive(tx, child)?;
    }
    delete_connections_touching(tx, shape)?;

    let node = tx.doc().shape_ref(shape)?.clone();
    match node.kind {
        ShapeKind::CasePlan { .. } => unreachable!("rejected above"),
        ShapeKind::Criterion { sentry, .. } => {
            cleanup_source_on_parts(tx, ElementRef::Shape(shape))?;
            detach_from_parent(tx, shape)?;
            tx.apply(Mutation::RemoveShape { id: shape })?;
            if let Some(sentry) = sentry {
                sentries::gc_sentry_if_unreferenced(tx, sentry)?;
                if tx.doc().sentry(sentry).is_some() {
                    sentries::rederive_owner(tx, sentry)?;
                }
            }
        }
        ShapeKind::PlanItem { definition, container }
        | ShapeKind::DiscretionaryItem { definition, container } => {
            if node.is_discretionary() {
                planning::detach(tx, shape)?;
            }
            cleanup_source_on_parts(tx, ElementRef::Shape(shape))?;
            if let Some(body) = container {
                evacuate_container(tx, shape, body)?;
                tx.apply(Mutation::SetItemContainer {
                    id: shape,
                    container: None,
                })?;
                tx.apply(Mutation::RemoveContainer { id: body })?;
            }
            detach_from_parent(tx, shape)?;
            tx.apply(Mutation::RemoveShape { id: shape })?;
            gc_definition(tx, definition)?;
        }
        ShapeKind::CaseFileItem { item } => {
            cleanup_source_on_parts(tx, ElementRef::CaseFileItem(item))?;
            detach_from_parent(tx, shape)?;
            tx.apply(Mutation::RemoveShape { id: shape })?;
            // Errors out (and aborts the edit) while semantic children remain.
            tx.apply(Mutation::RemoveCaseFileItem { id: item })?;
        }
    }
    Ok(())
}

/// Move members a deleted stage's body still holds (definitions shared with
/// items elsewhere, sentries of surviving criteria) up to the enclosing
/// container.
fn evacuate_container(
    tx: &mut TxBuilder<'_>,
    stage_shape: ShapeId,
    body: ContainerId,
) -> Result<(), EngineError> {
    let state = tx
        .doc()
        .container(body)
        .ok_or_else(|| EngineError::NotFound("container", format!("{body:?}")))?;
    if state.is_empty() {
        return Ok(());
    }
    let definitions: Vec<_> = state.definitions.iter().copied().collect();
    let sentry_members: Vec<_> = state.sentries.iter().copied().collect();
    let target = enclosing_container(tx.doc(), stage_shape)?;
    tracing::debug!(?body, ?target, "evacuating stage body before deletion");
    for definition in definitions {
        tx.apply(Mutation::RemoveMember {
            set: MemberSet::ContainerDefinitions(body),
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
    }
    for sentry in sentry_members {
        tx.apply(Mutation::RemoveMember {
            set: MemberSet::ContainerSentries(body),
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
    }
    Ok(())
}

fn gc_definition(tx: &mut TxBuilder<'_>, definition: DefinitionId) -> Result<(), EngineError> {
    if !item_shapes_referencing(tx.doc(), definition).is_empty() {
        // Survivors may now resolve to a narrower common container.
        return rederive_definition_owner(tx, definition);
    }
    let Some(state) = tx.doc().definition(definition) else {
        return Ok(());
    };
    let owner = state.owner;
    tx.apply(Mutation::RemoveMember {
        set: MemberSet::ContainerDefinitions(owner),
        member: MemberId::Definition(definition),
    })?;
    tx.apply(Mutation::RemoveDefinition { id: definition })?;
    Ok(())
}

// -------------------------------------------------------------- connections

fn is_criterion(tx: &TxBuilder<'_>, shape: ShapeId) -> Result<bool, EngineError> {
    Ok(tx.doc().shape_ref(shape)?.host().is_some())
}

fn case_file_item_of(
    tx: &TxBuilder<'_>,
    shape: ShapeId,
) -> Result<Option<CaseFileItemId>, EngineError> {
    Ok(match tx.doc().shape(shape).map(|s| &s.kind) {
        Some(ShapeKind::CaseFileItem { item }) => Some(*item),
        _ => None,
    })
}

fn is_nonblocking_human_task(tx: &TxBuilder<'_>, shape: ShapeId) -> Result<bool, EngineError> {
    let Some(definition) = tx.doc().shape_ref(shape)?.definition() else {
        return Ok(false);
    };
    let def = tx
        .doc()
        .definition(definition)
        .ok_or_else(|| EngineError::DanglingReference(format!("{definition:?}")))?;
    Ok(def.kind == ItemKind::HumanTask && !def.blocking)
}

fn create_connection(
    tx: &mut TxBuilder<'_>,
    source: ShapeId,
    target: ShapeId,
) -> Result<EditReceipt, EngineError> {
    if source == target {
        return Err(EngineError::IllegalEdit("self-connection".into()));
    }
    tx.doc().shape_ref(source)?;
    tx.doc().shape_ref(target)?;

    let connection = ConnectionId::new();
    tx.apply(Mutation::InsertConnection {
        id: connection,
        connection: Connection::new(source, target, ConnectionKind::Association),
    })?;

    let mut receipt = EditReceipt {
        connection: Some(connection),
        ..EditReceipt::default()
    };
    if is_criterion(tx, target)? {
        if let Some(src) = sentries::source_for_shape(tx.doc(), source)? {
            let sentry = sentries::ensure_criterion_sentry(tx, target)?;
            sentries::create_on_part(tx, connection, sentry, src)?;
            receipt.sentry = Some(sentry);
        }
    } else if let (Some(from), Some(to)) = (case_file_item_of(tx, source)?, case_file_item_of(tx, target)?) {
        // Between case-file shapes a connection is a reference edge.
        tx.apply(Mutation::AddCaseFileReference { from, to })?;
        receipt.case_file_item = Some(from);
    } else if is_nonblocking_human_task(tx, source)?
        && tx.doc().shape_ref(target)?.is_discretionary()
    {
        tx.apply(Mutation::SetConnectionKind {
            id: connection,
            kind: ConnectionKind::DiscretionaryAssociation,
        })?;
        planning::detach(tx, target)?;
        receipt.table = Some(planning::attach(tx, target, TableOwner::HumanTask(source))?);
    }
    Ok(receipt)
}

fn reconnect_start(
    tx: &mut TxBuilder<'_>,
    connection: ConnectionId,
    new_source: ShapeId,
) -> Result<EditReceipt, EngineError> {
    let conn = tx
        .doc()
        .connection(connection)
        .ok_or_else(|| EngineError::NotFound("connection", format!("{connection:?}")))?
        .clone();
    let receipt = EditReceipt {
        connection: Some(connection),
        ..EditReceipt::default()
    };
    if conn.source == new_source {
        return Ok(receipt);
    }
    if new_source == conn.target {
        return Err(EngineError::IllegalEdit("self-connection".into()));
    }
    tx.doc().shape_ref(new_source)?;
    tx.apply(Mutation::SetConnectionSource {
        id: connection,
        shape: new_source,
    })?;

    match conn.kind {
        ConnectionKind::OnPartLink(on_part) => {
            match sentries::source_for_shape(tx.doc(), new_source)? {
                Some(src) => {
                    sentries::retarget_on_part_source(tx, connection, on_part, src)?;
                }
                None => {
                    tx.apply(Mutation::SetConnectionKind {
                        id: connection,
                        kind: ConnectionKind::Association,
                    })?;
                    sentries::release_on_part(tx, on_part, connection)?;
                }
            }
        }
        ConnectionKind::Association => {
            if is_criterion(tx, conn.target)? {
                if let Some(src) = sentries::source_for_shape(tx.doc(), new_source)? {
                    let sentry = sentries::ensure_criterion_sentry(tx, conn.target)?;
                    sentries::create_on_part(tx, connection, sentry, src)?;
                }
            }
        }
        ConnectionKind::DiscretionaryAssociation => {
            if is_nonblocking_human_task(tx, new_source)? {
                planning::detach(tx, conn.target)?;
                planning::attach(tx, conn.target, TableOwner::HumanTask(new_source))?;
            } else {
                tx.apply(Mutation::SetConnectionKind {
                    id: connection,
                    kind: ConnectionKind::Association,
                })?;
                planning::detach(tx, conn.target)?;
                let container = enclosing_container(tx.doc(), conn.target)?;
                planning::attach(tx, conn.target, TableOwner::Container(container))?;
            }
        }
    }
    Ok(receipt)
}

fn reconnect_end(
    tx: &mut TxBuilder<'_>,
    connection: ConnectionId,
    new_target: ShapeId,
) -> Result<EditReceipt, EngineError> {
    let conn = tx
        .doc()
        .connection(connection)
        .ok_or_else(|| EngineError::NotFound("connection", format!("{connection:?}")))?
        .clone();
    let receipt = EditReceipt {
        connection: Some(connection),
        ..EditReceipt::default()
    };
    if conn.target == new_target {
        return Ok(receipt);
    }
    if new_target == conn.source {
        return Err(EngineError::IllegalEdit("self-connection".into()));
    }
    tx.doc().shape_ref(new_target)?;
    tx.apply(Mutation::SetConnectionTarget {
        id: connection,
        shape: new_target,
    })?;

    match conn.kind {
        ConnectionKind::OnPartLink(on_part) => {
            if is_criterion(tx, new_target)? {
                let sentry = sentries::ensure_criterion_sentry(tx, new_target)?;
                sentries::move_on_part_to_sentry(tx, connection, on_part, sentry)?;
            } else {
                tx.apply(Mutation::SetConnectionKind {
                    id: connection,
                    kind: ConnectionKind::Association,
                })?;
                sentries::release_on_part(tx, on_part, connection)?;
            }
        }
        ConnectionKind::Association => {
            if is_criterion(tx, new_target)? {
                if let Some(src) = sentries::source_for_shape(tx.doc(), conn.source)? {
                    let sentry = sentries::ensure_criterion_sentry(tx, new_target)?;
                    sentries::create_on_part(tx, connection, sentry, src)?;
                }
            }
        }
        ConnectionKind::DiscretionaryAssociation => {
            let old_discretionary = tx
                .doc()
                .shape(conn.target)
                .is_some_and(Shape::is_discretionary);
            if old_discretionary {
                planning::detach(tx, conn.target)?;
                let container = enclosing_container(tx.doc(), conn.target)?;
                planning::attach(tx, conn.target, TableOwner::Container(container))?;
            }
            let new_discretionary = tx.doc().shape_ref(new_target)?.is_discretionary();
            if new_discretionary && is_nonblocking_human_task(tx, conn.source)? {
                planning::detach(tx, new_target)?;
                planning::attach(tx, new_target, TableOwner::HumanTask(conn.source))?;
            } else {
                tx.apply(Mutation::SetConnectionKind {
                    id: connection,
                    kind: ConnectionKind::Association,
                })?;
            }
        }
    }
    Ok(receipt)
}

// --------------------------------------------------------------- properties

fn update_properties(
    tx: &mut TxBuilder<'_>,
    shape: ShapeId,
    change: &PropertyChange,
) -> Result<EditReceipt, EngineError> {
    let mut receipt = EditReceipt {
        shape: Some(shape),
        ..EditReceipt::default()
    };
    match change {
        PropertyChange::Rename(name) => {
            let (target, current) = semantic_element(tx, shape)?;
            if current == *name {
                return Ok(receipt);
            }
            tx.apply(Mutation::Rename {
                target,
                from: current,
                to: name.clone(),
            })?;
        }
        PropertyChange::Rules(rules) => {
            let current = item_definition(tx, shape)?;
            if current.rules == *rules {
                return Ok(receipt);
            }
            // Cloning is never speculative: the no-op check above runs
            // before any split.
            let definition = ensure_exclusive(tx, shape)?;
            tx.apply(Mutation::SetDefinitionRules {
                id: definition,
                rules: *rules,
            })?;
            receipt.definition = Some(definition);
        }
        PropertyChange::AutoComplete(auto_complete) => {
            let current = item_definition(tx, shape)?;
            if current.kind != ItemKind::Stage {
                return Err(EngineError::IllegalEdit(
                    "auto-complete applies to stages".into(),
                ));
            }
            if current.auto_complete == *auto_complete {
                return Ok(receipt);
            }
            let definition = ensure_exclusive(tx, shape)?;
            tx.apply(Mutation::SetDefinitionAutoComplete {
                id: definition,
                auto_complete: *auto_complete,
            })?;
            receipt.definition = Some(definition);
        }
        PropertyChange::Blocking(blocking) => {
            let current = item_definition(tx, shape)?;
            if current.kind != ItemKind::HumanTask {
                return Err(EngineError::IllegalEdit(
                    "blocking applies to human tasks".into(),
                ));
            }
            if current.blocking == *blocking {
                return Ok(receipt);
            }
            let definition = ensure_exclusive(tx, shape)?;
            tx.apply(Mutation::SetDefinitionBlocking {
                id: definition,
                blocking: *blocking,
            })?;
            receipt.definition = Some(definition);
            if *blocking {
                // A blocking human task cannot own a planning table.
                let container = enclosing_container(tx.doc(), shape)?;
                planning::relocate_all(
                    tx,
                    TableOwner::HumanTask(shape),
                    TableOwner::Container(container),
                )?;
            }
        }
    }
    Ok(receipt)
}

fn item_definition(tx: &TxBuilder<'_>, shape: ShapeId) -> Result<ItemDefinition, EngineError> {
    let definition = tx
        .doc()
        .shape_ref(shape)?
        .definition()
        .ok_or_else(|| EngineError::IllegalEdit(format!("{shape:?} carries no definition")))?;
    tx.doc()
        .definition(definition)
        .cloned()
        .ok_or_else(|| EngineError::DanglingReference(format!("{definition:?}")))
}

/// The registered semantic element behind a shape, with its current sid.
fn semantic_element(
    tx: &TxBuilder<'_>,
    shape: ShapeId,
) -> Result<(ElementRef, String), EngineError> {
    let node = tx.doc().shape_ref(shape)?;
    match &node.kind {
        ShapeKind::CasePlan { container } => {
            let sid = tx
                .doc()
                .container(*container)
                .ok_or_else(|| EngineError::DanglingReference(format!("{container:?}")))?
                .sid
                .clone();
            Ok((ElementRef::Container(*container), sid))
        }
        ShapeKind::PlanItem { definition, .. } | ShapeKind::DiscretionaryItem { definition, .. } => {
            let sid = tx
                .doc()
                .definition(*definition)
                .ok_or_else(|| EngineError::DanglingReference(format!("{definition:?}")))?
                .sid
                .clone();
            Ok((ElementRef::Definition(*definition), sid))
        }
        ShapeKind::Criterion { sentry, .. } => {
            let sentry = sentry.ok_or_else(|| {
                EngineError::IllegalEdit("criterion has no sentry to rename".into())
            })?;
            let sid = tx
                .doc()
                .sentry(sentry)
                .ok_or_else(|| EngineError::DanglingReference(format!("{sentry:?}")))?
                .sid
                .clone();
            Ok((ElementRef::Sentry(sentry), sid))
        }
        ShapeKind::CaseFileItem { item } => {
            let sid = tx
                .doc()
                .case_file()
                .get(*item)
                .ok_or_else(|| EngineError::DanglingReference(format!("{item:?}")))?
                .sid
                .clone();
            Ok((ElementRef::CaseFileItem(*item), sid))
        }
    }
}

// -------------------------------------------------------------- replacement

fn replace_shape(
    tx: &mut TxBuilder<'_>,
    shape: ShapeId,
    new_kind: ItemKind,
) -> Result<EditReceipt, EngineError> {
    let old = item_definition(tx, shape)?;
    let old_id = tx
        .doc()
        .shape_ref(shape)?
        .definition()
        .ok_or_else(|| EngineError::IllegalEdit(format!("{shape:?} carries no definition")))?;
    let mut receipt = EditReceipt {
        shape: Some(shape),
        ..EditReceipt::default()
    };
    if old.kind == new_kind {
        return Ok(receipt);
    }

    // Criteria the new kind cannot carry go first.
    if !new_kind.accepts_criteria() {
        let hosted: Vec<_> = tx
            .doc()
            .shape_ref(shape)?
            .children
            .iter()
            .copied()
            .collect();
        for child in hosted {
            if tx.doc().shape_ref(child)?.host().is_some() {
                delete_shape_recursive(tx, child)?;
            }
        }
    }

    // Stage body teardown/creation.
    let node = tx.doc().shape_ref(shape)?.clone();
    let old_body = node.own_container();
    if old.kind.is_container() && !new_kind.is_container() {
        let body = old_body.ok_or_else(|| {
            EngineError::InconsistentSharedState(format!("{shape:?} is a stage without a body"))
        })?;
        let occupied = node.children.iter().any(|c| {
            tx.doc()
                .shape(*c)
                .is_some_and(|s| s.host().is_none())
        });
        let body_empty = tx.doc().container(body).is_some_and(Container::is_empty);
        if occupied || !body_empty {
            return Err(EngineError::IllegalEdit(
                "a stage can only be replaced while empty".into(),
            ));
        }
        tx.apply(Mutation::SetItemContainer {
            id: shape,
            container: None,
        })?;
        tx.apply(Mutation::RemoveContainer { id: body })?;
    }

    // New definition carries the control rules over.
    let owner = enclosing_container(tx.doc(), shape)?;
    let sid = tx.alloc_sid(new_kind.sid_prefix());
    let definition_id = DefinitionId::new();
    let mut definition = ItemDefinition::new(sid, new_kind, owner);
    definition.rules = old.rules;
    tx.apply(Mutation::InsertDefinition {
        id: definition_id,
        definition,
    })?;
    tx.apply(Mutation::AddMember {
        set: MemberSet::ContainerDefinitions(owner),
        member: MemberId::Definition(definition_id),
        at: None,
    })?;
    tx.apply(Mutation::SetShapeDefinition {
        id: shape,
        definition: definition_id,
    })?;
    receipt.definition = Some(definition_id);

    if !old.kind.is_container() && new_kind.is_container() {
        let body = ContainerId::new();
        let sid = tx.alloc_sid("PlanFragment");
        tx.apply(Mutation::InsertContainer {
            id: body,
            container: Container::new(sid, ContainerKind::Stage),
        })?;
        tx.apply(Mutation::SetItemContainer {
            id: shape,
            container: Some(body),
        })?;
        receipt.container = Some(body);
    }

    gc_definition(tx, old_id)?;

    // On-parts listening to this item retag to the new kind's event in
    // place; every carrying connection still points at the same item.
    let listening: Vec<_> = tx
        .doc()
        .registry()
        .references_of(ElementRef::Shape(shape))
        .into_iter()
        .filter_map(|r| match r {
            ElementRef::OnPart(op) => Some(op),
            _ => None,
        })
        .collect();
    let event = new_kind.standard_event();
    for on_part in listening {
        if tx.doc().on_part(on_part).is_some() {
            tx.apply(Mutation::SetOnPartEvent { id: on_part, event })?;
        }
    }

    // A non-blocking human task's table does not survive the replacement.
    if old.kind == ItemKind::HumanTask && !old.blocking {
        let container = enclosing_container(tx.doc(), shape)?;
        planning::relocate_all(
            tx,
            TableOwner::HumanTask(shape),
            TableOwner::Container(container),
        )?;
    }
    Ok(receipt)
}
