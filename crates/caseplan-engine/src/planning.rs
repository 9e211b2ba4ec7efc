//! Planning table lifecycle.
//!
//! A planning table exists exactly while it holds discretionary items: the
//! first attachment creates it, the last detachment deletes it. Eligible
//! owners are structural containers (stage, case plan) and non-blocking
//! human task items.

use crate::document::Document;
use crate::error::EngineError;
use crate::membership::enclosing_container;
use crate::mutation::{MemberId, MemberSet, Mutation};
use crate::stack::TxBuilder;
use caseplan_model::{ItemKind, PlanningTable, ShapeId, TableId, TableOwner};

/// The table currently owned by `owner`, if one exists.
pub(crate) fn table_of(doc: &Document, owner: TableOwner) -> Option<TableId> {
    doc.tables_iter()
        .find(|(_, t)| t.owner == owner)
        .map(|(id, _)| id)
}

/// The table owner a discretionary item under `parent` attaches to: the
/// parent item itself when it is a non-blocking human task, otherwise the
/// enclosing structural container.
pub(crate) fn owner_for(doc: &Document, parent: ShapeId) -> Result<TableOwner, EngineError> {
    let node = doc.shape_ref(parent)?;
    if let Some(definition) = node.definition() {
        let def = doc
            .definition(definition)
            .ok_or_else(|| EngineError::DanglingReference(format!("{definition:?}")))?;
        if def.kind == ItemKind::HumanTask && !def.blocking {
            return Ok(TableOwner::HumanTask(parent));
        }
    }
    if let Some(container) = node.own_container() {
        return Ok(TableOwner::Container(container));
    }
    Ok(TableOwner::Container(enclosing_container(doc, parent)?))
}

/// Attach a discretionary item shape to `owner`'s table, creating the table
/// on first use. Also keeps the item's definition a member of the right
/// structural container.
pub(crate) fn attach(
    tx: &mut TxBuilder<'_>,
    item: ShapeId,
    owner: TableOwner,
) -> Result<TableId, EngineError> {
    let table = match table_of(tx.doc(), owner) {
        Some(existing) => existing,
        None => {
            let table_id = TableId::new();
            let sid = tx.alloc_sid("PlanningTable");
            tracing::debug!(?owner, ?table_id, "creating planning table");
            tx.apply(Mutation::InsertTable {
                id: table_id,
                table: PlanningTable::new(sid, owner),
            })?;
            table_id
        }
    };
    tx.apply(Mutation::AddMember {
        set: MemberSet::TableItems(table),
        member: MemberId::Shape(item),
        at: None,
    })?;
    Ok(table)
}

/// Detach a discretionary item shape from its table, deleting the table
/// when it empties.
pub(crate) fn detach(tx: &mut TxBuilder<'_>, item: ShapeId) -> Result<(), EngineError> {
    let Some((table, _)) = tx
        .doc()
        .tables_iter()
        .find(|(_, t)| t.items.contains(&item))
    else {
        return Ok(());
    };
    tx.apply(Mutation::RemoveMember {
        set: MemberSet::TableItems(table),
        member: MemberId::Shape(item),
    })?;
    let emptied = tx
        .doc()
        .table(table)
        .is_some_and(PlanningTable::is_empty);
    if emptied {
        tracing::debug!(?table, "removing emptied planning table");
        tx.apply(Mutation::RemoveTable { id: table })?;
    }
    Ok(())
}

/// Move every item of `from`'s table (if any) to `target`'s, then drop the
/// emptied source table. Used when a human task's blocking flag flips or an
/// item is replaced.
pub(crate) fn relocate_all(
    tx: &mut TxBuilder<'_>,
    from: TableOwner,
    target: TableOwner,
) -> Result<(), EngineError> {
    let Some(source) = table_of(tx.doc(), from) else {
        return Ok(());
    };
    let items: Vec<_> = tx
        .doc()
        .table(source)
        .map(|t| t.items.iter().copied().collect())
        .unwrap_or_default();
    for item in items {
        tx.apply(Mutation::RemoveMember {
            set: MemberSet::TableItems(source),
            member: MemberId::Shape(item),
        })?;
        attach(tx, item, target)?;
    }
    let emptied = tx
        .doc()
        .table(source)
        .is_some_and(PlanningTable::is_empty);
    if emptied {
        tx.apply(Mutation::RemoveTable { id: source })?;
    }
    Ok(())
}
