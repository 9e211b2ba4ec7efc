//! Planning tables exist exactly while they hold discretionary items.

use caseplan_engine::{CaseBuilder, EditCommand, PropertyChange};
use caseplan_model::{ItemKind, TableOwner};
use pretty_assertions::assert_eq;

#[test]
fn first_discretionary_item_creates_the_table() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let stage = b.stage(root);
    assert_eq!(b.engine().document().stats().tables, 0);

    let item = b.discretionary(ItemKind::Task, stage);
    let doc = b.engine().document();
    assert_eq!(doc.stats().tables, 1);
    let body = doc.shape(stage).unwrap().own_container().unwrap();
    let (_, table) = doc.tables_iter().next().unwrap();
    assert_eq!(table.owner, TableOwner::Container(body));
    assert!(table.items.contains(&item));
}

#[test]
fn last_detachment_removes_the_table() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let item = b.discretionary(ItemKind::Task, root);

    let engine = b.engine();
    let before = engine.document().stats();
    assert_eq!(before.tables, 1);

    engine
        .execute(&EditCommand::DeleteShape { shape: item })
        .unwrap();
    assert_eq!(engine.document().stats().tables, 0);

    engine.undo().unwrap();
    assert_eq!(engine.document().stats(), before);
    engine.redo().unwrap();
    assert_eq!(engine.document().stats().tables, 0);
}

#[test]
fn second_item_reuses_the_table() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    b.discretionary(ItemKind::Task, root);
    b.discretionary(ItemKind::Milestone, root);
    assert_eq!(b.engine().document().stats().tables, 1);
}

#[test]
fn non_blocking_human_task_owns_its_table() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let ht = b.human_task(root, false);
    let item = b.discretionary(ItemKind::Task, ht);

    let doc = b.engine().document();
    let (_, table) = doc.tables_iter().next().unwrap();
    assert_eq!(table.owner, TableOwner::HumanTask(ht));
    assert!(table.items.contains(&item));
}

#[test]
fn turning_blocking_relocates_the_table() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let ht = b.human_task(root, false);
    let item = b.discretionary(ItemKind::Task, ht);

    let engine = b.engine();
    engine
        .execute(&EditCommand::UpdateProperties {
            shape: ht,
            change: PropertyChange::Blocking(true),
        })
        .unwrap();

    let doc = engine.document();
    assert_eq!(doc.stats().tables, 1);
    let (_, table) = doc.tables_iter().next().unwrap();
    assert_eq!(table.owner, TableOwner::Container(doc.case_plan()));
    assert!(table.items.contains(&item));

    engine.undo().unwrap();
    let doc = engine.document();
    let (_, table) = doc.tables_iter().next().unwrap();
    assert_eq!(table.owner, TableOwner::HumanTask(ht));
}

#[test]
fn discretionary_association_moves_the_item() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let stage = b.stage(root);
    let item = b.discretionary(ItemKind::Task, stage);
    let ht = b.human_task(root, false);
    let connection = b.connect(ht, item);

    let engine = b.engine();
    {
        let doc = engine.document();
        assert_eq!(
            doc.connection(connection).unwrap().kind,
            caseplan_model::ConnectionKind::DiscretionaryAssociation
        );
        assert_eq!(doc.stats().tables, 1);
        let (_, table) = doc.tables_iter().next().unwrap();
        assert_eq!(table.owner, TableOwner::HumanTask(ht));
        assert!(table.items.contains(&item));
    }

    // Dropping the association sends the item back to its stage's table.
    engine
        .execute(&EditCommand::DeleteConnection { connection })
        .unwrap();
    let doc = engine.document();
    let body = doc.shape(stage).unwrap().own_container().unwrap();
    let (_, table) = doc.tables_iter().next().unwrap();
    assert_eq!(table.owner, TableOwner::Container(body));
    assert!(table.items.contains(&item));
}

#[test]
fn replacing_a_non_blocking_human_task_evicts_its_table() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let ht = b.human_task(root, false);
    let item = b.discretionary(ItemKind::Task, ht);

    let engine = b.engine();
    engine
        .execute(&EditCommand::ReplaceShape {
            shape: ht,
            new_kind: ItemKind::Task,
        })
        .unwrap();

    let doc = engine.document();
    let definition = doc.shape(ht).unwrap().definition().unwrap();
    assert_eq!(doc.definition(definition).unwrap().kind, ItemKind::Task);
    let (_, table) = doc.tables_iter().next().unwrap();
    assert_eq!(table.owner, TableOwner::Container(doc.case_plan()));
    assert!(table.items.contains(&item));
}

#[test]
fn replacement_retags_listening_on_parts_in_place() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let task = b.task(root);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(task);
    b.connect(milestone, entry);

    let engine = b.engine();
    let old_op = engine.document().on_parts_iter().next().unwrap().0;
    assert_eq!(
        engine.document().on_part(old_op).unwrap().event,
        caseplan_model::StandardEvent::Occur
    );

    engine
        .execute(&EditCommand::ReplaceShape {
            shape: milestone,
            new_kind: ItemKind::Task,
        })
        .unwrap();
    let doc = engine.document();
    // Same on-part, new event.
    let on_part = doc.on_part(old_op).unwrap();
    assert_eq!(on_part.event, caseplan_model::StandardEvent::Complete);

    engine.undo().unwrap();
    assert_eq!(
        engine.document().on_part(old_op).unwrap().event,
        caseplan_model::StandardEvent::Occur
    );
}

#[test]
fn replacing_an_occupied_stage_is_rejected() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let stage = b.stage(root);
    b.task(stage);

    let engine = b.engine();
    let before = engine.document().stats();
    let err = engine
        .execute(&EditCommand::ReplaceShape {
            shape: stage,
            new_kind: ItemKind::Task,
        })
        .unwrap_err();
    assert!(matches!(err, caseplan_engine::EngineError::IllegalEdit(_)));
    assert_eq!(engine.document().stats(), before);
}

#[test]
fn replacing_with_an_event_listener_drops_criteria() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let task = b.task(root);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(task);
    b.connect(milestone, entry);

    let engine = b.engine();
    engine
        .execute(&EditCommand::ReplaceShape {
            shape: task,
            new_kind: ItemKind::TimerEventListener,
        })
        .unwrap();
    let doc = engine.document();
    assert!(doc.shape(entry).is_none());
    assert_eq!(doc.stats().sentries, 0);
    assert_eq!(doc.stats().on_parts, 0);
    assert_eq!(doc.stats().connections, 0);
}
