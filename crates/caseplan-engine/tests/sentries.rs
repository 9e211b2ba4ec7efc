//! Sentry and on-part lifecycle: lazy creation, event derivation, sharing,
//! splitting, and collection.

use caseplan_engine::{CaseBuilder, EditCommand, ElementRef, EngineError};
use caseplan_model::{ConnectionKind, OnPartSource, StandardEvent};
use pretty_assertions::assert_eq;

#[test]
fn first_connection_materializes_the_sentry() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let task = b.task(root);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(task);
    assert_eq!(b.engine().document().stats().sentries, 0);

    let connection = b.connect(milestone, entry);
    let doc = b.engine().document();
    assert_eq!(doc.stats().sentries, 1);
    assert_eq!(doc.stats().on_parts, 1);

    let sentry = doc.shape(entry).unwrap().criterion_sentry().unwrap();
    let (on_part_id, on_part) = doc.on_parts_iter().next().unwrap();
    assert_eq!(on_part.sentry, sentry);
    assert_eq!(on_part.source, OnPartSource::PlanItem(milestone));
    assert_eq!(on_part.event, StandardEvent::Occur);
    assert_eq!(
        doc.connection(connection).unwrap().kind,
        ConnectionKind::OnPartLink(on_part_id)
    );
    assert!(doc.sentry(sentry).unwrap().on_parts.contains(&on_part_id));
}

#[test]
fn events_follow_the_source_kind() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let task = b.task(root);
    let target = b.task(root);
    let entry = b.entry_criterion(target);

    // Work item completes.
    b.connect(task, entry);
    let doc = b.engine().document();
    let (_, on_part) = doc.on_parts_iter().next().unwrap();
    assert_eq!(on_part.event, StandardEvent::Complete);
}

#[test]
fn exit_criterion_source_yields_an_exit_event() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let t1 = b.task(root);
    let t2 = b.task(root);
    let exit = b.exit_criterion(t1);
    let entry = b.entry_criterion(t2);

    b.connect(exit, entry);
    let doc = b.engine().document();
    let (_, on_part) = doc.on_parts_iter().next().unwrap();
    assert_eq!(on_part.source, OnPartSource::Criterion(exit));
    assert_eq!(on_part.event, StandardEvent::Exit);
}

#[test]
fn case_file_source_yields_an_update_event() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let task = b.task(root);
    let entry = b.entry_criterion(task);
    let (cf_shape, cf_item) = b.case_file_item(None);

    b.connect(cf_shape, entry);
    let doc = b.engine().document();
    let (_, on_part) = doc.on_parts_iter().next().unwrap();
    assert_eq!(on_part.source, OnPartSource::CaseFileItem(cf_item));
    assert_eq!(on_part.event, StandardEvent::Update);
}

#[test]
fn entry_criterion_cannot_source_an_on_part() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let t1 = b.task(root);
    let t2 = b.task(root);
    let source_entry = b.entry_criterion(t1);
    let entry = b.entry_criterion(t2);

    let connection = b.connect(source_entry, entry);
    let doc = b.engine().document();
    assert_eq!(
        doc.connection(connection).unwrap().kind,
        ConnectionKind::Association
    );
    assert_eq!(doc.stats().sentries, 0);
    assert_eq!(doc.stats().on_parts, 0);
}

#[test]
fn deleting_the_last_criterion_collects_the_sentry() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let task = b.task(root);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(task);
    b.connect(milestone, entry);

    let engine = b.engine();
    let before = engine.document().stats();
    engine
        .execute(&EditCommand::DeleteShape { shape: entry })
        .unwrap();
    let after = engine.document().stats();
    assert_eq!(after.sentries, 0);
    assert_eq!(after.on_parts, 0);
    assert_eq!(after.connections, 0);

    engine.undo().unwrap();
    assert_eq!(engine.document().stats(), before);
    engine.redo().unwrap();
    assert_eq!(engine.document().stats(), after);
}

#[test]
fn deleting_the_connection_keeps_the_gate() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let task = b.task(root);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(task);
    let connection = b.connect(milestone, entry);

    let engine = b.engine();
    engine
        .execute(&EditCommand::DeleteConnection { connection })
        .unwrap();
    let doc = engine.document();
    // The criterion still references its sentry; only the on-part goes.
    assert_eq!(doc.stats().sentries, 1);
    assert_eq!(doc.stats().on_parts, 0);
    assert!(doc.shape(entry).unwrap().criterion_sentry().is_some());
}

#[test]
fn sentry_owner_follows_the_host() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let s1 = b.stage(root);
    let s2 = b.stage(root);
    let task = b.task(s1);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(task);
    b.connect(milestone, entry);

    let engine = b.engine();
    let sentry = engine
        .document()
        .shape(entry)
        .unwrap()
        .criterion_sentry()
        .unwrap();
    let (c1, c2) = {
        let doc = engine.document();
        (
            doc.shape(s1).unwrap().own_container().unwrap(),
            doc.shape(s2).unwrap().own_container().unwrap(),
        )
    };
    assert_eq!(engine.owning_container(ElementRef::Sentry(sentry)), Some(c1));

    engine
        .execute(&EditCommand::MoveShape {
            shape: task,
            new_parent: s2,
        })
        .unwrap();
    assert_eq!(engine.owning_container(ElementRef::Sentry(sentry)), Some(c2));
    let doc = engine.document();
    assert!(doc.container(c2).unwrap().sentries.contains(&sentry));
    assert!(!doc.container(c1).unwrap().sentries.contains(&sentry));
}

#[test]
fn reattaching_a_criterion_to_the_case_plan_migrates_the_sentry() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let s1 = b.stage(root);
    let t1 = b.task(s1);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(t1);
    b.connect(milestone, entry);

    let engine = b.engine();
    let sentry = engine
        .document()
        .shape(entry)
        .unwrap()
        .criterion_sentry()
        .unwrap();
    let c1 = engine.document().shape(s1).unwrap().own_container().unwrap();
    assert_eq!(engine.owning_container(ElementRef::Sentry(sentry)), Some(c1));

    engine
        .execute(&EditCommand::MoveShape {
            shape: entry,
            new_parent: root,
        })
        .unwrap();

    let doc = engine.document();
    let case_plan = doc.case_plan();
    assert_eq!(doc.shape(entry).unwrap().parent, Some(root));
    assert_eq!(doc.shape(entry).unwrap().criterion_sentry(), Some(sentry));
    assert_eq!(doc.sentry(sentry).unwrap().owner, case_plan);
    assert!(doc.container(case_plan).unwrap().sentries.contains(&sentry));
    assert!(!doc.container(c1).unwrap().sentries.contains(&sentry));

    engine.undo().unwrap();
    assert_eq!(engine.owning_container(ElementRef::Sentry(sentry)), Some(c1));
}

#[test]
fn cloned_criterion_shares_sentry_and_on_parts() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let s = b.stage(root);
    let t1 = b.task(s);
    let t2 = b.task(s);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(t1);
    b.connect(milestone, entry);

    let engine = b.engine();
    let receipt = engine
        .execute(&EditCommand::CloneShape {
            shape: entry,
            new_parent: t2,
        })
        .unwrap();
    let copy = receipt.shape.unwrap();

    let doc = engine.document();
    let sentry = doc.shape(entry).unwrap().criterion_sentry().unwrap();
    assert_eq!(doc.shape(copy).unwrap().criterion_sentry(), Some(sentry));
    assert_eq!(doc.stats().sentries, 1);
    // The pasted incoming connection carries the same on-part.
    assert_eq!(doc.stats().on_parts, 1);
    assert_eq!(doc.stats().connections, 2);
    assert!(engine.is_shared(ElementRef::Sentry(sentry)));
}

#[test]
fn host_moving_out_of_scope_splits_the_shared_sentry() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let s1 = b.stage(root);
    let s2 = b.stage(root);
    let t1 = b.task(s1);
    let t2 = b.task(s1);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(t1);
    b.connect(milestone, entry);

    let engine = b.engine();
    let copy = engine
        .execute(&EditCommand::CloneShape {
            shape: entry,
            new_parent: t2,
        })
        .unwrap()
        .shape
        .unwrap();
    let shared = engine
        .document()
        .shape(entry)
        .unwrap()
        .criterion_sentry()
        .unwrap();
    let before = engine.document().stats();

    engine
        .execute(&EditCommand::MoveShape {
            shape: t2,
            new_parent: s2,
        })
        .unwrap();

    let doc = engine.document();
    let split = doc.shape(copy).unwrap().criterion_sentry().unwrap();
    assert_ne!(split, shared);
    assert_eq!(doc.shape(entry).unwrap().criterion_sentry(), Some(shared));
    assert_eq!(doc.stats().sentries, 2);
    // On-parts are cloned for the split sentry, never shared across gates.
    assert_eq!(doc.stats().on_parts, 2);
    let split_ops = &doc.sentry(split).unwrap().on_parts;
    let shared_ops = &doc.sentry(shared).unwrap().on_parts;
    assert_eq!(split_ops.len(), 1);
    assert_eq!(shared_ops.len(), 1);
    assert_ne!(split_ops[0], shared_ops[0]);
    // The moved criterion's connection now carries the clone.
    let copy_conn = doc
        .connections_iter()
        .find(|(_, c)| c.target == copy)
        .unwrap()
        .1;
    assert_eq!(copy_conn.kind, ConnectionKind::OnPartLink(split_ops[0]));
    // Both clones listen to the same source.
    assert_eq!(
        doc.on_part(split_ops[0]).unwrap().source,
        doc.on_part(shared_ops[0]).unwrap().source
    );

    engine.undo().unwrap();
    assert_eq!(engine.document().stats(), before);
    assert_eq!(
        engine.document().shape(copy).unwrap().criterion_sentry(),
        Some(shared)
    );
}

#[test]
fn reconnect_end_moves_the_on_part_to_the_new_gate() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let t1 = b.task(root);
    let t2 = b.task(root);
    let milestone = b.milestone(root);
    let e1 = b.entry_criterion(t1);
    let e2 = b.entry_criterion(t2);
    let connection = b.connect(milestone, e1);

    let engine = b.engine();
    let s1 = engine
        .document()
        .shape(e1)
        .unwrap()
        .criterion_sentry()
        .unwrap();
    engine
        .execute(&EditCommand::ReconnectEnd {
            connection,
            new_target: e2,
        })
        .unwrap();

    let doc = engine.document();
    let s2 = doc.shape(e2).unwrap().criterion_sentry().unwrap();
    assert_ne!(s1, s2);
    let (on_part_id, on_part) = doc.on_parts_iter().next().unwrap();
    assert_eq!(on_part.sentry, s2);
    assert!(doc.sentry(s2).unwrap().on_parts.contains(&on_part_id));
    // The old gate stays while its criterion does, now with no on-parts.
    assert!(doc.sentry(s1).unwrap().on_parts.is_empty());
}

#[test]
fn reconnect_start_across_families_replaces_the_on_part() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let task = b.task(root);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(task);
    let (cf_shape, cf_item) = b.case_file_item(None);
    let connection = b.connect(milestone, entry);

    let engine = b.engine();
    let old_op = engine.document().on_parts_iter().next().unwrap().0;
    engine
        .execute(&EditCommand::ReconnectStart {
            connection,
            new_source: cf_shape,
        })
        .unwrap();

    let doc = engine.document();
    assert_eq!(doc.stats().on_parts, 1);
    let (new_op, on_part) = doc.on_parts_iter().next().unwrap();
    assert_ne!(new_op, old_op);
    assert_eq!(on_part.source, OnPartSource::CaseFileItem(cf_item));
    assert_eq!(on_part.event, StandardEvent::Update);
    assert_eq!(
        doc.connection(connection).unwrap().kind,
        ConnectionKind::OnPartLink(new_op)
    );
}

#[test]
fn reconnect_start_within_the_family_retags_in_place() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let task = b.task(root);
    let milestone = b.milestone(root);
    let other = b.task(root);
    let entry = b.entry_criterion(task);
    let connection = b.connect(milestone, entry);

    let engine = b.engine();
    let old_op = engine.document().on_parts_iter().next().unwrap().0;
    engine
        .execute(&EditCommand::ReconnectStart {
            connection,
            new_source: other,
        })
        .unwrap();

    let doc = engine.document();
    let (op, on_part) = doc.on_parts_iter().next().unwrap();
    assert_eq!(op, old_op);
    assert_eq!(on_part.source, OnPartSource::PlanItem(other));
    assert_eq!(on_part.event, StandardEvent::Complete);
}

#[test]
fn reconnecting_onto_the_other_endpoint_aborts() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let task = b.task(root);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(task);
    let connection = b.connect(milestone, entry);

    let engine = b.engine();
    let before = engine.document().stats();

    let err = engine
        .execute(&EditCommand::ReconnectStart {
            connection,
            new_source: entry,
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalEdit(_)));

    let err = engine
        .execute(&EditCommand::ReconnectEnd {
            connection,
            new_target: milestone,
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalEdit(_)));

    let depth = engine.undo_depth();
    let doc = engine.document();
    assert_eq!(doc.stats(), before);
    assert_eq!(doc.connection(connection).unwrap().source, milestone);
    assert_eq!(doc.connection(connection).unwrap().target, entry);

    // The aborted edits recorded nothing.
    engine.undo().unwrap();
    assert_eq!(engine.undo_depth(), depth - 1);
    assert_eq!(engine.document().stats().connections, 0);
}

#[test]
fn reconnect_start_to_an_ineligible_source_downgrades() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let t1 = b.task(root);
    let t2 = b.task(root);
    let milestone = b.milestone(root);
    let other_entry = b.entry_criterion(t1);
    let entry = b.entry_criterion(t2);
    let connection = b.connect(milestone, entry);

    let engine = b.engine();
    engine
        .execute(&EditCommand::ReconnectStart {
            connection,
            new_source: other_entry,
        })
        .unwrap();

    let doc = engine.document();
    assert_eq!(
        doc.connection(connection).unwrap().kind,
        ConnectionKind::Association
    );
    assert_eq!(doc.stats().on_parts, 0);
    // The target's sentry survives, held by the criterion.
    assert_eq!(doc.stats().sentries, 1);
}
