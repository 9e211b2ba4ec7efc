//! Transaction history: every command undoes exactly and redoes under the
//! original identities.

use caseplan_engine::{CaseBuilder, EditCommand, Engine, NewShape, PropertyChange};
use caseplan_model::{ControlRules, CriterionKind, ItemKind};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn empty_stacks_report_false() {
    let mut engine = Engine::new();
    assert!(!engine.undo().unwrap());
    assert!(!engine.redo().unwrap());
}

#[test]
fn a_new_edit_discards_redo_history() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    b.task(root);
    let engine = b.engine();
    engine.undo().unwrap();
    assert_eq!(engine.redo_depth(), 1);

    engine
        .execute(&EditCommand::CreateShape(NewShape::PlanItem {
            kind: ItemKind::Milestone,
            parent: root,
        }))
        .unwrap();
    assert_eq!(engine.redo_depth(), 0);
    assert!(!engine.redo().unwrap());
}

#[test]
fn redo_restores_the_original_identities() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let task = b.task(root);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(task);
    let connection = b.connect(milestone, entry);

    let engine = b.engine();
    let sentry = engine
        .document()
        .shape(entry)
        .unwrap()
        .criterion_sentry()
        .unwrap();

    engine.undo().unwrap(); // connection
    engine.undo().unwrap(); // criterion
    assert!(engine.document().shape(entry).is_none());
    assert!(engine.document().connection(connection).is_none());

    engine.redo().unwrap();
    engine.redo().unwrap();
    let doc = engine.document();
    assert!(doc.shape(entry).is_some());
    assert!(doc.connection(connection).is_some());
    // Replay reuses the recorded ids instead of allocating fresh ones.
    assert_eq!(doc.shape(entry).unwrap().criterion_sentry(), Some(sentry));
    assert!(doc.sentry(sentry).is_some());
}

#[test]
fn undo_restores_child_positions() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    let first = b.task(root);
    let second = b.task(root);
    let third = b.task(root);

    let engine = b.engine();
    engine
        .execute(&EditCommand::DeleteShape { shape: second })
        .unwrap();
    engine.undo().unwrap();

    let children: Vec<_> = engine
        .document()
        .shape(root)
        .unwrap()
        .children
        .iter()
        .copied()
        .collect();
    assert_eq!(children, vec![first, second, third]);
}

#[test]
fn failed_edits_leave_no_history() {
    let mut b = CaseBuilder::new();
    let root = b.root();
    b.task(root);

    let engine = b.engine();
    let before = engine.document().stats();
    let depth = engine.undo_depth();
    engine
        .execute(&EditCommand::DeleteShape { shape: root })
        .unwrap_err();
    assert_eq!(engine.document().stats(), before);
    assert_eq!(engine.undo_depth(), depth);
}

// RUST_LOG=caseplan_engine=trace surfaces the recorded mutation stream.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn a_full_scenario_unwinds_to_pristine() {
    init_logging();
    let mut b = CaseBuilder::new();
    let root = b.root();
    let pristine = b.engine().document().stats();

    let stage = b.stage(root);
    let task = b.task(stage);
    let ht = b.human_task(root, false);
    b.discretionary(ItemKind::Task, ht);
    let milestone = b.milestone(root);
    let entry = b.entry_criterion(task);
    b.connect(milestone, entry);
    let (cf_shape, _) = b.case_file_item(None);
    b.connect(cf_shape, entry);

    let engine = b.engine();
    engine
        .execute(&EditCommand::UpdateProperties {
            shape: task,
            change: PropertyChange::Rules(ControlRules {
                repeatable: true,
                ..ControlRules::default()
            }),
        })
        .unwrap();
    engine
        .execute(&EditCommand::ReplaceShape {
            shape: milestone,
            new_kind: ItemKind::UserEventListener,
        })
        .unwrap();

    let built = engine.document().stats();
    while engine.undo().unwrap() {}
    assert_eq!(engine.document().stats(), pristine);
    while engine.redo().unwrap() {}
    assert_eq!(engine.document().stats(), built);
    while engine.undo().unwrap() {}
    assert_eq!(engine.document().stats(), pristine);
}

#[derive(Debug, Clone)]
enum Step {
    Task,
    Stage,
    Milestone,
    Criterion,
    Connect,
    Paste,
    Diverge,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Task),
        Just(Step::Stage),
        Just(Step::Milestone),
        Just(Step::Criterion),
        Just(Step::Connect),
        Just(Step::Paste),
        Just(Step::Diverge),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_edit_sequence_unwinds_and_replays(steps in prop::collection::vec(step(), 1..24)) {
        let mut engine = Engine::new();
        let pristine = engine.document().stats();
        let root = engine.document().root();

        let mut stages = vec![root];
        let mut items = Vec::new();
        let mut leaves = Vec::new();
        let mut criteria = Vec::new();
        for s in &steps {
            // Only creation and divergence-requesting edits may allocate
            // definitions; everything else shares.
            let defs = engine.document().stats().definitions;
            match s {
                Step::Task | Step::Milestone => {
                    let kind = if matches!(s, Step::Task) {
                        ItemKind::Task
                    } else {
                        ItemKind::Milestone
                    };
                    let parent = *stages.last().unwrap();
                    let shape = engine
                        .execute(&EditCommand::CreateShape(NewShape::PlanItem { kind, parent }))
                        .unwrap()
                        .shape
                        .unwrap();
                    items.push(shape);
                    leaves.push(shape);
                    prop_assert_eq!(engine.document().stats().definitions, defs + 1);
                }
                Step::Stage => {
                    let parent = *stages.last().unwrap();
                    let shape = engine
                        .execute(&EditCommand::CreateShape(NewShape::PlanItem {
                            kind: ItemKind::Stage,
                            parent,
                        }))
                        .unwrap()
                        .shape
                        .unwrap();
                    stages.push(shape);
                    items.push(shape);
                    prop_assert_eq!(engine.document().stats().definitions, defs + 1);
                }
                Step::Criterion => {
                    if let Some(host) = items.last().copied() {
                        let shape = engine
                            .execute(&EditCommand::CreateShape(NewShape::Criterion {
                                polarity: CriterionKind::Entry,
                                host,
                            }))
                            .unwrap()
                            .shape
                            .unwrap();
                        criteria.push(shape);
                        prop_assert_eq!(engine.document().stats().definitions, defs);
                    }
                }
                Step::Connect => {
                    if let (Some(source), Some(target)) =
                        (items.first().copied(), criteria.last().copied())
                    {
                        engine
                            .execute(&EditCommand::CreateConnection { source, target })
                            .unwrap();
                        prop_assert_eq!(engine.document().stats().definitions, defs);
                    }
                }
                Step::Paste => {
                    if let Some(shape) = leaves.last().copied() {
                        let new_parent = *stages.last().unwrap();
                        let copy = engine
                            .execute(&EditCommand::CloneShape { shape, new_parent })
                            .unwrap()
                            .shape
                            .unwrap();
                        items.push(copy);
                        leaves.push(copy);
                        prop_assert_eq!(engine.document().stats().definitions, defs);
                    }
                }
                Step::Diverge => {
                    if let Some(shape) = leaves.last().copied() {
                        engine
                            .execute(&EditCommand::UpdateProperties {
                                shape,
                                change: PropertyChange::Rules(ControlRules {
                                    repeatable: true,
                                    ..ControlRules::default()
                                }),
                            })
                            .unwrap();
                        prop_assert!(engine.document().stats().definitions <= defs + 1);
                    }
                }
            }
        }

        let built = engine.document().stats();
        let depth = engine.undo_depth();
        while engine.undo().unwrap() {}
        prop_assert_eq!(engine.document().stats(), pristine);
        while engine.redo().unwrap() {}
        prop_assert_eq!(engine.document().stats(), built);
        prop_assert_eq!(engine.undo_depth(), depth);
    }
}
