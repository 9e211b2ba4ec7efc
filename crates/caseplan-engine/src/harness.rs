//! Test support: a thin builder over [`Engine`] for assembling case models
//! in tests and examples. Methods panic on failure; production callers use
//! [`Engine::execute`] directly.

use crate::dispatch::{EditCommand, NewShape, PropertyChange};
use crate::engine::Engine;
use caseplan_model::{CaseFileItemId, ConnectionId, CriterionKind, ItemKind, ShapeId};

#[derive(Debug, Default)]
pub struct CaseBuilder {
    engine: Engine,
}

impl CaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }

    pub fn root(&self) -> ShapeId {
        self.engine.document().root()
    }

    pub fn stage(&mut self, parent: ShapeId) -> ShapeId {
        self.item(ItemKind::Stage, parent)
    }

    pub fn task(&mut self, parent: ShapeId) -> ShapeId {
        self.item(ItemKind::Task, parent)
    }

    pub fn milestone(&mut self, parent: ShapeId) -> ShapeId {
        self.item(ItemKind::Milestone, parent)
    }

    pub fn item(&mut self, kind: ItemKind, parent: ShapeId) -> ShapeId {
        self.engine
            .execute(&EditCommand::CreateShape(NewShape::PlanItem { kind, parent }))
            .expect("create item")
            .shape
            .expect("item shape")
    }

    /// A human task; non-blocking ones may own a planning table.
    pub fn human_task(&mut self, parent: ShapeId, blocking: bool) -> ShapeId {
        let shape = self.item(ItemKind::HumanTask, parent);
        if !blocking {
            self.engine
                .execute(&EditCommand::UpdateProperties {
                    shape,
                    change: PropertyChange::Blocking(false),
                })
                .expect("set non-blocking");
        }
        shape
    }

    pub fn discretionary(&mut self, kind: ItemKind, parent: ShapeId) -> ShapeId {
        self.engine
            .execute(&EditCommand::CreateShape(NewShape::DiscretionaryItem {
                kind,
                parent,
            }))
            .expect("create discretionary item")
            .shape
            .expect("discretionary shape")
    }

    pub fn entry_criterion(&mut self, host: ShapeId) -> ShapeId {
        self.criterion(CriterionKind::Entry, host)
    }

    pub fn exit_criterion(&mut self, host: ShapeId) -> ShapeId {
        self.criterion(CriterionKind::Exit, host)
    }

    pub fn criterion(&mut self, polarity: CriterionKind, host: ShapeId) -> ShapeId {
        self.engine
            .execute(&EditCommand::CreateShape(NewShape::Criterion {
                polarity,
                host,
            }))
            .expect("create criterion")
            .shape
            .expect("criterion shape")
    }

    pub fn case_file_item(&mut self, parent: Option<CaseFileItemId>) -> (ShapeId, CaseFileItemId) {
        let receipt = self
            .engine
            .execute(&EditCommand::CreateShape(NewShape::CaseFileItem { parent }))
            .expect("create case-file item");
        (
            receipt.shape.expect("case-file shape"),
            receipt.case_file_item.expect("case-file item"),
        )
    }

    pub fn connect(&mut self, source: ShapeId, target: ShapeId) -> ConnectionId {
        self.engine
            .execute(&EditCommand::CreateConnection { source, target })
            .expect("create connection")
            .connection
            .expect("connection id")
    }
}
