//! Per-session document state.
//!
//! One `Document` per open diagram: every semantic and graphical store, the
//! reference registry, and the stable-id allocator live here, with their
//! lifecycle tied to the document. Nothing in this module is a process-wide
//! singleton.

use crate::error::EngineError;
use crate::registry::{ElementRef, ReferenceRegistry};
use caseplan_model::{
    CaseFileModel, Connection, ConnectionId, Container, ContainerId, ContainerKind, DefinitionId,
    ItemDefinition, OnPart, OnPartId, PlanningTable, Sentry, SentryId, Shape, ShapeId, ShapeKind,
    TableId,
};
use indexmap::IndexMap;

/// Allocates stable ids of the form `Prefix_N`, one counter per prefix.
#[derive(Debug, Default)]
pub(crate) struct SidAllocator {
    counters: IndexMap<String, u64>,
}

impl SidAllocator {
    pub(crate) fn next(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        format!("{prefix}_{counter}")
    }
}

/// Store counts, for host diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentStats {
    pub containers: usize,
    pub definitions: usize,
    pub sentries: usize,
    pub on_parts: usize,
    pub tables: usize,
    pub case_file_items: usize,
    pub shapes: usize,
    pub connections: usize,
}

/// The full editable state of one open document.
#[derive(Debug)]
pub struct Document {
    pub(crate) registry: ReferenceRegistry,
    pub(crate) sids: SidAllocator,
    pub(crate) containers: IndexMap<ContainerId, Container>,
    pub(crate) definitions: IndexMap<DefinitionId, ItemDefinition>,
    pub(crate) sentries: IndexMap<SentryId, Sentry>,
    pub(crate) on_parts: IndexMap<OnPartId, OnPart>,
    pub(crate) tables: IndexMap<TableId, PlanningTable>,
    pub(crate) case_file: CaseFileModel,
    pub(crate) shapes: IndexMap<ShapeId, Shape>,
    pub(crate) connections: IndexMap<ConnectionId, Connection>,
    root: ShapeId,
    case_plan: ContainerId,
}

impl Document {
    /// An empty document: just the case plan model and its root shape.
    pub fn new() -> Self {
        let mut sids = SidAllocator::default();
        let mut registry = ReferenceRegistry::new();
        let mut containers = IndexMap::new();
        let mut shapes = IndexMap::new();

        let case_plan = ContainerId::new();
        let sid = sids.next("CasePlanModel");
        containers.insert(
            case_plan,
            Container::new(sid.clone(), ContainerKind::CasePlanModel),
        );
        // The registry is empty at this point, so the id cannot collide.
        let _ = registry.register(&sid, ElementRef::Container(case_plan));

        let root = ShapeId::new();
        shapes.insert(
            root,
            Shape::new(None, ShapeKind::CasePlan { container: case_plan }),
        );

        Self {
            registry,
            sids,
            containers,
            definitions: IndexMap::new(),
            sentries: IndexMap::new(),
            on_parts: IndexMap::new(),
            tables: IndexMap::new(),
            case_file: CaseFileModel::new(),
            shapes,
            connections: IndexMap::new(),
            root,
            case_plan,
        }
    }

    /// The root case plan shape.
    pub fn root(&self) -> ShapeId {
        self.root
    }

    /// The case plan model container.
    pub fn case_plan(&self) -> ContainerId {
        self.case_plan
    }

    pub fn registry(&self) -> &ReferenceRegistry {
        &self.registry
    }

    pub fn case_file(&self) -> &CaseFileModel {
        &self.case_file
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(&id)
    }

    pub fn definition(&self, id: DefinitionId) -> Option<&ItemDefinition> {
        self.definitions.get(&id)
    }

    pub fn sentry(&self, id: SentryId) -> Option<&Sentry> {
        self.sentries.get(&id)
    }

    pub fn on_part(&self, id: OnPartId) -> Option<&OnPart> {
        self.on_parts.get(&id)
    }

    pub fn table(&self, id: TableId) -> Option<&PlanningTable> {
        self.tables.get(&id)
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn tables_iter(&self) -> impl Iterator<Item = (TableId, &PlanningTable)> {
        self.tables.iter().map(|(id, t)| (*id, t))
    }

    pub fn on_parts_iter(&self) -> impl Iterator<Item = (OnPartId, &OnPart)> {
        self.on_parts.iter().map(|(id, o)| (*id, o))
    }

    pub fn shapes_iter(&self) -> impl Iterator<Item = (ShapeId, &Shape)> {
        self.shapes.iter().map(|(id, s)| (*id, s))
    }

    pub fn connections_iter(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections.iter().map(|(id, c)| (*id, c))
    }

    pub fn stats(&self) -> DocumentStats {
        DocumentStats {
            containers: self.containers.len(),
            definitions: self.definitions.len(),
            sentries: self.sentries.len(),
            on_parts: self.on_parts.len(),
            tables: self.tables.len(),
            case_file_items: self.case_file.len(),
            shapes: self.shapes.len(),
            connections: self.connections.len(),
        }
    }

    // Mutable lookups used by the mutation layer; failures carry enough
    // context to diagnose a broken cascade.

    pub(crate) fn container_mut(&mut self, id: ContainerId) -> Result<&mut Container, EngineError> {
        self.containers
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("container", format!("{id:?}")))
    }

    pub(crate) fn definition_mut(
        &mut self,
        id: DefinitionId,
    ) -> Result<&mut ItemDefinition, EngineError> {
        self.definitions
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("definition", format!("{id:?}")))
    }

    pub(crate) fn sentry_mut(&mut self, id: SentryId) -> Result<&mut Sentry, EngineError> {
        self.sentries
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("sentry", format!("{id:?}")))
    }

    pub(crate) fn on_part_mut(&mut self, id: OnPartId) -> Result<&mut OnPart, EngineError> {
        self.on_parts
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("on-part", format!("{id:?}")))
    }

    pub(crate) fn table_mut(&mut self, id: TableId) -> Result<&mut PlanningTable, EngineError> {
        self.tables
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("planning table", format!("{id:?}")))
    }

    pub(crate) fn shape_mut(&mut self, id: ShapeId) -> Result<&mut Shape, EngineError> {
        self.shapes
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("shape", format!("{id:?}")))
    }

    pub(crate) fn connection_mut(
        &mut self,
        id: ConnectionId,
    ) -> Result<&mut Connection, EngineError> {
        self.connections
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("connection", format!("{id:?}")))
    }

    pub(crate) fn shape_ref(&self, id: ShapeId) -> Result<&Shape, EngineError> {
        self.shapes
            .get(&id)
            .ok_or_else(|| EngineError::NotFound("shape", format!("{id:?}")))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
