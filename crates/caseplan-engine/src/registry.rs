//! Reference registry: one per open document.
//!
//! Maps the notation's stable string ids to typed element handles, and keeps
//! the reverse index ("who points at this element") that sharing detection
//! is built on. Sharing is never detected by scanning stores.
//!
//! Renames migrate the forward index atomically; the reverse index is keyed
//! by typed handles, so it stays valid across renames by construction.

use crate::error::RegistryError;
use caseplan_model::{
    CaseFileItemId, ConnectionId, ContainerId, DefinitionId, OnPartId, SentryId, ShapeId, TableId,
};
use indexmap::{IndexMap, IndexSet};

/// Typed handle to any element either side of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementRef {
    Container(ContainerId),
    Definition(DefinitionId),
    Sentry(SentryId),
    OnPart(OnPartId),
    Table(TableId),
    CaseFileItem(CaseFileItemId),
    Shape(ShapeId),
    Connection(ConnectionId),
}

/// Process-local index mapping stable ids to elements and back.
#[derive(Debug, Default)]
pub struct ReferenceRegistry {
    forward: IndexMap<String, ElementRef>,
    reverse: IndexMap<ElementRef, IndexSet<ElementRef>>,
}

impl ReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Bind a stable id to an element.
    pub fn register(&mut self, sid: &str, element: ElementRef) -> Result<(), RegistryError> {
        if self.forward.contains_key(sid) {
            return Err(RegistryError::DuplicateId(sid.to_string()));
        }
        self.forward.insert(sid.to_string(), element);
        Ok(())
    }

    /// Drop a binding. Reverse references keyed by the element survive;
    /// transient dangling references occur during multi-step cascades and
    /// are tolerated by design.
    pub fn unregister(&mut self, sid: &str) -> Option<ElementRef> {
        self.forward.shift_remove(sid)
    }

    /// Resolve a stable id. Unknown ids are `None`, never an error.
    pub fn resolve(&self, sid: &str) -> Option<ElementRef> {
        self.forward.get(sid).copied()
    }

    /// Rebind an element under a new id, atomically.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), RegistryError> {
        if old == new {
            return Ok(());
        }
        if self.forward.contains_key(new) {
            return Err(RegistryError::DuplicateId(new.to_string()));
        }
        let element = self
            .forward
            .shift_remove(old)
            .ok_or_else(|| RegistryError::UnknownId(old.to_string()))?;
        self.forward.insert(new.to_string(), element);
        Ok(())
    }

    /// Record that `source` points at `target`. Idempotent.
    pub fn add_reference(&mut self, target: ElementRef, source: ElementRef) -> bool {
        self.reverse.entry(target).or_default().insert(source)
    }

    /// Forget that `source` points at `target`. Idempotent.
    pub fn remove_reference(&mut self, target: ElementRef, source: ElementRef) -> bool {
        match self.reverse.get_mut(&target) {
            Some(sources) => sources.shift_remove(&source),
            None => false,
        }
    }

    /// Everything currently pointing at `target`.
    pub fn references_of(&self, target: ElementRef) -> Vec<ElementRef> {
        self.reverse
            .get(&target)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn reference_count(&self, target: ElementRef) -> usize {
        self.reverse.get(&target).map_or(0, IndexSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def_ref() -> ElementRef {
        ElementRef::Definition(DefinitionId::new())
    }

    #[test]
    fn register_and_resolve() {
        let mut reg = ReferenceRegistry::new();
        let d = def_ref();
        reg.register("Task_1", d).unwrap();
        assert_eq!(reg.resolve("Task_1"), Some(d));
        assert_eq!(reg.resolve("Task_2"), None);
    }

    #[test]
    fn register_rejects_duplicate() {
        let mut reg = ReferenceRegistry::new();
        reg.register("Task_1", def_ref()).unwrap();
        let result = reg.register("Task_1", def_ref());
        assert_eq!(result, Err(RegistryError::DuplicateId("Task_1".into())));
    }

    #[test]
    fn rename_migrates_forward_index() {
        let mut reg = ReferenceRegistry::new();
        let d = def_ref();
        reg.register("Task_1", d).unwrap();
        reg.rename("Task_1", "Approve_Order").unwrap();
        assert_eq!(reg.resolve("Task_1"), None);
        assert_eq!(reg.resolve("Approve_Order"), Some(d));
    }

    #[test]
    fn rename_rejects_collision() {
        let mut reg = ReferenceRegistry::new();
        reg.register("Task_1", def_ref()).unwrap();
        reg.register("Task_2", def_ref()).unwrap();
        assert_eq!(
            reg.rename("Task_1", "Task_2"),
            Err(RegistryError::DuplicateId("Task_2".into()))
        );
    }

    #[test]
    fn reverse_index_tracks_references() {
        let mut reg = ReferenceRegistry::new();
        let d = def_ref();
        let a = ElementRef::Shape(ShapeId::new());
        let b = ElementRef::Shape(ShapeId::new());

        assert!(reg.add_reference(d, a));
        assert!(!reg.add_reference(d, a));
        reg.add_reference(d, b);
        assert_eq!(reg.reference_count(d), 2);

        assert!(reg.remove_reference(d, a));
        assert!(!reg.remove_reference(d, a));
        assert_eq!(reg.references_of(d), vec![b]);
    }

    #[test]
    fn references_survive_rename() {
        let mut reg = ReferenceRegistry::new();
        let d = def_ref();
        let s = ElementRef::Shape(ShapeId::new());
        reg.register("Task_1", d).unwrap();
        reg.add_reference(d, s);
        reg.rename("Task_1", "Task_9").unwrap();
        assert_eq!(reg.references_of(d), vec![s]);
    }
}
