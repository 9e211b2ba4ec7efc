//! Read-only queries hosts use to drive their UI (badges, split warnings)
//! without mutating anything.

use crate::dispatch::PropertyChange;
use crate::engine::Engine;
use crate::membership::enclosing_container;
use crate::registry::ElementRef;
use crate::sentries::{connections_referencing, criteria_referencing};
use crate::sharing::item_shapes_referencing;
use caseplan_model::{ContainerId, ItemKind, ShapeId};

impl Engine {
    /// The structural container an element currently belongs to.
    pub fn owning_container(&self, element: ElementRef) -> Option<ContainerId> {
        let doc = self.document();
        match element {
            ElementRef::Container(c) => Some(c),
            ElementRef::Definition(d) => doc.definition(d).map(|x| x.owner),
            ElementRef::Sentry(s) => doc.sentry(s).map(|x| x.owner),
            ElementRef::OnPart(op) => {
                let sentry = doc.on_part(op)?.sentry;
                doc.sentry(sentry).map(|x| x.owner)
            }
            ElementRef::Shape(s) => enclosing_container(doc, s).ok(),
            ElementRef::Table(_) | ElementRef::CaseFileItem(_) | ElementRef::Connection(_) => None,
        }
    }

    /// Whether more than one element relies on `element` right now.
    pub fn is_shared(&self, element: ElementRef) -> bool {
        let doc = self.document();
        match element {
            ElementRef::Definition(d) => item_shapes_referencing(doc, d).len() > 1,
            ElementRef::Sentry(s) => criteria_referencing(doc, s).len() > 1,
            ElementRef::OnPart(op) => connections_referencing(doc, op).len() > 1,
            _ => false,
        }
    }

    /// Whether applying `change` to `shape` would split a shared definition.
    pub fn would_require_split(&self, shape: ShapeId, change: &PropertyChange) -> bool {
        let doc = self.document();
        let Some(node) = doc.shape(shape) else {
            return false;
        };
        let Some(definition) = node.definition() else {
            return false;
        };
        if item_shapes_referencing(doc, definition).len() <= 1 {
            return false;
        }
        let Some(def) = doc.definition(definition) else {
            return false;
        };
        match change {
            PropertyChange::Rules(rules) => def.rules != *rules,
            PropertyChange::Blocking(blocking) => {
                def.kind == ItemKind::HumanTask && def.blocking != *blocking
            }
            PropertyChange::AutoComplete(auto_complete) => {
                def.kind == ItemKind::Stage && def.auto_complete != *auto_complete
            }
            // Renames apply to the shared element itself.
            PropertyChange::Rename(_) => false,
        }
    }
}
