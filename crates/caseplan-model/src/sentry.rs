//! Sentries and on-parts — the entry/exit gates of the model.

use crate::ids::{CaseFileItemId, ContainerId, OnPartId, SentryId, ShapeId};
use crate::kinds::StandardEvent;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// An entry/exit gate: an ordered collection of on-part references.
///
/// Zero or more criterion shapes reference the same sentry; that sharing is
/// intentional (multiple criteria triggered by one gate) and tracked by the
/// engine's reference registry. The owner is always the nearest common
/// structural container of all referencing criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentry {
    pub sid: String,
    pub owner: ContainerId,
    pub on_parts: SmallVec<[OnPartId; 2]>,
}

impl Sentry {
    pub fn new(sid: String, owner: ContainerId) -> Self {
        Self {
            sid,
            owner,
            on_parts: SmallVec::new(),
        }
    }
}

/// The source end of an on-part reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnPartSource {
    /// A plan item or discretionary item shape.
    PlanItem(ShapeId),
    /// An exit criterion shape (triggers on the host's exit).
    Criterion(ShapeId),
    /// A case-file item.
    CaseFileItem(CaseFileItemId),
}

/// Kind family of an on-part; crossing families on reconnect replaces the
/// connection's semantic type instead of reusing the on-part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnPartFamily {
    PlanItem,
    CaseFileItem,
}

impl OnPartSource {
    pub fn family(self) -> OnPartFamily {
        match self {
            OnPartSource::PlanItem(_) | OnPartSource::Criterion(_) => OnPartFamily::PlanItem,
            OnPartSource::CaseFileItem(_) => OnPartFamily::CaseFileItem,
        }
    }
}

/// A single source→sentry triggering reference.
///
/// Owned by exactly one sentry. Duplicated (never mutated in place) when a
/// reconnect would otherwise change a reference relied upon by another
/// still-valid connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnPart {
    pub sid: String,
    pub sentry: SentryId,
    pub source: OnPartSource,
    pub event: StandardEvent,
}

impl OnPart {
    pub fn new(sid: String, sentry: SentryId, source: OnPartSource, event: StandardEvent) -> Self {
        Self {
            sid,
            sentry,
            source,
            event,
        }
    }

    /// Clone under a fresh stable id, keeping source and event.
    pub fn split_copy(&self, sid: String) -> (OnPartId, Self) {
        let copy = Self { sid, ..self.clone() };
        (OnPartId::new(), copy)
    }
}
