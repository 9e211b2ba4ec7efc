//! Closed item-kind and standard-event vocabularies.
//!
//! Every dispatch on an element's kind goes through the total functions
//! here, so the compiler checks exhaustiveness whenever a kind is added.

use serde::{Deserialize, Serialize};

/// The kind of a plan item or discretionary item definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Task,
    HumanTask,
    CaseTask,
    ProcessTask,
    Stage,
    Milestone,
    TimerEventListener,
    UserEventListener,
}

/// Standard event an on-part listens for, inferred from its source's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardEvent {
    Occur,
    Complete,
    Exit,
    Update,
}

impl ItemKind {
    /// The standard event an on-part sourced from an item of this kind
    /// listens for.
    pub fn standard_event(self) -> StandardEvent {
        use ItemKind::*;
        match self {
            Task | HumanTask | CaseTask | ProcessTask | Stage => StandardEvent::Complete,
            Milestone | TimerEventListener | UserEventListener => StandardEvent::Occur,
        }
    }

    /// Whether an item of this kind is itself a structural container.
    pub fn is_container(self) -> bool {
        matches!(self, ItemKind::Stage)
    }

    /// Whether an item of this kind may own a planning table.
    ///
    /// Stages always may; human tasks only while non-blocking.
    pub fn may_own_planning_table(self, blocking: bool) -> bool {
        use ItemKind::*;
        match self {
            Stage => true,
            HumanTask => !blocking,
            Task | CaseTask | ProcessTask | Milestone | TimerEventListener | UserEventListener => {
                false
            }
        }
    }

    /// Whether criteria may attach to an item of this kind.
    ///
    /// Event listeners have no lifecycle gates of their own.
    pub fn accepts_criteria(self) -> bool {
        use ItemKind::*;
        match self {
            Task | HumanTask | CaseTask | ProcessTask | Stage | Milestone => true,
            TimerEventListener | UserEventListener => false,
        }
    }

    /// Prefix used when allocating stable ids for definitions of this kind.
    pub fn sid_prefix(self) -> &'static str {
        use ItemKind::*;
        match self {
            Task => "Task",
            HumanTask => "HumanTask",
            CaseTask => "CaseTask",
            ProcessTask => "ProcessTask",
            Stage => "Stage",
            Milestone => "Milestone",
            TimerEventListener => "TimerEventListener",
            UserEventListener => "UserEventListener",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_items_complete() {
        for kind in [
            ItemKind::Task,
            ItemKind::HumanTask,
            ItemKind::CaseTask,
            ItemKind::ProcessTask,
            ItemKind::Stage,
        ] {
            assert_eq!(kind.standard_event(), StandardEvent::Complete);
        }
    }

    #[test]
    fn occurrences_occur() {
        for kind in [
            ItemKind::Milestone,
            ItemKind::TimerEventListener,
            ItemKind::UserEventListener,
        ] {
            assert_eq!(kind.standard_event(), StandardEvent::Occur);
        }
    }

    #[test]
    fn planning_table_eligibility() {
        assert!(ItemKind::Stage.may_own_planning_table(true));
        assert!(ItemKind::Stage.may_own_planning_table(false));
        assert!(ItemKind::HumanTask.may_own_planning_table(false));
        assert!(!ItemKind::HumanTask.may_own_planning_table(true));
        assert!(!ItemKind::Task.may_own_planning_table(false));
    }

    #[test]
    fn event_listeners_reject_criteria() {
        assert!(!ItemKind::TimerEventListener.accepts_criteria());
        assert!(!ItemKind::UserEventListener.accepts_criteria());
        assert!(ItemKind::Milestone.accepts_criteria());
    }
}
