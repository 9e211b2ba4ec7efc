//! Transactions and the undo/redo stack.
//!
//! Every user edit, together with every reaction it triggers, lands in one
//! `Transaction`. The forward list replays the edit for redo; the inverse
//! list, applied in reverse order, undoes it exactly. Ids live inside the
//! mutation payloads, so redo recreates elements under their original
//! identities instead of allocating fresh ones.

use crate::document::Document;
use crate::error::EngineError;
use crate::mutation::Mutation;

/// One atomic, replayable unit of work.
#[derive(Debug)]
pub struct Transaction {
    pub(crate) label: &'static str,
    pub(crate) forward: Vec<Mutation>,
    pub(crate) inverse: Vec<Mutation>,
}

impl Transaction {
    /// The command name this transaction was recorded under.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Number of recorded mutations.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Linear history of committed transactions.
#[derive(Debug, Default)]
pub struct CommandStack {
    done: Vec<Transaction>,
    undone: Vec<Transaction>,
}

impl CommandStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.done.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.undone.len()
    }

    /// Commit a transaction. Any redo history is discarded.
    pub(crate) fn push(&mut self, tx: Transaction) {
        if tx.is_empty() {
            return;
        }
        tracing::debug!(label = tx.label, mutations = tx.len(), "commit");
        self.done.push(tx);
        self.undone.clear();
    }

    /// Undo the most recent transaction. `Ok(false)` when there is nothing
    /// to undo.
    pub(crate) fn undo(&mut self, doc: &mut Document) -> Result<bool, EngineError> {
        let Some(tx) = self.done.pop() else {
            return Ok(false);
        };
        tracing::debug!(label = tx.label, "undo");
        for mutation in tx.inverse.iter().rev() {
            mutation.apply(doc)?;
        }
        self.undone.push(tx);
        Ok(true)
    }

    /// Redo the most recently undone transaction by replaying its forward
    /// mutations. `Ok(false)` when there is nothing to redo.
    pub(crate) fn redo(&mut self, doc: &mut Document) -> Result<bool, EngineError> {
        let Some(tx) = self.undone.pop() else {
            return Ok(false);
        };
        tracing::debug!(label = tx.label, "redo");
        for mutation in &tx.forward {
            mutation.apply(doc)?;
        }
        self.done.push(tx);
        Ok(true)
    }
}

/// Records mutations as they are applied, building the transaction's
/// forward and inverse lists in lockstep.
pub(crate) struct TxBuilder<'a> {
    doc: &'a mut Document,
    forward: Vec<Mutation>,
    inverse: Vec<Mutation>,
}

impl<'a> TxBuilder<'a> {
    pub(crate) fn new(doc: &'a mut Document) -> Self {
        Self {
            doc,
            forward: Vec::new(),
            inverse: Vec::new(),
        }
    }

    pub(crate) fn doc(&self) -> &Document {
        self.doc
    }

    pub(crate) fn alloc_sid(&mut self, prefix: &str) -> String {
        self.doc.sids.next(prefix)
    }

    /// Apply one mutation and record it. Idempotent no-ops are applied but
    /// not recorded, keeping forward and inverse lists one-to-one.
    pub(crate) fn apply(&mut self, mutation: Mutation) -> Result<(), EngineError> {
        match mutation.apply(self.doc)? {
            Some(inverse) => {
                self.forward.push(mutation);
                self.inverse.push(inverse);
            }
            None => {
                tracing::trace!(?mutation, "no-op, not recorded");
            }
        }
        Ok(())
    }

    /// Unwind everything applied so far. Used when an edit fails partway;
    /// the document returns to its pre-edit state.
    pub(crate) fn rollback(mut self) {
        for mutation in self.inverse.iter().rev() {
            if let Err(error) = mutation.apply(self.doc) {
                tracing::warn!(%error, "rollback step failed");
            }
        }
        self.forward.clear();
        self.inverse.clear();
    }

    pub(crate) fn finish(self, label: &'static str) -> Transaction {
        Transaction {
            label,
            forward: self.forward,
            inverse: self.inverse,
        }
    }
}
