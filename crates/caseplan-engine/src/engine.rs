//! The engine facade: one document, one command stack, one entry point.

use crate::dispatch::{self, EditCommand, EditReceipt};
use crate::document::Document;
use crate::error::EngineError;
use crate::stack::{CommandStack, TxBuilder};

/// Executes edit commands against a document, keeping it semantically
/// consistent and every change undoable.
#[derive(Debug, Default)]
pub struct Engine {
    doc: Document,
    stack: CommandStack,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Committed transactions available to undo.
    pub fn undo_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Undone transactions available to redo.
    pub fn redo_depth(&self) -> usize {
        self.stack.redo_depth()
    }

    /// Run one edit command as a single transaction. On failure the
    /// document is rolled back to its pre-command state before the error
    /// is returned.
    pub fn execute(&mut self, cmd: &EditCommand) -> Result<EditReceipt, EngineError> {
        let mut tx = TxBuilder::new(&mut self.doc);
        match dispatch::run(&mut tx, cmd) {
            Ok(receipt) => {
                self.stack.push(tx.finish(cmd.name()));
                Ok(receipt)
            }
            Err(error) => {
                tracing::warn!(%error, command = cmd.name(), "edit aborted");
                tx.rollback();
                Err(error)
            }
        }
    }

    /// Undo the most recent command. `Ok(false)` when the stack is empty.
    pub fn undo(&mut self) -> Result<bool, EngineError> {
        self.stack.undo(&mut self.doc)
    }

    /// Redo the most recently undone command. `Ok(false)` when there is
    /// nothing to redo.
    pub fn redo(&mut self) -> Result<bool, EngineError> {
        self.stack.redo(&mut self.doc)
    }
}
