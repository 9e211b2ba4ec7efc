//! Semantic consistency engine for hierarchical case models.
//!
//! Hosts apply structural edits (create, move, delete, reconnect, replace,
//! property updates) through [`Engine::execute`]; the engine runs the edit
//! plus every reaction it implies — container membership derivation,
//! copy-on-write splitting of shared definitions and sentries, sentry and
//! planning-table lifecycle — as one atomic, undoable transaction.
//!
//! ```
//! use caseplan_engine::CaseBuilder;
//!
//! let mut builder = CaseBuilder::new();
//! let root = builder.root();
//! let stage = builder.stage(root);
//! let task = builder.task(stage);
//! let entry = builder.entry_criterion(task);
//! let milestone = builder.milestone(root);
//! builder.connect(milestone, entry);
//!
//! let mut engine = builder.into_engine();
//! assert_eq!(engine.document().stats().sentries, 1);
//! engine.undo().unwrap();
//! assert_eq!(engine.document().stats().sentries, 0);
//! ```

mod dispatch;
mod document;
mod engine;
mod error;
pub mod harness;
mod membership;
mod mutation;
mod planning;
mod query;
mod registry;
mod sentries;
mod sharing;
mod stack;

pub use dispatch::{EditCommand, EditReceipt, NewShape, PropertyChange};
pub use document::{Document, DocumentStats};
pub use engine::Engine;
pub use error::{EngineError, RegistryError};
pub use harness::CaseBuilder;
pub use registry::{ElementRef, ReferenceRegistry};
pub use stack::{CommandStack, Transaction};
