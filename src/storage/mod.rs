//! Storage backends for Tandem
//!
//! Project event processors load and persist editing contexts through the
//! `EditingContextManager` trait. `SqliteEditingContextManager` is the
//! durable implementation; `InMemoryEditingContextManager` serves tests and
//! embedders that persist elsewhere.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryEditingContextManager;
pub use sqlite::SqliteEditingContextManager;
pub use traits::{
    EditingContextManager, ProjectSummary, StorageError, StorageResult, UNTITLED_PROJECT,
};
