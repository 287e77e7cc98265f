//! Storage trait definitions

use crate::model::{EditingContext, ProjectId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One stored project, as listed by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    pub object_count: usize,
    pub representation_count: usize,
}

impl ProjectSummary {
    pub fn of(editing_context: &EditingContext) -> Self {
        Self {
            id: editing_context.project_id,
            name: editing_context.project_name.clone(),
            object_count: editing_context.objects.len(),
            representation_count: editing_context.representations.len(),
        }
    }
}

/// Name given to projects that exist only because something addressed them
pub const UNTITLED_PROJECT: &str = "Untitled";

/// Loads and saves editing contexts for project event processors.
///
/// Implementations must be thread-safe (Send + Sync): one manager is shared
/// by every project worker.
#[async_trait]
pub trait EditingContextManager: Send + Sync {
    /// Load a project's editing context, starting an empty one when the
    /// project has never been stored
    async fn create_editing_context(&self, project_id: ProjectId) -> StorageResult<EditingContext>;

    /// Store the full state of an editing context
    async fn persist(&self, project_id: ProjectId, editing_context: &EditingContext) -> StorageResult<()>;
}
