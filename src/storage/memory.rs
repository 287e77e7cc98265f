//! In-memory editing context storage

use super::traits::{EditingContextManager, ProjectSummary, StorageResult, UNTITLED_PROJECT};
use crate::model::{EditingContext, ProjectId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Keeps persisted editing contexts in a map. Used by tests and embedders
/// that bring their own durability.
#[derive(Debug, Default)]
pub struct InMemoryEditingContextManager {
    contexts: DashMap<ProjectId, EditingContext>,
    persist_count: AtomicUsize,
}

impl InMemoryEditingContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored project
    pub fn with_project(self, editing_context: EditingContext) -> Self {
        self.contexts
            .insert(editing_context.project_id, editing_context);
        self
    }

    /// The last persisted state of a project
    pub fn persisted(&self, project_id: &ProjectId) -> Option<EditingContext> {
        self.contexts.get(project_id).map(|entry| entry.value().clone())
    }

    /// How many times `persist` has been called
    pub fn persist_count(&self) -> usize {
        self.persist_count.load(Ordering::SeqCst)
    }

    pub fn list_projects(&self) -> Vec<ProjectSummary> {
        let mut projects: Vec<ProjectSummary> = self
            .contexts
            .iter()
            .map(|entry| ProjectSummary::of(entry.value()))
            .collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        projects
    }
}

#[async_trait]
impl EditingContextManager for InMemoryEditingContextManager {
    async fn create_editing_context(&self, project_id: ProjectId) -> StorageResult<EditingContext> {
        Ok(self
            .persisted(&project_id)
            .unwrap_or_else(|| EditingContext::new(project_id, UNTITLED_PROJECT)))
    }

    async fn persist(&self, project_id: ProjectId, editing_context: &EditingContext) -> StorageResult<()> {
        self.contexts.insert(project_id, editing_context.clone());
        self.persist_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
