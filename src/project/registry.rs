//! Process-wide directory of project event processors

use super::processor::ProjectEventProcessor;
use super::services::ProjectServices;
use crate::error::{TandemError, TandemResult};
use crate::event::{Identity, Input, Payload};
use crate::model::ProjectId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

type ProcessorCell = Arc<OnceCell<Arc<ProjectEventProcessor>>>;

/// Maps project id to its event processor, creating processors lazily.
///
/// Each project gets its own initialization cell, so two racing callers for
/// the same project end up with the same processor while loads of different
/// projects never wait on each other.
pub struct ProjectEventProcessorRegistry {
    processors: DashMap<ProjectId, ProcessorCell>,
    services: ProjectServices,
}

impl ProjectEventProcessorRegistry {
    pub fn new(services: ProjectServices) -> Self {
        Self {
            processors: DashMap::new(),
            services,
        }
    }

    pub fn services(&self) -> &ProjectServices {
        &self.services
    }

    /// The live processor for a project, if any
    pub fn get(&self, project_id: &ProjectId) -> Option<Arc<ProjectEventProcessor>> {
        self.processors
            .get(project_id)
            .and_then(|cell| cell.value().get().cloned())
            .filter(|processor| !processor.is_disposed())
    }

    /// Return the project's processor, loading its editing context and
    /// starting a worker the first time.
    pub async fn get_or_create(&self, project_id: ProjectId) -> TandemResult<Arc<ProjectEventProcessor>> {
        loop {
            let cell = self.processors.entry(project_id).or_default().value().clone();
            let processor = cell
                .get_or_try_init(|| async {
                    let processor = ProjectEventProcessor::new(project_id, &self.services).await?;
                    info!(%project_id, "project event processor started");
                    Ok::<_, TandemError>(Arc::new(processor))
                })
                .await?
                .clone();
            if !processor.is_disposed() {
                return Ok(processor);
            }
            // disposed outside the registry: start over with a fresh cell
            self.processors
                .remove_if(&project_id, |_, current| Arc::ptr_eq(current, &cell));
        }
    }

    /// Resolve the input's project and process the input there
    pub async fn dispatch(&self, identity: Identity, input: impl Into<Input>) -> Option<Payload> {
        let mut request = (identity, input.into());
        let project_id = request.1.project_id();
        loop {
            let processor = match self.get_or_create(project_id).await {
                Ok(processor) => processor,
                Err(e) => {
                    error!(%project_id, error = %e, "could not open project");
                    return None;
                }
            };
            match processor.try_submit(request.0, request.1) {
                Ok(pending) => return pending.wait().await,
                Err(refused) => {
                    debug!(%project_id, "processor closed before the input was enqueued, reopening");
                    request = refused;
                }
            }
        }
    }

    /// Remove and dispose a project's processor. False when none was live.
    ///
    /// A processor still loading is left alone.
    pub fn dispose(&self, project_id: &ProjectId) -> bool {
        let Some((_, cell)) = self
            .processors
            .remove_if(project_id, |_, cell| cell.initialized())
        else {
            return false;
        };
        match cell.get() {
            Some(processor) => {
                processor.dispose();
                info!(%project_id, "project event processor disposed");
                true
            }
            None => false,
        }
    }

    fn live(&self) -> Vec<(ProjectId, Arc<ProjectEventProcessor>)> {
        self.processors
            .iter()
            .filter_map(|entry| entry.value().get().map(|p| (*entry.key(), p.clone())))
            .collect()
    }

    /// Ids of every started processor
    pub fn project_ids(&self) -> Vec<ProjectId> {
        self.live().into_iter().map(|(project_id, _)| project_id).collect()
    }

    pub fn len(&self) -> usize {
        self.processors
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose processors nobody is using: no queued command, no live
    /// representation and no project stream subscriber. Returns the
    /// disposed project ids.
    pub fn dispose_idle(&self) -> Vec<ProjectId> {
        let idle: Vec<ProjectId> = self
            .live()
            .into_iter()
            .filter(|(_, processor)| {
                processor.is_disposed()
                    || (processor.pending_commands() == 0
                        && processor.representation_event_processors().is_empty()
                        && !processor.has_output_subscribers())
            })
            .map(|(project_id, _)| project_id)
            .collect();

        idle.into_iter()
            .filter(|project_id| self.dispose(project_id))
            .collect()
    }

    pub fn dispose_all(&self) {
        for project_id in self.project_ids() {
            self.dispose(&project_id);
        }
    }

    /// Dispose everything and wait until every worker has drained its queue
    pub async fn shutdown_all(&self) {
        let live = self.live();
        for (project_id, _) in &live {
            self.dispose(project_id);
        }
        for (_, processor) in live {
            processor.shutdown().await;
        }
    }

    /// Warn every subscriber of every project, then dispose everything
    pub fn pre_destroy_all(&self) {
        for (project_id, processor) in self.live() {
            self.processors.remove(&project_id);
            processor.pre_destroy();
        }
    }
}
