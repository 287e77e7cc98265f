//! Collaborators shared by every project event processor

use super::handlers::{default_project_event_handlers, ProjectEventHandler};
use crate::event::DEFAULT_CHANNEL_CAPACITY;
use crate::model::{DefaultObjectService, ObjectService};
use crate::representation::{
    DefaultRepresentationEventProcessorFactory, RepresentationEventProcessorFactory,
};
use crate::storage::EditingContextManager;
use std::sync::Arc;
use std::time::Duration;

/// Tuning knobs for project workers and their streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorSettings {
    /// Per-subscriber buffer of broadcast streams
    pub channel_capacity: usize,
    /// Upper bound on how long `handle` waits for the worker
    pub handle_timeout: Option<Duration>,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            handle_timeout: None,
        }
    }
}

#[derive(Clone)]
pub struct ProjectServices {
    pub editing_context_manager: Arc<dyn EditingContextManager>,
    pub object_service: Arc<dyn ObjectService>,
    pub handlers: Arc<Vec<Arc<dyn ProjectEventHandler>>>,
    pub factory: Arc<dyn RepresentationEventProcessorFactory>,
    pub settings: ProcessorSettings,
}

impl ProjectServices {
    /// Built-in handlers, object service and processor factory over the
    /// given storage
    pub fn new(editing_context_manager: Arc<dyn EditingContextManager>) -> Self {
        let object_service: Arc<dyn ObjectService> = Arc::new(DefaultObjectService);
        Self {
            editing_context_manager,
            factory: Arc::new(DefaultRepresentationEventProcessorFactory::new(
                object_service.clone(),
            )),
            object_service,
            handlers: Arc::new(default_project_event_handlers()),
            settings: ProcessorSettings::default(),
        }
    }

    pub fn with_object_service(mut self, object_service: Arc<dyn ObjectService>) -> Self {
        self.object_service = object_service;
        self
    }

    pub fn with_handlers(mut self, handlers: Vec<Arc<dyn ProjectEventHandler>>) -> Self {
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn RepresentationEventProcessorFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_settings(mut self, settings: ProcessorSettings) -> Self {
        self.settings = settings;
        self
    }
}
