//! Per-project event processing
//!
//! `ProjectEventProcessorRegistry` hands out one `ProjectEventProcessor` per
//! project. Each processor serializes that project's inputs on its own
//! worker and routes them to project handlers or to the live
//! representation processors.

pub mod handlers;
mod processor;
mod registry;
mod services;

pub use handlers::{default_project_event_handlers, ProjectEventHandler};
pub use processor::{PendingPayload, ProjectEventProcessor};
pub use registry::ProjectEventProcessorRegistry;
pub use services::{ProcessorSettings, ProjectServices};
