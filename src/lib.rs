//! Tandem: per-project collaborative event processing
//!
//! Many users edit the same project at once. Tandem gives every project a
//! single worker that applies their inputs one at a time, keeps the
//! project's open diagrams and forms current, and pushes the results to
//! everyone subscribed.
//!
//! # Core Concepts
//!
//! - **Editing context**: the semantic model of one project, owned by its worker
//! - **Inputs**: project-scoped or representation-scoped user intents
//! - **Representations**: diagrams and forms derived from the model, each
//!   behind a processor that tracks its subscribers
//! - **Registry**: one project event processor per project, created on demand
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tandem::{
//!     Identity, InMemoryEditingContextManager, ProjectAction, ProjectEventProcessorRegistry,
//!     ProjectId, ProjectInput, ProjectServices,
//! };
//!
//! # async fn demo() {
//! let registry = ProjectEventProcessorRegistry::new(ProjectServices::new(Arc::new(
//!     InMemoryEditingContextManager::new(),
//! )));
//! let input = ProjectInput::new(
//!     ProjectId::new(),
//!     ProjectAction::RenameProject { new_name: "Library".into() },
//! );
//! let payload = registry.dispatch(Identity::user("alice"), input).await;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod project;
pub mod representation;
pub mod script;
pub mod storage;

pub use config::{ConfigError, TandemConfig};
pub use error::{TandemError, TandemResult};
pub use event::{
    ChangeDescription, ChangeKind, EventHandlerResponse, Identity, Input, Payload,
    PayloadBroadcaster, PayloadStream, ProjectAction, ProjectInput, RepresentationAction,
    RepresentationInput,
};
pub use model::{
    Bounds, EditingContext, InputId, ObjectId, ProjectId, PropertyValue, RepresentationId,
    RepresentationKind, RepresentationMetadata, SemanticObject,
};
pub use project::{
    PendingPayload, ProcessorSettings, ProjectEventHandler, ProjectEventProcessor,
    ProjectEventProcessorRegistry, ProjectServices,
};
pub use representation::{
    Representation, RepresentationConfiguration, RepresentationEventProcessor,
    RepresentationEventProcessorFactory, SubscriptionDescription, ToolPalette,
};
pub use script::{Script, ScriptError, ScriptReport, ScriptRunner};
pub use storage::{
    EditingContextManager, InMemoryEditingContextManager, SqliteEditingContextManager,
    StorageError, StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
