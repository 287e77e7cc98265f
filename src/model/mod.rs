//! Semantic model owned by a project's editing context

mod context;
mod ids;
mod object;
mod object_service;

pub use context::{
    Bounds, ContextMetadata, EditingContext, ModelError, RepresentationKind,
    RepresentationMetadata,
};
pub use ids::{InputId, ObjectId, ProjectId, RepresentationId};
pub use object::{ObjectMetadata, Properties, PropertyValue, Reference, SemanticObject};
pub use object_service::{DefaultObjectService, ObjectService};
