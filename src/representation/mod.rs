//! Representations and the processors that keep them current
//!
//! A representation is a diagram or form derived from the semantic model.
//! Each open representation has exactly one processor, which owns the
//! rendered value, applies representation-scoped inputs through its handler
//! chain, and tracks who is subscribed.

pub mod diagram;
mod factory;
pub mod form;
mod processor;
mod rename;
mod subscription;
mod types;

pub use diagram::{DiagramRenderer, EdgeTool, NodeTool, ToolPalette};
pub use factory::{DefaultRepresentationEventProcessorFactory, RepresentationEventProcessorFactory};
pub use form::FormRenderer;
pub use processor::{
    RepresentationEventHandler, RepresentationEventProcessor, RepresentationProcessor,
    RepresentationRenderer,
};
pub use rename::RenameRepresentationHandler;
pub use subscription::{Subscriber, SubscriptionDescription, SubscriptionManager};
pub use types::{
    Diagram, DiagramEdge, DiagramNode, Form, Representation, RepresentationConfiguration,
    RepresentationContent, Widget,
};
