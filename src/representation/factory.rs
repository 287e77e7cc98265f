//! Builds representation event processors from stored descriptors

use super::diagram::{self, DiagramRenderer, ToolPalette};
use super::form::{self, FormRenderer};
use super::processor::{
    RepresentationEventHandler, RepresentationEventProcessor, RepresentationProcessor,
    RepresentationRenderer,
};
use super::types::{Representation, RepresentationConfiguration};
use crate::event::DEFAULT_CHANNEL_CAPACITY;
use crate::model::{EditingContext, ObjectService, RepresentationKind};
use std::sync::Arc;
use tracing::debug;

/// Constructs the processor for one representation and performs its first
/// render. `None` when the representation does not exist, is of another
/// kind, or cannot be rendered.
pub trait RepresentationEventProcessorFactory: Send + Sync {
    fn create(
        &self,
        kind: RepresentationKind,
        configuration: &RepresentationConfiguration,
        editing_context: &EditingContext,
    ) -> Option<Arc<dyn RepresentationEventProcessor>>;
}

/// Diagram and form processors with the built-in handler chains
pub struct DefaultRepresentationEventProcessorFactory {
    object_service: Arc<dyn ObjectService>,
    palette: Arc<ToolPalette>,
    capacity: usize,
}

impl DefaultRepresentationEventProcessorFactory {
    pub fn new(object_service: Arc<dyn ObjectService>) -> Self {
        Self {
            object_service,
            palette: Arc::new(ToolPalette::standard()),
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_palette(mut self, palette: ToolPalette) -> Self {
        self.palette = Arc::new(palette);
        self
    }

    /// Per-subscriber buffer of the processors' streams
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    fn parts(
        &self,
        kind: RepresentationKind,
    ) -> (
        Vec<Arc<dyn RepresentationEventHandler>>,
        Arc<dyn RepresentationRenderer>,
    ) {
        let object_service = self.object_service.clone();
        match kind {
            RepresentationKind::Diagram => {
                let renderer: Arc<dyn RepresentationRenderer> =
                    Arc::new(DiagramRenderer::new(object_service));
                (diagram::handlers(self.palette.clone()), renderer)
            }
            RepresentationKind::Form => {
                let renderer: Arc<dyn RepresentationRenderer> =
                    Arc::new(FormRenderer::new(object_service));
                (form::handlers(), renderer)
            }
        }
    }
}

impl RepresentationEventProcessorFactory for DefaultRepresentationEventProcessorFactory {
    fn create(
        &self,
        kind: RepresentationKind,
        configuration: &RepresentationConfiguration,
        editing_context: &EditingContext,
    ) -> Option<Arc<dyn RepresentationEventProcessor>> {
        let metadata = editing_context.get_representation(&configuration.id)?;
        if metadata.kind != kind {
            debug!(
                representation_id = %configuration.id,
                expected = %kind,
                actual = %metadata.kind,
                "representation kind mismatch"
            );
            return None;
        }

        let (handlers, renderer) = self.parts(kind);
        let representation =
            renderer.render(editing_context, &Representation::from_metadata(metadata))?;
        Some(Arc::new(RepresentationProcessor::new(
            representation,
            handlers,
            renderer,
            self.capacity,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DefaultObjectService, ObjectId, ProjectId, RepresentationId, RepresentationMetadata,
        SemanticObject,
    };

    fn factory() -> DefaultRepresentationEventProcessorFactory {
        DefaultRepresentationEventProcessorFactory::new(Arc::new(DefaultObjectService))
    }

    #[test]
    fn creates_rendered_processor_of_requested_kind() {
        let mut ctx = EditingContext::new(ProjectId::new(), "p");
        ctx.add_object(SemanticObject::new("package", "pkg").with_id("pkg"))
            .unwrap();
        let id = ctx
            .add_representation(
                RepresentationMetadata::new(RepresentationKind::Diagram, "D", "diagram")
                    .with_target(ObjectId::from("pkg")),
            )
            .unwrap();

        let processor = factory()
            .create(
                RepresentationKind::Diagram,
                &RepresentationConfiguration::new(id),
                &ctx,
            )
            .unwrap();
        assert_eq!(processor.id(), id);
        assert_eq!(processor.kind(), RepresentationKind::Diagram);
        assert_eq!(processor.representation().version, 1);
    }

    #[test]
    fn missing_or_mismatched_representation_yields_none() {
        let mut ctx = EditingContext::new(ProjectId::new(), "p");
        let id = ctx
            .add_representation(RepresentationMetadata::new(RepresentationKind::Form, "F", "form"))
            .unwrap();

        let factory = factory();
        assert!(factory
            .create(
                RepresentationKind::Diagram,
                &RepresentationConfiguration::new(id),
                &ctx
            )
            .is_none());
        assert!(factory
            .create(
                RepresentationKind::Form,
                &RepresentationConfiguration::new(RepresentationId::new()),
                &ctx
            )
            .is_none());
    }
}
