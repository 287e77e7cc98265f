//! Common test utilities for Tandem integration tests
//!
//! Builds a small "library" project (a package with two classes, two
//! diagrams on the package and a form on one class) and wires registries
//! and processors over in-memory storage.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tandem::storage::{EditingContextManager, StorageResult};
use tandem::{
    EditingContext, Identity, InMemoryEditingContextManager, ObjectId, Payload, PayloadStream,
    ProjectAction, ProjectEventProcessor, ProjectEventProcessorRegistry, ProjectId, ProjectInput,
    ProjectServices, RepresentationAction, RepresentationConfiguration, RepresentationId,
    RepresentationInput, RepresentationKind, RepresentationMetadata, SemanticObject,
};

/// Ids of the representations in `library_context`
#[derive(Debug, Clone, Copy)]
pub struct LibraryIds {
    pub project: ProjectId,
    pub overview: RepresentationId,
    pub detail: RepresentationId,
    pub book_form: RepresentationId,
}

pub fn library_context() -> (EditingContext, LibraryIds) {
    let project = ProjectId::new();
    let mut ctx = EditingContext::new(project, "Library");
    ctx.add_object(SemanticObject::new("package", "library").with_id("pkg"))
        .unwrap();
    ctx.add_object(
        SemanticObject::new("class", "Book")
            .with_id("book")
            .with_parent(ObjectId::from("pkg")),
    )
    .unwrap();
    ctx.add_object(
        SemanticObject::new("class", "Author")
            .with_id("author")
            .with_parent(ObjectId::from("pkg"))
            .with_reference(ObjectId::from("book"), "writes"),
    )
    .unwrap();

    let overview = ctx
        .add_representation(
            RepresentationMetadata::new(RepresentationKind::Diagram, "Overview", "diagram")
                .with_target(ObjectId::from("pkg")),
        )
        .unwrap();
    let detail = ctx
        .add_representation(
            RepresentationMetadata::new(RepresentationKind::Diagram, "Detail", "diagram")
                .with_target(ObjectId::from("pkg")),
        )
        .unwrap();
    let book_form = ctx
        .add_representation(
            RepresentationMetadata::new(RepresentationKind::Form, "Book", "form")
                .with_target(ObjectId::from("book")),
        )
        .unwrap();

    (
        ctx,
        LibraryIds {
            project,
            overview,
            detail,
            book_form,
        },
    )
}

pub struct Fixture {
    pub manager: Arc<InMemoryEditingContextManager>,
    pub registry: ProjectEventProcessorRegistry,
    pub ids: LibraryIds,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_services(|services| services)
    }

    /// Fixture whose services are adjusted before the registry is built
    pub fn with_services(adjust: impl FnOnce(ProjectServices) -> ProjectServices) -> Self {
        let (ctx, ids) = library_context();
        let manager = Arc::new(InMemoryEditingContextManager::new().with_project(ctx));
        let registry =
            ProjectEventProcessorRegistry::new(adjust(ProjectServices::new(manager.clone())));
        Self {
            manager,
            registry,
            ids,
        }
    }

    pub async fn processor(&self) -> Arc<ProjectEventProcessor> {
        self.registry.get_or_create(self.ids.project).await.unwrap()
    }

    pub fn project_input(&self, action: ProjectAction) -> ProjectInput {
        ProjectInput::new(self.ids.project, action)
    }

    pub fn representation_input(
        &self,
        representation_id: RepresentationId,
        action: RepresentationAction,
    ) -> RepresentationInput {
        RepresentationInput::new(self.ids.project, representation_id, action)
    }

    pub fn rename_object(&self, object_id: &str, new_label: &str) -> ProjectInput {
        self.project_input(ProjectAction::RenameObject {
            object_id: ObjectId::from(object_id),
            new_label: new_label.to_string(),
        })
    }

    pub fn persisted(&self) -> EditingContext {
        self.manager.persisted(&self.ids.project).unwrap()
    }
}

pub async fn acquire(
    processor: &ProjectEventProcessor,
    kind: RepresentationKind,
    representation_id: RepresentationId,
    subscriber: &str,
) -> (
    Arc<dyn tandem::RepresentationEventProcessor>,
    tandem::SubscriptionDescription,
) {
    let subscription = tandem::SubscriptionDescription::new(subscriber);
    let acquired = processor
        .acquire_representation_event_processor(
            kind,
            RepresentationConfiguration::new(representation_id),
            subscription.clone(),
        )
        .await
        .unwrap();
    (acquired, subscription)
}

pub fn alice() -> Identity {
    Identity::user("alice")
}

pub fn bob() -> Identity {
    Identity::user("bob")
}

/// Next payload of a stream, failing the test after one second
pub async fn next_payload(stream: &mut PayloadStream) -> Option<Payload> {
    tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("stream stalled")
}

pub fn refreshed_version(payload: &Payload) -> u64 {
    match payload {
        Payload::RepresentationRefreshed { representation, .. } => representation.version,
        other => panic!("expected a refresh, got {:?}", other),
    }
}

/// Storage wrapper counting how often editing contexts are loaded
#[derive(Default)]
pub struct CountingManager {
    pub inner: InMemoryEditingContextManager,
    pub loads: AtomicUsize,
}

impl CountingManager {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EditingContextManager for CountingManager {
    async fn create_editing_context(&self, project_id: ProjectId) -> StorageResult<EditingContext> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        // widen the window in which racing callers could double-create
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.inner.create_editing_context(project_id).await
    }

    async fn persist(&self, project_id: ProjectId, editing_context: &EditingContext) -> StorageResult<()> {
        self.inner.persist(project_id, editing_context).await
    }
}

/// Storage wrapper whose loads of one project take `delay`
pub struct SlowLoadManager {
    pub inner: InMemoryEditingContextManager,
    pub slow: ProjectId,
    pub delay: Duration,
}

impl SlowLoadManager {
    pub fn new(slow: ProjectId, delay: Duration) -> Self {
        Self {
            inner: InMemoryEditingContextManager::new(),
            slow,
            delay,
        }
    }
}

#[async_trait]
impl EditingContextManager for SlowLoadManager {
    async fn create_editing_context(&self, project_id: ProjectId) -> StorageResult<EditingContext> {
        if project_id == self.slow {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.create_editing_context(project_id).await
    }

    async fn persist(&self, project_id: ProjectId, editing_context: &EditingContext) -> StorageResult<()> {
        self.inner.persist(project_id, editing_context).await
    }
}
