//! Representation event processors
//!
//! A processor wraps exactly one representation. Its identity (map key,
//! subscriber streams) is stable for its whole life; the representation
//! value inside is replaced on every refresh.

use super::subscription::SubscriptionManager;
use super::types::Representation;
use crate::event::{
    ChangeDescription, EventHandlerResponse, Identity, Payload, PayloadBroadcaster,
    PayloadStream, RepresentationInput,
};
use crate::model::{EditingContext, InputId, RepresentationId, RepresentationKind};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handles one family of representation-scoped inputs.
///
/// Runs on the project worker with exclusive access to the editing context.
/// The representation passed in is a working copy that becomes the stored
/// value once the handler returns.
pub trait RepresentationEventHandler: Send + Sync {
    fn can_handle(&self, input: &RepresentationInput) -> bool;

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        representation: &mut Representation,
        identity: &Identity,
        input: &RepresentationInput,
    ) -> EventHandlerResponse;
}

/// Kind-specific rendering.
///
/// The actual layout/diff algorithms live behind this seam; the processor
/// only decides when to call it.
pub trait RepresentationRenderer: Send + Sync {
    /// Recompute from the editing context. `None` when the representation
    /// cannot be rendered any more (descriptor or target gone).
    fn render(
        &self,
        editing_context: &EditingContext,
        previous: &Representation,
    ) -> Option<Representation>;

    /// Whether a change handled by this representation requires it to
    /// re-render immediately
    fn should_refresh(&self, change: &ChangeDescription, representation_id: RepresentationId) -> bool;
}

/// The contract the project worker relies on
pub trait RepresentationEventProcessor: Send + Sync {
    fn id(&self) -> RepresentationId;

    fn kind(&self) -> RepresentationKind;

    /// Snapshot of the current representation
    fn representation(&self) -> Representation;

    fn subscription_manager(&self) -> &SubscriptionManager;

    /// Dispatch to the first handler that accepts the input; `None` when
    /// no handler does.
    fn handle(
        &self,
        editing_context: &mut EditingContext,
        identity: &Identity,
        input: &RepresentationInput,
    ) -> Option<EventHandlerResponse>;

    /// Unconditional recomputation, announced on this processor's stream
    fn refresh(&self, editing_context: &EditingContext, input_id: Option<InputId>);

    /// Refresh notifications merged with subscription changes. The stream
    /// opens with the current representation.
    fn output_events(&self, input_id: Option<InputId>) -> PayloadStream;

    /// Drop transient per-user state (form focus) once a user no longer
    /// holds any subscription here. True when a refresh was published.
    fn forget_subscriber(&self, username: &str) -> bool;

    /// Tell subscribers shutdown is imminent
    fn pre_destroy(&self);

    /// Release subscriptions and complete every stream
    fn dispose(&self);
}

/// Handler chain plus renderer around one stored representation
pub struct RepresentationProcessor {
    kind: RepresentationKind,
    representation: RwLock<Representation>,
    handlers: Vec<Arc<dyn RepresentationEventHandler>>,
    renderer: Arc<dyn RepresentationRenderer>,
    subscription_manager: SubscriptionManager,
    refreshes: PayloadBroadcaster,
}

impl RepresentationProcessor {
    /// Wrap an already rendered representation
    pub fn new(
        representation: Representation,
        handlers: Vec<Arc<dyn RepresentationEventHandler>>,
        renderer: Arc<dyn RepresentationRenderer>,
        capacity: usize,
    ) -> Self {
        Self {
            kind: representation.kind,
            subscription_manager: SubscriptionManager::new(representation.id, capacity),
            representation: RwLock::new(representation),
            handlers,
            renderer,
            refreshes: PayloadBroadcaster::new(capacity),
        }
    }

    fn publish_refreshed(&self, representation: Representation, input_id: Option<InputId>) {
        self.refreshes.publish(Payload::RepresentationRefreshed {
            input_id,
            representation,
        });
    }
}

impl RepresentationEventProcessor for RepresentationProcessor {
    fn id(&self) -> RepresentationId {
        self.representation.read().id
    }

    fn kind(&self) -> RepresentationKind {
        self.kind
    }

    fn representation(&self) -> Representation {
        self.representation.read().clone()
    }

    fn subscription_manager(&self) -> &SubscriptionManager {
        &self.subscription_manager
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        identity: &Identity,
        input: &RepresentationInput,
    ) -> Option<EventHandlerResponse> {
        let Some(handler) = self.handlers.iter().find(|h| h.can_handle(input)) else {
            warn!(
                representation_id = %input.representation_id,
                input_id = %input.id,
                kind = %self.kind,
                "no representation handler accepts input"
            );
            return None;
        };

        let mut working = self.representation();
        let response = handler.handle(editing_context, &mut working, identity, input);
        *self.representation.write() = working;

        if response.success
            && self
                .renderer
                .should_refresh(&response.change_description, input.representation_id)
        {
            self.refresh(editing_context, Some(input.id));
        }
        Some(response)
    }

    fn refresh(&self, editing_context: &EditingContext, input_id: Option<InputId>) {
        let previous = self.representation();
        let representation = match self.renderer.render(editing_context, &previous) {
            Some(rendered) => rendered,
            None => {
                debug!(representation_id = %previous.id, "render produced nothing, keeping previous");
                previous
            }
        };
        *self.representation.write() = representation.clone();
        self.publish_refreshed(representation, input_id);
    }

    fn output_events(&self, input_id: Option<InputId>) -> PayloadStream {
        let current = Payload::RepresentationRefreshed {
            input_id,
            representation: self.representation(),
        };
        self.refreshes
            .subscribe()
            .merge(self.subscription_manager.output_events())
            .starting_with(current)
    }

    fn forget_subscriber(&self, username: &str) -> bool {
        let representation = {
            let mut representation = self.representation.write();
            if !representation
                .form_mut()
                .is_some_and(|form| form.clear_focus(username))
            {
                return false;
            }
            representation.version += 1;
            representation.clone()
        };
        debug!(representation_id = %representation.id, username, "cleared focus of departed subscriber");
        self.publish_refreshed(representation, None);
        true
    }

    fn pre_destroy(&self) {
        self.refreshes.publish(Payload::PreDestroy {
            id: self.id().to_string(),
        });
    }

    fn dispose(&self) {
        debug!(representation_id = %self.id(), "disposing representation");
        self.subscription_manager.dispose();
        self.refreshes.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChangeKind, RepresentationAction};
    use crate::model::{ProjectId, RepresentationMetadata};
    use crate::representation::SubscriptionDescription;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRenderer {
        renders: AtomicUsize,
    }

    impl RepresentationRenderer for CountingRenderer {
        fn render(&self, _ctx: &EditingContext, previous: &Representation) -> Option<Representation> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            let mut next = previous.clone();
            next.version += 1;
            Some(next)
        }

        fn should_refresh(&self, change: &ChangeDescription, id: RepresentationId) -> bool {
            change.is_semantic() || change.originates_from(id)
        }
    }

    struct Relabel;

    impl RepresentationEventHandler for Relabel {
        fn can_handle(&self, input: &RepresentationInput) -> bool {
            matches!(input.action, RepresentationAction::RenameRepresentation { .. })
        }

        fn handle(
            &self,
            _ctx: &mut EditingContext,
            representation: &mut Representation,
            _identity: &Identity,
            input: &RepresentationInput,
        ) -> EventHandlerResponse {
            if let RepresentationAction::RenameRepresentation { new_label } = &input.action {
                representation.label = new_label.clone();
            }
            EventHandlerResponse::success(
                ChangeDescription::new(ChangeKind::RepresentationRename, input.representation_id),
                Payload::RenameRepresentationSuccess {
                    input_id: input.id,
                    representation_id: input.representation_id,
                    new_label: representation.label.clone(),
                },
            )
        }
    }

    fn processor() -> (RepresentationProcessor, Arc<CountingRenderer>, EditingContext) {
        let ctx = EditingContext::new(ProjectId::new(), "p");
        let metadata = RepresentationMetadata::new(RepresentationKind::Diagram, "D", "diagram");
        let renderer = Arc::new(CountingRenderer {
            renders: AtomicUsize::new(0),
        });
        let processor = RepresentationProcessor::new(
            Representation::from_metadata(&metadata),
            vec![Arc::new(Relabel)],
            renderer.clone(),
            8,
        );
        (processor, renderer, ctx)
    }

    // === Scenario: locally originated change refreshes the representation ===
    #[tokio::test]
    async fn handled_rename_refreshes_self() {
        let (processor, renderer, mut ctx) = processor();
        let mut events = processor.output_events(None);
        let input = RepresentationInput::new(
            ctx.project_id,
            processor.id(),
            RepresentationAction::RenameRepresentation {
                new_label: "Renamed".into(),
            },
        );

        let response = processor
            .handle(&mut ctx, &Identity::user("alice"), &input)
            .unwrap();
        assert!(response.success);
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 1);
        assert_eq!(processor.representation().label, "Renamed");
        assert_eq!(processor.representation().version, 1);

        // initial snapshot, then the refresh tagged with the input
        assert!(matches!(
            events.next().await,
            Some(Payload::RepresentationRefreshed { input_id: None, .. })
        ));
        match events.next().await {
            Some(Payload::RepresentationRefreshed { input_id, representation }) => {
                assert_eq!(input_id, Some(input.id));
                assert_eq!(representation.label, "Renamed");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unhandled_input_yields_none() {
        let (processor, renderer, mut ctx) = processor();
        let input = RepresentationInput::new(
            ctx.project_id,
            processor.id(),
            RepresentationAction::EditLabel {
                label_id: "x_label".into(),
                new_text: "y".into(),
            },
        );
        assert!(processor.handle(&mut ctx, &Identity::anonymous(), &input).is_none());
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dispose_completes_output_events() {
        let (processor, _renderer, _ctx) = processor();
        let mut events = processor.output_events(None);
        processor
            .subscription_manager()
            .add(SubscriptionDescription::new("alice"));
        processor.pre_destroy();
        processor.dispose();

        let mut seen = Vec::new();
        while let Some(payload) = events.next().await {
            seen.push(payload);
        }
        assert!(seen.iter().any(|p| matches!(p, Payload::PreDestroy { .. })));
        assert!(seen.iter().any(|p| matches!(p, Payload::SubscribersUpdated { .. })));
        assert!(processor.subscription_manager().is_empty());
    }
}
