//! Project event processor: one sequential worker per project
//!
//! Every input and every representation acquisition for a project goes
//! through a single FIFO queue drained by a dedicated tokio task. That task
//! owns the project's `EditingContext`; nothing else ever touches it, so
//! inputs never interleave their effects. Callers enqueue and then await
//! the answer, which gives them request/response semantics over the queue.
//!
//! After a handler responds, the worker always runs, in this order:
//! 1. project-level broadcasts (project or representation renamed)
//! 2. disposal of dangling representations (target object gone)
//! 3. refresh propagation to the other live representations
//! 4. persistence, when the editing context was mutated
//!
//! Disposal only closes the queue. Commands already in it are still
//! processed; the worker then disposes the representations and completes
//! the project stream.

use super::handlers::ProjectEventHandler;
use super::services::ProjectServices;
use crate::event::{
    EventHandlerResponse, Identity, Input, Payload, PayloadBroadcaster, PayloadStream,
    ProjectAction, ProjectInput, RepresentationAction, RepresentationInput,
};
use crate::model::{
    EditingContext, InputId, ObjectService, ProjectId, RepresentationId, RepresentationKind,
};
use crate::representation::{
    RepresentationConfiguration, RepresentationEventProcessor,
    RepresentationEventProcessorFactory, SubscriptionDescription,
};
use crate::storage::{EditingContextManager, StorageResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info_span, warn, Instrument};

type RepresentationMap = DashMap<RepresentationId, Arc<dyn RepresentationEventProcessor>>;

enum Command {
    Handle {
        identity: Identity,
        input: Input,
        reply: oneshot::Sender<Option<Payload>>,
    },
    Acquire {
        kind: RepresentationKind,
        configuration: RepresentationConfiguration,
        subscription: SubscriptionDescription,
        reply: oneshot::Sender<Option<Arc<dyn RepresentationEventProcessor>>>,
    },
    Release {
        subscription: SubscriptionDescription,
        reply: oneshot::Sender<()>,
    },
}

/// An answer the worker has been asked for but may not have produced yet.
///
/// Dropping it does not cancel the input: once enqueued, an input runs to
/// completion.
#[must_use = "the input is processed regardless; await `wait` for its payload"]
pub struct PendingPayload {
    input_id: InputId,
    receiver: Option<oneshot::Receiver<Option<Payload>>>,
    timeout: Option<Duration>,
}

impl PendingPayload {
    fn unanswered(input_id: InputId) -> Self {
        Self {
            input_id,
            receiver: None,
            timeout: None,
        }
    }

    pub fn input_id(&self) -> InputId {
        self.input_id
    }

    /// Wait for the worker. `None` when no handler produced a payload, the
    /// worker was gone, or the wait failed.
    pub async fn wait(self) -> Option<Payload> {
        let receiver = self.receiver?;
        await_reply(receiver, self.timeout, self.input_id.to_string()).await?
    }
}

async fn await_reply<T>(
    receiver: oneshot::Receiver<T>,
    timeout: Option<Duration>,
    what: String,
) -> Option<T> {
    let received = match timeout {
        Some(limit) => match tokio::time::timeout(limit, receiver).await {
            Ok(received) => received,
            Err(_) => {
                error!(request = %what, ?limit, "timed out waiting for project worker");
                return None;
            }
        },
        None => receiver.await,
    };
    match received {
        Ok(value) => Some(value),
        Err(e) => {
            error!(request = %what, error = %e, "project worker dropped the request");
            None
        }
    }
}

fn dispose_representation(representations: &RepresentationMap, id: &RepresentationId) {
    if let Some((_, processor)) = representations.remove(id) {
        processor.dispose();
    }
}

/// Serializes and routes every input addressed to one project.
pub struct ProjectEventProcessor {
    project_id: ProjectId,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    outstanding: Arc<AtomicUsize>,
    disposed: Arc<AtomicBool>,
    stopped: watch::Receiver<bool>,
    representations: Arc<RepresentationMap>,
    output: Arc<PayloadBroadcaster>,
    handle_timeout: Option<Duration>,
}

impl ProjectEventProcessor {
    /// Load the project's editing context and start its worker.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn new(project_id: ProjectId, services: &ProjectServices) -> StorageResult<Self> {
        let editing_context = services
            .editing_context_manager
            .create_editing_context(project_id)
            .await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let (stopped_sender, stopped) = watch::channel(false);
        let outstanding = Arc::new(AtomicUsize::new(0));
        let disposed = Arc::new(AtomicBool::new(false));
        let representations = Arc::new(RepresentationMap::new());
        let output = Arc::new(PayloadBroadcaster::new(services.settings.channel_capacity));

        let worker = ProjectWorker {
            project_id,
            editing_context,
            editing_context_manager: services.editing_context_manager.clone(),
            object_service: services.object_service.clone(),
            handlers: services.handlers.clone(),
            factory: services.factory.clone(),
            representations: representations.clone(),
            output: output.clone(),
            outstanding: outstanding.clone(),
            disposed: disposed.clone(),
            stopped: stopped_sender,
        };
        tokio::spawn(
            worker
                .run(receiver)
                .instrument(info_span!("project", project_id = %project_id)),
        );

        Ok(Self {
            project_id,
            commands: Mutex::new(Some(sender)),
            outstanding,
            disposed,
            stopped,
            representations,
            output,
            handle_timeout: services.settings.handle_timeout,
        })
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Enqueue a command, handing it back when the queue is closed
    fn send(&self, command: Command) -> Result<(), Command> {
        let commands = self.commands.lock();
        let Some(commands) = commands.as_ref() else {
            return Err(command);
        };
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        commands.send(command).map_err(|refused| {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            refused.0
        })
    }

    /// Enqueue an input. Its position in the project's timeline is fixed
    /// when this returns.
    pub fn submit(&self, identity: Identity, input: impl Into<Input>) -> PendingPayload {
        self.try_submit(identity, input.into())
            .unwrap_or_else(|(_, input)| {
                warn!(project_id = %self.project_id, input_id = %input.id(), "project event processor is shut down");
                PendingPayload::unanswered(input.id())
            })
    }

    /// Like `submit`, but hands the input back when the processor no
    /// longer accepts input so the caller can route it elsewhere.
    pub(crate) fn try_submit(
        &self,
        identity: Identity,
        input: Input,
    ) -> Result<PendingPayload, (Identity, Input)> {
        let input_id = input.id();
        if input.project_id() != self.project_id {
            warn!(
                project_id = %self.project_id,
                input_project_id = %input.project_id(),
                %input_id,
                "input addressed to another project"
            );
            return Ok(PendingPayload::unanswered(input_id));
        }

        let (reply, receiver) = oneshot::channel();
        match self.send(Command::Handle {
            identity,
            input,
            reply,
        }) {
            Ok(()) => Ok(PendingPayload {
                input_id,
                receiver: Some(receiver),
                timeout: self.handle_timeout,
            }),
            Err(Command::Handle {
                identity, input, ..
            }) => Err((identity, input)),
            Err(_) => Ok(PendingPayload::unanswered(input_id)),
        }
    }

    /// Process an input and wait for its payload.
    pub async fn handle(&self, identity: Identity, input: impl Into<Input>) -> Option<Payload> {
        self.submit(identity, input).wait().await
    }

    /// Look up or create the processor for a representation and attach the
    /// subscription to it.
    pub async fn acquire_representation_event_processor(
        &self,
        kind: RepresentationKind,
        configuration: RepresentationConfiguration,
        subscription: SubscriptionDescription,
    ) -> Option<Arc<dyn RepresentationEventProcessor>> {
        let (reply, receiver) = oneshot::channel();
        if self
            .send(Command::Acquire {
                kind,
                configuration,
                subscription,
                reply,
            })
            .is_err()
        {
            warn!(project_id = %self.project_id, representation_id = %configuration.id, "project event processor is shut down");
            return None;
        }
        await_reply(receiver, self.handle_timeout, configuration.id.to_string())
            .await
            .flatten()
    }

    /// Drop a subscription wherever it is held. Representations left
    /// without subscribers are disposed. Runs on the worker, after every
    /// command enqueued before it.
    pub async fn release(&self, subscription: &SubscriptionDescription) {
        let (reply, receiver) = oneshot::channel();
        if self
            .send(Command::Release {
                subscription: subscription.clone(),
                reply,
            })
            .is_err()
        {
            debug!(project_id = %self.project_id, subscriber = %subscription.subscriber_id, "release after shutdown");
            return;
        }
        await_reply(receiver, self.handle_timeout, subscription.subscription_id.to_string()).await;
    }

    /// Project-level payloads published after the call
    pub fn output_events(&self) -> PayloadStream {
        self.output.subscribe()
    }

    pub fn has_output_subscribers(&self) -> bool {
        self.output.receiver_count() > 0
    }

    pub fn representation_event_processors(&self) -> Vec<Arc<dyn RepresentationEventProcessor>> {
        self.representations
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn representation_event_processor(
        &self,
        id: &RepresentationId,
    ) -> Option<Arc<dyn RepresentationEventProcessor>> {
        self.representations.get(id).map(|entry| entry.value().clone())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Commands enqueued and not yet answered
    pub fn pending_commands(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Stop accepting input. Every command already enqueued still runs;
    /// the worker then disposes every representation and completes the
    /// output stream.
    pub fn dispose(&self) {
        let Some(commands) = self.commands.lock().take() else {
            return;
        };
        self.disposed.store(true, Ordering::Release);
        drop(commands);
        debug!(project_id = %self.project_id, pending = self.pending_commands(), "project event processor closed");
    }

    /// Dispose, then wait until the worker has drained its queue
    pub async fn shutdown(&self) {
        self.dispose();
        let mut stopped = self.stopped.clone();
        // an error means the worker is already gone
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }

    /// Warn every subscriber, then dispose
    pub fn pre_destroy(&self) {
        for processor in self.representation_event_processors() {
            processor.pre_destroy();
        }
        self.output.publish(Payload::PreDestroy {
            id: self.project_id.to_string(),
        });
        self.dispose();
    }
}

/// State owned by the worker task
struct ProjectWorker {
    project_id: ProjectId,
    editing_context: EditingContext,
    editing_context_manager: Arc<dyn EditingContextManager>,
    object_service: Arc<dyn ObjectService>,
    handlers: Arc<Vec<Arc<dyn ProjectEventHandler>>>,
    factory: Arc<dyn RepresentationEventProcessorFactory>,
    representations: Arc<RepresentationMap>,
    output: Arc<PayloadBroadcaster>,
    outstanding: Arc<AtomicUsize>,
    disposed: Arc<AtomicBool>,
    stopped: watch::Sender<bool>,
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl ProjectWorker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!("project worker started");
        while let Some(command) = commands.recv().await {
            match command {
                Command::Handle {
                    identity,
                    input,
                    reply,
                } => {
                    let payload = self.process(&identity, &input).await;
                    self.settle();
                    // the caller may have stopped waiting
                    let _ = reply.send(payload);
                }
                Command::Acquire {
                    kind,
                    configuration,
                    subscription,
                    reply,
                } => {
                    let processor = if self.disposed.load(Ordering::Acquire) {
                        debug!(representation_id = %configuration.id, "not opening a representation on a closed project");
                        None
                    } else {
                        catch_unwind(AssertUnwindSafe(|| {
                            self.acquire(kind, &configuration, subscription)
                        }))
                        .unwrap_or_else(|panic| {
                            error!(
                                representation_id = %configuration.id,
                                panic = panic_message(panic.as_ref()),
                                "representation creation panicked"
                            );
                            None
                        })
                    };
                    self.settle();
                    let _ = reply.send(processor);
                }
                Command::Release {
                    subscription,
                    reply,
                } => {
                    self.release(&subscription);
                    self.settle();
                    let _ = reply.send(());
                }
            }
        }

        // queue closed and drained
        self.disposed.store(true, Ordering::Release);
        let ids: Vec<RepresentationId> = self.representations.iter().map(|e| *e.key()).collect();
        for id in ids {
            dispose_representation(&self.representations, &id);
        }
        self.output.complete();
        let _ = self.stopped.send(true);
        debug!("project worker stopped");
    }

    fn settle(&self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }

    async fn process(&mut self, identity: &Identity, input: &Input) -> Option<Payload> {
        let response = match catch_unwind(AssertUnwindSafe(|| self.dispatch(identity, input))) {
            Ok(response) => response?,
            Err(panic) => {
                error!(
                    input_id = %input.id(),
                    panic = panic_message(panic.as_ref()),
                    "input handling panicked"
                );
                return None;
            }
        };

        if response.editing_context_dirty {
            self.persist().await;
        }
        Some(response.payload)
    }

    fn dispatch(&mut self, identity: &Identity, input: &Input) -> Option<EventHandlerResponse> {
        debug!(input_id = %input.id(), "handling input");
        let response = match input {
            Input::Project(project_input) => self.handle_project_input(identity, project_input),
            Input::Representation(representation_input) => {
                self.handle_representation_input(identity, representation_input)
            }
        }?;

        self.publish_broadcasts(&response.payload);
        self.dispose_dangling_representations();
        self.propagate(input, &response);
        Some(response)
    }

    fn handle_project_input(
        &mut self,
        identity: &Identity,
        input: &ProjectInput,
    ) -> Option<EventHandlerResponse> {
        if let ProjectAction::DeleteRepresentation { representation_id } = &input.action {
            dispose_representation(&self.representations, representation_id);
        }

        let Some(handler) = self.handlers.iter().find(|h| h.can_handle(input)) else {
            warn!(input_id = %input.id, action = ?input.action, "no project handler accepts input");
            return None;
        };
        let response = handler.handle(&mut self.editing_context, identity, input);

        // keep a live representation in step with its renamed descriptor
        if let ProjectAction::RenameRepresentation {
            representation_id,
            new_label,
        } = &input.action
        {
            let live = self
                .representations
                .get(representation_id)
                .map(|entry| entry.value().clone());
            if let Some(processor) = live {
                let forwarded = RepresentationInput {
                    id: input.id,
                    project_id: input.project_id,
                    representation_id: *representation_id,
                    action: RepresentationAction::RenameRepresentation {
                        new_label: new_label.clone(),
                    },
                };
                processor.handle(&mut self.editing_context, identity, &forwarded);
            }
        }

        Some(response)
    }

    fn handle_representation_input(
        &mut self,
        identity: &Identity,
        input: &RepresentationInput,
    ) -> Option<EventHandlerResponse> {
        let live = self
            .representations
            .get(&input.representation_id)
            .map(|entry| entry.value().clone());
        let Some(processor) = live else {
            warn!(
                input_id = %input.id,
                representation_id = %input.representation_id,
                "no representation event processor for input"
            );
            return None;
        };
        processor.handle(&mut self.editing_context, identity, input)
    }

    fn publish_broadcasts(&self, payload: &Payload) {
        match payload {
            Payload::RenameRepresentationSuccess {
                representation_id,
                new_label,
                ..
            } => {
                self.output.publish(Payload::RepresentationRenamed {
                    representation_id: *representation_id,
                    new_label: new_label.clone(),
                });
            }
            Payload::RenameProjectSuccess {
                project_id,
                new_name,
                ..
            } => {
                self.output.publish(Payload::ProjectRenamed {
                    project_id: *project_id,
                    new_name: new_name.clone(),
                });
            }
            _ => {}
        }
    }

    fn dispose_dangling_representations(&self) {
        let dangling: Vec<RepresentationId> = self
            .representations
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .representation()
                    .target_object_id
                    .is_some_and(|target| {
                        self.object_service
                            .get_object(&self.editing_context, &target)
                            .is_none()
                    })
            })
            .map(|entry| *entry.key())
            .collect();

        for id in dangling {
            debug!(representation_id = %id, "disposing dangling representation");
            dispose_representation(&self.representations, &id);
        }
    }

    /// Refresh every other live representation the response asks for.
    ///
    /// A representation-scoped input already refreshed its own target;
    /// project-scoped inputs leave every representation eligible.
    fn propagate(&self, input: &Input, response: &EventHandlerResponse) {
        let origin = input.representation_id();
        let others: Vec<Arc<dyn RepresentationEventProcessor>> = self
            .representations
            .iter()
            .filter(|entry| Some(*entry.key()) != origin)
            .map(|entry| entry.value().clone())
            .collect();

        for processor in others {
            if !response.should_refresh(&processor.representation()) {
                continue;
            }
            processor.refresh(&self.editing_context, Some(input.id()));
            self.output.publish(Payload::RepresentationRefreshed {
                input_id: Some(input.id()),
                representation: processor.representation(),
            });
        }
    }

    async fn persist(&self) {
        if let Err(e) = self
            .editing_context_manager
            .persist(self.project_id, &self.editing_context)
            .await
        {
            error!(error = %e, "failed to persist editing context");
        }
    }

    fn release(&self, subscription: &SubscriptionDescription) {
        let held: Vec<Arc<dyn RepresentationEventProcessor>> = self
            .representations
            .iter()
            .filter(|entry| entry.value().subscription_manager().remove(subscription))
            .map(|entry| entry.value().clone())
            .collect();

        for processor in held {
            let manager = processor.subscription_manager();
            if manager.is_empty() {
                debug!(representation_id = %processor.id(), "last subscriber left");
                dispose_representation(&self.representations, &processor.id());
                continue;
            }
            let still_subscribed = manager
                .subscribers()
                .iter()
                .any(|s| s.username == subscription.subscriber_id);
            if !still_subscribed && processor.forget_subscriber(&subscription.subscriber_id) {
                self.output.publish(Payload::RepresentationRefreshed {
                    input_id: None,
                    representation: processor.representation(),
                });
            }
        }
    }

    fn acquire(
        &mut self,
        kind: RepresentationKind,
        configuration: &RepresentationConfiguration,
        subscription: SubscriptionDescription,
    ) -> Option<Arc<dyn RepresentationEventProcessor>> {
        let existing = self
            .representations
            .get(&configuration.id)
            .map(|entry| entry.value().clone())
            .filter(|processor| processor.kind() == kind);
        if let Some(processor) = existing {
            processor.subscription_manager().add(subscription);
            return Some(processor);
        }

        let Some(processor) = self
            .factory
            .create(kind, configuration, &self.editing_context)
        else {
            warn!(representation_id = %configuration.id, %kind, "the representation does not exist");
            return None;
        };

        processor.subscription_manager().add(subscription);
        if let Some(displaced) = self
            .representations
            .insert(configuration.id, processor.clone())
        {
            displaced.dispose();
        }
        debug!(representation_id = %configuration.id, %kind, "representation event processor created");
        Some(processor)
    }
}
