//! Replay scripts
//!
//! A script is a YAML list of steps run in order against one project:
//!
//! ```yaml
//! project: 6f1c2a4e-52a4-4c7b-9d55-0d6f3b1e9a10   # optional, random when absent
//! steps:
//!   - step: project
//!     user: alice
//!     action: { type: create_root_object, object_id: pkg, kind: package, label: Library }
//!   - step: project
//!     action:
//!       type: create_representation
//!       representation_id: 00000000-0000-4000-8000-000000000001
//!       kind: diagram
//!       label: Overview
//!       description_id: diagram
//!   - step: acquire
//!     representation_id: 00000000-0000-4000-8000-000000000001
//!     kind: diagram
//!     subscriber: alice
//!   - step: representation
//!     user: alice
//!     representation_id: 00000000-0000-4000-8000-000000000001
//!     action: { type: edit_label, label_id: pkg_label, new_text: Catalog }
//!   - step: release
//!     representation_id: 00000000-0000-4000-8000-000000000001
//!     subscriber: alice
//! ```
//!
//! Every payload produced along the way (the direct reply and whatever the
//! project and acquired representations broadcast) is collected as a
//! `ScriptEvent`.

use crate::error::TandemResult;
use crate::event::{
    Identity, Payload, PayloadStream, ProjectAction, ProjectInput, RepresentationAction,
    RepresentationInput,
};
use crate::model::{ProjectId, RepresentationId, RepresentationKind};
use crate::project::{ProjectEventProcessor, ProjectEventProcessorRegistry};
use crate::representation::{RepresentationConfiguration, SubscriptionDescription};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("cannot read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid script: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("step {step}: {subscriber} holds no subscription on {representation_id}")]
    UnknownSubscription {
        step: usize,
        representation_id: RepresentationId,
        subscriber: String,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub project: Option<ProjectId>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Project {
        #[serde(default)]
        user: Option<String>,
        action: ProjectAction,
    },
    Representation {
        #[serde(default)]
        user: Option<String>,
        representation_id: RepresentationId,
        action: RepresentationAction,
    },
    Acquire {
        representation_id: RepresentationId,
        kind: RepresentationKind,
        subscriber: String,
    },
    Release {
        representation_id: RepresentationId,
        subscriber: String,
    },
}

impl Script {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ScriptError> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Where a collected payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum EventSource {
    /// Returned to the caller of the step
    Reply,
    Project,
    Representation { representation_id: RepresentationId },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptEvent {
    /// 1-based index of the step that produced the payload
    pub step: usize,
    #[serde(flatten)]
    pub source: EventSource,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptReport {
    pub project_id: ProjectId,
    pub events: Vec<ScriptEvent>,
}

impl ScriptReport {
    pub fn replies(&self) -> impl Iterator<Item = &Payload> {
        self.events
            .iter()
            .filter(|e| e.source == EventSource::Reply)
            .map(|e| &e.payload)
    }
}

/// Runs a script against a registry's processor for the script's project
pub struct ScriptRunner<'a> {
    registry: &'a ProjectEventProcessorRegistry,
}

struct Session {
    project: Arc<ProjectEventProcessor>,
    project_stream: PayloadStream,
    representation_streams: BTreeMap<RepresentationId, PayloadStream>,
    subscriptions: HashMap<(RepresentationId, String), SubscriptionDescription>,
    events: Vec<ScriptEvent>,
}

impl Session {
    fn record(&mut self, step: usize, source: EventSource, payload: Payload) {
        self.events.push(ScriptEvent {
            step,
            source,
            payload,
        });
    }

    fn collect_broadcasts(&mut self, step: usize) {
        for payload in self.project_stream.drain() {
            self.record(step, EventSource::Project, payload);
        }

        let mut collected = Vec::new();
        for (representation_id, stream) in self.representation_streams.iter_mut() {
            for payload in stream.drain() {
                collected.push((*representation_id, payload));
            }
        }
        for (representation_id, payload) in collected {
            self.record(
                step,
                EventSource::Representation { representation_id },
                payload,
            );
        }

        self.representation_streams
            .retain(|_, stream| !stream.is_terminated());
    }
}

fn identity(user: Option<String>) -> Identity {
    Identity { username: user }
}

impl<'a> ScriptRunner<'a> {
    pub fn new(registry: &'a ProjectEventProcessorRegistry) -> Self {
        Self { registry }
    }

    pub async fn run(&self, script: Script) -> TandemResult<ScriptReport> {
        let project_id = script.project.unwrap_or_default();
        let project = self.registry.get_or_create(project_id).await?;

        let mut session = Session {
            project_stream: project.output_events(),
            project,
            representation_streams: BTreeMap::new(),
            subscriptions: HashMap::new(),
            events: Vec::new(),
        };

        for (index, step) in script.steps.into_iter().enumerate() {
            let step_number = index + 1;
            self.run_step(&mut session, project_id, step_number, step)
                .await?;
            session.collect_broadcasts(step_number);
        }

        Ok(ScriptReport {
            project_id,
            events: session.events,
        })
    }

    async fn run_step(
        &self,
        session: &mut Session,
        project_id: ProjectId,
        step_number: usize,
        step: Step,
    ) -> TandemResult<()> {
        match step {
            Step::Project { user, action } => {
                let input = ProjectInput::new(project_id, action);
                let input_id = input.id;
                match session.project.handle(identity(user), input).await {
                    Some(payload) => session.record(step_number, EventSource::Reply, payload),
                    None => warn!(step = step_number, %input_id, "project input unanswered"),
                }
            }
            Step::Representation {
                user,
                representation_id,
                action,
            } => {
                let input = RepresentationInput::new(project_id, representation_id, action);
                let input_id = input.id;
                match session.project.handle(identity(user), input).await {
                    Some(payload) => session.record(step_number, EventSource::Reply, payload),
                    None => {
                        warn!(step = step_number, %input_id, %representation_id, "representation input unanswered")
                    }
                }
            }
            Step::Acquire {
                representation_id,
                kind,
                subscriber,
            } => {
                let subscription = session
                    .subscriptions
                    .entry((representation_id, subscriber.clone()))
                    .or_insert_with(|| SubscriptionDescription::new(subscriber))
                    .clone();
                let acquired = session
                    .project
                    .acquire_representation_event_processor(
                        kind,
                        RepresentationConfiguration::new(representation_id),
                        subscription,
                    )
                    .await;
                match acquired {
                    Some(processor) => {
                        let live = session
                            .representation_streams
                            .get(&representation_id)
                            .is_some_and(|stream| !stream.is_terminated());
                        if !live {
                            session
                                .representation_streams
                                .insert(representation_id, processor.output_events(None));
                        }
                        debug!(step = step_number, %representation_id, "representation acquired");
                    }
                    None => warn!(step = step_number, %representation_id, "representation not acquired"),
                }
            }
            Step::Release {
                representation_id,
                subscriber,
            } => {
                let subscription = session
                    .subscriptions
                    .remove(&(representation_id, subscriber.clone()))
                    .ok_or(ScriptError::UnknownSubscription {
                        step: step_number,
                        representation_id,
                        subscriber,
                    })?;
                session.project.release(&subscription).await;
            }
        }
        Ok(())
    }
}
