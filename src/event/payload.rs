//! Outbound payloads
//!
//! Handler results travel back to the submitting caller; broadcast variants
//! are published on project and representation streams.

use crate::model::{
    InputId, ObjectId, ProjectId, RepresentationId, RepresentationMetadata, SemanticObject,
};
use crate::representation::{Representation, Subscriber};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    // --- handler results ---
    RenameProjectSuccess {
        input_id: InputId,
        project_id: ProjectId,
        new_name: String,
    },
    CreateRepresentationSuccess {
        input_id: InputId,
        representation: RepresentationMetadata,
    },
    RenameRepresentationSuccess {
        input_id: InputId,
        representation_id: RepresentationId,
        new_label: String,
    },
    DeleteRepresentationSuccess {
        input_id: InputId,
        representation_id: RepresentationId,
    },
    CreateObjectSuccess {
        input_id: InputId,
        object: SemanticObject,
    },
    DeleteObjectSuccess {
        input_id: InputId,
        removed: Vec<ObjectId>,
    },
    RenameObjectSuccess {
        input_id: InputId,
        object_id: ObjectId,
        new_label: String,
    },
    EditLabelSuccess {
        input_id: InputId,
        representation: Representation,
    },
    InvokeToolSuccess {
        input_id: InputId,
        representation_id: RepresentationId,
        tool_id: String,
    },
    UpdateNodeBoundsSuccess {
        input_id: InputId,
        representation_id: RepresentationId,
        node_id: String,
    },
    DeleteFromDiagramSuccess {
        input_id: InputId,
        representation_id: RepresentationId,
        removed: Vec<ObjectId>,
    },
    EditWidgetSuccess {
        input_id: InputId,
        representation_id: RepresentationId,
        widget_id: String,
    },
    UpdateWidgetFocusSuccess {
        input_id: InputId,
        representation_id: RepresentationId,
        widget_id: String,
    },
    Error {
        input_id: InputId,
        message: String,
    },

    // --- broadcasts ---
    /// A representation was recomputed; `input_id` names the triggering input
    RepresentationRefreshed {
        input_id: Option<InputId>,
        representation: Representation,
    },
    RepresentationRenamed {
        representation_id: RepresentationId,
        new_label: String,
    },
    ProjectRenamed {
        project_id: ProjectId,
        new_name: String,
    },
    SubscribersUpdated {
        representation_id: RepresentationId,
        subscribers: Vec<Subscriber>,
    },
    /// The emitting processor is about to shut down
    PreDestroy {
        id: String,
    },
}

impl Payload {
    pub fn error(input_id: InputId, message: impl Into<String>) -> Self {
        Self::Error {
            input_id,
            message: message.into(),
        }
    }

    /// Correlation id of the input that produced this payload, if any
    pub fn input_id(&self) -> Option<InputId> {
        match self {
            Self::RenameProjectSuccess { input_id, .. }
            | Self::CreateRepresentationSuccess { input_id, .. }
            | Self::RenameRepresentationSuccess { input_id, .. }
            | Self::DeleteRepresentationSuccess { input_id, .. }
            | Self::CreateObjectSuccess { input_id, .. }
            | Self::DeleteObjectSuccess { input_id, .. }
            | Self::RenameObjectSuccess { input_id, .. }
            | Self::EditLabelSuccess { input_id, .. }
            | Self::InvokeToolSuccess { input_id, .. }
            | Self::UpdateNodeBoundsSuccess { input_id, .. }
            | Self::DeleteFromDiagramSuccess { input_id, .. }
            | Self::EditWidgetSuccess { input_id, .. }
            | Self::UpdateWidgetFocusSuccess { input_id, .. }
            | Self::Error { input_id, .. } => Some(*input_id),
            Self::RepresentationRefreshed { input_id, .. } => *input_id,
            Self::RepresentationRenamed { .. }
            | Self::ProjectRenamed { .. }
            | Self::SubscribersUpdated { .. }
            | Self::PreDestroy { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
