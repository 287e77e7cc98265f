//! Inputs: immutable descriptions of one user intent
//!
//! Two disjoint families. Project inputs act on the project as a whole
//! (rename, create/delete representations or objects); representation
//! inputs target exactly one live representation.

use crate::model::{
    InputId, ObjectId, ProjectId, PropertyValue, RepresentationId, RepresentationKind,
};
use serde::{Deserialize, Serialize};

/// Who submitted an input.
///
/// Captured at submission and handed to the unit of work that processes
/// that single input; the worker never keeps it afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self { username: None }
    }

    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

/// What a project-scoped input asks for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectAction {
    RenameProject {
        new_name: String,
    },
    CreateRepresentation {
        /// Client-chosen id; generated when absent
        #[serde(default)]
        representation_id: Option<RepresentationId>,
        kind: RepresentationKind,
        label: String,
        description_id: String,
        #[serde(default)]
        target_object_id: Option<ObjectId>,
    },
    RenameRepresentation {
        representation_id: RepresentationId,
        new_label: String,
    },
    DeleteRepresentation {
        representation_id: RepresentationId,
    },
    CreateRootObject {
        #[serde(default)]
        object_id: Option<ObjectId>,
        kind: String,
        label: String,
    },
    CreateChildObject {
        parent_id: ObjectId,
        #[serde(default)]
        object_id: Option<ObjectId>,
        kind: String,
        label: String,
    },
    DeleteObject {
        object_id: ObjectId,
    },
    RenameObject {
        object_id: ObjectId,
        new_label: String,
    },
}

/// An input addressed to the project as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInput {
    pub id: InputId,
    pub project_id: ProjectId,
    pub action: ProjectAction,
}

impl ProjectInput {
    pub fn new(project_id: ProjectId, action: ProjectAction) -> Self {
        Self {
            id: InputId::new(),
            project_id,
            action,
        }
    }
}

/// What a representation-scoped input asks for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepresentationAction {
    RenameRepresentation {
        new_label: String,
    },
    /// Direct edit of a node (`<node>_label`) or edge (`<edge>_centerlabel`) label
    EditLabel {
        label_id: String,
        new_text: String,
    },
    InvokeNodeTool {
        /// Node id, or the representation id for the diagram background
        diagram_element_id: String,
        tool_id: String,
    },
    InvokeEdgeTool {
        source_element_id: String,
        target_element_id: String,
        tool_id: String,
    },
    /// Resize and/or move a node
    UpdateNodeBounds {
        node_id: String,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    DeleteFromDiagram {
        element_ids: Vec<String>,
    },
    EditWidget {
        widget_id: String,
        value: PropertyValue,
    },
    UpdateWidgetFocus {
        widget_id: String,
        selected: bool,
    },
}

/// An input targeting exactly one representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentationInput {
    pub id: InputId,
    pub project_id: ProjectId,
    pub representation_id: RepresentationId,
    pub action: RepresentationAction,
}

impl RepresentationInput {
    pub fn new(
        project_id: ProjectId,
        representation_id: RepresentationId,
        action: RepresentationAction,
    ) -> Self {
        Self {
            id: InputId::new(),
            project_id,
            representation_id,
            action,
        }
    }
}

/// Any input accepted by a project event processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Input {
    Project(ProjectInput),
    Representation(RepresentationInput),
}

impl Input {
    pub fn id(&self) -> InputId {
        match self {
            Self::Project(input) => input.id,
            Self::Representation(input) => input.id,
        }
    }

    pub fn project_id(&self) -> ProjectId {
        match self {
            Self::Project(input) => input.project_id,
            Self::Representation(input) => input.project_id,
        }
    }

    /// The representation a representation-scoped input targets
    pub fn representation_id(&self) -> Option<RepresentationId> {
        match self {
            Self::Project(_) => None,
            Self::Representation(input) => Some(input.representation_id),
        }
    }
}

impl From<ProjectInput> for Input {
    fn from(input: ProjectInput) -> Self {
        Self::Project(input)
    }
}

impl From<RepresentationInput> for Input {
    fn from(input: RepresentationInput) -> Self {
        Self::Representation(input)
    }
}
