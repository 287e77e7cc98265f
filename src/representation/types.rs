//! Rendered representations: what subscribers see

use crate::model::{
    Bounds, ObjectId, RepresentationId, RepresentationKind, RepresentationMetadata,
};
use serde::{Deserialize, Serialize};

/// A diagram node, one per displayed semantic object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramNode {
    /// Node id (the id of the object it displays)
    pub id: String,
    pub target_object_id: ObjectId,
    pub kind: String,
    pub label: String,
    pub bounds: Bounds,
}

impl DiagramNode {
    pub fn label_id(&self) -> String {
        format!("{}_label", self.id)
    }
}

/// A diagram edge, one per reference between displayed objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramEdge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub label: String,
}

impl DiagramEdge {
    pub fn edge_id(source: &str, target: &str) -> String {
        format!("{}--{}", source, target)
    }

    pub fn center_label_id(&self) -> String {
        format!("{}_centerlabel", self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
}

impl Diagram {
    pub fn node(&self, id: &str) -> Option<&DiagramNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&DiagramEdge> {
        self.edges.iter().find(|e| e.id == id)
    }
}

/// A form widget bound to the label or one property of an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: String,
    pub label: String,
    pub value: String,
    /// Usernames currently focusing this widget
    #[serde(default)]
    pub focused_by: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub widgets: Vec<Widget>,
}

impl Form {
    pub fn widget(&self, id: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn widget_mut(&mut self, id: &str) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }

    /// Drop a user from every widget's focus list. True when any widget
    /// was focused by them.
    pub fn clear_focus(&mut self, username: &str) -> bool {
        let mut cleared = false;
        for widget in &mut self.widgets {
            let before = widget.focused_by.len();
            widget.focused_by.retain(|u| u != username);
            cleared |= widget.focused_by.len() != before;
        }
        cleared
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RepresentationContent {
    Diagram(Diagram),
    Form(Form),
}

impl RepresentationContent {
    pub fn empty(kind: RepresentationKind) -> Self {
        match kind {
            RepresentationKind::Diagram => Self::Diagram(Diagram::default()),
            RepresentationKind::Form => Self::Form(Form::default()),
        }
    }
}

/// A derived artifact computed from the semantic model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    pub id: RepresentationId,
    pub kind: RepresentationKind,
    pub label: String,
    pub description_id: String,
    pub target_object_id: Option<ObjectId>,
    /// Incremented on every render
    pub version: u64,
    pub content: RepresentationContent,
}

impl Representation {
    /// An unrendered representation for a descriptor
    pub fn from_metadata(metadata: &RepresentationMetadata) -> Self {
        Self {
            id: metadata.id,
            kind: metadata.kind,
            label: metadata.label.clone(),
            description_id: metadata.description_id.clone(),
            target_object_id: metadata.target_object_id.clone(),
            version: 0,
            content: RepresentationContent::empty(metadata.kind),
        }
    }

    pub fn diagram(&self) -> Option<&Diagram> {
        match &self.content {
            RepresentationContent::Diagram(diagram) => Some(diagram),
            RepresentationContent::Form(_) => None,
        }
    }

    pub fn form(&self) -> Option<&Form> {
        match &self.content {
            RepresentationContent::Form(form) => Some(form),
            RepresentationContent::Diagram(_) => None,
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut Form> {
        match &mut self.content {
            RepresentationContent::Form(form) => Some(form),
            RepresentationContent::Diagram(_) => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn empty_diagram() -> Self {
        Self::from_metadata(&RepresentationMetadata::new(
            RepresentationKind::Diagram,
            "diagram",
            "test",
        ))
    }
}

/// Parameters of a representation acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentationConfiguration {
    pub id: RepresentationId,
}

impl RepresentationConfiguration {
    pub fn new(id: RepresentationId) -> Self {
        Self { id }
    }
}
