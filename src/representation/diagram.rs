//! Diagrams: nodes for the children of the target object, edges for the
//! references between them

use super::processor::{RepresentationEventHandler, RepresentationRenderer};
use super::rename::RenameRepresentationHandler;
use super::types::{Diagram, DiagramEdge, DiagramNode, Representation, RepresentationContent};
use crate::event::{
    ChangeDescription, ChangeKind, EventHandlerResponse, Identity, Payload, RepresentationAction,
    RepresentationInput,
};
use crate::model::{
    Bounds, EditingContext, ObjectId, ObjectService, RepresentationId, SemanticObject,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

// Auto-layout grid for nodes without stored bounds
const NODE_WIDTH: f64 = 140.0;
const NODE_HEIGHT: f64 = 60.0;
const NODE_SPACING: f64 = 160.0;
const MARGIN: f64 = 20.0;

const LABEL_SUFFIX: &str = "_label";
const CENTER_LABEL_SUFFIX: &str = "_centerlabel";

/// Creates a child object under the clicked element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTool {
    pub id: String,
    /// Kind of the object the tool creates
    pub child_kind: String,
    /// Initial label of the created object
    pub label: String,
}

/// Adds a reference between two nodes' objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTool {
    pub id: String,
    /// Label of the created reference
    pub label: String,
}

/// Tools available on every diagram
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPalette {
    #[serde(default)]
    pub node_tools: Vec<NodeTool>,
    #[serde(default)]
    pub edge_tools: Vec<EdgeTool>,
}

impl ToolPalette {
    /// A small general-purpose palette
    pub fn standard() -> Self {
        Self::default()
            .with_node_tool("create-package", "package", "Package")
            .with_node_tool("create-class", "class", "Class")
            .with_edge_tool("create-reference", "references")
    }

    pub fn with_node_tool(
        mut self,
        id: impl Into<String>,
        child_kind: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.node_tools.push(NodeTool {
            id: id.into(),
            child_kind: child_kind.into(),
            label: label.into(),
        });
        self
    }

    pub fn with_edge_tool(mut self, id: impl Into<String>, label: impl Into<String>) -> Self {
        self.edge_tools.push(EdgeTool {
            id: id.into(),
            label: label.into(),
        });
        self
    }

    pub fn node_tool(&self, id: &str) -> Option<&NodeTool> {
        self.node_tools.iter().find(|t| t.id == id)
    }

    pub fn edge_tool(&self, id: &str) -> Option<&EdgeTool> {
        self.edge_tools.iter().find(|t| t.id == id)
    }
}

/// Handler chain for diagrams, in dispatch order
pub fn handlers(palette: Arc<ToolPalette>) -> Vec<Arc<dyn RepresentationEventHandler>> {
    vec![
        Arc::new(RenameRepresentationHandler),
        Arc::new(EditLabelHandler),
        Arc::new(InvokeNodeToolHandler {
            palette: palette.clone(),
        }),
        Arc::new(InvokeEdgeToolHandler { palette }),
        Arc::new(UpdateNodeBoundsHandler),
        Arc::new(DeleteFromDiagramHandler),
    ]
}

pub struct DiagramRenderer {
    object_service: Arc<dyn ObjectService>,
}

impl DiagramRenderer {
    pub fn new(object_service: Arc<dyn ObjectService>) -> Self {
        Self { object_service }
    }
}

impl RepresentationRenderer for DiagramRenderer {
    fn render(
        &self,
        editing_context: &EditingContext,
        previous: &Representation,
    ) -> Option<Representation> {
        let metadata = editing_context.get_representation(&previous.id)?;
        let target = match &metadata.target_object_id {
            Some(id) => Some(self.object_service.get_object(editing_context, id)?),
            None => None,
        };

        let displayed: Vec<&SemanticObject> = editing_context.children_of(target.map(|t| &t.id));
        let shown: BTreeSet<&ObjectId> = displayed.iter().map(|o| &o.id).collect();
        let shown = &shown;

        let nodes = displayed
            .iter()
            .enumerate()
            .map(|(i, object)| DiagramNode {
                id: object.id.to_string(),
                target_object_id: object.id.clone(),
                kind: object.kind.clone(),
                label: self.object_service.get_label(object),
                bounds: metadata
                    .layout
                    .get(object.id.as_str())
                    .copied()
                    .unwrap_or_else(|| auto_bounds(i)),
            })
            .collect();

        let edges = displayed
            .iter()
            .flat_map(|source| {
                source
                    .references
                    .iter()
                    .filter(move |r| shown.contains(&r.target))
                    .map(move |r| DiagramEdge {
                        id: DiagramEdge::edge_id(source.id.as_str(), r.target.as_str()),
                        source_id: source.id.to_string(),
                        target_id: r.target.to_string(),
                        label: r.label.clone(),
                    })
            })
            .collect();

        Some(Representation {
            id: metadata.id,
            kind: metadata.kind,
            label: metadata.label.clone(),
            description_id: metadata.description_id.clone(),
            target_object_id: metadata.target_object_id.clone(),
            version: previous.version + 1,
            content: RepresentationContent::Diagram(Diagram { nodes, edges }),
        })
    }

    fn should_refresh(&self, change: &ChangeDescription, representation_id: RepresentationId) -> bool {
        match change.kind {
            ChangeKind::Semantic => true,
            ChangeKind::RepresentationLayout
            | ChangeKind::RepresentationRename
            | ChangeKind::RepresentationState => change.originates_from(representation_id),
            _ => false,
        }
    }
}

fn auto_bounds(index: usize) -> Bounds {
    Bounds::new(
        MARGIN + index as f64 * NODE_SPACING,
        MARGIN,
        NODE_WIDTH,
        NODE_HEIGHT,
    )
}

fn semantic_change(representation: &Representation) -> ChangeDescription {
    ChangeDescription::new(ChangeKind::Semantic, representation.id)
}

fn node_object(representation: &Representation, node_id: &str) -> Option<ObjectId> {
    representation
        .diagram()?
        .node(node_id)
        .map(|n| n.target_object_id.clone())
}

/// Direct edit of a node label or an edge center label
pub struct EditLabelHandler;

impl RepresentationEventHandler for EditLabelHandler {
    fn can_handle(&self, input: &RepresentationInput) -> bool {
        matches!(input.action, RepresentationAction::EditLabel { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        representation: &mut Representation,
        identity: &Identity,
        input: &RepresentationInput,
    ) -> EventHandlerResponse {
        let RepresentationAction::EditLabel { label_id, new_text } = &input.action else {
            return EventHandlerResponse::failure(Payload::error(input.id, "not a label edit"));
        };
        let RepresentationContent::Diagram(diagram) = &mut representation.content else {
            return EventHandlerResponse::failure(Payload::error(input.id, "not a diagram"));
        };

        let applied = if let Some(edge_id) = label_id.strip_suffix(CENTER_LABEL_SUFFIX) {
            match diagram.edges.iter_mut().find(|e| e.id == edge_id) {
                Some(edge) => editing_context
                    .set_reference_label(
                        &ObjectId::from(edge.source_id.as_str()),
                        &ObjectId::from(edge.target_id.as_str()),
                        new_text.as_str(),
                    )
                    .map(|_| edge.label = new_text.clone())
                    .map_err(|e| e.to_string()),
                None => Err(format!("no edge for label {}", label_id)),
            }
        } else if let Some(node_id) = label_id.strip_suffix(LABEL_SUFFIX) {
            match diagram.nodes.iter_mut().find(|n| n.id == node_id) {
                Some(node) => editing_context
                    .rename_object(&node.target_object_id, new_text.as_str(), identity.username())
                    .map(|_| node.label = new_text.clone())
                    .map_err(|e| e.to_string()),
                None => Err(format!("no node for label {}", label_id)),
            }
        } else {
            Err(format!("unknown label id {}", label_id))
        };

        match applied {
            Ok(()) => EventHandlerResponse::success(
                semantic_change(representation),
                Payload::EditLabelSuccess {
                    input_id: input.id,
                    representation: representation.clone(),
                },
            ),
            Err(message) => EventHandlerResponse::failure(Payload::error(input.id, message)),
        }
    }
}

/// Creates an object with a palette node tool
pub struct InvokeNodeToolHandler {
    palette: Arc<ToolPalette>,
}

impl RepresentationEventHandler for InvokeNodeToolHandler {
    fn can_handle(&self, input: &RepresentationInput) -> bool {
        matches!(input.action, RepresentationAction::InvokeNodeTool { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        representation: &mut Representation,
        _identity: &Identity,
        input: &RepresentationInput,
    ) -> EventHandlerResponse {
        let RepresentationAction::InvokeNodeTool {
            diagram_element_id,
            tool_id,
        } = &input.action
        else {
            return EventHandlerResponse::failure(Payload::error(input.id, "not a node tool"));
        };
        let Some(tool) = self.palette.node_tool(tool_id) else {
            return EventHandlerResponse::failure(Payload::error(
                input.id,
                format!("unknown node tool {}", tool_id),
            ));
        };

        // the background stands for the diagram's own target
        let parent = if *diagram_element_id == representation.id.to_string() {
            representation.target_object_id.clone()
        } else {
            match node_object(representation, diagram_element_id) {
                Some(object) => Some(object),
                None => {
                    return EventHandlerResponse::failure(Payload::error(
                        input.id,
                        format!("unknown diagram element {}", diagram_element_id),
                    ))
                }
            }
        };

        let mut object = SemanticObject::new(tool.child_kind.as_str(), tool.label.as_str());
        if let Some(parent) = parent {
            object = object.with_parent(parent);
        }
        match editing_context.add_object(object) {
            Ok(_) => EventHandlerResponse::success(
                semantic_change(representation),
                Payload::InvokeToolSuccess {
                    input_id: input.id,
                    representation_id: representation.id,
                    tool_id: tool_id.clone(),
                },
            ),
            Err(e) => EventHandlerResponse::failure(Payload::error(input.id, e.to_string())),
        }
    }
}

/// Links two nodes' objects with a palette edge tool
pub struct InvokeEdgeToolHandler {
    palette: Arc<ToolPalette>,
}

impl RepresentationEventHandler for InvokeEdgeToolHandler {
    fn can_handle(&self, input: &RepresentationInput) -> bool {
        matches!(input.action, RepresentationAction::InvokeEdgeTool { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        representation: &mut Representation,
        _identity: &Identity,
        input: &RepresentationInput,
    ) -> EventHandlerResponse {
        let RepresentationAction::InvokeEdgeTool {
            source_element_id,
            target_element_id,
            tool_id,
        } = &input.action
        else {
            return EventHandlerResponse::failure(Payload::error(input.id, "not an edge tool"));
        };
        let Some(tool) = self.palette.edge_tool(tool_id) else {
            return EventHandlerResponse::failure(Payload::error(
                input.id,
                format!("unknown edge tool {}", tool_id),
            ));
        };
        let (Some(source), Some(target)) = (
            node_object(representation, source_element_id),
            node_object(representation, target_element_id),
        ) else {
            return EventHandlerResponse::failure(Payload::error(
                input.id,
                "edge tools connect two nodes of this diagram",
            ));
        };

        match editing_context.add_reference(&source, &target, tool.label.as_str()) {
            Ok(()) => EventHandlerResponse::success(
                semantic_change(representation),
                Payload::InvokeToolSuccess {
                    input_id: input.id,
                    representation_id: representation.id,
                    tool_id: tool_id.clone(),
                },
            ),
            Err(e) => EventHandlerResponse::failure(Payload::error(input.id, e.to_string())),
        }
    }
}

/// Moves or resizes a node. Layout is local to this diagram.
pub struct UpdateNodeBoundsHandler;

impl RepresentationEventHandler for UpdateNodeBoundsHandler {
    fn can_handle(&self, input: &RepresentationInput) -> bool {
        matches!(input.action, RepresentationAction::UpdateNodeBounds { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        representation: &mut Representation,
        _identity: &Identity,
        input: &RepresentationInput,
    ) -> EventHandlerResponse {
        let RepresentationAction::UpdateNodeBounds {
            node_id,
            x,
            y,
            width,
            height,
        } = &input.action
        else {
            return EventHandlerResponse::failure(Payload::error(input.id, "not a bounds update"));
        };
        if *width <= 0.0 || *height <= 0.0 {
            return EventHandlerResponse::failure(Payload::error(
                input.id,
                "node width and height must be positive",
            ));
        }
        if node_object(representation, node_id).is_none() {
            return EventHandlerResponse::failure(Payload::error(
                input.id,
                format!("unknown node {}", node_id),
            ));
        }

        let bounds = Bounds::new(*x, *y, *width, *height);
        if let Err(e) = editing_context.set_layout(&representation.id, node_id.as_str(), bounds) {
            return EventHandlerResponse::failure(Payload::error(input.id, e.to_string()));
        }

        EventHandlerResponse::success(
            ChangeDescription::new(ChangeKind::RepresentationLayout, representation.id),
            Payload::UpdateNodeBoundsSuccess {
                input_id: input.id,
                representation_id: representation.id,
                node_id: node_id.clone(),
            },
        )
        .with_editing_context_dirty(true)
    }
}

/// Deletes the semantic elements behind diagram nodes and edges
pub struct DeleteFromDiagramHandler;

impl RepresentationEventHandler for DeleteFromDiagramHandler {
    fn can_handle(&self, input: &RepresentationInput) -> bool {
        matches!(input.action, RepresentationAction::DeleteFromDiagram { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        representation: &mut Representation,
        _identity: &Identity,
        input: &RepresentationInput,
    ) -> EventHandlerResponse {
        let RepresentationAction::DeleteFromDiagram { element_ids } = &input.action else {
            return EventHandlerResponse::failure(Payload::error(input.id, "not a deletion"));
        };
        let Some(diagram) = representation.diagram() else {
            return EventHandlerResponse::failure(Payload::error(input.id, "not a diagram"));
        };

        let mut objects = Vec::new();
        let mut references = Vec::new();
        for element_id in element_ids {
            if let Some(node) = diagram.node(element_id) {
                objects.push(node.target_object_id.clone());
            } else if let Some(edge) = diagram.edge(element_id) {
                references.push((
                    ObjectId::from(edge.source_id.as_str()),
                    ObjectId::from(edge.target_id.as_str()),
                ));
            } else {
                return EventHandlerResponse::failure(Payload::error(
                    input.id,
                    format!("unknown diagram element {}", element_id),
                ));
            }
        }

        for (source, target) in &references {
            // the reference may already be gone with a deleted endpoint
            let _ = editing_context.remove_reference(source, target);
        }
        let mut removed = Vec::new();
        for object in &objects {
            removed.extend(editing_context.remove_object(object));
        }
        editing_context.remove_representations_targeting(&removed);

        EventHandlerResponse::success(
            semantic_change(representation),
            Payload::DeleteFromDiagramSuccess {
                input_id: input.id,
                representation_id: representation.id,
                removed,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DefaultObjectService, ProjectId, RepresentationKind, RepresentationMetadata,
    };

    struct Fixture {
        ctx: EditingContext,
        renderer: DiagramRenderer,
        representation: Representation,
    }

    /// pkg { a, b -> a }, diagram on pkg
    fn fixture() -> Fixture {
        let mut ctx = EditingContext::new(ProjectId::new(), "p");
        ctx.add_object(SemanticObject::new("package", "pkg").with_id("pkg"))
            .unwrap();
        ctx.add_object(
            SemanticObject::new("class", "A")
                .with_id("a")
                .with_parent(ObjectId::from("pkg")),
        )
        .unwrap();
        ctx.add_object(
            SemanticObject::new("class", "B")
                .with_id("b")
                .with_parent(ObjectId::from("pkg"))
                .with_reference(ObjectId::from("a"), "uses"),
        )
        .unwrap();
        let metadata = RepresentationMetadata::new(RepresentationKind::Diagram, "Main", "diagram")
            .with_target(ObjectId::from("pkg"));
        ctx.add_representation(metadata.clone()).unwrap();

        let renderer = DiagramRenderer::new(Arc::new(DefaultObjectService));
        let representation = renderer
            .render(&ctx, &Representation::from_metadata(&metadata))
            .unwrap();
        Fixture {
            ctx,
            renderer,
            representation,
        }
    }

    fn input(fixture: &Fixture, action: RepresentationAction) -> RepresentationInput {
        RepresentationInput::new(fixture.ctx.project_id, fixture.representation.id, action)
    }

    fn run(
        handler: &dyn RepresentationEventHandler,
        fixture: &mut Fixture,
        action: RepresentationAction,
    ) -> EventHandlerResponse {
        let input = input(fixture, action);
        assert!(handler.can_handle(&input));
        handler.handle(
            &mut fixture.ctx,
            &mut fixture.representation,
            &Identity::user("alice"),
            &input,
        )
    }

    #[test]
    fn render_shows_children_and_references() {
        let fixture = fixture();
        let diagram = fixture.representation.diagram().unwrap();

        assert_eq!(fixture.representation.version, 1);
        assert_eq!(diagram.nodes.len(), 2);
        assert_eq!(diagram.edges.len(), 1);
        assert_eq!(diagram.edges[0].id, "b--a");
        assert_eq!(diagram.node("a").unwrap().bounds, auto_bounds(0));
        assert_eq!(diagram.node("b").unwrap().bounds, auto_bounds(1));
    }

    #[test]
    fn render_fails_once_target_is_gone() {
        let mut fixture = fixture();
        fixture.ctx.remove_object(&ObjectId::from("pkg"));
        assert!(fixture
            .renderer
            .render(&fixture.ctx, &fixture.representation)
            .is_none());
    }

    #[test]
    fn edit_node_label_renames_object() {
        let mut fixture = fixture();
        let response = run(
            &EditLabelHandler,
            &mut fixture,
            RepresentationAction::EditLabel {
                label_id: "a_label".into(),
                new_text: "Alpha".into(),
            },
        );

        assert!(response.success);
        assert!(response.change_description.is_semantic());
        let a = fixture.ctx.get_object(&ObjectId::from("a")).unwrap();
        assert_eq!(a.label, "Alpha");
        assert_eq!(a.metadata.modified_by.as_deref(), Some("alice"));
        match &response.payload {
            Payload::EditLabelSuccess { representation, .. } => {
                assert_eq!(representation.diagram().unwrap().node("a").unwrap().label, "Alpha")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn edit_edge_center_label_renames_reference() {
        let mut fixture = fixture();
        let response = run(
            &EditLabelHandler,
            &mut fixture,
            RepresentationAction::EditLabel {
                label_id: "b--a_centerlabel".into(),
                new_text: "depends on".into(),
            },
        );

        assert!(response.success);
        let b = fixture.ctx.get_object(&ObjectId::from("b")).unwrap();
        assert_eq!(b.reference_to(&ObjectId::from("a")).unwrap().label, "depends on");
    }

    #[test]
    fn edit_unknown_label_fails() {
        let mut fixture = fixture();
        let response = run(
            &EditLabelHandler,
            &mut fixture,
            RepresentationAction::EditLabel {
                label_id: "zzz_label".into(),
                new_text: "x".into(),
            },
        );
        assert!(!response.success);
        assert!(response.payload.is_error());
    }

    #[test]
    fn node_tool_on_background_creates_child_of_target() {
        let mut fixture = fixture();
        let handler = InvokeNodeToolHandler {
            palette: Arc::new(ToolPalette::standard()),
        };
        let background = fixture.representation.id.to_string();
        let response = run(
            &handler,
            &mut fixture,
            RepresentationAction::InvokeNodeTool {
                diagram_element_id: background,
                tool_id: "create-class".into(),
            },
        );

        assert!(response.success);
        assert_eq!(
            fixture.ctx.children_of(Some(&ObjectId::from("pkg"))).len(),
            3
        );
        let refreshed = fixture
            .renderer
            .render(&fixture.ctx, &fixture.representation)
            .unwrap();
        assert_eq!(refreshed.diagram().unwrap().nodes.len(), 3);
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let mut fixture = fixture();
        let handler = InvokeNodeToolHandler {
            palette: Arc::new(ToolPalette::standard()),
        };
        let response = run(
            &handler,
            &mut fixture,
            RepresentationAction::InvokeNodeTool {
                diagram_element_id: "a".into(),
                tool_id: "nope".into(),
            },
        );
        assert!(!response.success);
    }

    #[test]
    fn edge_tool_adds_reference() {
        let mut fixture = fixture();
        let handler = InvokeEdgeToolHandler {
            palette: Arc::new(ToolPalette::standard()),
        };
        let response = run(
            &handler,
            &mut fixture,
            RepresentationAction::InvokeEdgeTool {
                source_element_id: "a".into(),
                target_element_id: "b".into(),
                tool_id: "create-reference".into(),
            },
        );

        assert!(response.success);
        let a = fixture.ctx.get_object(&ObjectId::from("a")).unwrap();
        assert_eq!(a.reference_to(&ObjectId::from("b")).unwrap().label, "references");
    }

    #[test]
    fn bounds_update_is_local_layout() {
        let mut fixture = fixture();
        let response = run(
            &UpdateNodeBoundsHandler,
            &mut fixture,
            RepresentationAction::UpdateNodeBounds {
                node_id: "a".into(),
                x: 5.0,
                y: 6.0,
                width: 70.0,
                height: 80.0,
            },
        );

        assert!(response.success);
        assert!(response.editing_context_dirty);
        assert_eq!(
            response.change_description.kind,
            ChangeKind::RepresentationLayout
        );
        assert!(fixture
            .renderer
            .should_refresh(&response.change_description, fixture.representation.id));
        assert!(!fixture
            .renderer
            .should_refresh(&response.change_description, RepresentationId::new()));

        let refreshed = fixture
            .renderer
            .render(&fixture.ctx, &fixture.representation)
            .unwrap();
        assert_eq!(
            refreshed.diagram().unwrap().node("a").unwrap().bounds,
            Bounds::new(5.0, 6.0, 70.0, 80.0)
        );
    }

    #[test]
    fn bounds_must_be_positive() {
        let mut fixture = fixture();
        let response = run(
            &UpdateNodeBoundsHandler,
            &mut fixture,
            RepresentationAction::UpdateNodeBounds {
                node_id: "a".into(),
                x: 0.0,
                y: 0.0,
                width: 0.0,
                height: 10.0,
            },
        );
        assert!(!response.success);
        assert!(fixture
            .ctx
            .get_representation(&fixture.representation.id)
            .unwrap()
            .layout
            .is_empty());
    }

    #[test]
    fn delete_from_diagram_removes_objects_and_edges() {
        let mut fixture = fixture();
        let response = run(
            &DeleteFromDiagramHandler,
            &mut fixture,
            RepresentationAction::DeleteFromDiagram {
                element_ids: vec!["b--a".into(), "a".into()],
            },
        );

        assert!(response.success);
        assert!(fixture.ctx.get_object(&ObjectId::from("a")).is_none());
        let b = fixture.ctx.get_object(&ObjectId::from("b")).unwrap();
        assert!(b.references.is_empty());
    }

    #[test]
    fn delete_unknown_element_changes_nothing() {
        let mut fixture = fixture();
        let response = run(
            &DeleteFromDiagramHandler,
            &mut fixture,
            RepresentationAction::DeleteFromDiagram {
                element_ids: vec!["a".into(), "ghost".into()],
            },
        );
        assert!(!response.success);
        assert!(fixture.ctx.get_object(&ObjectId::from("a")).is_some());
    }
}
