//! Forms: one widget per editable field of the target object

use super::processor::{RepresentationEventHandler, RepresentationRenderer};
use super::rename::RenameRepresentationHandler;
use super::types::{Form, Representation, RepresentationContent, Widget};
use crate::event::{
    ChangeDescription, ChangeKind, EventHandlerResponse, Identity, Payload, RepresentationAction,
    RepresentationInput,
};
use crate::model::{EditingContext, ObjectId, ObjectService, RepresentationId};
use std::sync::Arc;

const LABEL_FIELD: &str = "label";
const ANONYMOUS: &str = "anonymous";

/// Handler chain for forms, in dispatch order
pub fn handlers() -> Vec<Arc<dyn RepresentationEventHandler>> {
    vec![
        Arc::new(RenameRepresentationHandler),
        Arc::new(EditWidgetHandler),
        Arc::new(UpdateWidgetFocusHandler),
    ]
}

fn widget_id(object_id: &ObjectId, field: &str) -> String {
    format!("{}:{}", object_id, field)
}

/// Splits `<object>:<field>`; the field never contains a colon
fn parse_widget_id(widget_id: &str) -> Option<(ObjectId, &str)> {
    let (object, field) = widget_id.rsplit_once(':')?;
    Some((ObjectId::from(object), field))
}

pub struct FormRenderer {
    object_service: Arc<dyn ObjectService>,
}

impl FormRenderer {
    pub fn new(object_service: Arc<dyn ObjectService>) -> Self {
        Self { object_service }
    }
}

impl RepresentationRenderer for FormRenderer {
    fn render(
        &self,
        editing_context: &EditingContext,
        previous: &Representation,
    ) -> Option<Representation> {
        let metadata = editing_context.get_representation(&previous.id)?;
        let mut widgets = Vec::new();
        if let Some(target_id) = &metadata.target_object_id {
            let target = self.object_service.get_object(editing_context, target_id)?;
            widgets.push(Widget {
                id: widget_id(&target.id, LABEL_FIELD),
                label: "Label".to_string(),
                value: self.object_service.get_label(target),
                focused_by: Vec::new(),
            });
            widgets.extend(target.properties.iter().map(|(key, value)| Widget {
                id: widget_id(&target.id, key),
                label: key.clone(),
                value: value.display(),
                focused_by: Vec::new(),
            }));
        }

        // focus is transient state carried across renders
        if let Some(previous_form) = previous.form() {
            for widget in &mut widgets {
                if let Some(old) = previous_form.widget(&widget.id) {
                    widget.focused_by = old.focused_by.clone();
                }
            }
        }

        Some(Representation {
            id: metadata.id,
            kind: metadata.kind,
            label: metadata.label.clone(),
            description_id: metadata.description_id.clone(),
            target_object_id: metadata.target_object_id.clone(),
            version: previous.version + 1,
            content: RepresentationContent::Form(Form { widgets }),
        })
    }

    fn should_refresh(&self, change: &ChangeDescription, representation_id: RepresentationId) -> bool {
        match change.kind {
            ChangeKind::Semantic => true,
            ChangeKind::RepresentationRename | ChangeKind::RepresentationState => {
                change.originates_from(representation_id)
            }
            _ => false,
        }
    }
}

/// Writes a widget's value back to the object's label or property
pub struct EditWidgetHandler;

impl RepresentationEventHandler for EditWidgetHandler {
    fn can_handle(&self, input: &RepresentationInput) -> bool {
        matches!(input.action, RepresentationAction::EditWidget { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        representation: &mut Representation,
        identity: &Identity,
        input: &RepresentationInput,
    ) -> EventHandlerResponse {
        let RepresentationAction::EditWidget { widget_id, value } = &input.action else {
            return EventHandlerResponse::failure(Payload::error(input.id, "not a widget edit"));
        };
        let known = representation
            .form()
            .is_some_and(|form| form.widget(widget_id).is_some());
        let Some((object_id, field)) = parse_widget_id(widget_id).filter(|_| known) else {
            return EventHandlerResponse::failure(Payload::error(
                input.id,
                format!("unknown widget {}", widget_id),
            ));
        };

        let result = if field == LABEL_FIELD {
            editing_context.rename_object(&object_id, value.display(), identity.username())
        } else {
            editing_context.set_property(&object_id, field, value.clone(), identity.username())
        };

        match result {
            Ok(()) => EventHandlerResponse::success(
                ChangeDescription::new(ChangeKind::Semantic, representation.id),
                Payload::EditWidgetSuccess {
                    input_id: input.id,
                    representation_id: representation.id,
                    widget_id: widget_id.clone(),
                },
            ),
            Err(e) => EventHandlerResponse::failure(Payload::error(input.id, e.to_string())),
        }
    }
}

/// Tracks which users are focusing which widget. Not persisted.
pub struct UpdateWidgetFocusHandler;

impl RepresentationEventHandler for UpdateWidgetFocusHandler {
    fn can_handle(&self, input: &RepresentationInput) -> bool {
        matches!(input.action, RepresentationAction::UpdateWidgetFocus { .. })
    }

    fn handle(
        &self,
        _editing_context: &mut EditingContext,
        representation: &mut Representation,
        identity: &Identity,
        input: &RepresentationInput,
    ) -> EventHandlerResponse {
        let RepresentationAction::UpdateWidgetFocus {
            widget_id,
            selected,
        } = &input.action
        else {
            return EventHandlerResponse::failure(Payload::error(input.id, "not a focus update"));
        };
        let representation_id = representation.id;
        let Some(widget) = representation
            .form_mut()
            .and_then(|form| form.widget_mut(widget_id))
        else {
            return EventHandlerResponse::failure(Payload::error(
                input.id,
                format!("unknown widget {}", widget_id),
            ));
        };

        let username = identity.username().unwrap_or(ANONYMOUS).to_string();
        if *selected {
            if !widget.focused_by.contains(&username) {
                widget.focused_by.push(username);
            }
        } else {
            widget.focused_by.retain(|u| *u != username);
        }

        EventHandlerResponse::success(
            ChangeDescription::new(ChangeKind::RepresentationState, representation_id),
            Payload::UpdateWidgetFocusSuccess {
                input_id: input.id,
                representation_id,
                widget_id: widget_id.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DefaultObjectService, ProjectId, PropertyValue, RepresentationKind,
        RepresentationMetadata, SemanticObject,
    };

    fn setup() -> (EditingContext, FormRenderer, Representation) {
        let mut ctx = EditingContext::new(ProjectId::new(), "p");
        ctx.add_object(
            SemanticObject::new("class", "A")
                .with_id("a")
                .with_property("abstract", PropertyValue::Bool(false)),
        )
        .unwrap();
        let metadata = RepresentationMetadata::new(RepresentationKind::Form, "Details", "form")
            .with_target(ObjectId::from("a"));
        ctx.add_representation(metadata.clone()).unwrap();
        let renderer = FormRenderer::new(Arc::new(DefaultObjectService));
        let representation = renderer
            .render(&ctx, &Representation::from_metadata(&metadata))
            .unwrap();
        (ctx, renderer, representation)
    }

    fn input(representation: &Representation, action: RepresentationAction) -> RepresentationInput {
        RepresentationInput::new(ProjectId::new(), representation.id, action)
    }

    #[test]
    fn render_has_label_and_property_widgets() {
        let (_ctx, _renderer, representation) = setup();
        let form = representation.form().unwrap();
        let ids: Vec<&str> = form.widgets.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["a:label", "a:abstract"]);
        assert_eq!(form.widget("a:abstract").unwrap().value, "false");
    }

    #[test]
    fn edit_widget_sets_property_and_label() {
        let (mut ctx, _renderer, mut representation) = setup();
        let identity = Identity::user("bob");

        let property = input(
            &representation,
            RepresentationAction::EditWidget {
                widget_id: "a:abstract".into(),
                value: PropertyValue::Bool(true),
            },
        );
        let response = EditWidgetHandler.handle(&mut ctx, &mut representation, &identity, &property);
        assert!(response.success);
        assert!(response.editing_context_dirty);

        let label = input(
            &representation,
            RepresentationAction::EditWidget {
                widget_id: "a:label".into(),
                value: "Alpha".into(),
            },
        );
        EditWidgetHandler.handle(&mut ctx, &mut representation, &identity, &label);

        let a = ctx.get_object(&ObjectId::from("a")).unwrap();
        assert_eq!(a.properties.get("abstract"), Some(&PropertyValue::Bool(true)));
        assert_eq!(a.label, "Alpha");
    }

    #[test]
    fn edit_unknown_widget_fails() {
        let (mut ctx, _renderer, mut representation) = setup();
        let edit = input(
            &representation,
            RepresentationAction::EditWidget {
                widget_id: "a:missing".into(),
                value: "x".into(),
            },
        );
        let response =
            EditWidgetHandler.handle(&mut ctx, &mut representation, &Identity::anonymous(), &edit);
        assert!(!response.success);
        assert!(!ctx.get_object(&ObjectId::from("a")).unwrap().properties.contains_key("missing"));
    }

    #[test]
    fn focus_survives_rerender() {
        let (mut ctx, renderer, mut representation) = setup();
        let focus = input(
            &representation,
            RepresentationAction::UpdateWidgetFocus {
                widget_id: "a:label".into(),
                selected: true,
            },
        );
        let response = UpdateWidgetFocusHandler.handle(
            &mut ctx,
            &mut representation,
            &Identity::user("carol"),
            &focus,
        );

        assert!(response.success);
        assert!(!response.editing_context_dirty);
        assert!(renderer.should_refresh(&response.change_description, representation.id));

        let rerendered = renderer.render(&ctx, &representation).unwrap();
        assert_eq!(
            rerendered.form().unwrap().widget("a:label").unwrap().focused_by,
            vec!["carol".to_string()]
        );
    }

    #[test]
    fn unfocus_removes_only_caller() {
        let (mut ctx, _renderer, mut representation) = setup();
        for user in ["carol", "dave"] {
            let focus = input(
                &representation,
                RepresentationAction::UpdateWidgetFocus {
                    widget_id: "a:label".into(),
                    selected: true,
                },
            );
            UpdateWidgetFocusHandler.handle(&mut ctx, &mut representation, &Identity::user(user), &focus);
        }
        let blur = input(
            &representation,
            RepresentationAction::UpdateWidgetFocus {
                widget_id: "a:label".into(),
                selected: false,
            },
        );
        UpdateWidgetFocusHandler.handle(&mut ctx, &mut representation, &Identity::user("carol"), &blur);

        assert_eq!(
            representation.form().unwrap().widget("a:label").unwrap().focused_by,
            vec!["dave".to_string()]
        );
    }

    #[test]
    fn layout_changes_never_refresh_forms() {
        let (_ctx, renderer, representation) = setup();
        let change = ChangeDescription::new(ChangeKind::RepresentationLayout, representation.id);
        assert!(!renderer.should_refresh(&change, representation.id));
    }
}
