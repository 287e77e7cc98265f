//! Project-scoped handlers
//!
//! Dispatch picks the first handler whose `can_handle` accepts the input,
//! in registration order.

use crate::event::{
    ChangeDescription, ChangeKind, EventHandlerResponse, Identity, Payload, ProjectAction,
    ProjectInput,
};
use crate::model::{EditingContext, RepresentationMetadata, SemanticObject};
use std::sync::Arc;

/// Handles one family of project-scoped inputs.
///
/// Runs on the project worker with exclusive access to the editing context.
pub trait ProjectEventHandler: Send + Sync {
    fn can_handle(&self, input: &ProjectInput) -> bool;

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        identity: &Identity,
        input: &ProjectInput,
    ) -> EventHandlerResponse;
}

/// The built-in chain, in dispatch order
pub fn default_project_event_handlers() -> Vec<Arc<dyn ProjectEventHandler>> {
    vec![
        Arc::new(RenameProjectHandler),
        Arc::new(CreateRepresentationHandler),
        Arc::new(RenameRepresentationHandler),
        Arc::new(DeleteRepresentationHandler),
        Arc::new(CreateObjectHandler),
        Arc::new(DeleteObjectHandler),
        Arc::new(RenameObjectHandler),
    ]
}

fn error(input: &ProjectInput, message: impl Into<String>) -> EventHandlerResponse {
    EventHandlerResponse::failure(Payload::error(input.id, message))
}

fn unexpected(input: &ProjectInput) -> EventHandlerResponse {
    error(input, "unexpected input")
}

pub struct RenameProjectHandler;

impl ProjectEventHandler for RenameProjectHandler {
    fn can_handle(&self, input: &ProjectInput) -> bool {
        matches!(input.action, ProjectAction::RenameProject { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        _identity: &Identity,
        input: &ProjectInput,
    ) -> EventHandlerResponse {
        let ProjectAction::RenameProject { new_name } = &input.action else {
            return unexpected(input);
        };
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return error(input, "project name must not be blank");
        }
        editing_context.project_name = new_name.to_string();

        EventHandlerResponse::success(
            ChangeDescription::new(ChangeKind::ProjectRename, input.project_id),
            Payload::RenameProjectSuccess {
                input_id: input.id,
                project_id: input.project_id,
                new_name: new_name.to_string(),
            },
        )
        .with_editing_context_dirty(true)
    }
}

pub struct CreateRepresentationHandler;

impl ProjectEventHandler for CreateRepresentationHandler {
    fn can_handle(&self, input: &ProjectInput) -> bool {
        matches!(input.action, ProjectAction::CreateRepresentation { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        _identity: &Identity,
        input: &ProjectInput,
    ) -> EventHandlerResponse {
        let ProjectAction::CreateRepresentation {
            representation_id,
            kind,
            label,
            description_id,
            target_object_id,
        } = &input.action
        else {
            return unexpected(input);
        };

        let mut metadata =
            RepresentationMetadata::new(*kind, label.as_str(), description_id.as_str());
        if let Some(id) = representation_id {
            metadata = metadata.with_id(*id);
        }
        if let Some(target) = target_object_id {
            metadata = metadata.with_target(target.clone());
        }

        match editing_context.add_representation(metadata.clone()) {
            Ok(id) => EventHandlerResponse::success(
                ChangeDescription::new(ChangeKind::RepresentationCreation, id),
                Payload::CreateRepresentationSuccess {
                    input_id: input.id,
                    representation: metadata,
                },
            )
            .with_editing_context_dirty(true),
            Err(e) => error(input, e.to_string()),
        }
    }
}

pub struct RenameRepresentationHandler;

impl ProjectEventHandler for RenameRepresentationHandler {
    fn can_handle(&self, input: &ProjectInput) -> bool {
        matches!(input.action, ProjectAction::RenameRepresentation { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        _identity: &Identity,
        input: &ProjectInput,
    ) -> EventHandlerResponse {
        let ProjectAction::RenameRepresentation {
            representation_id,
            new_label,
        } = &input.action
        else {
            return unexpected(input);
        };
        let new_label = new_label.trim();
        if new_label.is_empty() {
            return error(input, "representation label must not be blank");
        }

        match editing_context.rename_representation(representation_id, new_label) {
            Ok(()) => EventHandlerResponse::success(
                ChangeDescription::new(ChangeKind::RepresentationRename, representation_id),
                Payload::RenameRepresentationSuccess {
                    input_id: input.id,
                    representation_id: *representation_id,
                    new_label: new_label.to_string(),
                },
            )
            .with_editing_context_dirty(true),
            Err(e) => error(input, e.to_string()),
        }
    }
}

pub struct DeleteRepresentationHandler;

impl ProjectEventHandler for DeleteRepresentationHandler {
    fn can_handle(&self, input: &ProjectInput) -> bool {
        matches!(input.action, ProjectAction::DeleteRepresentation { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        _identity: &Identity,
        input: &ProjectInput,
    ) -> EventHandlerResponse {
        let ProjectAction::DeleteRepresentation { representation_id } = &input.action else {
            return unexpected(input);
        };

        match editing_context.remove_representation(representation_id) {
            Some(_) => EventHandlerResponse::success(
                ChangeDescription::new(ChangeKind::RepresentationDeletion, representation_id),
                Payload::DeleteRepresentationSuccess {
                    input_id: input.id,
                    representation_id: *representation_id,
                },
            )
            .with_editing_context_dirty(true),
            None => error(
                input,
                format!("representation not found: {}", representation_id),
            ),
        }
    }
}

/// Creates root and child objects
pub struct CreateObjectHandler;

impl ProjectEventHandler for CreateObjectHandler {
    fn can_handle(&self, input: &ProjectInput) -> bool {
        matches!(
            input.action,
            ProjectAction::CreateRootObject { .. } | ProjectAction::CreateChildObject { .. }
        )
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        identity: &Identity,
        input: &ProjectInput,
    ) -> EventHandlerResponse {
        let (parent, object_id, kind, label) = match &input.action {
            ProjectAction::CreateRootObject {
                object_id,
                kind,
                label,
            } => (None, object_id, kind, label),
            ProjectAction::CreateChildObject {
                parent_id,
                object_id,
                kind,
                label,
            } => (Some(parent_id.clone()), object_id, kind, label),
            _ => return unexpected(input),
        };

        let mut object = SemanticObject::new(kind.as_str(), label.as_str());
        if let Some(id) = object_id {
            object = object.with_id(id.clone());
        }
        if let Some(parent) = parent {
            object = object.with_parent(parent);
        }
        object.metadata.modified_by = identity.username().map(str::to_string);

        match editing_context.add_object(object.clone()) {
            Ok(_) => EventHandlerResponse::success(
                ChangeDescription::new(ChangeKind::Semantic, input.project_id),
                Payload::CreateObjectSuccess {
                    input_id: input.id,
                    object,
                },
            ),
            Err(e) => error(input, e.to_string()),
        }
    }
}

/// Deletes an object, its contents, and the descriptors rooted on them
pub struct DeleteObjectHandler;

impl ProjectEventHandler for DeleteObjectHandler {
    fn can_handle(&self, input: &ProjectInput) -> bool {
        matches!(input.action, ProjectAction::DeleteObject { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        _identity: &Identity,
        input: &ProjectInput,
    ) -> EventHandlerResponse {
        let ProjectAction::DeleteObject { object_id } = &input.action else {
            return unexpected(input);
        };

        let removed = editing_context.remove_object(object_id);
        if removed.is_empty() {
            return error(input, format!("object not found: {}", object_id));
        }
        editing_context.remove_representations_targeting(&removed);

        EventHandlerResponse::success(
            ChangeDescription::new(ChangeKind::Semantic, input.project_id),
            Payload::DeleteObjectSuccess {
                input_id: input.id,
                removed,
            },
        )
    }
}

pub struct RenameObjectHandler;

impl ProjectEventHandler for RenameObjectHandler {
    fn can_handle(&self, input: &ProjectInput) -> bool {
        matches!(input.action, ProjectAction::RenameObject { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        identity: &Identity,
        input: &ProjectInput,
    ) -> EventHandlerResponse {
        let ProjectAction::RenameObject {
            object_id,
            new_label,
        } = &input.action
        else {
            return unexpected(input);
        };
        let new_label = new_label.trim();
        if new_label.is_empty() {
            return error(input, "object label must not be blank");
        }

        match editing_context.rename_object(object_id, new_label, identity.username()) {
            Ok(()) => EventHandlerResponse::success(
                ChangeDescription::new(ChangeKind::Semantic, input.project_id),
                Payload::RenameObjectSuccess {
                    input_id: input.id,
                    object_id: object_id.clone(),
                    new_label: new_label.to_string(),
                },
            ),
            Err(e) => error(input, e.to_string()),
        }
    }
}
