//! Rename handler shared by every representation kind

use super::processor::RepresentationEventHandler;
use super::types::Representation;
use crate::event::{
    ChangeDescription, ChangeKind, EventHandlerResponse, Identity, Payload, RepresentationAction,
    RepresentationInput,
};
use crate::model::EditingContext;

/// Applies a rename to the descriptor and the live representation.
///
/// A rename arriving as a project input is forwarded here by the project
/// worker, so both routes end in the same place.
pub struct RenameRepresentationHandler;

impl RepresentationEventHandler for RenameRepresentationHandler {
    fn can_handle(&self, input: &RepresentationInput) -> bool {
        matches!(input.action, RepresentationAction::RenameRepresentation { .. })
    }

    fn handle(
        &self,
        editing_context: &mut EditingContext,
        representation: &mut Representation,
        _identity: &Identity,
        input: &RepresentationInput,
    ) -> EventHandlerResponse {
        let RepresentationAction::RenameRepresentation { new_label } = &input.action else {
            return EventHandlerResponse::failure(Payload::error(input.id, "not a rename"));
        };
        let new_label = new_label.trim();
        if new_label.is_empty() {
            return EventHandlerResponse::failure(Payload::error(
                input.id,
                "representation label must not be blank",
            ));
        }
        if let Err(e) = editing_context.rename_representation(&representation.id, new_label) {
            return EventHandlerResponse::failure(Payload::error(input.id, e.to_string()));
        }
        representation.label = new_label.to_string();

        EventHandlerResponse::success(
            ChangeDescription::new(ChangeKind::RepresentationRename, representation.id),
            Payload::RenameRepresentationSuccess {
                input_id: input.id,
                representation_id: representation.id,
                new_label: new_label.to_string(),
            },
        )
        .with_editing_context_dirty(true)
    }
}
